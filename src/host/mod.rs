pub mod application;
pub mod options;
