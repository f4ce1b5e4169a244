pub mod bridge;
pub mod btle;
pub mod connector;
pub mod constants;
pub mod link;
pub mod mock;
pub mod state_machine;
pub mod types;
