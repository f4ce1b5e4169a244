use std::env;
use log::LevelFilter;
use crate::host::application::run_application;
use crate::host::options::HostOptions;
use crate::error::AppRunError;

pub mod device;
pub mod host;
pub mod error;
pub mod config;

pub use device::bridge::{ChannelSink, Delivery, EventBridge, EventSink};
pub use device::connector::{PeripheralConnector, SessionReporter};
pub use device::link::PrinterLink;
pub use device::state_machine::{ConnectionSession, ConnectionStateMachine, StateListener};
pub use device::types::{ConnectOutcome, ConnectRequest, ConnectState, ErrorKind, Event};
pub use error::LinkError;

fn log_level() -> LevelFilter {
    env::var("LOG_LEVEL")
        .ok()
        .and_then(|level| level.parse().ok())
        .unwrap_or(LevelFilter::Info)
}

pub fn init_logging() {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log_level())
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        match fern::log_file(&log_file) {
            Ok(file) => dispatch = dispatch.chain(file),
            Err(err) => eprintln!("Failed to open LOG_FILE {}: {}", log_file, err),
        }
    }

    if let Err(err) = dispatch.apply() {
        eprintln!("Failed to initialize logger: {}", err);
    }
}

pub fn run(options: HostOptions) -> Result<(), AppRunError> {
    run_application(options)?;
    Ok(())
}
