use clap::Parser;
use log::{error, info};
use print_bridge::{init_logging, run};
use print_bridge::error::{AppRunError, ConfigError};
use print_bridge::host::options::HostOptions;

fn main() -> Result<(), AppRunError> {
    init_logging();
    info!(concat!("Print Bridge ", env!("CARGO_PKG_VERSION")));

    let options = HostOptions::parse();

    match run(options) {
        Err(AppRunError::ConfigError { source: ConfigError::CanNotLock { .. } }) => {
            error!("Another print bridge is already driving the printer");
            Ok(())
        },
        Err(err) => {
            error!("Unexpected error: {}", err);
            Err(err)
        },
        Ok(_) => Ok(())
    }
}
