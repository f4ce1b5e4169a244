use std::path::PathBuf;
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version)]
#[command(about = "Connects to a bluetooth printer and prints its events as JSON lines.\n\nExample: print-bridge 66:22:E2:4C:D1:08 --send label.tspl", long_about = None)]
pub struct HostOptions {
    /// Address (AA:BB:CC:DD:EE:FF) or advertised name of the printer
    pub peripheral: String,

    /// Read the config from this file instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the raw contents of this file to the printer once it is connected
    #[arg(long)]
    pub send: Option<PathBuf>,

    /// Stop after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Connect again after a timeout, failure or dropped connection
    #[arg(long)]
    pub reconnect: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_peripheral_and_flags() {
        let options = HostOptions::try_parse_from([
            "print-bridge", "AA:BB:CC:DD:EE:FF", "--send", "label.tspl", "--timeout", "30", "--reconnect",
        ]).unwrap();

        assert_eq!(options.peripheral, "AA:BB:CC:DD:EE:FF");
        assert_eq!(options.send, Some(PathBuf::from("label.tspl")));
        assert_eq!(options.timeout, Some(30));
        assert!(options.reconnect);
        assert_eq!(options.config, None);
    }

    #[test]
    fn peripheral_is_required() {
        assert!(HostOptions::try_parse_from(["print-bridge"]).is_err());
    }
}
