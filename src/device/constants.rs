use uuid::Uuid;

/**
 * How long (milliseconds) to scan for the requested printer before giving up.
 */
pub const SCAN_DEADLINE: u64 = 10000;

/**
 * How often (milliseconds) to look through the discovered peripherals while scanning.
 */
pub const SCAN_POLL_DELAY: u64 = 250;

/**
 * How long (milliseconds) connecting and discovering services may take. Exceeding it
 * resolves the session as a timeout.
 */
pub const CONNECT_DEADLINE: u64 = 15000;

/**
 * How long (milliseconds) a write to a characteristic may take.
 */
pub const WRITE_DEADLINE: u64 = 2000;

/**
 * How often (milliseconds) to check whether the printer is still connected.
 */
pub const POLL_DELAY: u64 = 1000;

/**
 * How long (milliseconds) checking if the peripheral is still connected may take
 */
pub const IS_CONNECTED_DEADLINE: u64 = 2000;

/**
 * How long (milliseconds) the CLI host waits before connecting again, when asked to reconnect.
 */
pub const RECONNECT_DELAY: u64 = 1000;

/**
 * How long (milliseconds) the CLI host waits for the bluetooth session to disconnect on exit.
 */
pub const SHUTDOWN_GRACE: u64 = 500;

/**
 * Largest payload written to the printer in one GATT write.
 */
pub const WRITE_CHUNK_SIZE: usize = 128;

/**
 * How many events the CLI's channel sink holds before dropping.
 */
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/**
 * The UUID of the serial-over-GATT service most BLE thermal/label printers expose (0x18F0).
 */
pub const PRINTER_SERVICE: &str = "000018f0-0000-1000-8000-00805f9b34fb";

/**
 * The UUID of the characteristic print data is written to (0x2AF1).
 */
pub const PRINTER_WRITE_CHARACTERISTIC: &str = "00002af1-0000-1000-8000-00805f9b34fb";

/**
 * The UUID of the characteristic the printer sends status replies on (0x2AF0).
 */
pub const PRINTER_NOTIFY_CHARACTERISTIC: &str = "00002af0-0000-1000-8000-00805f9b34fb";

pub fn make_printer_service_uuid() -> Uuid {
    Uuid::parse_str(PRINTER_SERVICE).unwrap()
}

pub fn make_printer_write_uuid() -> Uuid {
    Uuid::parse_str(PRINTER_WRITE_CHARACTERISTIC).unwrap()
}

pub fn make_printer_notify_uuid() -> Uuid {
    Uuid::parse_str(PRINTER_NOTIFY_CHARACTERISTIC).unwrap()
}
