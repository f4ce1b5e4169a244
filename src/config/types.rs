use std::time::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::device::constants::{
    make_printer_notify_uuid, make_printer_service_uuid, make_printer_write_uuid, CONNECT_DEADLINE,
    EVENT_CHANNEL_CAPACITY, POLL_DELAY, SCAN_DEADLINE, WRITE_CHUNK_SIZE, WRITE_DEADLINE,
};

/// Settings of the bluetooth connector and the host. Missing fields take their defaults,
/// so a config file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LinkConfig {
    pub scan_deadline_ms: u64,
    pub connect_deadline_ms: u64,
    pub write_deadline_ms: u64,
    pub poll_delay_ms: u64,
    pub write_chunk_size: usize,
    pub event_channel_capacity: usize,
    pub service_uuid: Uuid,
    pub write_characteristic_uuid: Uuid,
    pub notify_characteristic_uuid: Option<Uuid>,
}

impl LinkConfig {
    pub fn scan_deadline(&self) -> Duration {
        Duration::from_millis(self.scan_deadline_ms)
    }

    pub fn connect_deadline(&self) -> Duration {
        Duration::from_millis(self.connect_deadline_ms)
    }

    pub fn write_deadline(&self) -> Duration {
        Duration::from_millis(self.write_deadline_ms)
    }

    pub fn poll_delay(&self) -> Duration {
        Duration::from_millis(self.poll_delay_ms)
    }

    // a zero chunk size would never make progress
    pub fn write_chunk_size(&self) -> usize {
        self.write_chunk_size.max(1)
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            scan_deadline_ms: SCAN_DEADLINE,
            connect_deadline_ms: CONNECT_DEADLINE,
            write_deadline_ms: WRITE_DEADLINE,
            poll_delay_ms: POLL_DELAY,
            write_chunk_size: WRITE_CHUNK_SIZE,
            event_channel_capacity: EVENT_CHANNEL_CAPACITY,
            service_uuid: make_printer_service_uuid(),
            write_characteristic_uuid: make_printer_write_uuid(),
            notify_characteristic_uuid: Some(make_printer_notify_uuid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: LinkConfig = serde_json::from_str(r#"{ "connectDeadlineMs": 5000 }"#).unwrap();
        assert_eq!(config.connect_deadline(), Duration::from_secs(5));
        assert_eq!(config.scan_deadline_ms, SCAN_DEADLINE);
        assert_eq!(config.write_characteristic_uuid, make_printer_write_uuid());
    }

    #[test]
    fn notify_characteristic_can_be_disabled() {
        let config: LinkConfig = serde_json::from_str(r#"{ "notifyCharacteristicUuid": null }"#).unwrap();
        assert_eq!(config.notify_characteristic_uuid, None);
    }

    #[test]
    fn zero_chunk_size_is_clamped() {
        let config = LinkConfig { write_chunk_size: 0, ..LinkConfig::default() };
        assert_eq!(config.write_chunk_size(), 1);
    }
}
