use std::sync::{Arc, Weak};
use log::debug;

use crate::device::types::{ConnectOutcome, ConnectRequest, ErrorKind};

/// The BLE transport that performs radio-level work for the link.
///
/// None of these methods may block, and none may report back through the
/// `SessionReporter` before returning: completions arrive later, from another task.
pub trait PeripheralConnector: Send {
    /// Starts connecting to `request.peripheral_id`. A new request supersedes any
    /// previous one; the connector drops whatever the previous session held.
    fn connect(&mut self, request: ConnectRequest, reporter: SessionReporter);

    fn disconnect(&mut self);

    /// Writes raw bytes to the printer of session `sequence`. Failures are reported
    /// through `SessionReporter::error`.
    fn write(&mut self, sequence: u64, data: Vec<u8>);
}

impl<C: PeripheralConnector + ?Sized> PeripheralConnector for Box<C> {
    fn connect(&mut self, request: ConnectRequest, reporter: SessionReporter) {
        (**self).connect(request, reporter)
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }

    fn write(&mut self, sequence: u64, data: Vec<u8>) {
        (**self).write(sequence, data)
    }
}

/// Receiving side of connector callbacks, implemented by the link.
pub trait ConnectorCallbacks: Send + Sync {
    fn connector_result(&self, sequence: u64, outcome: ConnectOutcome);
    fn connector_data(&self, sequence: u64, data: Vec<u8>);
    fn connection_lost(&self, sequence: u64);
    fn connector_error(&self, sequence: u64, kind: ErrorKind, message: String);
}

struct Detached;

impl ConnectorCallbacks for Detached {
    fn connector_result(&self, _sequence: u64, _outcome: ConnectOutcome) {}
    fn connector_data(&self, _sequence: u64, _data: Vec<u8>) {}
    fn connection_lost(&self, _sequence: u64) {}
    fn connector_error(&self, _sequence: u64, _kind: ErrorKind, _message: String) {}
}

/// A callback target that is never alive.
pub fn detached() -> Weak<dyn ConnectorCallbacks> {
    let target: Weak<dyn ConnectorCallbacks> = Weak::<Detached>::new();
    target
}

/// Handle given to the connector with every connect request. Every report is tagged
/// with the session it was issued for, so reports of superseded sessions are
/// recognised as stale. The link is held weakly: after teardown reports go nowhere.
#[derive(Clone)]
pub struct SessionReporter {
    sequence: u64,
    target: Weak<dyn ConnectorCallbacks>,
}

impl SessionReporter {
    pub fn new(sequence: u64, target: Weak<dyn ConnectorCallbacks>) -> Self {
        SessionReporter { sequence, target }
    }

    /// A reporter whose reports are always discarded.
    pub fn detached(sequence: u64) -> Self {
        SessionReporter { sequence, target: detached() }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    fn target(&self) -> Option<Arc<dyn ConnectorCallbacks>> {
        let target = self.target.upgrade();
        if target.is_none() {
            debug!("Link for session {} is gone, discarding report", self.sequence);
        }
        target
    }

    pub fn resolve(&self, outcome: ConnectOutcome) {
        if let Some(target) = self.target() {
            target.connector_result(self.sequence, outcome);
        }
    }

    pub fn data(&self, data: Vec<u8>) {
        if let Some(target) = self.target() {
            target.connector_data(self.sequence, data);
        }
    }

    pub fn connection_lost(&self) {
        if let Some(target) = self.target() {
            target.connection_lost(self.sequence);
        }
    }

    pub fn error<M: Into<String>>(&self, kind: ErrorKind, message: M) {
        if let Some(target) = self.target() {
            target.connector_error(self.sequence, kind, message.into());
        }
    }
}

impl std::fmt::Debug for SessionReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionReporter")
            .field("sequence", &self.sequence)
            .field("attached", &(self.target.strong_count() > 0))
            .finish()
    }
}
