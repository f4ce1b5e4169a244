use std::sync::{Arc, Mutex, MutexGuard, Weak};
use log::debug;

use crate::device::bridge::EventSink;
use crate::device::connector::{ConnectorCallbacks, PeripheralConnector};
use crate::device::state_machine::{ConnectionStateMachine, StateListener};
use crate::device::types::{ConnectOutcome, ConnectState, ErrorKind};
use crate::error::LinkError;

type Shared<C> = Mutex<ConnectionStateMachine<C>>;

// a poisoned lock only means a sink or listener panicked; the machine itself is consistent
fn lock<C: PeripheralConnector>(shared: &Shared<C>) -> MutexGuard<'_, ConnectionStateMachine<C>> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<C: PeripheralConnector> ConnectorCallbacks for Shared<C> {
    fn connector_result(&self, sequence: u64, outcome: ConnectOutcome) {
        lock(self).on_connector_result(sequence, outcome);
    }

    fn connector_data(&self, sequence: u64, data: Vec<u8>) {
        lock(self).on_data(sequence, data);
    }

    fn connection_lost(&self, sequence: u64) {
        lock(self).on_connection_lost(sequence);
    }

    fn connector_error(&self, sequence: u64, kind: ErrorKind, message: String) {
        lock(self).on_connector_error(sequence, kind, message);
    }
}

/// Cloneable handle to the printer connection.
///
/// Host commands and connector reports all go through one mutex, so they never
/// interleave. Sinks and listeners are called with that mutex held and must not call
/// back into the link.
pub struct PrinterLink<C: PeripheralConnector + 'static> {
    inner: Arc<Shared<C>>,
}

impl<C: PeripheralConnector + 'static> Clone for PrinterLink<C> {
    fn clone(&self) -> Self {
        PrinterLink { inner: self.inner.clone() }
    }
}

impl<C: PeripheralConnector + 'static> PrinterLink<C> {
    pub fn new(connector: C) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<Shared<C>>| {
            let callbacks: Weak<dyn ConnectorCallbacks> = weak.clone();
            Mutex::new(ConnectionStateMachine::new(connector, callbacks))
        });

        PrinterLink { inner }
    }

    pub fn connect(&self, peripheral_id: &str) -> Result<u64, LinkError> {
        lock(&self.inner).connect(peripheral_id)
    }

    pub fn disconnect(&self) {
        lock(&self.inner).disconnect();
    }

    pub fn current_state(&self) -> ConnectState {
        lock(&self.inner).current_state()
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.inner).is_connected()
    }

    pub fn peripheral_id(&self) -> Option<String> {
        lock(&self.inner).peripheral_id().map(str::to_string)
    }

    /// Sequence of the current session, if there is one.
    pub fn session_sequence(&self) -> Option<u64> {
        lock(&self.inner).session().map(|session| session.sequence)
    }

    pub fn write(&self, data: &[u8]) -> Result<(), LinkError> {
        lock(&self.inner).write(data)
    }

    pub fn attach_sink<S: EventSink + 'static>(&self, sink: S) {
        lock(&self.inner).attach_sink(Box::new(sink));
    }

    pub fn detach_sink(&self) {
        lock(&self.inner).detach_sink();
    }

    pub fn has_sink(&self) -> bool {
        lock(&self.inner).has_sink()
    }

    pub fn set_state_listener<L: StateListener + 'static>(&self, listener: L) {
        lock(&self.inner).set_state_listener(Box::new(listener));
    }

    pub fn clear_state_listener(&self) {
        lock(&self.inner).clear_state_listener();
    }

    /// Ends the session and drops sink and listener. Reports still in flight from the
    /// connector are discarded.
    pub fn shutdown(&self) {
        debug!("Shutting down printer link");
        lock(&self.inner).shutdown();
    }

    pub fn on_connector_result(&self, sequence: u64, outcome: ConnectOutcome) {
        self.inner.connector_result(sequence, outcome);
    }

    pub fn on_data(&self, sequence: u64, data: Vec<u8>) {
        self.inner.connector_data(sequence, data);
    }

    pub fn on_connection_lost(&self, sequence: u64) {
        self.inner.connection_lost(sequence);
    }
}
