use std::sync::Weak;
use log::{debug, info, warn};

use crate::device::bridge::{EventBridge, EventSink};
use crate::device::connector::{ConnectorCallbacks, PeripheralConnector, SessionReporter};
use crate::device::types::{ConnectOutcome, ConnectRequest, ConnectState, ErrorKind, Event};
use crate::error::LinkError;

/// Receives every state transition, before it is emitted on the event stream.
pub trait StateListener: Send {
    fn on_state_change(&mut self, state: ConnectState);
}

impl<F> StateListener for F
where
    F: FnMut(ConnectState) + Send,
{
    fn on_state_change(&mut self, state: ConnectState) {
        self(state)
    }
}

/// One connect attempt to one printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSession {
    pub peripheral_id: String,
    pub state: ConnectState,
    pub sequence: u64,
}

/// Owns the connection state of the managed printer.
///
/// Connector reports carry the sequence of the session they were issued for; any
/// report for a session other than the current one is stale and discarded.
pub struct ConnectionStateMachine<C: PeripheralConnector> {
    connector: C,
    callbacks: Weak<dyn ConnectorCallbacks>,
    session: Option<ConnectionSession>,
    last_sequence: u64,
    listener: Option<Box<dyn StateListener>>,
    bridge: EventBridge,
}

impl<C: PeripheralConnector> ConnectionStateMachine<C> {
    pub fn new(connector: C, callbacks: Weak<dyn ConnectorCallbacks>) -> Self {
        ConnectionStateMachine {
            connector,
            callbacks,
            session: None,
            last_sequence: 0,
            listener: None,
            bridge: EventBridge::new(),
        }
    }

    pub fn current_state(&self) -> ConnectState {
        match &self.session {
            Some(session) => session.state,
            None => ConnectState::Disconnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.current_state() == ConnectState::Connected
    }

    pub fn session(&self) -> Option<&ConnectionSession> {
        self.session.as_ref()
    }

    pub fn peripheral_id(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.peripheral_id.as_str())
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn set_state_listener(&mut self, listener: Box<dyn StateListener>) {
        self.listener = Some(listener);
    }

    pub fn clear_state_listener(&mut self) {
        self.listener = None;
    }

    pub fn attach_sink(&mut self, sink: Box<dyn EventSink>) {
        self.bridge.attach_sink(sink);
    }

    pub fn detach_sink(&mut self) {
        self.bridge.detach_sink();
    }

    pub fn has_sink(&self) -> bool {
        self.bridge.has_sink()
    }

    /// Starts a new session for `peripheral_id` and returns its sequence.
    ///
    /// `Connecting` is reported before this returns; the outcome arrives later through
    /// `on_connector_result`.
    pub fn connect(&mut self, peripheral_id: &str) -> Result<u64, LinkError> {
        if peripheral_id.is_empty() {
            return Err(LinkError::EmptyPeripheralId);
        }

        if let Some(previous) = self.session.take() {
            info!(
                "Session {} for {} ({}) superseded by new connect request",
                previous.sequence, previous.peripheral_id, previous.state,
            );
        }

        self.last_sequence += 1;
        let sequence = self.last_sequence;

        self.session = Some(ConnectionSession {
            peripheral_id: peripheral_id.to_string(),
            state: ConnectState::Connecting,
            sequence,
        });
        info!("Connecting to printer {} (session {})", peripheral_id, sequence);
        self.notify(ConnectState::Connecting);

        let request = ConnectRequest { sequence, peripheral_id: peripheral_id.to_string() };
        let reporter = SessionReporter::new(sequence, self.callbacks.clone());
        self.connector.connect(request, reporter);

        Ok(sequence)
    }

    pub fn disconnect(&mut self) {
        let session = match self.session.take() {
            Some(session) => session,
            None => {
                debug!("Disconnect requested without an active session");
                return;
            },
        };

        info!("Disconnecting from printer {} (session {})", session.peripheral_id, session.sequence);
        self.connector.disconnect();
        self.notify(ConnectState::Disconnected);
    }

    pub fn on_connector_result(&mut self, sequence: u64, outcome: ConnectOutcome) {
        let session = match self.active_session(sequence) {
            Some(session) => session,
            None => return,
        };

        if session.state != ConnectState::Connecting {
            debug!("Ignoring connect result {:?} for session {} in state {}", outcome, sequence, session.state);
            return;
        }

        match outcome {
            ConnectOutcome::Success => {
                info!("Printer {} connected", session.peripheral_id);
                session.state = ConnectState::Connected;
                self.notify(ConnectState::Connected);
            },
            ConnectOutcome::Timeout => {
                warn!("Connecting to printer {} timed out", session.peripheral_id);
                session.state = ConnectState::Timeout;
                self.notify(ConnectState::Timeout);
            },
            ConnectOutcome::Failure { kind, reason } => {
                warn!("Connecting to printer {} failed ({}): {}", session.peripheral_id, kind, reason);
                session.state = ConnectState::Failed;
                self.notify(ConnectState::Failed);
                self.bridge.emit(Event::error(kind, reason));
            },
        }
    }

    pub fn on_data(&mut self, sequence: u64, data: Vec<u8>) {
        let session = match self.active_session(sequence) {
            Some(session) => session,
            None => return,
        };

        if session.state != ConnectState::Connected {
            debug!("Dropping {} bytes received in state {}", data.len(), session.state);
            return;
        }

        self.bridge.emit(Event::data_received(data));
    }

    /// The connector noticed the printer went away; same as a disconnect, minus
    /// asking the connector to disconnect.
    pub fn on_connection_lost(&mut self, sequence: u64) {
        let state = match self.active_session(sequence) {
            Some(session) => session.state,
            None => return,
        };

        if state != ConnectState::Connected {
            debug!("Ignoring connection loss of session {} in state {}", sequence, state);
            return;
        }

        warn!("Connection to printer lost (session {})", sequence);
        self.session = None;
        self.notify(ConnectState::Disconnected);
    }

    pub fn on_connector_error(&mut self, sequence: u64, kind: ErrorKind, message: String) {
        if self.active_session(sequence).is_none() {
            return;
        }

        warn!("Printer error ({}): {}", kind, message);
        self.bridge.emit(Event::error(kind, message));
    }

    /// Passes raw bytes to the connected printer.
    pub fn write(&mut self, data: &[u8]) -> Result<(), LinkError> {
        if data.is_empty() {
            return Err(LinkError::EmptyPayload);
        }

        let sequence = match &self.session {
            Some(session) if session.state == ConnectState::Connected => session.sequence,
            _ => return Err(LinkError::NotConnected),
        };

        debug!("Writing {} bytes to printer (session {})", data.len(), sequence);
        self.connector.write(sequence, data.to_vec());
        Ok(())
    }

    /// Teardown: ends the session and forgets the sink and the listener.
    pub fn shutdown(&mut self) {
        self.disconnect();
        self.bridge.detach_sink();
        self.listener = None;
    }

    fn active_session(&mut self, sequence: u64) -> Option<&mut ConnectionSession> {
        match self.session.as_mut() {
            Some(session) if session.sequence == sequence => Some(session),
            _ => {
                debug!("Discarding stale callback for session {}", sequence);
                None
            },
        }
    }

    fn notify(&mut self, state: ConnectState) {
        if let Some(listener) = self.listener.as_mut() {
            listener.on_state_change(state);
        }
        self.bridge.emit(Event::state_changed(state));
    }
}

impl<C: PeripheralConnector> Drop for ConnectionStateMachine<C> {
    fn drop(&mut self) {
        if self.session.is_some() {
            self.connector.disconnect();
        }
    }
}
