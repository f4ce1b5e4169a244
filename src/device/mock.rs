//! In-memory connector for tests and development.
//!
//! `MockConnector` records every request it receives. The paired
//! `MockConnectorHandle` plays the radio side: it resolves connect requests,
//! delivers printer data and drops connections, through the reporter of the
//! session each call names.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::device::connector::{PeripheralConnector, SessionReporter};
use crate::device::types::{ConnectOutcome, ConnectRequest, ErrorKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorCall {
    Connect(ConnectRequest),
    Disconnect,
    Write { sequence: u64, data: Vec<u8> },
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<ConnectorCall>,
    reporters: HashMap<u64, SessionReporter>,
}

fn lock(shared: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
pub struct MockConnector {
    shared: Arc<Mutex<MockState>>,
}

impl MockConnector {
    pub fn new() -> (Self, MockConnectorHandle) {
        let shared = Arc::new(Mutex::new(MockState::default()));
        let connector = MockConnector { shared: shared.clone() };
        (connector, MockConnectorHandle { shared })
    }
}

impl PeripheralConnector for MockConnector {
    fn connect(&mut self, request: ConnectRequest, reporter: SessionReporter) {
        let mut state = lock(&self.shared);
        state.reporters.insert(request.sequence, reporter);
        state.calls.push(ConnectorCall::Connect(request));
    }

    fn disconnect(&mut self) {
        lock(&self.shared).calls.push(ConnectorCall::Disconnect);
    }

    fn write(&mut self, sequence: u64, data: Vec<u8>) {
        lock(&self.shared).calls.push(ConnectorCall::Write { sequence, data });
    }
}

/// Radio side of a `MockConnector`. Every method returns `false` when no connect
/// request was ever issued for `sequence`.
#[derive(Debug, Clone)]
pub struct MockConnectorHandle {
    shared: Arc<Mutex<MockState>>,
}

impl MockConnectorHandle {
    pub fn calls(&self) -> Vec<ConnectorCall> {
        lock(&self.shared).calls.clone()
    }

    pub fn connect_requests(&self) -> Vec<ConnectRequest> {
        lock(&self.shared).calls.iter().filter_map(|call| match call {
            ConnectorCall::Connect(request) => Some(request.clone()),
            _ => None,
        }).collect()
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        lock(&self.shared).calls.iter().filter_map(|call| match call {
            ConnectorCall::Write { data, .. } => Some(data.clone()),
            _ => None,
        }).collect()
    }

    // the reporter is cloned out so the link is never called with our lock held
    fn reporter(&self, sequence: u64) -> Option<SessionReporter> {
        lock(&self.shared).reporters.get(&sequence).cloned()
    }

    pub fn resolve(&self, sequence: u64, outcome: ConnectOutcome) -> bool {
        match self.reporter(sequence) {
            Some(reporter) => {
                reporter.resolve(outcome);
                true
            },
            None => false,
        }
    }

    pub fn receive(&self, sequence: u64, data: &[u8]) -> bool {
        match self.reporter(sequence) {
            Some(reporter) => {
                reporter.data(data.to_vec());
                true
            },
            None => false,
        }
    }

    pub fn drop_connection(&self, sequence: u64) -> bool {
        match self.reporter(sequence) {
            Some(reporter) => {
                reporter.connection_lost();
                true
            },
            None => false,
        }
    }

    pub fn report_error(&self, sequence: u64, kind: ErrorKind, message: &str) -> bool {
        match self.reporter(sequence) {
            Some(reporter) => {
                reporter.error(kind, message);
                true
            },
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_calls_in_order() {
        let (mut connector, handle) = MockConnector::new();
        let request = ConnectRequest { sequence: 3, peripheral_id: "AA:BB".to_string() };

        connector.connect(request.clone(), SessionReporter::detached(3));
        connector.write(3, vec![0x1b, 0x40]);
        connector.disconnect();

        assert_eq!(handle.calls(), vec![
            ConnectorCall::Connect(request.clone()),
            ConnectorCall::Write { sequence: 3, data: vec![0x1b, 0x40] },
            ConnectorCall::Disconnect,
        ]);
        assert_eq!(handle.connect_requests(), vec![request]);
        assert_eq!(handle.writes(), vec![vec![0x1b, 0x40]]);
    }

    #[test]
    fn unknown_sessions_cannot_be_resolved() {
        let (mut connector, handle) = MockConnector::new();
        connector.connect(
            ConnectRequest { sequence: 1, peripheral_id: "AA:BB".to_string() },
            SessionReporter::detached(1),
        );

        assert!(handle.resolve(1, ConnectOutcome::Success));
        assert!(!handle.resolve(2, ConnectOutcome::Success));
        assert!(!handle.drop_connection(2));
    }
}
