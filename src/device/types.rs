use std::fmt;
use serde::{Deserialize, Serialize};

/// Canonical connection state of the managed printer.
///
/// The numeric codes follow the native printer SDK (`0` = disconnected ... `4` = failed),
/// so connectors that receive raw codes can map them with `ConnectState::from_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Timeout,
    Failed,
}

impl ConnectState {
    pub fn code(&self) -> u8 {
        match self {
            ConnectState::Disconnected => 0,
            ConnectState::Connecting => 1,
            ConnectState::Connected => 2,
            ConnectState::Timeout => 3,
            ConnectState::Failed => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<ConnectState> {
        match code {
            0 => Some(ConnectState::Disconnected),
            1 => Some(ConnectState::Connecting),
            2 => Some(ConnectState::Connected),
            3 => Some(ConnectState::Timeout),
            4 => Some(ConnectState::Failed),
            _ => None,
        }
    }

    /// `Timeout` and `Failed` end a session; only a new `connect()` leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectState::Timeout | ConnectState::Failed)
    }
}

impl fmt::Display for ConnectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = match self {
            ConnectState::Disconnected => "Disconnected",
            ConnectState::Connecting => "Connecting",
            ConnectState::Connected => "Connected",
            ConnectState::Timeout => "Timeout",
            ConnectState::Failed => "Failed",
        };

        write!(f, "{}", result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    ConnectorUnavailable,
    PermissionDenied,
    PeripheralNotFound,
    ConnectionFailed,
    WriteFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = match self {
            ErrorKind::ConnectorUnavailable => "connector unavailable",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::PeripheralNotFound => "peripheral not found",
            ErrorKind::ConnectionFailed => "connection failed",
            ErrorKind::WriteFailed => "write failed",
        };

        write!(f, "{}", result)
    }
}

/// One occurrence delivered to the attached sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Event {
    StateChanged { state: ConnectState },
    DataReceived { data: Vec<u8> },
    Error { kind: ErrorKind, message: String },
}

impl Event {
    pub fn state_changed(state: ConnectState) -> Self {
        Event::StateChanged { state }
    }

    pub fn data_received(data: Vec<u8>) -> Self {
        Event::DataReceived { data }
    }

    pub fn error<M: Into<String>>(kind: ErrorKind, message: M) -> Self {
        Event::Error { kind, message: message.into() }
    }
}

/// How a connector resolved a connect request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Success,
    Timeout,
    Failure { kind: ErrorKind, reason: String },
}

impl ConnectOutcome {
    pub fn failure<R: Into<String>>(kind: ErrorKind, reason: R) -> Self {
        ConnectOutcome::Failure { kind, reason: reason.into() }
    }
}

/// A connect request handed to the connector, tagged with the session it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub sequence: u64,
    pub peripheral_id: String,
}
