//! Connection state machine

use std::fmt;

use serde::{Deserialize, Serialize};

/// Connection state of a sync engine
///
/// ```text
/// Disconnected ──initialize──▶ Connecting ──ok──▶ Connected
///       ▲                          │                  │
///       │                        fail            channel lost
///    cleanup                       ▼                  │
///       └──────────────────────  Error ◀──────────────┘
///                                  │
///                           retry timer fires
///                                  ▼
///                              Connecting
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        }
    }

    /// Whether the engine may move from `self` to `next`
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (_, Disconnected) => true,
            (Disconnected | Error, Connecting) => true,
            (Connecting, Connected | Error) => true,
            (Connected, Error) => true,
            _ => false,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    #[test]
    fn test_happy_path_transitions() {
        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Connected));
        assert!(Connected.can_transition_to(Disconnected));
    }

    #[test]
    fn test_retry_transitions() {
        assert!(Connecting.can_transition_to(Error));
        assert!(Error.can_transition_to(Connecting));
        assert!(Connected.can_transition_to(Error));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!Disconnected.can_transition_to(Connected));
        assert!(!Error.can_transition_to(Connected));
        assert!(!Connected.can_transition_to(Connecting));
    }

    #[test]
    fn test_default_is_disconnected() {
        assert_eq!(ConnectionState::default(), Disconnected);
        assert_eq!(Connected.to_string(), "connected");
    }
}
