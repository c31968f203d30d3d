use std::fmt;

/// Logical gateway connection states, derived from the manager's status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Disconnected with no reconnection scheduled
    #[default]
    Idle,
    /// Disconnected, a reconnection attempt is scheduled or running
    Reconnecting { attempt: u32 },
    /// Gateway session is live
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Reconnecting { attempt } => write!(f, "RECONNECTING (attempt {})", attempt),
            Self::Connected => write!(f, "CONNECTED"),
        }
    }
}

impl ConnectionState {
    /// Convert state to numeric value for metrics
    pub fn as_metric(&self) -> f64 {
        match self {
            Self::Idle => 0.0,
            Self::Reconnecting { .. } => 1.0,
            Self::Connected => 2.0,
        }
    }
}
