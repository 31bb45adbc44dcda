//! Grid error taxonomy
//!
//! Nothing in the engine is allowed to take the console down: every error is
//! either swallowed with a user notification or structurally unreachable once
//! startup registration has run.

use std::fmt;

/// Errors produced by the table engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    /// Registry lookup miss. Programmer error: every kind a page can mount
    /// is registered at startup.
    UnknownType(String),

    /// A kind was registered twice. Caught at startup, before any grid mounts.
    AlreadyRegistered(String),

    /// The query protocol answered with an `error` field. Recovered locally:
    /// the grid renders an empty page and the user is notified.
    ServerFilter(String),

    /// A bulk endpoint returned a non-success response. The grid is left in
    /// its pre-operation state.
    BulkOperation(String),

    /// HTTP or deserialization failure below the protocol layer. Same
    /// recovery as `ServerFilter`.
    Transport(String),
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::UnknownType(kind) => write!(f, "unknown table type '{}'", kind),
            GridError::AlreadyRegistered(kind) => {
                write!(f, "table type '{}' is already registered", kind)
            }
            GridError::ServerFilter(message) => write!(f, "{}", message),
            GridError::BulkOperation(message) => write!(f, "bulk operation failed: {}", message),
            GridError::Transport(message) => write!(f, "request failed: {}", message),
        }
    }
}

impl std::error::Error for GridError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_unknown_type() {
        let error = GridError::UnknownType("widget".to_string());
        assert_eq!(error.to_string(), "unknown table type 'widget'");
    }

    #[test]
    fn test_server_filter_message_passes_through() {
        let error = GridError::ServerFilter("Invalid regular expression".to_string());
        assert_eq!(error.to_string(), "Invalid regular expression");
    }
}
