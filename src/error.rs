//! Failure taxonomy for calls against the remote collaborators.

use thiserror::Error;

/// Network-level failures that point at a bad proxy or a blocked address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    ConnectionReset,
    TunnelFailure,
    Forbidden,
    HangUp,
    Refused,
}

impl TransportKind {
    /// Classify a transport failure from the message/code the client surfaced.
    pub fn classify(message: &str, code: Option<&str>) -> Option<Self> {
        if code == Some("ECONNRESET") || message.contains("ECONNRESET") {
            Some(TransportKind::ConnectionReset)
        } else if code == Some("ECONNREFUSED") || message.contains("ECONNREFUSED") {
            Some(TransportKind::Refused)
        } else if message.contains("tunneling socket could not be established") {
            Some(TransportKind::TunnelFailure)
        } else if message.contains("Status code 403")
            || message.contains("Unexpected response received from PTC login")
        {
            Some(TransportKind::Forbidden)
        } else if message.contains("socket hang up") {
            Some(TransportKind::HangUp)
        } else {
            None
        }
    }

    /// Classify a local socket error.
    pub fn from_io(err: &std::io::Error) -> Option<Self> {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
                Some(TransportKind::ConnectionReset)
            }
            ErrorKind::ConnectionRefused => Some(TransportKind::Refused),
            ErrorKind::BrokenPipe | ErrorKind::UnexpectedEof => Some(TransportKind::HangUp),
            ErrorKind::PermissionDenied => Some(TransportKind::Forbidden),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransportKind::ConnectionReset => "connection reset",
            TransportKind::TunnelFailure => "tunnel failure",
            TransportKind::Forbidden => "forbidden",
            TransportKind::HangUp => "socket hang up",
            TransportKind::Refused => "connection refused",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TransportFailure {
    pub kind: TransportKind,
    pub message: String,
}

/// Error returned by any remote game call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("challenge required: {url}")]
    ChallengeRequired { url: String },

    #[error("transport failure ({0})")]
    Transport(TransportFailure),

    #[error("{0}")]
    Unclassified(String),
}

impl RemoteError {
    /// Build from a raw client failure, classifying transport problems.
    pub fn from_message(message: impl Into<String>, code: Option<&str>) -> Self {
        let message = message.into();
        match TransportKind::classify(&message, code) {
            Some(kind) => RemoteError::Transport(TransportFailure { kind, message }),
            None => RemoteError::Unclassified(message),
        }
    }

    pub fn from_io(err: &std::io::Error) -> Self {
        match TransportKind::from_io(err) {
            Some(kind) => RemoteError::Transport(TransportFailure {
                kind,
                message: err.to_string(),
            }),
            None => RemoteError::from_message(err.to_string(), None),
        }
    }
}

/// Route or elevation lookup failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("no route found: {0}")]
    NoRoute(String),

    #[error("mapping service unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_transport_messages() {
        let cases = [
            ("read ECONNRESET", None, TransportKind::ConnectionReset),
            ("boom", Some("ECONNRESET"), TransportKind::ConnectionReset),
            (
                "tunneling socket could not be established, cause=x",
                None,
                TransportKind::TunnelFailure,
            ),
            ("Status code 403 received", None, TransportKind::Forbidden),
            (
                "Unexpected response received from PTC login",
                None,
                TransportKind::Forbidden,
            ),
            ("socket hang up", None, TransportKind::HangUp),
            ("connect ECONNREFUSED 1.2.3.4:80", None, TransportKind::Refused),
        ];
        for (msg, code, expected) in cases {
            assert_eq!(TransportKind::classify(msg, code), Some(expected), "{msg}");
        }
    }

    #[test]
    fn unknown_messages_stay_unclassified() {
        let err = RemoteError::from_message("invalid protobuf", None);
        assert_eq!(err, RemoteError::Unclassified("invalid protobuf".into()));
    }

    #[test]
    fn io_errors_map_to_transport_kinds() {
        let err = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        assert!(matches!(
            RemoteError::from_io(&err),
            RemoteError::Transport(TransportFailure {
                kind: TransportKind::Refused,
                ..
            })
        ));
    }
}
