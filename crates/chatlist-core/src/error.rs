use crate::remote::StorePath;

/// Errors produced by the synchronization engine.
///
/// `MalformedRecord` and `NotFound` are absorbed where they occur; `Unavailable` and
/// `Transport` reach the listener.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("Malformed record at {path}: {reason}")]
    MalformedRecord { path: String, reason: String },
    #[error("Conversation not found: {partner_id}")]
    NotFound { partner_id: String },
    #[error("Network unavailable")]
    Unavailable,
    #[error("Transport error at {path}: {message}")]
    Transport { path: String, message: String },
    #[error("Sync engine is not running")]
    EngineClosed,
}

impl SyncError {
    pub fn malformed(path: &StorePath, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub fn transport(path: &StorePath, message: impl Into<String>) -> Self {
        Self::Transport {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let path = StorePath::parse("messages/m1");
        assert_eq!(
            SyncError::malformed(&path, "missing fromId").to_string(),
            "Malformed record at messages/m1: missing fromId"
        );
        assert_eq!(
            SyncError::transport(&path, "permission denied").to_string(),
            "Transport error at messages/m1: permission denied"
        );
        assert_eq!(SyncError::Unavailable.to_string(), "Network unavailable");
    }
}
