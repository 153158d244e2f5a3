use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the conversation, backends, dictation and document list.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("reply generation failed: {0}")]
    ReplyFailed(String),

    #[error("no reply within {}s", .0.as_secs())]
    ReplyTimeout(Duration),

    #[error("a reply is already pending")]
    ReplyPending,

    #[error("cannot upload {name}: {mime} is not a PDF")]
    UploadRejected { name: String, mime: String },

    #[error("{0} is not available")]
    CapabilityUnavailable(String),

    #[error("dictation error: {0}")]
    Dictation(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ChatError {
    /// Whether the shell should show this as an error rather than a hint.
    pub fn is_user_facing_failure(&self) -> bool {
        !matches!(self, ChatError::CapabilityUnavailable(_) | ChatError::ReplyPending)
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_shows_seconds() {
        let err = ChatError::ReplyTimeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "no reply within 30s");
    }

    #[test]
    fn test_upload_rejected_message() {
        let err = ChatError::UploadRejected {
            name: "notes.txt".to_string(),
            mime: "text/plain".to_string(),
        };
        assert_eq!(err.to_string(), "cannot upload notes.txt: text/plain is not a PDF");
        assert!(err.is_user_facing_failure());
    }

    #[test]
    fn test_capability_unavailable_is_a_hint() {
        let err = ChatError::CapabilityUnavailable("Dictation".to_string());
        assert!(!err.is_user_facing_failure());
    }
}
