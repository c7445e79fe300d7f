//! Error types for the Album of the Week scheduler.

/// Top-level error type.
///
/// Configuration problems (`InvalidDayName`, `EmptyGroup`,
/// `DuplicateParticipant`, `Config`) are fatal for an invocation. The
/// collaborator errors are caught at a resolution stage boundary.
#[derive(Debug, thiserror::Error)]
pub enum AotwError {
    /// A weekday name that is not one of Monday..Sunday.
    #[error("invalid day name: {0:?} (expected e.g. 'Monday', 'Tuesday')")]
    InvalidDayName(String),

    /// A group with no participants.
    #[error("group has no participants")]
    EmptyGroup,

    /// Two participants share a contact address.
    #[error("duplicate participant address: {0}")]
    DuplicateParticipant(String),

    /// Configuration error (missing or malformed setting).
    #[error("config error: {0}")]
    Config(String),

    /// Submission source could not be read.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Notification could not be delivered.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Playlist update failed.
    #[error("sync error: {0}")]
    Sync(String),

    /// Album could not be found by the playlist service.
    #[error("not found: {0}")]
    NotFound(String),

    /// Artifact persistence error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Another invocation holds the period lock.
    #[error("period {0} is locked by another run")]
    Busy(u32),

    /// Malformed submission data.
    #[error("parse error: {0}")]
    Parse(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AotwError {
    /// Returns `true` for errors that must fail an invocation immediately.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::InvalidDayName(_)
                | Self::EmptyGroup
                | Self::DuplicateParticipant(_)
                | Self::Config(_)
        )
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AotwError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_are_classified_fatal() {
        assert!(AotwError::InvalidDayName("Funday".to_owned()).is_config());
        assert!(AotwError::EmptyGroup.is_config());
        assert!(AotwError::Config("missing".to_owned()).is_config());
        assert!(!AotwError::Sync("boom".to_owned()).is_config());
        assert!(!AotwError::Busy(3).is_config());
    }

    #[test]
    fn display_includes_detail() {
        let err = AotwError::InvalidDayName("Funday".to_owned());
        assert!(err.to_string().contains("Funday"));
        assert_eq!(AotwError::Busy(7).to_string(), "period 7 is locked by another run");
    }
}
