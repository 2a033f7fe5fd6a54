//! Hourbook error taxonomy.

use crate::types::UserId;

/// Every failure an Hourbook operation can report.
#[derive(Debug, thiserror::Error)]
pub enum HourbookError {
    /// A codec anchor or a user-supplied field could not be located or parsed.
    #[error("Failed to parse {field}: {reason}")]
    Parse { field: &'static str, reason: String },

    /// The sign-up roster contains an identity missing from the gardener registry.
    #[error("Unknown candidate: {0} is not a registered gardener")]
    UnknownCandidate(UserId),

    /// The target artifact was already processed or is being processed.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// No qualifying interaction arrived within the bound.
    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Platform API error: {0}")]
    ExternalApi(String),

    /// An event record that the codec could not round-trip.
    #[error("Invalid event: {0}")]
    InvalidRecord(String),

    #[error("No sign-ups: {0}")]
    NoSignups(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HourbookError {
    pub fn parse(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Parse {
            field,
            reason: reason.into(),
        }
    }

    /// The single line shown to the requester when an invocation fails.
    pub fn user_message(&self) -> String {
        match self {
            Self::Parse { field, reason } => match *field {
                "category" | "name" | "time" | "hours" => format!(
                    "Failed to parse the event {field}, please check the message and try again"
                ),
                _ => format!("Invalid {field}: {reason}"),
            },
            Self::UnknownCandidate(id) => {
                format!("<@{id}> signed up but is not a registered gardener, roll aborted")
            }
            Self::Conflict(msg) => msg.clone(),
            Self::Timeout(what) => format!("{what} timed out."),
            Self::Persistence(_) => "Failed to save to the database, please try again".into(),
            Self::ExternalApi(_) => "Something wrong has happened, please try again".into(),
            Self::InvalidRecord(msg) => format!("Invalid event: {msg}"),
            Self::NoSignups(msg) => msg.clone(),
            Self::Config(_) | Self::Io(_) => "Something wrong has happened, please try again".into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HourbookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_names_field() {
        let err = HourbookError::parse("time", "anchor missing");
        assert_eq!(err.to_string(), "Failed to parse time: anchor missing");
        assert!(err.user_message().contains("time"));
    }

    #[test]
    fn test_parse_message_mentions_event_only_for_anchors() {
        let anchor = HourbookError::parse("hours", "not a number");
        assert_eq!(
            anchor.user_message(),
            "Failed to parse the event hours, please check the message and try again"
        );

        let option = HourbookError::parse("end_date", "the end of the report must be after its start");
        assert_eq!(
            option.user_message(),
            "Invalid end_date: the end of the report must be after its start"
        );
        assert!(!HourbookError::parse("options", "nothing to change")
            .user_message()
            .contains("event"));
    }

    #[test]
    fn test_conflict_message_passthrough() {
        let err = HourbookError::Conflict("This message has been processed for signups".into());
        assert_eq!(err.user_message(), "This message has been processed for signups");
    }

    #[test]
    fn test_unknown_candidate_mentions_user() {
        let err = HourbookError::UnknownCandidate(UserId(42));
        assert!(err.user_message().contains("<@42>"));
    }
}
