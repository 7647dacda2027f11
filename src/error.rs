// Error handling module for the moderation core
// Provides the error taxonomy shared by stores, calculator and service

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use crate::moderation::ReportStatus;

/// Main error type for moderation operations
///
/// Every variant except `DatabaseError` is caused by invalid input or stale
/// state. None of them is retried by the core; callers refresh and resubmit.
#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    /// Referenced review or report does not exist
    #[error("{resource} with id {id} not found")]
    NotFound { resource: &'static str, id: String },

    /// Reporter is the author of the reported review
    #[error("Users cannot report their own review")]
    SelfReport,

    /// Missing or malformed reason type / reason text
    #[error("Invalid report reason: {0}")]
    InvalidReason(String),

    /// Report already left the pending state
    #[error("Report {report_id} was already {status}")]
    AlreadyHandled { report_id: i64, status: ReportStatus },

    /// Ban code outside the fixed 3d/7d/30d table
    #[error("Invalid ban option: {0}")]
    InvalidBanOption(String),

    /// A pending report by the same reporter already targets this review
    #[error("A pending report for this review already exists")]
    DuplicateReport,

    /// User is under an active ban
    #[error("User {user} is banned until {until}")]
    Banned { user: String, until: DateTime<Utc> },

    /// Persistence layer failure
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl ModerationError {
    /// Machine-readable code for the calling layer
    pub fn error_code(&self) -> &'static str {
        match self {
            ModerationError::NotFound { .. } => "NOT_FOUND",
            ModerationError::SelfReport => "SELF_REPORT",
            ModerationError::InvalidReason(_) => "INVALID_REASON",
            ModerationError::AlreadyHandled { .. } => "ALREADY_HANDLED",
            ModerationError::InvalidBanOption(_) => "INVALID_BAN_OPTION",
            ModerationError::DuplicateReport => "DUPLICATE_REPORT",
            ModerationError::Banned { .. } => "BANNED",
            ModerationError::DatabaseError(_) => "DATABASE_ERROR",
        }
    }

    /// Log the error at a level matching its severity
    ///
    /// - error!: persistence failures
    /// - warn!: rejected actions worth auditing (self reports, stale decisions, banned users)
    /// - debug!: ordinary input mistakes
    pub fn log(&self) {
        match self {
            ModerationError::DatabaseError(e) => error!("Database error: {:?}", e),
            ModerationError::SelfReport
            | ModerationError::AlreadyHandled { .. }
            | ModerationError::Banned { .. }
            | ModerationError::DuplicateReport => warn!("Moderation request rejected: {}", self),
            _ => debug!("Moderation request rejected: {}", self),
        }
    }

    pub(crate) fn report_not_found(report_id: i64) -> Self {
        ModerationError::NotFound {
            resource: "Report",
            id: report_id.to_string(),
        }
    }

    pub(crate) fn review_not_found(movie_title: &str, review_user: &str) -> Self {
        ModerationError::NotFound {
            resource: "Review",
            id: format!("{}/{}", movie_title, review_user),
        }
    }
}

/// Convert validator errors into an invalid reason
impl From<validator::ValidationErrors> for ModerationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ModerationError::InvalidReason(errors.to_string())
    }
}

/// Result alias used across the crate
pub type ModerationResult<T> = Result<T, ModerationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(ModerationError::SelfReport.error_code(), "SELF_REPORT");
        assert_eq!(
            ModerationError::InvalidBanOption("14d".to_string()).error_code(),
            "INVALID_BAN_OPTION"
        );
        assert_eq!(
            ModerationError::report_not_found(7).error_code(),
            "NOT_FOUND"
        );
        assert_eq!(
            ModerationError::AlreadyHandled {
                report_id: 1,
                status: ReportStatus::Confirmed
            }
            .error_code(),
            "ALREADY_HANDLED"
        );
    }

    #[test]
    fn test_not_found_messages() {
        assert_eq!(
            ModerationError::report_not_found(42).to_string(),
            "Report with id 42 not found"
        );
        assert_eq!(
            ModerationError::review_not_found("Inception", "alice").to_string(),
            "Review with id Inception/alice not found"
        );
    }

    #[test]
    fn test_already_handled_message_names_status() {
        let err = ModerationError::AlreadyHandled {
            report_id: 3,
            status: ReportStatus::Rejected,
        };
        assert_eq!(err.to_string(), "Report 3 was already rejected");
    }
}
