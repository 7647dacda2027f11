use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ModerationError;

/// Report status enum representing the lifecycle of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl ReportStatus {
    /// Convert status to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Confirmed => "confirmed",
            ReportStatus::Rejected => "rejected",
        }
    }

    /// Parse status from string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(ReportStatus::Pending),
            "confirmed" => Ok(ReportStatus::Confirmed),
            "rejected" => Ok(ReportStatus::Rejected),
            _ => Err(format!("Invalid report status: {}", s)),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReportStatus::Pending)
    }
}

impl Default for ReportStatus {
    fn default() -> Self {
        ReportStatus::Pending
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a review was reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReasonType {
    Spam,
    Abusive,
    Inappropriate,
    Other,
}

impl ReasonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonType::Spam => "spam",
            ReasonType::Abusive => "abusive",
            ReasonType::Inappropriate => "inappropriate",
            ReasonType::Other => "other",
        }
    }

    /// Parse a reason type; empty or unknown input is an invalid reason
    pub fn parse(s: &str) -> Result<Self, ModerationError> {
        match s.trim().to_lowercase().as_str() {
            "" => Err(ModerationError::InvalidReason(
                "reasonType is required".to_string(),
            )),
            "spam" => Ok(ReasonType::Spam),
            "abusive" => Ok(ReasonType::Abusive),
            "inappropriate" => Ok(ReasonType::Inappropriate),
            "other" => Ok(ReasonType::Other),
            other => Err(ModerationError::InvalidReason(format!(
                "Unknown reasonType: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ReasonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fixed ban durations an admin may choose when confirming a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
pub enum BanOption {
    #[serde(rename = "3d")]
    #[sqlx(rename = "3d")]
    ThreeDays,
    #[serde(rename = "7d")]
    #[sqlx(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    #[sqlx(rename = "30d")]
    ThirtyDays,
}

impl BanOption {
    pub const ALL: [BanOption; 3] = [
        BanOption::ThreeDays,
        BanOption::SevenDays,
        BanOption::ThirtyDays,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BanOption::ThreeDays => "3d",
            BanOption::SevenDays => "7d",
            BanOption::ThirtyDays => "30d",
        }
    }

    /// Parse a ban code; codes are exact ("3d", "7d", "30d")
    pub fn parse(code: &str) -> Result<Self, ModerationError> {
        match code {
            "3d" => Ok(BanOption::ThreeDays),
            "7d" => Ok(BanOption::SevenDays),
            "30d" => Ok(BanOption::ThirtyDays),
            other => Err(ModerationError::InvalidBanOption(other.to_string())),
        }
    }
}

impl std::fmt::Display for BanOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Admin decision on a pending report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportAction {
    Confirm,
    Reject,
}

impl ReportAction {
    /// Status a pending report moves to under this action
    pub fn target_status(&self) -> ReportStatus {
        match self {
            ReportAction::Confirm => ReportStatus::Confirmed,
            ReportAction::Reject => ReportStatus::Rejected,
        }
    }
}

/// Live review record supplied by the catalog
///
/// Numeric fields are optional because the source data may leave them blank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub movie_title: String,
    #[sqlx(rename = "user_name")]
    pub user: String,
    pub rating: Option<f64>,
    pub useful_votes: Option<i64>,
    pub total_votes: Option<i64>,
    pub title: String,
    pub body: String,
    pub report_count: Option<i64>,
}

/// Copy of a review taken when it was reported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSnapshot {
    pub movie_title: String,
    pub user: String,
    pub rating: Option<f64>,
    pub title: String,
    pub body: String,
    pub useful_votes: i64,
    pub total_votes: i64,
    pub report_count: i64,
}

/// A user's flag on another user's review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub report_id: i64,
    pub review: ReviewSnapshot,
    pub reported_by: String,
    pub status: ReportStatus,
    pub date_reported: DateTime<Utc>,
    pub reason_type: ReasonType,
    pub reason: Option<String>,
    pub handled_by_admin: Option<String>,
    pub handled_at: Option<DateTime<Utc>>,
    pub ban_duration_seconds: Option<i64>,
}

/// A time-boxed restriction issued by a confirmed report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Ban {
    pub ban_id: i64,
    pub user_name: String,
    pub reported_by: String,
    pub report_id: i64,
    pub movie_title: String,
    pub review_user: String,
    pub reason_type: ReasonType,
    pub reason: Option<String>,
    pub ban_option: BanOption,
    pub ban_duration_seconds: i64,
    pub banned_at: DateTime<Utc>,
    pub banned_until: DateTime<Utc>,
}

impl Ban {
    /// A ban is active while `now` is strictly before `banned_until`
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.banned_until > now
    }
}

/// Input for creating a report, already validated by the service
#[derive(Debug, Clone)]
pub struct NewReport {
    pub review: ReviewSnapshot,
    pub reported_by: String,
    pub reason_type: ReasonType,
    pub reason: Option<String>,
    pub date_reported: DateTime<Utc>,
}

/// Input for issuing a ban
#[derive(Debug, Clone)]
pub struct NewBan {
    pub user_name: String,
    pub reported_by: String,
    pub report_id: i64,
    pub movie_title: String,
    pub review_user: String,
    pub reason_type: ReasonType,
    pub reason: Option<String>,
    pub ban_option: BanOption,
    pub banned_at: DateTime<Utc>,
}

impl NewBan {
    /// Ban the author of a report's snapshotted review
    pub fn for_report(report: &Report, ban_option: BanOption, banned_at: DateTime<Utc>) -> Self {
        Self {
            user_name: report.review.user.clone(),
            reported_by: report.reported_by.clone(),
            report_id: report.report_id,
            movie_title: report.review.movie_title.clone(),
            review_user: report.review.user.clone(),
            reason_type: report.reason_type,
            reason: report.reason.clone(),
            ban_option,
            banned_at,
        }
    }
}

/// Status change applied by an admin
#[derive(Debug, Clone)]
pub struct ReportTransition {
    pub action: ReportAction,
    pub admin_username: String,
    pub handled_at: DateTime<Utc>,
    pub ban_option: Option<BanOption>,
}

/// Request DTO for reporting a review
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReportRequest {
    #[validate(length(min = 1, message = "reasonType is required"))]
    pub reason_type: String,
    #[validate(length(max = 1000, message = "Reason must not exceed 1000 characters"))]
    pub reason: Option<String>,
}

/// Request DTO for deciding a report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub action: ReportAction,
    pub ban_option: Option<String>,
}

impl DecisionRequest {
    pub fn reject() -> Self {
        Self {
            action: ReportAction::Reject,
            ban_option: None,
        }
    }

    pub fn confirm(ban_option: Option<&str>) -> Self {
        Self {
            action: ReportAction::Confirm,
            ban_option: ban_option.map(str::to_string),
        }
    }
}

/// Result of an admin decision
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionOutcome {
    pub report: Report,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ban: Option<Ban>,
}
