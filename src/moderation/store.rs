// Persistence seams for the moderation core
//
// Stores are async traits so the service can run over the in-memory backend
// or PostgreSQL without knowing which.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ModerationResult;
use crate::moderation::{
    Ban, DecisionOutcome, NewBan, NewReport, Report, ReportStatus, ReportTransition, Review,
};

/// Whether a reporter may file another report while one is still pending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateReportPolicy {
    /// Every submission creates a new report
    #[default]
    Allow,
    /// At most one pending report per (reporter, movie, review author)
    RejectPending,
}

impl DuplicateReportPolicy {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "allow" => Ok(DuplicateReportPolicy::Allow),
            "reject_pending" => Ok(DuplicateReportPolicy::RejectPending),
            _ => Err(format!("Invalid duplicate report policy: {}", s)),
        }
    }
}

/// Storage for reports
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Persist a new pending report with a freshly assigned id
    ///
    /// Fails with `DuplicateReport` only under `DuplicateReportPolicy::RejectPending`.
    async fn create(
        &self,
        new_report: NewReport,
        policy: DuplicateReportPolicy,
    ) -> ModerationResult<Report>;

    /// Move a pending report to confirmed or rejected
    ///
    /// Fails with `NotFound` for unknown ids and `AlreadyHandled` when the
    /// report is no longer pending. Any ban option is dropped and
    /// `ban_duration_seconds` stays null; only `ModerationStore::decide`
    /// issues bans.
    async fn transition(
        &self,
        report_id: i64,
        transition: ReportTransition,
    ) -> ModerationResult<Report>;

    async fn get(&self, report_id: i64) -> ModerationResult<Report>;

    /// Pending reports, oldest first
    async fn list_pending(&self) -> ModerationResult<Vec<Report>>;

    async fn list_all(&self, status: Option<ReportStatus>) -> ModerationResult<Vec<Report>>;

    /// Every report filed against one review, any status
    async fn list_for_review(
        &self,
        movie_title: &str,
        review_user: &str,
    ) -> ModerationResult<Vec<Report>>;

    /// Number of confirmed reports against reviews written by `user`
    async fn count_confirmed_against(&self, user: &str) -> ModerationResult<i64>;
}

/// Storage for bans
#[async_trait]
pub trait BanStore: Send + Sync {
    /// Record a ban; duration and expiry come from the ban option
    async fn issue(&self, new_ban: NewBan) -> ModerationResult<Ban>;

    async fn list_by_user(&self, user_name: Option<&str>) -> ModerationResult<Vec<Ban>>;

    /// True iff any ban for `user_name` ends after `now`
    async fn is_currently_banned(&self, user_name: &str, now: DateTime<Utc>)
        -> ModerationResult<bool>;

    /// The unexpired ban with the latest `banned_until`, if any
    async fn active_ban(
        &self,
        user_name: &str,
        now: DateTime<Utc>,
    ) -> ModerationResult<Option<Ban>>;
}

/// Report and ban storage that can commit a decision as one unit
#[async_trait]
pub trait ModerationStore: ReportStore + BanStore {
    /// Transition the report and, on confirm with a ban option, issue the ban
    ///
    /// Either both effects are visible afterwards or neither is.
    async fn decide(
        &self,
        report_id: i64,
        transition: ReportTransition,
    ) -> ModerationResult<DecisionOutcome>;
}

/// Source of live reviews
#[async_trait]
pub trait ReviewCatalog: Send + Sync {
    async fn find_review(
        &self,
        movie_title: &str,
        user: &str,
    ) -> ModerationResult<Option<Review>>;

    /// Add one to the review's report counter and return the updated review
    ///
    /// A blank counter counts as 0. Returns `None` if the review is gone.
    async fn record_report(
        &self,
        movie_title: &str,
        user: &str,
    ) -> ModerationResult<Option<Review>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parse() {
        assert_eq!(
            DuplicateReportPolicy::from_str("allow").unwrap(),
            DuplicateReportPolicy::Allow
        );
        assert_eq!(
            DuplicateReportPolicy::from_str("REJECT_PENDING").unwrap(),
            DuplicateReportPolicy::RejectPending
        );
        assert!(DuplicateReportPolicy::from_str("dedupe").is_err());
    }

    #[test]
    fn test_default_policy_allows_duplicates() {
        assert_eq!(DuplicateReportPolicy::default(), DuplicateReportPolicy::Allow);
    }
}
