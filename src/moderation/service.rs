use chrono::{DateTime, Utc};
use std::sync::Arc;
use validator::Validate;

use crate::error::{ModerationError, ModerationResult};
use crate::moderation::{
    Ban, BanOption, DecisionOutcome, DecisionRequest, DuplicateReportPolicy, ModerationStore,
    NewReport, ReasonType, Report, ReportAction, ReportStatus, ReportTransition, ReviewCatalog,
    ReviewSnapshot, SubmitReportRequest,
};

/// Service over runtime-selected backends
pub type DynModerationService = ModerationService<dyn ModerationStore, dyn ReviewCatalog>;

/// Service layer for moderation business logic
///
/// Caller identity is always passed in explicitly. Role checks (only admins
/// may decide reports) are the calling layer's job.
pub struct ModerationService<S: ?Sized, C: ?Sized> {
    store: Arc<S>,
    catalog: Arc<C>,
    duplicate_policy: DuplicateReportPolicy,
}

impl<S: ?Sized, C: ?Sized> Clone for ModerationService<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            catalog: Arc::clone(&self.catalog),
            duplicate_policy: self.duplicate_policy,
        }
    }
}

impl<S, C> ModerationService<S, C>
where
    S: ModerationStore + ?Sized,
    C: ReviewCatalog + ?Sized,
{
    /// Create a new ModerationService with the default duplicate policy
    pub fn new(store: Arc<S>, catalog: Arc<C>) -> Self {
        Self {
            store,
            catalog,
            duplicate_policy: DuplicateReportPolicy::default(),
        }
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicateReportPolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Report a review
    ///
    /// This method:
    /// 1. Validates the reason type and reason text
    /// 2. Looks up the live review
    /// 3. Refuses self reports
    /// 4. Bumps the review's report counter
    /// 5. Snapshots the updated review and stores a pending report
    pub async fn submit_report(
        &self,
        movie_title: &str,
        review_user: &str,
        reported_by: &str,
        request: SubmitReportRequest,
    ) -> ModerationResult<Report> {
        tracing::debug!(
            "{} reports review by {} on {}",
            reported_by,
            review_user,
            movie_title
        );

        let result = self
            .try_submit_report(movie_title, review_user, reported_by, request)
            .await;
        if let Err(ref e) = result {
            e.log();
        }
        result
    }

    async fn try_submit_report(
        &self,
        movie_title: &str,
        review_user: &str,
        reported_by: &str,
        request: SubmitReportRequest,
    ) -> ModerationResult<Report> {
        // 1. Validate request
        request.validate()?;
        let reason_type = ReasonType::parse(&request.reason_type)?;
        let reason = request.reason;
        let has_reason = reason.as_deref().map_or(false, |r| !r.trim().is_empty());
        if reason_type == ReasonType::Other && !has_reason {
            return Err(ModerationError::InvalidReason(
                "A reason is required when reasonType is other".to_string(),
            ));
        }

        // 2. Find the live review
        let review = self
            .catalog
            .find_review(movie_title, review_user)
            .await?
            .ok_or_else(|| ModerationError::review_not_found(movie_title, review_user))?;

        // 3. Reporters cannot flag their own review
        if review.user == reported_by {
            return Err(ModerationError::SelfReport);
        }

        // 4. Count the report against the review; the snapshot includes it
        let review = self
            .catalog
            .record_report(movie_title, review_user)
            .await?
            .ok_or_else(|| ModerationError::review_not_found(movie_title, review_user))?;
        let review = ReviewSnapshot::capture(&review);

        // 5. Persist
        let report = self
            .store
            .create(
                NewReport {
                    review,
                    reported_by: reported_by.to_string(),
                    reason_type,
                    reason,
                    date_reported: Utc::now(),
                },
                self.duplicate_policy,
            )
            .await?;

        tracing::info!(
            "Created report {} ({}) against {}/{}",
            report.report_id,
            report.reason_type,
            movie_title,
            review_user
        );
        Ok(report)
    }

    /// Confirm or reject a pending report
    ///
    /// The ban option is parsed before anything is written, so an unknown code
    /// leaves the report pending. The status change and the ban are committed
    /// together. A ban option sent with a rejection is checked but not used.
    pub async fn decide_report(
        &self,
        report_id: i64,
        admin_username: &str,
        request: DecisionRequest,
    ) -> ModerationResult<DecisionOutcome> {
        tracing::debug!(
            "{} decides report {}: {:?}",
            admin_username,
            report_id,
            request.action
        );

        let result = self
            .try_decide_report(report_id, admin_username, request)
            .await;
        if let Err(ref e) = result {
            e.log();
        }
        result
    }

    async fn try_decide_report(
        &self,
        report_id: i64,
        admin_username: &str,
        request: DecisionRequest,
    ) -> ModerationResult<DecisionOutcome> {
        let ban_option = request
            .ban_option
            .as_deref()
            .map(BanOption::parse)
            .transpose()?;

        let ban_option = match request.action {
            ReportAction::Confirm => ban_option,
            ReportAction::Reject => None,
        };

        let outcome = self
            .store
            .decide(
                report_id,
                ReportTransition {
                    action: request.action,
                    admin_username: admin_username.to_string(),
                    handled_at: Utc::now(),
                    ban_option,
                },
            )
            .await?;

        tracing::info!(
            "Report {} {} by {}",
            report_id,
            outcome.report.status,
            admin_username
        );
        if let Some(ref ban) = outcome.ban {
            tracing::info!(
                "Banned {} for {} until {} (ban {})",
                ban.user_name,
                ban.ban_option,
                ban.banned_until,
                ban.ban_id
            );
        }

        Ok(outcome)
    }

    /// Pending reports, oldest first
    pub async fn list_pending_reports(&self) -> ModerationResult<Vec<Report>> {
        let reports = self.store.list_pending().await?;
        tracing::debug!("Retrieved {} pending reports", reports.len());
        Ok(reports)
    }

    pub async fn list_reports(&self, status: Option<ReportStatus>) -> ModerationResult<Vec<Report>> {
        self.store.list_all(status).await
    }

    pub async fn get_report(&self, report_id: i64) -> ModerationResult<Report> {
        self.store.get(report_id).await
    }

    /// All reports ever filed against one review
    pub async fn list_reports_for_review(
        &self,
        movie_title: &str,
        review_user: &str,
    ) -> ModerationResult<Vec<Report>> {
        self.store.list_for_review(movie_title, review_user).await
    }

    /// Confirmed offences against reviews written by `user`
    pub async fn penalties_for(&self, user: &str) -> ModerationResult<i64> {
        self.store.count_confirmed_against(user).await
    }

    pub async fn list_bans(&self, user_name: Option<&str>) -> ModerationResult<Vec<Ban>> {
        self.store.list_by_user(user_name).await
    }

    pub async fn is_banned(&self, user_name: &str, now: DateTime<Utc>) -> ModerationResult<bool> {
        self.store.is_currently_banned(user_name, now).await
    }

    /// The ban currently governing `user_name`, if any
    pub async fn active_ban(
        &self,
        user_name: &str,
        now: DateTime<Utc>,
    ) -> ModerationResult<Option<Ban>> {
        self.store.active_ban(user_name, now).await
    }

    /// Fail with `Banned` while `user_name` is under an active ban
    pub async fn ensure_not_banned(
        &self,
        user_name: &str,
        now: DateTime<Utc>,
    ) -> ModerationResult<()> {
        match self.store.active_ban(user_name, now).await? {
            Some(ban) => {
                let err = ModerationError::Banned {
                    user: user_name.to_string(),
                    until: ban.banned_until,
                };
                err.log();
                Err(err)
            }
            None => Ok(()),
        }
    }
}
