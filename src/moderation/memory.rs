// In-memory moderation backend
//
// Single logical owner of all moderation state. Each table sits behind its own
// tokio RwLock; writers hold the lock only for the mutation itself and readers
// clone records out, so reads never hold a lock across an await point.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;

use crate::error::{ModerationError, ModerationResult};
use crate::moderation::{
    Ban, BanCalculator, BanStore, DecisionOutcome, DuplicateReportPolicy, ModerationStore, NewBan,
    NewReport, Report, ReportAction, ReportStatus, ReportStore, ReportTransition, Review,
    ReviewCatalog, StatusMachine,
};

/// Reports indexed by id and by status
#[derive(Debug)]
struct ReportTable {
    next_id: i64,
    by_id: BTreeMap<i64, Report>,
    by_status: HashMap<ReportStatus, BTreeSet<i64>>,
}

impl ReportTable {
    fn new() -> Self {
        Self {
            next_id: 1,
            by_id: BTreeMap::new(),
            by_status: HashMap::new(),
        }
    }

    fn has_pending_duplicate(&self, new_report: &NewReport) -> bool {
        self.ids_with_status(ReportStatus::Pending)
            .filter_map(|id| self.by_id.get(&id))
            .any(|r| {
                r.reported_by == new_report.reported_by
                    && r.review.movie_title == new_report.review.movie_title
                    && r.review.user == new_report.review.user
            })
    }

    fn ids_with_status(&self, status: ReportStatus) -> impl Iterator<Item = i64> + '_ {
        self.by_status
            .get(&status)
            .into_iter()
            .flat_map(|ids| ids.iter().copied())
    }

    fn insert(
        &mut self,
        new_report: NewReport,
        policy: DuplicateReportPolicy,
    ) -> ModerationResult<Report> {
        if policy == DuplicateReportPolicy::RejectPending && self.has_pending_duplicate(&new_report)
        {
            return Err(ModerationError::DuplicateReport);
        }

        let report_id = self.next_id;
        self.next_id += 1;

        let report = Report {
            report_id,
            review: new_report.review,
            reported_by: new_report.reported_by,
            status: ReportStatus::Pending,
            date_reported: new_report.date_reported,
            reason_type: new_report.reason_type,
            reason: new_report.reason,
            handled_by_admin: None,
            handled_at: None,
            ban_duration_seconds: None,
        };

        self.by_status
            .entry(ReportStatus::Pending)
            .or_default()
            .insert(report_id);
        self.by_id.insert(report_id, report.clone());

        Ok(report)
    }

    /// Validate and apply a transition in place
    fn apply(&mut self, report_id: i64, transition: &ReportTransition) -> ModerationResult<Report> {
        let report = self
            .by_id
            .get_mut(&report_id)
            .ok_or_else(|| ModerationError::report_not_found(report_id))?;

        let from = report.status;
        let to = StatusMachine::transition(report_id, from, transition.action.target_status())?;

        report.status = to;
        report.handled_by_admin = Some(transition.admin_username.clone());
        report.handled_at = Some(transition.handled_at);
        report.ban_duration_seconds = match (transition.action, transition.ban_option) {
            (ReportAction::Confirm, Some(option)) => Some(BanCalculator::seconds_for(option)),
            _ => None,
        };
        let updated = report.clone();

        if let Some(ids) = self.by_status.get_mut(&from) {
            ids.remove(&report_id);
        }
        self.by_status.entry(to).or_default().insert(report_id);

        Ok(updated)
    }
}

/// Bans indexed by id and by banned user
#[derive(Debug)]
struct BanTable {
    next_id: i64,
    by_id: BTreeMap<i64, Ban>,
    by_user: HashMap<String, Vec<i64>>,
}

impl BanTable {
    fn new() -> Self {
        Self {
            next_id: 1,
            by_id: BTreeMap::new(),
            by_user: HashMap::new(),
        }
    }

    fn insert(&mut self, new_ban: NewBan) -> Ban {
        let ban_id = self.next_id;
        self.next_id += 1;

        let ban = Ban {
            ban_id,
            user_name: new_ban.user_name,
            reported_by: new_ban.reported_by,
            report_id: new_ban.report_id,
            movie_title: new_ban.movie_title,
            review_user: new_ban.review_user,
            reason_type: new_ban.reason_type,
            reason: new_ban.reason,
            ban_option: new_ban.ban_option,
            ban_duration_seconds: BanCalculator::seconds_for(new_ban.ban_option),
            banned_at: new_ban.banned_at,
            banned_until: BanCalculator::banned_until(new_ban.banned_at, new_ban.ban_option),
        };

        self.by_user
            .entry(ban.user_name.clone())
            .or_default()
            .push(ban_id);
        self.by_id.insert(ban_id, ban.clone());

        ban
    }

    fn for_user<'a>(&'a self, user_name: &str) -> impl Iterator<Item = &'a Ban> + 'a {
        self.by_user
            .get(user_name)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.by_id.get(id))
    }

    fn active_ban(&self, user_name: &str, now: DateTime<Utc>) -> Option<Ban> {
        self.for_user(user_name)
            .filter(|ban| ban.is_active_at(now))
            .max_by_key(|ban| (ban.banned_until, ban.ban_id))
            .cloned()
    }
}

/// In-memory report and ban store
#[derive(Debug)]
pub struct MemoryModerationStore {
    reports: RwLock<ReportTable>,
    bans: RwLock<BanTable>,
}

impl MemoryModerationStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            reports: RwLock::new(ReportTable::new()),
            bans: RwLock::new(BanTable::new()),
        }
    }
}

impl Default for MemoryModerationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReportStore for MemoryModerationStore {
    async fn create(
        &self,
        new_report: NewReport,
        policy: DuplicateReportPolicy,
    ) -> ModerationResult<Report> {
        let mut reports = self.reports.write().await;
        reports.insert(new_report, policy)
    }

    async fn transition(
        &self,
        report_id: i64,
        transition: ReportTransition,
    ) -> ModerationResult<Report> {
        let transition = ReportTransition {
            ban_option: None,
            ..transition
        };
        let mut reports = self.reports.write().await;
        reports.apply(report_id, &transition)
    }

    async fn get(&self, report_id: i64) -> ModerationResult<Report> {
        let reports = self.reports.read().await;
        reports
            .by_id
            .get(&report_id)
            .cloned()
            .ok_or_else(|| ModerationError::report_not_found(report_id))
    }

    async fn list_pending(&self) -> ModerationResult<Vec<Report>> {
        let reports = self.reports.read().await;
        let mut pending: Vec<Report> = reports
            .ids_with_status(ReportStatus::Pending)
            .filter_map(|id| reports.by_id.get(&id).cloned())
            .collect();
        drop(reports);

        pending.sort_by_key(|r| (r.date_reported, r.report_id));
        Ok(pending)
    }

    async fn list_all(&self, status: Option<ReportStatus>) -> ModerationResult<Vec<Report>> {
        let reports = self.reports.read().await;
        let listed = match status {
            Some(status) => {
                let mut ids: Vec<i64> = reports.ids_with_status(status).collect();
                ids.sort_unstable();
                ids.into_iter()
                    .filter_map(|id| reports.by_id.get(&id).cloned())
                    .collect()
            }
            None => reports.by_id.values().cloned().collect(),
        };
        Ok(listed)
    }

    async fn list_for_review(
        &self,
        movie_title: &str,
        review_user: &str,
    ) -> ModerationResult<Vec<Report>> {
        let reports = self.reports.read().await;
        Ok(reports
            .by_id
            .values()
            .filter(|r| r.review.movie_title == movie_title && r.review.user == review_user)
            .cloned()
            .collect())
    }

    async fn count_confirmed_against(&self, user: &str) -> ModerationResult<i64> {
        let reports = self.reports.read().await;
        let count = reports
            .ids_with_status(ReportStatus::Confirmed)
            .filter_map(|id| reports.by_id.get(&id))
            .filter(|r| r.review.user == user)
            .count();
        Ok(count as i64)
    }
}

#[async_trait]
impl BanStore for MemoryModerationStore {
    async fn issue(&self, new_ban: NewBan) -> ModerationResult<Ban> {
        let mut bans = self.bans.write().await;
        Ok(bans.insert(new_ban))
    }

    async fn list_by_user(&self, user_name: Option<&str>) -> ModerationResult<Vec<Ban>> {
        let bans = self.bans.read().await;
        let listed = match user_name {
            Some(user_name) => bans.for_user(user_name).cloned().collect(),
            None => bans.by_id.values().cloned().collect(),
        };
        Ok(listed)
    }

    async fn is_currently_banned(
        &self,
        user_name: &str,
        now: DateTime<Utc>,
    ) -> ModerationResult<bool> {
        let bans = self.bans.read().await;
        let banned = bans.for_user(user_name).any(|ban| ban.is_active_at(now));
        Ok(banned)
    }

    async fn active_ban(
        &self,
        user_name: &str,
        now: DateTime<Utc>,
    ) -> ModerationResult<Option<Ban>> {
        let bans = self.bans.read().await;
        Ok(bans.active_ban(user_name, now))
    }
}

#[async_trait]
impl ModerationStore for MemoryModerationStore {
    async fn decide(
        &self,
        report_id: i64,
        transition: ReportTransition,
    ) -> ModerationResult<DecisionOutcome> {
        // Lock order: reports, then bans.
        let mut reports = self.reports.write().await;
        let report = reports.apply(report_id, &transition)?;

        let ban = match (transition.action, transition.ban_option) {
            (ReportAction::Confirm, Some(option)) => {
                let mut bans = self.bans.write().await;
                Some(bans.insert(NewBan::for_report(&report, option, transition.handled_at)))
            }
            _ => None,
        };

        Ok(DecisionOutcome { report, ban })
    }
}

/// In-memory review catalog keyed by (movie title, author)
#[derive(Debug, Default)]
pub struct MemoryReviewCatalog {
    reviews: RwLock<HashMap<(String, String), Review>>,
}

impl MemoryReviewCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog pre-filled with `reviews`
    pub fn with_reviews(reviews: impl IntoIterator<Item = Review>) -> Self {
        let map = reviews
            .into_iter()
            .map(|r| ((r.movie_title.clone(), r.user.clone()), r))
            .collect();
        Self {
            reviews: RwLock::new(map),
        }
    }

    /// Insert or replace a review
    pub async fn upsert(&self, review: Review) {
        let key = (review.movie_title.clone(), review.user.clone());
        self.reviews.write().await.insert(key, review);
    }

    pub async fn remove(&self, movie_title: &str, user: &str) -> Option<Review> {
        self.reviews
            .write()
            .await
            .remove(&(movie_title.to_string(), user.to_string()))
    }
}

#[async_trait]
impl ReviewCatalog for MemoryReviewCatalog {
    async fn find_review(
        &self,
        movie_title: &str,
        user: &str,
    ) -> ModerationResult<Option<Review>> {
        let reviews = self.reviews.read().await;
        Ok(reviews
            .get(&(movie_title.to_string(), user.to_string()))
            .cloned())
    }

    async fn record_report(
        &self,
        movie_title: &str,
        user: &str,
    ) -> ModerationResult<Option<Review>> {
        let mut reviews = self.reviews.write().await;
        let updated = reviews
            .get_mut(&(movie_title.to_string(), user.to_string()))
            .map(|review| {
                review.report_count = Some(review.report_count.unwrap_or(0) + 1);
                review.clone()
            });
        Ok(updated)
    }
}
