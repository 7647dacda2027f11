// PostgreSQL moderation backend
//
// Decisions run inside a transaction that locks the report row, so two admins
// deciding the same report serialize and the second sees `AlreadyHandled`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::error::{ModerationError, ModerationResult};
use crate::moderation::{
    Ban, BanCalculator, BanStore, DecisionOutcome, DuplicateReportPolicy, ModerationStore, NewBan,
    NewReport, ReasonType, Report, ReportAction, ReportStatus, ReportStore, ReportTransition,
    Review, ReviewCatalog, ReviewSnapshot, StatusMachine,
};

const REPORT_COLUMNS: &str = "report_id, movie_title, review_user, review_rating, review_title, \
     review_body, review_useful_votes, review_total_votes, review_report_count, reported_by, \
     status, date_reported, reason_type, reason, handled_by_admin, handled_at, ban_duration_seconds";

const BAN_COLUMNS: &str = "ban_id, user_name, reported_by, report_id, movie_title, review_user, \
     reason_type, reason, ban_option, ban_duration_seconds, banned_at, banned_until";

/// Flat row shape of the `reports` table
#[derive(Debug, sqlx::FromRow)]
struct ReportRow {
    report_id: i64,
    movie_title: String,
    review_user: String,
    review_rating: Option<f64>,
    review_title: String,
    review_body: String,
    review_useful_votes: i64,
    review_total_votes: i64,
    review_report_count: i64,
    reported_by: String,
    status: ReportStatus,
    date_reported: DateTime<Utc>,
    reason_type: ReasonType,
    reason: Option<String>,
    handled_by_admin: Option<String>,
    handled_at: Option<DateTime<Utc>>,
    ban_duration_seconds: Option<i64>,
}

impl From<ReportRow> for Report {
    fn from(row: ReportRow) -> Self {
        Self {
            report_id: row.report_id,
            review: ReviewSnapshot {
                movie_title: row.movie_title,
                user: row.review_user,
                rating: row.review_rating,
                title: row.review_title,
                body: row.review_body,
                useful_votes: row.review_useful_votes,
                total_votes: row.review_total_votes,
                report_count: row.review_report_count,
            },
            reported_by: row.reported_by,
            status: row.status,
            date_reported: row.date_reported,
            reason_type: row.reason_type,
            reason: row.reason,
            handled_by_admin: row.handled_by_admin,
            handled_at: row.handled_at,
            ban_duration_seconds: row.ban_duration_seconds,
        }
    }
}

/// Repository for reports and bans backed by PostgreSQL
#[derive(Clone)]
pub struct PgModerationStore {
    pool: PgPool,
}

impl PgModerationStore {
    /// Create a new PgModerationStore
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lock the report row, check the transition and write it
    async fn lock_and_apply(
        conn: &mut PgConnection,
        report_id: i64,
        transition: &ReportTransition,
    ) -> ModerationResult<Report> {
        let current = sqlx::query_as::<_, ReportRow>(&format!(
            "SELECT {} FROM reports WHERE report_id = $1 FOR UPDATE",
            REPORT_COLUMNS
        ))
        .bind(report_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ModerationError::report_not_found(report_id))?;

        let to =
            StatusMachine::transition(report_id, current.status, transition.action.target_status())?;

        let ban_duration_seconds = match (transition.action, transition.ban_option) {
            (ReportAction::Confirm, Some(option)) => Some(BanCalculator::seconds_for(option)),
            _ => None,
        };

        let row = sqlx::query_as::<_, ReportRow>(&format!(
            r#"
            UPDATE reports
            SET status = $1, handled_by_admin = $2, handled_at = $3, ban_duration_seconds = $4
            WHERE report_id = $5
            RETURNING {}
            "#,
            REPORT_COLUMNS
        ))
        .bind(to)
        .bind(&transition.admin_username)
        .bind(transition.handled_at)
        .bind(ban_duration_seconds)
        .bind(report_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(row.into())
    }

    async fn insert_ban(conn: &mut PgConnection, new_ban: NewBan) -> ModerationResult<Ban> {
        let ban = sqlx::query_as::<_, Ban>(&format!(
            r#"
            INSERT INTO bans (user_name, reported_by, report_id, movie_title, review_user,
                              reason_type, reason, ban_option, ban_duration_seconds,
                              banned_at, banned_until)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            BAN_COLUMNS
        ))
        .bind(&new_ban.user_name)
        .bind(&new_ban.reported_by)
        .bind(new_ban.report_id)
        .bind(&new_ban.movie_title)
        .bind(&new_ban.review_user)
        .bind(new_ban.reason_type)
        .bind(&new_ban.reason)
        .bind(new_ban.ban_option)
        .bind(BanCalculator::seconds_for(new_ban.ban_option))
        .bind(new_ban.banned_at)
        .bind(BanCalculator::banned_until(new_ban.banned_at, new_ban.ban_option))
        .fetch_one(&mut *conn)
        .await?;

        Ok(ban)
    }
}

#[async_trait]
impl ReportStore for PgModerationStore {
    async fn create(
        &self,
        new_report: NewReport,
        policy: DuplicateReportPolicy,
    ) -> ModerationResult<Report> {
        let mut tx = self.pool.begin().await?;

        if policy == DuplicateReportPolicy::RejectPending {
            // Serializes concurrent submissions for the same reporter/review pair
            let key = format!(
                "{}\n{}\n{}",
                new_report.reported_by, new_report.review.movie_title, new_report.review.user
            );
            sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
                .bind(key)
                .execute(&mut *tx)
                .await?;

            let exists: Option<bool> = sqlx::query_scalar(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM reports
                    WHERE status = 'pending' AND reported_by = $1
                      AND movie_title = $2 AND review_user = $3
                )
                "#,
            )
            .bind(&new_report.reported_by)
            .bind(&new_report.review.movie_title)
            .bind(&new_report.review.user)
            .fetch_one(&mut *tx)
            .await?;

            if exists.unwrap_or(false) {
                return Err(ModerationError::DuplicateReport);
            }
        }

        let review = &new_report.review;
        let row = sqlx::query_as::<_, ReportRow>(&format!(
            r#"
            INSERT INTO reports (movie_title, review_user, review_rating, review_title, review_body,
                                 review_useful_votes, review_total_votes, review_report_count,
                                 reported_by, status, date_reported, reason_type, reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending', $10, $11, $12)
            RETURNING {}
            "#,
            REPORT_COLUMNS
        ))
        .bind(&review.movie_title)
        .bind(&review.user)
        .bind(review.rating)
        .bind(&review.title)
        .bind(&review.body)
        .bind(review.useful_votes)
        .bind(review.total_votes)
        .bind(review.report_count)
        .bind(&new_report.reported_by)
        .bind(new_report.date_reported)
        .bind(new_report.reason_type)
        .bind(&new_report.reason)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(row.into())
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
        let mut tx = self.pool.begin().await?;
        let report = Self::lock_and_apply(&mut *tx, report_id, &transition).await?;
        tx.commit().await?;
        Ok(report)
    }

    async fn get(&self, report_id: i64) -> ModerationResult<Report> {
        let row = sqlx::query_as::<_, ReportRow>(&format!(
            "SELECT {} FROM reports WHERE report_id = $1",
            REPORT_COLUMNS
        ))
        .bind(report_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ModerationError::report_not_found(report_id))?;

        Ok(row.into())
    }

    async fn list_pending(&self) -> ModerationResult<Vec<Report>> {
        let rows = sqlx::query_as::<_, ReportRow>(&format!(
            "SELECT {} FROM reports WHERE status = 'pending' ORDER BY date_reported ASC, report_id ASC",
            REPORT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Report::from).collect())
    }

    async fn list_all(&self, status: Option<ReportStatus>) -> ModerationResult<Vec<Report>> {
        let rows = match status {
            Some(status_filter) => {
                sqlx::query_as::<_, ReportRow>(&format!(
                    "SELECT {} FROM reports WHERE status = $1 ORDER BY report_id",
                    REPORT_COLUMNS
                ))
                .bind(status_filter)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, ReportRow>(&format!(
                    "SELECT {} FROM reports ORDER BY report_id",
                    REPORT_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(Report::from).collect())
    }

    async fn list_for_review(
        &self,
        movie_title: &str,
        review_user: &str,
    ) -> ModerationResult<Vec<Report>> {
        let rows = sqlx::query_as::<_, ReportRow>(&format!(
            "SELECT {} FROM reports WHERE movie_title = $1 AND review_user = $2 ORDER BY report_id",
            REPORT_COLUMNS
        ))
        .bind(movie_title)
        .bind(review_user)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Report::from).collect())
    }

    async fn count_confirmed_against(&self, user: &str) -> ModerationResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reports WHERE status = 'confirmed' AND review_user = $1",
        )
        .bind(user)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

#[async_trait]
impl BanStore for PgModerationStore {
    async fn issue(&self, new_ban: NewBan) -> ModerationResult<Ban> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_ban(&mut *conn, new_ban).await
    }

    async fn list_by_user(&self, user_name: Option<&str>) -> ModerationResult<Vec<Ban>> {
        let bans = match user_name {
            Some(user_name) => {
                sqlx::query_as::<_, Ban>(&format!(
                    "SELECT {} FROM bans WHERE user_name = $1 ORDER BY ban_id",
                    BAN_COLUMNS
                ))
                .bind(user_name)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Ban>(&format!(
                    "SELECT {} FROM bans ORDER BY ban_id",
                    BAN_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(bans)
    }

    async fn is_currently_banned(
        &self,
        user_name: &str,
        now: DateTime<Utc>,
    ) -> ModerationResult<bool> {
        let banned: Option<bool> = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM bans WHERE user_name = $1 AND banned_until > $2)",
        )
        .bind(user_name)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(banned.unwrap_or(false))
    }

    async fn active_ban(
        &self,
        user_name: &str,
        now: DateTime<Utc>,
    ) -> ModerationResult<Option<Ban>> {
        let ban = sqlx::query_as::<_, Ban>(&format!(
            r#"
            SELECT {} FROM bans
            WHERE user_name = $1 AND banned_until > $2
            ORDER BY banned_until DESC, ban_id DESC
            LIMIT 1
            "#,
            BAN_COLUMNS
        ))
        .bind(user_name)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ban)
    }
}

#[async_trait]
impl ModerationStore for PgModerationStore {
    async fn decide(
        &self,
        report_id: i64,
        transition: ReportTransition,
    ) -> ModerationResult<DecisionOutcome> {
        // Dropping `tx` on any early return rolls both writes back
        let mut tx = self.pool.begin().await?;

        let report = Self::lock_and_apply(&mut *tx, report_id, &transition).await?;

        let ban = match (transition.action, transition.ban_option) {
            (ReportAction::Confirm, Some(option)) => Some(
                Self::insert_ban(
                    &mut *tx,
                    NewBan::for_report(&report, option, transition.handled_at),
                )
                .await?,
            ),
            _ => None,
        };

        tx.commit().await?;

        Ok(DecisionOutcome { report, ban })
    }
}

/// Review catalog reading the `movie_reviews` table
#[derive(Clone)]
pub struct PgReviewCatalog {
    pool: PgPool,
}

impl PgReviewCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewCatalog for PgReviewCatalog {
    async fn find_review(
        &self,
        movie_title: &str,
        user: &str,
    ) -> ModerationResult<Option<Review>> {
        let review = sqlx::query_as::<_, Review>(
            r#"
            SELECT movie_title, user_name, rating, useful_votes, total_votes, title, body, report_count
            FROM movie_reviews
            WHERE movie_title = $1 AND user_name = $2
            "#,
        )
        .bind(movie_title)
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;

        Ok(review)
    }

    async fn record_report(
        &self,
        movie_title: &str,
        user: &str,
    ) -> ModerationResult<Option<Review>> {
        let review = sqlx::query_as::<_, Review>(
            r#"
            UPDATE movie_reviews
            SET report_count = COALESCE(report_count, 0) + 1
            WHERE movie_title = $1 AND user_name = $2
            RETURNING movie_title, user_name, rating, useful_votes, total_votes, title, body, report_count
            "#,
        )
        .bind(movie_title)
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;

        Ok(review)
    }
}
