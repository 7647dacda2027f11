use chrono::{DateTime, Duration, Utc};

use crate::error::ModerationError;
use crate::moderation::BanOption;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Service for mapping ban options to durations and expiry times
pub struct BanCalculator;

impl BanCalculator {
    /// Duration in seconds for a ban code
    ///
    /// # Arguments
    /// * `code` - One of "3d", "7d", "30d"
    ///
    /// # Returns
    /// 259200, 604800 or 2592000 seconds, `InvalidBanOption` for anything else
    pub fn duration_seconds(code: &str) -> Result<i64, ModerationError> {
        BanOption::parse(code).map(Self::seconds_for)
    }

    /// Duration in seconds for an already parsed option
    pub fn seconds_for(option: BanOption) -> i64 {
        let days = match option {
            BanOption::ThreeDays => 3,
            BanOption::SevenDays => 7,
            BanOption::ThirtyDays => 30,
        };
        days * SECONDS_PER_DAY
    }

    /// Expiry of a ban starting at `banned_at`
    pub fn banned_until(banned_at: DateTime<Utc>, option: BanOption) -> DateTime<Utc> {
        banned_at + Duration::seconds(Self::seconds_for(option))
    }
}
