use crate::moderation::{Review, ReviewSnapshot};

impl ReviewSnapshot {
    /// Capture a review as it stands right now
    ///
    /// Blank vote and report counters become 0; a blank rating stays `None`.
    /// The snapshot owns copies of every field, so later edits or deletion of
    /// the live review never reach it.
    pub fn capture(review: &Review) -> Self {
        Self {
            movie_title: review.movie_title.clone(),
            user: review.user.clone(),
            rating: review.rating,
            title: review.title.clone(),
            body: review.body.clone(),
            useful_votes: review.useful_votes.unwrap_or(0),
            total_votes: review.total_votes.unwrap_or(0),
            report_count: review.report_count.unwrap_or(0),
        }
    }
}
