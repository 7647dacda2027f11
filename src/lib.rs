//! Moderation core for movie review reports and bans
//!
//! Users report reviews; the report keeps a snapshot of the review as it was.
//! Admins confirm or reject pending reports, and a confirmation may carry a
//! fixed-length ban for the review's author.

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod error;
pub mod moderation;
pub mod telemetry;

pub use config::{ConfigError, DatabaseConfig, ModerationConfig, StoreBackend};
pub use error::{ModerationError, ModerationResult};
pub use moderation::{DynModerationService, ModerationService};
