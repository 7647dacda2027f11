// Moderation module
// Report lifecycle, review snapshots, ban computation and ban bookkeeping

pub mod ban_calculator;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod service;
pub mod snapshot;
pub mod status_machine;
pub mod store;

pub use ban_calculator::*;
pub use memory::*;
pub use models::*;
pub use postgres::*;
pub use service::*;
pub use status_machine::*;
pub use store::*;
