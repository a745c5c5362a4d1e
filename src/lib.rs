pub mod app;
pub mod config;
pub mod constants;
pub mod error;
pub mod infra;
pub mod key;
pub mod logging;
pub mod metrics;
pub mod report;
pub mod types;

pub use app::sync_use_case::{RunOptions, SyncUseCase};
pub use error::{Result, SyncError};
pub use key::identity_key;
