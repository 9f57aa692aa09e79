pub mod backtest;
pub mod cache;
pub mod config;
pub mod delay;
pub mod error;
pub mod reconcile;
pub mod session;
pub mod snapshot;
pub mod source;
pub mod stats;

pub use error::{SourceError, SyncError};
pub use session::Session;
