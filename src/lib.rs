pub mod config;
pub mod error;
pub mod ice;
pub mod realtime;
pub mod remote;
pub mod rest;
pub mod sync;
pub mod tasks;

use std::sync::Arc;

use config::DaemonConfig;
use sync::driver::SyncDriver;
use tasks::store::TaskStore;

/// Shared application state passed to every REST handler and background task.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<DaemonConfig>,
    pub store: Arc<dyn TaskStore>,
    /// None when no access token is configured — every sync surface then
    /// fails fast with a configuration error instead of calling out.
    pub driver: Option<Arc<SyncDriver>>,
    pub started_at: std::time::Instant,
}
