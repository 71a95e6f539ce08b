//! Engine error taxonomy.
//!
//! Every failure mode of the sync engine maps onto one of these variants:
//!
//! - `Configuration` fails fast, before any network call, and is never
//!   retried automatically.
//! - `RemoteCall` propagates out of `pull_all`/`push_one`; retry policy
//!   belongs to the caller.
//! - `MalformedEvent` is recovered locally — logged and dropped, never fatal
//!   to the realtime connection.
//! - `Connection` drives the realtime reconnect state machine.
//! - `Reconciliation` is a per-item failure during a pull batch; the batch
//!   continues past it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Required credential absent or unusable.
    #[error("{0}")]
    Configuration(String),

    /// Network/HTTP failure talking to the TickTick API.
    #[error("remote call failed: {0:#}")]
    RemoteCall(anyhow::Error),

    /// An inbound realtime message that cannot be parsed or carries an
    /// incomplete payload.
    #[error("malformed realtime event: {0}")]
    MalformedEvent(String),

    /// The realtime transport dropped or errored.
    #[error("realtime connection error: {0:#}")]
    Connection(anyhow::Error),

    /// Failure to apply one remote task locally.
    #[error("failed to reconcile task {external_id}: {source:#}")]
    Reconciliation {
        external_id: String,
        source: anyhow::Error,
    },
}

impl SyncError {
    pub fn reconciliation(external_id: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Reconciliation {
            external_id: external_id.into(),
            source: source.into(),
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        Self::RemoteCall(e.into())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Connection(e.into())
    }
}
