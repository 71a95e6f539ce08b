//! Process-level sync entry point.
//!
//! The driver owns the orchestrator and exactly one realtime channel. Every
//! invocation — manual trigger or scheduled tick — ensures the channel is
//! running, then performs one full consistency pass. The channel is never
//! replaced while live; `start` is idempotent all the way down.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::SyncError;
use crate::ice::IceScore;
use crate::realtime::{ChannelState, RealtimeChannel};
use crate::sync::{IceEdit, SyncOrchestrator, SyncReport};
use crate::tasks::TaskRecord;

pub struct SyncDriver {
    orchestrator: Arc<SyncOrchestrator>,
    channel: Arc<RealtimeChannel>,
}

impl SyncDriver {
    pub fn new(orchestrator: Arc<SyncOrchestrator>, channel: Arc<RealtimeChannel>) -> Self {
        Self {
            orchestrator,
            channel,
        }
    }

    pub fn orchestrator(&self) -> &Arc<SyncOrchestrator> {
        &self.orchestrator
    }

    /// Observe the realtime channel's state (`Exhausted` is terminal and
    /// needs an external restart).
    pub fn channel_state(&self) -> watch::Receiver<ChannelState> {
        self.channel.state()
    }

    /// Ensure the realtime channel is running. Idempotent.
    pub async fn start(&self) {
        self.channel.clone().start().await;
    }

    /// One full sync invocation: ensure the channel, then pull everything.
    pub async fn run_sync(&self) -> Result<SyncReport, SyncError> {
        self.start().await;
        self.orchestrator.pull_all().await
    }

    /// Push a locally edited task to the remote service.
    pub async fn push_one(&self, external_id: &str) -> Result<TaskRecord, SyncError> {
        self.orchestrator.push_one(external_id).await
    }

    /// Apply a local ICE edit and push it, serialized against any concurrent
    /// reconcile of the same task.
    pub async fn update_ice(&self, external_id: &str, ice: IceScore) -> Result<IceEdit, SyncError> {
        self.orchestrator.update_ice(external_id, ice).await
    }

    /// Close the realtime channel. Idempotent; does not trigger reconnect.
    pub fn shutdown(&self) {
        self.channel.shutdown();
    }
}
