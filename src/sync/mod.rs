//! Bidirectional reconciliation between the local store and TickTick.
//!
//! Three trigger paths funnel into this orchestrator — the scheduled full
//! pull, realtime push events, and local ICE edits — and they can interleave
//! arbitrarily. Reconciliation and push are therefore serialized per
//! external id: concurrent triggers for the same task apply in arrival
//! order instead of racing at the store.
//!
//! The pull path is last-remote-write-wins for every field the remote owns;
//! local ICE edits survive only if they were pushed (and therefore embedded
//! in the remote content) before the next pull.

pub mod driver;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::ice::{self, IceScore};
use crate::remote::{RemoteTag, RemoteTask, RemoteTaskClient};
use crate::tasks::store::TaskStore;
use crate::tasks::{TaskPatch, TaskPriority, TaskRecord, TaskStatus};

/// Outcome of a full consistency pass.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SyncReport {
    pub pulled: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Created,
    Updated,
}

/// Outcome of a local ICE edit: the locally persisted record, and the push
/// failure when the remote side rejected it.
pub struct IceEdit {
    pub task: TaskRecord,
    pub push_error: Option<SyncError>,
}

pub struct SyncOrchestrator {
    store: Arc<dyn TaskStore>,
    client: Arc<dyn RemoteTaskClient>,
    /// Per-external-id locks. Entries are created on first use and kept for
    /// the process lifetime — the id space is the user's task list, small
    /// enough that eviction isn't worth the complexity.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SyncOrchestrator {
    pub fn new(store: Arc<dyn TaskStore>, client: Arc<dyn RemoteTaskClient>) -> Self {
        Self {
            store,
            client,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    async fn lock_for(&self, external_id: &str) -> Arc<Mutex<()>> {
        let mut map = self.locks.lock().await;
        map.entry(external_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // ─── Pull path ───────────────────────────────────────────────────────────

    /// List every remote task and reconcile each against the local store.
    ///
    /// Individual item failures are logged and counted but never abort the
    /// batch. A failure to list at all propagates to the caller.
    pub async fn pull_all(&self) -> Result<SyncReport, SyncError> {
        let remote_tasks = self.client.list_all().await?;
        let mut report = SyncReport {
            pulled: remote_tasks.len(),
            ..Default::default()
        };

        for task in &remote_tasks {
            match self.reconcile_one(task).await {
                Ok(Reconciled::Created) => report.created += 1,
                Ok(Reconciled::Updated) => report.updated += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(external_id = %task.id, err = %e, "reconcile failed — continuing batch");
                }
            }
        }

        info!(
            pulled = report.pulled,
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            "full sync pass complete"
        );
        Ok(report)
    }

    /// Apply one remote task's state onto its local counterpart, creating
    /// the counterpart when absent. Stamps `last_sync` on success.
    pub async fn reconcile_one(&self, remote: &RemoteTask) -> Result<Reconciled, SyncError> {
        let lock = self.lock_for(&remote.id).await;
        let _guard = lock.lock().await;

        let ice = ice::extract(&remote.content).unwrap_or_default();
        let tags: Vec<String> = remote.tags.iter().map(|t| t.name.clone()).collect();
        let now = Utc::now().to_rfc3339();

        let existing = self
            .store
            .find_by_external_id(&remote.id)
            .await
            .map_err(|e| SyncError::reconciliation(&remote.id, e))?;

        match existing {
            Some(_) => {
                let patch = TaskPatch {
                    title: Some(remote.title.clone()),
                    content: Some(remote.content.clone()),
                    status: Some(TaskStatus::from_code(remote.status)),
                    priority: Some(TaskPriority::from_code(remote.priority)),
                    impact: Some(ice.impact),
                    confidence: Some(ice.confidence),
                    ease: Some(ice.ease),
                    due_date: remote.due_date.clone(),
                    start_date: remote.start_date.clone(),
                    tags: Some(tags),
                    last_sync: Some(now),
                };
                self.store
                    .update(&remote.id, patch)
                    .await
                    .map_err(|e| SyncError::reconciliation(&remote.id, e))?;
                debug!(external_id = %remote.id, "task reconciled (updated)");
                Ok(Reconciled::Updated)
            }
            None => {
                let record = TaskRecord {
                    external_id: remote.id.clone(),
                    title: remote.title.clone(),
                    content: remote.content.clone(),
                    status: TaskStatus::from_code(remote.status),
                    priority: TaskPriority::from_code(remote.priority),
                    impact: ice.impact,
                    confidence: ice.confidence,
                    ease: ice.ease,
                    due_date: remote.due_date.clone(),
                    start_date: remote.start_date.clone(),
                    tags,
                    last_sync: Some(now),
                };
                self.store
                    .create(record)
                    .await
                    .map_err(|e| SyncError::reconciliation(&remote.id, e))?;
                debug!(external_id = %remote.id, "task reconciled (created)");
                Ok(Reconciled::Created)
            }
        }
    }

    // ─── Push path ───────────────────────────────────────────────────────────

    /// Apply the local task's state onto the remote service: re-embed the
    /// ICE triple into the content, PUT with numeric codes, then stamp
    /// `last_sync` locally. Remote failure propagates uncaught — retry, if
    /// any, is the caller's policy.
    pub async fn push_one(&self, external_id: &str) -> Result<TaskRecord, SyncError> {
        let lock = self.lock_for(external_id).await;
        let _guard = lock.lock().await;
        self.push_locked(external_id).await
    }

    /// Apply a local ICE edit and push it to the remote service. The task's
    /// lock is held across both steps, so a concurrent reconcile cannot land
    /// between the store write and the push's re-read of it.
    ///
    /// The edit always persists locally before the push is attempted; a push
    /// failure is reported in the outcome rather than as an error, alongside
    /// the record that did persist.
    pub async fn update_ice(&self, external_id: &str, ice: IceScore) -> Result<IceEdit, SyncError> {
        let lock = self.lock_for(external_id).await;
        let _guard = lock.lock().await;

        let task = self
            .store
            .update(
                external_id,
                TaskPatch {
                    impact: Some(ice.impact),
                    confidence: Some(ice.confidence),
                    ease: Some(ice.ease),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| SyncError::reconciliation(external_id, e))?;

        match self.push_locked(external_id).await {
            Ok(stamped) => Ok(IceEdit {
                task: stamped,
                push_error: None,
            }),
            Err(e) => Ok(IceEdit {
                task,
                push_error: Some(e),
            }),
        }
    }

    async fn push_locked(&self, external_id: &str) -> Result<TaskRecord, SyncError> {
        let task = self
            .store
            .find_by_external_id(external_id)
            .await
            .map_err(|e| SyncError::reconciliation(external_id, e))?
            .ok_or_else(|| {
                SyncError::reconciliation(external_id, anyhow::anyhow!("no local task to push"))
            })?;

        let ice = IceScore::new(task.impact, task.confidence, task.ease);
        let content = ice::embed(&task.content, &ice);

        let remote = RemoteTask {
            id: task.external_id.clone(),
            title: task.title.clone(),
            content,
            status: task.status.code(),
            priority: task.priority.code(),
            due_date: task.due_date.clone(),
            start_date: task.start_date.clone(),
            tags: task
                .tags
                .iter()
                .map(|name| RemoteTag { name: name.clone() })
                .collect(),
        };

        self.client.update_one(external_id, &remote).await?;

        let stamped = self
            .store
            .update(
                external_id,
                TaskPatch {
                    last_sync: Some(Utc::now().to_rfc3339()),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| SyncError::reconciliation(external_id, e))?;

        info!(external_id = %external_id, "task pushed");
        Ok(stamped)
    }
}
