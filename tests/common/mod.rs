//! Shared test doubles: an in-memory task store and a scripted remote
//! client, both with failure injection.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::{watch, Mutex, Semaphore};

use tickd::error::SyncError;
use tickd::remote::{RemoteTask, RemoteTaskClient};
use tickd::tasks::store::TaskStore;
use tickd::tasks::{TaskPatch, TaskRecord};

pub fn remote_task(id: &str, title: &str, content: &str) -> RemoteTask {
    RemoteTask {
        id: id.to_string(),
        title: title.to_string(),
        content: content.to_string(),
        status: 0,
        priority: 0,
        due_date: None,
        start_date: None,
        tags: Vec::new(),
    }
}

// ─── In-memory store ──────────────────────────────────────────────────────────

/// Mirrors the SQLite store's contract: unique external ids and priority
/// derivation on every write.
#[derive(Default)]
pub struct MemStore {
    tasks: Mutex<HashMap<String, TaskRecord>>,
    fail_ids: Mutex<HashSet<String>>,
}

impl MemStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every store operation for `external_id` fail.
    pub async fn fail_on(&self, external_id: &str) {
        self.fail_ids.lock().await.insert(external_id.to_string());
    }

    pub async fn get(&self, external_id: &str) -> Option<TaskRecord> {
        self.tasks.lock().await.get(external_id).cloned()
    }
}

#[async_trait]
impl TaskStore for MemStore {
    async fn find_by_external_id(&self, external_id: &str) -> anyhow::Result<Option<TaskRecord>> {
        if self.fail_ids.lock().await.contains(external_id) {
            return Err(anyhow!("injected store failure for {external_id}"));
        }
        Ok(self.tasks.lock().await.get(external_id).cloned())
    }

    async fn create(&self, record: TaskRecord) -> anyhow::Result<TaskRecord> {
        let rec = record.with_derived_priority();
        let mut map = self.tasks.lock().await;
        if map.contains_key(&rec.external_id) {
            return Err(anyhow!("task {} already exists", rec.external_id));
        }
        map.insert(rec.external_id.clone(), rec.clone());
        Ok(rec)
    }

    async fn update(&self, external_id: &str, patch: TaskPatch) -> anyhow::Result<TaskRecord> {
        if self.fail_ids.lock().await.contains(external_id) {
            return Err(anyhow!("injected store failure for {external_id}"));
        }
        let mut map = self.tasks.lock().await;
        let existing = map
            .get(external_id)
            .cloned()
            .ok_or_else(|| anyhow!("task {external_id} not found"))?;
        let rec = patch.apply_to(existing);
        map.insert(external_id.to_string(), rec.clone());
        Ok(rec)
    }

    async fn list(&self) -> anyhow::Result<Vec<TaskRecord>> {
        let map = self.tasks.lock().await;
        let mut tasks: Vec<TaskRecord> = map.values().cloned().collect();
        tasks.sort_by(|a, b| a.external_id.cmp(&b.external_id));
        Ok(tasks)
    }
}

// ─── Scripted remote client ───────────────────────────────────────────────────

pub struct MemClient {
    tasks: Mutex<Vec<RemoteTask>>,
    pushed: Mutex<Vec<RemoteTask>>,
    listing_fails: AtomicBool,
    fail_update_ids: Mutex<HashSet<String>>,
    updates_held: AtomicBool,
    update_gate: Semaphore,
    waiting_tx: watch::Sender<usize>,
}

impl Default for MemClient {
    fn default() -> Self {
        Self {
            tasks: Mutex::default(),
            pushed: Mutex::default(),
            listing_fails: AtomicBool::new(false),
            fail_update_ids: Mutex::default(),
            updates_held: AtomicBool::new(false),
            update_gate: Semaphore::new(0),
            waiting_tx: watch::channel(0).0,
        }
    }
}

impl MemClient {
    pub fn with_tasks(tasks: Vec<RemoteTask>) -> Arc<Self> {
        Arc::new(Self {
            tasks: Mutex::new(tasks),
            ..Default::default()
        })
    }

    /// Replace the listing the next `list_all` returns.
    pub async fn set_tasks(&self, tasks: Vec<RemoteTask>) {
        *self.tasks.lock().await = tasks;
    }

    pub fn fail_listing(&self) {
        self.listing_fails.store(true, Ordering::SeqCst);
    }

    /// Make `update_one` fail for `external_id`.
    pub async fn fail_update(&self, external_id: &str) {
        self.fail_update_ids
            .lock()
            .await
            .insert(external_id.to_string());
    }

    /// Everything `update_one` received, in order.
    pub async fn pushed(&self) -> Vec<RemoteTask> {
        self.pushed.lock().await.clone()
    }

    /// Park every `update_one` call until `release_updates`, so a test can
    /// hold a push in flight while it probes concurrent behavior.
    pub fn hold_updates(&self) {
        self.updates_held.store(true, Ordering::SeqCst);
    }

    pub fn release_updates(&self) {
        self.updates_held.store(false, Ordering::SeqCst);
        self.update_gate.add_permits(64);
    }

    /// Observe how many `update_one` calls are parked at the gate.
    pub fn updates_waiting(&self) -> watch::Receiver<usize> {
        self.waiting_tx.subscribe()
    }
}

#[async_trait]
impl RemoteTaskClient for MemClient {
    async fn list_all(&self) -> Result<Vec<RemoteTask>, SyncError> {
        if self.listing_fails.load(Ordering::SeqCst) {
            return Err(SyncError::RemoteCall(anyhow!("injected listing failure")));
        }
        Ok(self.tasks.lock().await.clone())
    }

    async fn update_one(&self, external_id: &str, task: &RemoteTask) -> Result<(), SyncError> {
        if self.updates_held.load(Ordering::SeqCst) {
            self.waiting_tx.send_modify(|n| *n += 1);
            let permit = self.update_gate.acquire().await.unwrap();
            permit.forget();
        }
        if self.fail_update_ids.lock().await.contains(external_id) {
            return Err(SyncError::RemoteCall(anyhow!(
                "injected update failure for {external_id}"
            )));
        }
        self.pushed.lock().await.push(task.clone());
        Ok(())
    }
}
