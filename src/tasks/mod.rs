//! Local task model.
//!
//! A task is joined to its TickTick counterpart by `external_id` — the
//! stable identifier assigned by the remote service, immutable once set.
//! `last_sync` is the only field the engine itself stamps; everything else
//! is authored either remotely (pull path) or locally (ICE edits).

pub mod store;

use serde::{Deserialize, Serialize};

use crate::ice;

// ─── Status ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Completed,
}

impl TaskStatus {
    /// Fixed mapping from the TickTick numeric status code.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Todo,
            1 => Self::InProgress,
            _ => Self::Completed,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Todo => 0,
            Self::InProgress => 1,
            Self::Completed => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "todo" => Self::Todo,
            "in_progress" => Self::InProgress,
            _ => Self::Completed,
        }
    }
}

// ─── Priority ─────────────────────────────────────────────────────────────────

/// Coarse priority bucket. Derived from the ICE triple on write — never
/// independently authored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    None,
    Low,
    Medium,
    High,
}

impl TaskPriority {
    /// Fixed mapping from the TickTick numeric priority code.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::None,
            1 => Self::Low,
            3 => Self::Medium,
            _ => Self::High,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::None => 0,
            Self::Low => 1,
            Self::Medium => 3,
            Self::High => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            _ => Self::None,
        }
    }
}

// ─── Records ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub external_id: String,
    pub title: String,
    pub content: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub impact: i64,
    pub confidence: i64,
    pub ease: i64,
    /// RFC 3339 instants as supplied by TickTick.
    pub due_date: Option<String>,
    pub start_date: Option<String>,
    pub tags: Vec<String>,
    /// Last successful reconciliation with the remote side. Engine-owned.
    pub last_sync: Option<String>,
}

impl TaskRecord {
    /// Recompute the derived priority from the record's ICE triple.
    ///
    /// Stores apply this before persisting any full write, so a priority
    /// supplied alongside a complete triple never survives persistence.
    pub fn with_derived_priority(mut self) -> Self {
        self.priority = ice::classify(&ice::IceScore::new(self.impact, self.confidence, self.ease));
        self
    }
}

/// Partial update applied by `TaskStore::update`. `None` fields are left
/// unchanged; `external_id` is deliberately absent (immutable join key).
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub impact: Option<i64>,
    pub confidence: Option<i64>,
    pub ease: Option<i64>,
    pub due_date: Option<String>,
    pub start_date: Option<String>,
    pub tags: Option<Vec<String>>,
    pub last_sync: Option<String>,
}

impl TaskPatch {
    /// Write-time invariant: a patch carrying the full ICE triple has its
    /// priority derived from it, overriding any priority in the patch. A
    /// partial triple leaves the priority as supplied.
    pub fn derive_priority(mut self) -> Self {
        if let Some(p) = ice::classify_fields(self.impact, self.confidence, self.ease) {
            self.priority = Some(p);
        }
        self
    }

    /// Overlay this patch onto an existing record.
    pub fn apply_to(self, mut rec: TaskRecord) -> TaskRecord {
        let patch = self.derive_priority();
        if let Some(v) = patch.title {
            rec.title = v;
        }
        if let Some(v) = patch.content {
            rec.content = v;
        }
        if let Some(v) = patch.status {
            rec.status = v;
        }
        if let Some(v) = patch.priority {
            rec.priority = v;
        }
        if let Some(v) = patch.impact {
            rec.impact = v;
        }
        if let Some(v) = patch.confidence {
            rec.confidence = v;
        }
        if let Some(v) = patch.ease {
            rec.ease = v;
        }
        if let Some(v) = patch.due_date {
            rec.due_date = Some(v);
        }
        if let Some(v) = patch.start_date {
            rec.start_date = Some(v);
        }
        if let Some(v) = patch.tags {
            rec.tags = v;
        }
        if let Some(v) = patch.last_sync {
            rec.last_sync = Some(v);
        }
        rec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_table() {
        assert_eq!(TaskStatus::from_code(0), TaskStatus::Todo);
        assert_eq!(TaskStatus::from_code(1), TaskStatus::InProgress);
        assert_eq!(TaskStatus::from_code(2), TaskStatus::Completed);
        assert_eq!(TaskStatus::from_code(99), TaskStatus::Completed);
    }

    #[test]
    fn priority_code_table() {
        assert_eq!(TaskPriority::from_code(0), TaskPriority::None);
        assert_eq!(TaskPriority::from_code(1), TaskPriority::Low);
        assert_eq!(TaskPriority::from_code(3), TaskPriority::Medium);
        assert_eq!(TaskPriority::from_code(5), TaskPriority::High);
        assert_eq!(TaskPriority::from_code(7), TaskPriority::High);
    }

    #[test]
    fn full_ice_patch_overrides_supplied_priority() {
        let patch = TaskPatch {
            priority: Some(TaskPriority::None),
            impact: Some(9),
            confidence: Some(9),
            ease: Some(9),
            ..Default::default()
        }
        .derive_priority();
        assert_eq!(patch.priority, Some(TaskPriority::High));
    }

    #[test]
    fn partial_ice_patch_leaves_priority_untouched() {
        let patch = TaskPatch {
            impact: Some(9),
            ..Default::default()
        }
        .derive_priority();
        assert_eq!(patch.priority, None);
    }
}
