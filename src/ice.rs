//! ICE score codec and priority classifier.
//!
//! TickTick has no native field for the impact/confidence/ease triple, so it
//! is carried inside the free-text task content as a delimited block:
//!
//! ```text
//! ICE:
//! Impact: 7
//! Confidence: 8
//! Ease: 5
//! ```
//!
//! `extract`/`embed` are a pure function pair over that wire format. The
//! block is matched from the `ICE:` marker through the end of its paragraph
//! (the next blank line or end of content); re-embedding replaces it in
//! place and never duplicates the marker.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::tasks::TaskPriority;

/// Marker token introducing the embedded block.
const MARKER: &str = "ICE:";

static ICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"ICE:\s*Impact:\s*(\d+)\s*Confidence:\s*(\d+)\s*Ease:\s*(\d+)")
        .expect("ICE pattern is valid")
});

/// The impact/confidence/ease triple, each conceptually in `[1, 10]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceScore {
    pub impact: i64,
    pub confidence: i64,
    pub ease: i64,
}

impl Default for IceScore {
    fn default() -> Self {
        Self {
            impact: 5,
            confidence: 5,
            ease: 5,
        }
    }
}

impl IceScore {
    pub fn new(impact: i64, confidence: i64, ease: i64) -> Self {
        Self {
            impact,
            confidence,
            ease,
        }
    }
}

/// Scan `content` for an ICE block. Returns `None` when the marker is absent
/// or any of the three fields fails to parse — this is a lookup, never an
/// error.
pub fn extract(content: &str) -> Option<IceScore> {
    let caps = ICE_RE.captures(content)?;
    // \d+ guarantees non-negative digits; values too large for i64 are
    // treated as no block at all rather than an error.
    let impact = caps[1].parse().ok()?;
    let confidence = caps[2].parse().ok()?;
    let ease = caps[3].parse().ok()?;
    Some(IceScore {
        impact,
        confidence,
        ease,
    })
}

/// Serialize `ice` into `content`. An existing block is replaced in place
/// (same position, surrounding text untouched); otherwise the block is
/// appended after a blank line. Idempotent.
pub fn embed(content: &str, ice: &IceScore) -> String {
    let block = format!(
        "ICE:\nImpact: {}\nConfidence: {}\nEase: {}",
        ice.impact, ice.confidence, ice.ease
    );

    match content.find(MARKER) {
        Some(start) => {
            // Replace from the marker through the end of its paragraph.
            let end = content[start..]
                .find("\n\n")
                .map(|i| start + i)
                .unwrap_or(content.len());
            format!("{}{}{}", &content[..start], block, &content[end..])
        }
        None => format!("{content}\n\n{block}"),
    }
}

/// Map an ICE triple to a priority bucket by averaging the three fields.
/// Bands are inclusive at their lower edge, exclusive at the upper.
pub fn classify(ice: &IceScore) -> TaskPriority {
    let avg = (ice.impact + ice.confidence + ice.ease) as f64 / 3.0;
    if avg >= 8.0 {
        TaskPriority::High
    } else if avg >= 5.0 {
        TaskPriority::Medium
    } else if avg >= 3.0 {
        TaskPriority::Low
    } else {
        TaskPriority::None
    }
}

/// Write-time variant: classification only happens when all three fields are
/// present; otherwise the priority is left untouched by the caller.
pub fn classify_fields(
    impact: Option<i64>,
    confidence: Option<i64>,
    ease: Option<i64>,
) -> Option<TaskPriority> {
    match (impact, confidence, ease) {
        (Some(i), Some(c), Some(e)) => Some(classify(&IceScore::new(i, c, e))),
        _ => None,
    }
}
