use std::{collections::HashSet, time::Duration};

use chrono::{DateTime, Utc};

/// Maximum age a post may have at first observation before it is treated as
/// backlog and suppressed (startup/reconnect replay protection).
pub const BACKLOG_MAX_AGE: Duration = Duration::from_secs(300);

/// In-memory set of post IDs that have already been handled.
///
/// Insert-only for the process lifetime: once an ID is marked it is never
/// removed, guaranteeing at most one reaction per post per run. State is not
/// persisted across restarts.
#[derive(Default)]
pub struct DedupLedger {
    seen: HashSet<i64>,
}

impl DedupLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn has_processed(&self, id: i64) -> bool {
        self.seen.contains(&id)
    }

    pub fn mark_processed(&mut self, id: i64) {
        self.seen.insert(id);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// True if a post published at `date` counts as backlog when first seen now.
#[must_use]
pub fn is_backlog(date: DateTime<Utc>) -> bool {
    is_backlog_at(date, Utc::now())
}

/// Implementation of [`is_backlog`] with an explicit observation time; the
/// separate signature makes the threshold testable without real clock waits.
fn is_backlog_at(date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let age = now.signed_duration_since(date);
    age.num_seconds() > BACKLOG_MAX_AGE.as_secs() as i64
}
