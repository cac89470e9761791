//! Thread-safe set of replication pairs.
//!
//! One mutex covers the whole set. Expected cardinality is tens of
//! pairs, so a linear scan keyed on the source endpoint is fine and
//! dwarfed by network I/O. Lookups return cloned snapshots; all
//! mutation goes through keyed methods under the lock.

use chrono::{DateTime, Local};
use parking_lot::Mutex;

use crate::spec::DirSpec;

/// An active or deactivated replication configuration. The source
/// spec is the identity; everything else is payload.
#[derive(Debug, Clone)]
pub struct SyncPair {
    pub source: DirSpec,
    pub target: DirSpec,
    pub active: bool,
    pub last_sync: DateTime<Local>,
    pub error_count: u32,
}

impl SyncPair {
    pub fn new(source: DirSpec, target: DirSpec) -> Self {
        Self {
            source,
            target,
            active: true,
            last_sync: Local::now(),
            error_count: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// Key existed but was deactivated; flipped back to active with
    /// the newly supplied target.
    Reactivated,
    Duplicate,
}

#[derive(Default)]
pub struct SyncRegistry {
    pairs: Mutex<Vec<SyncPair>>,
}

impl SyncRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pair keyed on its source. An existing active entry is
    /// a duplicate; an existing inactive entry is reactivated and its
    /// target replaced.
    pub fn add(&self, source: DirSpec, target: DirSpec) -> AddOutcome {
        let mut pairs = self.pairs.lock();
        if let Some(existing) = pairs.iter_mut().find(|p| p.source == source) {
            if existing.active {
                return AddOutcome::Duplicate;
            }
            existing.active = true;
            existing.target = target;
            return AddOutcome::Reactivated;
        }
        pairs.push(SyncPair::new(source, target));
        AddOutcome::Added
    }

    /// Exact-match lookup by source key; returns a snapshot.
    pub fn find(&self, source: &DirSpec) -> Option<SyncPair> {
        self.pairs.lock().iter().find(|p| p.source == *source).cloned()
    }

    pub fn is_active(&self, source: &DirSpec) -> bool {
        self.pairs
            .lock()
            .iter()
            .any(|p| p.source == *source && p.active)
    }

    /// Flip `active` off. Succeeds whenever the key is present, even
    /// if already inactive.
    pub fn deactivate(&self, source: &DirSpec) -> bool {
        let mut pairs = self.pairs.lock();
        match pairs.iter_mut().find(|p| p.source == *source) {
            Some(pair) => {
                pair.active = false;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, source: &DirSpec) -> bool {
        let mut pairs = self.pairs.lock();
        let before = pairs.len();
        pairs.retain(|p| p.source != *source);
        pairs.len() < before
    }

    pub fn record_error(&self, source: &DirSpec) {
        let mut pairs = self.pairs.lock();
        if let Some(pair) = pairs.iter_mut().find(|p| p.source == *source) {
            pair.error_count += 1;
        }
    }

    pub fn touch(&self, source: &DirSpec) {
        let mut pairs = self.pairs.lock();
        if let Some(pair) = pairs.iter_mut().find(|p| p.source == *source) {
            pair.last_sync = Local::now();
        }
    }

    pub fn count(&self) -> usize {
        self.pairs.lock().len()
    }

    /// Snapshot of every pair, for display.
    pub fn snapshot(&self) -> Vec<SyncPair> {
        self.pairs.lock().clone()
    }
}
