//! Bounded, ordered sample window with cursor-based merge.
//!
//! Samples live in a `HeapRb` sized to the window capacity; once full, every append
//! evicts the oldest entry, which is exactly "append then keep the last N".

use std::fmt;
use std::sync::Arc;

use contracts::{Sample, Timestamp};
use ringbuf::{traits::*, HeapRb};

/// What a merge did to the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Empty batch, or nothing newer than the cursor
    Unchanged,
    /// Window rebuilt from the batch
    Replaced { len: usize },
    /// New points appended, oldest evicted past capacity
    Appended { added: usize, evicted: usize },
}

impl MergeOutcome {
    /// Metric label
    pub fn mode(&self) -> &'static str {
        match self {
            MergeOutcome::Unchanged => "noop",
            MergeOutcome::Replaced { .. } => "replace",
            MergeOutcome::Appended { .. } => "append",
        }
    }

    pub fn changed(&self) -> bool {
        !matches!(self, MergeOutcome::Unchanged)
    }
}

/// Display window
///
/// Invariants: `len() <= capacity()`, timestamps strictly increasing,
/// `cursor()` is the timestamp of the last sample (or `None` when empty).
pub struct SampleWindow {
    ring: HeapRb<Sample>,
    capacity: usize,
    cursor: Option<Timestamp>,
}

impl fmt::Debug for SampleWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleWindow")
            .field("len", &self.ring.occupied_len())
            .field("capacity", &self.capacity)
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl SampleWindow {
    /// Create an empty window holding at most `capacity` samples (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: HeapRb::new(capacity),
            capacity,
            cursor: None,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Timestamp of the newest sample
    #[inline]
    pub fn cursor(&self) -> Option<&Timestamp> {
        self.cursor.as_ref()
    }

    /// Samples, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.ring.iter()
    }

    /// Immutable copy handed to display sinks
    pub fn snapshot(&self) -> Arc<[Sample]> {
        self.ring.iter().cloned().collect()
    }

    /// Merge a freshly fetched batch
    ///
    /// - empty batch: unchanged
    /// - empty window, or batch shorter than capacity: replace
    /// - otherwise: append samples newer than the cursor
    pub fn merge(&mut self, batch: Vec<Sample>) -> MergeOutcome {
        if batch.is_empty() {
            return MergeOutcome::Unchanged;
        }
        if self.is_empty() || batch.len() < self.capacity {
            return self.replace(batch);
        }
        self.append_newer(batch)
    }

    /// Rebuild the window from `batch`, keeping its last `capacity` samples.
    ///
    /// Samples that do not advance past their predecessor are skipped so the window stays
    /// strictly increasing even if the backend misbehaves.
    pub fn replace(&mut self, batch: Vec<Sample>) -> MergeOutcome {
        self.clear();
        let mut last: Option<Timestamp> = None;
        for sample in batch {
            if last.as_ref().is_some_and(|t| sample.timestamp <= *t) {
                continue;
            }
            last = Some(sample.timestamp.clone());
            self.push_evicting(sample);
        }
        self.cursor = last;
        MergeOutcome::Replaced { len: self.len() }
    }

    fn append_newer(&mut self, batch: Vec<Sample>) -> MergeOutcome {
        let mut added = 0;
        let mut evicted = 0;
        for sample in batch {
            if self.cursor.as_ref().is_some_and(|c| sample.timestamp <= *c) {
                continue;
            }
            self.cursor = Some(sample.timestamp.clone());
            if self.push_evicting(sample) {
                evicted += 1;
            }
            added += 1;
        }

        if added == 0 {
            MergeOutcome::Unchanged
        } else {
            MergeOutcome::Appended { added, evicted }
        }
    }

    /// Push, dropping the oldest entry when full. Returns whether an entry was dropped.
    #[inline]
    fn push_evicting(&mut self, sample: Sample) -> bool {
        let evicted = self.ring.is_full() && self.ring.try_pop().is_some();
        let _ = self.ring.try_push(sample);
        evicted
    }

    /// Drop every sample and reset the cursor
    pub fn clear(&mut self) {
        self.ring.pop_iter().for_each(drop);
        self.cursor = None;
    }
}
