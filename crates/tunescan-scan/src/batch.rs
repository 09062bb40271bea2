//! Bounded record batches.

use tunescan_core::TrackRecord;

/// Ordered buffer of records awaiting commit.
///
/// With a batch size of `B > 0`, [`Batch::push`] hands back exactly `B`
/// records each time the buffer fills. A batch size of 0 never fills; the
/// whole scan is drained by [`Batch::take`] at the end.
#[derive(Debug, Default)]
pub struct Batch {
    records: Vec<TrackRecord>,
    size: usize,
}

impl Batch {
    /// Create an empty batch with the given threshold.
    pub fn new(size: usize) -> Self {
        Self {
            records: Vec::new(),
            size,
        }
    }

    /// Append a record, returning the full batch once the threshold is hit.
    pub fn push(&mut self, record: TrackRecord) -> Option<Vec<TrackRecord>> {
        self.records.push(record);
        if self.size > 0 && self.records.len() >= self.size {
            Some(std::mem::take(&mut self.records))
        } else {
            None
        }
    }

    /// Take the remaining records, if any.
    pub fn take(&mut self) -> Option<Vec<TrackRecord>> {
        if self.records.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.records))
        }
    }

    /// Drop the remaining records, returning how many were dropped.
    pub fn discard(&mut self) -> usize {
        let dropped = self.records.len();
        self.records.clear();
        dropped
    }

    /// Records currently buffered.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
