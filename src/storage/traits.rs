//! Storage trait for run records.

use super::record::RunRecord;
use crate::error::Result;

/// Append-only store of run snapshots.
///
/// Records are never updated or removed; `append` grows the store by exactly
/// one record or fails without touching what is already there.
pub trait RunStore: Send + Sync {
    /// Append a record; returns the number of records stored afterwards.
    fn append(&self, record: &RunRecord) -> Result<usize>;

    /// Every record, oldest first.
    fn load(&self) -> Result<Vec<RunRecord>>;
}
