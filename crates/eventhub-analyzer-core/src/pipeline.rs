//! One analysis run, end to end.

use chrono::{DateTime, Utc};
use log::info;

use crate::diff::{AnalysisResult, analyze};
use crate::error::Result;
use crate::ownership::{OwnershipCounting, OwnershipReport, aggregate};
use crate::records::{RecordSource, list_checkpoints, list_ownerships};
use crate::snapshot::Snapshot;
use crate::store::SnapshotStore;

/// Retrieve checkpoints, snapshot them, persist the snapshot, and diff it
/// against the one persisted by the previous run.
///
/// A retrieval failure aborts before anything is persisted. The new snapshot
/// is saved before diffing, so an [`InvalidInterval`] error still leaves the
/// store ready for the next run.
///
/// [`InvalidInterval`]: crate::error::AnalyzerError::InvalidInterval
pub fn run_offsets<F>(
    source: &dyn RecordSource,
    store: &dyn SnapshotStore,
    clock: F,
) -> Result<AnalysisResult>
where
    F: FnOnce() -> DateTime<Utc>,
{
    let previous = store.load_latest()?;
    let checkpoints = list_checkpoints(source)?;
    let current = Snapshot::build(&checkpoints, clock());

    store.save(&current)?;
    info!(
        "snapshot at {} covers {} partition(s)",
        current.timestamp,
        current.partition_count()
    );

    analyze(&current, previous.as_ref())
}

/// Retrieve ownership claims and count them per owner.
pub fn run_owners(source: &dyn RecordSource, counting: OwnershipCounting) -> Result<OwnershipReport> {
    let ownerships = list_ownerships(source)?;
    Ok(aggregate(&ownerships, counting))
}
