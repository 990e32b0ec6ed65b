//! # eventhub-analyzer-core
//!
//! **Is every partition being consumed, how fast, and by whom?**
//!
//! `eventhub-analyzer-core` reads the checkpoint and ownership blobs that an
//! Event Hubs consumer group keeps in a storage container and turns them into
//! per-partition throughput and ownership distribution.
//!
//! ## Quick Start
//!
//! ```no_run
//! use eventhub_analyzer_core::{
//!     AnalysisResult, BlobContainerClient, JsonFileStore, run_offsets, blob::DEFAULT_TIMEOUT,
//! };
//!
//! let source = BlobContainerClient::from_connection_string(
//!     "UseDevelopmentStorage=true",
//!     "checkpoints",
//!     DEFAULT_TIMEOUT,
//! )?;
//! let store = JsonFileStore::new("data.json");
//!
//! match run_offsets(&source, &store, chrono::Utc::now)? {
//!     AnalysisResult::NoPreviousData => println!("run again in a minute"),
//!     AnalysisResult::Rates(report) => {
//!         for rate in &report.rates {
//!             println!("{}/{}: {:?}", rate.consumer_group, rate.partition_id, rate.events_per_second());
//!         }
//!     }
//! }
//! # Ok::<(), eventhub_analyzer_core::AnalyzerError>(())
//! ```
//!
//! ## Architecture
//!
//! Blob listing → raw records → [`Snapshot`] → persisted → diffed against the
//! previous [`Snapshot`] → [`RateReport`].
//!
//! Ownership records are aggregated independently on every run and never
//! persisted.

pub mod blob;
pub mod diff;
pub mod error;
pub mod ownership;
pub mod pipeline;
pub mod records;
pub mod snapshot;
pub mod store;

pub use blob::{BlobContainerClient, Credentials, StorageAccount};
pub use diff::{AnalysisResult, GroupRates, PartitionRate, RateReport, Throughput, analyze};
pub use error::{AnalyzerError, Result};
pub use ownership::{GroupKey, OwnerSummary, OwnershipCounting, OwnershipReport, aggregate};
pub use pipeline::{run_offsets, run_owners};
pub use records::{
    BlobPath, EntityKind, ListedBlob, RawCheckpointRecord, RawOwnershipRecord, RecordSource,
    checkpoints_from_blobs, list_checkpoints, list_ownerships, ownerships_from_blobs,
};
pub use snapshot::{PartitionCheckpoint, Snapshot, compare_partition_ids, sorted_partition_ids};
pub use store::{JsonFileStore, MemoryStore, SnapshotStore};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
