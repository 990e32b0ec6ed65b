//! Raw checkpoint and ownership records as they come out of the checkpoint store.
//!
//! The Event Hubs checkpoint store keeps one blob per partition and entity kind,
//! named `{namespace}/{event_hub}/{consumer_group}/{kind}/{partition_id}`. The
//! interesting values live in blob metadata: `sequencenumber` and `offset` for
//! checkpoints, `ownerid` for ownership claims.

use std::collections::HashMap;
use std::fmt;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{AnalyzerError, Result};

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// One listed blob: its full name and its (lower-cased) metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedBlob {
    pub name: String,
    pub metadata: HashMap<String, String>,
}

impl ListedBlob {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: HashMap::new(),
        }
    }

    /// Builder-style helper, mostly for tests and fixtures.
    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_lowercase(), value.into());
        self
    }
}

/// Anything that can enumerate the blobs of a checkpoint container.
pub trait RecordSource {
    fn list_blobs(&self) -> Result<Vec<ListedBlob>>;
}

// ---------------------------------------------------------------------------
// Record model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCheckpointRecord {
    pub event_hub: String,
    pub consumer_group: String,
    pub partition_id: String,
    pub sequence_number: i64,
    pub offset: i64,
}

/// A partition claim. Stale claims from earlier owners may coexist with the
/// current one; nothing here tries to tell them apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOwnershipRecord {
    pub event_hub: String,
    pub consumer_group: String,
    pub partition_id: String,
    pub owner_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Checkpoint,
    Ownership,
}

impl EntityKind {
    pub fn parse(segment: &str) -> Option<Self> {
        match segment {
            "checkpoint" => Some(Self::Checkpoint),
            "ownership" => Some(Self::Ownership),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Checkpoint => "checkpoint",
            Self::Ownership => "ownership",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Path decomposition
// ---------------------------------------------------------------------------

/// A blob name split into its five segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobPath<'a> {
    pub namespace: &'a str,
    pub event_hub: &'a str,
    pub consumer_group: &'a str,
    pub kind: EntityKind,
    pub partition_id: &'a str,
}

impl<'a> BlobPath<'a> {
    /// Split `name` into exactly five segments with a known entity kind.
    pub fn parse(name: &'a str) -> Result<Self> {
        let malformed = || AnalyzerError::MalformedPath(name.to_string());

        let segments: Vec<&str> = name.split('/').collect();
        let [namespace, event_hub, consumer_group, kind, partition_id] = segments[..] else {
            return Err(malformed());
        };
        if event_hub.is_empty() || consumer_group.is_empty() || partition_id.is_empty() {
            return Err(malformed());
        }
        let kind = EntityKind::parse(kind).ok_or_else(malformed)?;

        Ok(Self {
            namespace,
            event_hub,
            consumer_group,
            kind,
            partition_id,
        })
    }
}

fn parse_integer(blob: &ListedBlob, key: &'static str) -> Result<i64> {
    let raw = blob.metadata.get(key);
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .ok_or_else(|| AnalyzerError::InvalidMetadata {
            path: blob.name.clone(),
            key,
            value: raw.cloned(),
        })
}

fn checkpoint_from(path: &BlobPath<'_>, blob: &ListedBlob) -> Result<RawCheckpointRecord> {
    Ok(RawCheckpointRecord {
        event_hub: path.event_hub.to_string(),
        consumer_group: path.consumer_group.to_string(),
        partition_id: path.partition_id.to_string(),
        sequence_number: parse_integer(blob, "sequencenumber")?,
        offset: parse_integer(blob, "offset")?,
    })
}

fn ownership_from(path: &BlobPath<'_>, blob: &ListedBlob) -> Result<RawOwnershipRecord> {
    let owner_id = blob
        .metadata
        .get("ownerid")
        .ok_or_else(|| AnalyzerError::InvalidMetadata {
            path: blob.name.clone(),
            key: "ownerid",
            value: None,
        })?;
    Ok(RawOwnershipRecord {
        event_hub: path.event_hub.to_string(),
        consumer_group: path.consumer_group.to_string(),
        partition_id: path.partition_id.to_string(),
        owner_id: owner_id.clone(),
    })
}

/// Walk a listing, keeping blobs of `kind` and converting them with `convert`.
/// Malformed paths and bad metadata are skipped, never fatal.
fn collect<T>(
    blobs: &[ListedBlob],
    kind: EntityKind,
    convert: impl Fn(&BlobPath<'_>, &ListedBlob) -> Result<T>,
) -> Vec<T> {
    let mut out = Vec::new();
    let mut malformed = 0usize;

    for blob in blobs {
        let path = match BlobPath::parse(&blob.name) {
            Ok(p) => p,
            Err(e) => {
                debug!("skipping blob: {e}");
                malformed += 1;
                continue;
            }
        };
        if path.kind != kind {
            continue;
        }
        match convert(&path, blob) {
            Ok(record) => out.push(record),
            Err(e) => warn!("skipping {kind} record: {e}"),
        }
    }

    if malformed > 0 {
        debug!("{malformed} blob(s) did not match the checkpoint store layout");
    }
    out
}

/// Extract checkpoint records from a listing, preserving listing order.
pub fn checkpoints_from_blobs(blobs: &[ListedBlob]) -> Vec<RawCheckpointRecord> {
    collect(blobs, EntityKind::Checkpoint, checkpoint_from)
}

/// Extract ownership records from a listing, preserving listing order.
pub fn ownerships_from_blobs(blobs: &[ListedBlob]) -> Vec<RawOwnershipRecord> {
    collect(blobs, EntityKind::Ownership, ownership_from)
}

pub fn list_checkpoints(source: &dyn RecordSource) -> Result<Vec<RawCheckpointRecord>> {
    let blobs = source.list_blobs()?;
    let records = checkpoints_from_blobs(&blobs);
    info!(
        "retrieved {} checkpoint record(s) from {} blob(s)",
        records.len(),
        blobs.len()
    );
    Ok(records)
}

pub fn list_ownerships(source: &dyn RecordSource) -> Result<Vec<RawOwnershipRecord>> {
    let blobs = source.list_blobs()?;
    let records = ownerships_from_blobs(&blobs);
    info!(
        "retrieved {} ownership record(s) from {} blob(s)",
        records.len(),
        blobs.len()
    );
    Ok(records)
}
