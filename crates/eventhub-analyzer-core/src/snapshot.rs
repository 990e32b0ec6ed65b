//! Point-in-time checkpoint snapshots.
//!
//! A [`Snapshot`] groups the checkpoints of one retrieval by event hub, then
//! consumer group, then partition id. Each key path holds exactly one
//! [`PartitionCheckpoint`]; when the input contains several records for the
//! same path, the last one wins.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::records::RawCheckpointRecord;

/// Checkpoint state of one partition. Its identity is the key path it sits under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionCheckpoint {
    pub sequence_number: i64,
    pub offset: i64,
}

/// partition id -> checkpoint
pub type Partitions = BTreeMap<String, PartitionCheckpoint>;
/// consumer group -> partitions
pub type ConsumerGroups = BTreeMap<String, Partitions>;
/// event hub -> consumer groups
pub type EventHubs = BTreeMap<String, ConsumerGroups>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub groups: EventHubs,
}

impl Snapshot {
    /// Group raw checkpoints by key. Input order only matters for duplicates:
    /// the last record for a (event hub, consumer group, partition) path wins.
    pub fn build<'a, I>(raw_checkpoints: I, captured_at: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = &'a RawCheckpointRecord>,
    {
        let mut groups = EventHubs::new();
        for raw in raw_checkpoints {
            groups
                .entry(raw.event_hub.clone())
                .or_default()
                .entry(raw.consumer_group.clone())
                .or_default()
                .insert(
                    raw.partition_id.clone(),
                    PartitionCheckpoint {
                        sequence_number: raw.sequence_number,
                        offset: raw.offset,
                    },
                );
        }
        Self {
            timestamp: captured_at,
            groups,
        }
    }

    pub fn get(
        &self,
        event_hub: &str,
        consumer_group: &str,
        partition_id: &str,
    ) -> Option<&PartitionCheckpoint> {
        self.groups
            .get(event_hub)?
            .get(consumer_group)?
            .get(partition_id)
    }

    /// Iterate `(event hub, consumer group, partitions)` in name order.
    pub fn consumer_groups(&self) -> impl Iterator<Item = (&str, &str, &Partitions)> {
        self.groups.iter().flat_map(|(eh, cgs)| {
            cgs.iter()
                .map(move |(cg, parts)| (eh.as_str(), cg.as_str(), parts))
        })
    }

    pub fn partition_count(&self) -> usize {
        self.consumer_groups().map(|(_, _, p)| p.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Order two partition ids numerically; ids that are not integers sort after
/// all numeric ones, lexicographically.
pub fn compare_partition_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Partition ids of one consumer group in presentation order.
pub fn sorted_partition_ids(partitions: &Partitions) -> Vec<&str> {
    let mut ids: Vec<&str> = partitions.keys().map(String::as_str).collect();
    ids.sort_by(|a, b| compare_partition_ids(a, b));
    ids
}
