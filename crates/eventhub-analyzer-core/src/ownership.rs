//! Partition ownership distribution per consumer group.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::records::RawOwnershipRecord;

/// How ownership claims are tallied per owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OwnershipCounting {
    /// Every ownership record counts, including stale or duplicate claims.
    #[default]
    Records,
    /// Each (owner, partition) pair counts once.
    DistinctPartitions,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupKey {
    pub event_hub: String,
    pub consumer_group: String,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event Hub: {}, Consumer Group: {}",
            self.event_hub, self.consumer_group
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OwnerSummary {
    pub partition_counts: BTreeMap<String, usize>,
    pub distinct_owner_count: usize,
}

pub type OwnershipReport = BTreeMap<GroupKey, OwnerSummary>;

/// Group ownership records by event hub and consumer group and count claims
/// per owner id.
pub fn aggregate<'a, I>(raw_ownerships: I, counting: OwnershipCounting) -> OwnershipReport
where
    I: IntoIterator<Item = &'a RawOwnershipRecord>,
{
    let mut claims: BTreeMap<GroupKey, BTreeMap<&'a str, Vec<&'a str>>> = BTreeMap::new();
    for record in raw_ownerships {
        let key = GroupKey {
            event_hub: record.event_hub.clone(),
            consumer_group: record.consumer_group.clone(),
        };
        claims
            .entry(key)
            .or_default()
            .entry(record.owner_id.as_str())
            .or_default()
            .push(record.partition_id.as_str());
    }

    claims
        .into_iter()
        .map(|(key, owners)| {
            let partition_counts: BTreeMap<String, usize> = owners
                .into_iter()
                .map(|(owner, partitions)| {
                    let count = match counting {
                        OwnershipCounting::Records => partitions.len(),
                        OwnershipCounting::DistinctPartitions => {
                            partitions.into_iter().collect::<BTreeSet<_>>().len()
                        }
                    };
                    (owner.to_string(), count)
                })
                .collect();
            let summary = OwnerSummary {
                distinct_owner_count: partition_counts.len(),
                partition_counts,
            };
            (key, summary)
        })
        .collect()
}

/// Re-key a report as `event hub -> consumer group -> summary`, the shape
/// used for JSON output.
pub fn nested(report: &OwnershipReport) -> BTreeMap<&str, BTreeMap<&str, &OwnerSummary>> {
    let mut out: BTreeMap<&str, BTreeMap<&str, &OwnerSummary>> = BTreeMap::new();
    for (key, summary) in report {
        out.entry(key.event_hub.as_str())
            .or_default()
            .insert(key.consumer_group.as_str(), summary);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn own(eh: &str, cg: &str, p: &str, owner: &str) -> RawOwnershipRecord {
        RawOwnershipRecord {
            event_hub: eh.to_string(),
            consumer_group: cg.to_string(),
            partition_id: p.to_string(),
            owner_id: owner.to_string(),
        }
    }

    fn key(eh: &str, cg: &str) -> GroupKey {
        GroupKey {
            event_hub: eh.to_string(),
            consumer_group: cg.to_string(),
        }
    }

    #[test]
    fn test_counts_per_owner() {
        let records = vec![
            own("eh1", "cg1", "0", "ownerA"),
            own("eh1", "cg1", "1", "ownerA"),
            own("eh1", "cg1", "2", "ownerB"),
        ];
        let report = aggregate(&records, OwnershipCounting::Records);

        assert_eq!(report.len(), 1);
        let summary = &report[&key("eh1", "cg1")];
        assert_eq!(summary.partition_counts["ownerA"], 2);
        assert_eq!(summary.partition_counts["ownerB"], 1);
        assert_eq!(summary.distinct_owner_count, 2);
    }

    #[test]
    fn test_empty_input() {
        let report = aggregate(&Vec::<RawOwnershipRecord>::new(), OwnershipCounting::Records);
        assert!(report.is_empty());
    }

    #[test]
    fn test_groups_are_independent_and_order_free() {
        let records = vec![
            own("eh1", "cg1", "0", "a"),
            own("eh2", "cg1", "0", "a"),
            own("eh1", "cg2", "0", "b"),
            own("eh1", "cg1", "1", "b"),
            own("eh1", "cg1", "2", "a"),
        ];
        let report = aggregate(&records, OwnershipCounting::Records);
        assert_eq!(report.len(), 3);

        let cg1 = &report[&key("eh1", "cg1")];
        // Non-contiguous records of the same owner are counted together.
        assert_eq!(cg1.partition_counts["a"], 2);
        assert_eq!(cg1.partition_counts["b"], 1);
        assert_eq!(cg1.distinct_owner_count, 2);

        assert_eq!(report[&key("eh2", "cg1")].distinct_owner_count, 1);
        assert_eq!(report[&key("eh1", "cg2")].partition_counts["b"], 1);
    }

    #[test]
    fn test_duplicate_claims_counted_as_records() {
        let records = vec![
            own("eh", "cg", "0", "a"),
            own("eh", "cg", "0", "a"),
            own("eh", "cg", "1", "a"),
        ];
        let by_record = aggregate(&records, OwnershipCounting::Records);
        assert_eq!(by_record[&key("eh", "cg")].partition_counts["a"], 3);

        let by_partition = aggregate(&records, OwnershipCounting::DistinctPartitions);
        assert_eq!(by_partition[&key("eh", "cg")].partition_counts["a"], 2);
    }

    #[test]
    fn test_group_key_display() {
        assert_eq!(
            key("orders", "$default").to_string(),
            "Event Hub: orders, Consumer Group: $default"
        );
    }

    #[test]
    fn test_nested_json_shape() {
        let records = vec![
            own("eh1", "cg1", "p0", "ownerA"),
            own("eh1", "cg1", "p1", "ownerA"),
            own("eh1", "cg1", "p2", "ownerB"),
        ];
        let report = aggregate(&records, OwnershipCounting::Records);
        let json = serde_json::to_value(nested(&report)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "eh1": {
                    "cg1": {
                        "partition_counts": {"ownerA": 2, "ownerB": 1},
                        "distinct_owner_count": 2
                    }
                }
            })
        );
    }
}
