//! Snapshot diffing: per-partition event and byte rates between two runs.
//!
//! Only the current snapshot's key space is walked. A partition that is new
//! since the previous run gets [`Throughput::NoPreviousData`]; a partition that
//! disappeared is not reported. Negative rates (sequence number resets) are
//! surfaced unchanged.

use chrono::{DateTime, TimeDelta, Utc};
use log::debug;
use serde::Serialize;

use crate::error::{AnalyzerError, Result};
use crate::snapshot::{PartitionCheckpoint, Snapshot, sorted_partition_ids};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Rate of one partition, or the explicit absence of one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Throughput {
    Measured {
        events_per_second: f64,
        bytes_per_second: f64,
        sequence_delta: i128,
        offset_delta: i128,
    },
    /// The partition had no checkpoint in the previous snapshot.
    NoPreviousData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionRate {
    pub event_hub: String,
    pub consumer_group: String,
    pub partition_id: String,
    #[serde(flatten)]
    pub throughput: Throughput,
}

impl PartitionRate {
    pub fn events_per_second(&self) -> Option<f64> {
        match self.throughput {
            Throughput::Measured {
                events_per_second, ..
            } => Some(events_per_second),
            Throughput::NoPreviousData => None,
        }
    }

    pub fn bytes_per_second(&self) -> Option<f64> {
        match self.throughput {
            Throughput::Measured {
                bytes_per_second, ..
            } => Some(bytes_per_second),
            Throughput::NoPreviousData => None,
        }
    }
}

/// Rates for every partition of the current snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateReport {
    pub previous_at: DateTime<Utc>,
    pub current_at: DateTime<Utc>,
    pub elapsed_seconds: f64,
    /// Ordered by event hub, consumer group, then partition id numerically.
    pub rates: Vec<PartitionRate>,
}

/// Rates of one (event hub, consumer group), borrowed from a [`RateReport`].
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRates<'a> {
    pub event_hub: &'a str,
    pub consumer_group: &'a str,
    pub rates: &'a [PartitionRate],
}

impl RateReport {
    /// Split the ordered rates into consecutive (event hub, consumer group) runs.
    pub fn by_group(&self) -> Vec<GroupRates<'_>> {
        self.rates
            .chunk_by(|a, b| a.event_hub == b.event_hub && a.consumer_group == b.consumer_group)
            .map(|chunk| GroupRates {
                event_hub: &chunk[0].event_hub,
                consumer_group: &chunk[0].consumer_group,
                rates: chunk,
            })
            .collect()
    }

    pub fn measured_count(&self) -> usize {
        self.rates
            .iter()
            .filter(|r| matches!(r.throughput, Throughput::Measured { .. }))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AnalysisResult {
    /// No snapshot has been persisted yet; nothing to compare against.
    NoPreviousData,
    Rates(RateReport),
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

fn measure(current: &PartitionCheckpoint, previous: &PartitionCheckpoint, secs: f64) -> Throughput {
    // Widened so that any pair of i64 checkpoints has an exact difference.
    let sequence_delta = i128::from(current.sequence_number) - i128::from(previous.sequence_number);
    let offset_delta = i128::from(current.offset) - i128::from(previous.offset);
    Throughput::Measured {
        events_per_second: sequence_delta as f64 / secs,
        bytes_per_second: offset_delta as f64 / secs,
        sequence_delta,
        offset_delta,
    }
}

fn seconds(elapsed: TimeDelta) -> f64 {
    if let Some(ns) = elapsed.num_nanoseconds() {
        ns as f64 / 1_000_000_000.0
    } else if let Some(us) = elapsed.num_microseconds() {
        us as f64 / 1_000_000.0
    } else {
        elapsed.num_milliseconds() as f64 / 1_000.0
    }
}

/// Compare `current` against `previous`.
///
/// Fails with [`AnalyzerError::InvalidInterval`] unless `previous` is strictly
/// older than `current`.
pub fn analyze(current: &Snapshot, previous: Option<&Snapshot>) -> Result<AnalysisResult> {
    let Some(previous) = previous else {
        return Ok(AnalysisResult::NoPreviousData);
    };

    let elapsed = current.timestamp - previous.timestamp;
    if elapsed <= TimeDelta::zero() {
        return Err(AnalyzerError::InvalidInterval {
            previous: previous.timestamp,
            current: current.timestamp,
        });
    }
    let elapsed_seconds = seconds(elapsed);

    let mut rates = Vec::with_capacity(current.partition_count());
    let mut new_partitions = 0usize;

    for (event_hub, consumer_group, partitions) in current.consumer_groups() {
        for partition_id in sorted_partition_ids(partitions) {
            let now = &partitions[partition_id];
            let throughput = match previous.get(event_hub, consumer_group, partition_id) {
                Some(before) => measure(now, before, elapsed_seconds),
                None => {
                    new_partitions += 1;
                    Throughput::NoPreviousData
                }
            };
            rates.push(PartitionRate {
                event_hub: event_hub.to_string(),
                consumer_group: consumer_group.to_string(),
                partition_id: partition_id.to_string(),
                throughput,
            });
        }
    }

    debug!(
        "compared {} partition(s) over {elapsed_seconds:.3}s, {new_partitions} without previous data",
        rates.len()
    );

    Ok(AnalysisResult::Rates(RateReport {
        previous_at: previous.timestamp,
        current_at: current.timestamp,
        elapsed_seconds,
        rates,
    }))
}
