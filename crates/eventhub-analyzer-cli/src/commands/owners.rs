use eventhub_analyzer_core::{OwnershipCounting, OwnershipReport, ownership, run_owners};

use crate::StorageArgs;

pub fn run(storage: &StorageArgs, distinct_partitions: bool, output: Option<&str>) {
    let client = super::connect(storage);
    let counting = if distinct_partitions {
        OwnershipCounting::DistinctPartitions
    } else {
        OwnershipCounting::Records
    };

    let report = match run_owners(&client, counting) {
        Ok(report) => report,
        Err(e) => super::fail(e),
    };

    print!("{}", render_report(&report));

    if let Some(path) = output {
        super::write_json(&ownership::nested(&report), path, "Results");
    }
}

fn render_report(report: &OwnershipReport) -> String {
    if report.is_empty() {
        return "No ownership records found in the container.\n".to_string();
    }
    let mut out = String::new();
    for (key, summary) in report {
        out.push_str(&format!("{key}\n"));
        for (owner, count) in &summary.partition_counts {
            out.push_str(&format!("{owner} owns {count} partitions\n"));
        }
        out.push_str(&format!("{} owners in total\n\n", summary.distinct_owner_count));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventhub_analyzer_core::{RawOwnershipRecord, aggregate};

    fn claim(cg: &str, partition: &str, owner: &str) -> RawOwnershipRecord {
        RawOwnershipRecord {
            event_hub: "eh1".to_string(),
            consumer_group: cg.to_string(),
            partition_id: partition.to_string(),
            owner_id: owner.to_string(),
        }
    }

    #[test]
    fn test_render_counts_per_owner() {
        let records = vec![
            claim("cg1", "0", "ownerA"),
            claim("cg1", "1", "ownerA"),
            claim("cg1", "2", "ownerB"),
        ];
        let text = render_report(&aggregate(&records, OwnershipCounting::Records));
        assert_eq!(
            text,
            "Event Hub: eh1, Consumer Group: cg1\n\
             ownerA owns 2 partitions\n\
             ownerB owns 1 partitions\n\
             2 owners in total\n\n"
        );
    }

    #[test]
    fn test_render_empty_report() {
        let text = render_report(&OwnershipReport::new());
        assert!(text.starts_with("No ownership records"));
    }
}
