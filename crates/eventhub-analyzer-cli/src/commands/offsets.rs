use chrono::Utc;
use eventhub_analyzer_core::{AnalysisResult, GroupRates, JsonFileStore, RateReport, run_offsets};

use crate::StorageArgs;

const NO_PREVIOUS_RUN: &str =
    "No previous run found, cannot perform analysis. Wait a minute and run this command again.";

pub fn run(storage: &StorageArgs, data_file: &str, output: Option<&str>) {
    let client = super::connect(storage);
    let store = JsonFileStore::new(data_file);

    let result = match run_offsets(&client, &store, Utc::now) {
        Ok(result) => result,
        Err(e) => super::fail(e),
    };

    match &result {
        AnalysisResult::NoPreviousData => println!("{NO_PREVIOUS_RUN}"),
        AnalysisResult::Rates(report) => print!("{}", render_report(report)),
    }

    if let Some(path) = output {
        super::write_json(&result, path, "Results");
    }
}

fn format_rate(rate: Option<f64>) -> String {
    match rate {
        Some(r) => format!("{r:.3}"),
        None => "n/a".to_string(),
    }
}

fn render_report(report: &RateReport) -> String {
    let mut out = format!(
        "Interval: {} -> {} ({:.1}s)\n\n",
        report.previous_at.to_rfc3339(),
        report.current_at.to_rfc3339(),
        report.elapsed_seconds
    );
    if report.rates.is_empty() {
        out.push_str("No checkpoints found in the container.\n");
        return out;
    }
    for group in report.by_group() {
        out.push_str(&render_group(&group));
        out.push('\n');
    }
    let new_partitions = report.rates.len() - report.measured_count();
    if new_partitions > 0 {
        out.push_str(&format!(
            "{new_partitions} partition(s) had no checkpoint in the previous run (n/a).\n"
        ));
    }
    out
}

fn render_group(group: &GroupRates<'_>) -> String {
    let rows: Vec<Vec<String>> = group
        .rates
        .iter()
        .map(|rate| {
            vec![
                rate.event_hub.clone(),
                rate.consumer_group.clone(),
                rate.partition_id.clone(),
                format_rate(rate.events_per_second()),
                format_rate(rate.bytes_per_second()),
            ]
        })
        .collect();
    let mut out = format!(
        "Event Hub: {}, Consumer Group: {}\n",
        group.event_hub, group.consumer_group
    );
    out.push_str(&super::render_table(
        &["Event Hub", "Consumer Group", "Partition", "Events/s", "Bytes/s"],
        &rows,
        &[false, false, false, true, true],
    ));
    out
}
