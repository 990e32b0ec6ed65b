pub mod offsets;
pub mod owners;

use std::fmt::Display;
use std::time::Duration;

use eventhub_analyzer_core::BlobContainerClient;
use log::debug;
use serde::Serialize;

use crate::StorageArgs;

/// Print an error and exit with status 1.
pub fn fail(err: impl Display) -> ! {
    eprintln!("Error: {err}");
    std::process::exit(1);
}

/// Build a blob client for the configured container, or exit.
pub fn connect(storage: &StorageArgs) -> BlobContainerClient {
    match BlobContainerClient::from_connection_string(
        &storage.connection_string,
        &storage.container_name,
        Duration::from_secs(storage.timeout_sec),
    ) {
        Ok(client) => {
            debug!("listing container {:?}", storage.container_name);
            client
        }
        Err(e) => fail(e),
    }
}

/// Write `value` as pretty JSON to `path`.
pub fn write_json<T: Serialize + ?Sized>(value: &T, path: &str, label: &str) {
    let json = match serde_json::to_string_pretty(value) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Failed to serialize {label}: {e}");
            return;
        }
    };
    match std::fs::write(path, json) {
        Ok(()) => println!("{label} written to {path}"),
        Err(e) => eprintln!("Failed to write {path}: {e}"),
    }
}

/// Render rows as a left/right aligned text table with a header rule.
/// `right_aligned[i]` selects the alignment of column `i`.
pub fn render_table(header: &[&str], rows: &[Vec<String>], right_aligned: &[bool]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    out.push_str(&format_row(header, &widths, right_aligned));
    out.push('\n');
    let total = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    out.push_str(&"=".repeat(total));
    out.push('\n');
    for row in rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push_str(&format_row(&cells, &widths, right_aligned));
        out.push('\n');
    }
    out
}

fn format_row(cells: &[&str], widths: &[usize], right_aligned: &[bool]) -> String {
    let line: Vec<String> = cells
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let w = widths.get(i).copied().unwrap_or(0);
            if right_aligned.get(i).copied().unwrap_or(false) {
                format!("{cell:>w$}")
            } else {
                format!("{cell:<w$}")
            }
        })
        .collect();
    line.join("  ").trim_end().to_string()
}
