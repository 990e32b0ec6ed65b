//! Error type shared by every stage of an analysis run.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// A listed blob name is not `namespace/event-hub/consumer-group/kind/partition`.
    #[error("malformed blob path '{0}'")]
    MalformedPath(String),

    /// A checkpoint or ownership blob has missing or unparseable metadata.
    #[error("blob '{path}' has invalid metadata {key}={value:?}")]
    InvalidMetadata {
        path: String,
        key: &'static str,
        value: Option<String>,
    },

    /// The previous snapshot is not strictly older than the current one.
    #[error(
        "previous snapshot ({previous}) is not earlier than current snapshot ({current}); \
         cannot compute rates"
    )]
    InvalidInterval {
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    #[error("invalid storage connection string: {0}")]
    ConnectionString(String),

    #[error("blob listing request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("blob service returned HTTP {status}: {body}")]
    BlobService { status: u16, body: String },

    #[error("failed to decode blob listing: {0}")]
    Listing(#[from] quick_xml::de::DeError),

    #[error("snapshot store i/o error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode or decode snapshot: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_invalid_interval_message_names_both_timestamps() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let err = AnalyzerError::InvalidInterval {
            previous: t,
            current: t,
        };
        let msg = err.to_string();
        assert!(msg.contains("2024-01-01 00:00:00 UTC"));
        assert!(msg.contains("cannot compute rates"));
    }

    #[test]
    fn test_io_error_includes_path() {
        let err = AnalyzerError::Io {
            path: PathBuf::from("/tmp/data.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.to_string().contains("/tmp/data.json"));
    }
}
