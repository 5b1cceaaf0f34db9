//! Source library abstraction
//!
//! The index is rebuilt from a [`SourceLibrary`]: something that can list
//! its photos and tell when it last changed.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::error::Result;

/// One photo as enumerated from the source library
///
/// Every field except the identifier is optional: records are parsed
/// leniently and the builder fills the gaps.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceRecord {
    #[serde(alias = "uuid")]
    pub identifier: String,
    /// Capture date as reported by the library (RFC 3339 or naive ISO 8601)
    #[serde(default, alias = "date")]
    pub captured_at: Option<String>,
    /// File name at import time, e.g. `IMG_0001.JPG`
    #[serde(default)]
    pub original_filename: Option<String>,
    /// Current file name inside the library
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub width: Option<u64>,
    #[serde(default)]
    pub height: Option<u64>,
    #[serde(default)]
    pub original_filesize: Option<u64>,
    #[serde(default)]
    pub has_raw: Option<bool>,
}

impl SourceRecord {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Default::default()
        }
    }

    /// Parses the capture date, naive timestamps being taken as UTC
    pub fn capture_time(&self) -> Option<DateTime<Utc>> {
        let raw = self.captured_at.as_deref()?.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    }
}

/// A library the index can be rebuilt from
#[async_trait]
pub trait SourceLibrary: Send + Sync {
    /// Library location, used to scope the index storage
    fn location(&self) -> &str;

    /// Last modification signal of the library
    async fn last_modified(&self) -> Result<DateTime<Utc>>;

    /// Enumerates every photo of the library
    async fn records(&self) -> Result<Vec<SourceRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_time_formats() {
        let mut record = SourceRecord::new("A");

        record.captured_at = Some("2024-01-01T01:00:00.000123+01:00".into());
        assert_eq!(
            record.capture_time().unwrap().to_rfc3339(),
            "2024-01-01T00:00:00.000123+00:00"
        );

        record.captured_at = Some("2024-01-01 00:00:00".into());
        assert!(record.capture_time().is_some());

        record.captured_at = Some("yesterday".into());
        assert!(record.capture_time().is_none());

        record.captured_at = None;
        assert!(record.capture_time().is_none());
    }

    #[test]
    fn test_lenient_deserialization() {
        let record: SourceRecord =
            serde_json::from_str(r#"{"uuid":"ABC","date":"2024-01-01T00:00:00Z","extra":1}"#)
                .unwrap();
        assert_eq!(record.identifier, "ABC");
        assert!(record.width.is_none());
        assert!(record.capture_time().is_some());
    }
}
