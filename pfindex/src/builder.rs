//! Filename index builder
//!
//! Turns an enumeration of [`SourceRecord`]s into the primary index
//! (canonical filename → identifier) and the collisions map.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{IndexError, Result};
use crate::source::SourceRecord;
use crate::template::FilenameTemplate;

/// How the primary index resolves several records rendering to one filename
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Largest pixel area, then larger original file, then non-raw, then greatest identifier
    #[default]
    Quality,
    /// First enumerated record wins
    First,
    /// No winner: the primary entry lists every identifier
    Reject,
}

impl FromStr for CollisionPolicy {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "quality" => Ok(Self::Quality),
            "first" => Ok(Self::First),
            "reject" => Ok(Self::Reject),
            other => Err(IndexError::Policy(other.to_string())),
        }
    }
}

impl fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Quality => "quality",
            Self::First => "first",
            Self::Reject => "reject",
        };
        f.write_str(name)
    }
}

/// Value stored in the primary index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexEntry {
    Single(String),
    Collision(Vec<String>),
}

/// Result of an index build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuiltIndex {
    pub index: BTreeMap<String, IndexEntry>,
    /// Filenames rendered by more than one record, identifiers in enumeration order
    pub collisions: BTreeMap<String, Vec<String>>,
    /// Records skipped because their capture date could not be parsed
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Quality {
    area: u64,
    filesize: u64,
    non_raw: bool,
    identifier: String,
}

impl Quality {
    fn of(record: &SourceRecord) -> Self {
        Self {
            area: record
                .width
                .unwrap_or(0)
                .saturating_mul(record.height.unwrap_or(0)),
            filesize: record.original_filesize.unwrap_or(0),
            non_raw: !record.has_raw.unwrap_or(false),
            identifier: record.identifier.clone(),
        }
    }
}

struct Candidates {
    winner: Quality,
    identifiers: Vec<String>,
}

fn split_name(name: &str) -> (Option<&str>, Option<&str>) {
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).filter(|s| !s.is_empty());
    let ext = path.extension().and_then(|s| s.to_str()).filter(|s| !s.is_empty());
    (stem, ext)
}

/// Canonical filename of a record, `None` when its capture date is unusable
pub fn render_key(record: &SourceRecord, template: &FilenameTemplate) -> Option<String> {
    let captured = record.capture_time()?;

    let (original_stem, original_ext) = record
        .original_filename
        .as_deref()
        .map(split_name)
        .unwrap_or((None, None));
    let (current_stem, current_ext) = record
        .filename
        .as_deref()
        .map(split_name)
        .unwrap_or((None, None));

    let name = original_stem
        .or(current_stem)
        .unwrap_or(record.identifier.as_str());
    let ext = original_ext.or(current_ext);

    let key = template.render(&captured, name, ext, &record.identifier);
    (!key.is_empty()).then_some(key)
}

/// Builds the index from `records`
///
/// Deterministic: the same records in the same order always give the same
/// maps. A record that cannot be rendered is skipped, never fatal.
pub fn build_index(
    records: &[SourceRecord],
    template: &FilenameTemplate,
    policy: CollisionPolicy,
) -> BuiltIndex {
    let mut candidates: BTreeMap<String, Candidates> = BTreeMap::new();
    let mut skipped = 0;

    for record in records {
        let Some(key) = render_key(record, template) else {
            warn!(
                identifier = %record.identifier,
                captured_at = ?record.captured_at,
                "skipping record with unparsable capture date"
            );
            skipped += 1;
            continue;
        };

        let quality = Quality::of(record);
        match candidates.get_mut(&key) {
            None => {
                candidates.insert(
                    key,
                    Candidates {
                        winner: quality,
                        identifiers: vec![record.identifier.clone()],
                    },
                );
            }
            Some(entry) => {
                if !entry.identifiers.contains(&record.identifier) {
                    entry.identifiers.push(record.identifier.clone());
                }
                if policy == CollisionPolicy::Quality && quality > entry.winner {
                    entry.winner = quality;
                }
            }
        }
    }

    let mut built = BuiltIndex {
        skipped,
        ..Default::default()
    };

    for (key, entry) in candidates {
        let value = if entry.identifiers.len() > 1 {
            warn!(
                filename = %key,
                identifiers = ?entry.identifiers,
                "filename collision"
            );
            built
                .collisions
                .insert(key.clone(), entry.identifiers.clone());
            match policy {
                CollisionPolicy::Reject => IndexEntry::Collision(entry.identifiers),
                CollisionPolicy::Quality | CollisionPolicy::First => {
                    IndexEntry::Single(entry.winner.identifier)
                }
            }
        } else {
            IndexEntry::Single(entry.winner.identifier)
        };
        built.index.insert(key, value);
    }

    debug!(
        entries = built.index.len(),
        collisions = built.collisions.len(),
        skipped = built.skipped,
        "index built"
    );
    built
}

impl BuiltIndex {
    /// Writes both maps as JSON with sorted keys
    pub fn write_to(&self, index_path: &Path, collisions_path: &Path) -> Result<()> {
        for path in [index_path, collisions_path] {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(index_path, serde_json::to_vec(&self.index)?)?;
        std::fs::write(collisions_path, serde_json::to_vec(&self.collisions)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, date: &str, name: &str) -> SourceRecord {
        SourceRecord {
            identifier: id.to_string(),
            captured_at: Some(date.to_string()),
            original_filename: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("Quality".parse::<CollisionPolicy>().unwrap(), CollisionPolicy::Quality);
        assert_eq!("reject".parse::<CollisionPolicy>().unwrap(), CollisionPolicy::Reject);
        assert!("random".parse::<CollisionPolicy>().is_err());
        assert_eq!(CollisionPolicy::First.to_string(), "first");
    }

    #[test]
    fn test_render_key_fallbacks() {
        let template = FilenameTemplate::default();

        let mut r = SourceRecord::new("ABC");
        r.captured_at = Some("2024-01-01T00:00:00Z".into());
        assert_eq!(
            render_key(&r, &template).unwrap(),
            "20240101T000000000000Z-ABC.jpg"
        );

        r.filename = Some("F00D.heic".into());
        assert_eq!(
            render_key(&r, &template).unwrap(),
            "20240101T000000000000Z-F00D.jpg"
        );

        r.original_filename = Some("IMG_0001.JPG".into());
        assert_eq!(
            render_key(&r, &template).unwrap(),
            "20240101T000000000000Z-IMG_0001.JPG"
        );
    }

    #[test]
    fn test_bad_date_is_skipped() {
        let records = vec![
            record("A", "not a date", "IMG_0001.JPG"),
            record("B", "2024-01-01T00:00:00Z", "IMG_0002.JPG"),
        ];
        let built = build_index(&records, &FilenameTemplate::default(), CollisionPolicy::Quality);
        assert_eq!(built.skipped, 1);
        assert_eq!(built.index.len(), 1);
    }

    #[test]
    fn test_quality_policy_prefers_larger_then_non_raw() {
        let mut small = record("A", "2024-01-01T00:00:00Z", "IMG_0001.JPG");
        small.width = Some(10);
        small.height = Some(10);
        let mut large = record("B", "2024-01-01T00:00:00Z", "IMG_0001.JPG");
        large.width = Some(20);
        large.height = Some(20);
        large.has_raw = Some(true);

        let built = build_index(
            &[large.clone(), small.clone()],
            &FilenameTemplate::default(),
            CollisionPolicy::Quality,
        );
        let key = "20240101T000000000000Z-IMG_0001.JPG";
        assert_eq!(built.index[key], IndexEntry::Single("B".into()));
        assert_eq!(built.collisions[key], vec!["B".to_string(), "A".to_string()]);

        // Même surface : la version sans RAW l'emporte
        small.width = Some(20);
        small.height = Some(20);
        let built = build_index(&[large, small], &FilenameTemplate::default(), CollisionPolicy::Quality);
        assert_eq!(built.index[key], IndexEntry::Single("A".into()));
    }

    #[test]
    fn test_quality_tie_breaks_on_identifier() {
        let records = vec![
            record("A", "2024-01-01T00:00:00Z", "IMG_0001.JPG"),
            record("C", "2024-01-01T00:00:00Z", "IMG_0001.JPG"),
            record("B", "2024-01-01T00:00:00Z", "IMG_0001.JPG"),
        ];
        let built = build_index(&records, &FilenameTemplate::default(), CollisionPolicy::Quality);
        assert_eq!(
            built.index["20240101T000000000000Z-IMG_0001.JPG"],
            IndexEntry::Single("C".into())
        );
    }

    #[test]
    fn test_first_and_reject_policies() {
        let records = vec![
            record("B", "2024-01-01T00:00:00Z", "IMG_0001.JPG"),
            record("A", "2024-01-01T00:00:00Z", "IMG_0001.JPG"),
        ];
        let key = "20240101T000000000000Z-IMG_0001.JPG";

        let built = build_index(&records, &FilenameTemplate::default(), CollisionPolicy::First);
        assert_eq!(built.index[key], IndexEntry::Single("B".into()));

        let built = build_index(&records, &FilenameTemplate::default(), CollisionPolicy::Reject);
        assert_eq!(
            built.index[key],
            IndexEntry::Collision(vec!["B".into(), "A".into()])
        );
        assert_eq!(built.collisions.len(), 1);
    }

    #[test]
    fn test_duplicate_identifier_is_not_a_collision() {
        let records = vec![
            record("A", "2024-01-01T00:00:00Z", "IMG_0001.JPG"),
            record("A", "2024-01-01T00:00:00Z", "IMG_0001.JPG"),
        ];
        let built = build_index(&records, &FilenameTemplate::default(), CollisionPolicy::Quality);
        assert!(built.collisions.is_empty());
    }

    #[test]
    fn test_entry_serialization() {
        let mut index = BTreeMap::new();
        index.insert("b".to_string(), IndexEntry::Collision(vec!["X".into(), "Y".into()]));
        index.insert("a".to_string(), IndexEntry::Single("Z".into()));
        assert_eq!(
            serde_json::to_string(&index).unwrap(),
            r#"{"a":"Z","b":["X","Y"]}"#
        );
        let parsed: BTreeMap<String, IndexEntry> =
            serde_json::from_str(r#"{"a":"Z","b":["X","Y"]}"#).unwrap();
        assert_eq!(parsed, index);
    }
}
