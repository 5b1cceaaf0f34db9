//! Canonical filename template
//!
//! A template combines placeholders with literal text. Supported
//! placeholders:
//!
//! - `{timestamp}`: UTC capture time, `%Y%m%dT%H%M%S` + 6-digit microseconds + `Z`
//! - `{original_name}`: original base name without extension
//! - `{ext}`: extension with its leading dot
//! - `{uuid}`: the record identifier

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{IndexError, Result};

pub const DEFAULT_TEMPLATE: &str = "{timestamp}-{original_name}{ext}";

const PLACEHOLDERS: [&str; 4] = ["timestamp", "original_name", "ext", "uuid"];
const JPEG_EXT_OVERRIDES: [&str; 4] = ["jpg", "jpeg", "JPG", "JPEG"];

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_]+)\}").expect("valid placeholder regex"));

/// Formats a capture time the way canonical filenames carry it
pub fn format_timestamp(captured: &DateTime<Utc>) -> String {
    captured.format("%Y%m%dT%H%M%S%6fZ").to_string()
}

/// Renders canonical filenames from source records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameTemplate {
    template: String,
    jpeg_ext: Option<String>,
}

impl Default for FilenameTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
            jpeg_ext: None,
        }
    }
}

impl FilenameTemplate {
    /// Validates `template` and the optional JPEG extension override
    pub fn new(template: &str, jpeg_ext: Option<&str>) -> Result<Self> {
        let template = template.trim().trim_matches(|c| c == '"' || c == '\'');
        if template.is_empty() {
            return Err(IndexError::Template("empty template".into()));
        }

        for caps in PLACEHOLDER_RE.captures_iter(template) {
            let name = &caps[1];
            if !PLACEHOLDERS.contains(&name) {
                return Err(IndexError::Template(format!(
                    "unknown placeholder {{{}}} in {}",
                    name, template
                )));
            }
        }

        let jpeg_ext = match jpeg_ext.map(|e| e.trim().trim_start_matches('.')) {
            None | Some("") => None,
            Some(ext) if JPEG_EXT_OVERRIDES.contains(&ext) => Some(ext.to_string()),
            Some(ext) => {
                return Err(IndexError::Template(format!(
                    "jpeg extension must be one of jpg, jpeg, JPG, JPEG (got {})",
                    ext
                )));
            }
        };

        Ok(Self {
            template: template.to_string(),
            jpeg_ext,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn jpeg_ext(&self) -> Option<&str> {
        self.jpeg_ext.as_deref()
    }

    /// Extension of the exported artifact for an original extension
    ///
    /// Artifacts are JPEG conversions: JPEG-family originals keep their
    /// extension (or the configured override), anything else becomes `.jpg`.
    pub fn artifact_ext(&self, original_ext: Option<&str>) -> String {
        let original = original_ext
            .map(|e| e.trim_start_matches('.'))
            .filter(|e| !e.is_empty());

        match original {
            Some(ext) if ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg") => {
                format!(".{}", self.jpeg_ext.as_deref().unwrap_or(ext))
            }
            _ => ".jpg".to_string(),
        }
    }

    /// Renders the canonical filename
    pub fn render(
        &self,
        captured: &DateTime<Utc>,
        original_name: &str,
        original_ext: Option<&str>,
        identifier: &str,
    ) -> String {
        let ext = self.artifact_ext(original_ext);
        PLACEHOLDER_RE
            .replace_all(&self.template, |caps: &regex::Captures| match &caps[1] {
                "timestamp" => format_timestamp(captured),
                "original_name" => original_name.to_string(),
                "ext" => ext.clone(),
                "uuid" => identifier.to_string(),
                other => format!("{{{}}}", other),
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn new_year() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_default_template() {
        let template = FilenameTemplate::default();
        assert_eq!(
            template.render(&new_year(), "IMG_0001", Some(".JPG"), "A"),
            "20240101T000000000000Z-IMG_0001.JPG"
        );
    }

    #[test]
    fn test_microseconds_are_kept() {
        let captured = Utc.timestamp_opt(1_704_067_200, 123_456_000).unwrap();
        assert_eq!(format_timestamp(&captured), "20240101T000000123456Z");
    }

    #[test]
    fn test_non_jpeg_originals_render_as_jpg() {
        let template = FilenameTemplate::default();
        assert_eq!(
            template.render(&new_year(), "IMG_0002", Some("HEIC"), "A"),
            "20240101T000000000000Z-IMG_0002.jpg"
        );
        assert_eq!(
            template.render(&new_year(), "IMG_0003", None, "A"),
            "20240101T000000000000Z-IMG_0003.jpg"
        );
    }

    #[test]
    fn test_jpeg_ext_override() {
        let template = FilenameTemplate::new(DEFAULT_TEMPLATE, Some("jpg")).unwrap();
        assert_eq!(template.artifact_ext(Some(".JPEG")), ".jpg");
        assert_eq!(template.artifact_ext(Some(".png")), ".jpg");
        assert!(FilenameTemplate::new(DEFAULT_TEMPLATE, Some("png")).is_err());
    }

    #[test]
    fn test_unknown_placeholder_is_rejected() {
        assert!(FilenameTemplate::new("{timestamp}-{album}{ext}", None).is_err());
        assert!(FilenameTemplate::new("  ", None).is_err());
    }

    #[test]
    fn test_quoted_template_is_sanitized() {
        let template = FilenameTemplate::new("'{uuid}{ext}'", None).unwrap();
        assert_eq!(template.template(), "{uuid}{ext}");
        assert_eq!(template.render(&new_year(), "x", Some(".jpg"), "ABC"), "ABC.jpg");
    }
}
