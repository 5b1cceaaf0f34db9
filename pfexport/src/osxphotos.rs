//! `osxphotos` driver
//!
//! Exports go to a private staging directory under the destination, named
//! after the photo identifiers, and the JPEG produced for each identifier is
//! then renamed onto its canonical filename. Companion files sharing the
//! identifier stem (Live Photo videos, RAW pairs) are never installed. The
//! tool also enumerates the library through `osxphotos query --json`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pfindex::{IndexError, SourceLibrary, SourceRecord};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{ExportError, Result};
use crate::exporter::{ExportOptions, ExportRequest, Exporter};
use crate::media_type::{media_kind, mime_type_for};

const STDERR_TAIL: usize = 2000;

/// Client de l'outil `osxphotos`
#[derive(Debug, Clone)]
pub struct OsxPhotos {
    program: PathBuf,
    program_args: Vec<OsString>,
    library: Option<PathBuf>,
    options: ExportOptions,
}

impl OsxPhotos {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            program_args: Vec::new(),
            library: None,
            options: ExportOptions::default(),
        }
    }

    /// Arguments placed before the sub-command (e.g. `-m osxphotos` for a python launcher)
    pub fn with_program_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.program_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Photothèque explicite (sinon la photothèque système de l'outil)
    pub fn with_library(mut self, library: impl Into<PathBuf>) -> Self {
        self.library = Some(library.into());
        self
    }

    pub fn with_options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    pub fn library(&self) -> Option<&Path> {
        self.library.as_deref()
    }

    /// Arguments of `osxphotos export` for `requests` into `staging`
    pub fn export_args(&self, staging: &Path, requests: &[ExportRequest]) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["export".into(), staging.as_os_str().to_owned()];

        if let Some(library) = &self.library {
            args.push("--library".into());
            args.push(library.as_os_str().to_owned());
        }
        for request in requests {
            args.push("--uuid".into());
            args.push(request.identifier.clone().into());
        }
        args.extend(
            [
                "--filename",
                "{uuid}",
                "--convert-to-jpeg",
                "--jpeg-quality",
            ]
            .map(OsString::from),
        );
        args.push(self.options.jpeg_quality.to_string().into());
        args.extend(["--sidecar", "none", "--skip-live", "--skip-raw"].map(OsString::from));

        if self.options.download_missing {
            args.push("--download-missing".into());
        }
        if self.options.use_photokit {
            args.push("--use-photokit".into());
        }
        args
    }

    /// Runs the tool with `args` under the watchdog, returning its stdout
    async fn run(&self, args: Vec<OsString>, timeout: Duration) -> Result<Vec<u8>> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.program_args)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program = %self.program.display(), ?args, "running osxphotos");

        let child = command.spawn().map_err(|source| ExportError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        // À l'expiration, le futur est abandonné et le processus tué
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| ExportError::Timeout(timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let start = stderr.len().saturating_sub(STDERR_TAIL);
            let start = (start..stderr.len())
                .find(|i| stderr.is_char_boundary(*i))
                .unwrap_or(stderr.len());
            return Err(ExportError::Exit {
                code: output.status.code(),
                stderr: stderr[start..].trim().to_string(),
            });
        }

        Ok(output.stdout)
    }

    /// Requests whose artifact must actually be produced
    ///
    /// In update mode an artifact already present under its canonical name
    /// is up to date: canonical names embed the capture time and are never
    /// reassigned to other content.
    async fn outdated<'a>(
        &self,
        requests: &'a [ExportRequest],
        dest_dir: &Path,
    ) -> Vec<&'a ExportRequest> {
        let mut outdated = Vec::with_capacity(requests.len());
        for request in requests {
            let present = self.options.update
                && tokio::fs::try_exists(dest_dir.join(&request.filename))
                    .await
                    .unwrap_or(false);
            if present {
                debug!(identifier = %request.identifier, filename = %request.filename, "artifact up to date");
            } else {
                outdated.push(request);
            }
        }
        outdated
    }

    async fn install_outputs(
        &self,
        staging: &Path,
        requests: &[ExportRequest],
        dest_dir: &Path,
    ) -> Result<()> {
        let mut produced = Vec::new();
        let mut entries = tokio::fs::read_dir(staging).await?;
        while let Some(entry) = entries.next_entry().await? {
            produced.push(entry.path());
        }

        let mut first_error = None;
        for request in requests {
            let source = staged_jpeg(&produced, &request.identifier);

            let outcome = match source {
                Some(source) => tokio::fs::rename(source, dest_dir.join(&request.filename))
                    .await
                    .map_err(ExportError::from),
                None => Err(ExportError::MissingOutput(request.identifier.clone())),
            };

            if let Err(e) = outcome {
                warn!(identifier = %request.identifier, filename = %request.filename, "export failed: {}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Exporter for OsxPhotos {
    async fn export(&self, requests: &[ExportRequest], dest_dir: &Path) -> Result<()> {
        let requests: Vec<ExportRequest> = self
            .outdated(requests, dest_dir)
            .await
            .into_iter()
            .cloned()
            .collect();
        if requests.is_empty() {
            return Ok(());
        }

        tokio::fs::create_dir_all(dest_dir).await?;
        let staging = dest_dir.join(format!(".staging-{}", uuid::Uuid::new_v4().simple()));
        tokio::fs::create_dir_all(&staging).await?;

        let started = Instant::now();
        let args = self.export_args(&staging, &requests);
        let outcome = match self.run(args, self.options.timeout).await {
            Ok(_) => self.install_outputs(&staging, &requests, dest_dir).await,
            Err(e) => Err(e),
        };

        if let Err(e) = tokio::fs::remove_dir_all(&staging).await {
            warn!(staging = %staging.display(), "cannot remove staging directory: {}", e);
        }

        if outcome.is_ok() {
            info!(
                count = requests.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "exported {}",
                requests
                    .iter()
                    .map(|r| r.filename.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        outcome
    }
}

#[async_trait]
impl SourceLibrary for OsxPhotos {
    fn location(&self) -> &str {
        self.library
            .as_deref()
            .and_then(|p| p.to_str())
            .unwrap_or("system")
    }

    async fn last_modified(&self) -> pfindex::Result<DateTime<Utc>> {
        let library = self
            .library
            .as_deref()
            .ok_or_else(|| IndexError::Source("no library path configured".into()))?;
        let metadata = tokio::fs::metadata(library).await.map_err(|e| {
            IndexError::Source(format!("cannot stat {}: {}", library.display(), e))
        })?;
        Ok(DateTime::<Utc>::from(metadata.modified()?))
    }

    async fn records(&self) -> pfindex::Result<Vec<SourceRecord>> {
        let mut args: Vec<OsString> = vec!["query".into(), "--json".into()];
        if let Some(library) = &self.library {
            args.push("--library".into());
            args.push(library.as_os_str().to_owned());
        }

        let stdout = self.run(args, query_timeout(&self.options)).await?;
        Ok(parse_query_output(&stdout)?)
    }
}

/// JPEG written for `identifier` among the staged files
fn staged_jpeg<'a>(produced: &'a [PathBuf], identifier: &str) -> Option<&'a PathBuf> {
    produced
        .iter()
        .filter(|path| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|stem| stem.eq_ignore_ascii_case(identifier))
        })
        .find(|path| {
            let jpeg = mime_type_for(path) == "image/jpeg";
            if !jpeg {
                let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
                debug!(identifier = %identifier, kind = ?media_kind(ext), path = %path.display(), "ignoring companion output");
            }
            jpeg
        })
}

/// Parses `osxphotos query --json`, skipping entries that are not photos
pub fn parse_query_output(stdout: &[u8]) -> Result<Vec<SourceRecord>> {
    let values: Vec<serde_json::Value> = serde_json::from_slice(stdout)?;
    let total = values.len();

    let records: Vec<SourceRecord> = values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<SourceRecord>(value) {
            Ok(record) if !record.identifier.is_empty() => Some(record),
            Ok(_) => None,
            Err(e) => {
                warn!("skipping unreadable query record: {}", e);
                None
            }
        })
        .collect();

    if records.len() < total {
        debug!(kept = records.len(), total, "query output filtered");
    }
    Ok(records)
}

/// Les énumérations parcourent toute la photothèque
fn query_timeout(options: &ExportOptions) -> Duration {
    options.timeout.max(Duration::from_secs(600))
}
