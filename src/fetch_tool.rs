//! yt-dlp subprocess driver
//!
//! Wraps single invocations of the external fetch tool: argument
//! construction, streaming progress parsing from stdout, stderr capture,
//! and failure classification. Retry policy lives with the engine; this
//! module only knows how to run the tool once and interpret what happened.

use crate::config::FetchToolConfig;
use crate::error::{Error, FetchFailureKind, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

/// Binary searched on PATH when no explicit path is configured
const DEFAULT_BINARY: &str = "yt-dlp";

/// Outcome of a single fetch tool invocation
#[derive(Debug)]
pub enum AttemptResult {
    /// The tool exited zero
    Completed,
    /// The tool exited nonzero; `kind` is classified from captured stderr
    Failed {
        /// Failure classification derived from stderr
        kind: FetchFailureKind,
        /// Captured stderr, kept for logging
        stderr: String,
    },
}

/// Driver for the external fetch tool
pub struct FetchTool {
    binary: PathBuf,
    extra_args: Vec<String>,
}

impl FetchTool {
    /// Resolve the tool binary from configuration
    ///
    /// An explicit `binary_path` wins; otherwise the binary is discovered
    /// on PATH. When discovery fails the bare name is kept so each
    /// invocation fails fast with a tool error instead of construction
    /// aborting the engine.
    pub fn new(config: &FetchToolConfig) -> Self {
        let binary = match &config.binary_path {
            Some(path) => path.clone(),
            None => which::which(DEFAULT_BINARY).unwrap_or_else(|_| PathBuf::from(DEFAULT_BINARY)),
        };
        Self {
            binary,
            extra_args: config.extra_args.clone(),
        }
    }

    /// Path of the resolved binary
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Ask the tool for its version string
    ///
    /// Used as a startup diagnostic; a failure here means fetch jobs will
    /// not work until the tool is installed.
    pub async fn probe_version(&self) -> Result<String> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                Error::ExternalTool(format!("failed to execute {}: {e}", self.binary.display()))
            })?;

        if !output.status.success() {
            return Err(Error::ExternalTool(format!(
                "{} --version exited with {}",
                self.binary.display(),
                output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run one fetch attempt for `url`, writing to `output_template`
    ///
    /// The template is passed to the tool's `-o` flag and should end in
    /// `.%(ext)s` so the tool appends the real extension. Parsed progress
    /// percentages are handed to `on_progress` as they stream in. Returns
    /// `Err` only when the subprocess cannot be driven at all (spawn or
    /// pipe failure); a nonzero tool exit is a normal
    /// [`AttemptResult::Failed`].
    pub async fn run(
        &self,
        url: &str,
        output_template: &Path,
        mut on_progress: impl FnMut(f32) + Send,
    ) -> Result<AttemptResult> {
        let mut child = Command::new(&self.binary)
            .arg("-f")
            .arg("best[ext=mp4]/best")
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg("--newline")
            .arg("--progress")
            .arg("-o")
            .arg(output_template)
            .args(&self.extra_args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::ExternalTool(format!("failed to spawn {}: {e}", self.binary.display()))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::ExternalTool("fetch tool stdout unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::ExternalTool("fetch tool stderr unavailable".to_string()))?;

        // Both pipes are drained concurrently; a full stderr pipe would
        // otherwise stall the tool mid-download.
        let progress_reader = async {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(percent) = parse_progress_line(&line) {
                    on_progress(percent);
                }
            }
        };
        let stderr_reader = async {
            let mut captured = String::new();
            let mut reader = BufReader::new(stderr);
            let _ = reader.read_to_string(&mut captured).await;
            captured
        };
        let ((), captured_stderr) = tokio::join!(progress_reader, stderr_reader);

        let status = child.wait().await?;
        if status.success() {
            Ok(AttemptResult::Completed)
        } else {
            let kind = classify_stderr(&captured_stderr);
            debug!(%kind, exit = %status, "fetch tool attempt failed");
            Ok(AttemptResult::Failed {
                kind,
                stderr: captured_stderr,
            })
        }
    }
}

/// Generate a fresh opaque artifact identifier
///
/// 16 random bytes as 32 lowercase hex characters. Every attempt gets its
/// own identifier, so a retried job never collides with leftovers of an
/// earlier attempt.
pub fn generate_artifact_id() -> String {
    let bytes: [u8; 16] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Locate the file a completed attempt produced
///
/// The tool substitutes the real extension into the output template, so
/// the artifact is found by its `<id>.` prefix in the storage directory.
pub async fn find_artifact(storage_dir: &Path, artifact_id: &str) -> Result<Option<PathBuf>> {
    let prefix = format!("{artifact_id}.");
    let mut dir = tokio::fs::read_dir(storage_dir).await?;
    while let Some(dir_entry) = dir.next_entry().await? {
        if dir_entry.file_name().to_string_lossy().starts_with(&prefix) {
            return Ok(Some(dir_entry.path()));
        }
    }
    Ok(None)
}

/// Parse a percentage out of one tool progress line
///
/// Matches the `--newline --progress` format, e.g.
/// `[download]  42.7% of 10.00MiB at 1.20MiB/s ETA 00:05`. Lines that are
/// not download progress yield `None`.
pub(crate) fn parse_progress_line(line: &str) -> Option<f32> {
    if !line.contains("[download]") {
        return None;
    }
    line.split_whitespace()
        .find_map(|token| token.strip_suffix('%'))
        .and_then(|number| number.parse::<f32>().ok())
        .filter(|percent| (0.0..=100.0).contains(percent))
}

/// Classify captured stderr into the failure taxonomy
///
/// Substring matching, case insensitive, first matching rule wins:
/// 1. `403` / `forbidden` / `geo`: forbidden or geo-restricted
/// 2. `404` / `not found` / `unable to download webpage`: not found
/// 3. `unsupported url` / `no video` / `unable to extract`: extraction failure
/// 4. `network` / `connection` / `resolve host`: network failure
/// 5. `timed out` / `timeout`: timeout
/// 6. anything else: unknown
pub fn classify_stderr(stderr: &str) -> FetchFailureKind {
    let haystack = stderr.to_lowercase();
    let contains_any = |needles: &[&str]| needles.iter().any(|needle| haystack.contains(needle));

    if contains_any(&["403", "forbidden", "geo"]) {
        FetchFailureKind::Forbidden
    } else if contains_any(&["404", "not found", "unable to download webpage"]) {
        FetchFailureKind::NotFound
    } else if contains_any(&["unsupported url", "no video", "unable to extract"]) {
        FetchFailureKind::ExtractionFailed
    } else if contains_any(&["network", "connection", "resolve host"]) {
        FetchFailureKind::Network
    } else if contains_any(&["timed out", "timeout"]) {
        FetchFailureKind::Timeout
    } else {
        FetchFailureKind::Unknown
    }
}

/// Throttles progress reports to roughly 20-point boundaries
///
/// Guards the reply channel against an edit per progress line. The first
/// parsed percentage always reports, later ones only after gaining 20
/// points, and 100% always reports so the final state is never swallowed.
#[derive(Debug, Default)]
pub struct ProgressThrottle {
    last_reported: Option<f32>,
}

impl ProgressThrottle {
    /// Create a throttle that has reported nothing yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `percent` is worth reporting
    pub fn should_report(&mut self, percent: f32) -> bool {
        let report = match self.last_reported {
            None => true,
            Some(last) => percent - last >= 20.0 || (percent >= 100.0 && last < 100.0),
        };
        if report {
            self.last_reported = Some(percent);
        }
        report
    }
}
