//! Running `dpkg-deb` against a single archive.
//!
//! The [`ArchiveInspector`] trait is the seam between the catalog and the
//! external tool, so tests can hand out canned reports instead.

use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::{InspectionCause, InspectionError};

/// Default inspection command.
pub const DEFAULT_COMMAND: &str = "dpkg-deb";

/// Default time limit for a single invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Which report to ask the inspection tool for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InspectMode {
    /// The control information (`--info`).
    Info,
    /// The file listing (`--contents`).
    Contents,
}

impl InspectMode {
    /// Command line flag selecting this report.
    pub fn flag(&self) -> &'static str {
        match self {
            Self::Info => "--info",
            Self::Contents => "--contents",
        }
    }
}

impl fmt::Display for InspectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flag())
    }
}

/// Something that can produce the textual reports for an archive.
#[async_trait]
pub trait ArchiveInspector: Send + Sync {
    /// Produce the report selected by `mode` for the archive at `path`.
    async fn inspect(&self, path: &Path, mode: InspectMode) -> Result<String, InspectionError>;
}

/// Inspector that shells out to `dpkg-deb`.
#[derive(Debug, Clone)]
pub struct DpkgDebInspector {
    command: Vec<String>,
    timeout: Duration,
}

impl Default for DpkgDebInspector {
    fn default() -> Self {
        Self {
            command: vec![DEFAULT_COMMAND.to_string()],
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl DpkgDebInspector {
    /// Create an inspector running `command`, which may carry extra arguments.
    pub fn new(command: &str, timeout: Duration) -> Result<Self, InspectionCause> {
        let command = shlex::split(command)
            .filter(|args| !args.is_empty())
            .ok_or_else(|| InspectionCause::Command(command.to_string()))?;
        Ok(Self { command, timeout })
    }

    /// Time limit applied to each invocation.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl ArchiveInspector for DpkgDebInspector {
    async fn inspect(&self, path: &Path, mode: InspectMode) -> Result<String, InspectionError> {
        let fail = |cause| InspectionError {
            file: path.to_path_buf(),
            mode,
            cause,
        };

        debug!("running {:?} {} {}", self.command, mode, path.display());

        let mut cmd = Command::new(&self.command[0]);
        cmd.args(&self.command[1..]);
        cmd.arg(mode.flag());
        cmd.arg(path);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| fail(InspectionCause::Timeout(self.timeout)))?
            .map_err(|e| fail(InspectionCause::Spawn(e)))?;

        if !output.status.success() {
            return Err(fail(InspectionCause::ExitStatus {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Capture both reports for an archive, info first.
pub async fn inspect_archive(
    inspector: &dyn ArchiveInspector,
    path: &Path,
) -> Result<(String, String), InspectionError> {
    let info = inspector.inspect(path, InspectMode::Info).await?;
    let contents = inspector.inspect(path, InspectMode::Contents).await?;
    Ok((info, contents))
}
