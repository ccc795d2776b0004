//! Captured inspection output for one archive.

use std::path::{Path, PathBuf};

use crate::control::ParsedControl;
use crate::error::{InspectionCause, InspectionError};
use crate::inspector::{inspect_archive, ArchiveInspector, InspectMode};
use crate::mount::MountPoint;

/// The raw `dpkg-deb` reports for a single archive.
///
/// Everything shown on a package page is derived from these two reports, so
/// a record never changes once captured; rescanning replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRecord {
    source_path: PathBuf,
    relative_file: PathBuf,
    mount: MountPoint,
    raw_info: String,
    raw_contents: String,
}

impl ArchiveRecord {
    pub fn new(
        mount: MountPoint,
        relative_file: impl Into<PathBuf>,
        raw_info: String,
        raw_contents: String,
    ) -> Self {
        let relative_file = relative_file.into();
        Self {
            source_path: mount.join(&relative_file),
            relative_file,
            mount,
            raw_info,
            raw_contents,
        }
    }

    /// Run the inspector on `relative_file` below `mount`.
    ///
    /// Fails without running the inspector if the file is gone.
    pub async fn inspect(
        inspector: &dyn ArchiveInspector,
        mount: &MountPoint,
        relative_file: &Path,
    ) -> Result<Self, InspectionError> {
        let source_path = mount.join(relative_file);
        if !mount.exists(relative_file) {
            return Err(InspectionError {
                file: source_path,
                mode: InspectMode::Info,
                cause: InspectionCause::Missing,
            });
        }
        let (raw_info, raw_contents) = inspect_archive(inspector, &source_path).await?;
        Ok(Self::new(
            mount.clone(),
            relative_file,
            raw_info,
            raw_contents,
        ))
    }

    /// Absolute path of the archive.
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Path of the archive relative to its mount.
    pub fn relative_file(&self) -> &Path {
        &self.relative_file
    }

    pub fn mount(&self) -> &MountPoint {
        &self.mount
    }

    /// Output of `dpkg-deb --info`.
    pub fn raw_info(&self) -> &str {
        &self.raw_info
    }

    /// Output of `dpkg-deb --contents`.
    pub fn raw_contents(&self) -> &str {
        &self.raw_contents
    }

    /// File name of the archive.
    pub fn base_name(&self) -> String {
        self.relative_file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// URL the package page is published at.
    pub fn public_url(&self) -> String {
        self.mount.url_for(&self.relative_file)
    }

    /// Parse the control report.
    pub fn parse(&self) -> ParsedControl {
        ParsedControl::parse(&self.raw_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_contents, sample_info, StaticInspector};
    use std::fs;
    use tempfile::TempDir;

    fn inspector() -> StaticInspector {
        StaticInspector::new().with_archive(
            "example_1.0_amd64.deb",
            &sample_info("example", "1.0"),
            &sample_contents("example"),
        )
    }

    #[tokio::test]
    async fn test_inspect() {
        let td = TempDir::new().unwrap();
        fs::write(td.path().join("example_1.0_amd64.deb"), b"!<arch>\n").unwrap();
        let mount = MountPoint::new(td.path(), "/apt");
        let inspector = inspector();

        let record =
            ArchiveRecord::inspect(&inspector, &mount, Path::new("example_1.0_amd64.deb"))
                .await
                .unwrap();
        assert_eq!(record.source_path(), td.path().join("example_1.0_amd64.deb"));
        assert_eq!(record.parse().package(), Some("example"));
        assert_eq!(inspector.calls(), 2);
    }

    #[tokio::test]
    async fn test_inspect_missing_file() {
        let td = TempDir::new().unwrap();
        let mount = MountPoint::new(td.path(), "/apt");
        let inspector = inspector();

        let err = ArchiveRecord::inspect(&inspector, &mount, Path::new("example_1.0_amd64.deb"))
            .await
            .unwrap_err();
        assert!(matches!(err.cause, InspectionCause::Missing));
        assert_eq!(err.file, td.path().join("example_1.0_amd64.deb"));
        assert_eq!(inspector.calls(), 0);
    }

    #[test]
    fn test_paths_and_url() {
        let record = ArchiveRecord::new(
            MountPoint::new("/srv/debs", "/apt"),
            "pool/main/example_1.0_amd64.deb",
            "Package: example\n".to_string(),
            String::new(),
        );
        assert_eq!(
            record.source_path(),
            Path::new("/srv/debs/pool/main/example_1.0_amd64.deb")
        );
        assert_eq!(record.base_name(), "example_1.0_amd64.deb");
        assert_eq!(record.public_url(), "/apt/example_1.0_amd64.deb");
        assert_eq!(record.parse().package(), Some("example"));
    }
}
