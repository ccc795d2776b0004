//! Local directories exposed under a public URL prefix.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

/// A local directory published under `url_prefix`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MountPoint {
    /// Local root directory.
    pub path: PathBuf,
    /// Public URL prefix, without a trailing slash.
    #[serde(alias = "mount")]
    pub url_prefix: String,
}

impl MountPoint {
    pub fn new(path: impl Into<PathBuf>, url_prefix: &str) -> Self {
        Self {
            path: path.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// All regular files below the root, relative to it, in sorted order.
    pub fn list_all_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.path).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.path) {
                files.push(relative.to_path_buf());
            }
        }
        Ok(files)
    }

    /// Absolute location of `relative` below this mount.
    pub fn join(&self, relative: &Path) -> PathBuf {
        self.path.join(relative)
    }

    /// Whether `relative` exists below this mount.
    pub fn exists(&self, relative: &Path) -> bool {
        self.join(relative).exists()
    }

    /// Public URL of a file below this mount.
    ///
    /// Only the base name is used, so archives in subdirectories are
    /// published flat under the prefix.
    pub fn url_for(&self, relative: &Path) -> String {
        let name = relative
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default();
        format!("{}/{}", self.url_prefix, name)
    }
}

/// Returns true for Debian binary package archives.
pub fn is_archive(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(".deb") || name.ends_with(".udeb"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_is_archive() {
        assert!(is_archive(Path::new("pool/hello_2.10-3_amd64.deb")));
        assert!(is_archive(Path::new("hello-udeb_2.10-3_amd64.udeb")));
        assert!(!is_archive(Path::new("hello_2.10-3.dsc")));
        assert!(!is_archive(Path::new("hello.deb.sig")));
    }

    #[test]
    fn test_url_for() {
        let mp = MountPoint::new("/srv/debs", "/apt/");
        assert_eq!(mp.url_prefix, "/apt");
        assert_eq!(
            mp.url_for(Path::new("pool/main/example_1.0_amd64.deb")),
            "/apt/example_1.0_amd64.deb"
        );
        assert_eq!(
            mp.join(Path::new("example_1.0_amd64.deb")),
            PathBuf::from("/srv/debs/example_1.0_amd64.deb")
        );
    }

    #[test]
    fn test_list_all_files() {
        let td = TempDir::new().unwrap();
        fs::create_dir_all(td.path().join("pool/main")).unwrap();
        fs::write(td.path().join("pool/main/b.deb"), b"").unwrap();
        fs::write(td.path().join("a.udeb"), b"").unwrap();
        fs::write(td.path().join("Release"), b"").unwrap();

        let mp = MountPoint::new(td.path(), "/apt");
        let files = mp.list_all_files().unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("Release"),
                PathBuf::from("a.udeb"),
                PathBuf::from("pool/main/b.deb"),
            ]
        );
        assert!(mp.exists(Path::new("a.udeb")));
        assert!(!mp.exists(Path::new("missing.deb")));
    }

    #[test]
    fn test_list_missing_root() {
        let mp = MountPoint::new("/nonexistent/debinfo", "/apt");
        assert!(mp.list_all_files().is_err());
    }
}
