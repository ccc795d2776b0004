//! Test doubles for the inspector and search index.
//!
//! These let the catalog and the site be exercised without `dpkg-deb`
//! installed.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{InspectionCause, InspectionError, SearchIndexError};
use crate::inspector::{ArchiveInspector, InspectMode};
use crate::render::PageDocument;
use crate::search::SearchIndex;

/// Inspector returning canned reports keyed by archive file name.
#[derive(Debug, Default)]
pub struct StaticInspector {
    reports: HashMap<String, (String, String)>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl StaticInspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `info` and `contents` for archives called `name`.
    pub fn with_archive(mut self, name: &str, info: &str, contents: &str) -> Self {
        self.reports
            .insert(name.to_string(), (info.to_string(), contents.to_string()));
        self
    }

    /// Make inspection of archives called `name` fail as a corrupt archive would.
    pub fn failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    /// Number of inspect calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArchiveInspector for StaticInspector {
    async fn inspect(&self, path: &Path, mode: InspectMode) -> Result<String, InspectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let fail = |cause| InspectionError {
            file: path.to_path_buf(),
            mode,
            cause,
        };

        if self.failing.contains(&name) {
            return Err(fail(InspectionCause::ExitStatus {
                code: Some(2),
                stderr: format!("dpkg-deb: error: '{}' is not a Debian format archive", name),
            }));
        }

        match self.reports.get(&name) {
            Some((info, contents)) => Ok(match mode {
                InspectMode::Info => info.clone(),
                InspectMode::Contents => contents.clone(),
            }),
            None => Err(fail(InspectionCause::Spawn(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no canned report for {}", name),
            )))),
        }
    }
}

/// Search index that remembers which URLs were submitted.
#[derive(Debug, Default)]
pub struct RecordingSearchIndex {
    urls: Mutex<Vec<String>>,
    reject: bool,
}

impl RecordingSearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// An index that refuses every document.
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    /// URLs submitted so far, in submission order.
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().map(|urls| urls.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SearchIndex for RecordingSearchIndex {
    async fn add_document(&self, page: &PageDocument) -> Result<(), SearchIndexError> {
        if self.reject {
            return Err(SearchIndexError::Rejected {
                url: page.url.clone(),
                reason: "rejected for testing".to_string(),
            });
        }
        self.urls
            .lock()
            .map_err(|_| SearchIndexError::Poisoned)?
            .push(page.url.clone());
        Ok(())
    }
}

/// A `dpkg-deb --info` report for a package called `name`.
pub fn sample_info(name: &str, version: &str) -> String {
    format!(
        " new Debian package, version 2.0.
 size 1740 bytes: control archive=512 bytes.
     318 bytes,    10 lines      control
 Package: {name}
 Version: {version}
 Architecture: amd64
 Maintainer: Jane Doe <jane@example.com>
 Installed-Size: 12
 Section: utils
 Priority: optional
 Homepage: https://example.com/{name}
 Description: the {name} example package
  The {name} package exists to exercise the page renderer.
  .
  It has two paragraphs.
"
    )
}

/// A `dpkg-deb --contents` report for a package called `name`.
pub fn sample_contents(name: &str) -> String {
    format!(
        "drwxr-xr-x root/root         0 2024-01-01 00:00 ./
drwxr-xr-x root/root         0 2024-01-01 00:00 ./usr/
drwxr-xr-x root/root         0 2024-01-01 00:00 ./usr/bin/
-rwxr-xr-x root/root     14328 2024-01-01 00:00 ./usr/bin/{name}
"
    )
}
