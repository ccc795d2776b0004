//! The catalog of package pages.
//!
//! A [`Catalog`] is built with a [`CatalogBuilder`], filled once by
//! [`Catalog::discover`] and read-only afterwards, so it can be shared
//! between request handlers behind an `Arc` without locking.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{CatalogError, CatalogResult, ConfigError, RenderError};
use crate::inspector::ArchiveInspector;
use crate::mount::{is_archive, MountPoint};
use crate::record::ArchiveRecord;
use crate::render::{render_page, PageDocument};
use crate::search::SearchIndex;

/// Cache directive used when neither the page nor the catalog sets one.
pub const DEFAULT_CACHE_CONTROL: &str = "max-age=604800, must-revalidate";

/// Page context key overriding the cache directive.
pub const CACHE_CONTROL_KEY: &str = "CacheControl";

/// When package pages are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderPolicy {
    /// Render and index every page during discovery and serve the cached copy.
    #[default]
    Eager,
    /// Keep only the inspector output and render on every request.
    Lazy,
}

/// How far an archive has progressed through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Reports captured.
    Inspected,
    /// Page rendered and cached.
    Rendered,
    /// Page submitted to the search index.
    Indexed,
}

#[derive(Debug)]
struct Entry {
    record: ArchiveRecord,
    page: Option<PageDocument>,
    state: EntryState,
}

/// An archive that could not be added to the catalog.
#[derive(Debug)]
pub struct DiscoveryFailure {
    pub file: PathBuf,
    pub error: CatalogError,
}

/// Outcome of a discovery pass.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// Number of archives added to the catalog.
    pub registered: usize,
    pub failed: Vec<DiscoveryFailure>,
}

/// Host side of page delivery.
pub trait PageServer {
    type Response;

    /// Turn a finished page into a response.
    fn serve_page(&self, page: &PageDocument) -> Result<Self::Response, RenderError>;
}

/// Builder for [`Catalog`].
pub struct CatalogBuilder {
    inspector: Arc<dyn ArchiveInspector>,
    search: Option<Arc<dyn SearchIndex>>,
    mounts: Vec<MountPoint>,
    policy: RenderPolicy,
    cache_control: Option<String>,
    page_context: BTreeMap<String, String>,
    concurrency: usize,
}

impl CatalogBuilder {
    pub fn new(inspector: Arc<dyn ArchiveInspector>) -> Self {
        Self {
            inspector,
            search: None,
            mounts: Vec::new(),
            policy: RenderPolicy::default(),
            cache_control: None,
            page_context: BTreeMap::new(),
            concurrency: 1,
        }
    }

    /// Start from the settings in `config`.
    pub fn from_config(config: &Config, inspector: Arc<dyn ArchiveInspector>) -> Self {
        let mut builder = Self::new(inspector)
            .policy(config.policy)
            .concurrency(config.discovery.concurrency)
            .page_context(config.page_context.clone());
        if let Some(cache_control) = &config.cache_control {
            builder = builder.cache_control(cache_control);
        }
        for mount in &config.mounts {
            builder = builder.mount(&mount.path, &mount.url_prefix);
        }
        builder
    }

    /// Publish archives below `path` under `url_prefix`.
    pub fn mount(mut self, path: impl AsRef<Path>, url_prefix: &str) -> Self {
        self.mounts
            .push(MountPoint::new(path.as_ref(), url_prefix));
        self
    }

    pub fn search_index(mut self, search: Arc<dyn SearchIndex>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn policy(mut self, policy: RenderPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Cache directive for every page that does not set its own.
    pub fn cache_control(mut self, values: &str) -> Self {
        self.cache_control = Some(values.to_string());
        self
    }

    /// Settings copied into the context of every page.
    pub fn page_context(mut self, context: BTreeMap<String, String>) -> Self {
        self.page_context = context;
        self
    }

    /// Maximum number of archives inspected at once.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn build(self) -> Result<Catalog, ConfigError> {
        if self.policy == RenderPolicy::Eager && self.search.is_none() {
            return Err(ConfigError::MissingSearchIndex);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "discovery concurrency must be at least 1".to_string(),
            ));
        }
        let mut mounts = self.mounts;
        mounts.sort();
        Ok(Catalog {
            inspector: self.inspector,
            search: self.search,
            mounts,
            policy: self.policy,
            cache_control: self.cache_control,
            page_context: self.page_context,
            concurrency: self.concurrency,
            entries: BTreeMap::new(),
        })
    }
}

/// Package pages keyed by public URL.
pub struct Catalog {
    inspector: Arc<dyn ArchiveInspector>,
    search: Option<Arc<dyn SearchIndex>>,
    mounts: Vec<MountPoint>,
    policy: RenderPolicy,
    cache_control: Option<String>,
    page_context: BTreeMap<String, String>,
    concurrency: usize,
    entries: BTreeMap<String, Entry>,
}

impl Catalog {
    /// Scan every mount and inspect the archives found.
    ///
    /// An archive that cannot be inspected or rendered is logged and left
    /// out; only an unreadable mount aborts the scan. Each pass replaces
    /// the previous contents, so archives that have disappeared are dropped.
    /// An aborted pass leaves the catalog unchanged.
    pub async fn discover(&mut self) -> CatalogResult<DiscoveryReport> {
        let mut report = DiscoveryReport::default();
        let mut entries = BTreeMap::new();

        for mp in self.mounts.clone() {
            let archives: Vec<PathBuf> = mp
                .list_all_files()
                .map_err(|e| {
                    error!("error listing {}: {}", mp.path.display(), e);
                    e
                })?
                .into_iter()
                .filter(|file| is_archive(file))
                .collect();
            debug!(
                "found {} archives below {}",
                archives.len(),
                mp.path.display()
            );

            let inspector = self.inspector.clone();
            let results: Vec<_> = stream::iter(archives)
                .map(|file| {
                    let inspector = inspector.clone();
                    let mp = mp.clone();
                    async move {
                        let result = ArchiveRecord::inspect(inspector.as_ref(), &mp, &file).await;
                        (file, result)
                    }
                })
                .buffered(self.concurrency)
                .collect()
                .await;

            for (file, result) in results {
                let outcome = match result {
                    Ok(record) => self.register(&mut entries, record).await,
                    Err(e) => Err(CatalogError::from(e)),
                };
                match outcome {
                    Ok(()) => report.registered += 1,
                    Err(e) => {
                        error!("error making deb page: {} - {}", file.display(), e);
                        report.failed.push(DiscoveryFailure {
                            file: mp.join(&file),
                            error: e,
                        });
                    }
                }
            }
        }

        self.entries = entries;
        info!(
            "cached {} dpkg-deb pages ({} failed)",
            report.registered,
            report.failed.len()
        );
        Ok(report)
    }

    async fn register(
        &self,
        entries: &mut BTreeMap<String, Entry>,
        record: ArchiveRecord,
    ) -> CatalogResult<()> {
        let url = record.public_url();
        let mut entry = Entry {
            record,
            page: None,
            state: EntryState::Inspected,
        };

        if self.policy == RenderPolicy::Eager {
            let page = render_page(&entry.record, &self.page_context)?;
            entry.state = EntryState::Rendered;
            if let Some(search) = &self.search {
                match search.add_document(&page).await {
                    Ok(()) => entry.state = EntryState::Indexed,
                    Err(e) => warn!("error indexing {}: {}", url, e),
                }
            }
            entry.page = Some(page);
        }

        if let Some(previous) = entries.insert(url.clone(), entry) {
            warn!(
                "{} already provided by {}, replacing",
                url,
                previous.record.source_path().display()
            );
        }
        debug!("cached dpkg-deb info: {}", url);
        Ok(())
    }

    /// The archive published at `path`.
    pub fn lookup(&self, path: &str) -> CatalogResult<&ArchiveRecord> {
        self.entries
            .get(path)
            .map(|entry| &entry.record)
            .ok_or_else(|| CatalogError::NotFound(path.to_string()))
    }

    /// The page for `path`, rendered now under the lazy policy.
    pub fn render(&self, path: &str) -> CatalogResult<PageDocument> {
        let entry = self
            .entries
            .get(path)
            .ok_or_else(|| CatalogError::NotFound(path.to_string()))?;
        match &entry.page {
            Some(page) => Ok(page.clone()),
            None => Ok(render_page(&entry.record, &self.page_context)?),
        }
    }

    /// Like [`Catalog::render`], but `None` for anything that cannot be shown.
    pub fn find_page(&self, path: &str) -> Option<PageDocument> {
        self.render(path).ok()
    }

    /// Cache directive for `page`: the page's own, then the catalog's, then
    /// [`DEFAULT_CACHE_CONTROL`].
    pub fn cache_control_for(&self, page: &PageDocument) -> String {
        page.context
            .get(CACHE_CONTROL_KEY)
            .or(self.cache_control.as_ref())
            .map_or_else(|| DEFAULT_CACHE_CONTROL.to_string(), String::clone)
    }

    /// Render the page for `path`, stamp its cache directive and hand it to
    /// `server`.
    pub fn serve_path<S: PageServer>(&self, path: &str, server: &S) -> CatalogResult<S::Response> {
        let mut page = self.render(path)?;
        let cache_control = self.cache_control_for(&page);
        page.context
            .insert(CACHE_CONTROL_KEY.to_string(), cache_control);
        let response = server.serve_page(&page)?;
        debug!("served local debinfo: [{}] {}", page.language, path);
        Ok(response)
    }

    /// Submit every page to `index`, returning how many were accepted.
    ///
    /// Under the lazy policy nothing is indexed unless this is called.
    pub async fn index_all(&self, index: &dyn SearchIndex) -> usize {
        let mut indexed = 0;
        for url in self.entries.keys() {
            let page = match self.render(url) {
                Ok(page) => page,
                Err(e) => {
                    error!("error rendering {}: {}", url, e);
                    continue;
                }
            };
            match index.add_document(&page).await {
                Ok(()) => indexed += 1,
                Err(e) => warn!("error indexing {}: {}", url, e),
            }
        }
        indexed
    }

    pub fn policy(&self) -> RenderPolicy {
        self.policy
    }

    /// Pipeline state of the archive published at `url`.
    pub fn state(&self, url: &str) -> Option<EntryState> {
        self.entries.get(url).map(|entry| entry.state)
    }

    /// Published URLs in sorted order.
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Local roots of the configured mounts, sorted.
    pub fn mount_paths(&self) -> Vec<&Path> {
        self.mounts.iter().map(|mp| mp.path.as_path()).collect()
    }
}
