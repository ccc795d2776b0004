//! Full-text search ingestion.
//!
//! The catalog only needs to hand rendered pages to an index; the
//! [`MemorySearchIndex`] is a small term index good enough for a site with a
//! few thousand packages.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::SearchIndexError;
use crate::render::PageDocument;

/// Destination for rendered pages.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Add or replace the document published at `page.url`.
    async fn add_document(&self, page: &PageDocument) -> Result<(), SearchIndexError>;
}

/// A search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub summary: String,
    /// Number of query terms the document contains.
    pub score: usize,
}

#[derive(Debug, Clone)]
struct IndexedPage {
    title: String,
    summary: String,
    terms: BTreeSet<String>,
}

/// In-memory term index keyed by page URL.
#[derive(Debug, Default)]
pub struct MemorySearchIndex {
    pages: RwLock<BTreeMap<String, IndexedPage>>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed pages.
    pub fn len(&self) -> usize {
        self.pages.read().map(|pages| pages.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pages containing any of the terms in `query`, best matches first.
    pub fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchIndexError> {
        let terms = tokenize(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let pages = self.pages.read().map_err(|_| SearchIndexError::Poisoned)?;
        let mut hits: Vec<SearchHit> = pages
            .iter()
            .filter_map(|(url, page)| {
                let score = terms.iter().filter(|term| page.terms.contains(*term)).count();
                (score > 0).then(|| SearchHit {
                    url: url.clone(),
                    title: page.title.clone(),
                    summary: page.summary.clone(),
                    score,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.url.cmp(&b.url)));
        Ok(hits)
    }
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    async fn add_document(&self, page: &PageDocument) -> Result<(), SearchIndexError> {
        if page.url.is_empty() {
            return Err(SearchIndexError::Rejected {
                url: page.url.clone(),
                reason: "empty url".to_string(),
            });
        }

        let mut text = vec![page.title.clone(), page.description.clone()];
        collect_text(&page.body, false, &mut text);
        let terms = text.iter().flat_map(|t| tokenize(t)).collect();

        let indexed = IndexedPage {
            title: page.title.clone(),
            summary: page_summary(&page.body).unwrap_or_default(),
            terms,
        };
        self.pages
            .write()
            .map_err(|_| SearchIndexError::Poisoned)?
            .insert(page.url.clone(), indexed);
        Ok(())
    }
}

/// Lowercased alphanumeric words, with `-`, `+` and `.` kept inside words so
/// package names and versions stay whole.
fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !(c.is_alphanumeric() || matches!(c, '-' | '+' | '.')))
        .map(|word| word.trim_matches(|c: char| matches!(c, '-' | '+' | '.')))
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Strings found under `text` and `header` keys of the content blocks.
fn collect_text(value: &Value, inside: bool, out: &mut Vec<String>) {
    match value {
        Value::String(s) if inside => out.push(s.clone()),
        Value::Array(items) => {
            for item in items {
                collect_text(item, inside, out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                collect_text(item, key == "text" || key == "header", out);
            }
        }
        _ => {}
    }
}

fn page_summary(body: &Value) -> Option<String> {
    body.as_array()?
        .iter()
        .filter_map(|block| block["content"]["blocks"].as_array())
        .flatten()
        .find(|block| block["tag"] == "package-summary")
        .and_then(|block| block["content"]["header"][0].as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::MountPoint;
    use crate::record::ArchiveRecord;
    use crate::render::render_page;

    fn page(file: &str, info: &str) -> PageDocument {
        let record = ArchiveRecord::new(
            MountPoint::new("/srv/debs", "/apt"),
            file,
            info.to_string(),
            "./usr/bin/secret-binary-name\n".to_string(),
        );
        render_page(&record, &Default::default()).unwrap()
    }

    #[test]
    fn test_tokenize() {
        let terms = tokenize("GNU hello, version 2.10-3 (libc6).");
        assert!(terms.contains("gnu"));
        assert!(terms.contains("hello"));
        assert!(terms.contains("2.10-3"));
        assert!(terms.contains("libc6"));
        assert!(!terms.contains(""));
    }

    #[tokio::test]
    async fn test_add_and_search() {
        let index = MemorySearchIndex::new();
        index
            .add_document(&page(
                "hello_2.10_amd64.deb",
                "Package: hello\nSection: devel\nDescription: friendly greeting\n more text\n",
            ))
            .await
            .unwrap();
        index
            .add_document(&page(
                "bye_1.0_amd64.deb",
                "Package: bye\nSection: devel\nDescription: farewell\n more text\n",
            ))
            .await
            .unwrap();
        assert_eq!(index.len(), 2);

        let hits = index.search("hello greeting").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, "/apt/hello_2.10_amd64.deb");
        assert_eq!(hits[0].summary, "friendly greeting");
        assert_eq!(hits[0].score, 2);

        let hits = index.search("devel").unwrap();
        assert_eq!(
            hits.iter().map(|h| h.url.as_str()).collect::<Vec<_>>(),
            vec!["/apt/bye_1.0_amd64.deb", "/apt/hello_2.10_amd64.deb"]
        );

        // File listings are not indexed.
        assert!(index.search("secret-binary-name").unwrap().is_empty());
        assert!(index.search("  ").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reindex_replaces() {
        let index = MemorySearchIndex::new();
        let first = page("x.deb", "Package: x\nDescription: alpha\n one\n");
        let second = page("x.deb", "Package: x\nDescription: beta\n two\n");
        index.add_document(&first).await.unwrap();
        index.add_document(&second).await.unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.search("alpha").unwrap().is_empty());
        assert_eq!(index.search("beta").unwrap().len(), 1);
    }
}
