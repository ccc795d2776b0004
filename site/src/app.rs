use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::{routing::get, Router};
use debinfo::catalog::{Catalog, CatalogBuilder, RenderPolicy};
use debinfo::config::Config;
use debinfo::inspector::{ArchiveInspector, DpkgDebInspector};
use debinfo::search::MemorySearchIndex;
use tower::ServiceBuilder;
use tracing::{info, warn};

use crate::handlers;
use crate::middleware::{catalog_middleware, create_trace_layer, request_logging_middleware};
use crate::templates::TemplatePageServer;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub search: Arc<MemorySearchIndex>,
    pub pages: Arc<TemplatePageServer>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(catalog: Catalog, search: Arc<MemorySearchIndex>) -> Result<Self> {
        Ok(Self {
            catalog: Arc::new(catalog),
            search,
            pages: Arc::new(TemplatePageServer::new()?),
            start_time: Instant::now(),
        })
    }

    /// Build the catalog described by `config` using `dpkg-deb`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let inspector = DpkgDebInspector::new(&config.inspector.command, config.inspector.timeout())?;
        Self::with_inspector(config, Arc::new(inspector)).await
    }

    /// Build the catalog and run discovery to completion.
    pub async fn with_inspector(
        config: &Config,
        inspector: Arc<dyn ArchiveInspector>,
    ) -> Result<Self> {
        let search = Arc::new(MemorySearchIndex::new());
        let mut catalog = CatalogBuilder::from_config(config, inspector)
            .search_index(search.clone())
            .build()?;

        let report = catalog.discover().await?;
        for failure in &report.failed {
            warn!("skipped {}: {}", failure.file.display(), failure.error);
        }
        if catalog.policy() == RenderPolicy::Lazy {
            info!("lazy rendering enabled, search index left empty");
        }
        info!(
            "serving {} package pages from {} mounts",
            catalog.len(),
            catalog.mount_paths().len()
        );

        Self::new(catalog, search)
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::status))
        .route("/search", get(handlers::search))
        .fallback(handlers::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(create_trace_layer())
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    catalog_middleware,
                )),
        )
        .with_state(state)
}
