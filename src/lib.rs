//! Package information pages for Debian archives.
//!
//! Archives found below configured mount points are inspected with
//! `dpkg-deb`, their control data parsed, and a page describing each one
//! rendered and published under a URL mirroring its location.

pub mod catalog;
pub mod config;
pub mod control;
pub mod error;
pub mod inspector;
pub mod logging;
pub mod mount;
pub mod record;
pub mod render;
pub mod search;

pub mod test_utils;

pub use catalog::{Catalog, CatalogBuilder, PageServer, RenderPolicy};
pub use config::Config;
pub use control::{DebInfo, ParsedControl};
pub use error::{CatalogError, ConfigError, InspectionError, RenderError, SearchIndexError};
pub use inspector::{ArchiveInspector, DpkgDebInspector, InspectMode};
pub use record::ArchiveRecord;
pub use render::PageDocument;
pub use search::{MemorySearchIndex, SearchIndex};
