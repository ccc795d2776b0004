//! Error types shared by the debinfo pipeline.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::inspector::InspectMode;

/// Why a single `dpkg-deb` invocation failed.
#[derive(Error, Debug)]
pub enum InspectionCause {
    /// The command could not be started.
    #[error("failed to run command: {0}")]
    Spawn(#[from] std::io::Error),

    /// The command ran but exited unsuccessfully.
    #[error("exited with status {code:?}: {stderr}")]
    ExitStatus {
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// The command did not finish in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The configured command line was empty or unparsable.
    #[error("invalid command line: {0}")]
    Command(String),

    /// The archive was not found below its mount.
    #[error("file does not exist")]
    Missing,
}

/// Inspecting an archive failed.
#[derive(Error, Debug)]
#[error("inspecting {} ({mode}) failed: {cause}", file.display())]
pub struct InspectionError {
    /// Archive that was being inspected.
    pub file: PathBuf,
    /// Which report was being produced.
    pub mode: InspectMode,
    /// Underlying failure.
    #[source]
    pub cause: InspectionCause,
}

impl InspectionError {
    /// Returns true if the failure was a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self.cause, InspectionCause::Timeout(_))
    }
}

/// Non-fatal problems found while parsing a control report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseWarning {
    /// The Maintainer field is not of the form `Name <email>`.
    #[error("error parsing name and email: {0}")]
    Maintainer(String),

    /// No `Description:` line with a long description was found.
    #[error("error parsing long description")]
    Description,
}

/// Building a page document failed.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Serializing the page body failed.
    #[error("failed to serialize page body: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The page template could not be rendered.
    #[error("template error: {0}")]
    Template(String),

    /// The page could not be constructed.
    #[error("error making new page: {path} - {message}")]
    Page {
        /// Archive the page belongs to.
        path: String,
        /// Error message.
        message: String,
    },
}

/// Submitting a document to the search index failed.
#[derive(Error, Debug)]
pub enum SearchIndexError {
    /// The index refused the document.
    #[error("search index rejected {url}: {reason}")]
    Rejected {
        /// Public URL of the document.
        url: String,
        /// Reason given by the index.
        reason: String,
    },

    /// The index lock was poisoned by a panicking writer.
    #[error("search index lock poisoned")]
    Poisoned,
}

/// Errors raised by the catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The requested path is not in the catalog.
    #[error("path not found: {0}")]
    NotFound(String),

    /// Inspecting an archive failed.
    #[error(transparent)]
    Inspection(#[from] InspectionError),

    /// Rendering a page failed.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Listing a mount failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    /// Returns true if the error only means the path is not ours to serve.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file could not be parsed.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A setting has an invalid value.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The eager policy needs a search index to submit pages to.
    #[error("fts search index not found")]
    MissingSearchIndex,
}

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;
