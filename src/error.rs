//! Error taxonomy for the retrieval engine.
//!
//! Every failure the library can surface is a [`RetrievalError`] variant, so
//! callers can tell a misconfigured search apart from a search that simply
//! matched nothing (which returns an empty result set, not an error).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// All failure kinds surfaced by the retrieval engine.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Malformed or missing document fields, or misaligned column lengths.
    #[error("schema error: {0}")]
    Schema(String),

    /// Unknown similarity model selector, missing credential, or other
    /// invalid configuration detected at a component boundary.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A persisted artifact (index directory, corpus file) is absent.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A persisted index was built with a different embedding model than
    /// the one supplied to load it.
    #[error("embedder mismatch: index was built with '{expected}', got '{actual}'")]
    EmbedderMismatch { expected: String, actual: String },

    /// Scraper or embedding-endpoint transport failure.
    #[error("network error: {0}")]
    Network(String),

    /// Scraper returned content the collaborator could not parse.
    #[error("parse error: {0}")]
    Parse(String),

    /// The scraper collaborator did not answer within the configured window.
    #[error("scrape timed out after {0:?}")]
    Timeout(Duration),

    /// The scraper answered but returned zero documents; nothing was
    /// persisted, so a retry will scrape again.
    #[error("scrape for '{0}' returned no documents")]
    EmptyScrape(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("docstore serialization: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for RetrievalError {
    fn from(err: reqwest::Error) -> Self {
        RetrievalError::Network(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
