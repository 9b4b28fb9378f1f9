//! Core data models for the retrieval engine.
//!
//! These types represent the documents, corpus rows, and ranked results that
//! flow through scraping, indexing, and search.

use std::collections::BTreeMap;

/// Sentinel written into any corpus cell whose source field was absent.
pub const MISSING_VALUE: &str = "Missing value";

/// Column holding a document's body text.
pub const COL_CONTENT: &str = "content";
/// Column holding the document's title.
pub const COL_TITLE: &str = "title";
/// Column holding the document's own URL (its identifier within a result set).
pub const COL_URL_THESE: &str = "url_these";
/// Column holding the canonical query URL that produced the row (cache key).
pub const COL_URL_QUERY: &str = "url_query";
/// Column holding the display-shortened body text.
pub const COL_CONTENT_CONDENSED: &str = "content_condensed";
/// Column holding the append timestamp (ISO 8601).
pub const COL_RETRIEVED_AT: &str = "retrieved_at";

/// A scraped document before it enters the corpus.
///
/// `content` must be non-empty; `title` and `url` may be empty and are
/// sentinel-filled on append. Any additional scraped fields ride along in
/// `extra` and become corpus columns.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub content: String,
    pub title: String,
    pub url: String,
    pub extra: BTreeMap<String, String>,
}

/// One row of the corpus table: a document plus its cache-key tag.
///
/// Stored column-per-key; every column of the table is present after append
/// (missing source fields hold [`MISSING_VALUE`]).
#[derive(Debug, Clone, Default)]
pub struct CorpusRow {
    pub fields: BTreeMap<String, String>,
}

impl CorpusRow {
    /// Cell value for `column`, or the sentinel if the column is absent.
    pub fn get(&self, column: &str) -> &str {
        self.fields
            .get(column)
            .map(String::as_str)
            .unwrap_or(MISSING_VALUE)
    }

    pub fn content(&self) -> &str {
        self.get(COL_CONTENT)
    }

    pub fn title(&self) -> &str {
        self.get(COL_TITLE)
    }

    pub fn url(&self) -> &str {
        self.get(COL_URL_THESE)
    }

    pub fn query_url(&self) -> &str {
        self.get(COL_URL_QUERY)
    }
}

/// Column-oriented document table: column name → one value per row.
///
/// The shape the vector-index builder consumes; all columns must be
/// row-aligned.
pub type ColumnTable = BTreeMap<String, Vec<String>>;

/// A paragraph ranked by the similarity engine.
///
/// `index` is the paragraph's position in the candidate set handed to the
/// engine (original corpus order), which also breaks score ties.
#[derive(Debug, Clone)]
pub struct RankedParagraph {
    pub content: String,
    pub index: usize,
    pub score: f64,
}

/// A ranked result joined back to its full corpus row.
#[derive(Debug, Clone)]
pub struct RankedDocument {
    pub row: CorpusRow,
    pub score: f64,
}
