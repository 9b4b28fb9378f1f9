//! Corpus store: the flat spreadsheet-backed table of every document ever
//! retrieved, keyed by the query that produced it.
//!
//! The table is append-only and grows monotonically. Appends normalize
//! missing fields to the `"Missing value"` sentinel, tag every row with the
//! query's cache key, and persist the whole table by writing a temp file
//! and renaming it over the previous one, so a failed write never corrupts
//! the prior copy.
//!
//! Appends are serialized behind a single writer lock; `exists`/`select`
//! reads proceed concurrently.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::Utc;

use crate::context::condense_content;
use crate::error::{Result, RetrievalError};
use crate::models::{
    ColumnTable, CorpusRow, Document, COL_CONTENT, COL_CONTENT_CONDENSED, COL_RETRIEVED_AT,
    COL_TITLE, COL_URL_QUERY, COL_URL_THESE, MISSING_VALUE,
};

/// Words kept on each side of the ellipsis in `content_condensed`.
const CONDENSED_WORDS: usize = 10;

/// Core columns, in header order; scraped extras follow alphabetically.
const CORE_COLUMNS: [&str; 6] = [
    COL_CONTENT,
    COL_TITLE,
    COL_URL_THESE,
    COL_URL_QUERY,
    COL_CONTENT_CONDENSED,
    COL_RETRIEVED_AT,
];

struct TableState {
    columns: Vec<String>,
    rows: Vec<CorpusRow>,
}

/// The durable corpus table and its on-disk spreadsheet file.
pub struct CorpusStore {
    path: PathBuf,
    state: RwLock<TableState>,
}

impl CorpusStore {
    /// Open the store at `path`, loading the spreadsheet if it exists.
    ///
    /// A missing file yields an empty table; the file itself is created on
    /// the first `persist`.
    pub fn open(path: &Path) -> Result<Self> {
        let state = if path.exists() {
            read_table(path)?
        } else {
            TableState {
                columns: CORE_COLUMNS.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            state: RwLock::new(state),
        })
    }

    /// True iff a row tagged with `query_url` is already present.
    pub fn exists(&self, query_url: &str) -> bool {
        let state = self.state.read().unwrap();
        state.rows.iter().any(|row| row.query_url() == query_url)
    }

    /// Rows belonging to one query, in corpus order.
    pub fn select(&self, query_url: &str) -> Vec<CorpusRow> {
        let state = self.state.read().unwrap();
        state
            .rows
            .iter()
            .filter(|row| row.query_url() == query_url)
            .cloned()
            .collect()
    }

    /// Normalize, tag, append, and persist new documents.
    ///
    /// Fails with a `Schema` error before any mutation if a document's
    /// `content` is empty after whitespace normalization. Returns the
    /// number of rows appended.
    pub fn append(&self, documents: &[Document], query_url: &str) -> Result<usize> {
        for (i, doc) in documents.iter().enumerate() {
            if doc.content.trim().is_empty() {
                return Err(RetrievalError::Schema(format!(
                    "document {} has empty content, nothing was appended",
                    i
                )));
            }
        }

        let retrieved_at = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();

        let mut state = self.state.write().unwrap();

        let mut new_columns: BTreeSet<String> = BTreeSet::new();
        for doc in documents {
            for key in doc.extra.keys() {
                if !state.columns.iter().any(|c| c == key) {
                    new_columns.insert(key.clone());
                }
            }
        }
        state.columns.extend(new_columns);

        for doc in documents {
            let mut row = CorpusRow::default();
            row.fields
                .insert(COL_CONTENT.into(), doc.content.trim().to_string());
            row.fields
                .insert(COL_TITLE.into(), non_empty_or_sentinel(&doc.title));
            row.fields
                .insert(COL_URL_THESE.into(), non_empty_or_sentinel(&doc.url));
            row.fields.insert(COL_URL_QUERY.into(), query_url.into());
            row.fields.insert(
                COL_CONTENT_CONDENSED.into(),
                condense_content(doc.content.trim(), CONDENSED_WORDS),
            );
            row.fields
                .insert(COL_RETRIEVED_AT.into(), retrieved_at.clone());
            for (key, value) in &doc.extra {
                row.fields
                    .insert(key.clone(), non_empty_or_sentinel(value));
            }
            state.rows.push(row);
        }

        write_table(&self.path, &state.columns, &state.rows)?;
        Ok(documents.len())
    }

    /// Create the spreadsheet file if it does not exist yet.
    pub fn persist(&self) -> Result<()> {
        let state = self.state.read().unwrap();
        write_table(&self.path, &state.columns, &state.rows)
    }

    /// Total row count across all queries.
    pub fn len(&self) -> usize {
        self.state.read().unwrap().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distinct cache keys present in the table, in first-seen order.
    pub fn distinct_queries(&self) -> Vec<String> {
        let state = self.state.read().unwrap();
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for row in &state.rows {
            if seen.insert(row.query_url().to_string()) {
                out.push(row.query_url().to_string());
            }
        }
        out
    }

    /// Header order of the current table.
    pub fn columns(&self) -> Vec<String> {
        self.state.read().unwrap().columns.clone()
    }

    /// The whole table as column-oriented data for the index builder.
    ///
    /// Every column is row-aligned; cells absent from a row hold the
    /// sentinel, mirroring the spreadsheet representation.
    pub fn column_table(&self) -> ColumnTable {
        let state = self.state.read().unwrap();
        let mut table = ColumnTable::new();
        for column in &state.columns {
            let values = state
                .rows
                .iter()
                .map(|row| row.get(column).to_string())
                .collect();
            table.insert(column.clone(), values);
        }
        table
    }
}

fn non_empty_or_sentinel(value: &str) -> String {
    if value.trim().is_empty() {
        MISSING_VALUE.to_string()
    } else {
        value.trim().to_string()
    }
}

fn read_table(path: &Path) -> Result<TableState> {
    let mut reader = csv::Reader::from_path(path)?;
    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = CorpusRow::default();
        for (column, cell) in columns.iter().zip(record.iter()) {
            row.fields.insert(column.clone(), cell.to_string());
        }
        rows.push(row);
    }

    Ok(TableState { columns, rows })
}

/// Write a table as CSV via temp-file-then-rename.
///
/// Cells absent from a row are sentinel-filled, so rows appended before a
/// column existed still produce a complete record.
pub fn write_table(path: &Path, columns: &[String], rows: &[CorpusRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("tmp");
    {
        let mut writer = csv::Writer::from_path(&tmp_path)?;
        writer.write_record(columns)?;
        for row in rows {
            let record: Vec<&str> = columns.iter().map(|c| row.get(c)).collect();
            writer.write_record(&record)?;
        }
        writer.flush()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
