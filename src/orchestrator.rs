//! Retrieval orchestration: the lifecycle of one user query.
//!
//! A query moves through cache check → (on miss) scrape, append, full index
//! rebuild → scoped working set → similarity answer. The orchestrator is
//! the only writer of the corpus file and the index directory; everything
//! else reads.
//!
//! Scrape failures, schema violations, and configuration errors surface to
//! the caller unchanged; the corpus is never left partially written because
//! the store persists atomically and a failed scrape appends nothing.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Config;
use crate::corpus::{write_table, CorpusStore};
use crate::embedding::Embedder;
use crate::error::{Result, RetrievalError};
use crate::index::VectorIndex;
use crate::models::{CorpusRow, RankedDocument, COL_URL_QUERY, COL_URL_THESE};
use crate::query;
use crate::scrape::Scraper;
use crate::search::{bm25_rank, dense_rank, resolve_strategy, RankingStrategy, TopN};

/// The rows serving one query: the scoped result set similarity requests
/// run against.
#[derive(Debug, Clone)]
pub struct WorkingSet {
    pub query_url: String,
    pub rows: Vec<CorpusRow>,
}

/// Coordinates corpus, scraper, index, and search for a query lifecycle.
pub struct Orchestrator {
    config: Config,
    corpus: CorpusStore,
    scraper: Arc<dyn Scraper>,
    embedder: Arc<dyn Embedder>,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        scraper: Arc<dyn Scraper>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let corpus = CorpusStore::open(&config.corpus.path)?;
        Ok(Self {
            config,
            corpus,
            scraper,
            embedder,
        })
    }

    pub fn corpus(&self) -> &CorpusStore {
        &self.corpus
    }

    /// Directory of the persisted index for the configured embedding model.
    pub fn index_dir(&self) -> PathBuf {
        self.config
            .vector_store
            .path
            .join(&self.config.embedding.model)
    }

    /// Make sure the query's documents are cached, then return its working
    /// set.
    ///
    /// A cache hit skips scraping and indexing entirely. A miss scrapes
    /// (under the configured deadline), appends to the corpus, and rebuilds
    /// the index over the entire updated corpus. The working set is also
    /// written to the temporary scoped spreadsheet for external viewers.
    pub async fn ensure_cached(&self, raw_query: &str) -> Result<WorkingSet> {
        let query_url = query::url_for_query(
            raw_query,
            &self.config.scraper.query_url_head,
            &self.config.scraper.query_url_tail,
        )?;

        if self.corpus.exists(&query_url) {
            info!(query_url = %query_url, "query already cached, skipping scrape");
        } else {
            self.scrape_and_index(raw_query, &query_url).await?;
        }

        let rows = self.corpus.select(&query_url);
        write_table(
            &self.config.corpus.scoped_path,
            &self.corpus.columns(),
            &rows,
        )?;

        Ok(WorkingSet { query_url, rows })
    }

    async fn scrape_and_index(&self, raw_query: &str, query_url: &str) -> Result<()> {
        info!(query = raw_query, "cache miss, scraping");

        let deadline = Duration::from_secs(self.config.scraper.timeout_secs);
        let batch = tokio::time::timeout(deadline, self.scraper.fetch(raw_query))
            .await
            .map_err(|_| RetrievalError::Timeout(deadline))??;

        if batch.query_url != query_url {
            warn!(
                reported = %batch.query_url,
                derived = %query_url,
                "scraper reported a different canonical url; keeping the derived key"
            );
        }

        if batch.documents.is_empty() {
            return Err(RetrievalError::EmptyScrape(query_url.to_string()));
        }

        let appended = self.corpus.append(&batch.documents, query_url)?;
        info!(appended, total = self.corpus.len(), "corpus updated");

        // Full rebuild over the whole corpus; the index is a cache, never
        // patched in place.
        let mut table = self.corpus.column_table();
        let row_count = self.corpus.len();
        table.insert(
            "id".to_string(),
            (0..row_count).map(|i| i.to_string()).collect(),
        );
        let index = VectorIndex::build(&table, self.embedder.as_ref()).await?;
        index.save(&self.index_dir())?;
        info!(entries = index.len(), "vector index rebuilt");

        Ok(())
    }

    /// Answer a similarity request against a working set.
    ///
    /// The selector resolves to a strategy once, here. Results are joined
    /// back to their full corpus rows by document URL, preserving rank
    /// order.
    pub async fn answer(
        &self,
        set: &WorkingSet,
        text: &str,
        selector: &str,
        top_n: TopN,
    ) -> Result<Vec<RankedDocument>> {
        let strategy = resolve_strategy(selector, &self.config.embedding.model)?;

        match strategy {
            RankingStrategy::Bm25 => {
                let paragraphs: Vec<String> = set
                    .rows
                    .iter()
                    .map(|row| row.content().to_string())
                    .collect();
                let ranked = bm25_rank(text, &paragraphs, top_n);
                Ok(ranked
                    .into_iter()
                    .map(|r| RankedDocument {
                        row: set.rows[r.index].clone(),
                        score: r.score,
                    })
                    .collect())
            }
            RankingStrategy::Dense { .. } => {
                // Loaded lazily per request; the load guards the embedder
                // identity against the persisted model.
                let index = VectorIndex::load(&self.index_dir(), self.embedder.as_ref())?;

                let mut filter = BTreeMap::new();
                filter.insert(COL_URL_QUERY.to_string(), set.query_url.clone());

                let ranked = dense_rank(
                    text,
                    &index,
                    self.embedder.as_ref(),
                    &filter,
                    set.rows.len(),
                    top_n,
                )
                .await?;

                Ok(ranked
                    .into_iter()
                    .filter_map(|r| {
                        let url = index.entry(r.index).metadata.get(COL_URL_THESE)?;
                        let row = set.rows.iter().find(|row| row.url() == url)?;
                        Some(RankedDocument {
                            row: row.clone(),
                            score: r.score,
                        })
                    })
                    .collect())
            }
        }
    }
}
