//! End-to-end retrieval tests with mock collaborators.
//!
//! A deterministic mock embedder and an in-memory mock scraper drive the
//! orchestrator through the full lifecycle: cache miss → scrape → append →
//! index rebuild → scoped search → metadata join.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use avicenne::config::{Config, CorpusConfig, VectorStoreConfig};
use avicenne::embedding::Embedder;
use avicenne::error::{Result, RetrievalError};
use avicenne::models::Document;
use avicenne::orchestrator::Orchestrator;
use avicenne::query;
use avicenne::scrape::{ScrapedBatch, Scraper};
use avicenne::search::TopN;

const MOCK_MODEL: &str = "mock-embed";

/// Deterministic embedder: byte-bucket counts, fixed per model identifier.
struct MockEmbedder;

#[async_trait]
impl Embedder for MockEmbedder {
    fn model_name(&self) -> &str {
        MOCK_MODEL
    }

    fn dims(&self) -> usize {
        8
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = [0.0f32; 8];
                for b in t.bytes() {
                    v[(b % 8) as usize] += 1.0;
                }
                v.to_vec()
            })
            .collect())
    }
}

/// Scraper serving a fixed document set and counting its invocations.
struct MockScraper {
    documents: Vec<Document>,
    calls: AtomicUsize,
    head: String,
}

impl MockScraper {
    fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            calls: AtomicUsize::new(0),
            head: "https://theses.fr/?q=".to_string(),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scraper for MockScraper {
    async fn fetch(&self, raw_query: &str) -> Result<ScrapedBatch> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ScrapedBatch {
            documents: self.documents.clone(),
            query_url: query::url_for_query(raw_query, &self.head, "")?,
        })
    }
}

fn make_doc(content: &str, title: &str, url: &str) -> Document {
    Document {
        content: content.to_string(),
        title: title.to_string(),
        url: url.to_string(),
        extra: BTreeMap::new(),
    }
}

fn thesis_docs() -> Vec<Document> {
    let mut with_extra = make_doc(
        "neural networks for automated theorem proving",
        "Networks and proofs",
        "https://t/3",
    );
    with_extra
        .extra
        .insert("university".to_string(), "Lyon".to_string());
    vec![
        make_doc(
            "machine learning applied to medical imaging",
            "ML imaging",
            "https://t/1",
        ),
        make_doc(
            "bayesian statistics in clinical trials",
            "Bayesian trials",
            "https://t/2",
        ),
        with_extra,
    ]
}

fn test_config(tmp: &TempDir) -> Config {
    let root = tmp.path();
    let mut config = Config {
        corpus: CorpusConfig {
            path: root.join("corpus.csv"),
            scoped_path: root.join("last_query.csv"),
        },
        vector_store: VectorStoreConfig {
            path: root.join("vector_store"),
        },
        embedding: Default::default(),
        retrieval: Default::default(),
        scraper: Default::default(),
        summarizer: Default::default(),
    };
    config.embedding.model = MOCK_MODEL.to_string();
    config.embedding.dims = 8;
    config
}

fn make_orchestrator(tmp: &TempDir, scraper: Arc<dyn Scraper>) -> Orchestrator {
    Orchestrator::new(test_config(tmp), scraper, Arc::new(MockEmbedder)).unwrap()
}

#[tokio::test]
async fn test_second_fetch_is_a_pure_cache_hit() {
    let tmp = TempDir::new().unwrap();
    let scraper = Arc::new(MockScraper::new(thesis_docs()));
    let orchestrator = make_orchestrator(&tmp, scraper.clone());

    let first = orchestrator.ensure_cached("machine learning").await.unwrap();
    assert_eq!(first.rows.len(), 3);
    assert_eq!(scraper.call_count(), 1);
    let rows_after_first = orchestrator.corpus().len();

    // Same query, different surrounding whitespace: identical cache key
    let second = orchestrator
        .ensure_cached("  machine   learning ")
        .await
        .unwrap();
    assert_eq!(second.query_url, first.query_url);
    assert_eq!(scraper.call_count(), 1, "second call must not scrape");
    assert_eq!(orchestrator.corpus().len(), rows_after_first);
}

#[tokio::test]
async fn test_distinct_queries_scope_distinct_working_sets() {
    let tmp = TempDir::new().unwrap();
    let scraper = Arc::new(MockScraper::new(thesis_docs()));
    let orchestrator = make_orchestrator(&tmp, scraper.clone());

    let a = orchestrator.ensure_cached("machine learning").await.unwrap();
    let b = orchestrator.ensure_cached("graph theory").await.unwrap();

    assert_ne!(a.query_url, b.query_url);
    assert_eq!(scraper.call_count(), 2);
    assert_eq!(orchestrator.corpus().len(), 6);
    assert_eq!(a.rows.len(), 3);
    assert_eq!(b.rows.len(), 3);
}

#[tokio::test]
async fn test_bm25_answer_joins_full_metadata() {
    let tmp = TempDir::new().unwrap();
    let scraper = Arc::new(MockScraper::new(thesis_docs()));
    let orchestrator = make_orchestrator(&tmp, scraper);

    let set = orchestrator.ensure_cached("theorem proving").await.unwrap();
    let ranked = orchestrator
        .answer(&set, "theorem proving networks", "BM25", TopN::Literal(1))
        .await
        .unwrap();

    assert_eq!(ranked.len(), 1);
    let top = &ranked[0];
    assert_eq!(top.row.url(), "https://t/3");
    assert_eq!(top.row.title(), "Networks and proofs");
    assert_eq!(top.row.get("university"), "Lyon");
    assert_eq!(top.row.query_url(), set.query_url);
}

#[tokio::test]
async fn test_dense_answer_uses_persisted_index_and_joins_metadata() {
    let tmp = TempDir::new().unwrap();
    let scraper = Arc::new(MockScraper::new(thesis_docs()));
    let orchestrator = make_orchestrator(&tmp, scraper);

    let set = orchestrator.ensure_cached("medical imaging").await.unwrap();
    let ranked = orchestrator
        .answer(
            &set,
            "machine learning applied to medical imaging",
            MOCK_MODEL,
            TopN::Literal(2),
        )
        .await
        .unwrap();

    assert_eq!(ranked.len(), 2);
    // exact content match ranks first under the deterministic embedder
    assert_eq!(ranked[0].row.url(), "https://t/1");
    assert_eq!(ranked[0].row.title(), "ML imaging");
    assert!(ranked[0].score >= ranked[1].score);
    // every joined row belongs to this query's working set
    for r in &ranked {
        assert_eq!(r.row.query_url(), set.query_url);
    }
}

#[tokio::test]
async fn test_top_all_returns_whole_working_set() {
    let tmp = TempDir::new().unwrap();
    let scraper = Arc::new(MockScraper::new(thesis_docs()));
    let orchestrator = make_orchestrator(&tmp, scraper);

    let set = orchestrator.ensure_cached("statistics").await.unwrap();
    let ranked = orchestrator
        .answer(&set, "bayesian", "BM25", TopN::parse("ALL").unwrap())
        .await
        .unwrap();

    assert_eq!(ranked.len(), set.rows.len());
}

#[tokio::test]
async fn test_unknown_model_is_configuration_error_not_empty() {
    let tmp = TempDir::new().unwrap();
    let scraper = Arc::new(MockScraper::new(thesis_docs()));
    let orchestrator = make_orchestrator(&tmp, scraper);

    let set = orchestrator.ensure_cached("statistics").await.unwrap();
    let err = orchestrator
        .answer(&set, "bayesian", "word2vec", TopN::All)
        .await
        .unwrap_err();

    assert!(matches!(err, RetrievalError::Configuration(_)));
}

#[tokio::test]
async fn test_empty_scrape_is_an_error_and_persists_nothing() {
    struct EmptyScraper;

    #[async_trait]
    impl Scraper for EmptyScraper {
        async fn fetch(&self, raw_query: &str) -> Result<ScrapedBatch> {
            Ok(ScrapedBatch {
                documents: Vec::new(),
                query_url: query::url_for_query(raw_query, "https://theses.fr/?q=", "")?,
            })
        }
    }

    let tmp = TempDir::new().unwrap();
    let orchestrator = make_orchestrator(&tmp, Arc::new(EmptyScraper));

    let err = orchestrator.ensure_cached("nothing here").await.unwrap_err();
    assert!(matches!(err, RetrievalError::EmptyScrape(_)));
    assert_eq!(orchestrator.corpus().len(), 0);

    // the query was not registered as served, so a retry scrapes again
    let err = orchestrator.ensure_cached("nothing here").await.unwrap_err();
    assert!(matches!(err, RetrievalError::EmptyScrape(_)));
}

#[tokio::test(start_paused = true)]
async fn test_slow_scraper_surfaces_timeout() {
    struct SlowScraper;

    #[async_trait]
    impl Scraper for SlowScraper {
        async fn fetch(&self, raw_query: &str) -> Result<ScrapedBatch> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok(ScrapedBatch {
                documents: Vec::new(),
                query_url: raw_query.to_string(),
            })
        }
    }

    let tmp = TempDir::new().unwrap();
    let orchestrator = make_orchestrator(&tmp, Arc::new(SlowScraper));

    let err = orchestrator.ensure_cached("slow query").await.unwrap_err();
    assert!(matches!(err, RetrievalError::Timeout(_)));
    assert_eq!(orchestrator.corpus().len(), 0);
}

#[tokio::test]
async fn test_scoped_spreadsheet_written_for_external_viewers() {
    let tmp = TempDir::new().unwrap();
    let scraper = Arc::new(MockScraper::new(thesis_docs()));
    let config = test_config(&tmp);
    let scoped_path = config.corpus.scoped_path.clone();
    let orchestrator = Orchestrator::new(config, scraper, Arc::new(MockEmbedder)).unwrap();

    orchestrator.ensure_cached("medical imaging").await.unwrap();

    let scoped = std::fs::read_to_string(&scoped_path).unwrap();
    assert!(scoped.contains("ML imaging"));
    // header + three rows
    assert_eq!(scoped.lines().count(), 4);
}

#[tokio::test]
async fn test_corpus_survives_reopen_with_cache_intact() {
    let tmp = TempDir::new().unwrap();
    let scraper = Arc::new(MockScraper::new(thesis_docs()));

    {
        let orchestrator = make_orchestrator(&tmp, scraper.clone());
        orchestrator.ensure_cached("machine learning").await.unwrap();
    }
    assert_eq!(scraper.call_count(), 1);

    // a fresh orchestrator over the same files sees the cached query
    let orchestrator = make_orchestrator(&tmp, scraper.clone());
    let set = orchestrator.ensure_cached("machine learning").await.unwrap();
    assert_eq!(scraper.call_count(), 1, "reopen must not rescrape");
    assert_eq!(set.rows.len(), 3);

    // and the persisted index still answers dense queries
    let ranked = orchestrator
        .answer(
            &set,
            "bayesian statistics in clinical trials",
            MOCK_MODEL,
            TopN::Literal(1),
        )
        .await
        .unwrap();
    assert_eq!(ranked[0].row.url(), "https://t/2");
}
