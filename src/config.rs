use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    /// Spreadsheet file holding the full accumulated corpus.
    pub path: PathBuf,
    /// Spreadsheet file rewritten with the working set of the latest query.
    pub scoped_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorStoreConfig {
    /// Directory holding the persisted index pair (vectors + docstore).
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// Embedding model identifier (e.g. `"all-MiniLM-L6-v2"`).
    pub model: String,
    /// OpenAI-shaped embeddings endpoint serving that model.
    pub endpoint: String,
    /// Vector dimensionality the endpoint returns for `model`.
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "all-MiniLM-L6-v2".to_string(),
            endpoint: "http://127.0.0.1:8080/v1/embeddings".to_string(),
            dims: 384,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Similarity model selector: `"BM25"` or an embedding model name.
    #[serde(default = "default_model_selector")]
    pub model: String,
    /// Results returned when the caller does not ask for a count.
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            model: default_model_selector(),
            default_limit: default_limit(),
        }
    }
}

fn default_model_selector() -> String {
    "BM25".to_string()
}
fn default_limit() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScraperConfig {
    /// Base URL of the scraper service answering `/search` and `/document`.
    #[serde(default = "default_scraper_endpoint")]
    pub endpoint: String,
    /// Head of the thesis site's search URL (the query words are appended).
    #[serde(default = "default_query_head")]
    pub query_url_head: String,
    /// Tail appended after the query words.
    #[serde(default)]
    pub query_url_tail: String,
    /// Concurrent per-document fetches the collaborator may run.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Whole-scrape deadline, surfaced as a distinct timeout failure.
    #[serde(default = "default_scrape_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            endpoint: default_scraper_endpoint(),
            query_url_head: default_query_head(),
            query_url_tail: String::new(),
            max_concurrency: default_max_concurrency(),
            timeout_secs: default_scrape_timeout_secs(),
        }
    }
}

fn default_scraper_endpoint() -> String {
    "http://127.0.0.1:9090".to_string()
}

fn default_query_head() -> String {
    "https://theses.fr/?q=".to_string()
}
fn default_max_concurrency() -> usize {
    8
}
fn default_scrape_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizerConfig {
    #[serde(default = "default_summarizer_model")]
    pub model: String,
    #[serde(default = "default_summarizer_endpoint")]
    pub endpoint: String,
    /// Environment variable holding the API credential. Summarization is
    /// unavailable (and search still works) when the variable is unset.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            model: default_summarizer_model(),
            endpoint: default_summarizer_endpoint(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_summarizer_model() -> String {
    "mistral-small-latest".to_string()
}
fn default_summarizer_endpoint() -> String {
    "https://api.mistral.ai/v1/chat/completions".to_string()
}
fn default_api_key_env() -> String {
    "MISTRAL_API_KEY".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.retrieval.default_limit < 1 {
        anyhow::bail!("retrieval.default_limit must be >= 1");
    }

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }

    if config.embedding.model.trim().is_empty() {
        anyhow::bail!("embedding.model must not be empty");
    }

    if config.scraper.max_concurrency == 0 {
        anyhow::bail!("scraper.max_concurrency must be >= 1");
    }

    if config.corpus.path == config.corpus.scoped_path {
        anyhow::bail!("corpus.path and corpus.scoped_path must differ");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("avicenne.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[corpus]
path = "data/corpus.csv"
scoped_path = "data/last_query.csv"

[vector_store]
path = "data/vector_store"
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.retrieval.model, "BM25");
        assert_eq!(cfg.retrieval.default_limit, 10);
        assert_eq!(cfg.embedding.model, "all-MiniLM-L6-v2");
        assert_eq!(cfg.scraper.max_concurrency, 8);
    }

    #[test]
    fn test_zero_limit_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[corpus]
path = "data/corpus.csv"
scoped_path = "data/last_query.csv"

[vector_store]
path = "data/vector_store"

[retrieval]
default_limit = 0
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_colliding_corpus_paths_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[corpus]
path = "data/corpus.csv"
scoped_path = "data/corpus.csv"

[vector_store]
path = "data/vector_store"
"#,
        );
        assert!(load_config(&path).is_err());
    }
}
