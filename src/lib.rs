//! # Avicenne
//!
//! A caching retrieval engine for thesis-repository search.
//!
//! Avicenne takes a free-text query, fills a flat spreadsheet-backed corpus
//! from a scraper collaborator (once per distinct query), maintains a
//! persisted vector index over the corpus, and answers similarity requests
//! with either lexical (BM25) or dense (embedding) ranking, optionally
//! summarized by a hosted language model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌─────────────────┐
//! │ Scraper  │──▶│ Orchestrator   │──▶│ Corpus (CSV)     │
//! │ (extern) │   │ cache │ scope  │   │ Vector index     │
//! └──────────┘   └───────┬───────┘   └────────┬────────┘
//!                        │                    │
//!                        ▼                    ▼
//!                  ┌──────────┐        ┌──────────┐
//!                  │  Search   │        │ Context  │──▶ Summarizer (extern)
//!                  │ BM25/dense│        │ builder  │
//!                  └──────────┘        └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Failure taxonomy |
//! | [`query`] | Canonical query-URL cache keys |
//! | [`corpus`] | Spreadsheet-backed corpus store |
//! | [`embedding`] | Embedder trait and HTTP provider |
//! | [`index`] | Vector index build/save/load |
//! | [`search`] | BM25 and dense similarity ranking |
//! | [`scrape`] | Scraper collaborator boundary |
//! | [`orchestrator`] | Query lifecycle and metadata joins |
//! | [`context`] | Prompt-context formatting |
//! | [`summarize`] | Summarizer collaborator |

pub mod config;
pub mod context;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod orchestrator;
pub mod query;
pub mod scrape;
pub mod search;
pub mod summarize;
