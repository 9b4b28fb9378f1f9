//! Scraper collaborator boundary.
//!
//! The engine never crawls, renders HTML, or drives a browser: it consumes
//! a [`Scraper`] implementation as "a function that, given a query, returns
//! a table of documents". Network and parse failures propagate as-is; the
//! engine does not retry them.
//!
//! [`fetch_bounded`] is offered to implementations that fetch one page per
//! result URL: it fans the per-item futures out under an explicit
//! concurrency cap and fails fast on the first error, so a partial batch
//! never reaches the corpus.

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use crate::config::ScraperConfig;
use crate::error::{Result, RetrievalError};
use crate::models::Document;

/// One scrape outcome: the documents found plus the canonical search URL
/// the site answered under.
#[derive(Debug, Clone)]
pub struct ScrapedBatch {
    pub documents: Vec<Document>,
    pub query_url: String,
}

/// External document source for a raw user query.
///
/// Implementations must return at least `content`, `title`, and `url` per
/// document; individually missing fields are tolerated (the corpus
/// sentinel-fills them), but a batch with no documents at all is rejected
/// by the orchestrator.
#[async_trait]
pub trait Scraper: Send + Sync {
    async fn fetch(&self, raw_query: &str) -> Result<ScrapedBatch>;
}

#[derive(Deserialize)]
struct SearchReply {
    query_url: String,
    urls: Vec<String>,
}

#[derive(Deserialize)]
struct DocumentReply {
    #[serde(default)]
    content: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(flatten)]
    extra: BTreeMap<String, String>,
}

/// Scraper backed by a JSON scraper service.
///
/// The service owns the crawling and HTML parsing; this client asks
/// `GET /search?q=<query>` for the canonical query URL plus the matching
/// thesis URLs, then fetches each `GET /document?url=<url>` under the
/// configured concurrency cap.
pub struct HttpScraper {
    endpoint: String,
    max_concurrency: usize,
    client: reqwest::Client,
}

impl HttpScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            max_concurrency: config.max_concurrency,
            client,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        param: (&str, &str),
    ) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{}", self.endpoint, path))
            .query(&[param])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Network(format!(
                "scraper service error {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| RetrievalError::Parse(e.to_string()))
    }
}

#[async_trait]
impl Scraper for HttpScraper {
    async fn fetch(&self, raw_query: &str) -> Result<ScrapedBatch> {
        let reply: SearchReply = self.get_json("/search", ("q", raw_query)).await?;

        let documents = fetch_bounded(reply.urls, self.max_concurrency, |url| async move {
            let doc: DocumentReply = self.get_json("/document", ("url", url.as_str())).await?;
            Ok(Document {
                content: doc.content,
                title: doc.title,
                // the service may omit the echo of the document url
                url: if doc.url.is_empty() { url } else { doc.url },
                extra: doc.extra,
            })
        })
        .await?;

        Ok(ScrapedBatch {
            documents,
            query_url: reply.query_url,
        })
    }
}

/// Run one fetch future per item with at most `max_concurrency` in flight.
///
/// Results come back in input order. The first failed fetch aborts the
/// remaining work and is returned as the batch's error (first-error-wins),
/// so callers either get every item or none.
pub async fn fetch_bounded<I, T, F, Fut>(
    items: Vec<I>,
    max_concurrency: usize,
    fetch: F,
) -> Result<Vec<T>>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    stream::iter(items)
        .map(|item| fetch(item))
        .buffered(max_concurrency.max(1))
        .try_collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RetrievalError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fetch_bounded_preserves_order() {
        let urls: Vec<usize> = (0..20).collect();
        let out = fetch_bounded(urls, 4, |i| async move {
            // later items finish first
            tokio::time::sleep(Duration::from_millis((20 - i) as u64)).await;
            Ok(i * 10)
        })
        .await
        .unwrap();

        assert_eq!(out, (0..20).map(|i| i * 10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_fetch_bounded_never_exceeds_cap() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let items: Vec<usize> = (0..16).collect();
        let (in_flight2, peak2) = (in_flight.clone(), peak.clone());
        fetch_bounded(items, 3, move |_| {
            let in_flight = in_flight2.clone();
            let peak = peak2.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await
        .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_fetch_bounded_first_error_wins() {
        let items: Vec<usize> = (0..8).collect();
        let result = fetch_bounded(items, 2, |i| async move {
            if i == 3 {
                Err(RetrievalError::Network(format!("fetch {} failed", i)))
            } else {
                Ok(i)
            }
        })
        .await;

        match result {
            Err(RetrievalError::Network(msg)) => assert!(msg.contains("fetch 3")),
            other => panic!("expected network error, got {:?}", other.map(|v| v.len())),
        }
    }
}
