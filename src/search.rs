//! Similarity search engine: lexical (BM25) and dense (embedding) ranking.
//!
//! The two strategies are interchangeable behind [`RankingStrategy`], which
//! the orchestrator resolves once from the configured string selector; an
//! unknown selector is a configuration error, never a silent fallback.
//!
//! # Ranking contracts
//!
//! - **BM25** scores every paragraph of an in-memory list against the
//!   whitespace-tokenized query and recomputes from scratch on every call
//!   (nothing is persisted). Cost is O(paragraphs × query terms).
//! - **Dense** embeds the query with the same embedder that built the
//!   index and scans the persisted index by cosine similarity, optionally
//!   restricted by a metadata filter.
//!
//! Both return results sorted by descending score with ties kept in
//! original candidate order (stable sort).

use std::collections::{BTreeMap, HashMap};

use crate::embedding::Embedder;
use crate::error::{Result, RetrievalError};
use crate::index::VectorIndex;
use crate::models::RankedParagraph;

/// Okapi parameters matching the classic defaults.
const BM25_K1: f64 = 1.5;
const BM25_B: f64 = 0.75;
/// Floor factor applied to negative idf values.
const BM25_EPSILON: f64 = 0.25;

/// How a similarity request is scored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RankingStrategy {
    /// Lexical bag-of-words ranking over the in-memory working set.
    Bm25,
    /// Embedding-vector ranking over the persisted index.
    Dense { model: String },
}

/// Resolve the string model selector into a strategy, once, at the boundary.
///
/// `"BM25"` (any case) selects lexical ranking; the configured embedding
/// model's exact name selects dense ranking. Anything else is a
/// configuration error and produces no results.
pub fn resolve_strategy(selector: &str, embedding_model: &str) -> Result<RankingStrategy> {
    if selector.eq_ignore_ascii_case("bm25") {
        Ok(RankingStrategy::Bm25)
    } else if selector == embedding_model {
        Ok(RankingStrategy::Dense {
            model: selector.to_string(),
        })
    } else {
        Err(RetrievalError::Configuration(format!(
            "unknown similarity model '{}', expected 'BM25' or '{}'",
            selector, embedding_model
        )))
    }
}

/// Requested result count: a literal, or every candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopN {
    Literal(usize),
    All,
}

impl TopN {
    /// Parse a count argument: an integer literal, or the case-insensitive
    /// sentinels `ALL` / `MAX` meaning "every candidate".
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("all") || trimmed.eq_ignore_ascii_case("max") {
            return Ok(TopN::All);
        }
        trimmed
            .parse::<usize>()
            .map(TopN::Literal)
            .map_err(|_| {
                RetrievalError::Configuration(format!(
                    "invalid result count '{}': expected an integer, ALL, or MAX",
                    raw
                ))
            })
    }

    /// Concrete count for a candidate set of `candidates` entries.
    pub fn resolve(self, candidates: usize) -> usize {
        match self {
            TopN::Literal(n) => n,
            TopN::All => candidates,
        }
    }
}

/// Okapi BM25 over a tokenized corpus.
struct Bm25Model {
    doc_freqs: Vec<HashMap<String, usize>>,
    doc_len: Vec<usize>,
    avgdl: f64,
    idf: HashMap<String, f64>,
}

impl Bm25Model {
    fn fit(tokenized: &[Vec<String>]) -> Self {
        let corpus_size = tokenized.len();
        let doc_len: Vec<usize> = tokenized.iter().map(Vec::len).collect();
        let total_terms: usize = doc_len.iter().sum();
        let avgdl = if corpus_size > 0 {
            total_terms as f64 / corpus_size as f64
        } else {
            0.0
        };

        let mut doc_freqs = Vec::with_capacity(corpus_size);
        let mut df: HashMap<String, usize> = HashMap::new();
        for doc in tokenized {
            let mut freqs: HashMap<String, usize> = HashMap::new();
            for term in doc {
                *freqs.entry(term.clone()).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *df.entry(term.clone()).or_insert(0) += 1;
            }
            doc_freqs.push(freqs);
        }

        // idf = ln(N - df + 0.5) - ln(df + 0.5); terms that appear in more
        // than half the corpus go negative and are floored to ε × mean idf.
        let mut idf: HashMap<String, f64> = HashMap::new();
        let mut idf_sum = 0.0;
        let mut negative: Vec<String> = Vec::new();
        for (term, freq) in &df {
            let value = ((corpus_size as f64 - *freq as f64 + 0.5) / (*freq as f64 + 0.5)).ln();
            idf_sum += value;
            if value < 0.0 {
                negative.push(term.clone());
            }
            idf.insert(term.clone(), value);
        }
        if !idf.is_empty() {
            let floor = BM25_EPSILON * (idf_sum / idf.len() as f64);
            for term in negative {
                idf.insert(term, floor);
            }
        }

        Self {
            doc_freqs,
            doc_len,
            avgdl,
            idf,
        }
    }

    fn score(&self, query_terms: &[&str], doc: usize) -> f64 {
        let freqs = &self.doc_freqs[doc];
        let dl = self.doc_len[doc] as f64;
        let mut score = 0.0;
        for term in query_terms {
            let f = match freqs.get(*term) {
                Some(f) => *f as f64,
                None => continue,
            };
            let idf = self.idf.get(*term).copied().unwrap_or(0.0);
            score += idf * (f * (BM25_K1 + 1.0))
                / (f + BM25_K1 * (1.0 - BM25_B + BM25_B * dl / self.avgdl));
        }
        score
    }
}

/// Rank paragraphs against a query with Okapi BM25.
///
/// Tokenization is whitespace splitting on both sides. Every paragraph is
/// scored; the result keeps each paragraph's position in the input list and
/// is sorted by descending score, ties in input order.
pub fn bm25_rank(query: &str, paragraphs: &[String], top_n: TopN) -> Vec<RankedParagraph> {
    if paragraphs.is_empty() {
        return Vec::new();
    }

    let tokenized: Vec<Vec<String>> = paragraphs
        .iter()
        .map(|p| p.split_whitespace().map(str::to_string).collect())
        .collect();
    let model = Bm25Model::fit(&tokenized);

    let query_terms: Vec<&str> = query.split_whitespace().collect();

    let mut ranked: Vec<RankedParagraph> = paragraphs
        .iter()
        .enumerate()
        .map(|(index, content)| RankedParagraph {
            content: content.clone(),
            index,
            score: model.score(&query_terms, index),
        })
        .collect();

    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(top_n.resolve(paragraphs.len()));
    ranked
}

/// Rank index entries against a query by embedding similarity.
///
/// The query is embedded with `embedder`, which must match the index; the
/// index layer guards the identity on load. The scan considers at most
/// `candidate_limit` entries passing `filter`; each result's `index` is the
/// entry's position in the index docstore.
pub async fn dense_rank(
    query: &str,
    index: &VectorIndex,
    embedder: &dyn Embedder,
    filter: &BTreeMap<String, String>,
    candidate_limit: usize,
    top_n: TopN,
) -> Result<Vec<RankedParagraph>> {
    let query_vec = embedder.embed(query).await?;
    let mut hits = index.search(&query_vec, candidate_limit, filter);
    hits.truncate(top_n.resolve(hits.len()));

    Ok(hits
        .into_iter()
        .map(|(entry_index, score)| RankedParagraph {
            content: index.entry(entry_index).content.clone(),
            index: entry_index,
            score,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraphs(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_bm25_returns_requested_count_sorted_descending() {
        let docs = paragraphs(&[
            "machine learning for thesis retrieval",
            "cooking recipes and kitchen tips",
            "deep learning and machine translation",
        ]);
        let ranked = bm25_rank("machine learning", &docs, TopN::Literal(2));

        assert_eq!(ranked.len(), 2);
        assert!(ranked[0].score >= ranked[1].score);
        assert_eq!(ranked[0].index, 0);
        assert_eq!(ranked[1].index, 2);
    }

    #[test]
    fn test_bm25_ties_keep_original_order() {
        let docs = paragraphs(&[
            "quantum computing thesis",
            "quantum computing thesis",
            "unrelated biology text",
        ]);
        let ranked = bm25_rank("quantum computing", &docs, TopN::All);

        assert_eq!(ranked[0].index, 0);
        assert_eq!(ranked[1].index, 1);
        assert!((ranked[0].score - ranked[1].score).abs() < 1e-12);
    }

    #[test]
    fn test_bm25_no_match_scores_zero() {
        let docs = paragraphs(&["alpha beta", "gamma delta"]);
        let ranked = bm25_rank("epsilon", &docs, TopN::All);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|r| r.score == 0.0));
        // zero-score ties keep corpus order
        assert_eq!(ranked[0].index, 0);
    }

    #[test]
    fn test_bm25_empty_corpus_yields_nothing() {
        assert!(bm25_rank("anything", &[], TopN::All).is_empty());
    }

    #[test]
    fn test_bm25_is_deterministic() {
        let docs = paragraphs(&["a b c", "b c d", "c d e", "x y z"]);
        let first = bm25_rank("b c", &docs, TopN::All);
        let second = bm25_rank("b c", &docs, TopN::All);
        let order1: Vec<usize> = first.iter().map(|r| r.index).collect();
        let order2: Vec<usize> = second.iter().map(|r| r.index).collect();
        assert_eq!(order1, order2);
        for (a, b) in first.iter().zip(second.iter()) {
            assert!((a.score - b.score).abs() < 1e-12);
        }
    }

    #[test]
    fn test_top_n_all_returns_every_candidate() {
        let docs = paragraphs(&["one", "two", "three"]);
        assert_eq!(bm25_rank("one", &docs, TopN::All).len(), 3);
        assert_eq!(
            bm25_rank("one", &docs, TopN::parse("MAX").unwrap()).len(),
            3
        );
    }

    #[test]
    fn test_top_n_parsing() {
        assert_eq!(TopN::parse("7").unwrap(), TopN::Literal(7));
        assert_eq!(TopN::parse("all").unwrap(), TopN::All);
        assert_eq!(TopN::parse("Max").unwrap(), TopN::All);
        assert!(matches!(
            TopN::parse("several"),
            Err(RetrievalError::Configuration(_))
        ));
    }

    #[test]
    fn test_resolve_strategy() {
        assert_eq!(
            resolve_strategy("bm25", "all-MiniLM-L6-v2").unwrap(),
            RankingStrategy::Bm25
        );
        assert_eq!(
            resolve_strategy("all-MiniLM-L6-v2", "all-MiniLM-L6-v2").unwrap(),
            RankingStrategy::Dense {
                model: "all-MiniLM-L6-v2".to_string()
            }
        );
        assert!(matches!(
            resolve_strategy("word2vec", "all-MiniLM-L6-v2"),
            Err(RetrievalError::Configuration(_))
        ));
    }
}
