//! Similarity search over stored document embeddings.
//!
//! A query is embedded with the same provider used at sync time, matched
//! against the store by cosine similarity, and shaped into display-ready
//! hits with bounded snippets.

use serde::Serialize;

use crate::{
    document::DocumentFilter,
    embedding::EmbeddingProvider,
    error::{Error, Result},
    vector_store::VectorStore,
};

/// Hard cap on results per query.
pub const MAX_SEARCH_LIMIT: usize = 20;

/// Snippet length cap, in characters.
const SNIPPET_MAX_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct SearchParams {
    pub query: String,
    /// Requested result count; clamped to `1..=MAX_SEARCH_LIMIT`.
    pub limit: usize,
    pub date_after: Option<String>,
    pub date_before: Option<String>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            query: String::new(),
            limit: 5,
            date_after: None,
            date_before: None,
        }
    }
}

/// One search result, ready for display or JSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: u64,
    pub title: String,
    /// Leading slice of the body, cut at a char boundary.
    pub snippet: String,
    pub permalink: String,
    pub published_at: String,
    /// Cosine similarity in [-1, 1]; higher is more similar.
    pub score: f32,
}

/// Embed the query and return the closest stored documents.
///
/// Results are ordered by descending similarity, ties broken by newer
/// publish date. An empty store yields an empty list, not an error.
pub fn search_similar<P: EmbeddingProvider + ?Sized>(
    store: &VectorStore,
    provider: &P,
    params: &SearchParams,
) -> Result<Vec<SearchHit>> {
    if params.query.trim().is_empty() {
        return Err(Error::InvalidInput("empty search query".into()));
    }
    let filter = DocumentFilter {
        date_after: params.date_after.clone(),
        date_before: params.date_before.clone(),
        limit: None,
    };
    filter.validate()?;
    let limit = params.limit.clamp(1, MAX_SEARCH_LIMIT);

    let query_vector = provider.embed(&params.query)?;
    let matches = store.search(&query_vector, limit, &filter)?;

    tracing::debug!(
        query = %params.query,
        hits = matches.len(),
        "search complete"
    );

    Ok(matches
        .into_iter()
        .map(|(record, score)| SearchHit {
            id: record.id,
            title: record.title,
            snippet: snippet(&record.body),
            permalink: record.permalink,
            published_at: record.published_at,
            score,
        })
        .collect())
}

/// First `SNIPPET_MAX_CHARS` characters of the body, with an ellipsis
/// marker when anything was cut.
fn snippet(body: &str) -> String {
    let mut chars = body.char_indices();
    match chars.nth(SNIPPET_MAX_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

pub fn format_human(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results.\n".to_string();
    }
    let mut out = String::new();
    for (rank, hit) in hits.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} ({:.4})\n   {} | {}\n",
            rank + 1,
            hit.title,
            hit.score,
            hit.published_at,
            hit.permalink,
        ));
        if !hit.snippet.is_empty() {
            out.push_str(&format!("   {}\n", hit.snippet.replace('\n', " ")));
        }
    }
    out
}

pub fn format_json(hits: &[SearchHit]) -> Result<String> {
    Ok(serde_json::to_string_pretty(hits)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::VectorRecord;

    struct AxisProvider;

    impl EmbeddingProvider for AxisProvider {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            // Map queries onto fixed axes so similarity is predictable.
            Ok(match text {
                "trains" => vec![1.0, 0.0],
                "tea" => vec![0.0, 1.0],
                _ => vec![0.7, 0.7],
            })
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model(&self) -> &str {
            "stub"
        }
    }

    fn record(id: u64, vector: Vec<f32>, date: &str, body: &str) -> VectorRecord {
        VectorRecord {
            id,
            vector,
            title: format!("Post {id}"),
            body: body.to_string(),
            published_at: date.to_string(),
            permalink: format!("https://example.com/?p={id}"),
            categories: vec![],
            tags: vec![],
            inserted_at: 0,
        }
    }

    fn test_store() -> (tempfile::TempDir, VectorStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = VectorStore::open(&tmp.path().join("records.redb")).unwrap();
        (tmp, store)
    }

    fn params(query: &str) -> SearchParams {
        SearchParams {
            query: query.to_string(),
            ..SearchParams::default()
        }
    }

    #[test]
    fn closest_vector_ranks_first() {
        let (_tmp, store) = test_store();
        store
            .upsert(&[
                record(1, vec![1.0, 0.0], "2024-01-01", "about trains"),
                record(2, vec![0.0, 1.0], "2024-01-02", "about tea"),
            ])
            .unwrap();

        let hits = search_similar(&store, &AxisProvider, &params("trains")).unwrap();
        assert_eq!(hits[0].id, 1);
        assert!(hits[0].score > hits[1].score);

        let hits = search_similar(&store, &AxisProvider, &params("tea")).unwrap();
        assert_eq!(hits[0].id, 2);
    }

    #[test]
    fn empty_query_is_rejected() {
        let (_tmp, store) = test_store();
        let err =
            search_similar(&store, &AxisProvider, &params("  ")).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn empty_store_returns_no_hits() {
        let (_tmp, store) = test_store();
        let hits = search_similar(&store, &AxisProvider, &params("tea")).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn limit_is_clamped() {
        let (_tmp, store) = test_store();
        let records: Vec<VectorRecord> = (1..=30)
            .map(|i| record(i, vec![1.0, 0.0], "2024-01-01", "body"))
            .collect();
        store.upsert(&records).unwrap();

        let mut over = params("trains");
        over.limit = 100;
        let hits = search_similar(&store, &AxisProvider, &over).unwrap();
        assert_eq!(hits.len(), MAX_SEARCH_LIMIT);

        let mut zero = params("trains");
        zero.limit = 0;
        let hits = search_similar(&store, &AxisProvider, &zero).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn date_range_filters_hits() {
        let (_tmp, store) = test_store();
        store
            .upsert(&[
                record(1, vec![1.0, 0.0], "2024-01-15", "in range"),
                record(2, vec![1.0, 0.0], "2024-06-01", "too late"),
            ])
            .unwrap();

        let mut p = params("trains");
        p.date_after = Some("2024-01-01".into());
        p.date_before = Some("2024-01-31".into());
        let hits = search_similar(&store, &AxisProvider, &p).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);
    }

    #[test]
    fn malformed_date_bound_is_rejected() {
        let (_tmp, store) = test_store();
        let mut p = params("trains");
        p.date_after = Some("01/15/2024".into());
        let err = search_similar(&store, &AxisProvider, &p).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn long_bodies_are_snipped_at_char_boundary() {
        let long = "é".repeat(600);
        assert_eq!(snippet(&long).chars().count(), 503);
        assert!(snippet(&long).ends_with("..."));

        let short = "short body";
        assert_eq!(snippet(short), "short body");
    }

    #[test]
    fn human_format_lists_ranked_hits() {
        let hits = vec![SearchHit {
            id: 1,
            title: "Post 1".into(),
            snippet: "line one\nline two".into(),
            permalink: "https://example.com/?p=1".into(),
            published_at: "2024-01-01".into(),
            score: 0.9876,
        }];
        let out = format_human(&hits);
        assert!(out.starts_with("1. Post 1 (0.9876)"));
        assert!(out.contains("line one line two"));
        assert_eq!(format_human(&[]), "No results.\n");
    }

    #[test]
    fn json_format_round_trips() {
        let hits = vec![SearchHit {
            id: 1,
            title: "Post 1".into(),
            snippet: "body".into(),
            permalink: "https://example.com/?p=1".into(),
            published_at: "2024-01-01".into(),
            score: 1.0,
        }];
        let json = format_json(&hits).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["id"], 1);
        assert_eq!(parsed[0]["title"], "Post 1");
    }
}
