//! Incremental embedding sync.
//!
//! Given a batch of documents, figure out which ones already have a stored
//! embedding, embed only the rest, and commit the new records in one write.
//! Re-running a sync over unchanged content therefore does no embedding
//! work at all.

use std::collections::HashSet;

use crate::{
    chunking,
    document::Document,
    embedding::EmbeddingProvider,
    error::{Error, Result},
    vector_store::{VectorRecord, VectorStore},
};

/// Outcome of one sync run.
#[derive(Debug, Default, PartialEq, serde::Serialize)]
pub struct SyncReport {
    /// Documents that already had a stored embedding and were skipped.
    pub existing_count: usize,
    /// Documents embedded and stored by this run.
    pub embedded_count: usize,
}

/// Embed and store every document in the batch that does not already have
/// a record, in input order.
///
/// Duplicate ids in the batch are collapsed to their first occurrence.
/// The first embedding failure aborts the run before anything is written,
/// so the store never holds a partial batch: either every missing document
/// lands or none do. With `force_resync` the existence check is skipped
/// and every document is re-embedded and replaced.
pub fn sync_batch<P: EmbeddingProvider + ?Sized>(
    store: &VectorStore,
    provider: &P,
    documents: &[Document],
    max_input_tokens: usize,
    force_resync: bool,
) -> Result<SyncReport> {
    if documents.is_empty() {
        return Ok(SyncReport::default());
    }

    let mut seen = HashSet::new();
    let deduped: Vec<&Document> = documents
        .iter()
        .filter(|doc| seen.insert(doc.id))
        .collect();
    for doc in &deduped {
        doc.validate()?;
    }

    let (to_embed, existing_count) = if force_resync {
        (deduped, 0)
    } else {
        let ids: Vec<u64> = deduped.iter().map(|d| d.id).collect();
        let partition = store.exists(&ids)?;
        let missing: HashSet<u64> = partition.missing.iter().copied().collect();
        let to_embed: Vec<&Document> = deduped
            .into_iter()
            .filter(|doc| missing.contains(&doc.id))
            .collect();
        (to_embed, partition.existing.len())
    };

    if to_embed.is_empty() {
        tracing::debug!(existing = existing_count, "nothing to sync");
        return Ok(SyncReport {
            existing_count,
            embedded_count: 0,
        });
    }

    // Embed everything before writing anything.
    let mut records = Vec::with_capacity(to_embed.len());
    for doc in &to_embed {
        let text = embed_text(doc, max_input_tokens);
        let vector = provider.embed(&text).map_err(|source| Error::Sync {
            doc_id: doc.id,
            source: Box::new(source),
        })?;
        records.push(VectorRecord {
            id: doc.id,
            vector,
            title: doc.title.clone(),
            body: doc.body.clone(),
            published_at: doc.published_at.clone(),
            permalink: doc.permalink.clone(),
            categories: doc.categories.clone(),
            tags: doc.tags.clone(),
            inserted_at: 0,
        });
    }

    let embedded_count = store.upsert(&records)?;
    tracing::info!(
        existing = existing_count,
        embedded = embedded_count,
        "sync complete"
    );
    Ok(SyncReport {
        existing_count,
        embedded_count,
    })
}

/// Re-embed and replace every document in the batch, stored or not.
pub fn force_resync<P: EmbeddingProvider + ?Sized>(
    store: &VectorStore,
    provider: &P,
    documents: &[Document],
    max_input_tokens: usize,
) -> Result<SyncReport> {
    sync_batch(store, provider, documents, max_input_tokens, true)
}

/// Text sent to the embedding model for a document: title and body joined,
/// truncated to the first chunk under the token budget.
pub fn embed_text(doc: &Document, max_input_tokens: usize) -> String {
    let combined = format!("{} {}", doc.title, doc.body);
    chunking::chunk_text(&combined, max_input_tokens)
        .into_iter()
        .next()
        .unwrap_or_default()
}
