//! Bounded batch operations over document collections.
//!
//! These wrap the sync engine and store with the validation a bulk caller
//! needs: a hard batch-size cap, per-document validation, and reports
//! shaped for machine consumption.

use serde::Serialize;

use crate::{
    document::{Document, DocumentSummary},
    embedding::EmbeddingProvider,
    error::{Error, Result},
    sync::{self, SyncReport},
    vector_store::VectorStore,
};

/// Hard cap on documents per batch call.
pub const MAX_BATCH_DOCUMENTS: usize = 1000;

/// Which documents in a batch already have embeddings and which do not.
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct CheckReport {
    pub existing_count: usize,
    pub missing_count: usize,
    /// Summaries of the documents that still need embedding.
    pub missing_documents: Vec<DocumentSummary>,
}

/// Outcome of a batch store call.
#[derive(Debug, PartialEq, Serialize)]
pub struct StoreReport {
    pub stored_count: usize,
    pub message: String,
}

fn check_batch_size(len: usize) -> Result<()> {
    if len > MAX_BATCH_DOCUMENTS {
        return Err(Error::InvalidInput(format!(
            "batch of {len} documents exceeds the maximum of {MAX_BATCH_DOCUMENTS}"
        )));
    }
    Ok(())
}

/// Report which documents already have stored embeddings, without
/// embedding anything.
///
/// An empty batch succeeds with an all-zero report.
pub fn check_embeddings(
    store: &VectorStore,
    documents: &[Document],
) -> Result<CheckReport> {
    check_batch_size(documents.len())?;
    if documents.is_empty() {
        return Ok(CheckReport::default());
    }
    for doc in documents {
        doc.validate()?;
    }

    let ids: Vec<u64> = documents.iter().map(|d| d.id).collect();
    let partition = store.exists(&ids)?;

    let missing_documents: Vec<DocumentSummary> = documents
        .iter()
        .filter(|d| partition.missing.contains(&d.id))
        .map(Document::summary)
        .collect();

    Ok(CheckReport {
        existing_count: partition.existing.len(),
        missing_count: partition.missing.len(),
        missing_documents,
    })
}

/// Embed and store the documents in the batch that are not yet stored.
pub fn store_embeddings<P: EmbeddingProvider + ?Sized>(
    store: &VectorStore,
    provider: &P,
    documents: &[Document],
    max_input_tokens: usize,
    force_resync: bool,
) -> Result<StoreReport> {
    check_batch_size(documents.len())?;

    let SyncReport {
        existing_count,
        embedded_count,
    } = sync::sync_batch(store, provider, documents, max_input_tokens, force_resync)?;

    Ok(StoreReport {
        stored_count: embedded_count,
        message: format!(
            "found {existing_count} existing, stored {embedded_count} new"
        ),
    })
}
