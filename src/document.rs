use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One content item from the external source (e.g. a published post).
///
/// Documents are read-only here: the content system creates and updates
/// them, we only render, embed, and index them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable external integer key, unique per document.
    pub id: u64,
    pub title: String,
    /// Plain text body, HTML already stripped by the source.
    pub body: String,
    /// Publish date as `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`.
    pub published_at: String,
    pub permalink: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Document {
    /// Validate the fields the core relies on.
    pub fn validate(&self) -> Result<()> {
        if self.id == 0 {
            return Err(Error::InvalidInput(
                "document id must be a positive integer".into(),
            ));
        }
        if self.title.trim().is_empty() && self.body.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "document {} has neither title nor body",
                self.id
            )));
        }
        validate_date(&self.published_at)?;
        Ok(())
    }

    /// Compact shape for listing documents without their bodies.
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.id,
            title: self.title.clone(),
            published_at: self.published_at.clone(),
            permalink: self.permalink.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub id: u64,
    pub title: String,
    pub published_at: String,
    pub permalink: String,
}

/// Date-range + limit filter for listing documents.
///
/// Date bounds are inclusive and compared lexicographically, which is
/// correct for ISO-8601 formatted strings.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub date_after: Option<String>,
    pub date_before: Option<String>,
    pub limit: Option<usize>,
}

impl DocumentFilter {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref after) = self.date_after {
            validate_date(after)?;
        }
        if let Some(ref before) = self.date_before {
            validate_date(before)?;
        }
        Ok(())
    }

    pub fn matches(&self, published_at: &str) -> bool {
        if let Some(ref after) = self.date_after
            && published_at < after.as_str()
        {
            return false;
        }
        if let Some(ref before) = self.date_before
            && published_at > before.as_str()
        {
            // A bare date bound like "2024-01-31" still includes timestamps
            // from that day; a timed bound excludes anything later exactly.
            let day = day_prefix(published_at);
            let bound_day = day_prefix(before);
            if day > bound_day || before.len() > 10 {
                return false;
            }
        }
        true
    }
}

/// First ten characters of a date string, cut on a char boundary so
/// unvalidated stored values cannot panic the comparison.
fn day_prefix(date: &str) -> &str {
    match date.char_indices().nth(10) {
        Some((idx, _)) => &date[..idx],
        None => date,
    }
}

/// Check that a date string starts with `YYYY-MM-DD`.
pub fn validate_date(date: &str) -> Result<()> {
    let bytes = date.as_bytes();
    let well_formed = bytes.len() >= 10
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[7] == b'-'
        && bytes[8..10].iter().all(u8::is_ascii_digit);

    if well_formed {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "malformed date (expected YYYY-MM-DD...): {date:?}"
        )))
    }
}

/// Supplier of documents. The core never mutates what it reads from here.
pub trait ContentSource {
    fn list_documents(&self, filter: &DocumentFilter) -> Result<Vec<Document>>;
    fn get_document(&self, id: u64) -> Result<Option<Document>>;
}

/// Content source backed by a JSON export file.
///
/// The export is a JSON array of documents. Listing returns newest first.
#[derive(Debug)]
pub struct JsonContentSource {
    documents: Vec<Document>,
}

impl JsonContentSource {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut documents: Vec<Document> = serde_json::from_str(&contents)?;
        for doc in &documents {
            doc.validate()?;
        }
        documents.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(Self { documents })
    }

    pub fn from_documents(mut documents: Vec<Document>) -> Result<Self> {
        for doc in &documents {
            doc.validate()?;
        }
        documents.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(Self { documents })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl ContentSource for JsonContentSource {
    fn list_documents(&self, filter: &DocumentFilter) -> Result<Vec<Document>> {
        filter.validate()?;
        let mut matched: Vec<Document> = self
            .documents
            .iter()
            .filter(|d| filter.matches(&d.published_at))
            .cloned()
            .collect();
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    fn get_document(&self, id: u64) -> Result<Option<Document>> {
        Ok(self.documents.iter().find(|d| d.id == id).cloned())
    }
}
