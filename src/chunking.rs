//! Rendering documents into structured text and splitting them into
//! model-sized chunks.
//!
//! Embeddings capture more structural signal when the input marks up the
//! title, body, and taxonomy instead of raw prose, so documents are first
//! rendered through a fixed semantic-HTML template. The template is
//! deterministic: identical input always produces byte-identical output.

use crate::document::Document;

/// Approximate characters per token for the embedding models we target.
const CHARS_PER_TOKEN: usize = 4;

/// Default token budget per chunk.
pub const DEFAULT_CHUNK_TOKENS: usize = 1024;

/// A bounded-size slice of a document's structured text.
///
/// Ephemeral: produced per sync run and consumed by the embedding step,
/// never persisted on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Id of the source document.
    pub document_id: u64,
    /// Zero-based position within the document.
    pub index: usize,
    pub text: String,
}

/// Render a document through the fixed semantic template.
///
/// Field order is title, publish date, body, categories, tags, permalink;
/// each block sits on its own line so the chunker can split on semantic
/// boundaries.
pub fn structured_text(document: &Document) -> String {
    let mut html = String::new();
    let title = escape_html(&document.title);
    let date = escape_html(&document.published_at);

    html.push_str("<article>\n");
    html.push_str(&format!("<h1>{title}</h1>\n"));
    html.push_str(&format!(
        "<time datetime=\"{date}\">{date}</time>\n"
    ));
    html.push_str("<section class=\"body\">\n");
    for paragraph in document.body.split('\n') {
        if paragraph.trim().is_empty() {
            continue;
        }
        html.push_str(&format!("<p>{}</p>\n", escape_html(paragraph)));
    }
    html.push_str("</section>\n");
    if !document.categories.is_empty() {
        html.push_str("<section class=\"categories\"><ul>");
        for category in &document.categories {
            html.push_str(&format!("<li>{}</li>", escape_html(category)));
        }
        html.push_str("</ul></section>\n");
    }
    if !document.tags.is_empty() {
        html.push_str("<section class=\"tags\"><ul>");
        for tag in &document.tags {
            html.push_str(&format!("<li>{}</li>", escape_html(tag)));
        }
        html.push_str("</ul></section>\n");
    }
    html.push_str(&format!(
        "<a rel=\"canonical\" href=\"{}\">{}</a>\n",
        escape_html(&document.permalink),
        escape_html(&document.permalink)
    ));
    html.push_str("</article>\n");
    html
}

/// Render a document and split it under the given token budget.
pub fn chunk_document(document: &Document, max_tokens: usize) -> Vec<Chunk> {
    chunk_text(&structured_text(document), max_tokens)
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            document_id: document.id,
            index,
            text,
        })
        .collect()
}

/// Split text into chunks of at most `max_tokens` (estimated at ~4 chars
/// per token).
///
/// Splits on line boundaries first; a single line longer than the budget
/// is hard-cut at character boundaries. No chunk is ever empty, and
/// concatenating all chunks reconstructs the input byte-for-byte.
pub fn chunk_text(text: &str, max_tokens: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let budget_chars = max_tokens.saturating_mul(CHARS_PER_TOKEN).max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for line in split_keeping_newlines(text) {
        let line_chars = line.chars().count();

        if line_chars > budget_chars {
            // Oversized line: flush what we have, then hard-cut it.
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_chars = 0;
            }
            chunks.extend(hard_cut(line, budget_chars));
            continue;
        }

        if current_chars + line_chars > budget_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        current.push_str(line);
        current_chars += line_chars;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Iterate over lines including their trailing newline, so that joining
/// the pieces reproduces the input exactly.
fn split_keeping_newlines(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let end = match rest.find('\n') {
            Some(pos) => pos + 1,
            None => rest.len(),
        };
        let (line, tail) = rest.split_at(end);
        rest = tail;
        Some(line)
    })
}

/// Cut an oversized line into budget-size pieces at char boundaries.
fn hard_cut(line: &str, budget_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut count = 0usize;
    for c in line.chars() {
        piece.push(c);
        count += 1;
        if count == budget_chars {
            pieces.push(std::mem::take(&mut piece));
            count = 0;
        }
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

/// Estimated token count for a piece of text.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            c => escaped.push(c),
        }
    }
    escaped
}
