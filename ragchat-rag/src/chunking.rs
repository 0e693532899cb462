//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`FixedSizeChunker`] — splits by character count with configurable overlap
//! - [`RecursiveChunker`] — splits hierarchically by paragraphs, lines, sentences,
//!   then words, merging small pieces back together with overlap
//!
//! Sizes are measured in characters, never bytes, so multi-byte text is never
//! cut inside a code point.

use std::collections::VecDeque;

use crate::document::{Chunk, Document};

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text and metadata but no embeddings.
/// Embeddings are attached later by the pipeline.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has no text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Build the chunk for piece `index` of `document`.
fn make_chunk(document: &Document, index: usize, text: String) -> Chunk {
    let mut metadata = document.metadata.clone();
    metadata.insert("chunk_index".to_string(), index.to_string());
    Chunk {
        id: format!("{}_{index}", document.id),
        text,
        embedding: None,
        metadata,
        document_id: document.id.clone(),
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Splits text into fixed-size chunks by character count with configurable overlap.
///
/// Chunk IDs are generated as `{document_id}_{chunk_index}`. Each chunk inherits
/// the parent document's metadata plus a `chunk_index` field.
///
/// # Example
///
/// ```rust,ignore
/// use ragchat_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(256, 50);
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` — maximum number of characters per chunk
    /// * `chunk_overlap` — number of overlapping characters between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        split_by_size(&document.text, self.chunk_size, self.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(i, text)| make_chunk(document, i, text))
            .collect()
    }
}

/// Simple character-based splitting with overlap.
fn split_by_size(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(chunk_overlap);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() || step == 0 {
            break;
        }
        start += step;
    }

    chunks
}

/// Splits text hierarchically: paragraphs → lines → sentences → words.
///
/// Text is split on the first separator that occurs; pieces that still exceed
/// `chunk_size` are split with the next separator, and as a last resort by
/// character count. Adjacent small pieces are merged back into chunks of up to
/// `chunk_size` characters, each new chunk starting with up to `chunk_overlap`
/// characters carried over from the end of the previous one.
///
/// # Example
///
/// ```rust,ignore
/// use ragchat_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(500, 250);
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    const SEPARATORS: [&'static str; 6] = ["\n\n", "\n", ". ", "! ", "? ", " "];

    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` — maximum number of characters per chunk
    /// * `chunk_overlap` — number of overlapping characters between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.trim().is_empty() || self.chunk_size == 0 {
            return Vec::new();
        }

        split_recursive(&document.text, self.chunk_size, self.chunk_overlap, &Self::SEPARATORS)
            .into_iter()
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .enumerate()
            .map(|(i, text)| make_chunk(document, i, text))
            .collect()
    }
}

fn split_recursive(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[&str],
) -> Vec<String> {
    if char_len(text) <= chunk_size {
        return vec![text.to_string()];
    }

    let Some((separator, remaining)) = separators.split_first() else {
        return split_by_size(text, chunk_size, chunk_overlap);
    };

    let segments = split_keeping_separator(text, separator);
    if segments.len() <= 1 {
        return split_recursive(text, chunk_size, chunk_overlap, remaining);
    }

    let mut chunks = Vec::new();
    let mut pending = Vec::new();

    for segment in segments {
        if char_len(segment) <= chunk_size {
            pending.push(segment.to_string());
        } else {
            if !pending.is_empty() {
                chunks.extend(merge_with_overlap(
                    std::mem::take(&mut pending),
                    chunk_size,
                    chunk_overlap,
                ));
            }
            chunks.extend(split_recursive(segment, chunk_size, chunk_overlap, remaining));
        }
    }

    if !pending.is_empty() {
        chunks.extend(merge_with_overlap(pending, chunk_size, chunk_overlap));
    }

    chunks
}

/// Merge pieces (each at most `chunk_size` characters) into chunks, keeping up
/// to `chunk_overlap` trailing characters of one chunk at the start of the next.
fn merge_with_overlap(pieces: Vec<String>, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<String> = VecDeque::new();
    let mut window_len = 0;

    for piece in pieces {
        let len = char_len(&piece);
        if window_len + len > chunk_size && !window.is_empty() {
            chunks.push(window.iter().map(String::as_str).collect::<String>());
            while window_len > chunk_overlap || (window_len > 0 && window_len + len > chunk_size) {
                match window.pop_front() {
                    Some(front) => window_len -= char_len(&front),
                    None => break,
                }
            }
        }
        window_len += len;
        window.push_back(piece);
    }

    if !window.is_empty() {
        chunks.push(window.iter().map(String::as_str).collect::<String>());
    }

    chunks
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_size_respects_overlap_and_stops_at_end() {
        let doc = Document::new("d", "abcdefghij");
        let chunks = FixedSizeChunker::new(4, 2).chunk(&doc);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "cdef", "efgh", "ghij"]);
        assert_eq!(chunks[3].id, "d_3");
        assert_eq!(chunks[3].metadata["chunk_index"], "3");
    }

    #[test]
    fn fixed_size_is_char_safe() {
        let doc = Document::new("d", "ééééé");
        let chunks = FixedSizeChunker::new(2, 0).chunk(&doc);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "éé");
        assert_eq!(chunks[2].text, "é");
    }

    #[test]
    fn recursive_keeps_short_text_whole() {
        let doc = Document::new("d", "A short note.").with_metadata("source", "upload");
        let chunks = RecursiveChunker::new(500, 250).chunk(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "A short note.");
        assert_eq!(chunks[0].metadata["source"], "upload");
        assert_eq!(chunks[0].document_id, "d");
    }

    #[test]
    fn recursive_splits_on_paragraphs_first() {
        let text = format!("{}\n\n{}", "a".repeat(30), "b".repeat(30));
        let chunks = RecursiveChunker::new(40, 0).chunk(&Document::new("d", text));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "a".repeat(30));
        assert_eq!(chunks[1].text, "b".repeat(30));
    }

    #[test]
    fn recursive_carries_overlap_between_chunks() {
        let text = "one two three four five six seven eight nine ten";
        let chunks = RecursiveChunker::new(20, 10).chunk(&Document::new("d", text));
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let last_word = pair[0].text.split_whitespace().last().unwrap();
            assert!(pair[1].text.contains(last_word), "{:?} then {:?}", pair[0].text, pair[1].text);
        }
    }

    #[test]
    fn empty_documents_produce_no_chunks() {
        assert!(RecursiveChunker::new(10, 2).chunk(&Document::new("d", "  \n ")).is_empty());
        assert!(FixedSizeChunker::new(10, 2).chunk(&Document::new("d", "")).is_empty());
    }
}
