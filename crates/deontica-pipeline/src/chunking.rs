//! Legal text chunking for ingestion
//!
//! Text is split recursively: first on blank lines, then on line breaks,
//! then on sentence and clause punctuation, then on spaces, and finally by
//! characters. Pieces are merged back into chunks of at most `chunk_size`
//! characters, with `chunk_overlap` characters carried over between
//! neighbouring chunks.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// Separators tried in order, coarsest first
pub const LEGAL_SEPARATORS: [&str; 6] = ["\n\n", "\n", ". ", "; ", ": ", " "];

static ARTICLE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(Article|Art)\.?\s+\d+(\(\d+\))?")
        .expect("article reference pattern is valid")
});

/// Find the first article reference in a chunk (e.g. `Article 10(2)`, `Art. 5`)
pub fn extract_article_id(text: &str) -> Option<String> {
    ARTICLE_REF.find(text).map(|m| m.as_str().to_string())
}

/// Stable identifier of an ingested source document
pub fn document_id(source_uri: &str, source_version: &str) -> String {
    let digest = Sha256::digest(format!("{}:{}", source_uri, source_version).as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(40);
    id
}

/// Splits legal text into overlapping chunks
pub struct LegalTextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl LegalTextSplitter {
    /// Create a new splitter
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
        }
    }

    /// Split the given text; blank input yields no chunks
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &LEGAL_SEPARATORS)
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let Some(position) = separators.iter().position(|sep| text.contains(sep)) else {
            return self.split_chars(text);
        };
        let separator = separators[position];
        let finer = &separators[position + 1..];

        let mut chunks = Vec::new();
        let mut small: Vec<&str> = Vec::new();

        for piece in text.split(separator).filter(|p| !p.trim().is_empty()) {
            if char_len(piece) <= self.chunk_size {
                small.push(piece);
            } else {
                chunks.extend(self.merge(&small, separator));
                small.clear();
                chunks.extend(self.split_with(piece, finer));
            }
        }
        chunks.extend(self.merge(&small, separator));
        chunks
    }

    /// Merge small pieces into chunks, carrying an overlap window
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: Vec<&str> = Vec::new();
        let mut total = 0;

        for &piece in pieces {
            let len = char_len(piece);
            let joined_len = if window.is_empty() { len } else { total + sep_len + len };

            if joined_len > self.chunk_size && !window.is_empty() {
                chunks.push(window.join(separator));

                // Keep the tail of the window as overlap for the next chunk.
                while !window.is_empty()
                    && (total > self.chunk_overlap || total + sep_len + len > self.chunk_size)
                {
                    let removed = char_len(window.remove(0));
                    let joint = if window.is_empty() { 0 } else { sep_len };
                    total = total.saturating_sub(removed + joint);
                }
            }

            total = if window.is_empty() { len } else { total + sep_len + len };
            window.push(piece);
        }

        if !window.is_empty() {
            chunks.push(window.join(separator));
        }
        chunks
    }

    /// Last resort: split at character boundaries
    fn split_chars(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }
        chunks
    }
}

impl Default for LegalTextSplitter {
    fn default() -> Self {
        Self::new(1_200, 200)
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
