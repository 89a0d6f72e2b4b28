//! Overlapping text chunker.
//!
//! Splits documents into character-bounded chunks with a configurable
//! overlap, preferring paragraph then sentence boundaries once past the
//! half-chunk mark. Operates on char indices so multi-byte text never
//! splits inside a code point. Always makes forward progress.

use serde::Serialize;

use crate::config::RetrievalConfig;

/// A chunk of a source document with its position metadata.
#[derive(Debug, Clone, Serialize)]
pub struct TextChunk {
    /// Chunk text, trimmed
    pub content: String,
    /// Start offset in the source text, in chars
    pub start_index: usize,
    /// End offset in the source text, in chars
    pub end_index: usize,
    /// Ordinal of this chunk within its document
    pub chunk_index: usize,
    /// Source document name
    pub source_file: String,
}

/// Sentence boundaries tried in order when no paragraph break fits.
const SENTENCE_BREAKS: &[&[char]] = &[
    &['.', ' '],
    &['!', ' '],
    &['?', ' '],
    &['\n'],
];

/// Splits text into overlapping chunks.
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextChunker {
    fn default() -> Self {
        let defaults = RetrievalConfig::default();
        Self::new(defaults.chunk_size, defaults.chunk_overlap)
    }
}

impl TextChunker {
    /// `chunk_size` and `chunk_overlap` are in characters; the overlap is
    /// clamped below the chunk size so progress is always positive.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    /// Split `text` into overlapping chunks tagged with `source_file`.
    pub fn chunk(&self, text: &str, source_file: &str) -> Vec<TextChunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut chunk_index = 0;

        while start < chars.len() {
            let mut end = (start + self.chunk_size).min(chars.len());

            if end < chars.len() {
                end = self.natural_break(&chars, start, end);
            }

            let content: String = chars[start..end].iter().collect();
            let content = content.trim().to_string();

            if !content.is_empty() {
                chunks.push(TextChunk {
                    content,
                    start_index: start,
                    end_index: end,
                    chunk_index,
                    source_file: source_file.to_string(),
                });
                chunk_index += 1;
            }

            let next = end.saturating_sub(self.chunk_overlap);
            start = if next > start { next } else { end };
        }

        chunks
    }

    /// Pick a natural end for the window `[start, end)`: the last paragraph
    /// break past the half-chunk mark, else the last sentence break, else
    /// the hard cut.
    fn natural_break(&self, chars: &[char], start: usize, end: usize) -> usize {
        let midpoint = start + self.chunk_size / 2;

        if let Some(pos) = rfind(&chars[start..end], &['\n', '\n']) {
            let abs = start + pos;
            if abs > midpoint {
                return abs + 2;
            }
        }

        for sep in SENTENCE_BREAKS {
            if let Some(pos) = rfind(&chars[start..end], sep) {
                let abs = start + pos;
                if abs > midpoint {
                    return abs + sep.len();
                }
            }
        }

        end
    }
}

/// Index of the last occurrence of `needle` in `haystack`.
fn rfind(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).rev().find(|&i| &haystack[i..i + needle.len()] == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        let chunker = TextChunker::new(100, 10);
        assert!(chunker.chunk("", "a.txt").is_empty());
        assert!(chunker.chunk("   \n  ", "a.txt").is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = TextChunker::new(100, 10);
        let chunks = chunker.chunk("just a short note", "a.txt");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "just a short note");
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].source_file, "a.txt");
    }

    #[test]
    fn test_chunks_overlap() {
        let chunker = TextChunker::new(50, 10);
        let text = "word ".repeat(40);
        let chunks = chunker.chunk(&text, "b.txt");

        assert!(chunks.len() > 1);
        for window in chunks.windows(2) {
            assert!(window[1].start_index < window[0].end_index);
        }
    }

    #[test]
    fn test_prefers_paragraph_break() {
        let chunker = TextChunker::new(60, 5);
        let text = format!("{}\n\n{}", "a".repeat(40), "b".repeat(40));
        let chunks = chunker.chunk(&text, "c.txt");

        assert_eq!(chunks[0].content, "a".repeat(40));
    }

    #[test]
    fn test_prefers_sentence_break() {
        let chunker = TextChunker::new(60, 5);
        let text = format!("{}. {}", "a".repeat(40), "b".repeat(40));
        let chunks = chunker.chunk(&text, "d.txt");

        assert_eq!(chunks[0].content, format!("{}.", "a".repeat(40)));
    }

    #[test]
    fn test_forward_progress_with_large_overlap() {
        // Overlap equal to the chunk size must still terminate
        let chunker = TextChunker::new(10, 10);
        let text = "x".repeat(100);
        let chunks = chunker.chunk(&text, "e.txt");

        assert!(!chunks.is_empty());
        for window in chunks.windows(2) {
            assert!(window[1].start_index > window[0].start_index);
        }
    }

    #[test]
    fn test_multibyte_text() {
        let chunker = TextChunker::new(20, 5);
        let text = "это предложение на русском языке повторяется. ".repeat(5);
        let chunks = chunker.chunk(&text, "f.txt");

        assert!(!chunks.is_empty());
        let rebuilt: String = chunks.iter().map(|c| c.content.as_str()).collect();
        assert!(rebuilt.contains("русском"));
    }

    #[test]
    fn test_indices_are_ordered() {
        let chunker = TextChunker::new(30, 5);
        let text = "The rain in Spain stays mainly in the plain. ".repeat(10);
        let chunks = chunker.chunk(&text, "g.txt");

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert!(chunk.start_index < chunk.end_index);
        }
    }
}
