use std::ops::Range;

use crate::config::{State, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::document::{Chunk, SourceDocument};
use crate::error::TalevecError;

#[derive(Debug, Clone, Copy)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl From<&State> for SplitterConfig {
    fn from(state: &State) -> Self {
        Self {
            chunk_size: state.chunk_size,
            chunk_overlap: state.chunk_overlap,
        }
    }
}

/// Splits text into overlapping character windows, cutting at sentence or
/// word boundaries when one falls inside the window.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    pub fn new(config: SplitterConfig) -> Result<Self, TalevecError> {
        if config.chunk_size == 0 {
            return Err(TalevecError::InvalidConfig(
                "chunk_size must be at least 1".into(),
            ));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(TalevecError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        Ok(Self { config })
    }

    /// Chunks in source order. Empty input yields no chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        self.windows(&chars)
            .into_iter()
            .map(|range| chars[range].iter().collect())
            .collect()
    }

    pub fn split_document(&self, document: &SourceDocument) -> Vec<Chunk> {
        self.split(&document.text)
            .into_iter()
            .enumerate()
            .map(|(ordinal, text)| Chunk {
                text,
                source_id: document.source_id.clone(),
                ordinal,
            })
            .collect()
    }

    fn windows(&self, chars: &[char]) -> Vec<Range<usize>> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let mut windows = Vec::new();
        if chars.is_empty() {
            return windows;
        }

        let mut start = 0;
        loop {
            let hard_end = (start + size).min(chars.len());
            if hard_end == chars.len() {
                windows.push(start..hard_end);
                break;
            }

            // A cut past `start + overlap` guarantees the next window starts later.
            let min_end = start + overlap + 1;
            let end = find_sentence_break(chars, min_end.max(start + size / 2), hard_end)
                .or_else(|| find_word_break(chars, min_end, hard_end))
                .unwrap_or(hard_end);
            windows.push(start..end);

            start = overlap_start(chars, end - overlap, end);
        }
        windows
    }
}

/// Largest cut `c` in `[lo, hi]` directly after sentence-ending punctuation
/// and its trailing whitespace, or after a newline.
fn find_sentence_break(chars: &[char], lo: usize, hi: usize) -> Option<usize> {
    (lo.max(2)..=hi).rev().find(|&c| {
        chars[c - 1] == '\n'
            || (chars[c - 1].is_whitespace() && matches!(chars[c - 2], '.' | '!' | '?'))
    })
}

fn find_word_break(chars: &[char], lo: usize, hi: usize) -> Option<usize> {
    (lo.max(1)..=hi).rev().find(|&c| chars[c - 1].is_whitespace())
}

/// Earliest position in `[lo, end)` that begins a word, so the carried-over
/// overlap does not start mid-word. Unbroken runs overlap from `lo`.
fn overlap_start(chars: &[char], lo: usize, end: usize) -> usize {
    (lo..end)
        .find(|&p| p == 0 || chars[p - 1].is_whitespace())
        .unwrap_or(lo)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splitter(chunk_size: usize, chunk_overlap: usize) -> TextSplitter {
        TextSplitter::new(SplitterConfig {
            chunk_size,
            chunk_overlap,
        })
        .unwrap()
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(splitter(10, 2).split("").is_empty());
    }

    #[test]
    fn short_text_is_single_chunk() {
        let chunks = TextSplitter::new(SplitterConfig::default())
            .unwrap()
            .split("Alice is the protagonist of the story.");
        assert_eq!(chunks, vec!["Alice is the protagonist of the story."]);
    }

    #[test]
    fn text_of_exactly_chunk_size_is_single_chunk() {
        let text = "a".repeat(50);
        assert_eq!(splitter(50, 10).split(&text).len(), 1);
    }

    #[test]
    fn overlap_not_smaller_than_size_is_rejected() {
        let err = TextSplitter::new(SplitterConfig {
            chunk_size: 10,
            chunk_overlap: 10,
        })
        .unwrap_err();
        assert!(matches!(err, TalevecError::InvalidConfig(_)));
    }

    #[test]
    fn prefers_sentence_boundaries() {
        let text = "One two three. Four five six. Seven eight nine.";
        let chunks = splitter(20, 0).split(text);
        assert_eq!(chunks[0], "One two three. ");
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn falls_back_to_word_boundary() {
        let text = "alpha beta gamma delta epsilon";
        let chunks = splitter(12, 0).split(text);
        assert_eq!(chunks[0], "alpha beta ");
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn hard_cut_without_whitespace() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        let chunks = splitter(10, 3).split(text);
        assert_eq!(chunks[0], "abcdefghij");
        assert_eq!(chunks[1], "hijklmnopq");
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert!(chunks.last().unwrap().ends_with('z'));
    }

    #[test]
    fn overlap_starts_at_word_boundary() {
        let text = "aa bb cc dd ee ff gg hh ii jj";
        let chunks = splitter(12, 5).split(text);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            assert!(!pair[1].starts_with(' '));
        }
    }

    #[test]
    fn multibyte_characters_are_counted_as_chars() {
        let text = "é".repeat(25);
        let chunks = splitter(10, 2).split(&text);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }

    #[test]
    fn document_chunks_carry_source_and_ordinal() {
        let doc = SourceDocument::new("hero.txt", "First part here. Second part here.");
        let chunks = splitter(18, 0).split_document(&doc);
        assert!(chunks.len() >= 2);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.source_id, "hero.txt");
            assert_eq!(chunk.ordinal, i);
        }
    }

    mod proptest_chunker {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(500))]

            #[test]
            fn windows_cover_every_character(
                content in "[a-zé .!?\n]{1,800}",
                chunk_size in 1usize..120,
                overlap_seed in 0usize..120,
            ) {
                let chunk_overlap = overlap_seed % chunk_size;
                let splitter = splitter(chunk_size, chunk_overlap);
                let chars: Vec<char> = content.chars().collect();
                let windows = splitter.windows(&chars);

                prop_assert!(!windows.is_empty());
                prop_assert_eq!(windows[0].start, 0);
                prop_assert_eq!(windows.last().unwrap().end, chars.len());
                for w in &windows {
                    prop_assert!(w.end > w.start);
                    prop_assert!(w.end - w.start <= chunk_size);
                }
                for pair in windows.windows(2) {
                    prop_assert!(pair[1].start > pair[0].start);
                    prop_assert!(pair[1].start <= pair[0].end);
                    prop_assert!(pair[0].end - pair[1].start <= chunk_overlap);
                }
            }

            #[test]
            fn shorter_than_chunk_size_is_one_chunk(
                content in "[a-z .]{1,99}",
            ) {
                let chunks = splitter(100, 20).split(&content);
                prop_assert_eq!(chunks.len(), 1);
                prop_assert_eq!(&chunks[0], &content);
            }

            #[test]
            fn zero_overlap_chunks_concatenate_to_input(
                content in "[a-z .]{1,600}",
                chunk_size in 1usize..80,
            ) {
                let chunks = splitter(chunk_size, 0).split(&content);
                prop_assert_eq!(chunks.concat(), content);
            }
        }
    }
}
