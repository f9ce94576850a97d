use std::collections::VecDeque;

use serde::Deserialize;

use super::error::DocumentError;
use super::types::{Chunk, Document, DocumentMetadata, SourceUnits};

/// Separators tried in order by [`SplitStrategy::Recursive`]. The empty
/// separator splits into single characters.
const RECURSIVE_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitStrategy {
    /// Paragraphs, then lines, then words, then characters.
    #[default]
    Recursive,
    Sentence,
    Characters,
}

#[derive(Debug, Clone)]
pub struct SplitterConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub strategy: SplitStrategy,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            strategy: SplitStrategy::Recursive,
        }
    }
}

impl SplitterConfig {
    /// # Errors
    ///
    /// Returns `InvalidSplitter` if `chunk_size` is zero or smaller than `chunk_overlap`.
    pub fn validate(&self) -> Result<(), DocumentError> {
        if self.chunk_size == 0 {
            return Err(DocumentError::InvalidSplitter(
                "chunk_size must be greater than 0".into(),
            ));
        }
        if self.chunk_overlap > self.chunk_size {
            return Err(DocumentError::InvalidSplitter(format!(
                "chunk_overlap ({}) must not exceed chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    #[must_use]
    pub fn new(config: SplitterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Split raw text into chunk strings. Whitespace-only chunks are dropped.
    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        let SplitterConfig {
            chunk_size,
            chunk_overlap,
            strategy,
        } = self.config;

        let mut chunks = match strategy {
            SplitStrategy::Recursive => {
                split_recursive(text, &RECURSIVE_SEPARATORS, chunk_size, chunk_overlap)
            }
            SplitStrategy::Sentence => {
                merge_sentences(&split_sentences(text), chunk_size, chunk_overlap)
            }
            SplitStrategy::Characters => split_chars(text, chunk_size, chunk_overlap),
        };
        chunks.retain(|c| !c.trim().is_empty());
        chunks
    }

    #[must_use]
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        self.chunks_for(&document.content, &document.metadata)
    }

    fn chunks_for(&self, text: &str, metadata: &DocumentMetadata) -> Vec<Chunk> {
        self.split_text(text)
            .into_iter()
            .enumerate()
            .map(|(i, content)| Chunk {
                content,
                metadata: metadata.clone(),
                chunk_index: i,
            })
            .collect()
    }

    /// Split every text and attach a copy of the metadata at the same index.
    ///
    /// # Errors
    ///
    /// Returns `Misaligned` if `texts` and `metadatas` differ in length.
    pub fn create_documents(
        &self,
        texts: &[String],
        metadatas: &[DocumentMetadata],
    ) -> Result<Vec<Chunk>, DocumentError> {
        if texts.len() != metadatas.len() {
            return Err(DocumentError::Misaligned {
                texts: texts.len(),
                metadatas: metadatas.len(),
            });
        }
        Ok(texts
            .iter()
            .zip(metadatas)
            .flat_map(|(text, metadata)| self.chunks_for(text, metadata))
            .collect())
    }

    /// # Errors
    ///
    /// Returns `Misaligned` if the unit lists were built out of step.
    pub fn split_units(&self, units: &SourceUnits) -> Result<Vec<Chunk>, DocumentError> {
        self.create_documents(&units.texts, &units.metadatas)
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split on `separator`, keeping it attached to the start of the following piece.
fn split_keep_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        pieces.push(&text[start..idx]);
        start = idx;
    }
    pieces.push(&text[start..]);
    pieces.retain(|p| !p.is_empty());
    pieces
}

fn split_recursive(
    text: &str,
    separators: &[&str],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<String> {
    let mut separator = separators.last().copied().unwrap_or("");
    let mut remaining: &[&str] = &[];
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() {
            separator = sep;
            break;
        }
        if text.contains(sep) {
            separator = sep;
            remaining = &separators[i + 1..];
            break;
        }
    }

    let mut chunks = Vec::new();
    let mut pending: Vec<&str> = Vec::new();
    for piece in split_keep_separator(text, separator) {
        if char_len(piece) < chunk_size {
            pending.push(piece);
            continue;
        }
        if !pending.is_empty() {
            chunks.extend(merge_splits(&pending, chunk_size, chunk_overlap));
            pending.clear();
        }
        if remaining.is_empty() {
            chunks.push(piece.to_owned());
        } else {
            chunks.extend(split_recursive(piece, remaining, chunk_size, chunk_overlap));
        }
    }
    if !pending.is_empty() {
        chunks.extend(merge_splits(&pending, chunk_size, chunk_overlap));
    }
    chunks
}

fn join_window(window: &VecDeque<(&str, usize)>) -> Option<String> {
    let joined: String = window.iter().map(|(s, _)| *s).collect();
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Merge small pieces into chunks of at most `chunk_size` characters, carrying
/// up to `chunk_overlap` characters of trailing pieces into the next chunk.
fn merge_splits(splits: &[&str], chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<(&str, usize)> = VecDeque::new();
    let mut total = 0;

    for piece in splits {
        let len = char_len(piece);
        if total + len > chunk_size && !window.is_empty() {
            if total > chunk_size {
                tracing::warn!(total, chunk_size, "created a chunk longer than chunk_size");
            }
            chunks.extend(join_window(&window));
            while total > chunk_overlap || (total + len > chunk_size && total > 0) {
                let Some((_, front_len)) = window.pop_front() else {
                    break;
                };
                total -= front_len;
            }
        }
        window.push_back((piece, len));
        total += len;
    }
    chunks.extend(join_window(&window));
    chunks
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        current.push(chars[i]);

        if chars[i] == '\n' && i + 1 < chars.len() && chars[i + 1] == '\n' {
            current.push(chars[i + 1]);
            i += 1;
            if !current.trim().is_empty() {
                sentences.push(std::mem::take(&mut current));
            }
        } else if matches!(chars[i], '.' | '?' | '!')
            && i + 1 < chars.len()
            && chars[i + 1] == ' '
            && !current.trim().is_empty()
        {
            sentences.push(std::mem::take(&mut current));
        }

        i += 1;
    }

    if !current.trim().is_empty() {
        sentences.push(current);
    }

    sentences
}

fn merge_sentences(sentences: &[String], chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let lens: Vec<usize> = sentences.iter().map(|s| char_len(s)).collect();
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    let mut window_start = 0;

    for (idx, sentence) in sentences.iter().enumerate() {
        if !current.is_empty() && current_len + lens[idx] > chunk_size {
            chunks.push(current.trim().to_owned());

            // walk back from the current sentence while the overlap fits
            current.clear();
            current_len = 0;
            let mut overlap_start = idx;
            for i in (window_start..idx).rev() {
                if current_len + lens[i] > chunk_overlap {
                    break;
                }
                current_len += lens[i];
                overlap_start = i;
            }
            for s in &sentences[overlap_start..idx] {
                current.push_str(s);
            }
            window_start = overlap_start;
        }

        current.push_str(sentence);
        current_len += lens[idx];
    }

    if !current.is_empty() {
        chunks.push(current.trim().to_owned());
    }

    chunks
}

fn split_chars(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}
