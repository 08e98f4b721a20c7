
use serde::{Deserialize, Serialize};
use std::iter::Peekable;
use std::str::SplitWhitespace;
use tracing::debug;

use crate::config::ConfigError;

/// Configuration for content chunking
///
/// Serialized with a `strategy` tag so the TOML form reads
/// `strategy = "words"`, `size = 256`, `overlap = 40`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ChunkingConfig {
    /// Windows of `size` whitespace-separated words, each starting
    /// `size - overlap` words after the previous one
    Words {
        size: usize,
        #[serde(default)]
        overlap: usize,
    },
    /// Consecutive windows of `size` characters
    Characters { size: usize },
    /// Words packed greedily into chunks of at most `size` characters
    PackedWords { size: usize },
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self::Words {
            size: 256,
            overlap: 40,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::Words { size, overlap } => {
                if size == 0 {
                    return Err(ConfigError::InvalidChunkSize(size));
                }
                if overlap >= size {
                    return Err(ConfigError::InvalidOverlap { overlap, size });
                }
            }
            Self::Characters { size } | Self::PackedWords { size } => {
                if size == 0 {
                    return Err(ConfigError::InvalidChunkSize(size));
                }
            }
        }
        Ok(())
    }
}

/// Lazy sequence of chunks over a borrowed text.
///
/// A clone taken before consuming yields the same chunks again.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    inner: ChunksInner<'a>,
}

#[derive(Debug, Clone)]
enum ChunksInner<'a> {
    Empty,
    Words {
        words: Vec<&'a str>,
        size: usize,
        step: usize,
        start: usize,
    },
    Characters {
        rest: &'a str,
        size: usize,
    },
    Packed {
        words: Peekable<SplitWhitespace<'a>>,
        size: usize,
    },
}

impl Iterator for Chunks<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        match &mut self.inner {
            ChunksInner::Empty => None,
            ChunksInner::Words {
                words,
                size,
                step,
                start,
            } => {
                if *start >= words.len() {
                    return None;
                }
                let end = (*start + *size).min(words.len());
                let chunk = words.get(*start..end)?.join(" ");
                *start += *step;
                Some(chunk)
            }
            ChunksInner::Characters { rest, size } => {
                if rest.is_empty() {
                    return None;
                }
                let split = rest
                    .char_indices()
                    .nth(*size)
                    .map_or(rest.len(), |(index, _)| index);
                let (head, tail) = rest.split_at(split);
                *rest = tail;
                Some(head.to_string())
            }
            ChunksInner::Packed { words, size } => next_packed(words, *size),
        }
    }
}

fn next_packed(words: &mut Peekable<SplitWhitespace<'_>>, size: usize) -> Option<String> {
    let mut chunk = String::new();
    let mut chunk_chars = 0;

    while let Some(word) = words.peek().copied() {
        let word_chars = word.chars().count();

        if chunk.is_empty() {
            // An oversized word still forms a chunk of its own
            chunk.push_str(word);
            chunk_chars = word_chars;
        } else if chunk_chars + 1 + word_chars <= size {
            chunk.push(' ');
            chunk.push_str(word);
            chunk_chars += 1 + word_chars;
        } else {
            break;
        }
        words.next();
    }

    (!chunk.is_empty()).then_some(chunk)
}

/// Split `text` into chunks according to `config`.
///
/// Fails only when the configuration itself is invalid. Empty or
/// whitespace-only text yields no chunks.
#[inline]
pub fn chunk<'a>(text: &'a str, config: &ChunkingConfig) -> Result<Chunks<'a>, ConfigError> {
    config.validate()?;

    if text.trim().is_empty() {
        return Ok(Chunks {
            inner: ChunksInner::Empty,
        });
    }

    let inner = match *config {
        ChunkingConfig::Words { size, overlap } => ChunksInner::Words {
            words: text.split_whitespace().collect(),
            size,
            step: size - overlap,
            start: 0,
        },
        ChunkingConfig::Characters { size } => ChunksInner::Characters { rest: text, size },
        ChunkingConfig::PackedWords { size } => ChunksInner::Packed {
            words: text.split_whitespace().peekable(),
            size,
        },
    };

    Ok(Chunks { inner })
}

/// Chunk `text` eagerly
#[inline]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<String>, ConfigError> {
    let chunks: Vec<String> = chunk(text, config)?.collect();

    debug!(
        "Chunked {} chars into {} chunks using {:?}",
        text.len(),
        chunks.len(),
        config
    );

    Ok(chunks)
}
