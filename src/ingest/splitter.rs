//! Token-window splitter that cuts normalized page text into overlapping chunks.
//!
//! The window arithmetic is deliberately simple so re-ingestion is reproducible:
//! tokenize once with a fixed encoding, walk the token sequence in strides of
//! `chunk_tokens - overlap_tokens`, and decode each window back to text. Chunk
//! identifiers and token counts derive from token positions alone, never from
//! character offsets, so the same input always yields the same chunk sequence.

use tiktoken_rs::{CoreBPE, cl100k_base};

use super::types::{Chunk, ChunkMeta, PageMeta, SplitError};

/// Encoding every ingestion run tokenizes with. Held fixed so token counts and
/// window boundaries stay comparable across runs.
const ENCODING: &str = "cl100k_base";

/// Sliding token-window splitter with a fixed encoding.
pub struct TokenSplitter {
    encoder: CoreBPE,
    chunk_tokens: usize,
    overlap_tokens: usize,
}

impl TokenSplitter {
    /// Build a splitter for the given window and overlap, loading the encoding once.
    ///
    /// Rejects `overlap_tokens >= chunk_tokens`; that also rules out a zero-sized
    /// window, since no overlap can be smaller than zero.
    pub fn new(chunk_tokens: usize, overlap_tokens: usize) -> Result<Self, SplitError> {
        if overlap_tokens >= chunk_tokens {
            return Err(SplitError::InvalidWindow {
                chunk_tokens,
                overlap_tokens,
            });
        }
        let encoder = cl100k_base().map_err(|source| SplitError::Tokenizer {
            encoding: ENCODING.to_string(),
            source,
        })?;
        Ok(Self {
            encoder,
            chunk_tokens,
            overlap_tokens,
        })
    }

    /// Window size in tokens.
    pub fn chunk_tokens(&self) -> usize {
        self.chunk_tokens
    }

    /// Overlap between adjacent windows in tokens.
    pub fn overlap_tokens(&self) -> usize {
        self.overlap_tokens
    }

    /// Token count of `text` under the splitter's encoding.
    pub fn count_tokens(&self, text: &str) -> usize {
        self.encoder.encode_ordinary(text).len()
    }

    /// Cut `text` into overlapping token windows, attaching an owned copy of
    /// `base` to every chunk.
    ///
    /// Windows start at token offsets `0, step, 2*step, ...` and cover up to
    /// `chunk_tokens` tokens each; the final window may be short and is emitted
    /// as-is. `token_count` records the raw window length before the decoded
    /// text is trimmed. Empty input yields no chunks.
    pub fn split(&self, text: &str, base: &PageMeta) -> Vec<Chunk> {
        let tokens = self.encoder.encode_ordinary(text);
        if tokens.is_empty() {
            return Vec::new();
        }

        let step = self.chunk_tokens - self.overlap_tokens;
        let mut chunks = Vec::with_capacity(tokens.len().div_ceil(step));
        let mut start = 0;
        while start < tokens.len() {
            let end = (start + self.chunk_tokens).min(tokens.len());
            let window = &tokens[start..end];

            // A window sliced out of the middle of the stream can begin or end
            // inside a multi-byte character, in which case the decoder rejects
            // the slice. Shave tokens off the offending edges until the rest
            // decodes; `token_count` keeps the unshaved window length.
            let mut lo = 0;
            let mut hi = window.len();
            let mut shave_front = false;
            let decoded = loop {
                if lo >= hi {
                    break String::new();
                }
                match self.encoder.decode(window[lo..hi].to_vec()) {
                    Ok(text) => break text,
                    Err(_) => {
                        if shave_front {
                            lo += 1;
                        } else {
                            hi -= 1;
                        }
                        shave_front = !shave_front;
                    }
                }
            };

            chunks.push(Chunk {
                text: decoded.trim().to_string(),
                meta: ChunkMeta {
                    page: base.clone(),
                    chunk_id: chunks.len(),
                    token_count: window.len(),
                },
            });
            start += step;
        }
        chunks
    }
}
