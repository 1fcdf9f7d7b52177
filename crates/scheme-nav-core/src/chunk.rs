//! Paragraph-boundary passage chunker.
//!
//! Translated scheme documents are long page dumps. They are split into
//! passages that stay under a `max_tokens` budget so each retrieved passage
//! is a focused excerpt. The budget is measured in UTF-8 bytes at 4 bytes
//! per token, so Kannada text (3 bytes per character) yields passages with
//! roughly a third as many characters as English text.
//!
//! 1. Split on blank lines (`\n\n`) and drop empty paragraphs.
//! 2. Pack consecutive paragraphs into one chunk while it fits.
//! 3. Hard-split a paragraph that alone exceeds the budget, preferring the
//!    last newline or space before the limit.
//!
//! Chunk ids are `<document_id>#<index>`, so re-chunking the same text
//! yields the same ids and hashes.
//!
//! ```rust
//! use scheme_nav_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("guide.txt", "Eligibility.\n\nHow to apply.", 400);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].id, "guide.txt#0");
//! ```

use sha2::{Digest, Sha256};

use crate::models::Chunk;

const BYTES_PER_TOKEN: usize = 4;

/// Split `text` into paragraph-aligned chunks of at most
/// `max_tokens * 4` bytes.
///
/// Whitespace-only input produces no chunks.
pub fn chunk_text(document_id: &str, text: &str, max_tokens: usize) -> Vec<Chunk> {
    let max_bytes = max_tokens.max(1) * BYTES_PER_TOKEN;
    let mut pieces: Vec<String> = Vec::new();
    let mut buf = String::new();

    for para in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if !buf.is_empty() && buf.len() + 2 + para.len() > max_bytes {
            pieces.push(std::mem::take(&mut buf));
        }

        if para.len() > max_bytes {
            if !buf.is_empty() {
                pieces.push(std::mem::take(&mut buf));
            }
            pieces.extend(hard_split(para, max_bytes));
            continue;
        }

        if !buf.is_empty() {
            buf.push_str("\n\n");
        }
        buf.push_str(para);
    }

    if !buf.is_empty() {
        pieces.push(buf);
    }

    pieces
        .into_iter()
        .enumerate()
        .map(|(index, text)| make_chunk(document_id, index, text))
        .collect()
}

/// Break an oversized paragraph into trimmed pieces of at most `max_bytes` bytes.
fn hard_split(para: &str, max_bytes: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = para;

    while !rest.is_empty() {
        if rest.len() <= max_bytes {
            out.push(rest.trim().to_string());
            break;
        }

        let limit = floor_char_boundary(rest, max_bytes);
        let cut = rest[..limit]
            .rfind(&['\n', ' '][..])
            .map(|pos| pos + 1)
            .unwrap_or(limit);
        // A single character wider than the budget still has to advance.
        let cut = if cut == 0 {
            rest.chars().next().map(char::len_utf8).unwrap_or(rest.len())
        } else {
            cut
        };

        let piece = rest[..cut].trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        rest = &rest[cut..];
    }

    out.retain(|p| !p.is_empty());
    out
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn make_chunk(document_id: &str, index: usize, text: String) -> Chunk {
    let hash = format!("{:x}", Sha256::digest(text.as_bytes()));
    Chunk {
        id: format!("{}#{}", document_id, index),
        document_id: document_id.to_string(),
        chunk_index: index,
        text,
        hash,
    }
}
