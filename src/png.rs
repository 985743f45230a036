//! PNG-style chunk walking and text chunk decoding.
//!
//! The scanner never validates the signature, lengths or checksums: card
//! images in the wild are often truncated or re-saved by tools that get the
//! trailer wrong, so it yields whatever it can read and stops quietly.

use tracing::debug;

/// Byte offset of the first chunk (past the 8-byte signature).
pub const SIGNATURE_LEN: usize = 8;

const HEADER_LEN: usize = 8;
const TRAILER_LEN: usize = 4;

pub const TAG_TEXT: [u8; 4] = *b"tEXt";
pub const TAG_COMPRESSED_TEXT: [u8; 4] = *b"zTXt";
pub const TAG_INTERNATIONAL_TEXT: [u8; 4] = *b"iTXt";
/// Proprietary chunk some card editors write instead of a text chunk.
pub const TAG_CARD: [u8; 4] = *b"caRt";

/// A chunk borrowed from the scanned buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub tag: [u8; 4],
    /// Payload, clamped to the end of the buffer.
    pub payload: &'a [u8],
    /// Length as written in the chunk header.
    pub declared_length: u32,
}

impl Chunk<'_> {
    /// Tag as text; non-ASCII bytes are replaced.
    pub fn tag_str(&self) -> String {
        String::from_utf8_lossy(&self.tag).into_owned()
    }

    pub fn is_truncated(&self) -> bool {
        self.payload.len() < self.declared_length as usize
    }

    pub fn is_text(&self) -> bool {
        matches!(
            self.tag,
            TAG_TEXT | TAG_COMPRESSED_TEXT | TAG_INTERNATIONAL_TEXT
        )
    }
}

/// Single forward pass over the chunks of a buffer.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    bytes: &'a [u8],
    offset: usize,
}

/// Starts a scan at the first chunk after the signature.
pub fn scan_chunks(bytes: &[u8]) -> Chunks<'_> {
    Chunks {
        bytes,
        offset: SIGNATURE_LEN,
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = self.bytes.len().checked_sub(self.offset)?;
        if remaining < HEADER_LEN {
            self.offset = self.bytes.len();
            return None;
        }
        let header = &self.bytes[self.offset..self.offset + HEADER_LEN];
        let declared_length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let tag = [header[4], header[5], header[6], header[7]];

        let start = self.offset + HEADER_LEN;
        let end = start
            .saturating_add(declared_length as usize)
            .min(self.bytes.len());
        let payload = &self.bytes[start..end];

        self.offset = start
            .saturating_add(declared_length as usize)
            .saturating_add(TRAILER_LEN);

        let chunk = Chunk {
            tag,
            payload,
            declared_length,
        };
        if chunk.is_truncated() {
            debug!(
                tag = %chunk.tag_str(),
                declared = declared_length,
                available = payload.len(),
                "chunk overruns buffer, clamping"
            );
        }
        Some(chunk)
    }
}

/// Decodes a text chunk payload as UTF-8.
///
/// `zTXt` payloads are handed back without inflating, so a compressed chunk
/// usually fails the UTF-8 check and yields `None`. Invalid UTF-8 is never an
/// error here; the chunk simply carries no text.
pub fn decode_text_chunk(payload: &[u8], tag: [u8; 4]) -> Option<String> {
    match std::str::from_utf8(payload) {
        Ok(text) => {
            if tag == TAG_COMPRESSED_TEXT {
                debug!("zTXt chunk passed through without inflating");
            }
            Some(text.to_string())
        }
        Err(err) => {
            debug!(
                tag = %String::from_utf8_lossy(&tag),
                error = %err,
                "text chunk is not valid UTF-8"
            );
            None
        }
    }
}
