//! Locates embedded character-card text in PNG chunks or JPEG EXIF segments.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::png::{self, Chunk, TAG_CARD};

/// Substring that marks a text field as character-card data.
pub const MARKER: &str = "chara";

const PNG_MAGIC: [u8; 4] = [0x89, 0x50, 0x4E, 0x47];
const EXIF_MARKER: [u8; 2] = [0xFF, 0xE1];
const PNG_MIME: &str = "image/png";

/// Text fields found in an image. Both empty means nothing was embedded.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardMetadata {
    /// Last text chunk mentioning `chara`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chara: Option<String>,
    /// Last text chunk mentioning `character` or `char_data`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_data: Option<String>,
}

impl CardMetadata {
    pub fn is_empty(&self) -> bool {
        self.chara.is_none() && self.character_data.is_none()
    }
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ExtractOptions {
    /// MIME type reported by the file picker; `image/png` forces the chunk
    /// walk even when the magic bytes are damaged.
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl ExtractOptions {
    pub fn with_mime(mime_type: &str) -> Self {
        let trimmed = mime_type.trim();
        Self {
            mime_type: (!trimmed.is_empty()).then(|| trimmed.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Chunks,
    Exif,
}

fn pick_strategy(bytes: &[u8], options: &ExtractOptions) -> Strategy {
    let declared_png = options
        .mime_type
        .as_deref()
        .is_some_and(|mime| mime.eq_ignore_ascii_case(PNG_MIME));
    if declared_png || (bytes.len() > 8 && bytes[..4] == PNG_MAGIC) {
        Strategy::Chunks
    } else {
        Strategy::Exif
    }
}

/// Collects card text from an image buffer.
///
/// PNG input (by MIME hint or magic bytes) is walked chunk by chunk and every
/// matching chunk overwrites the previous one, so the last match wins.
/// Anything else gets a linear scan for an EXIF APP1 segment that stops at the
/// first hit.
pub fn extract_metadata(bytes: &[u8], options: &ExtractOptions) -> CardMetadata {
    match pick_strategy(bytes, options) {
        Strategy::Chunks => extract_from_chunks(bytes),
        Strategy::Exif => extract_from_exif(bytes),
    }
}

fn extract_from_chunks(bytes: &[u8]) -> CardMetadata {
    let mut metadata = CardMetadata::default();
    for chunk in png::scan_chunks(bytes) {
        if chunk.is_text() {
            collect_text_chunk(&mut metadata, &chunk);
        } else if chunk.tag == TAG_CARD {
            collect_card_chunk(&mut metadata, &chunk);
        }
    }
    metadata
}

fn collect_text_chunk(metadata: &mut CardMetadata, chunk: &Chunk<'_>) {
    let Some(text) = png::decode_text_chunk(chunk.payload, chunk.tag) else {
        return;
    };
    let is_character = text.contains("character") || text.contains("char_data");
    if text.contains(MARKER) {
        debug!(tag = %chunk.tag_str(), len = text.len(), "found chara text chunk");
        metadata.chara = Some(text.clone());
    }
    if is_character {
        metadata.character_data = Some(text);
    }
}

fn collect_card_chunk(metadata: &mut CardMetadata, chunk: &Chunk<'_>) {
    match std::str::from_utf8(chunk.payload) {
        Ok(text) if text.contains(MARKER) => {
            debug!(len = text.len(), "found chara in caRt chunk");
            metadata.chara = Some(text.to_string());
        }
        Ok(_) => {}
        Err(err) => debug!(error = %err, "caRt chunk is not valid UTF-8"),
    }
}

fn extract_from_exif(bytes: &[u8]) -> CardMetadata {
    let mut i = 0;
    while i + 4 < bytes.len() {
        if bytes[i..i + 2] == EXIF_MARKER {
            let length = u16::from_be_bytes([bytes[i + 2], bytes[i + 3]]) as usize;
            let start = i + 4;
            let end = (start + length).min(bytes.len());
            // APP1 carries binary IFD data and the length counts itself, so the
            // slice can reach into the next marker. Invalid bytes become U+FFFD.
            let text = String::from_utf8_lossy(&bytes[start..end]);
            if text.contains(MARKER) {
                debug!(offset = i, len = text.len(), "found chara in EXIF segment");
                return CardMetadata {
                    chara: Some(text.into_owned()),
                    character_data: None,
                };
            }
        }
        i += 1;
    }
    CardMetadata::default()
}
