//! Error types for card extraction and re-export.

use serde::Serialize;
use thiserror::Error;

/// Step of the payload decoder that rejected the last padding variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeStage {
    /// Variant failed the alphabet/length check.
    Validate,
    /// Variant passed validation but the base64 decoder refused it.
    Base64,
}

impl DecodeStage {
    pub fn label(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Base64 => "base64",
        }
    }
}

/// Coarse grouping shown to users; stable strings for the popup script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCategory {
    Read,
    NoData,
    Decode,
    MalformedJson,
    Export,
}

/// Main error type for card operations.
#[derive(Error, Debug)]
pub enum CardError {
    /// The byte source could not be read
    #[error("failed to read file: {0}")]
    Read(String),

    /// Cleaning left nothing that looks like base64
    #[error("no valid base64 content found")]
    NoBase64Content,

    /// Every padding variant was rejected
    #[error("unable to decode valid base64 data (stage {}): {detail}", .stage.label())]
    Undecodable { stage: DecodeStage, detail: String },

    /// Base64 decoded, JSON did not parse even after sanitation
    #[error("decoded data is not valid JSON: {0}")]
    MalformedJson(String),

    /// The remapped persona could not be serialized
    #[error("failed to encode export payload: {0}")]
    Export(String),
}

impl CardError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Read(_) => ErrorCategory::Read,
            Self::NoBase64Content => ErrorCategory::NoData,
            Self::Undecodable { .. } => ErrorCategory::Decode,
            Self::MalformedJson(_) => ErrorCategory::MalformedJson,
            Self::Export(_) => ErrorCategory::Export,
        }
    }

    /// Short heading for the results panel.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Read(_) => "Error extracting metadata",
            _ => "Error processing character data",
        }
    }

    /// Human-readable explanation; the `Display` text is kept for technical details.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Read(_) => "The selected file could not be read.",
            Self::NoBase64Content => {
                "No valid character data found in the image. The image may not contain the expected metadata format."
            }
            Self::Undecodable { .. } => {
                "Invalid or corrupted base64 data found in the image metadata. The character data may be damaged or incomplete."
            }
            Self::MalformedJson(_) => {
                "The decoded data is not valid JSON format. The character data structure may be corrupted."
            }
            Self::Export(_) => {
                "An error occurred while processing the character data from the image."
            }
        }
    }
}

impl From<std::io::Error> for CardError {
    fn from(err: std::io::Error) -> Self {
        Self::Read(err.to_string())
    }
}
