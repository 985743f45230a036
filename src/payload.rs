//! Turns a raw metadata field into parseable card JSON.

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{CardError, DecodeStage};
use crate::repair::{
    clean_base64, decode_base64_variant, has_base64_shape, sanitize_json_control_chars,
};

/// Padding suffixes tried in order after cleaning.
const PADDING_VARIANTS: [&str; 3] = ["", "=", "=="];

/// Decodes the base64 JSON hidden in a `chara` field.
///
/// The cleaned body is retried with no, one and two extra `=`; the first
/// variant that decodes and parses wins. The returned text is the sanitized
/// JSON, guaranteed to parse.
pub fn decode_payload(raw: &str) -> Result<String, CardError> {
    let cleaned = clean_base64(raw).ok_or(CardError::NoBase64Content)?;

    let mut last_stage = DecodeStage::Validate;
    let mut last_detail = String::from("no padding variant has a valid base64 shape");
    let mut json_error: Option<String> = None;

    for suffix in PADDING_VARIANTS {
        let variant = format!("{cleaned}{suffix}");
        if !has_base64_shape(&variant) {
            debug!(padding = suffix.len(), "padding variant rejected by shape check");
            continue;
        }
        let bytes = match decode_base64_variant(&variant) {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(padding = suffix.len(), error = %err, "padding variant failed to decode");
                last_stage = DecodeStage::Base64;
                last_detail = err.to_string();
                continue;
            }
        };
        let text = String::from_utf8_lossy(&bytes);
        let sanitized = sanitize_json_control_chars(&text);
        match serde_json::from_str::<Value>(&sanitized) {
            Ok(_) => return Ok(sanitized),
            Err(err) => {
                debug!(padding = suffix.len(), error = %err, "decoded variant is not JSON");
                json_error = Some(err.to_string());
            }
        }
    }

    let err = match json_error {
        Some(detail) => CardError::MalformedJson(detail),
        None => CardError::Undecodable {
            stage: last_stage,
            detail: last_detail,
        },
    };
    warn!(error = %err, "card payload could not be decoded");
    Err(err)
}
