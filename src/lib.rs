use std::io::Read;

use chrono::{DateTime, Utc};
use console_error_panic_hook::set_once as set_panic_hook;
use js_sys::Date;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use wasm_bindgen::prelude::*;

pub mod error;
pub mod history;
pub mod metadata;
pub mod payload;
pub mod persona;
pub mod png;
pub mod repair;

pub use error::{CardError, DecodeStage, ErrorCategory};
pub use history::{DropHistory, DroppedItem, MAX_DROPPED_ITEMS};
pub use metadata::{CardMetadata, ExtractOptions, extract_metadata};
pub use payload::decode_payload;
pub use persona::{SourcePersona, TargetPersona, encode_export, map_persona};

const NOT_FOUND_MESSAGE: &str = "No 'chara' metadata found in the image.";
const DEFAULT_BATCH_NAME: &str = "card";

#[wasm_bindgen(start)]
pub fn wasm_start() {
    set_panic_hook();
}

/// Final state of one conversion, shaped for the results panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CardOutcome {
    /// Base64 export string ready to copy.
    Converted { output: String },
    /// The image carries no `chara` field.
    NotFound { message: String },
    Failed {
        category: ErrorCategory,
        title: String,
        message: String,
        /// Raw error text for the "Technical Details" disclosure.
        details: String,
    },
}

impl CardOutcome {
    pub fn from_result(result: Result<Option<String>, CardError>) -> Self {
        match result {
            Ok(Some(output)) => Self::Converted { output },
            Ok(None) => Self::NotFound {
                message: NOT_FOUND_MESSAGE.into(),
            },
            Err(err) => Self::Failed {
                category: err.category(),
                title: err.title().into(),
                message: err.user_message().into(),
                details: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardBatchInput {
    /// Raw file bytes selected or dropped by the user.
    pub bytes: Vec<u8>,
    /// MIME type reported by the browser, if any.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Original file name, echoed back so the page can label results.
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CardBatchResult {
    pub file_name: String,
    pub outcome: CardOutcome,
}

/// Reads a whole byte source, mapping I/O failures to [`CardError::Read`].
pub fn read_card<R: Read>(mut reader: R) -> Result<Vec<u8>, CardError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Runs the whole pipeline on an image buffer.
///
/// `Ok(None)` means the image has no `chara` field, which is not an error.
pub fn convert_card(bytes: &[u8], options: &ExtractOptions) -> Result<Option<String>, CardError> {
    let metadata = extract_metadata(bytes, options);
    let Some(chara) = metadata.chara else {
        debug!(len = bytes.len(), "no chara field in image");
        return Ok(None);
    };
    let json = decode_payload(&chara)?;
    convert_card_json(&json).map(Some)
}

/// Maps already-decoded card JSON to the export string.
pub fn convert_card_json(input: &str) -> Result<String, CardError> {
    let card: Value =
        serde_json::from_str(input).map_err(|err| CardError::MalformedJson(err.to_string()))?;
    let source = SourcePersona::from_card(&card);
    encode_export(&map_persona(&source))
}

/// Converts each entry on its own so one broken file does not hide the rest.
pub fn convert_card_batch(entries: Vec<CardBatchInput>) -> Vec<CardBatchResult> {
    entries
        .into_iter()
        .map(|entry| {
            let file_name = entry
                .file_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BATCH_NAME.to_string());
            let options = ExtractOptions {
                mime_type: entry.mime_type,
            };
            let outcome = CardOutcome::from_result(convert_card(&entry.bytes, &options));
            CardBatchResult { file_name, outcome }
        })
        .collect()
}

#[wasm_bindgen]
pub fn extract_card_metadata(bytes: &[u8], mime_type: &str) -> Result<JsValue, JsValue> {
    let metadata = extract_metadata(bytes, &ExtractOptions::with_mime(mime_type));
    serde_wasm_bindgen::to_value(&metadata).map_err(|err| JsValue::from_str(&err.to_string()))
}

#[wasm_bindgen]
pub fn decode_card_payload(input: &str) -> Result<String, JsValue> {
    decode_payload(input).map_err(|err| JsValue::from_str(&err.to_string()))
}

#[wasm_bindgen]
pub fn convert_card_bytes(bytes: &[u8], mime_type: &str) -> Result<JsValue, JsValue> {
    let result = convert_card(bytes, &ExtractOptions::with_mime(mime_type));
    serde_wasm_bindgen::to_value(&CardOutcome::from_result(result))
        .map_err(|err| JsValue::from_str(&err.to_string()))
}

#[wasm_bindgen]
pub fn convert_card_json_text(input: &str) -> Result<String, JsValue> {
    convert_card_json(input).map_err(|err| JsValue::from_str(&err.to_string()))
}

#[wasm_bindgen]
pub fn convert_card_files(entries: JsValue) -> Result<JsValue, JsValue> {
    let entries: Vec<CardBatchInput> =
        serde_wasm_bindgen::from_value(entries).map_err(|err| JsValue::from_str(&err.to_string()))?;
    serde_wasm_bindgen::to_value(&convert_card_batch(entries))
        .map_err(|err| JsValue::from_str(&err.to_string()))
}

#[wasm_bindgen]
pub fn record_dropped_item(history_json: &str, content: &str, url: &str) -> Result<String, JsValue> {
    record_dropped_item_internal(history_json, content, url, now_utc())
        .map_err(|err| JsValue::from_str(&err))
}

fn record_dropped_item_internal(
    history_json: &str,
    content: &str,
    url: &str,
    at: DateTime<Utc>,
) -> Result<String, String> {
    let mut history = DropHistory::from_json(history_json).map_err(|err| err.to_string())?;
    history.push(DroppedItem::new(content, url, at));
    history.to_json().map_err(|err| err.to_string())
}

fn now_utc() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(Date::now() as i64).unwrap_or_default()
}
