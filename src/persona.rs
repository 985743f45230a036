//! Remaps a decoded character card into the export schema.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CardError;
use crate::repair::is_base64_char;

const GREETING_SEPARATOR: &str = "\n\n";
const STRIPPED_MARKERS: [&str; 2] = ["<START>", "<END>"];

/// Persona fields read from a card. A missing text field, or one of another
/// type, falls back to `""`; numbers and booleans are not stringified, so
/// `"name": 42` exports as an empty name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePersona {
    /// `name`, default `""`
    pub name: String,
    /// `description`, default `""`
    pub description: String,
    /// `scenario`, default `""`
    pub scenario: String,
    /// `first_mes`, default `""`
    pub first_mes: String,
    /// `creator_notes`, default `""`
    pub creator_notes: String,
    /// `tags` exactly as stored in the card, default `[]`
    pub tags: Value,
}

impl Default for SourcePersona {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            scenario: String::new(),
            first_mes: String::new(),
            creator_notes: String::new(),
            tags: Value::Array(Vec::new()),
        }
    }
}

fn get_str(obj: &Map<String, Value>, key: &str, default: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

fn get_raw(obj: &Map<String, Value>, key: &str, default: Value) -> Value {
    obj.get(key).cloned().unwrap_or(default)
}

impl SourcePersona {
    /// Reads the persona fields straight off an object. Non-objects give the
    /// all-default persona.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };
        Self {
            name: get_str(obj, "name", ""),
            description: get_str(obj, "description", ""),
            scenario: get_str(obj, "scenario", ""),
            first_mes: get_str(obj, "first_mes", ""),
            creator_notes: get_str(obj, "creator_notes", ""),
            tags: get_raw(obj, "tags", Value::Array(Vec::new())),
        }
    }

    /// Reads a whole card: V2 cards keep the persona under `data`, V1 cards
    /// at the top level.
    pub fn from_card(card: &Value) -> Self {
        match card.get("data") {
            Some(data) if data.is_object() => Self::from_value(data),
            _ => Self::from_value(card),
        }
    }
}

/// Export-side persona. Field order is the serialized order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetPersona {
    pub name: String,
    pub sys_pmt: String,
    pub greeting: String,
    pub description: String,
    pub tags: Value,
}

/// Builds the export persona.
///
/// The greeting is `scenario`, a blank line, `first_mes` without its
/// `<START>`/`<END>` markers, then `creator_notes` with no separator.
///
/// ```
/// use card_core::persona::{map_persona, SourcePersona};
/// let source = SourcePersona {
///     name: "A".into(),
///     scenario: "S".into(),
///     first_mes: "<START>Hi<END>".into(),
///     creator_notes: "N".into(),
///     ..SourcePersona::default()
/// };
/// assert_eq!(map_persona(&source).greeting, "S\n\nHiN");
/// ```
pub fn map_persona(source: &SourcePersona) -> TargetPersona {
    let first_mes = STRIPPED_MARKERS
        .iter()
        .fold(source.first_mes.clone(), |text, marker| text.replace(*marker, ""));
    let mut greeting = String::with_capacity(
        source.scenario.len()
            + GREETING_SEPARATOR.len()
            + first_mes.len()
            + source.creator_notes.len(),
    );
    greeting.push_str(&source.scenario);
    greeting.push_str(GREETING_SEPARATOR);
    greeting.push_str(&first_mes);
    greeting.push_str(&source.creator_notes);

    TargetPersona {
        name: source.name.clone(),
        sys_pmt: source.description.clone(),
        greeting,
        description: source.creator_notes.clone(),
        tags: source.tags.clone(),
    }
}

/// Serializes the persona, keeps only `A-Za-z0-9+/=` of the JSON text and
/// base64-encodes what is left. Punctuation, whitespace escapes and non-Latin
/// text are dropped; the importer only accepts that alphabet.
pub fn encode_export(target: &TargetPersona) -> Result<String, CardError> {
    let json = serde_json::to_string(target).map_err(|err| CardError::Export(err.to_string()))?;
    let filtered: String = json.chars().filter(|ch| is_base64_char(*ch)).collect();
    Ok(STANDARD.encode(filtered))
}
