//! Record format for the drop zone's recent-items list.
//!
//! The page keeps the list in extension storage; this module only shapes the
//! records and enforces the cap so every caller trims the same way.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Entries kept after a push; older ones are evicted first.
pub const MAX_DROPPED_ITEMS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedItem {
    /// Markup of the dropped element.
    pub content: String,
    /// ISO-8601 UTC with milliseconds, e.g. `2024-05-01T12:00:00.000Z`.
    pub timestamp: String,
    /// Page the element was dropped from.
    pub url: String,
}

impl DroppedItem {
    pub fn new(content: impl Into<String>, url: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            url: url.into(),
        }
    }
}

/// Oldest-first list of dropped items, serialized as a bare JSON array.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DropHistory {
    items: Vec<DroppedItem>,
}

impl DropHistory {
    /// Parses stored history. Blank input is an empty history; an oversized
    /// list is trimmed on load.
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        if input.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut history: Self = serde_json::from_str(input)?;
        history.trim();
        Ok(history)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn push(&mut self, item: DroppedItem) {
        self.items.push(item);
        self.trim();
    }

    pub fn items(&self) -> &[DroppedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn trim(&mut self) {
        if self.items.len() > MAX_DROPPED_ITEMS {
            let excess = self.items.len() - MAX_DROPPED_ITEMS;
            self.items.drain(..excess);
        }
    }
}
