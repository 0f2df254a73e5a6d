//! Per-account cursor codec.
//!
//! A connection persists one opaque pagination cursor per account, encoded
//! into a single string column. An older schema stored a single connection-wide
//! cursor; that form still round-trips through the codec as the legacy
//! variant and is consumed as a fallback until the first successful sync
//! rewrites the blob in per-account form.

use serde::Serialize;
use std::collections::BTreeMap;

/// Reserved key for the pre-multi-account single-cursor scheme.
pub const LEGACY_CURSOR_KEY: &str = "legacy";

/// Decoded form of a connection's transaction-cursor blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorMap {
    /// One cursor per account external id.
    PerAccount(BTreeMap<String, String>),
    /// A single cursor from the prior schema, serving any account lookup.
    Legacy(String),
}

impl CursorMap {
    /// Creates an empty per-account map.
    pub fn empty() -> Self {
        Self::PerAccount(BTreeMap::new())
    }

    /// Decodes a persisted cursor blob.
    ///
    /// `None` decodes to the empty map. A JSON object of string (or null,
    /// which is skipped) values decodes to the per-account form; anything
    /// else is carried whole as the legacy single cursor.
    pub fn decode(encoded: Option<&str>) -> Self {
        let Some(raw) = encoded else {
            return Self::empty();
        };

        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Object(object)) => {
                let mut entries = BTreeMap::new();
                for (key, value) in object {
                    match value {
                        serde_json::Value::String(cursor) => {
                            let _ = entries.insert(key, cursor);
                        }
                        serde_json::Value::Null => {}
                        _ => return Self::Legacy(raw.to_owned()),
                    }
                }
                Self::PerAccount(entries)
            }
            _ => Self::Legacy(raw.to_owned()),
        }
    }

    /// Looks up the cursor for an account: exact entry first, then the
    /// legacy entry, supporting gradual per-account migration.
    pub fn get(&self, key: &str) -> Option<&str> {
        match self {
            Self::PerAccount(entries) => entries
                .get(key)
                .or_else(|| entries.get(LEGACY_CURSOR_KEY))
                .map(String::as_str),
            Self::Legacy(cursor) => Some(cursor),
        }
    }

    /// Encodes back to the persisted form.
    ///
    /// The legacy entry and the legacy variant are dropped (the first
    /// successful sync completes the migration) and an empty table encodes
    /// to `None` - an empty blob is never persisted.
    pub fn encode(&self) -> Option<String> {
        match self {
            Self::PerAccount(entries) => {
                let live: BTreeMap<&str, &str> = entries
                    .iter()
                    .filter(|(key, _)| key.as_str() != LEGACY_CURSOR_KEY)
                    .map(|(key, cursor)| (key.as_str(), cursor.as_str()))
                    .collect();
                encode_table(&live)
            }
            Self::Legacy(_) => None,
        }
    }

    /// Encodes a freshly built cursor table, dropping the legacy key and
    /// null-valued entries; an empty result encodes to `None`.
    pub fn encode_entries(entries: &BTreeMap<String, Option<String>>) -> Option<String> {
        let live: BTreeMap<&str, &str> = entries
            .iter()
            .filter(|(key, _)| key.as_str() != LEGACY_CURSOR_KEY)
            .filter_map(|(key, cursor)| cursor.as_deref().map(|c| (key.as_str(), c)))
            .collect();
        encode_table(&live)
    }
}

impl Default for CursorMap {
    fn default() -> Self {
        Self::empty()
    }
}

/// Serializes a non-empty table to its stable string form. `BTreeMap`
/// iterates in key order, so equal tables always encode identically.
fn encode_table<V: Serialize>(table: &BTreeMap<&str, V>) -> Option<String> {
    if table.is_empty() {
        return None;
    }
    // Maps of string slices cannot fail to serialize.
    serde_json::to_string(table).ok()
}
