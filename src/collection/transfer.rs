//! JSON import/export of the owned collection.
//!
//! The export format is exactly the persisted collection blob (a pretty-printed
//! JSON array of items), so an exported file can be imported on another
//! machine unchanged.

use super::{Item, ItemId};
use crate::errors::{FinderError, Result};
use serde_json::Value;
use std::collections::HashSet;

/// Serialize a collection for export. Refuses an empty collection.
pub fn export_items(items: &[Item]) -> Result<String> {
    if items.is_empty() {
        return Err(FinderError::EmptyCollection);
    }
    Ok(serde_json::to_string_pretty(items)?)
}

/// Parse an import payload into items.
///
/// Rejects malformed JSON, anything that is not an array, arrays containing
/// non-object elements, objects missing the required string fields, and
/// payloads that repeat an id.
pub fn parse_import(raw: &str) -> Result<Vec<Item>> {
    let value: Value = serde_json::from_str(raw.trim_start_matches('\0'))
        .map_err(|e| FinderError::ImportFormat(format!("not valid JSON: {}", e)))?;

    let elements = match value {
        Value::Array(elements) => elements,
        other => {
            return Err(FinderError::ImportFormat(format!(
                "expected an array of items, found {}",
                json_kind(&other)
            )))
        }
    };

    let mut items = Vec::with_capacity(elements.len());
    let mut seen = HashSet::with_capacity(elements.len());
    for (idx, element) in elements.into_iter().enumerate() {
        if !element.is_object() {
            return Err(FinderError::ImportFormat(format!(
                "element {} is {}, expected an object",
                idx,
                json_kind(&element)
            )));
        }
        let item: Item = serde_json::from_value(element)
            .map_err(|e| FinderError::ImportFormat(format!("element {}: {}", idx, e)))?;
        validate_duplicate(&mut seen, &item, idx)?;
        items.push(item);
    }
    Ok(items)
}

fn validate_duplicate(seen: &mut HashSet<ItemId>, item: &Item, idx: usize) -> Result<()> {
    if !seen.insert(item.id()) {
        return Err(FinderError::ImportFormat(format!(
            "element {} repeats id {}",
            idx,
            item.id()
        )));
    }
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
