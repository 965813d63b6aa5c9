//! Conversion of store-native documents into script-visible documents
//!
//! `id` and `accountId` must be opaque identifiers (rendered to hex) or text
//! that is already canonical (left as is). Anything else in those fields means
//! the store handed back something this runtime cannot interpret.

use serde_json::Value;

use super::document::{Document, FIELD_ACCOUNT_ID, FIELD_ID, RawDocument, StoreValue};
use super::error::InvalidIdentifierError;

/// Turn a store document into a plain document.
pub fn sanitize(raw: RawDocument) -> Result<Document, InvalidIdentifierError> {
    let mut doc = Document::new();
    for (key, value) in raw {
        let value = if key == FIELD_ID || key == FIELD_ACCOUNT_ID {
            identifier_text(&key, value)?
        } else {
            value.to_json()
        };
        doc.insert(key, value);
    }
    Ok(doc)
}

fn identifier_text(field: &str, value: StoreValue) -> Result<Value, InvalidIdentifierError> {
    match value {
        StoreValue::Id(id) => Ok(Value::String(id.to_hex())),
        StoreValue::Plain(Value::String(text)) => Ok(Value::String(text)),
        StoreValue::Plain(_) => Err(InvalidIdentifierError {
            field: field.to_string(),
        }),
    }
}
