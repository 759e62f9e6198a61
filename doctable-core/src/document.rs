//! Documents and document identifiers.
//!
//! A stored document is a JSON object plus an integer ID. The ID is metadata: it is
//! never written into the document body, and comparing a [`Document`] with a plain
//! JSON value ignores it.

use serde_json::{Map, Value};
use std::ops::{Deref, DerefMut};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Identifier of a document within its table.
///
/// IDs are positive and allocated in increasing order. At the storage boundary they
/// are represented by their decimal string form.
pub type DocId = u64;

/// The body of a document: a string-keyed mapping of JSON values.
pub type Fields = Map<String, Value>;

/// A document read from a table, tagged with its ID.
///
/// `Document` dereferences to its [`Fields`], so field access works like on a plain
/// JSON object:
///
/// ```ignore
/// let doc = table.get_by_id(1)?.unwrap();
/// assert_eq!(doc["name"], "Alice");
/// assert_eq!(doc.doc_id(), 1);
/// ```
///
/// A `Document` can also be handed back to [`Table::insert`](crate::table::Table::insert)
/// or [`Table::upsert`](crate::table::Table::upsert) to address an explicit ID.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    doc_id: DocId,
    fields: Fields,
}

impl Document {
    /// Creates a document from a JSON value and an explicit ID.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if `doc_id` is `0` or `value` is
    /// not a JSON object.
    pub fn new(value: impl Into<Value>, doc_id: DocId) -> DocumentStoreResult<Self> {
        if doc_id == 0 {
            return Err(DocumentStoreError::InvalidDocument("document ids start at 1".to_string()));
        }
        Ok(Self::from_parts(doc_id, into_fields(value.into())?))
    }

    /// Creates a document from an already validated body and ID.
    pub(crate) fn from_parts(doc_id: DocId, fields: Fields) -> Self {
        Self { doc_id, fields }
    }

    /// Returns the document ID.
    pub fn doc_id(&self) -> DocId {
        self.doc_id
    }

    /// Returns the document body.
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Consumes the document, returning its body.
    pub fn into_fields(self) -> Fields {
        self.fields
    }

    /// Consumes the document, returning its body as a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl Deref for Document {
    type Target = Fields;

    fn deref(&self) -> &Self::Target {
        &self.fields
    }
}

impl DerefMut for Document {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.fields
    }
}

impl PartialEq<Value> for Document {
    fn eq(&self, other: &Value) -> bool {
        other.as_object() == Some(&self.fields)
    }
}

impl PartialEq<Document> for Value {
    fn eq(&self, other: &Document) -> bool {
        other == self
    }
}

impl From<Document> for Value {
    fn from(document: Document) -> Self {
        document.into_value()
    }
}

/// A document handed to an insert: either a plain body, which receives the next free
/// ID, or a [`Document`] that carries its own ID.
#[derive(Debug, Clone)]
pub enum NewDocument {
    /// A body without an ID.
    Untagged(Value),
    /// A body with an explicit ID.
    Tagged(Document),
}

impl From<Value> for NewDocument {
    fn from(value: Value) -> Self {
        NewDocument::Untagged(value)
    }
}

impl From<Fields> for NewDocument {
    fn from(fields: Fields) -> Self {
        NewDocument::Untagged(Value::Object(fields))
    }
}

impl From<Document> for NewDocument {
    fn from(document: Document) -> Self {
        NewDocument::Tagged(document)
    }
}

/// Unwraps a JSON object, rejecting every other kind of value.
pub(crate) fn into_fields(value: Value) -> DocumentStoreResult<Fields> {
    match value {
        Value::Object(fields) => Ok(fields),
        _ => Err(DocumentStoreError::InvalidDocument("document is not a mapping".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_rejects_non_mapping() {
        let err = Document::new(json!([1, 2, 3]), 1).unwrap_err();
        assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));
    }

    #[test]
    fn test_new_rejects_zero_id() {
        let err = Document::new(json!({}), 0).unwrap_err();
        assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));
    }

    #[test]
    fn test_equality_ignores_id() {
        let doc = Document::new(json!({"name": "a"}), 7).unwrap();

        assert_eq!(doc, json!({"name": "a"}));
        assert_eq!(json!({"name": "a"}), doc);
        assert_ne!(doc, json!({"name": "b"}));
        assert_eq!(doc.doc_id(), 7);
    }

    #[test]
    fn test_deref_to_fields() {
        let mut doc = Document::new(json!({"count": 1}), 1).unwrap();
        doc.insert("extra".to_string(), json!(true));

        assert_eq!(doc["count"], 1);
        assert_eq!(doc.into_value(), json!({"count": 1, "extra": true}));
    }
}
