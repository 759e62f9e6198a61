//! Error types and result types for document store operations.
//!
//! Every fallible operation in this crate returns [`DocumentStoreResult<T>`]. Errors are
//! reported synchronously to the caller; predicate evaluation never produces one (a
//! document that cannot be tested simply does not match).

use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::document::DocId;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting documents to or from JSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The value handed to an insert is not a JSON object.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// A document with the given ID already exists in the table.
    /// The first argument is the document ID, the second is the table name.
    #[error("Document {0} already exists in table {1}")]
    DocumentAlreadyExists(DocId, String),
    /// A key read from storage could not be interpreted as a document ID.
    /// The first argument is the raw key, the second is the table name.
    #[error("Invalid document id {0:?} in table {1}")]
    InvalidDocumentId(String, String),
    /// The table already holds the largest possible document ID, so no new one can be
    /// allocated. The argument is the table name.
    #[error("No document id left to allocate in table {0}")]
    IdExhausted(String),
    /// An operation that needs either a document ID or a query got neither.
    #[error("Missing selector: {0}")]
    MissingSelector(&'static str),
    /// A root query without a path or condition was evaluated.
    #[error("Empty query evaluated")]
    EmptyQuery,
    /// A regular expression handed to the query builder failed to compile.
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    /// An update transform could not be applied to a document.
    #[error("Update error: {0}")]
    Update(String),
    /// An error occurred in the underlying storage adapter.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<regex::Error> for DocumentStoreError {
    fn from(err: regex::Error) -> Self {
        DocumentStoreError::InvalidPattern(err.to_string())
    }
}
