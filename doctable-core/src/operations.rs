//! Document updates.
//!
//! An [`Update`] is either a partial document merged into every affected document, or a
//! transform that edits the document in place. This module also provides the common
//! field-level transforms:
//!
//! ```ignore
//! use doctable::operations::{increment, set};
//! use doctable::query::field;
//!
//! table.update(increment("visits"), &field("name").eq("home"))?;
//! table.update(set("visited", true), &field("visits").gt(100))?;
//! ```
//!
//! A transform that fails aborts the whole call: nothing is written.

use serde_json::{Number, Value};
use std::{fmt, sync::Arc};

use crate::{
    document::{Document, Fields},
    error::{DocumentStoreError, DocumentStoreResult},
};

/// An in-place edit of a document body.
pub type Transform = Arc<dyn Fn(&mut Fields) -> DocumentStoreResult<()> + Send + Sync>;

/// A change applied to every document an update selects.
#[derive(Clone)]
pub enum Update {
    /// Merge these fields into the document, replacing existing values.
    Fields(Value),
    /// Edit the document in place.
    Transform(Transform),
}

impl Update {
    /// Wraps a closure as an update.
    pub fn with<F>(transform: F) -> Self
    where
        F: Fn(&mut Fields) -> DocumentStoreResult<()> + Send + Sync + 'static,
    {
        Update::Transform(Arc::new(transform))
    }

    /// Checks that a field update actually holds a mapping.
    pub(crate) fn validate(&self) -> DocumentStoreResult<()> {
        match self {
            Update::Fields(Value::Object(_)) | Update::Transform(_) => Ok(()),
            Update::Fields(_) => Err(DocumentStoreError::InvalidDocument(
                "update fields are not a mapping".to_string(),
            )),
        }
    }

    pub(crate) fn apply(&self, document: &mut Fields) -> DocumentStoreResult<()> {
        match self {
            Update::Fields(Value::Object(fields)) => {
                document.extend(fields.iter().map(|(key, value)| (key.clone(), value.clone())));
                Ok(())
            }
            Update::Fields(_) => self.validate(),
            Update::Transform(transform) => transform(document),
        }
    }
}

impl fmt::Debug for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Update::Fields(fields) => f.debug_tuple("Fields").field(fields).finish(),
            Update::Transform(_) => f.write_str("Transform(..)"),
        }
    }
}

impl From<Value> for Update {
    fn from(fields: Value) -> Self {
        Update::Fields(fields)
    }
}

impl From<Fields> for Update {
    fn from(fields: Fields) -> Self {
        Update::Fields(Value::Object(fields))
    }
}

impl From<Document> for Update {
    fn from(document: Document) -> Self {
        Update::Fields(document.into_value())
    }
}

/// Removes `field` from the document.
///
/// Fails if the field is missing.
pub fn delete(field: impl Into<String>) -> Update {
    let field = field.into();
    Update::with(move |document| {
        document
            .remove(&field)
            .map(|_| ())
            .ok_or_else(|| missing(&field))
    })
}

/// Adds `n` to `field`.
///
/// Numbers are added arithmetically, strings are concatenated and arrays are
/// appended. Fails if the field is missing or holds a value of another kind.
pub fn add(field: impl Into<String>, n: impl Into<Value>) -> Update {
    let field = field.into();
    let n = n.into();
    Update::with(move |document| {
        let current = document.get_mut(&field).ok_or_else(|| missing(&field))?;
        let sum = match (&*current, &n) {
            (Value::Number(left), Value::Number(right)) => Value::Number(sum_numbers(left, right, 1)?),
            (Value::String(left), Value::String(right)) => Value::String(format!("{left}{right}")),
            (Value::Array(left), Value::Array(right)) => {
                Value::Array(left.iter().chain(right).cloned().collect())
            }
            (current, n) => {
                return Err(DocumentStoreError::Update(format!(
                    "cannot add {n} to {current} in field {field:?}"
                )));
            }
        };
        *current = sum;
        Ok(())
    })
}

/// Subtracts `n` from the numeric `field`.
pub fn subtract(field: impl Into<String>, n: impl Into<Value>) -> Update {
    let field = field.into();
    let n = n.into();
    Update::with(move |document| {
        let current = document.get_mut(&field).ok_or_else(|| missing(&field))?;
        let difference = match (&*current, &n) {
            (Value::Number(left), Value::Number(right)) => sum_numbers(left, right, -1)?,
            (current, n) => {
                return Err(DocumentStoreError::Update(format!(
                    "cannot subtract {n} from {current} in field {field:?}"
                )));
            }
        };
        *current = Value::Number(difference);
        Ok(())
    })
}

/// Sets `field` to `value`, creating it if needed.
pub fn set(field: impl Into<String>, value: impl Into<Value>) -> Update {
    let field = field.into();
    let value = value.into();
    Update::with(move |document| {
        document.insert(field.clone(), value.clone());
        Ok(())
    })
}

/// Increments the numeric `field` by one.
pub fn increment(field: impl Into<String>) -> Update {
    add(field, 1)
}

/// Decrements the numeric `field` by one.
pub fn decrement(field: impl Into<String>) -> Update {
    subtract(field, 1)
}

fn missing(field: &str) -> DocumentStoreError {
    DocumentStoreError::Update(format!("field {field:?} does not exist"))
}

/// `left + sign * right`, staying integral while both operands are integers.
fn sum_numbers(left: &Number, right: &Number, sign: i64) -> DocumentStoreResult<Number> {
    if let (Some(left), Some(right)) = (left.as_i64(), right.as_i64()) {
        if let Some(result) = right.checked_mul(sign).and_then(|right| left.checked_add(right)) {
            return Ok(Number::from(result));
        }
    }

    let (left, right) = (left.as_f64().unwrap_or(f64::NAN), right.as_f64().unwrap_or(f64::NAN));
    Number::from_f64(left + sign as f64 * right)
        .ok_or_else(|| DocumentStoreError::Update("arithmetic result is not a finite number".to_string()))
}
