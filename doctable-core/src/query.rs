//! Query construction and evaluation.
//!
//! Queries are built in two steps. A [`Query`] accumulates a path into the document,
//! one field (or transform) at a time; applying a test to it, such as
//! [`eq`](Query::eq) or [`exists`](Query::exists), produces a [`QueryInstance`]: an
//! evaluable predicate that tables can run against every document they hold.
//!
//! ```ignore
//! use doctable::query::field;
//!
//! let adults = field("age").ge(18);
//! let named = field("name").matches(r"[A-Z]\w+")?;
//! let query = adults & (named | !field("address").field("city").exists());
//! ```
//!
//! # Evaluation
//!
//! Evaluating a predicate never fails. When the path cannot be followed (a missing key,
//! a non-object in the middle of the path, a transform that gives up) or the resolved
//! value has the wrong kind for the test, the document simply does not match.
//!
//! # Identity and caching
//!
//! Every instance carries a [`QueryIdentity`] computed when it is built. Two instances
//! with equal identities are equal and hash the same, which is what lets a table cache
//! query results. `a & b` and `b & a` share one identity, as do `a | b` and `b | a`.
//! Instances whose path contains a [`map`](Query::map) transform have no identity: the
//! transform is an arbitrary closure, so such instances are never cached.

use regex::Regex;
use serde_json::Value;
use std::{
    borrow::Cow,
    collections::BTreeSet,
    fmt,
    hash::{Hash, Hasher},
    ops::{BitAnd, BitOr, Not},
    sync::Arc,
};

use crate::{
    document::Fields,
    error::{DocumentStoreError, DocumentStoreResult},
    value::{compare_values, contains_value, values_equal, Frozen},
};

/// A user-supplied test over a resolved value and extra arguments.
pub type TestFn = fn(&Value, &[Value]) -> bool;

type Transform = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;
type Predicate = Arc<dyn Fn(&Fields) -> bool + Send + Sync>;

/// One step of a query path.
#[derive(Clone)]
pub enum PathSegment {
    /// Descend into the object field with this name.
    Key(String),
    /// Replace the current value with the transform's output.
    Map(Transform),
}

impl fmt::Debug for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{key:?}"),
            PathSegment::Map(_) => f.write_str("<map>"),
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CompareOp {
    /// Equal to.
    Eq,
    /// Not equal to.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Ge,
}

impl CompareOp {
    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    fn apply(self, left: &Value, right: &Value) -> bool {
        match self {
            CompareOp::Eq => values_equal(left, right),
            CompareOp::Ne => !values_equal(left, right),
            CompareOp::Lt => compare_values(left, right).is_some_and(|ordering| ordering.is_lt()),
            CompareOp::Le => compare_values(left, right).is_some_and(|ordering| ordering.is_le()),
            CompareOp::Gt => compare_values(left, right).is_some_and(|ordering| ordering.is_gt()),
            CompareOp::Ge => compare_values(left, right).is_some_and(|ordering| ordering.is_ge()),
        }
    }
}

/// How a regular expression is applied to a string value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PatternMode {
    /// The whole string must match.
    Matches,
    /// Any substring may match.
    Search,
}

/// Whether an element test must hold for some or for every element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Quantifier {
    /// At least one element.
    Any,
    /// Every element.
    All,
}

/// Identity of the element condition of [`Query::any`] and [`Query::all`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementsIdentity {
    /// Elements are tested with a query.
    Query(Box<QueryIdentity>),
    /// Elements are tested for membership in a fixed list.
    Values(Vec<Frozen>),
}

/// The stable identity of a cacheable [`QueryInstance`].
///
/// Identities are plain data: they are compared, hashed and ordered structurally, and
/// their [`Display`](fmt::Display) form is the query's textual representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryIdentity {
    /// Matches every document.
    Noop,
    /// The path resolves to a value.
    Exists { path: Vec<String> },
    /// The resolved value compares to `value` with `op`.
    Compare { path: Vec<String>, op: CompareOp, value: Frozen },
    /// The resolved string matches `pattern`.
    Pattern { path: Vec<String>, mode: PatternMode, pattern: String },
    /// A user function, identified by its address, accepts the resolved value.
    Test { path: Vec<String>, function: usize, args: Vec<Frozen> },
    /// Some or all elements of the resolved array satisfy a condition.
    Elements { path: Vec<String>, quantifier: Quantifier, condition: ElementsIdentity },
    /// The resolved value is one of `items`.
    OneOf { path: Vec<String>, items: Vec<Frozen> },
    /// The resolved object contains every entry of `fragment`.
    Fragment { path: Vec<String>, fragment: Frozen },
    /// Both operands match, whatever their order.
    And(BTreeSet<QueryIdentity>),
    /// Either operand matches, whatever their order.
    Or(BTreeSet<QueryIdentity>),
    /// The operand does not match.
    Not(Box<QueryIdentity>),
}

struct PathDisplay<'a>(&'a [String]);

impl fmt::Display for PathDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("$");
        }
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(key)?;
        }
        Ok(())
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    f.write_str("[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str("]")
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    operands: &BTreeSet<QueryIdentity>,
    separator: &str,
) -> fmt::Result {
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "({operand})")?;
    }
    Ok(())
}

impl fmt::Display for QueryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryIdentity::Noop => f.write_str("noop()"),
            QueryIdentity::Exists { path } => write!(f, "{}.exists()", PathDisplay(path)),
            QueryIdentity::Compare { path, op, value } => {
                write!(f, "{} {} {}", PathDisplay(path), op.symbol(), value)
            }
            QueryIdentity::Pattern { path, mode, pattern } => {
                let method = match mode {
                    PatternMode::Matches => "matches",
                    PatternMode::Search => "search",
                };
                write!(f, "{}.{method}({pattern:?})", PathDisplay(path))
            }
            QueryIdentity::Test { path, function, args } => {
                write!(f, "{}.test(fn@{function:#x}, ", PathDisplay(path))?;
                write_list(f, args)?;
                f.write_str(")")
            }
            QueryIdentity::Elements { path, quantifier, condition } => {
                let method = match quantifier {
                    Quantifier::Any => "any",
                    Quantifier::All => "all",
                };
                write!(f, "{}.{method}(", PathDisplay(path))?;
                match condition {
                    ElementsIdentity::Query(identity) => write!(f, "{identity}")?,
                    ElementsIdentity::Values(values) => write_list(f, values)?,
                }
                f.write_str(")")
            }
            QueryIdentity::OneOf { path, items } => {
                write!(f, "{}.one_of(", PathDisplay(path))?;
                write_list(f, items)?;
                f.write_str(")")
            }
            QueryIdentity::Fragment { path, fragment } => {
                write!(f, "{}.fragment({fragment})", PathDisplay(path))
            }
            QueryIdentity::And(operands) => write_joined(f, operands, " and "),
            QueryIdentity::Or(operands) => write_joined(f, operands, " or "),
            QueryIdentity::Not(operand) => write!(f, "not ({operand})"),
        }
    }
}

/// An evaluable predicate over documents.
///
/// Instances are cheap to clone and are combined with `&`, `|` and `!`:
///
/// ```ignore
/// let query = (field("a").eq(1) & field("b").gt(2)) | !field("c").exists();
/// assert!(query.evaluate(json!({"a": 1, "b": 3}).as_object().unwrap()));
/// ```
#[derive(Clone)]
pub struct QueryInstance {
    test: Predicate,
    identity: Option<QueryIdentity>,
}

impl QueryInstance {
    /// Creates an instance from a predicate and its identity.
    ///
    /// Pass `None` as the identity for predicates whose result may change between calls
    /// for the same document; such instances are never cached.
    pub fn new<F>(test: F, identity: Option<QueryIdentity>) -> Self
    where
        F: Fn(&Fields) -> bool + Send + Sync + 'static,
    {
        Self { test: Arc::new(test), identity }
    }

    /// Tests a document.
    pub fn evaluate(&self, document: &Fields) -> bool {
        (self.test)(document)
    }

    /// Tests an arbitrary JSON value. Values other than objects never match.
    pub fn evaluate_value(&self, value: &Value) -> bool {
        value.as_object().is_some_and(|document| self.evaluate(document))
    }

    /// Returns the identity of this instance, or `None` if it is not cacheable.
    pub fn identity(&self) -> Option<&QueryIdentity> {
        self.identity.as_ref()
    }

    /// Returns `true` if results of this instance may be cached.
    pub fn is_cacheable(&self) -> bool {
        self.identity.is_some()
    }

    /// Combines this instance with another using logical AND.
    ///
    /// `other` is only evaluated when this instance matches.
    pub fn and(self, other: QueryInstance) -> QueryInstance {
        let identity = combine(self.identity.clone(), other.identity.clone(), QueryIdentity::And);
        let (left, right) = (self.test, other.test);
        QueryInstance {
            test: Arc::new(move |document: &Fields| left(document) && right(document)),
            identity,
        }
    }

    /// Combines this instance with another using logical OR.
    ///
    /// `other` is only evaluated when this instance does not match.
    pub fn or(self, other: QueryInstance) -> QueryInstance {
        let identity = combine(self.identity.clone(), other.identity.clone(), QueryIdentity::Or);
        let (left, right) = (self.test, other.test);
        QueryInstance {
            test: Arc::new(move |document: &Fields| left(document) || right(document)),
            identity,
        }
    }

    /// Negates this instance.
    pub fn negate(self) -> QueryInstance {
        let identity = self.identity.map(|identity| QueryIdentity::Not(Box::new(identity)));
        let inner = self.test;
        QueryInstance {
            test: Arc::new(move |document: &Fields| !inner(document)),
            identity,
        }
    }
}

fn combine(
    left: Option<QueryIdentity>,
    right: Option<QueryIdentity>,
    wrap: fn(BTreeSet<QueryIdentity>) -> QueryIdentity,
) -> Option<QueryIdentity> {
    Some(wrap(BTreeSet::from([left?, right?])))
}

impl BitAnd for QueryInstance {
    type Output = QueryInstance;

    fn bitand(self, rhs: QueryInstance) -> QueryInstance {
        self.and(rhs)
    }
}

impl BitOr for QueryInstance {
    type Output = QueryInstance;

    fn bitor(self, rhs: QueryInstance) -> QueryInstance {
        self.or(rhs)
    }
}

impl Not for QueryInstance {
    type Output = QueryInstance;

    fn not(self) -> QueryInstance {
        self.negate()
    }
}

/// Instances are equal when both are cacheable and their identities are equal.
impl PartialEq for QueryInstance {
    fn eq(&self, other: &Self) -> bool {
        match (&self.identity, &other.identity) {
            (Some(left), Some(right)) => left == right,
            _ => false,
        }
    }
}

impl Hash for QueryInstance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

impl fmt::Debug for QueryInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identity {
            Some(identity) => write!(f, "QueryInstance({identity})"),
            None => f.write_str("QueryInstance(<uncacheable>)"),
        }
    }
}

impl fmt::Display for QueryInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identity {
            Some(identity) => write!(f, "{identity}"),
            None => f.write_str("<uncacheable>"),
        }
    }
}

/// The condition of [`Query::any`] and [`Query::all`].
#[derive(Debug, Clone)]
pub enum Elements {
    /// Test each element with a query; elements that are not objects never match.
    Query(QueryInstance),
    /// Test elements for membership in a fixed list.
    Values(Vec<Value>),
}

impl From<QueryInstance> for Elements {
    fn from(query: QueryInstance) -> Self {
        Elements::Query(query)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Elements {
    fn from(values: Vec<T>) -> Self {
        Elements::Values(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Elements {
    fn from(values: [T; N]) -> Self {
        Elements::Values(values.into_iter().map(Into::into).collect())
    }
}

/// A path into a document, waiting for a test.
///
/// Path accessors return a new `Query` and leave the receiver untouched, so a partial
/// path can be reused:
///
/// ```ignore
/// let address = field("address");
/// let query = address.field("city").eq("Paris") & address.field("zip").exists();
/// ```
///
/// An empty path designates the whole document. Only [`fragment`](Query::fragment) tests
/// it; every other condition built on an empty path matches nothing.
#[derive(Debug, Clone, Default)]
pub struct Query {
    path: Vec<PathSegment>,
}

/// Starts a query at the top-level field `key`.
pub fn field(key: impl Into<String>) -> Query {
    Query::new().field(key)
}

impl Query {
    /// Creates a query with an empty path.
    pub fn new() -> Self {
        Query { path: Vec::new() }
    }

    /// Returns the accumulated path.
    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }

    /// Extends the path with an object field.
    pub fn field(&self, key: impl Into<String>) -> Query {
        self.extend(PathSegment::Key(key.into()))
    }

    /// Extends the path with a transform of the current value.
    ///
    /// The transform returns `None` when it cannot handle its input, which makes the
    /// document not match. Instances built from a path with a transform are never
    /// cached.
    pub fn map<F>(&self, transform: F) -> Query
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        self.extend(PathSegment::Map(Arc::new(transform)))
    }

    fn extend(&self, segment: PathSegment) -> Query {
        let mut path = self.path.clone();
        path.push(segment);
        Query { path }
    }

    /// Evaluates the bare path: `true` if it resolves to a value.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::EmptyQuery`] when the path is empty, since a bare
    /// root query does not state any condition.
    pub fn evaluate(&self, document: &Fields) -> DocumentStoreResult<bool> {
        if self.path.is_empty() {
            return Err(DocumentStoreError::EmptyQuery);
        }
        Ok(resolve(&self.path, document).is_some())
    }

    /// Matches every document.
    pub fn noop() -> QueryInstance {
        QueryInstance::new(|_| true, Some(QueryIdentity::Noop))
    }

    /// Matches documents where the path resolves to any value.
    pub fn exists(&self) -> QueryInstance {
        let identity = self.identity(|path| QueryIdentity::Exists { path });
        self.generate(|_| true, identity)
    }

    /// Matches documents where the resolved value equals `value`.
    pub fn eq(&self, value: impl Into<Value>) -> QueryInstance {
        self.compare(CompareOp::Eq, value.into())
    }

    /// Matches documents where the resolved value differs from `value`.
    pub fn ne(&self, value: impl Into<Value>) -> QueryInstance {
        self.compare(CompareOp::Ne, value.into())
    }

    /// Matches documents where the resolved value is less than `value`.
    pub fn lt(&self, value: impl Into<Value>) -> QueryInstance {
        self.compare(CompareOp::Lt, value.into())
    }

    /// Matches documents where the resolved value is at most `value`.
    pub fn le(&self, value: impl Into<Value>) -> QueryInstance {
        self.compare(CompareOp::Le, value.into())
    }

    /// Matches documents where the resolved value is greater than `value`.
    pub fn gt(&self, value: impl Into<Value>) -> QueryInstance {
        self.compare(CompareOp::Gt, value.into())
    }

    /// Matches documents where the resolved value is at least `value`.
    pub fn ge(&self, value: impl Into<Value>) -> QueryInstance {
        self.compare(CompareOp::Ge, value.into())
    }

    fn compare(&self, op: CompareOp, value: Value) -> QueryInstance {
        let identity = self.identity(|path| QueryIdentity::Compare {
            path,
            op,
            value: Frozen::from(&value),
        });
        self.generate(move |resolved| op.apply(resolved, &value), identity)
    }

    /// Matches documents where the resolved value is a string matched entirely by
    /// `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidPattern`] if `pattern` does not compile.
    pub fn matches(&self, pattern: &str) -> DocumentStoreResult<QueryInstance> {
        self.pattern(PatternMode::Matches, pattern)
    }

    /// Matches documents where the resolved value is a string containing a match for
    /// `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidPattern`] if `pattern` does not compile.
    pub fn search(&self, pattern: &str) -> DocumentStoreResult<QueryInstance> {
        self.pattern(PatternMode::Search, pattern)
    }

    fn pattern(&self, mode: PatternMode, pattern: &str) -> DocumentStoreResult<QueryInstance> {
        let regex = match mode {
            PatternMode::Matches => Regex::new(&format!("^(?:{pattern})$"))?,
            PatternMode::Search => Regex::new(pattern)?,
        };
        let identity = self.identity(|path| QueryIdentity::Pattern {
            path,
            mode,
            pattern: pattern.to_string(),
        });
        Ok(self.generate(
            move |resolved| resolved.as_str().is_some_and(|text| regex.is_match(text)),
            identity,
        ))
    }

    /// Matches documents where `function` accepts the resolved value and `args`.
    ///
    /// The function is identified by its address, so two instances built from the
    /// same function and arguments share cached results. Keep `function` free of
    /// hidden state if that matters.
    pub fn test(&self, function: TestFn, args: Vec<Value>) -> QueryInstance {
        let identity = self.identity(|path| QueryIdentity::Test {
            path,
            function: function as usize,
            args: args.iter().map(Frozen::from).collect(),
        });
        self.generate(move |resolved| function(resolved, &args), identity)
    }

    /// Matches documents where the resolved value is an array with at least one
    /// element satisfying `condition`.
    ///
    /// With a query, each element is tested with it. With a list of values, an element
    /// satisfies the condition when it is one of the values.
    pub fn any(&self, condition: impl Into<Elements>) -> QueryInstance {
        self.elements(Quantifier::Any, condition.into())
    }

    /// Matches documents where the resolved value is an array and `condition` holds
    /// throughout it.
    ///
    /// With a query, every element must match it. With a list of values, every value
    /// must be contained in the array.
    pub fn all(&self, condition: impl Into<Elements>) -> QueryInstance {
        self.elements(Quantifier::All, condition.into())
    }

    fn elements(&self, quantifier: Quantifier, condition: Elements) -> QueryInstance {
        let condition_identity = match &condition {
            Elements::Query(query) => query
                .identity()
                .cloned()
                .map(|identity| ElementsIdentity::Query(Box::new(identity))),
            Elements::Values(values) => {
                Some(ElementsIdentity::Values(values.iter().map(Frozen::from).collect()))
            }
        };
        let identity = condition_identity.and_then(|condition| {
            self.identity(|path| QueryIdentity::Elements { path, quantifier, condition })
        });

        self.generate(
            move |resolved| {
                let Some(items) = resolved.as_array() else {
                    return false;
                };
                match (&condition, quantifier) {
                    (Elements::Query(query), Quantifier::Any) => {
                        items.iter().any(|item| query.evaluate_value(item))
                    }
                    (Elements::Query(query), Quantifier::All) => {
                        items.iter().all(|item| query.evaluate_value(item))
                    }
                    (Elements::Values(values), Quantifier::Any) => {
                        items.iter().any(|item| contains_value(values, item))
                    }
                    (Elements::Values(values), Quantifier::All) => {
                        values.iter().all(|value| contains_value(items, value))
                    }
                }
            },
            identity,
        )
    }

    /// Matches documents where the resolved value is one of `items`.
    pub fn one_of<T: Into<Value>>(&self, items: impl IntoIterator<Item = T>) -> QueryInstance {
        let items = items.into_iter().map(Into::into).collect::<Vec<Value>>();
        let identity = self.identity(|path| QueryIdentity::OneOf {
            path,
            items: items.iter().map(Frozen::from).collect(),
        });
        self.generate(move |resolved| contains_value(&items, resolved), identity)
    }

    /// Matches documents where the resolved value is an object containing every
    /// key of `fragment` with an equal value.
    ///
    /// On an empty path the whole document is tested. A `fragment` that is not an
    /// object matches nothing.
    pub fn fragment(&self, fragment: impl Into<Value>) -> QueryInstance {
        let fragment = fragment.into();
        let identity = self.identity(|path| QueryIdentity::Fragment {
            path,
            fragment: Frozen::from(&fragment),
        });
        self.build(
            move |resolved| match (resolved.as_object(), fragment.as_object()) {
                (Some(object), Some(fragment)) => fragment.iter().all(|(key, expected)| {
                    object.get(key).is_some_and(|actual| values_equal(actual, expected))
                }),
                _ => false,
            },
            identity,
            true,
        )
    }

    /// Builds an identity for this path, or `None` if the path holds a transform.
    fn identity(&self, build: impl FnOnce(Vec<String>) -> QueryIdentity) -> Option<QueryIdentity> {
        self.path
            .iter()
            .map(|segment| match segment {
                PathSegment::Key(key) => Some(key.clone()),
                PathSegment::Map(_) => None,
            })
            .collect::<Option<Vec<_>>>()
            .map(build)
    }

    fn generate<F>(&self, test: F, identity: Option<QueryIdentity>) -> QueryInstance
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.build(test, identity, false)
    }

    /// Wraps `test` into an instance. Unless `whole_document` is set, an empty path
    /// never matches.
    fn build<F>(&self, test: F, identity: Option<QueryIdentity>, whole_document: bool) -> QueryInstance
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        if self.path.is_empty() && !whole_document {
            return QueryInstance::new(|_| false, identity);
        }

        let path = self.path.clone();
        QueryInstance::new(
            move |document: &Fields| resolve(&path, document).is_some_and(|value| test(value.as_ref())),
            identity,
        )
    }
}

/// Follows `path` through `document`, stopping at the first step that cannot be taken.
fn resolve<'a>(path: &[PathSegment], document: &'a Fields) -> Option<Cow<'a, Value>> {
    let mut segments = path.iter();
    let mut current = match segments.next() {
        None => Cow::Owned(Value::Object(document.clone())),
        Some(PathSegment::Key(key)) => Cow::Borrowed(document.get(key)?),
        Some(PathSegment::Map(transform)) => Cow::Owned(transform(&Value::Object(document.clone()))?),
    };

    for segment in segments {
        current = match segment {
            PathSegment::Key(key) => match current {
                Cow::Borrowed(value) => Cow::Borrowed(value.as_object()?.get(key)?),
                Cow::Owned(Value::Object(mut object)) => Cow::Owned(object.remove(key)?),
                Cow::Owned(_) => return None,
            },
            PathSegment::Map(transform) => Cow::Owned(transform(current.as_ref())?),
        };
    }

    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::{
        collections::hash_map::DefaultHasher,
        sync::atomic::{AtomicUsize, Ordering},
    };

    fn doc(value: Value) -> Fields {
        match value {
            Value::Object(fields) => fields,
            _ => panic!("test document must be an object"),
        }
    }

    fn hash_of(query: &QueryInstance) -> u64 {
        let mut hasher = DefaultHasher::new();
        query.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_comparisons() {
        let d = doc(json!({"value": 5}));

        assert!(field("value").eq(5).evaluate(&d));
        assert!(field("value").eq(5.0).evaluate(&d));
        assert!(!field("value").ne(5).evaluate(&d));
        assert!(field("value").lt(6).evaluate(&d));
        assert!(field("value").le(5).evaluate(&d));
        assert!(field("value").gt(4).evaluate(&d));
        assert!(field("value").ge(5).evaluate(&d));
        assert!(!field("value").gt(5).evaluate(&d));
    }

    #[test]
    fn test_missing_path_and_type_mismatch_do_not_match() {
        let d = doc(json!({"value": "text", "nested": 1}));

        assert!(!field("missing").eq(1).evaluate(&d));
        assert!(!field("missing").ne(1).evaluate(&d));
        assert!(!field("value").lt(3).evaluate(&d));
        assert!(!field("nested").field("deeper").exists().evaluate(&d));
    }

    #[test]
    fn test_nested_path() {
        let d = doc(json!({"address": {"city": "Paris", "zip": "75001"}}));
        let address = field("address");

        assert!(address.field("city").eq("Paris").evaluate(&d));
        assert!(address.field("zip").exists().evaluate(&d));
        assert!(!address.field("street").exists().evaluate(&d));
        // The partial path is left untouched by extension
        assert_eq!(address.path().len(), 1);
    }

    #[test]
    fn test_bare_root_query_is_an_error() {
        let d = doc(json!({"a": 1}));

        assert!(matches!(Query::new().evaluate(&d), Err(DocumentStoreError::EmptyQuery)));
        assert!(field("a").evaluate(&d).unwrap());
        assert!(!field("b").evaluate(&d).unwrap());
    }

    #[test]
    fn test_matches_and_search() {
        let d = doc(json!({"name": "John Smith", "age": 20}));

        assert!(field("name").matches(r"John \w+").unwrap().evaluate(&d));
        assert!(!field("name").matches("John").unwrap().evaluate(&d));
        assert!(field("name").search("Smi").unwrap().evaluate(&d));
        assert!(!field("age").search("2").unwrap().evaluate(&d));
        assert!(matches!(field("name").matches("("), Err(DocumentStoreError::InvalidPattern(_))));
    }

    #[test]
    fn test_custom_test_function() {
        fn between(value: &Value, args: &[Value]) -> bool {
            match (value.as_i64(), args[0].as_i64(), args[1].as_i64()) {
                (Some(value), Some(low), Some(high)) => low <= value && value <= high,
                _ => false,
            }
        }

        let query = field("n").test(between, vec![json!(1), json!(10)]);

        assert!(query.evaluate(&doc(json!({"n": 5}))));
        assert!(!query.evaluate(&doc(json!({"n": 50}))));
        assert!(!query.evaluate(&doc(json!({"n": "5"}))));
        assert_eq!(query, field("n").test(between, vec![json!(1), json!(10)]));
        assert_ne!(query, field("n").test(between, vec![json!(1), json!(11)]));
    }

    #[test]
    fn test_any_and_all_with_query() {
        let d = doc(json!({"items": [{"tag": "a"}, {"tag": "b"}], "scalar": 1}));

        assert!(field("items").any(field("tag").eq("a")).evaluate(&d));
        assert!(!field("items").all(field("tag").eq("a")).evaluate(&d));
        assert!(field("items").all(field("tag").exists()).evaluate(&d));
        assert!(!field("scalar").any(field("tag").eq("a")).evaluate(&d));
    }

    #[test]
    fn test_any_and_all_with_values() {
        let d = doc(json!({"tags": ["a", "b", "c"]}));

        assert!(field("tags").any(["x", "b"]).evaluate(&d));
        assert!(!field("tags").any(["x", "y"]).evaluate(&d));
        assert!(field("tags").all(["a", "c"]).evaluate(&d));
        assert!(!field("tags").all(["a", "z"]).evaluate(&d));
        assert!(!field("missing").any(["a"]).evaluate(&d));
    }

    #[test]
    fn test_one_of() {
        let query = field("status").one_of(["active", "pending"]);

        assert!(query.evaluate(&doc(json!({"status": "active"}))));
        assert!(!query.evaluate(&doc(json!({"status": "closed"}))));
    }

    #[test]
    fn test_fragment() {
        let d = doc(json!({"a": 1, "b": {"c": 2, "d": 3}}));

        assert!(Query::new().fragment(json!({"a": 1})).evaluate(&d));
        assert!(!Query::new().fragment(json!({"a": 2})).evaluate(&d));
        assert!(field("b").fragment(json!({"c": 2})).evaluate(&d));
        assert!(!field("b").fragment(json!({"c": 2, "e": 4})).evaluate(&d));
        assert!(!field("a").fragment(json!({"c": 2})).evaluate(&d));
    }

    #[test]
    fn test_empty_path_only_supports_fragment() {
        let d = doc(json!({"a": 1}));

        assert!(!Query::new().ne(5).evaluate(&d));
        assert!(!Query::new().eq(json!({"a": 1})).evaluate(&d));
        assert!(!Query::new().exists().evaluate(&d));
        assert!(!Query::new().one_of([json!({"a": 1})]).evaluate(&d));
        assert!(Query::new().fragment(json!({"a": 1})).evaluate(&d));
    }

    #[test]
    fn test_map_is_uncacheable() {
        let d = doc(json!({"name": "ALICE"}));
        let query = field("name")
            .map(|value| value.as_str().map(|s| Value::from(s.to_lowercase())))
            .eq("alice");

        assert!(query.evaluate(&d));
        assert!(!query.is_cacheable());
        assert_ne!(query.clone(), query);
        assert!(!(query.clone() & field("name").exists()).is_cacheable());
        assert!(!(!query.clone()).is_cacheable());
        assert!(!field("list").any(query).is_cacheable());
    }

    #[test]
    fn test_map_failure_does_not_match() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let query = field("n")
            .map(move |value| {
                counter.fetch_add(1, Ordering::SeqCst);
                value.as_i64().map(|n| Value::from(n * 2))
            })
            .eq(4);

        assert!(query.evaluate(&doc(json!({"n": 2}))));
        assert!(!query.evaluate(&doc(json!({"n": "two"}))));
        assert!(!query.evaluate(&doc(json!({}))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_map_then_field() {
        let query = field("raw")
            .map(|value| value.as_str().and_then(|s| serde_json::from_str(s).ok()))
            .field("inner")
            .eq(1);

        assert!(query.evaluate(&doc(json!({"raw": "{\"inner\": 1}"}))));
        assert!(!query.evaluate(&doc(json!({"raw": "[1]"}))));
    }

    #[test]
    fn test_boolean_combinators() {
        let d = doc(json!({"a": 1, "b": 2}));

        assert!((field("a").eq(1) & field("b").eq(2)).evaluate(&d));
        assert!(!(field("a").eq(1) & field("b").eq(3)).evaluate(&d));
        assert!((field("a").eq(0) | field("b").eq(2)).evaluate(&d));
        assert!((!field("c").exists()).evaluate(&d));
        assert!(Query::noop().evaluate(&d));
    }

    #[test]
    fn test_and_or_short_circuit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let counted = QueryInstance::new(
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            },
            None,
        );
        let d = doc(json!({"a": 1}));

        assert!(!(field("a").eq(0) & counted.clone()).evaluate(&d));
        assert!((field("a").eq(1) | counted.clone()).evaluate(&d));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!((field("a").eq(1) & counted).evaluate(&d));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_identity_equality_and_hash() {
        let a = field("a").eq(1);
        let b = field("b").gt(2);

        assert_eq!(field("a").eq(1), a);
        assert_ne!(field("a").eq(2), a);
        assert_ne!(field("a").ne(1), a);
        assert_eq!(a.clone() & b.clone(), b.clone() & a.clone());
        assert_eq!(hash_of(&(a.clone() & b.clone())), hash_of(&(b.clone() & a.clone())));
        assert_eq!(a.clone() | b.clone(), b.clone() | a.clone());
        assert_ne!(a.clone() & b.clone(), a.clone() | b.clone());
        assert_eq!(!a.clone(), !field("a").eq(1));
    }

    #[test]
    fn test_display_is_deterministic() {
        let query = field("a").field("b").eq(1) & field("c").matches("x+").unwrap();

        assert_eq!(query.to_string(), query.clone().to_string());
        assert_eq!(field("a").field("b").eq(1).to_string(), "a.b == 1");
        assert_eq!((!field("x").exists()).to_string(), "not (x.exists())");
        assert_eq!(field("t").any(["a"]).to_string(), r#"t.any(["a"])"#);
        assert_eq!(format!("{:?}", field("n").one_of([1, 2])), "QueryInstance(n.one_of([1, 2]))");
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-c]{0,3}".prop_map(Value::from),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
                proptest::collection::btree_map("[a-c]", inner, 0..4)
                    .prop_map(|map| Value::Object(map.into_iter().collect())),
            ]
        })
    }

    fn sample_queries() -> Vec<QueryInstance> {
        vec![
            field("a").eq(1),
            field("a").field("b").lt("b"),
            field("b").ge(0),
            field("c").exists(),
            field("a").matches("a+").unwrap(),
            field("b").search("c").unwrap(),
            field("a").any(field("b").eq(true)),
            field("c").all([1, 2]),
            field("a").one_of([Value::Null]),
            Query::new().fragment(json!({"a": null})),
            field("b").fragment(json!({"c": "a"})),
            field("a").map(|value| value.as_array().map(|items| Value::from(items.len()))).gt(1),
        ]
    }

    proptest! {
        #[test]
        fn prop_evaluation_never_panics(document in proptest::collection::btree_map("[a-c]", arb_json(), 0..4)) {
            let document: Fields = document.into_iter().collect();
            for query in sample_queries() {
                let _ = query.evaluate(&document);
                let _ = (!query.clone()).evaluate(&document);
            }
        }

        #[test]
        fn prop_and_or_are_commutative(left in 0usize..11, right in 0usize..11) {
            let queries = sample_queries();
            let (a, b) = (queries[left].clone(), queries[right].clone());

            prop_assert_eq!(a.clone() & b.clone(), b.clone() & a.clone());
            prop_assert_eq!(hash_of(&(a.clone() & b.clone())), hash_of(&(b.clone() & a.clone())));
            prop_assert_eq!(a.clone() | b.clone(), b.clone() | a.clone());
            prop_assert_eq!(hash_of(&(a.clone() | b.clone())), hash_of(&(b | a)));
        }
    }
}
