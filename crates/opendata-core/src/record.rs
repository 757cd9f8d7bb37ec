//! Exportable record abstraction
//!
//! Every document type the portal can export implements [`Record`]. The
//! record's [`RecordKind`] is a static description of the type: its name, its
//! parent kind (if the type specializes another one) and the attribute names
//! readable through [`Record::attribute`]. Field resolution works against the
//! kind alone, so a header can be computed without looking at any record.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Record kinds
// ============================================================================

/// Static description of a record type.
#[derive(Debug)]
pub struct RecordKind {
    /// Kind name (e.g. "User").
    pub name: &'static str,
    /// Parent kind, for types that specialize another record type.
    pub parent: Option<&'static RecordKind>,
    /// Attribute names declared directly on this kind.
    pub attributes: &'static [&'static str],
}

impl RecordKind {
    /// Declare a root kind.
    pub const fn new(name: &'static str, attributes: &'static [&'static str]) -> Self {
        Self {
            name,
            parent: None,
            attributes,
        }
    }

    /// Declare a kind inheriting the attributes and metrics of `parent`.
    pub const fn extending(
        name: &'static str,
        parent: &'static RecordKind,
        attributes: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            parent: Some(parent),
            attributes,
        }
    }

    /// Iterate over this kind then each of its ancestors, nearest first.
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors { next: Some(self) }
    }

    /// Whether this kind, or one of its ancestors, declares `attribute`.
    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.ancestors()
            .any(|kind| kind.attributes.contains(&attribute))
    }

    /// Whether this kind is `other` or inherits from it.
    pub fn is_a(&self, other: &RecordKind) -> bool {
        self.ancestors().any(|kind| kind == other)
    }
}

impl PartialEq for RecordKind {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for RecordKind {}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Iterator returned by [`RecordKind::ancestors`].
pub struct Ancestors<'a> {
    next: Option<&'a RecordKind>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a RecordKind;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent;
        Some(current)
    }
}

// ============================================================================
// Values
// ============================================================================

/// A dynamically typed value read from a record.
///
/// Untagged: strings holding an RFC 3339 timestamp deserialize as
/// `DateTime`, every other string as `Text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    DateTime(DateTime<Utc>),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    /// Render the value as exported text.
    ///
    /// `Null` renders empty, lists are joined with `,`, floats keep at least
    /// one fractional digit and datetimes are RFC 3339 with second precision.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Text(s) => s.clone(),
            Value::List(items) => items
                .iter()
                .map(Value::to_text)
                .collect::<Vec<_>>()
                .join(","),
            Value::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    /// Integer view of a numeric value. Floats are truncated toward zero.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Float view of a numeric value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Format a float so integral values keep a `.0` suffix (`3.0`, not `3`).
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

// ============================================================================
// Records
// ============================================================================

/// A document that can be read by the export layer.
///
/// Implementations must not have side effects when read.
pub trait Record: Send + Sync + 'static {
    /// Static description of this record type.
    fn kind() -> &'static RecordKind
    where
        Self: Sized;

    /// Read a named attribute. `None` when the record has no such attribute.
    fn attribute(&self, name: &str) -> Option<Value>;

    /// Read a stored metric value by name.
    fn metric(&self, _name: &str) -> Option<Value> {
        None
    }
}
