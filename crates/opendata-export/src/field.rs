//! Field declarations and their resolution into output columns
//!
//! A column is declared as a [`FieldDecl`]: a bare attribute name, an alias of
//! another attribute, or a computed value. Declarations are resolved against
//! the record kind and the adapter's handler table into [`FieldSpec`]s, each
//! holding a single uniform accessor function.

use opendata_core::{Record, RecordKind, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ExportError, ExportResult};

/// Uniform accessor reading one column value from a record.
pub type AccessorFn<R> = Arc<dyn Fn(&R) -> Value + Send + Sync>;

/// Wrap a closure returning anything convertible to [`Value`].
pub fn accessor_fn<R, V, F>(f: F) -> AccessorFn<R>
where
    F: Fn(&R) -> V + Send + Sync + 'static,
    V: Into<Value>,
{
    Arc::new(move |record: &R| f(record).into())
}

// ============================================================================
// Declarations
// ============================================================================

/// One declared output column.
pub enum FieldDecl<R> {
    /// Bare name: a registered handler of that name, or else the attribute
    /// of that name.
    Name(String),
    /// Column `name` reads attribute `target`.
    Alias { name: String, target: String },
    /// Column `name` is computed from the record.
    Computed { name: String, accessor: AccessorFn<R> },
}

impl<R> FieldDecl<R> {
    pub fn name(name: impl Into<String>) -> Self {
        FieldDecl::Name(name.into())
    }

    pub fn alias(name: impl Into<String>, target: impl Into<String>) -> Self {
        FieldDecl::Alias {
            name: name.into(),
            target: target.into(),
        }
    }

    pub fn computed<V, F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&R) -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        FieldDecl::Computed {
            name: name.into(),
            accessor: accessor_fn(f),
        }
    }

    /// Output column name of this declaration.
    pub fn column(&self) -> &str {
        match self {
            FieldDecl::Name(name) => name,
            FieldDecl::Alias { name, .. } | FieldDecl::Computed { name, .. } => name,
        }
    }
}

impl<R> Clone for FieldDecl<R> {
    fn clone(&self) -> Self {
        match self {
            FieldDecl::Name(name) => FieldDecl::Name(name.clone()),
            FieldDecl::Alias { name, target } => FieldDecl::Alias {
                name: name.clone(),
                target: target.clone(),
            },
            FieldDecl::Computed { name, accessor } => FieldDecl::Computed {
                name: name.clone(),
                accessor: Arc::clone(accessor),
            },
        }
    }
}

impl<R> fmt::Debug for FieldDecl<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldDecl::Name(name) => f.debug_tuple("Name").field(name).finish(),
            FieldDecl::Alias { name, target } => f
                .debug_struct("Alias")
                .field("name", name)
                .field("target", target)
                .finish(),
            FieldDecl::Computed { name, .. } => {
                f.debug_struct("Computed").field("name", name).finish_non_exhaustive()
            }
        }
    }
}

impl<R> From<&str> for FieldDecl<R> {
    fn from(name: &str) -> Self {
        FieldDecl::name(name)
    }
}

impl<R> From<String> for FieldDecl<R> {
    fn from(name: String) -> Self {
        FieldDecl::Name(name)
    }
}

/// `(name, target)` pairs declare aliases.
impl<R> From<(&str, &str)> for FieldDecl<R> {
    fn from((name, target): (&str, &str)) -> Self {
        FieldDecl::alias(name, target)
    }
}

// ============================================================================
// Accessors
// ============================================================================

/// How a resolved column reads its value.
pub enum Accessor<R> {
    /// Attribute lookup by the column's own name.
    Attribute(String),
    /// Attribute lookup by another attribute's name.
    Alias(String),
    /// Handler registered on the adapter for this column name.
    Handler(AccessorFn<R>),
    /// Computed declaration.
    Computed(AccessorFn<R>),
}

impl<R: Record> Accessor<R> {
    /// Collapse the accessor into a single function.
    pub fn into_fn(self) -> AccessorFn<R> {
        match self {
            Accessor::Attribute(attribute) | Accessor::Alias(attribute) => {
                Arc::new(move |record: &R| record.attribute(&attribute).unwrap_or(Value::Null))
            }
            Accessor::Handler(f) | Accessor::Computed(f) => f,
        }
    }
}

/// A resolved output column.
pub struct FieldSpec<R> {
    name: String,
    accessor: AccessorFn<R>,
}

impl<R> FieldSpec<R> {
    pub fn new(name: impl Into<String>, accessor: AccessorFn<R>) -> Self {
        Self {
            name: name.into(),
            accessor,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read this column's value from `record`.
    pub fn value(&self, record: &R) -> Value {
        (self.accessor)(record)
    }

    /// Read this column's value from `record` as exported text.
    pub fn text(&self, record: &R) -> String {
        self.value(record).to_text()
    }
}

impl<R> Clone for FieldSpec<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            accessor: Arc::clone(&self.accessor),
        }
    }
}

impl<R> fmt::Debug for FieldSpec<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Resolve one declaration against the record kind and handler table.
///
/// Handlers take precedence over attributes for bare names.
pub fn resolve_field<R: Record>(
    decl: FieldDecl<R>,
    kind: &'static RecordKind,
    handlers: &HashMap<String, AccessorFn<R>>,
) -> ExportResult<FieldSpec<R>> {
    let (name, accessor) = match decl {
        FieldDecl::Name(name) => {
            let accessor = if let Some(handler) = handlers.get(&name) {
                Accessor::Handler(Arc::clone(handler))
            } else if kind.has_attribute(&name) {
                Accessor::Attribute(name.clone())
            } else {
                return Err(ExportError::UnresolvedField {
                    kind: kind.name,
                    field: name,
                });
            };
            (name, accessor)
        }
        FieldDecl::Alias { name, target } => {
            if !kind.has_attribute(&target) {
                return Err(ExportError::UnresolvedField {
                    kind: kind.name,
                    field: target,
                });
            }
            (name, Accessor::Alias(target))
        }
        FieldDecl::Computed { name, accessor } => (name, Accessor::Computed(accessor)),
    };

    Ok(FieldSpec::new(name, accessor.into_fn()))
}
