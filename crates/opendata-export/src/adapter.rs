//! CSV adapters
//!
//! An [`AdapterConfig`] declares the columns exported for one record type:
//! static fields, handlers for bare names, an optional dynamic-fields hook and
//! whether registered metrics are appended. An [`Adapter`] binds a config to a
//! record source for one export and resolves the columns once, on first use.

use opendata_core::{MetricRegistry, Record, Value};
use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use crate::error::{ExportError, ExportResult};
use crate::field::{accessor_fn, resolve_field, AccessorFn, FieldDecl, FieldSpec};
use crate::metric_fields::metric_fields;

/// Hook returning extra declarations, appended after the static ones.
pub type DynamicFieldsFn<R> = Arc<dyn Fn() -> Vec<FieldDecl<R>> + Send + Sync>;

// ============================================================================
// Configuration
// ============================================================================

/// Column declarations for one record type.
pub struct AdapterConfig<R> {
    fields: Vec<FieldDecl<R>>,
    handlers: HashMap<String, AccessorFn<R>>,
    dynamic_fields: Option<DynamicFieldsFn<R>>,
    metric_fields: bool,
}

impl<R: Record> AdapterConfig<R> {
    /// Create a config from static field declarations.
    pub fn new<I, D>(fields: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<FieldDecl<R>>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            handlers: HashMap::new(),
            dynamic_fields: None,
            metric_fields: false,
        }
    }

    /// Append a static declaration.
    pub fn field(mut self, decl: impl Into<FieldDecl<R>>) -> Self {
        self.fields.push(decl.into());
        self
    }

    /// Register the handler used for the bare-name declaration `name`.
    pub fn handler<V, F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&R) -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        self.handlers.insert(name.into(), accessor_fn(f));
        self
    }

    /// Set the dynamic-fields hook, invoked when the columns are resolved.
    pub fn dynamic_fields<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> Vec<FieldDecl<R>> + Send + Sync + 'static,
    {
        self.dynamic_fields = Some(Arc::new(hook));
        self
    }

    /// Append one column per metric registered for the record kind.
    pub fn with_metric_fields(mut self) -> Self {
        self.metric_fields = true;
        self
    }

    /// Resolve every declaration: static, then dynamic, then metric fields.
    pub fn resolve(&self, metrics: &MetricRegistry) -> ExportResult<Vec<FieldSpec<R>>> {
        let kind = R::kind();

        let dynamic = self
            .dynamic_fields
            .as_ref()
            .map(|hook| hook())
            .unwrap_or_default();

        let mut specs = self
            .fields
            .iter()
            .cloned()
            .chain(dynamic)
            .map(|decl| resolve_field(decl, kind, &self.handlers))
            .collect::<ExportResult<Vec<_>>>()
            .map_err(|e| {
                warn!(kind = %kind, error = %e, "CSV field resolution failed");
                e
            })?;

        if self.metric_fields {
            specs.extend(metric_fields(metrics, kind));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = specs.iter().find(|spec| !seen.insert(spec.name())) {
            warn!(kind = %kind, field = %dup.name(), "Duplicate CSV field");
            return Err(ExportError::DuplicateField {
                field: dup.name().to_string(),
            });
        }

        debug!(kind = %kind, columns = specs.len(), "Resolved CSV fields");
        Ok(specs)
    }
}

impl<R> fmt::Debug for AdapterConfig<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterConfig")
            .field("fields", &self.fields)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("dynamic_fields", &self.dynamic_fields.is_some())
            .field("metric_fields", &self.metric_fields)
            .finish()
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// A config bound to the records of one export.
///
/// The adapter owns its record source and never copies or mutates records.
/// Columns are resolved on the first call to [`Adapter::header`] or
/// [`Adapter::rows`]; a resolution error is cached and returned unchanged on
/// every later call.
pub struct Adapter<R, S> {
    config: Arc<AdapterConfig<R>>,
    metrics: Arc<MetricRegistry>,
    records: S,
    fields: OnceLock<ExportResult<Arc<[FieldSpec<R>]>>>,
}

impl<R: Record, S> Adapter<R, S> {
    pub fn new(config: Arc<AdapterConfig<R>>, metrics: Arc<MetricRegistry>, records: S) -> Self {
        Self {
            config,
            metrics,
            records,
            fields: OnceLock::new(),
        }
    }

    /// Resolved columns, in output order.
    pub fn fields(&self) -> ExportResult<Arc<[FieldSpec<R>]>> {
        self.fields
            .get_or_init(|| self.config.resolve(&self.metrics).map(Arc::from))
            .clone()
    }

    /// Column names, in output order.
    pub fn header(&self) -> ExportResult<Vec<String>> {
        Ok(self
            .fields()?
            .iter()
            .map(|spec| spec.name().to_string())
            .collect())
    }

    /// Lazily produce one row per record, borrowing the source.
    pub fn rows<'a>(&'a self) -> ExportResult<Rows<R, <&'a S as IntoIterator>::IntoIter>>
    where
        &'a S: IntoIterator,
        <&'a S as IntoIterator>::Item: Borrow<R>,
    {
        Ok(Rows {
            fields: self.fields()?,
            records: (&self.records).into_iter(),
        })
    }

    /// Lazily produce one row per record, consuming the source.
    pub fn into_rows(self) -> ExportResult<Rows<R, S::IntoIter>>
    where
        S: IntoIterator,
        S::Item: Borrow<R>,
    {
        let fields = self.fields()?;
        Ok(Rows {
            fields,
            records: self.records.into_iter(),
        })
    }
}

/// Row iterator produced by an [`Adapter`].
pub struct Rows<R, I> {
    fields: Arc<[FieldSpec<R>]>,
    records: I,
}

impl<R, I> Rows<R, I> {
    /// Columns every row is built from.
    pub fn fields(&self) -> &[FieldSpec<R>] {
        &self.fields
    }
}

impl<R, I> Iterator for Rows<R, I>
where
    R: Record,
    I: Iterator,
    I::Item: Borrow<R>,
{
    type Item = Vec<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        let record: &R = record.borrow();
        Some(self.fields.iter().map(|spec| spec.text(record)).collect())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}
