//! Metric registry
//!
//! Metrics are named numeric values stored on records (dataset counts,
//! follower counts, ...). Each metric is registered once against a record
//! kind at startup; the registry is read-only afterwards.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::record::{format_float, RecordKind, Value};

/// Declared value type of a metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricValueType {
    #[default]
    Int,
    Float,
}

/// A metric registered against a record kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDescriptor {
    /// Metric name (e.g. "datasets")
    pub name: String,
    /// Declared value type
    #[serde(default)]
    pub value_type: MetricValueType,
}

impl MetricDescriptor {
    /// Integer-valued metric
    pub fn int(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_type: MetricValueType::Int,
        }
    }

    /// Float-valued metric
    pub fn float(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_type: MetricValueType::Float,
        }
    }

    /// Render a stored value per the declared type, `0` when absent.
    pub fn format(&self, value: Option<&Value>) -> String {
        match self.value_type {
            MetricValueType::Int => value
                .and_then(Value::as_i64)
                .unwrap_or(0)
                .to_string(),
            MetricValueType::Float => format_float(value.and_then(Value::as_f64).unwrap_or(0.0)),
        }
    }
}

#[derive(Debug, Clone)]
struct MetricEntry {
    kind: &'static RecordKind,
    descriptor: MetricDescriptor,
}

/// Registry of metrics per record kind, in registration order.
#[derive(Debug, Clone, Default)]
pub struct MetricRegistry {
    entries: Vec<MetricEntry>,
}

impl MetricRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a metric against `kind`.
    ///
    /// Registering the same name twice for one kind keeps the first
    /// registration.
    pub fn register(
        &mut self,
        kind: &'static RecordKind,
        descriptor: MetricDescriptor,
    ) -> &mut Self {
        let duplicate = self
            .entries
            .iter()
            .any(|e| e.kind == kind && e.descriptor.name == descriptor.name);

        if duplicate {
            warn!(kind = %kind, metric = %descriptor.name, "Metric already registered, ignoring");
        } else {
            debug!(kind = %kind, metric = %descriptor.name, "Registered metric");
            self.entries.push(MetricEntry { kind, descriptor });
        }
        self
    }

    /// Metrics registered against `kind` or any of its ancestors, in
    /// registration order.
    pub fn metrics_for(&self, kind: &RecordKind) -> Vec<&MetricDescriptor> {
        self.entries
            .iter()
            .filter(|e| kind.is_a(e.kind))
            .map(|e| &e.descriptor)
            .collect()
    }

    /// Total number of registered metrics, across kinds.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
