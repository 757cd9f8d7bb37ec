//! Metric-derived columns
//!
//! Each metric registered for a record kind (or one of its ancestors) becomes
//! a `metric.<name>` column, in registration order.

use opendata_core::{MetricRegistry, Record, RecordKind, Value};
use std::sync::Arc;

use crate::field::FieldSpec;

/// Column name prefix for metric-derived fields.
pub const METRIC_PREFIX: &str = "metric.";

/// Synthesize one column per metric registered for `kind`.
///
/// Absent metric values read as `0`, formatted per the declared value type.
pub fn metric_fields<R: Record>(metrics: &MetricRegistry, kind: &RecordKind) -> Vec<FieldSpec<R>> {
    metrics
        .metrics_for(kind)
        .into_iter()
        .map(|descriptor| {
            let descriptor = descriptor.clone();
            let name = format!("{METRIC_PREFIX}{}", descriptor.name);
            FieldSpec::new(
                name,
                Arc::new(move |record: &R| {
                    Value::Text(descriptor.format(record.metric(&descriptor.name).as_ref()))
                }),
            )
        })
        .collect()
}
