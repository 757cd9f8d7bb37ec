//! Fake records shared by the unit tests

use opendata_core::{MetricDescriptor, MetricRegistry, Record, RecordKind, Value};
use std::collections::BTreeMap;

pub static FAKE_KIND: RecordKind =
    RecordKind::new("Fake", &["title", "description", "tags", "other"]);

pub static SUB_FAKE_KIND: RecordKind = RecordKind::extending("SubFake", &FAKE_KIND, &[]);

#[derive(Debug, Clone)]
pub struct Fake {
    pub index: usize,
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub other: Vec<String>,
    pub metrics: BTreeMap<String, Value>,
}

impl Record for Fake {
    fn kind() -> &'static RecordKind {
        &FAKE_KIND
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "title" => Some(self.title.clone().into()),
            "description" => Some(self.description.clone().into()),
            "tags" => Some(self.tags.clone().into()),
            "other" => Some(self.other.clone().into()),
            _ => None,
        }
    }

    fn metric(&self, name: &str) -> Option<Value> {
        self.metrics.get(name).cloned()
    }
}

/// A record whose description needs CSV quoting.
pub fn fake(index: usize) -> Fake {
    Fake {
        index,
        title: format!("Title {index}"),
        description: Some(format!("A \"quoted\", multi-part\ndescription {index}")),
        tags: (0..=index % 3).map(|t| format!("tag{t}")).collect(),
        other: Vec::new(),
        metrics: BTreeMap::new(),
    }
}

pub fn fakes(n: usize) -> Vec<Fake> {
    (0..n).map(fake).collect()
}

/// Registry with one int and one float metric on [`FAKE_KIND`].
pub fn fake_metrics() -> MetricRegistry {
    let mut registry = MetricRegistry::new();
    registry
        .register(&FAKE_KIND, MetricDescriptor::int("fake-metric-int"))
        .register(&FAKE_KIND, MetricDescriptor::float("fake-metric-float"));
    registry
}
