//! Default adapter registry
//!
//! Maps each record type to at most one default [`AdapterConfig`]. The
//! registry is populated during startup and shared read-only afterwards.

use opendata_core::{Record, RecordKind};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::adapter::AdapterConfig;
use crate::error::{ExportError, ExportResult};

struct RegisteredAdapter {
    kind: &'static RecordKind,
    config: Arc<dyn Any + Send + Sync>,
}

/// Record type -> default adapter configuration.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<TypeId, RegisteredAdapter>,
}

impl AdapterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the default adapter for `R`, replacing any earlier one.
    pub fn register<R: Record>(&mut self, config: AdapterConfig<R>) -> &mut Self {
        let kind = R::kind();
        let previous = self.adapters.insert(
            TypeId::of::<R>(),
            RegisteredAdapter {
                kind,
                config: Arc::new(config),
            },
        );

        if previous.is_some() {
            info!(kind = %kind, "Replaced default CSV adapter");
        } else {
            debug!(kind = %kind, "Registered default CSV adapter");
        }
        self
    }

    /// Default adapter configuration for `R`.
    pub fn lookup<R: Record>(&self) -> ExportResult<Arc<AdapterConfig<R>>> {
        self.adapters
            .get(&TypeId::of::<R>())
            .and_then(|entry| Arc::clone(&entry.config).downcast::<AdapterConfig<R>>().ok())
            .ok_or(ExportError::AdapterNotRegistered {
                kind: R::kind().name,
            })
    }

    pub fn is_registered<R: Record>(&self) -> bool {
        self.adapters.contains_key(&TypeId::of::<R>())
    }

    /// Names of the kinds with a registered adapter, sorted.
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.adapters.values().map(|e| e.kind.name).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
