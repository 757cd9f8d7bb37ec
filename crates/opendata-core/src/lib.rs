//! Core document model for the open-data portal
//!
//! - [`record`]: the [`Record`] trait every exportable document implements
//! - [`metrics`]: the per-kind metric registry
//! - [`user`]: user accounts and roles

pub mod error;
pub mod metrics;
pub mod record;
pub mod text;
pub mod user;

pub use error::{CoreError, CoreResult};
pub use metrics::{MetricDescriptor, MetricRegistry, MetricValueType};
pub use record::{format_float, Record, RecordKind, Value};
pub use user::{register_user_metrics, Role, User, UserId, USER_KIND};
