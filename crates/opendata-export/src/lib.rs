//! CSV export layer for the open-data portal
//!
//! Turns collections of [`opendata_core::Record`]s into CSV attachments:
//!
//! - [`field`]: column declarations and their resolution
//! - [`adapter`]: per-type adapter configs bound to a record source
//! - [`metric_fields`]: `metric.<name>` columns from the metric registry
//! - [`registry`]: default adapter per record type
//! - [`stream`]: chunked CSV encoding and attachment naming
//! - [`users`]: the default user export

pub mod adapter;
pub mod error;
pub mod field;
pub mod metric_fields;
pub mod registry;
pub mod stream;
pub mod users;

#[cfg(test)]
mod testing;

pub use adapter::{Adapter, AdapterConfig, Rows};
pub use error::{ExportError, ExportResult};
pub use field::{FieldDecl, FieldSpec};
pub use metric_fields::METRIC_PREFIX;
pub use registry::AdapterRegistry;
pub use stream::{
    export_filename, CsvChunks, CsvExport, Cursor, ExportSource, Streamer, CSV_CONTENT_TYPE,
    DEFAULT_BASENAME,
};
pub use users::{register_user_exports, user_adapter};
