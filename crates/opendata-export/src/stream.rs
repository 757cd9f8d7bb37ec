//! CSV streaming
//!
//! The [`Streamer`] turns an export source into a [`CsvExport`]: a
//! timestamped attachment filename plus a lazy iterator of encoded chunks.
//! The header chunk comes first, then one chunk per record. A row is only
//! computed when the consumer asks for the next chunk, so memory use does
//! not grow with the number of records.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use opendata_core::{MetricRegistry, Record};
use std::borrow::Borrow;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::adapter::{Adapter, Rows};
use crate::error::{ExportError, ExportResult};
use crate::registry::AdapterRegistry;

/// Basename used when the caller does not provide one.
pub const DEFAULT_BASENAME: &str = "export";

/// Content type of every CSV export.
pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

/// `<basename>-<YYYY-MM-DD-HH-MM>.csv`, UTC, minute precision.
pub fn export_filename(basename: &str, now: DateTime<Utc>) -> String {
    format!("{basename}-{}.csv", now.format("%Y-%m-%d-%H-%M"))
}

// ============================================================================
// Sources
// ============================================================================

/// A lazily iterated record cursor, consumed once by the export.
#[derive(Debug, Clone)]
pub struct Cursor<I>(pub I);

/// Anything that can be exported: an explicit [`Adapter`], an in-memory
/// `Vec` of records or a [`Cursor`]. Sources without an adapter use the
/// record type's default adapter from the registry.
pub trait ExportSource {
    type Record: Record;
    type Records: IntoIterator;

    fn into_adapter(
        self,
        streamer: &Streamer,
    ) -> ExportResult<Adapter<Self::Record, Self::Records>>;
}

impl<R: Record, S: IntoIterator> ExportSource for Adapter<R, S> {
    type Record = R;
    type Records = S;

    fn into_adapter(self, _streamer: &Streamer) -> ExportResult<Adapter<R, S>> {
        Ok(self)
    }
}

impl<R: Record> ExportSource for Vec<R> {
    type Record = R;
    type Records = Vec<R>;

    fn into_adapter(self, streamer: &Streamer) -> ExportResult<Adapter<R, Vec<R>>> {
        streamer.adapter(self)
    }
}

impl<I> ExportSource for Cursor<I>
where
    I: Iterator,
    I::Item: Record,
{
    type Record = I::Item;
    type Records = I;

    fn into_adapter(self, streamer: &Streamer) -> ExportResult<Adapter<I::Item, I>> {
        streamer.adapter(self.0)
    }
}

/// Row iterator produced for a given source.
pub type SourceRows<Src> = Rows<
    <Src as ExportSource>::Record,
    <<Src as ExportSource>::Records as IntoIterator>::IntoIter,
>;

// ============================================================================
// Streamer
// ============================================================================

/// Builds CSV exports from the shared registries.
#[derive(Debug, Clone)]
pub struct Streamer {
    adapters: Arc<AdapterRegistry>,
    metrics: Arc<MetricRegistry>,
}

impl Streamer {
    pub fn new(adapters: Arc<AdapterRegistry>, metrics: Arc<MetricRegistry>) -> Self {
        Self { adapters, metrics }
    }

    /// Bind `records` to the default adapter registered for `R`.
    pub fn adapter<R: Record, S>(&self, records: S) -> ExportResult<Adapter<R, S>> {
        let config = self.adapters.lookup::<R>()?;
        Ok(Adapter::new(config, Arc::clone(&self.metrics), records))
    }

    /// Stream `source` as CSV, stamping the filename with the current time.
    pub fn stream<Src>(
        &self,
        source: Src,
        basename: Option<&str>,
    ) -> ExportResult<CsvExport<SourceRows<Src>>>
    where
        Src: ExportSource,
        <Src::Records as IntoIterator>::Item: Borrow<Src::Record>,
    {
        self.stream_at(source, basename, Utc::now())
    }

    /// Stream `source` as CSV with an explicit timestamp for the filename.
    ///
    /// Columns are resolved before returning, so a misconfigured adapter
    /// fails here without producing any output.
    #[instrument(skip(self, source), fields(kind = %<Src::Record as Record>::kind()))]
    pub fn stream_at<Src>(
        &self,
        source: Src,
        basename: Option<&str>,
        now: DateTime<Utc>,
    ) -> ExportResult<CsvExport<SourceRows<Src>>>
    where
        Src: ExportSource,
        <Src::Records as IntoIterator>::Item: Borrow<Src::Record>,
    {
        let adapter = source.into_adapter(self)?;
        let header = adapter.header()?;
        let rows = adapter.into_rows()?;

        let filename = export_filename(basename.unwrap_or(DEFAULT_BASENAME), now);
        info!(filename = %filename, columns = header.len(), "Streaming CSV export");

        Ok(CsvExport {
            filename,
            chunks: CsvChunks::new(header, rows),
        })
    }
}

// ============================================================================
// Output
// ============================================================================

/// A CSV export ready to be sent as an attachment.
pub struct CsvExport<I> {
    filename: String,
    chunks: CsvChunks<I>,
}

impl<I> CsvExport<I>
where
    I: Iterator<Item = Vec<String>>,
{
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content_type(&self) -> &'static str {
        CSV_CONTENT_TYPE
    }

    /// `Content-Disposition` header value marking the body as an attachment.
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }

    /// Encoded chunks: header first, then one per record.
    pub fn into_chunks(self) -> CsvChunks<I> {
        self.chunks
    }

    /// Drain every chunk into one buffer.
    pub fn into_bytes(self) -> ExportResult<Vec<u8>> {
        let mut body = Vec::new();
        for chunk in self.chunks {
            body.extend_from_slice(&chunk?);
        }
        Ok(body)
    }
}

/// Lazy iterator of encoded CSV chunks.
///
/// Iteration stops after the first encoding error.
pub struct CsvChunks<I> {
    header: Vec<String>,
    header_sent: bool,
    rows: I,
    builder: csv::WriterBuilder,
    rows_written: usize,
    done: bool,
}

impl<I> CsvChunks<I> {
    fn new(header: Vec<String>, rows: I) -> Self {
        let mut builder = csv::WriterBuilder::new();
        builder
            .delimiter(b',')
            .quote(b'"')
            .double_quote(true)
            .terminator(csv::Terminator::Any(b'\n'));

        Self {
            header,
            header_sent: false,
            rows,
            builder,
            rows_written: 0,
            done: false,
        }
    }

    /// Number of data rows encoded so far.
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    fn encode(&self, record: &[String]) -> ExportResult<Bytes> {
        let mut writer = self.builder.from_writer(Vec::new());
        writer.write_record(record)?;
        let buffer = writer
            .into_inner()
            .map_err(|e| ExportError::Encoding(e.to_string()))?;
        Ok(Bytes::from(buffer))
    }
}

impl<I> Iterator for CsvChunks<I>
where
    I: Iterator<Item = Vec<String>>,
{
    type Item = ExportResult<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let encoded = if self.header_sent {
            match self.rows.next() {
                Some(row) => {
                    let encoded = self.encode(&row);
                    self.rows_written += 1;
                    encoded
                }
                None => {
                    self.done = true;
                    debug!(rows = self.rows_written, "CSV export complete");
                    return None;
                }
            }
        } else {
            self.header_sent = true;
            self.encode(&self.header)
        };

        if let Err(e) = &encoded {
            warn!(error = %e, rows = self.rows_written, "CSV export aborted");
            self.done = true;
        }
        Some(encoded)
    }
}
