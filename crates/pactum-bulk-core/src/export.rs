//! Hands completed export results to the caller as a download or an artifact.

use base64::{Engine as _, engine::general_purpose};
use chrono::{NaiveDate, Utc};
use csv::{Terminator, WriterBuilder};
use indexmap::IndexSet;
use rust_xlsxwriter::{Workbook, XlsxError};
use serde_json::{Map, Value};

use crate::error::{BulkError, BulkResult};
use crate::model::{BulkOperationResult, ExportFormat, ExportSpec, InlineExport};

/// Locally materialised export artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    /// Suggested file name.
    pub filename: String,
    /// MIME type of `bytes`.
    pub content_type: &'static str,
    /// Artifact contents.
    pub bytes: Vec<u8>,
}

/// What the caller receives for a finished export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Retrieve the artifact from a server-provided location.
    Download {
        /// Location exactly as provided.
        url: String,
        /// Suggested local file name.
        suggested_filename: String,
    },
    /// The artifact was built from inline data.
    Artifact(ExportArtifact),
}

impl DeliveryOutcome {
    /// Suggested file name for either variant.
    #[must_use]
    pub fn filename(&self) -> &str {
        match self {
            Self::Download {
                suggested_filename, ..
            } => suggested_filename,
            Self::Artifact(artifact) => &artifact.filename,
        }
    }
}

/// Turns export results into a download reference or local artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDeliveryHandler {
    resource: String,
}

impl ExportDeliveryHandler {
    /// Handler naming artifacts after `resource` (for example `contracts`).
    #[must_use]
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
        }
    }

    /// Deliver using today's UTC date in the file name.
    ///
    /// # Errors
    ///
    /// See [`ExportDeliveryHandler::deliver_on`].
    pub fn deliver(
        &self,
        result: &BulkOperationResult,
        spec: &ExportSpec,
        download_location: Option<&str>,
    ) -> BulkResult<DeliveryOutcome> {
        self.deliver_on(result, spec, download_location, Utc::now().date_naive())
    }

    /// Deliver with an explicit date for the file name.
    ///
    /// An explicit `download_location` wins over the one carried by the result.
    ///
    /// # Errors
    ///
    /// Returns [`BulkError::NoDeliverableData`] when neither a location nor
    /// inline data is available, and [`BulkError::MalformedResponse`] when the
    /// inline data cannot be decoded or rendered.
    pub fn deliver_on(
        &self,
        result: &BulkOperationResult,
        spec: &ExportSpec,
        download_location: Option<&str>,
        today: NaiveDate,
    ) -> BulkResult<DeliveryOutcome> {
        let receipt = result.export.as_ref();
        let format = receipt.map_or(spec.format, |receipt| receipt.format);
        let filename = self.suggested_filename(format, today);

        let location = download_location
            .or_else(|| receipt.and_then(|receipt| receipt.download_url.as_deref()))
            .map(str::trim)
            .filter(|location| !location.is_empty());
        if let Some(url) = location {
            return Ok(DeliveryOutcome::Download {
                url: url.to_string(),
                suggested_filename: filename,
            });
        }

        let Some(inline) = receipt.and_then(|receipt| receipt.inline.as_ref()) else {
            return Err(BulkError::NoDeliverableData {
                export_id: receipt.map(|receipt| receipt.export_id.clone()),
            });
        };

        let bytes = match inline {
            InlineExport::Encoded(content) => general_purpose::STANDARD
                .decode(content.trim())
                .map_err(|err| BulkError::malformed("export", format!("invalid base64: {err}")))?,
            InlineExport::Records(records) => render_records(format, &spec.fields, records)?,
        };
        tracing::debug!(filename = %filename, bytes = bytes.len(), "built export artifact");

        Ok(DeliveryOutcome::Artifact(ExportArtifact {
            filename,
            content_type: format.content_type(),
            bytes,
        }))
    }

    /// `<resource>-export-<YYYY-MM-DD>.<ext>`.
    #[must_use]
    pub fn suggested_filename(&self, format: ExportFormat, today: NaiveDate) -> String {
        format!(
            "{}-export-{}.{}",
            self.resource,
            today.format("%Y-%m-%d"),
            format.extension()
        )
    }
}

fn render_records(
    format: ExportFormat,
    fields: &[String],
    records: &[Map<String, Value>],
) -> BulkResult<Vec<u8>> {
    match format {
        ExportFormat::Csv => render_csv(&columns(fields, records), records),
        ExportFormat::Excel => render_xlsx(&columns(fields, records), records),
        ExportFormat::Json => serde_json::to_vec_pretty(records)
            .map_err(|err| BulkError::malformed("export", err.to_string())),
    }
}

/// Requested fields, or every key seen across `records` when none were named.
fn columns(fields: &[String], records: &[Map<String, Value>]) -> Vec<String> {
    if !fields.is_empty() {
        return fields.to_vec();
    }
    records
        .iter()
        .flat_map(Map::keys)
        .cloned()
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

fn render_csv(columns: &[String], records: &[Map<String, Value>]) -> BulkResult<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::CRLF)
        .from_writer(Vec::new());
    writer.write_record(columns).map_err(csv_error)?;
    for record in records {
        writer
            .write_record(columns.iter().map(|column| cell_text(record.get(column))))
            .map_err(csv_error)?;
    }
    writer
        .into_inner()
        .map_err(|err| BulkError::malformed("export", err.to_string()))
}

fn render_xlsx(columns: &[String], records: &[Map<String, Value>]) -> BulkResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        for (col, column) in columns.iter().enumerate() {
            let col = column_index(col)?;
            sheet
                .write_string(0, col, column.as_str())
                .map_err(xlsx_error)?;
        }
        for (index, record) in records.iter().enumerate() {
            let row = u32::try_from(index + 1)
                .map_err(|_| BulkError::malformed("export", "too many records for a worksheet"))?;
            for (col, column) in columns.iter().enumerate() {
                let col = column_index(col)?;
                match record.get(column) {
                    None | Some(Value::Null) => {}
                    Some(Value::Bool(flag)) => {
                        sheet.write_boolean(row, col, *flag).map_err(xlsx_error)?;
                    }
                    Some(Value::Number(number)) => match number.as_f64() {
                        Some(number) => {
                            sheet.write_number(row, col, number).map_err(xlsx_error)?;
                        }
                        None => {
                            sheet
                                .write_string(row, col, &number.to_string())
                                .map_err(xlsx_error)?;
                        }
                    },
                    Some(other) => {
                        sheet
                            .write_string(row, col, &cell_text(Some(other)))
                            .map_err(xlsx_error)?;
                    }
                }
            }
        }
    }
    workbook.save_to_buffer().map_err(xlsx_error)
}

fn column_index(index: usize) -> BulkResult<u16> {
    u16::try_from(index)
        .map_err(|_| BulkError::malformed("export", "too many fields for a worksheet"))
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

#[allow(clippy::needless_pass_by_value)]
fn csv_error(err: csv::Error) -> BulkError {
    BulkError::malformed("export", format!("csv: {err}"))
}

#[allow(clippy::needless_pass_by_value)]
fn xlsx_error(err: XlsxError) -> BulkError {
    BulkError::malformed("export", format!("xlsx: {err}"))
}
