//! JSON and CSV export of a takeoff
//!
//! A [`TakeoffExport`] snapshot carries the annotations (for re-import), the
//! page scale assignments and a per-item summary computed under page 1's
//! scale. File helpers write atomically through a temporary file.

use crate::annotation::Annotation;
use crate::config::TakeoffItemConfig;
use crate::scale::ScaleRegistry;
use crate::summary::{summarize, MeasurementSummary};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Error types for takeoff export and import
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV output is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("not a takeoff export: {0}")]
    InvalidImport(String),
}

pub type ExportResult<T> = Result<T, ExportError>;

/// CSV column headers
pub const CSV_HEADER: [&str; 4] = ["Item", "Count", "Total", "Unit"];

/// Snapshot of a takeoff for export and re-import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakeoffExport {
    #[serde(default)]
    pub exported_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_name: Option<String>,
    /// Scale preset id per 1-based page
    #[serde(default)]
    pub page_scales: BTreeMap<u32, String>,
    #[serde(default)]
    pub summary: Vec<MeasurementSummary>,
    pub annotations: Vec<Annotation>,
}

impl TakeoffExport {
    /// Build a snapshot, summarizing under the scale resolved for page 1
    pub fn build(
        annotations: &[Annotation],
        registry: &ScaleRegistry,
        items: &[TakeoffItemConfig],
        pdf_name: Option<&str>,
    ) -> Self {
        let scale = registry.resolve(1);
        log::debug!(
            "exporting {} annotations, summary scale {}",
            annotations.len(),
            scale.id
        );

        Self {
            exported_at: Utc::now().trunc_subsecs(3),
            pdf_name: pdf_name.map(str::to_owned),
            page_scales: registry.page_scales().clone(),
            summary: summarize(annotations, scale, items),
            annotations: annotations.to_vec(),
        }
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> ExportResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Summary table as CSV
    pub fn to_csv(&self) -> ExportResult<String> {
        summary_csv(&self.summary)
    }
}

/// Render summary rows as `Item,Count,Total,Unit` CSV
///
/// Labels are always quoted with embedded quotes doubled; totals carry two
/// decimals. Lines are joined with `\n` and there is no trailing newline.
pub fn summary_csv(summary: &[MeasurementSummary]) -> ExportResult<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Never)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;
    for row in summary {
        writer.write_record([
            quote_label(&row.label),
            row.count.to_string(),
            format!("{:.2}", row.total_value),
            row.unit.clone(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))?;
    let mut csv = String::from_utf8(bytes)?;
    if csv.ends_with('\n') {
        csv.pop();
    }
    Ok(csv)
}

fn quote_label(label: &str) -> String {
    format!("\"{}\"", label.replace('"', "\"\""))
}

/// Parse a JSON export
///
/// The document must be an object whose `annotations` field is an array of
/// annotations. Every field present must also have its exported type: a
/// color that is not `#rgb`/`#rrggbb`/`#rrggbbaa` hex, or an `exportedAt`
/// that is not RFC 3339, rejects the whole document. Anything rejected
/// yields `None`. Geometry is not checked here; see [`Annotation::validate`].
pub fn import_from_json(json: &str) -> Option<TakeoffExport> {
    let value: serde_json::Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(e) => {
            log::debug!("import rejected: {e}");
            return None;
        }
    };

    if !value
        .get("annotations")
        .is_some_and(serde_json::Value::is_array)
    {
        log::debug!("import rejected: `annotations` is not an array");
        return None;
    }

    match serde_json::from_value(value) {
        Ok(export) => Some(export),
        Err(e) => {
            log::debug!("import rejected: {e}");
            None
        }
    }
}

/// Write `contents` to `path` through a temporary file and rename
fn write_atomic(path: &Path, contents: &str) -> ExportResult<()> {
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, contents)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Save the export as pretty JSON
pub fn write_json(path: impl AsRef<Path>, export: &TakeoffExport) -> ExportResult<()> {
    write_atomic(path.as_ref(), &export.to_json()?)
}

/// Save the export's summary as CSV
pub fn write_csv(path: impl AsRef<Path>, export: &TakeoffExport) -> ExportResult<()> {
    write_atomic(path.as_ref(), &export.to_csv()?)
}

/// Load a JSON export from disk
pub fn read_json(path: impl AsRef<Path>) -> ExportResult<TakeoffExport> {
    let path = path.as_ref();
    let json = fs::read_to_string(path)?;
    import_from_json(&json).ok_or_else(|| ExportError::InvalidImport(path.display().to_string()))
}
