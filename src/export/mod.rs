//! Export of filtered events as CSV or JSON text, plus writing a rendered
//! export to disk.

pub mod csv_export;
pub mod json_export;

use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use crate::core::event_record::SecurityEvent;
use crate::util::error::SiemError;

/// Supported export formats. Parsing is case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    /// MIME type for an HTTP response body.
    pub fn media_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Csv => "text/csv",
        }
    }

    /// Suggested download file name.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Json => "events_export.json",
            Self::Csv => "events_export.csv",
        }
    }

    /// Render `events` in this format.
    pub fn render(self, events: &[SecurityEvent]) -> Result<String, SiemError> {
        match self {
            Self::Json => json_export::format_events_as_json(events),
            Self::Csv => csv_export::format_events_as_csv(events),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = SiemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(SiemError::InvalidFormat(s.to_owned())),
        }
    }
}

/// Write a rendered export to `path`.
///
/// # Errors
/// Returns [`SiemError::Export`] if the file cannot be created or written.
pub fn write_export(content: &str, path: &Path) -> Result<(), SiemError> {
    let file = std::fs::File::create(path)
        .map_err(|e| SiemError::Export(format!("Failed to create {}: {e}", path.display())))?;

    let mut writer = std::io::BufWriter::new(file);
    writer
        .write_all(content.as_bytes())
        .map_err(|e| SiemError::Export(format!("Failed to write {}: {e}", path.display())))?;

    // Explicit flush so I/O errors are not silently swallowed by BufWriter::drop.
    writer
        .flush()
        .map_err(|e| SiemError::Export(format!("Failed to flush export output: {e}")))?;

    tracing::info!("Wrote {} bytes of export to {}", content.len(), path.display());
    Ok(())
}
