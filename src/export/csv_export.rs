//! CSV export for filtered security events.
//!
//! Fixed column set; absent values render as empty cells and fields outside
//! the column set are dropped.

use crate::core::event_record::SecurityEvent;
use crate::util::constants::EXPORT_FIELDS;
use crate::util::error::SiemError;

/// Render `events` as CSV text.
///
/// Columns: `_id, timestamp, hostname, source, event_type, severity, user,
/// process, command, raw_log`. Rows end in CRLF.
///
/// # Errors
/// Returns [`SiemError::Export`] if a record cannot be written.
pub fn format_events_as_csv(events: &[SecurityEvent]) -> Result<String, SiemError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    writer
        .write_record(EXPORT_FIELDS)
        .map_err(|e| SiemError::Export(format!("Failed to write CSV header: {e}")))?;

    for event in events {
        writer
            .write_record(EXPORT_FIELDS.iter().map(|field| event.field_text(field)))
            .map_err(|e| SiemError::Export(format!("Failed to write CSV row: {e}")))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| SiemError::Export(format!("Failed to flush CSV: {e}")))?;

    String::from_utf8(bytes).map_err(|e| SiemError::Export(format!("CSV output is not UTF-8: {e}")))
}
