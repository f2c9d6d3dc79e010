//! JSON export for filtered security events.
//!
//! Serialises the event list as a pretty-printed JSON array using Serde.
//! Documents keep every field the store sent, including unmodelled ones.

use crate::core::event_record::SecurityEvent;
use crate::util::error::SiemError;

/// Render `events` as an indented JSON array.
///
/// # Errors
/// Returns [`SiemError::Export`] if serialisation fails.
pub fn format_events_as_json(events: &[SecurityEvent]) -> Result<String, SiemError> {
    serde_json::to_string_pretty(events)
        .map_err(|e| SiemError::Export(format!("Failed to write JSON: {e}")))
}
