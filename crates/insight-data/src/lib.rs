//! Data layer for masterclass insights.
//!
//! Loads attendance, chat and CRM exports, reconciles them into one record
//! per attendee, scores engagement and builds the timeline and grouped views
//! consumed by the report layer.

use std::path::Path;

use insight_core::error::InsightError;

pub mod aggregator;
pub mod analysis;
pub mod attendance;
pub mod chat;
pub mod columns;
pub mod leads;
pub mod matcher;
pub mod scorer;
pub mod timeline;

pub use insight_core as core;

/// Read an export as UTF-8, dropping a leading byte-order mark.
pub(crate) fn read_source(path: &Path) -> Result<String, InsightError> {
    let text = std::fs::read_to_string(path).map_err(|source| InsightError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(strip_bom(text))
}

/// Read a free-text transcript, replacing invalid UTF-8 sequences instead of
/// rejecting the whole file.
pub(crate) fn read_source_lossy(path: &Path) -> Result<String, InsightError> {
    let bytes = std::fs::read(path).map_err(|source| InsightError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(strip_bom(String::from_utf8_lossy(&bytes).into_owned()))
}

fn strip_bom(text: String) -> String {
    match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    }
}
