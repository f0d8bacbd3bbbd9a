//! Attendance export loading.
//!
//! Conferencing platforms prefix the participant table with a banner of
//! meeting metadata and spell their columns differently from release to
//! release. The loader finds the real header row, resolves the columns it
//! needs, drops internal accounts and folds rejoin rows into one record per
//! email.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use insight_core::error::{InsightError, ParseError};
use insight_core::exclusion::ExclusionPolicy;
use insight_core::models::{AttendanceLoadStats, AttendanceRecord, AttendanceTable, LoadWarning};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::columns::{
    cell_text, compact, find_header_line, normalize_email, tail_from_line, ColumnResolver,
    HeaderRule,
};

/// Keywords that must all appear in the header row.
const HEADER_KEYWORDS: [&str; 3] = ["email", "duration", "name"];

const EMAIL_RULES: &[HeaderRule] = &[|h| h.contains("email")];

const NAME_RULES: &[HeaderRule] = &[
    |h| h.contains("name") && h.contains("original"),
    |h| h.contains("name"),
];

const DURATION_RULES: &[HeaderRule] = &[
    |h| {
        let h = compact(h);
        h.contains("duration") && h.contains("min")
    },
    |h| h.contains("duration"),
];

const WAITING_ROOM_RULES: &[HeaderRule] = &[|h| h.contains("waiting") && h.contains("room")];
const JOIN_RULES: &[HeaderRule] = &[|h| h.contains("join")];
const LEAVE_RULES: &[HeaderRule] = &[|h| h.contains("leave")];

struct AttendanceColumns {
    email: usize,
    name: Option<usize>,
    duration: Option<usize>,
    waiting_room: Option<usize>,
    join: Option<usize>,
    leave: Option<usize>,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Parse an attendance export into one record per attendee.
///
/// Fails with [`ParseError::HeaderNotFound`] when no line mentions all of
/// Email, Duration and Name, and with [`ParseError::MalformedRow`] when the
/// CSV body cannot be decoded.
pub fn load_attendance(
    raw_text: &str,
    exclusions: &ExclusionPolicy,
) -> Result<(AttendanceTable, Vec<LoadWarning>), ParseError> {
    let header_idx = find_header_line(raw_text, &HEADER_KEYWORDS)?;
    debug!("Attendance header found at line {}", header_idx);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(tail_from_line(raw_text, header_idx).as_bytes());

    let headers = reader.headers().map_err(|e| malformed(header_idx, &e))?.clone();
    let mut resolver = ColumnResolver::new(headers.iter());
    let columns = resolve_columns(&mut resolver)?;

    let mut warnings = Vec::new();
    if columns.duration.is_none() {
        warn!("No duration column in attendance export; durations default to 0");
        warnings.push(LoadWarning::UnmatchedColumn {
            field: "duration".to_string(),
        });
    }

    let mut stats = AttendanceLoadStats::default();
    let mut records: Vec<AttendanceRecord> = Vec::new();
    let mut index_by_email: HashMap<String, usize> = HashMap::new();

    for row in reader.records() {
        let row = row.map_err(|e| malformed(header_idx, &e))?;
        stats.raw_rows += 1;

        let Some(email) = row.get(columns.email).and_then(normalize_email) else {
            stats.missing_email_rows += 1;
            continue;
        };
        if exclusions.is_excluded_email(&email) {
            stats.excluded_rows += 1;
            continue;
        }

        let duration = columns
            .duration
            .and_then(|idx| row.get(idx))
            .map(parse_duration)
            .unwrap_or(0.0);

        if let Some(&existing) = index_by_email.get(&email) {
            records[existing].duration_minutes += duration;
            stats.duplicate_rows += 1;
            continue;
        }

        let cell = |idx: Option<usize>| cell_text(idx.and_then(|i| row.get(i)));
        index_by_email.insert(email.clone(), records.len());
        records.push(AttendanceRecord {
            display_name: cell(columns.name).unwrap_or_default(),
            email,
            duration_minutes: duration,
            waiting_room: columns
                .waiting_room
                .map(|idx| is_truthy(row.get(idx).unwrap_or(""))),
            join_time: cell(columns.join),
            leave_time: cell(columns.leave),
        });
    }

    if stats.duplicate_rows > 0 {
        warnings.push(LoadWarning::DuplicateRowsCollapsed {
            count: stats.duplicate_rows,
        });
    }
    if stats.excluded_rows > 0 {
        warnings.push(LoadWarning::TeamMemberExcluded {
            count: stats.excluded_rows,
        });
    }

    info!(
        raw_rows = stats.raw_rows,
        duplicates = stats.duplicate_rows,
        excluded = stats.excluded_rows,
        missing_email = stats.missing_email_rows,
        "Loaded {} unique attendees",
        records.len()
    );

    let table = AttendanceTable {
        records,
        stats,
        has_waiting_room_data: columns.waiting_room.is_some(),
    };
    Ok((table, warnings))
}

/// Read and parse an attendance export from disk.
pub fn load_attendance_file(
    path: &Path,
    exclusions: &ExclusionPolicy,
) -> Result<(AttendanceTable, Vec<LoadWarning>), InsightError> {
    let text = crate::read_source(path)?;
    load_attendance(&text, exclusions).map_err(|source| InsightError::SourceParse {
        path: path.to_path_buf(),
        source,
    })
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn resolve_columns(resolver: &mut ColumnResolver) -> Result<AttendanceColumns, ParseError> {
    let email = resolver
        .claim(EMAIL_RULES)
        .ok_or_else(|| ParseError::HeaderNotFound {
            expected: "Email".to_string(),
        })?;
    Ok(AttendanceColumns {
        email,
        duration: resolver.claim(DURATION_RULES),
        waiting_room: resolver.claim(WAITING_ROOM_RULES),
        name: resolver.claim(NAME_RULES),
        join: resolver.claim(JOIN_RULES),
        leave: resolver.claim(LEAVE_RULES),
    })
}

/// Leading number of a duration cell (`"45"`, `"45.5"`, `"45 min"`).
/// Anything else, and negative values, count as 0.
fn parse_duration(cell: &str) -> f64 {
    static LEADING_NUMBER: OnceLock<Regex> = OnceLock::new();
    let re = LEADING_NUMBER
        .get_or_init(|| Regex::new(r"^\s*(-?\d+(?:\.\d+)?)").expect("regex is valid"));
    re.captures(cell)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .filter(|minutes| minutes.is_finite())
        .map(|minutes| minutes.max(0.0))
        .unwrap_or(0.0)
}

fn is_truthy(cell: &str) -> bool {
    matches!(cell.trim().to_lowercase().as_str(), "yes" | "true" | "1")
}

fn malformed(header_idx: usize, err: &csv::Error) -> ParseError {
    let line = err
        .position()
        .map(|pos| pos.line() + header_idx as u64)
        .unwrap_or(header_idx as u64 + 1);
    ParseError::MalformedRow {
        line,
        message: err.to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
