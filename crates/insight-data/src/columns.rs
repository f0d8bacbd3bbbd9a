//! Header handling shared by the tabular loaders.
//!
//! Vendor exports name their columns inconsistently, so every logical field
//! is resolved through an ordered list of predicates over the normalized
//! header text. The first predicate that matches an unclaimed column wins.

use std::collections::HashSet;

use insight_core::error::ParseError;

/// A predicate over a lowercased, trimmed header.
pub type HeaderRule = fn(&str) -> bool;

/// Resolves logical fields to column indices, never handing out the same
/// column twice.
#[derive(Debug)]
pub struct ColumnResolver {
    headers: Vec<String>,
    claimed: HashSet<usize>,
}

impl ColumnResolver {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            headers: headers.into_iter().map(|h| normalize_header(h.as_ref())).collect(),
            claimed: HashSet::new(),
        }
    }

    /// Claim the first unclaimed column accepted by the highest-priority rule
    /// that accepts any column at all.
    pub fn claim(&mut self, rules: &[HeaderRule]) -> Option<usize> {
        for rule in rules {
            let hit = self
                .headers
                .iter()
                .enumerate()
                .find(|(idx, header)| !self.claimed.contains(idx) && rule(header))
                .map(|(idx, _)| idx);
            if let Some(idx) = hit {
                self.claimed.insert(idx);
                return Some(idx);
            }
        }
        None
    }

    /// Normalized header text at `idx`.
    pub fn header(&self, idx: usize) -> Option<&str> {
        self.headers.get(idx).map(String::as_str)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

/// Lowercase and trim a header, dropping a leading BOM.
pub fn normalize_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// Header with all whitespace removed, for matching spellings like
/// `Duration (Minutes)` against `duration_mins`.
pub fn compact(header: &str) -> String {
    header.chars().filter(|c| !c.is_whitespace()).collect()
}

/// `true` when `word` appears in `header` as a whole word.
pub fn has_word(header: &str, word: &str) -> bool {
    header
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| token == word)
}

/// Split one CSV line into trimmed fields, honouring quotes.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    match reader.records().next() {
        Some(Ok(record)) => record.iter().map(|f| f.trim().to_string()).collect(),
        _ => line.split(',').map(|f| f.trim().to_string()).collect(),
    }
}

/// Find the first line whose fields collectively mention every keyword
/// (case-insensitive substring per field). Returns the zero-based line index.
pub fn find_header_line(text: &str, keywords: &[&str]) -> Result<usize, ParseError> {
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<String> = split_csv_line(line)
            .iter()
            .map(|f| normalize_header(f))
            .collect();
        let all_present = keywords
            .iter()
            .all(|kw| fields.iter().any(|f| f.contains(kw)));
        if all_present {
            return Ok(idx);
        }
    }
    Err(ParseError::HeaderNotFound {
        expected: keywords
            .iter()
            .map(|k| capitalize(k))
            .collect::<Vec<_>>()
            .join(", "),
    })
}

/// Text from line `start` onwards.
pub fn tail_from_line(text: &str, start: usize) -> &str {
    let mut offset = 0;
    for (idx, line) in text.split_inclusive('\n').enumerate() {
        if idx == start {
            return &text[offset..];
        }
        offset += line.len();
    }
    ""
}

/// Normalize an email cell. Empty cells and the literal `nan` yield `None`.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() || email == "nan" {
        None
    } else {
        Some(email)
    }
}

/// Trimmed non-empty cell text, treating `nan` as empty.
pub fn cell_text(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("nan") {
        None
    } else {
        Some(value.to_string())
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
