//! CRM export loading.
//!
//! Only the `Email` column is required. Owner, profile, experience and name
//! are resolved through prioritized header rules and default when absent.

use std::path::Path;

use insight_core::error::{InsightError, ParseError};
use insight_core::models::{
    ExperienceBracket, LeadRecord, LeadTable, LoadWarning, UNASSIGNED_OWNER, UNKNOWN_PROFILE,
};
use tracing::{info, warn};

use crate::columns::{cell_text, has_word, normalize_email, ColumnResolver, HeaderRule};

const EMAIL_RULES: &[HeaderRule] = &[|h| h == "email"];

const OWNER_RULES: &[HeaderRule] = &[
    |h| h.contains("lead owner"),
    |h| h.contains("owner"),
    |h| has_word(h, "rm"),
];

const PROFILE_RULES: &[HeaderRule] = &[
    |h| h.contains("industry"),
    |h| h.contains("field of work"),
    |h| h.contains("profile"),
];

const EXPERIENCE_RULES: &[HeaderRule] = &[|h| h.contains("experience"), |h| h.contains("years")];

const FIRST_NAME_RULES: &[HeaderRule] = &[|h| h.contains("first") && h.contains("name")];
const LAST_NAME_RULES: &[HeaderRule] = &[|h| h.contains("last") && h.contains("name")];
const NAME_RULES: &[HeaderRule] = &[|h| h.contains("name")];

/// How the lead's display name is assembled.
enum NameColumns {
    Split { first: usize, last: usize },
    Single(usize),
    Missing,
}

struct LeadColumns {
    email: usize,
    owner: Option<usize>,
    profile: Option<usize>,
    experience: Option<usize>,
    name: NameColumns,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Parse a CRM export into normalized lead rows, in export order.
///
/// Duplicate emails are kept; the matcher uses the first one.
pub fn load_leads(raw_text: &str) -> Result<(LeadTable, Vec<LoadWarning>), ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(raw_text.as_bytes());

    let headers = reader.headers().map_err(|e| malformed(&e))?.clone();
    let mut resolver = ColumnResolver::new(headers.iter());
    let columns = resolve_columns(&mut resolver).ok_or_else(|| ParseError::MissingEmailColumn {
        found: headers
            .iter()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
    })?;

    let mut warnings = Vec::new();
    if columns.owner.is_none() {
        warn!("No owner column in CRM export; leads default to {}", UNASSIGNED_OWNER);
        warnings.push(LoadWarning::UnmatchedColumn {
            field: "owner".to_string(),
        });
    }
    if columns.profile.is_none() {
        warn!("No profile/industry column in CRM export");
        warnings.push(LoadWarning::NoProfileData);
    }
    if columns.experience.is_none() {
        warn!("No experience column in CRM export");
        warnings.push(LoadWarning::NoExperienceData);
    }

    let mut records = Vec::new();
    let mut dropped = 0usize;
    for row in reader.records() {
        let row = row.map_err(|e| malformed(&e))?;
        let Some(email) = row.get(columns.email).and_then(normalize_email) else {
            dropped += 1;
            continue;
        };
        let cell = |idx: Option<usize>| cell_text(idx.and_then(|i| row.get(i)));

        let experience_years = cell(columns.experience).and_then(|v| parse_years(&v));
        let lead_name = match columns.name {
            NameColumns::Split { first, last } => {
                let parts: Vec<String> = [cell(Some(first)), cell(Some(last))]
                    .into_iter()
                    .flatten()
                    .collect();
                (!parts.is_empty()).then(|| parts.join(" "))
            }
            NameColumns::Single(idx) => cell(Some(idx)),
            NameColumns::Missing => None,
        };

        records.push(LeadRecord {
            email,
            owner_name: cell(columns.owner).unwrap_or_else(|| UNASSIGNED_OWNER.to_string()),
            profile: cell(columns.profile).unwrap_or_else(|| UNKNOWN_PROFILE.to_string()),
            experience_years,
            experience_bracket: ExperienceBracket::from_years(experience_years),
            lead_name,
        });
    }

    info!(
        dropped_without_email = dropped,
        "Loaded {} CRM leads",
        records.len()
    );
    Ok((LeadTable { records }, warnings))
}

/// Read and parse a CRM export from disk.
pub fn load_leads_file(path: &Path) -> Result<(LeadTable, Vec<LoadWarning>), InsightError> {
    let text = crate::read_source(path)?;
    load_leads(&text).map_err(|source| InsightError::SourceParse {
        path: path.to_path_buf(),
        source,
    })
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn resolve_columns(resolver: &mut ColumnResolver) -> Option<LeadColumns> {
    let email = resolver.claim(EMAIL_RULES)?;
    let owner = resolver.claim(OWNER_RULES);
    let profile = resolver.claim(PROFILE_RULES);
    let experience = resolver.claim(EXPERIENCE_RULES);

    let name = match (resolver.claim(FIRST_NAME_RULES), resolver.claim(LAST_NAME_RULES)) {
        (Some(first), Some(last)) => NameColumns::Split { first, last },
        (Some(single), None) | (None, Some(single)) => NameColumns::Single(single),
        (None, None) => resolver
            .claim(NAME_RULES)
            .map(NameColumns::Single)
            .unwrap_or(NameColumns::Missing),
    };

    Some(LeadColumns {
        email,
        owner,
        profile,
        experience,
        name,
    })
}

/// Numeric years of experience; anything else is unspecified.
fn parse_years(cell: &str) -> Option<f64> {
    cell.trim()
        .parse::<f64>()
        .ok()
        .filter(|years| years.is_finite() && *years >= 0.0)
}

fn malformed(err: &csv::Error) -> ParseError {
    ParseError::MalformedRow {
        line: err.position().map(|pos| pos.line()).unwrap_or(1),
        message: err.to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CRM: &str = "\
First Name,Last Name,Email,Lead Owner,Industry,Years of Experience
Bob,Stone,BOB@x.com,Priya,Finance,4
Cara,,cara@y.com,,IT,twelve
Dan,Ray,nan,Priya,Finance,3
Eve,Ng,eve@z.com,Arjun,,25
";

    #[test]
    fn test_columns_resolved_and_defaults_applied() {
        let (table, warnings) = load_leads(CRM).expect("load");

        assert!(warnings.is_empty());
        assert_eq!(table.len(), 3, "nan email dropped");

        let bob = &table.records[0];
        assert_eq!(bob.email, "bob@x.com");
        assert_eq!(bob.owner_name, "Priya");
        assert_eq!(bob.profile, "Finance");
        assert_eq!(bob.experience_years, Some(4.0));
        assert_eq!(bob.experience_bracket, ExperienceBracket::UpToFive);
        assert_eq!(bob.lead_name.as_deref(), Some("Bob Stone"));

        let cara = &table.records[1];
        assert_eq!(cara.owner_name, UNASSIGNED_OWNER);
        assert_eq!(cara.experience_years, None);
        assert_eq!(cara.experience_bracket, ExperienceBracket::NotSpecified);
        assert_eq!(cara.lead_name.as_deref(), Some("Cara"));

        let eve = &table.records[2];
        assert_eq!(eve.profile, UNKNOWN_PROFILE);
        assert_eq!(eve.experience_bracket, ExperienceBracket::OverTwenty);
    }

    #[test]
    fn test_missing_email_column() {
        let err = load_leads("Name,E-mail Address,Owner\nBob,bob@x.com,Priya\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::MissingEmailColumn {
                found: "Name, E-mail Address, Owner".to_string()
            }
        );
    }

    #[test]
    fn test_email_header_is_case_insensitive() {
        let (table, _) = load_leads(" EMAIL ,Owner\nbob@x.com,Priya\n").expect("load");
        assert_eq!(table.records[0].email, "bob@x.com");
    }

    #[test]
    fn test_optional_columns_missing_produce_warnings() {
        let (table, warnings) = load_leads("Email\nbob@x.com\n").expect("load");

        assert_eq!(table.records[0].owner_name, UNASSIGNED_OWNER);
        assert_eq!(table.records[0].profile, UNKNOWN_PROFILE);
        assert!(warnings.contains(&LoadWarning::UnmatchedColumn {
            field: "owner".to_string()
        }));
        assert!(warnings.contains(&LoadWarning::NoProfileData));
        assert!(warnings.contains(&LoadWarning::NoExperienceData));
    }

    #[test]
    fn test_owner_priority() {
        let text = "Email,Owner,Lead Owner\nbob@x.com,Someone,Priya\n";
        let (table, _) = load_leads(text).expect("load");
        assert_eq!(table.records[0].owner_name, "Priya");
    }

    #[test]
    fn test_rm_column_as_owner() {
        let text = "Email,RM,Platform\nbob@x.com,Arjun,Web\n";
        let (table, _) = load_leads(text).expect("load");
        assert_eq!(table.records[0].owner_name, "Arjun");
    }

    #[test]
    fn test_alternative_profile_and_experience_headers() {
        let text = "Email,Field of Work,Total Years\nbob@x.com,Healthcare,11\n";
        let (table, warnings) = load_leads(text).expect("load");
        assert_eq!(table.records[0].profile, "Healthcare");
        assert_eq!(table.records[0].experience_bracket, ExperienceBracket::ElevenToFifteen);
        assert!(!warnings.contains(&LoadWarning::NoProfileData));
    }

    #[test]
    fn test_duplicate_emails_are_kept_in_order() {
        let text = "Email,Owner\nbob@x.com,First\nbob@x.com,Second\n";
        let (table, _) = load_leads(text).expect("load");
        assert_eq!(table.len(), 2);
        assert_eq!(table.records[0].owner_name, "First");
    }

    #[test]
    fn test_single_name_column() {
        let text = "Full Name,Email\nBob Stone,bob@x.com\n";
        let (table, _) = load_leads(text).expect("load");
        assert_eq!(table.records[0].lead_name.as_deref(), Some("Bob Stone"));
    }

    #[test]
    fn test_load_leads_file_names_file_on_error() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("crm.csv");
        std::fs::write(&path, "Name,Owner\nBob,Priya\n").expect("write");

        let err = load_leads_file(&path).unwrap_err();
        assert!(err.to_string().contains("crm.csv"));
        assert!(matches!(
            err,
            InsightError::SourceParse {
                source: ParseError::MissingEmailColumn { .. },
                ..
            }
        ));
    }
}
