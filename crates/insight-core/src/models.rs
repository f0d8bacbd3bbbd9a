use serde::{Deserialize, Serialize};
use std::fmt;

/// Owner assigned to attendees with no CRM match or an empty owner cell.
pub const UNASSIGNED_OWNER: &str = "Unassigned";

/// Profile assigned to attendees with no CRM match or an empty profile cell.
pub const UNKNOWN_PROFILE: &str = "Unknown";

/// Lower bound (inclusive) of the `Hot` tier and the `High` group level.
pub const HOT_THRESHOLD: f64 = 70.0;

/// Lower bound (inclusive) of the `Warm` tier and the `Medium` group level.
pub const WARM_THRESHOLD: f64 = 40.0;

// ── Attendance ────────────────────────────────────────────────────────────────

/// One attendee of a session after deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Trimmed, lowercased email. Unique within a run.
    pub email: String,
    /// Display name as exported by the conferencing platform.
    pub display_name: String,
    /// Total minutes across every join/leave row for this email.
    pub duration_minutes: f64,
    /// `Some(true)` when the attendee was never admitted from the waiting room.
    /// `None` when the export carries no waiting-room column.
    #[serde(default)]
    pub waiting_room: Option<bool>,
    /// First join time seen for this email, verbatim.
    #[serde(default)]
    pub join_time: Option<String>,
    /// First leave time seen for this email, verbatim.
    #[serde(default)]
    pub leave_time: Option<String>,
}

impl AttendanceRecord {
    /// Lowercased first whitespace-separated token of the display name.
    pub fn first_name_token(&self) -> Option<String> {
        self.display_name
            .split_whitespace()
            .next()
            .map(|token| token.to_lowercase())
    }

    /// `true` when the attendee was admitted (or no waiting-room data exists).
    pub fn is_admitted(&self) -> bool {
        self.waiting_room != Some(true)
    }
}

/// Row counts reported by the attendance loader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceLoadStats {
    /// Non-blank data rows after the header. Blank lines are never counted.
    pub raw_rows: usize,
    /// Rows dropped because the email was empty or `nan`.
    pub missing_email_rows: usize,
    /// Rows removed by the exclusion policy.
    pub excluded_rows: usize,
    /// Rows folded into an earlier row with the same email.
    pub duplicate_rows: usize,
}

/// The deduplicated attendance table, in first-seen email order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttendanceTable {
    pub records: Vec<AttendanceRecord>,
    pub stats: AttendanceLoadStats,
    /// Whether the export had a waiting-room column.
    pub has_waiting_room_data: bool,
}

impl AttendanceTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record by normalized email.
    pub fn get(&self, email: &str) -> Option<&AttendanceRecord> {
        self.records.iter().find(|r| r.email == email)
    }
}

// ── Chat ──────────────────────────────────────────────────────────────────────

/// A single message from a chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Timestamp as it appears in the transcript (format depends on the export).
    pub timestamp: String,
    pub sender_name: String,
    pub recipient: String,
    pub text: String,
    /// `true` when the trimmed text contains `?`.
    pub is_question: bool,
}

impl ChatMessage {
    /// Build a message, deriving the question flag from `text`.
    pub fn new(
        timestamp: impl Into<String>,
        sender_name: impl Into<String>,
        recipient: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let text = text.into().trim().to_string();
        let is_question = text.contains('?');
        Self {
            timestamp: timestamp.into(),
            sender_name: sender_name.into(),
            recipient: recipient.into(),
            text,
            is_question,
        }
    }
}

// ── Leads ─────────────────────────────────────────────────────────────────────

/// Fixed experience bands, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExperienceBracket {
    #[serde(rename = "0-5 years")]
    UpToFive,
    #[serde(rename = "6-10 years")]
    SixToTen,
    #[serde(rename = "11-15 years")]
    ElevenToFifteen,
    #[serde(rename = "16-20 years")]
    SixteenToTwenty,
    #[serde(rename = "20+ years")]
    OverTwenty,
    #[serde(rename = "Not Specified")]
    NotSpecified,
}

impl ExperienceBracket {
    /// Bucket a years-of-experience value. `None` and NaN map to `NotSpecified`.
    pub fn from_years(years: Option<f64>) -> Self {
        match years {
            Some(y) if y.is_nan() => Self::NotSpecified,
            Some(y) if y <= 5.0 => Self::UpToFive,
            Some(y) if y <= 10.0 => Self::SixToTen,
            Some(y) if y <= 15.0 => Self::ElevenToFifteen,
            Some(y) if y <= 20.0 => Self::SixteenToTwenty,
            Some(_) => Self::OverTwenty,
            None => Self::NotSpecified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UpToFive => "0-5 years",
            Self::SixToTen => "6-10 years",
            Self::ElevenToFifteen => "11-15 years",
            Self::SixteenToTwenty => "16-20 years",
            Self::OverTwenty => "20+ years",
            Self::NotSpecified => "Not Specified",
        }
    }
}

impl fmt::Display for ExperienceBracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a CRM export, normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadRecord {
    /// Trimmed, lowercased email.
    pub email: String,
    /// Relationship manager; never empty (defaults to [`UNASSIGNED_OWNER`]).
    pub owner_name: String,
    /// Industry / field of work; never empty (defaults to [`UNKNOWN_PROFILE`]).
    pub profile: String,
    pub experience_years: Option<f64>,
    pub experience_bracket: ExperienceBracket,
    /// Lead name from the CRM, when a name column exists.
    pub lead_name: Option<String>,
}

/// Normalized CRM rows in export order. Duplicate emails are kept here;
/// the matcher takes the first one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadTable {
    pub records: Vec<LeadRecord>,
}

impl LeadTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ── Scoring ───────────────────────────────────────────────────────────────────

/// Follow-up priority tier derived from the total score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Hot,
    Warm,
    Cold,
}

impl Category {
    /// `>= 70` is Hot, `>= 40` is Warm, everything else Cold.
    pub fn from_score(total_score: f64) -> Self {
        if total_score >= HOT_THRESHOLD {
            Self::Hot
        } else if total_score >= WARM_THRESHOLD {
            Self::Warm
        } else {
            Self::Cold
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "Hot",
            Self::Warm => "Warm",
            Self::Cold => "Cold",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualitative engagement of a group, using the same cutoffs as [`Category`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngagementLevel {
    High,
    Medium,
    Low,
}

impl EngagementLevel {
    pub fn from_avg_score(avg_score: f64) -> Self {
        if avg_score >= HOT_THRESHOLD {
            Self::High
        } else if avg_score >= WARM_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

/// The four additive score components, each already clamped to its cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    /// `0..=40`
    pub attendance: f64,
    /// `0..=30`
    pub chat: f64,
    /// `0..=20`
    pub questions: f64,
    /// `0` or `10`
    pub stayed_to_end: f64,
}

impl ComponentScores {
    pub fn total(&self) -> f64 {
        self.attendance + self.chat + self.questions + self.stayed_to_end
    }
}

/// An attendee joined with their chat activity and CRM lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredParticipant {
    pub email: String,
    pub display_name: String,
    pub duration_minutes: f64,
    pub components: ComponentScores,
    pub total_score: f64,
    pub category: Category,
    pub owner_name: String,
    pub profile: String,
    pub experience_years: Option<f64>,
    pub experience_bracket: ExperienceBracket,
    pub lead_name: Option<String>,
    pub message_count: usize,
    pub question_count: usize,
    pub matched_lead: bool,
}

// ── Warnings ──────────────────────────────────────────────────────────────────

/// Non-fatal conditions surfaced next to successful results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadWarning {
    DuplicateRowsCollapsed { count: usize },
    TeamMemberExcluded { count: usize },
    NoProfileData,
    NoExperienceData,
    UnmatchedColumn { field: String },
    SourceSkipped { source: String, reason: String },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateRowsCollapsed { count } => {
                write!(f, "{} duplicate row(s) collapsed into earlier rows", count)
            }
            Self::TeamMemberExcluded { count } => {
                write!(f, "{} row(s) excluded as internal team members", count)
            }
            Self::NoProfileData => f.write_str("no profile/industry column found"),
            Self::NoExperienceData => f.write_str("no experience column found"),
            Self::UnmatchedColumn { field } => write!(f, "no column found for {}", field),
            Self::SourceSkipped { source, reason } => {
                write!(f, "{} source skipped: {}", source, reason)
            }
        }
    }
}
