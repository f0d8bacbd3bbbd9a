//! Engagement scoring.
//!
//! Each attendee earns four capped components:
//!
//! | component | formula | cap |
//! |---|---|---|
//! | attendance | `duration / D * 40` | 40 |
//! | chat | `messages * 5` | 30 |
//! | questions | `questions * 10` | 20 |
//! | stayed to end | `10` when `duration >= 0.8 * D` | 10 |
//!
//! Chat messages are attributed to an attendee when the sender field
//! contains the attendee's email or, failing that, their lowercased first
//! name. The first-name rule is loose: two attendees named "Priya" both
//! collect each other's messages. Exports rarely carry anything better.

use insight_core::error::ConfigError;
use insight_core::models::{
    Category, ChatMessage, ComponentScores, ExperienceBracket, ScoredParticipant,
    UNASSIGNED_OWNER, UNKNOWN_PROFILE,
};
use insight_core::settings::validate_session_minutes;
use tracing::debug;

use crate::matcher::{MatchedParticipant, MatchedTable};

pub const ATTENDANCE_MAX: f64 = 40.0;
pub const CHAT_MAX: f64 = 30.0;
pub const QUESTIONS_MAX: f64 = 20.0;
pub const STAYED_TO_END_POINTS: f64 = 10.0;

const POINTS_PER_MESSAGE: f64 = 5.0;
const POINTS_PER_QUESTION: f64 = 10.0;
const STAYED_TO_END_FRACTION: f64 = 0.8;

/// Scores attendees against a fixed session length.
#[derive(Debug, Clone, Copy)]
pub struct EngagementScorer {
    session_minutes: f64,
}

impl EngagementScorer {
    /// Rejects a session length that is not a positive, finite number.
    pub fn new(session_minutes: f64) -> Result<Self, ConfigError> {
        validate_session_minutes(session_minutes)?;
        Ok(Self { session_minutes })
    }

    pub fn session_minutes(&self) -> f64 {
        self.session_minutes
    }

    /// Component scores for one attendee given their chat activity.
    pub fn components(&self, duration: f64, messages: usize, questions: usize) -> ComponentScores {
        let duration = duration.max(0.0);
        ComponentScores {
            attendance: (duration / self.session_minutes * ATTENDANCE_MAX).min(ATTENDANCE_MAX),
            chat: (messages as f64 * POINTS_PER_MESSAGE).min(CHAT_MAX),
            questions: (questions as f64 * POINTS_PER_QUESTION).min(QUESTIONS_MAX),
            stayed_to_end: if duration >= STAYED_TO_END_FRACTION * self.session_minutes {
                STAYED_TO_END_POINTS
            } else {
                0.0
            },
        }
    }

    /// Score one matched attendee.
    pub fn score(
        &self,
        participant: &MatchedParticipant,
        chat: &[ChatMessage],
    ) -> ScoredParticipant {
        let record = &participant.attendance;
        let first_name = record.first_name_token();
        let attributed: Vec<&ChatMessage> = chat
            .iter()
            .filter(|m| is_sender_match(&record.email, first_name.as_deref(), &m.sender_name))
            .collect();
        let message_count = attributed.len();
        let question_count = attributed.iter().filter(|m| m.is_question).count();

        let components = self.components(record.duration_minutes, message_count, question_count);
        let total_score = components.total();
        let lead = participant.lead.as_ref();

        ScoredParticipant {
            email: record.email.clone(),
            display_name: record.display_name.clone(),
            duration_minutes: record.duration_minutes,
            components,
            total_score,
            category: Category::from_score(total_score),
            owner_name: lead
                .map(|l| l.owner_name.clone())
                .unwrap_or_else(|| UNASSIGNED_OWNER.to_string()),
            profile: lead
                .map(|l| l.profile.clone())
                .unwrap_or_else(|| UNKNOWN_PROFILE.to_string()),
            experience_years: lead.and_then(|l| l.experience_years),
            experience_bracket: lead
                .map(|l| l.experience_bracket)
                .unwrap_or(ExperienceBracket::NotSpecified),
            lead_name: lead.and_then(|l| l.lead_name.clone()),
            message_count,
            question_count,
            matched_lead: lead.is_some(),
        }
    }
}

/// Score every matched attendee, preserving order.
pub fn score_participants(
    matched: &MatchedTable,
    chat: &[ChatMessage],
    session_minutes: f64,
) -> Result<Vec<ScoredParticipant>, ConfigError> {
    let scorer = EngagementScorer::new(session_minutes)?;
    let scored: Vec<ScoredParticipant> = matched
        .participants
        .iter()
        .map(|p| scorer.score(p, chat))
        .collect();
    debug!(
        participants = scored.len(),
        messages = chat.len(),
        "Scored participants against a {} minute session",
        session_minutes
    );
    Ok(scored)
}

/// Whether a chat sender refers to this attendee.
fn is_sender_match(email: &str, first_name: Option<&str>, sender: &str) -> bool {
    let sender = sender.to_lowercase();
    if !email.is_empty() && sender.contains(email) {
        return true;
    }
    match first_name {
        Some(name) if !name.is_empty() => sender.contains(name),
        _ => false,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
