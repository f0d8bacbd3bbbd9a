//! End-to-end engagement pipeline.
//!
//! Orchestrates loading, matching, scoring, the exit timeline and every
//! aggregation, returning an [`AnalysisResult`] ready for export.

use std::path::{Path, PathBuf};

use chrono::Utc;
use insight_core::error::{InsightError, Result};
use insight_core::models::{
    AttendanceLoadStats, AttendanceRecord, Category, ChatMessage, LeadTable, LoadWarning,
    ScoredParticipant,
};
use insight_core::settings::PipelineConfig;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::aggregator::{
    profile_insights, GroupAggregator, GroupDimension, GroupSummary, OwnerFollowUp,
    ProfileInsights,
};
use crate::attendance::load_attendance;
use crate::chat::{load_chat, ChatFormat, ChatLog};
use crate::leads::load_leads;
use crate::matcher::match_leads;
use crate::scorer::score_participants;
use crate::timeline::{ExitTimeline, ExitTimelineAnalyzer};

// ── Public types ──────────────────────────────────────────────────────────────

/// Where one input export comes from.
#[derive(Debug, Clone)]
pub enum Source {
    File(PathBuf),
    /// Already-read text, labelled for error messages.
    Text { label: String, text: String },
}

impl Source {
    pub fn text(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Text {
            label: label.into(),
            text: text.into(),
        }
    }

    /// Path or label used when reporting problems with this source.
    pub fn name(&self) -> PathBuf {
        match self {
            Self::File(path) => path.clone(),
            Self::Text { label, .. } => PathBuf::from(label),
        }
    }

    fn read(&self) -> Result<String> {
        match self {
            Self::File(path) => crate::read_source(path),
            Self::Text { text, .. } => Ok(text.clone()),
        }
    }

    /// Like `read`, but invalid UTF-8 in a file is replaced rather than fatal.
    fn read_lossy(&self) -> Result<String> {
        match self {
            Self::File(path) => crate::read_source_lossy(path),
            Self::Text { text, .. } => Ok(text.clone()),
        }
    }
}

/// The three exports of one session. Only attendance is mandatory.
#[derive(Debug, Clone)]
pub struct AnalysisInputs {
    pub attendance: Source,
    pub chat: Option<Source>,
    pub crm: Option<Source>,
}

impl AnalysisInputs {
    pub fn from_paths(participants: &Path, chat: Option<&Path>, crm: Option<&Path>) -> Self {
        Self {
            attendance: Source::File(participants.to_path_buf()),
            chat: chat.map(|p| Source::File(p.to_path_buf())),
            crm: crm.map(|p| Source::File(p.to_path_buf())),
        }
    }
}

/// Top-level counts for the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub total_participants: usize,
    pub hot_leads: usize,
    pub warm_leads: usize,
    pub cold_leads: usize,
    pub avg_duration_mins: f64,
    pub total_chat_messages: usize,
    pub total_questions: usize,
}

/// Metadata produced alongside the analysis result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// RFC 3339 timestamp when this result was generated.
    pub generated_at: String,
    pub session_minutes: f64,
    pub interval_minutes: u32,
    pub min_score: f64,
    pub attendance_stats: AttendanceLoadStats,
    pub leads_loaded: usize,
    pub leads_matched: usize,
    pub match_rate: f64,
    pub chat_messages: usize,
    pub chat_excluded_messages: usize,
    pub chat_format: Option<ChatFormat>,
    pub warning_count: usize,
    /// Wall-clock seconds spent reading and parsing the exports.
    pub load_time_seconds: f64,
    /// Wall-clock seconds spent matching, scoring and aggregating.
    pub analysis_time_seconds: f64,
}

/// The complete output of [`run_analysis`].
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// One entry per attendee, in attendance order.
    pub scored: Vec<ScoredParticipant>,
    pub timeline: ExitTimeline,
    pub owner_groups: Vec<GroupSummary>,
    pub profile_groups: Vec<GroupSummary>,
    pub experience_groups: Vec<GroupSummary>,
    pub follow_ups: Vec<OwnerFollowUp>,
    pub profile_insights: ProfileInsights,
    pub summary: SessionSummary,
    /// Every soft warning from every stage, in the order raised.
    pub warnings: Vec<LoadWarning>,
    pub metadata: AnalysisMetadata,
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Run the full pipeline.
///
/// 1. Validate `config`.
/// 2. Load attendance; any failure aborts the run.
/// 3. Load chat and CRM; a failure there is logged, recorded as
///    [`LoadWarning::SourceSkipped`] and the source treated as empty.
/// 4. Match, score, build the exit timeline and aggregate.
pub fn run_analysis(inputs: &AnalysisInputs, config: &PipelineConfig) -> Result<AnalysisResult> {
    config.validate()?;
    let timeline_analyzer =
        ExitTimelineAnalyzer::new(config.interval_minutes, config.top_dropoffs)?;

    // ── Step 1: Load ──────────────────────────────────────────────────────────
    let load_start = std::time::Instant::now();
    let mut warnings = Vec::new();

    let attendance_text = inputs.attendance.read()?;
    let (attendance, attendance_warnings) =
        load_attendance(&attendance_text, &config.exclusions).map_err(|source| {
            InsightError::SourceParse {
                path: inputs.attendance.name(),
                source,
            }
        })?;
    warnings.extend(attendance_warnings);

    let chat = match &inputs.chat {
        Some(source) => match source.read_lossy() {
            Ok(text) => load_chat(&text, &config.exclusions),
            Err(e) => {
                skip_source("chat", &e, &mut warnings);
                ChatLog::default()
            }
        },
        None => ChatLog::default(),
    };

    let leads = match &inputs.crm {
        Some(source) => match load_crm(source) {
            Ok((table, lead_warnings)) => {
                warnings.extend(lead_warnings);
                table
            }
            Err(e) => {
                skip_source("crm", &e, &mut warnings);
                LeadTable::default()
            }
        },
        None => LeadTable::default(),
    };
    let load_time = load_start.elapsed().as_secs_f64();

    // ── Step 2: Match and score ───────────────────────────────────────────────
    let analysis_start = std::time::Instant::now();
    let matched = match_leads(&attendance, &leads);
    let scored = score_participants(&matched, &chat.messages, config.session_minutes)?;

    // ── Step 3: Timeline and aggregates ───────────────────────────────────────
    let timeline = timeline_analyzer.analyze(&attendance.records, config.session_minutes)?;

    let aggregator = GroupAggregator::new(config.min_score);
    let owner_groups = aggregator.aggregate(&scored, GroupDimension::Owner);
    let profile_groups = aggregator.aggregate(&scored, GroupDimension::Profile);
    let experience_groups = aggregator.aggregate(&scored, GroupDimension::ExperienceBracket);
    let follow_ups = aggregator.inactive_by_owner(&scored);
    let insights = profile_insights(&profile_groups);

    let summary = build_summary(&scored, &attendance.records, &chat.messages);
    let analysis_time = analysis_start.elapsed().as_secs_f64();

    // ── Step 4: Build result ──────────────────────────────────────────────────
    let metadata = AnalysisMetadata {
        generated_at: Utc::now().to_rfc3339(),
        session_minutes: config.session_minutes,
        interval_minutes: config.interval_minutes,
        min_score: config.min_score,
        attendance_stats: attendance.stats.clone(),
        leads_loaded: leads.len(),
        leads_matched: matched.matched_count,
        match_rate: matched.match_rate(),
        chat_messages: chat.len(),
        chat_excluded_messages: chat.excluded_messages,
        chat_format: chat.format,
        warning_count: warnings.len(),
        load_time_seconds: load_time,
        analysis_time_seconds: analysis_time,
    };

    info!(
        participants = summary.total_participants,
        hot = summary.hot_leads,
        warm = summary.warm_leads,
        cold = summary.cold_leads,
        warnings = warnings.len(),
        "Analysis complete"
    );

    Ok(AnalysisResult {
        scored,
        timeline,
        owner_groups,
        profile_groups,
        experience_groups,
        follow_ups,
        profile_insights: insights,
        summary,
        warnings,
        metadata,
    })
}

/// Session-level counts. `avg_duration_mins` is over all attendees, `0` when
/// there are none.
pub fn build_summary(
    scored: &[ScoredParticipant],
    attendance: &[AttendanceRecord],
    chat: &[ChatMessage],
) -> SessionSummary {
    let count = |category: Category| scored.iter().filter(|p| p.category == category).count();
    let avg_duration_mins = if attendance.is_empty() {
        0.0
    } else {
        attendance.iter().map(|r| r.duration_minutes).sum::<f64>() / attendance.len() as f64
    };

    SessionSummary {
        total_participants: attendance.len(),
        hot_leads: count(Category::Hot),
        warm_leads: count(Category::Warm),
        cold_leads: count(Category::Cold),
        avg_duration_mins,
        total_chat_messages: chat.len(),
        total_questions: chat.iter().filter(|m| m.is_question).count(),
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn load_crm(source: &Source) -> Result<(LeadTable, Vec<LoadWarning>)> {
    let text = source.read()?;
    load_leads(&text).map_err(|e| InsightError::SourceParse {
        path: source.name(),
        source: e,
    })
}

fn skip_source(kind: &str, err: &InsightError, warnings: &mut Vec<LoadWarning>) {
    warn!("Continuing without {} data: {}", kind, err);
    warnings.push(LoadWarning::SourceSkipped {
        source: kind.to_string(),
        reason: err.to_string(),
    });
}

// ── Tests ─────────────────────────────────────────────────────────────────────
