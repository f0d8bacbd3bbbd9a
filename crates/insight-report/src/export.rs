//! Flat-file export of an analysis run.
//!
//! Tables go to CSV, summaries to pretty JSON. Every file is written to a
//! temporary sibling and renamed into place so a failed run never leaves a
//! half-written file behind.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use insight_core::error::{InsightError, Result};
use insight_core::formatting::{round1, sanitize_file_component};
use insight_core::models::{Category, LoadWarning, ScoredParticipant};
use insight_data::aggregator::GroupSummary;
use insight_data::analysis::{AnalysisMetadata, AnalysisResult};
use insight_data::timeline::{DropOff, TimelinePoint};
use serde::Serialize;
use tracing::{debug, info};

pub const ENGAGEMENT_SCORES_FILE: &str = "engagement_scores.csv";
pub const HOT_LEADS_FILE: &str = "hot_leads_priority.csv";
pub const EXIT_TIMELINE_FILE: &str = "exit_timeline.csv";
pub const CRITICAL_DROPOFFS_FILE: &str = "critical_dropoffs.csv";
pub const OWNER_SUMMARY_FILE: &str = "owner_summary.csv";
pub const PROFILE_ANALYSIS_FILE: &str = "profile_analysis.csv";
pub const EXPERIENCE_ANALYSIS_FILE: &str = "experience_analysis.csv";
pub const SUMMARY_FILE: &str = "summary.json";
pub const PROFILE_INSIGHTS_FILE: &str = "profile_insights.json";
pub const RETENTION_FILE: &str = "retention.json";
pub const RUN_METADATA_FILE: &str = "run_metadata.json";

/// Files written by [`export_results`], in write order.
#[derive(Debug, Clone, Default)]
pub struct ExportManifest {
    pub output_dir: PathBuf,
    pub files: Vec<PathBuf>,
}

impl ExportManifest {
    pub fn contains(&self, file_name: &str) -> bool {
        self.files
            .iter()
            .any(|f| f.file_name().and_then(|n| n.to_str()) == Some(file_name))
    }
}

// ── Row types ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ParticipantRow<'a> {
    email: &'a str,
    name: &'a str,
    lead_name: Option<&'a str>,
    duration_mins: f64,
    attendance_score: f64,
    chat_score: f64,
    question_score: f64,
    stayed_till_end_score: f64,
    total_score: f64,
    category: &'static str,
    owner_name: &'a str,
    profile: &'a str,
    experience_years: Option<f64>,
    experience_bracket: &'static str,
    message_count: usize,
    question_count: usize,
    matched_crm: bool,
}

impl<'a> From<&'a ScoredParticipant> for ParticipantRow<'a> {
    fn from(p: &'a ScoredParticipant) -> Self {
        Self {
            email: &p.email,
            name: &p.display_name,
            lead_name: p.lead_name.as_deref(),
            duration_mins: round1(p.duration_minutes),
            attendance_score: round1(p.components.attendance),
            chat_score: round1(p.components.chat),
            question_score: round1(p.components.questions),
            stayed_till_end_score: round1(p.components.stayed_to_end),
            total_score: round1(p.total_score),
            category: p.category.as_str(),
            owner_name: &p.owner_name,
            profile: &p.profile,
            experience_years: p.experience_years,
            experience_bracket: p.experience_bracket.as_str(),
            message_count: p.message_count,
            question_count: p.question_count,
            matched_crm: p.matched_lead,
        }
    }
}

#[derive(Debug, Serialize)]
struct TimelineRow {
    minute: u32,
    attendees: usize,
    percentage: f64,
    drop: f64,
}

impl From<&TimelinePoint> for TimelineRow {
    fn from(p: &TimelinePoint) -> Self {
        Self {
            minute: p.minute,
            attendees: p.attendees,
            percentage: round1(p.percentage),
            drop: round1(p.drop),
        }
    }
}

#[derive(Debug, Serialize)]
struct DropOffRow {
    minute: u32,
    drop: f64,
    percentage: f64,
}

impl From<&DropOff> for DropOffRow {
    fn from(d: &DropOff) -> Self {
        Self {
            minute: d.minute,
            drop: round1(d.drop),
            percentage: round1(d.percentage),
        }
    }
}

#[derive(Debug, Serialize)]
struct GroupRow<'a> {
    group: &'a str,
    total_count: usize,
    avg_score: f64,
    avg_duration: f64,
    hot_count: usize,
    warm_count: usize,
    cold_count: usize,
    hot_percentage: f64,
    avg_attendance_score: f64,
    avg_chat_score: f64,
    avg_question_score: f64,
    stayed_60_plus: usize,
    stayed_60_plus_pct: f64,
    inactive_count: usize,
    engagement_level: &'static str,
}

impl<'a> From<&'a GroupSummary> for GroupRow<'a> {
    fn from(g: &'a GroupSummary) -> Self {
        Self {
            group: &g.key,
            total_count: g.count,
            avg_score: round1(g.avg_score),
            avg_duration: round1(g.avg_duration),
            hot_count: g.hot_count,
            warm_count: g.warm_count,
            cold_count: g.cold_count,
            hot_percentage: round1(g.hot_percentage),
            avg_attendance_score: round1(g.avg_attendance_score),
            avg_chat_score: round1(g.avg_chat_score),
            avg_question_score: round1(g.avg_question_score),
            stayed_60_plus: g.stayed_60_plus,
            stayed_60_plus_pct: round1(g.stayed_60_plus_pct),
            inactive_count: g.inactive_count,
            engagement_level: g.engagement_level.as_str(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RunMetadata<'a> {
    #[serde(flatten)]
    metadata: &'a AnalysisMetadata,
    warnings: &'a [LoadWarning],
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Write every artifact of `result` under `output_dir`, creating it if needed.
///
/// Tables with no rows are skipped. The summary, retention and metadata JSON
/// files are always written.
pub fn export_results(result: &AnalysisResult, output_dir: &Path) -> Result<ExportManifest> {
    std::fs::create_dir_all(output_dir).map_err(|source| InsightError::FileRead {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let mut manifest = ExportManifest {
        output_dir: output_dir.to_path_buf(),
        files: Vec::new(),
    };
    let mut write_table = |name: &str, bytes: Option<Vec<u8>>| -> Result<()> {
        if let Some(bytes) = bytes {
            let path = output_dir.join(name);
            write_atomic(&path, &bytes)?;
            manifest.files.push(path);
        }
        Ok(())
    };

    write_table(
        ENGAGEMENT_SCORES_FILE,
        csv_bytes(result.scored.iter().map(ParticipantRow::from))?,
    )?;
    write_table(
        HOT_LEADS_FILE,
        csv_bytes(hot_leads(&result.scored).into_iter().map(ParticipantRow::from))?,
    )?;
    write_table(
        EXIT_TIMELINE_FILE,
        csv_bytes(result.timeline.points.iter().map(TimelineRow::from))?,
    )?;
    write_table(
        CRITICAL_DROPOFFS_FILE,
        csv_bytes(result.timeline.critical_dropoffs.iter().map(DropOffRow::from))?,
    )?;
    write_table(
        OWNER_SUMMARY_FILE,
        csv_bytes(result.owner_groups.iter().map(GroupRow::from))?,
    )?;
    write_table(
        PROFILE_ANALYSIS_FILE,
        csv_bytes(result.profile_groups.iter().map(GroupRow::from))?,
    )?;
    write_table(
        EXPERIENCE_ANALYSIS_FILE,
        csv_bytes(result.experience_groups.iter().map(GroupRow::from))?,
    )?;

    let mut used_names: HashSet<String> = HashSet::new();
    for follow_up in &result.follow_ups {
        let name = unique_follow_up_name(&follow_up.owner_name, &mut used_names);
        write_table(&name, csv_bytes(follow_up.leads.iter().map(ParticipantRow::from))?)?;
    }

    write_table(SUMMARY_FILE, Some(json_bytes(&result.summary)?))?;
    if result.profile_insights.best_profile.is_some() {
        write_table(PROFILE_INSIGHTS_FILE, Some(json_bytes(&result.profile_insights)?))?;
    }
    write_table(RETENTION_FILE, Some(json_bytes(&result.timeline.retention)?))?;
    write_table(
        RUN_METADATA_FILE,
        Some(json_bytes(&RunMetadata {
            metadata: &result.metadata,
            warnings: &result.warnings,
        })?),
    )?;

    info!(
        "Exported {} files to {}",
        manifest.files.len(),
        output_dir.display()
    );
    Ok(manifest)
}

/// Hot participants, highest score first.
pub fn hot_leads(scored: &[ScoredParticipant]) -> Vec<&ScoredParticipant> {
    let mut hot: Vec<&ScoredParticipant> = scored
        .iter()
        .filter(|p| p.category == Category::Hot)
        .collect();
    hot.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));
    hot
}

// ── Private helpers ───────────────────────────────────────────────────────────

/// Serialize rows to CSV, `None` when there are no rows.
fn csv_bytes<T: Serialize>(rows: impl IntoIterator<Item = T>) -> Result<Option<Vec<u8>>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut count = 0usize;
    for row in rows {
        writer.serialize(row)?;
        count += 1;
    }
    if count == 0 {
        return Ok(None);
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| InsightError::Io(e.into_error()))?;
    Ok(Some(bytes))
}

fn json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(value)?)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    debug!("Wrote {}", path.display());
    Ok(())
}

fn unique_follow_up_name(owner: &str, used: &mut HashSet<String>) -> String {
    let base = format!("followup_{}", sanitize_file_component(owner));
    let mut name = format!("{}.csv", base);
    let mut n = 2;
    while !used.insert(name.clone()) {
        name = format!("{}_{}.csv", base, n);
        n += 1;
    }
    name
}

// ── Tests ─────────────────────────────────────────────────────────────────────
