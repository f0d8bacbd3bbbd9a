//! Exit timeline: who was still in the session at each sampled minute.

use insight_core::error::ConfigError;
use insight_core::models::AttendanceRecord;
use insight_core::settings::{
    validate_session_minutes, DEFAULT_INTERVAL_MINUTES, DEFAULT_TOP_DROPOFFS,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fixed retention cutoffs, in minutes.
pub const LEFT_EARLY_MINUTES: f64 = 5.0;
pub const LEFT_BY_TEN_MINUTES: f64 = 10.0;
pub const STAYED_HOUR_MINUTES: f64 = 60.0;
pub const STAYED_HUNDRED_MINUTES: f64 = 100.0;

/// One sample of the exit curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub minute: u32,
    /// Attendees whose total duration is at least `minute`.
    pub attendees: usize,
    pub percentage: f64,
    /// Absolute percentage change from the previous sample (0 for the first).
    pub drop: f64,
}

/// A sample flagged as one of the steepest drops.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DropOff {
    pub minute: u32,
    pub drop: f64,
    pub percentage: f64,
}

/// Count and share of a population falling in one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketCount {
    pub count: usize,
    pub percentage: f64,
}

impl BucketCount {
    fn of(count: usize, population: usize) -> Self {
        Self {
            count,
            percentage: percentage(count, population),
        }
    }
}

/// The four retention buckets for one population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RetentionBuckets {
    pub population: usize,
    pub left_within_5: BucketCount,
    pub left_within_10: BucketCount,
    pub stayed_60_plus: BucketCount,
    pub stayed_100_plus: BucketCount,
}

impl RetentionBuckets {
    fn from_durations(durations: &[f64]) -> Self {
        let n = durations.len();
        let count = |pred: &dyn Fn(f64) -> bool| durations.iter().filter(|d| pred(**d)).count();
        Self {
            population: n,
            left_within_5: BucketCount::of(count(&|d| d <= LEFT_EARLY_MINUTES), n),
            left_within_10: BucketCount::of(count(&|d| d <= LEFT_BY_TEN_MINUTES), n),
            stayed_60_plus: BucketCount::of(count(&|d| d >= STAYED_HOUR_MINUTES), n),
            stayed_100_plus: BucketCount::of(count(&|d| d >= STAYED_HUNDRED_MINUTES), n),
        }
    }
}

/// Retention for everyone and, when the export says who sat in the waiting
/// room, for admitted attendees only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetentionReport {
    pub total_participants: usize,
    pub has_waiting_room_data: bool,
    pub waiting_room_count: usize,
    pub admitted_count: usize,
    pub overall: RetentionBuckets,
    /// `None` without waiting-room data.
    pub admitted: Option<RetentionBuckets>,
    /// Mean duration over admitted attendees (everyone without waiting-room data).
    pub avg_duration_admitted: f64,
}

/// Everything the timeline analyzer produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExitTimeline {
    pub points: Vec<TimelinePoint>,
    pub critical_dropoffs: Vec<DropOff>,
    pub retention: RetentionReport,
}

/// Samples the attendance curve every `interval` minutes.
#[derive(Debug, Clone, Copy)]
pub struct ExitTimelineAnalyzer {
    interval: u32,
    top_k: usize,
}

impl Default for ExitTimelineAnalyzer {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL_MINUTES,
            top_k: DEFAULT_TOP_DROPOFFS,
        }
    }
}

impl ExitTimelineAnalyzer {
    pub fn new(interval: u32, top_k: usize) -> Result<Self, ConfigError> {
        if interval == 0 {
            return Err(ConfigError::InvalidInterval(interval));
        }
        if top_k == 0 {
            return Err(ConfigError::InvalidTopK(top_k));
        }
        Ok(Self { interval, top_k })
    }

    /// Build the curve for minutes `0, I, 2I, ... <= session_minutes`.
    pub fn analyze(
        &self,
        records: &[AttendanceRecord],
        session_minutes: f64,
    ) -> Result<ExitTimeline, ConfigError> {
        validate_session_minutes(session_minutes)?;

        let total = records.len();
        let mut points: Vec<TimelinePoint> = Vec::new();
        let mut minute: u32 = 0;
        while f64::from(minute) <= session_minutes {
            let attendees = records
                .iter()
                .filter(|r| r.duration_minutes >= f64::from(minute))
                .count();
            let pct = percentage(attendees, total);
            let drop = points.last().map(|prev| (prev.percentage - pct).abs()).unwrap_or(0.0);
            points.push(TimelinePoint {
                minute,
                attendees,
                percentage: pct,
                drop,
            });
            minute = match minute.checked_add(self.interval) {
                Some(next) => next,
                None => break,
            };
        }

        let critical_dropoffs = self.critical_dropoffs(&points);
        let retention = retention_report(records);
        debug!(
            samples = points.len(),
            dropoffs = critical_dropoffs.len(),
            "Exit timeline built"
        );

        Ok(ExitTimeline {
            points,
            critical_dropoffs,
            retention,
        })
    }

    /// Top-K samples by drop. Stable sort keeps ascending minute on ties.
    fn critical_dropoffs(&self, points: &[TimelinePoint]) -> Vec<DropOff> {
        let mut ranked: Vec<&TimelinePoint> = points.iter().collect();
        ranked.sort_by(|a, b| b.drop.total_cmp(&a.drop));
        ranked
            .into_iter()
            .take(self.top_k)
            .map(|p| DropOff {
                minute: p.minute,
                drop: p.drop,
                percentage: p.percentage,
            })
            .collect()
    }
}

/// Analyze with the default number of drop-off moments.
pub fn analyze_timeline(
    records: &[AttendanceRecord],
    session_minutes: f64,
    interval_minutes: u32,
) -> Result<ExitTimeline, ConfigError> {
    ExitTimelineAnalyzer::new(interval_minutes, DEFAULT_TOP_DROPOFFS)?
        .analyze(records, session_minutes)
}

/// Retention buckets and waiting-room split for an attendance set.
pub fn retention_report(records: &[AttendanceRecord]) -> RetentionReport {
    let has_waiting_room_data = records.iter().any(|r| r.waiting_room.is_some());
    let all: Vec<f64> = records.iter().map(|r| r.duration_minutes).collect();
    let admitted: Vec<f64> = records
        .iter()
        .filter(|r| r.is_admitted())
        .map(|r| r.duration_minutes)
        .collect();

    let admitted_durations = if has_waiting_room_data { &admitted } else { &all };
    let avg_duration_admitted = if admitted_durations.is_empty() {
        0.0
    } else {
        admitted_durations.iter().sum::<f64>() / admitted_durations.len() as f64
    };

    RetentionReport {
        total_participants: records.len(),
        has_waiting_room_data,
        waiting_room_count: records.len() - admitted.len(),
        admitted_count: admitted.len(),
        overall: RetentionBuckets::from_durations(&all),
        admitted: has_waiting_room_data.then(|| RetentionBuckets::from_durations(&admitted)),
        avg_duration_admitted,
    }
}

fn percentage(count: usize, population: usize) -> f64 {
    if population == 0 {
        0.0
    } else {
        count as f64 / population as f64 * 100.0
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
