//! Grouped engagement statistics by owner, profile and experience bracket,
//! plus owner follow-up worklists and profile recommendations.

use std::collections::HashMap;

use insight_core::models::{
    Category, EngagementLevel, ExperienceBracket, ScoredParticipant, HOT_THRESHOLD,
    UNKNOWN_PROFILE,
};
use insight_core::settings::DEFAULT_MIN_SCORE;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Duration that counts as "stayed the hour" in group statistics.
const STAYED_HOUR_MINUTES: f64 = 60.0;

/// Profiles averaging at least this are listed as most engaged.
const MOST_ENGAGED_MIN_SCORE: f64 = 60.0;
/// Profiles averaging below this are listed as least engaged.
const LEAST_ENGAGED_MAX_SCORE: f64 = 40.0;
/// Average minutes below which a weak profile is treated as leaving early.
const EARLY_EXIT_MINUTES: f64 = 30.0;
/// Average chat score below which a weak profile is treated as silent.
const SILENT_CHAT_SCORE: f64 = 10.0;

/// Field to group scored participants by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupDimension {
    Owner,
    Profile,
    ExperienceBracket,
}

// ── GroupAccumulator ──────────────────────────────────────────────────────────

/// Running sums for one group.
#[derive(Debug, Clone, Default)]
struct GroupAccumulator {
    count: usize,
    score_sum: f64,
    duration_sum: f64,
    attendance_sum: f64,
    chat_sum: f64,
    question_sum: f64,
    hot: usize,
    warm: usize,
    cold: usize,
    stayed_60_plus: usize,
    inactive: usize,
}

impl GroupAccumulator {
    fn add(&mut self, p: &ScoredParticipant, min_score: f64) {
        self.count += 1;
        self.score_sum += p.total_score;
        self.duration_sum += p.duration_minutes;
        self.attendance_sum += p.components.attendance;
        self.chat_sum += p.components.chat;
        self.question_sum += p.components.questions;
        match p.category {
            Category::Hot => self.hot += 1,
            Category::Warm => self.warm += 1,
            Category::Cold => self.cold += 1,
        }
        if p.duration_minutes >= STAYED_HOUR_MINUTES {
            self.stayed_60_plus += 1;
        }
        if p.total_score < min_score {
            self.inactive += 1;
        }
    }

    fn finish(self, key: String) -> GroupSummary {
        let n = self.count.max(1) as f64;
        let avg_score = self.score_sum / n;
        GroupSummary {
            key,
            count: self.count,
            avg_score,
            avg_duration: self.duration_sum / n,
            hot_count: self.hot,
            warm_count: self.warm,
            cold_count: self.cold,
            hot_percentage: self.hot as f64 / n * 100.0,
            avg_attendance_score: self.attendance_sum / n,
            avg_chat_score: self.chat_sum / n,
            avg_question_score: self.question_sum / n,
            stayed_60_plus: self.stayed_60_plus,
            stayed_60_plus_pct: self.stayed_60_plus as f64 / n * 100.0,
            inactive_count: self.inactive,
            engagement_level: EngagementLevel::from_avg_score(avg_score),
        }
    }
}

// ── Output types ──────────────────────────────────────────────────────────────

/// Statistics for one group of scored participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    /// Owner name, profile or experience bracket label.
    pub key: String,
    pub count: usize,
    pub avg_score: f64,
    pub avg_duration: f64,
    pub hot_count: usize,
    pub warm_count: usize,
    pub cold_count: usize,
    pub hot_percentage: f64,
    pub avg_attendance_score: f64,
    pub avg_chat_score: f64,
    pub avg_question_score: f64,
    pub stayed_60_plus: usize,
    pub stayed_60_plus_pct: f64,
    /// Members scoring below the aggregator's inactive threshold.
    pub inactive_count: usize,
    pub engagement_level: EngagementLevel,
}

/// An owner's worklist of leads scoring below the threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnerFollowUp {
    pub owner_name: String,
    pub inactive_count: usize,
    /// All attendees assigned to this owner, inactive or not.
    pub total_leads: usize,
    pub leads: Vec<ScoredParticipant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Success,
    ContentMismatch,
    LowInteraction,
}

/// Advisory text derived from one profile's statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub profile: String,
    pub kind: RecommendationKind,
    pub message: String,
}

/// Highlights across the profile groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileInsights {
    pub best_profile: Option<GroupSummary>,
    pub worst_profile: Option<GroupSummary>,
    pub most_engaged: Vec<GroupSummary>,
    pub least_engaged: Vec<GroupSummary>,
    pub recommendations: Vec<Recommendation>,
}

// ── GroupAggregator ───────────────────────────────────────────────────────────

/// Groups scored participants. `min_score` decides who counts as inactive.
#[derive(Debug, Clone, Copy)]
pub struct GroupAggregator {
    min_score: f64,
}

impl Default for GroupAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SCORE)
    }
}

impl GroupAggregator {
    pub fn new(min_score: f64) -> Self {
        Self { min_score }
    }

    /// Group by `dimension` and order the groups for that dimension:
    ///
    /// * owner: most inactive leads first;
    /// * profile: highest mean score first, `Unknown` left out;
    /// * experience: highest mean score first, bracket order on ties.
    ///
    /// Remaining ties keep first-seen order.
    pub fn aggregate(
        &self,
        scored: &[ScoredParticipant],
        dimension: GroupDimension,
    ) -> Vec<GroupSummary> {
        let mut groups = match dimension {
            GroupDimension::Owner => self.aggregate_by_key(scored, |p| Some(p.owner_name.clone())),
            GroupDimension::Profile => self.aggregate_by_key(scored, |p| {
                (p.profile != UNKNOWN_PROFILE).then(|| p.profile.clone())
            }),
            GroupDimension::ExperienceBracket => {
                self.aggregate_by_key(scored, |p| Some(p.experience_bracket.as_str().to_string()))
            }
        };

        match dimension {
            GroupDimension::Owner => groups.sort_by(|a, b| b.inactive_count.cmp(&a.inactive_count)),
            GroupDimension::Profile => groups.sort_by(|a, b| b.avg_score.total_cmp(&a.avg_score)),
            GroupDimension::ExperienceBracket => groups.sort_by(|a, b| {
                b.avg_score
                    .total_cmp(&a.avg_score)
                    .then_with(|| bracket_rank(&a.key).cmp(&bracket_rank(&b.key)))
            }),
        }

        debug!(?dimension, groups = groups.len(), "Aggregated participants");
        groups
    }

    /// Worklists of leads below the threshold, busiest owner first.
    pub fn inactive_by_owner(&self, scored: &[ScoredParticipant]) -> Vec<OwnerFollowUp> {
        let mut order: Vec<String> = Vec::new();
        let mut by_owner: HashMap<String, OwnerFollowUp> = HashMap::new();

        for p in scored {
            let entry = by_owner.entry(p.owner_name.clone()).or_insert_with(|| {
                order.push(p.owner_name.clone());
                OwnerFollowUp {
                    owner_name: p.owner_name.clone(),
                    inactive_count: 0,
                    total_leads: 0,
                    leads: Vec::new(),
                }
            });
            entry.total_leads += 1;
            if p.total_score < self.min_score {
                entry.inactive_count += 1;
                entry.leads.push(p.clone());
            }
        }

        let mut follow_ups: Vec<OwnerFollowUp> = order
            .into_iter()
            .filter_map(|owner| by_owner.remove(&owner))
            .filter(|f| f.inactive_count > 0)
            .collect();
        follow_ups.sort_by(|a, b| b.inactive_count.cmp(&a.inactive_count));
        follow_ups
    }

    // ── Private ───────────────────────────────────────────────────────────────

    /// Group in first-seen key order. `key_fn` returning `None` skips a row.
    fn aggregate_by_key(
        &self,
        scored: &[ScoredParticipant],
        key_fn: impl Fn(&ScoredParticipant) -> Option<String>,
    ) -> Vec<GroupSummary> {
        let mut order: Vec<String> = Vec::new();
        let mut map: HashMap<String, GroupAccumulator> = HashMap::new();

        for p in scored {
            let Some(key) = key_fn(p) else { continue };
            map.entry(key.clone())
                .or_insert_with(|| {
                    order.push(key);
                    GroupAccumulator::default()
                })
                .add(p, self.min_score);
        }

        order
            .into_iter()
            .filter_map(|key| map.remove(&key).map(|acc| acc.finish(key)))
            .collect()
    }
}

/// Aggregate with the default inactive threshold.
pub fn aggregate_by(scored: &[ScoredParticipant], dimension: GroupDimension) -> Vec<GroupSummary> {
    GroupAggregator::default().aggregate(scored, dimension)
}

/// Leads scoring below `min_score`, grouped by owner.
pub fn inactive_leads_by_owner(scored: &[ScoredParticipant], min_score: f64) -> Vec<OwnerFollowUp> {
    GroupAggregator::new(min_score).inactive_by_owner(scored)
}

/// Best and worst profiles plus recommendations. `profiles` must already be
/// sorted by descending mean score, as [`GroupAggregator::aggregate`] returns
/// them.
pub fn profile_insights(profiles: &[GroupSummary]) -> ProfileInsights {
    ProfileInsights {
        best_profile: profiles.first().cloned(),
        worst_profile: profiles.last().cloned(),
        most_engaged: profiles
            .iter()
            .filter(|p| p.avg_score >= MOST_ENGAGED_MIN_SCORE)
            .cloned()
            .collect(),
        least_engaged: profiles
            .iter()
            .filter(|p| p.avg_score < LEAST_ENGAGED_MAX_SCORE)
            .cloned()
            .collect(),
        recommendations: profiles.iter().filter_map(recommend).collect(),
    }
}

fn recommend(profile: &GroupSummary) -> Option<Recommendation> {
    let (kind, message) = if profile.avg_score >= HOT_THRESHOLD {
        (
            RecommendationKind::Success,
            format!(
                "{} engages strongly (average score {:.1}/100). Build more sessions for this audience.",
                profile.key, profile.avg_score
            ),
        )
    } else if profile.avg_score < LEAST_ENGAGED_MAX_SCORE
        && profile.avg_duration < EARLY_EXIT_MINUTES
    {
        (
            RecommendationKind::ContentMismatch,
            format!(
                "{} leaves early (average {:.1} minutes). Bring their use cases forward and shorten the introduction.",
                profile.key, profile.avg_duration
            ),
        )
    } else if profile.avg_score < LEAST_ENGAGED_MAX_SCORE
        && profile.avg_chat_score < SILENT_CHAT_SCORE
    {
        (
            RecommendationKind::LowInteraction,
            format!(
                "{} stays but rarely chats (chat score {:.1}/30). Ask them direct questions or run a poll.",
                profile.key, profile.avg_chat_score
            ),
        )
    } else {
        return None;
    };

    Some(Recommendation {
        profile: profile.key.clone(),
        kind,
        message,
    })
}

fn bracket_rank(label: &str) -> usize {
    [
        ExperienceBracket::UpToFive,
        ExperienceBracket::SixToTen,
        ExperienceBracket::ElevenToFifteen,
        ExperienceBracket::SixteenToTwenty,
        ExperienceBracket::OverTwenty,
        ExperienceBracket::NotSpecified,
    ]
    .iter()
    .position(|b| b.as_str() == label)
    .unwrap_or(usize::MAX)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use insight_core::models::ComponentScores;

    fn scored(
        email: &str,
        owner: &str,
        profile: &str,
        score: f64,
        duration: f64,
    ) -> ScoredParticipant {
        ScoredParticipant {
            email: email.to_string(),
            display_name: email.to_string(),
            duration_minutes: duration,
            components: ComponentScores {
                attendance: score.min(40.0),
                chat: (score - 40.0).clamp(0.0, 30.0),
                questions: (score - 70.0).clamp(0.0, 20.0),
                stayed_to_end: (score - 90.0).clamp(0.0, 10.0),
            },
            total_score: score,
            category: Category::from_score(score),
            owner_name: owner.to_string(),
            profile: profile.to_string(),
            experience_years: None,
            experience_bracket: ExperienceBracket::NotSpecified,
            lead_name: None,
            message_count: 0,
            question_count: 0,
            matched_lead: true,
        }
    }

    fn with_bracket(mut p: ScoredParticipant, bracket: ExperienceBracket) -> ScoredParticipant {
        p.experience_bracket = bracket;
        p
    }

    fn sample() -> Vec<ScoredParticipant> {
        vec![
            scored("a@x.com", "Priya", "Finance", 80.0, 70.0),
            scored("b@x.com", "Priya", "Finance", 20.0, 10.0),
            scored("c@x.com", "Arjun", "IT", 30.0, 50.0),
            scored("d@x.com", "Arjun", "IT", 10.0, 5.0),
            scored("e@x.com", "Arjun", UNKNOWN_PROFILE, 50.0, 40.0),
            scored("f@x.com", "Unassigned", "Health", 45.0, 60.0),
        ]
    }

    // ── Owner ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_owner_groups_sorted_by_inactive_count() {
        let groups = aggregate_by(&sample(), GroupDimension::Owner);
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["Arjun", "Priya", "Unassigned"]);
        assert_eq!(groups[0].inactive_count, 2);
        assert_eq!(groups[0].count, 3);
        assert_eq!(groups[2].inactive_count, 0);
    }

    #[test]
    fn test_group_statistics() {
        let groups = aggregate_by(&sample(), GroupDimension::Owner);
        let priya = groups.iter().find(|g| g.key == "Priya").expect("priya");

        assert_eq!(priya.count, 2);
        assert!((priya.avg_score - 50.0).abs() < 1e-9);
        assert!((priya.avg_duration - 40.0).abs() < 1e-9);
        assert_eq!((priya.hot_count, priya.warm_count, priya.cold_count), (1, 0, 1));
        assert!((priya.hot_percentage - 50.0).abs() < 1e-9);
        assert_eq!(priya.stayed_60_plus, 1);
        assert!((priya.stayed_60_plus_pct - 50.0).abs() < 1e-9);
        assert_eq!(priya.engagement_level, EngagementLevel::Medium);
    }

    // ── Profile ───────────────────────────────────────────────────────────────

    #[test]
    fn test_profile_groups_skip_unknown_and_sort_by_score() {
        let groups = aggregate_by(&sample(), GroupDimension::Profile);
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["Finance", "Health", "IT"]);
        assert_eq!(groups[2].engagement_level, EngagementLevel::Low);
    }

    #[test]
    fn test_profile_insights_and_recommendations() {
        let mut people = sample();
        people.push(scored("g@x.com", "Priya", "Legal", 90.0, 80.0));
        let profiles = aggregate_by(&people, GroupDimension::Profile);
        let insights = profile_insights(&profiles);

        assert_eq!(insights.best_profile.as_ref().map(|p| p.key.as_str()), Some("Legal"));
        assert_eq!(insights.worst_profile.as_ref().map(|p| p.key.as_str()), Some("IT"));
        assert_eq!(insights.most_engaged.len(), 1);
        assert_eq!(insights.least_engaged.len(), 1);

        let kinds: Vec<(&str, RecommendationKind)> = insights
            .recommendations
            .iter()
            .map(|r| (r.profile.as_str(), r.kind))
            .collect();
        // IT: average 20, average duration 27.5 minutes.
        assert_eq!(
            kinds,
            vec![
                ("Legal", RecommendationKind::Success),
                ("IT", RecommendationKind::ContentMismatch)
            ]
        );
    }

    #[test]
    fn test_low_interaction_recommendation() {
        let profiles = aggregate_by(
            &[scored("a@x.com", "P", "Ops", 30.0, 55.0)],
            GroupDimension::Profile,
        );
        let insights = profile_insights(&profiles);
        assert_eq!(insights.recommendations.len(), 1);
        assert_eq!(insights.recommendations[0].kind, RecommendationKind::LowInteraction);
        assert!(insights.recommendations[0].message.starts_with("Ops"));
    }

    #[test]
    fn test_profile_insights_empty() {
        let insights = profile_insights(&[]);
        assert!(insights.best_profile.is_none());
        assert!(insights.recommendations.is_empty());
    }

    // ── Experience ────────────────────────────────────────────────────────────

    #[test]
    fn test_experience_ties_use_bracket_order() {
        let people = vec![
            with_bracket(scored("a@x.com", "P", "F", 50.0, 10.0), ExperienceBracket::OverTwenty),
            with_bracket(scored("b@x.com", "P", "F", 50.0, 10.0), ExperienceBracket::UpToFive),
            with_bracket(scored("c@x.com", "P", "F", 70.0, 10.0), ExperienceBracket::NotSpecified),
        ];
        let groups = aggregate_by(&people, GroupDimension::ExperienceBracket);
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["Not Specified", "0-5 years", "20+ years"]);
        assert_eq!(groups[0].engagement_level, EngagementLevel::High);
    }

    // ── Follow-ups ────────────────────────────────────────────────────────────

    #[test]
    fn test_inactive_leads_by_owner() {
        let follow_ups = inactive_leads_by_owner(&sample(), 40.0);

        let owners: Vec<(&str, usize, usize)> = follow_ups
            .iter()
            .map(|f| (f.owner_name.as_str(), f.inactive_count, f.total_leads))
            .collect();
        assert_eq!(owners, vec![("Arjun", 2, 3), ("Priya", 1, 2)]);
        assert!(follow_ups
            .iter()
            .flat_map(|f| f.leads.iter())
            .all(|p| p.total_score < 40.0));
    }

    #[test]
    fn test_inactive_threshold_is_caller_supplied() {
        let follow_ups = inactive_leads_by_owner(&sample(), 60.0);
        let total: usize = follow_ups.iter().map(|f| f.inactive_count).sum();
        assert_eq!(total, 5);
        assert_eq!(follow_ups[0].owner_name, "Arjun");
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate_by(&[], GroupDimension::Owner).is_empty());
        assert!(inactive_leads_by_owner(&[], 40.0).is_empty());
    }
}
