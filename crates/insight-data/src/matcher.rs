//! Left join of attendees onto CRM leads by normalized email.

use std::collections::HashMap;

use insight_core::models::{AttendanceRecord, AttendanceTable, LeadRecord, LeadTable};
use serde::Serialize;
use tracing::info;

/// An attendee and the CRM lead it matched, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedParticipant {
    pub attendance: AttendanceRecord,
    pub lead: Option<LeadRecord>,
}

/// One entry per attendee, in attendance order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchedTable {
    pub participants: Vec<MatchedParticipant>,
    pub matched_count: usize,
}

impl MatchedTable {
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Fraction of attendees with a CRM match, `0.0` for an empty table.
    pub fn match_rate(&self) -> f64 {
        if self.participants.is_empty() {
            0.0
        } else {
            self.matched_count as f64 / self.participants.len() as f64
        }
    }
}

/// Attach the first lead with the same email to every attendee.
///
/// The output always has exactly as many entries as `attendance`.
pub fn match_leads(attendance: &AttendanceTable, leads: &LeadTable) -> MatchedTable {
    let mut first_by_email: HashMap<&str, &LeadRecord> = HashMap::with_capacity(leads.len());
    for lead in &leads.records {
        first_by_email.entry(lead.email.as_str()).or_insert(lead);
    }

    let participants: Vec<MatchedParticipant> = attendance
        .records
        .iter()
        .map(|record| MatchedParticipant {
            attendance: record.clone(),
            lead: first_by_email.get(record.email.as_str()).map(|l| (*l).clone()),
        })
        .collect();
    let matched_count = participants.iter().filter(|p| p.lead.is_some()).count();

    let table = MatchedTable {
        participants,
        matched_count,
    };
    info!(
        matched = table.matched_count,
        total = table.len(),
        "CRM match rate {:.1}%",
        table.match_rate() * 100.0
    );
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use insight_core::models::ExperienceBracket;

    fn attendee(email: &str) -> AttendanceRecord {
        AttendanceRecord {
            email: email.to_string(),
            display_name: email.to_string(),
            duration_minutes: 30.0,
            waiting_room: None,
            join_time: None,
            leave_time: None,
        }
    }

    fn lead(email: &str, owner: &str) -> LeadRecord {
        LeadRecord {
            email: email.to_string(),
            owner_name: owner.to_string(),
            profile: "Finance".to_string(),
            experience_years: Some(3.0),
            experience_bracket: ExperienceBracket::UpToFive,
            lead_name: None,
        }
    }

    fn attendance(emails: &[&str]) -> AttendanceTable {
        AttendanceTable {
            records: emails.iter().map(|e| attendee(e)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_left_join_keeps_every_attendee() {
        let a = attendance(&["a@x.com", "b@x.com", "c@x.com"]);
        let l = LeadTable {
            records: vec![lead("b@x.com", "Priya"), lead("z@x.com", "Arjun")],
        };
        let matched = match_leads(&a, &l);

        assert_eq!(matched.len(), a.len());
        assert_eq!(matched.matched_count, 1);
        assert!(matched.participants[0].lead.is_none());
        assert_eq!(
            matched.participants[1].lead.as_ref().map(|l| l.owner_name.as_str()),
            Some("Priya")
        );
        assert!((matched.match_rate() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_leads_keeps_cardinality() {
        let a = attendance(&["a@x.com", "b@x.com"]);
        let matched = match_leads(&a, &LeadTable::default());
        assert_eq!(matched.len(), 2);
        assert_eq!(matched.matched_count, 0);
        assert_eq!(matched.match_rate(), 0.0);
    }

    #[test]
    fn test_empty_attendance() {
        let l = LeadTable {
            records: vec![lead("a@x.com", "Priya")],
        };
        let matched = match_leads(&AttendanceTable::default(), &l);
        assert!(matched.is_empty());
        assert_eq!(matched.match_rate(), 0.0);
    }

    #[test]
    fn test_duplicate_leads_first_wins() {
        let a = attendance(&["a@x.com"]);
        let l = LeadTable {
            records: vec![lead("a@x.com", "First"), lead("a@x.com", "Second")],
        };
        let matched = match_leads(&a, &l);
        assert_eq!(matched.len(), 1);
        assert_eq!(
            matched.participants[0].lead.as_ref().map(|l| l.owner_name.as_str()),
            Some("First")
        );
    }
}
