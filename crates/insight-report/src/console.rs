use std::fmt::Write;

use insight_core::formatting::{format_minutes, format_number, format_percentage};
use insight_data::analysis::AnalysisResult;
use insight_data::timeline::RetentionBuckets;

/// Plain-text summary of a run for the terminal.
pub fn render_summary(result: &AnalysisResult) -> String {
    let mut output = String::new();
    let summary = &result.summary;

    let _ = writeln!(output, "# Masterclass Engagement Report");
    let _ = writeln!(
        output,
        "Session length {} sampled every {} min",
        format_minutes(result.metadata.session_minutes),
        result.metadata.interval_minutes
    );
    let _ = writeln!(output);

    let _ = writeln!(output, "## Participants");
    let _ = writeln!(output, "Total: {}", summary.total_participants);
    let _ = writeln!(
        output,
        "Average time in session: {}",
        format_minutes(summary.avg_duration_mins)
    );
    let _ = writeln!(
        output,
        "Hot: {} | Warm: {} | Cold: {}",
        summary.hot_leads, summary.warm_leads, summary.cold_leads
    );
    let _ = writeln!(
        output,
        "Chat messages: {} ({} questions)",
        summary.total_chat_messages, summary.total_questions
    );
    if result.metadata.leads_loaded > 0 {
        let _ = writeln!(
            output,
            "CRM match rate: {}",
            format_percentage(result.metadata.match_rate * 100.0)
        );
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "## Retention");
    let retention = &result.timeline.retention;
    write_buckets(&mut output, "Everyone", &retention.overall);
    if let Some(admitted) = &retention.admitted {
        let _ = writeln!(
            output,
            "Waiting room: {} never admitted",
            retention.waiting_room_count
        );
        write_buckets(&mut output, "Admitted", admitted);
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "## Critical Drop-offs");
    let dropoffs: Vec<_> = result
        .timeline
        .critical_dropoffs
        .iter()
        .filter(|d| d.drop > 0.0)
        .collect();
    if dropoffs.is_empty() {
        let _ = writeln!(output, "No drop-offs recorded.");
    } else {
        for d in dropoffs {
            let _ = writeln!(
                output,
                "- minute {}: -{} ({} still present)",
                d.minute,
                format_percentage(d.drop),
                format_percentage(d.percentage)
            );
        }
    }

    if let Some(best) = &result.profile_insights.best_profile {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Profiles");
        let _ = writeln!(
            output,
            "Top profile: {} (avg score {}, {} attendees)",
            best.key,
            format_number(best.avg_score, 1),
            best.count
        );
        for rec in &result.profile_insights.recommendations {
            let _ = writeln!(output, "- {}", rec.message);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Owner Follow-ups");
    if result.follow_ups.is_empty() {
        let _ = writeln!(output, "No inactive leads below {}.", result.metadata.min_score);
    } else {
        for f in &result.follow_ups {
            let _ = writeln!(
                output,
                "- {}: {} inactive of {} leads",
                f.owner_name, f.inactive_count, f.total_leads
            );
        }
    }

    if !result.warnings.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Warnings ({})", result.warnings.len());
        for w in &result.warnings {
            let _ = writeln!(output, "- {}", w);
        }
    }

    output
}

fn write_buckets(output: &mut String, label: &str, buckets: &RetentionBuckets) {
    let _ = writeln!(
        output,
        "{} ({}): left within 5 min {} ({}), within 10 min {} ({}), stayed 60+ {} ({}), stayed 100+ {} ({})",
        label,
        buckets.population,
        buckets.left_within_5.count,
        format_percentage(buckets.left_within_5.percentage),
        buckets.left_within_10.count,
        format_percentage(buckets.left_within_10.percentage),
        buckets.stayed_60_plus.count,
        format_percentage(buckets.stayed_60_plus.percentage),
        buckets.stayed_100_plus.count,
        format_percentage(buckets.stayed_100_plus.percentage),
    );
}
