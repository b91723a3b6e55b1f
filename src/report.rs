use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::Snapshot;
use crate::stats;

pub fn build_report(snapshot: &Snapshot, today: NaiveDate) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Unit Kurikulum Dashboard Report");
    let _ = writeln!(output, "Generated on {today}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Takwim");

    if snapshot.events.is_empty() {
        let _ = writeln!(output, "No calendar events available.");
    } else {
        let counts = stats::event_stats(&snapshot.events, today);
        let _ = writeln!(
            output,
            "- {} events, {} this month, {} upcoming across {} units",
            counts.total, counts.this_month, counts.upcoming, counts.units
        );
        if let Some(next) = stats::next_key_event(&snapshot.events, today) {
            let _ = writeln!(
                output,
                "- Next key event: {} on {} ({} days left)",
                next.program, next.date, next.days_left
            );
        }
        for event in stats::upcoming_events(&snapshot.events, today, 5) {
            let _ = writeln!(output, "- {} {} ({})", event.date, event.program, event.unit);
        }
        let important = stats::important_dates(&snapshot.events, today);
        if !important.is_empty() {
            let _ = writeln!(output);
            let _ = writeln!(output, "### Important dates");
            for event in important {
                let _ = writeln!(output, "- {} {}", event.date, event.program);
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## PBD Mastery");

    if snapshot.assessments.is_empty() {
        let _ = writeln!(output, "No assessment records available.");
    } else {
        for (subject, summary) in stats::core_summaries(&snapshot.assessments) {
            let _ = writeln!(
                output,
                "- {}: {} students, MTM {:.1}%, TP5-6 {:.1}%",
                subject.name(),
                summary.total,
                summary.mtm_pct,
                summary.quality_pct
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Headcount");

    if snapshot.headcount.is_empty() {
        let _ = writeln!(output, "No headcount targets available.");
    } else {
        let _ = writeln!(
            output,
            "Achievement against target: {:.1}%",
            stats::achievement_rate(&snapshot.headcount)
        );
        for record in &snapshot.headcount {
            let _ = writeln!(
                output,
                "- {}: TOV {} / ETR {} / AR {}",
                record.subject, record.baseline, record.target, record.achieved
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Programs");

    if snapshot.programs.is_empty() {
        let _ = writeln!(output, "No program activities recorded.");
    } else {
        let recent = stats::filter_programs(&snapshot.programs, &stats::ProgramFilter::default());
        for program in recent.iter().take(5) {
            let _ = writeln!(
                output,
                "- {} {} [{} / {}]",
                program.date, program.program, program.domain, program.unit
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Staff & Gallery");
    let _ = writeln!(output, "- {} teachers on the roster", snapshot.teachers.len());
    if !snapshot.teachers.is_empty() {
        let dist = stats::teacher_distribution(&snapshot.teachers);
        let _ = writeln!(
            output,
            "- {} specializations, largest: {}",
            dist.specialization_count,
            dist.specializations
                .iter()
                .take(3)
                .map(|(name, count)| format!("{name} ({count})"))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    let _ = writeln!(output, "- {} gallery images", snapshot.images.len());

    output
}
