use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::date::parse_flexible_date;
use crate::feeds::{sum_counts, DEFAULT_POSITION, DEFAULT_SPECIALIZATION};
use crate::models::{
    AssessmentRecord, CalendarEvent, Countdown, EventStats, HeadcountRecord, ImageAsset,
    ProgramActivity, StreamComparison, TeacherDistribution, TeacherRecord, TierSummary,
    YearBreakdown,
};

const KEY_EVENT_WORDS: [&str; 6] = ["UASA", "CUTI", "MESYUARAT", "PEPERIKSAAN", "BENGKEL", "SUKAN"];

/// Year-planner highlights: exams, holidays, festivals and the AGM.
const IMPORTANT_DATE_WORDS: [&str; 9] = [
    "UASA",
    "CUTI",
    "MESYUARAT AGUNG",
    "PEPERIKSAAN",
    "PBD",
    "SUKAN",
    "RAYA",
    "CINA",
    "MAULIDUR",
];
const IMPORTANT_DATES_SHOWN: usize = 5;
const TOP_POSITIONS: usize = 10;
const TOP_SPECIALIZATIONS: usize = 12;

/// The four subjects the assessment dashboard tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
pub enum CoreSubject {
    Bm,
    Bi,
    Matematik,
    Sains,
}

impl CoreSubject {
    pub const ALL: [CoreSubject; 4] = [
        CoreSubject::Bm,
        CoreSubject::Bi,
        CoreSubject::Matematik,
        CoreSubject::Sains,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CoreSubject::Bm => "Bahasa Melayu",
            CoreSubject::Bi => "Bahasa Inggeris",
            CoreSubject::Matematik => "Matematik",
            CoreSubject::Sains => "Sains",
        }
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            CoreSubject::Bm => &["BM", "MELAYU"],
            CoreSubject::Bi => &["BI", "INGGERIS", "ENGLISH"],
            CoreSubject::Matematik => &["MATEMATIK", "MATH", "MT"],
            CoreSubject::Sains => &["SAINS", "SCIENCE", "SN"],
        }
    }

    /// Loose keyword match against a subject label from the sheet.
    pub fn matches(self, subject: &str) -> bool {
        let subject = subject.trim().to_uppercase();
        !subject.is_empty() && self.keywords().iter().any(|kw| subject.contains(kw))
    }
}

fn pct(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        f64::from(part) / f64::from(whole) * 100.0
    }
}

/// Sum tier counts and derive MTM (TP3..TP6) and quality (TP5..TP6) shares.
pub fn summarize<'a>(records: impl IntoIterator<Item = &'a AssessmentRecord>) -> TierSummary {
    let mut tiers = [0u32; 6];
    for record in records {
        for (sum, count) in tiers.iter_mut().zip(record.tiers) {
            *sum = sum.saturating_add(count);
        }
    }

    let total = sum_counts(&tiers);
    let mastered = sum_counts(&tiers[2..]);
    let quality = sum_counts(&tiers[4..]);

    TierSummary {
        tiers,
        total,
        mtm_pct: pct(mastered, total),
        quality_pct: pct(quality, total),
    }
}

/// Summary for one subject, optionally narrowed to an exact class label.
pub fn subject_summary(
    records: &[AssessmentRecord],
    subject: CoreSubject,
    class: Option<&str>,
) -> TierSummary {
    summarize(records.iter().filter(|r| {
        subject.matches(&r.subject) && class.map_or(true, |class| r.class == class)
    }))
}

pub fn core_summaries(records: &[AssessmentRecord]) -> Vec<(CoreSubject, TierSummary)> {
    CoreSubject::ALL
        .iter()
        .map(|subject| (*subject, subject_summary(records, *subject, None)))
        .collect()
}

/// Distinct class labels, sorted.
pub fn classes(records: &[AssessmentRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.class.clone())
        .filter(|class| !class.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Tier totals per school year, taken from the leading digit of the class
/// label ("4 Bestari" is year 4).
pub fn yearly_breakdown(records: &[AssessmentRecord], subject: CoreSubject) -> Vec<YearBreakdown> {
    (1..=6)
        .map(|year| {
            let prefix = year.to_string();
            let summary = summarize(
                records
                    .iter()
                    .filter(|r| r.class.starts_with(&prefix) && subject.matches(&r.subject)),
            );
            YearBreakdown {
                year: format!("TAHUN {year}"),
                tiers: summary.tiers,
            }
        })
        .collect()
}

/// MTM share of the Bestari and Cemerlang streams in each year.
pub fn stream_comparison(
    records: &[AssessmentRecord],
    subject: CoreSubject,
) -> Vec<StreamComparison> {
    (1..=6)
        .map(|year| {
            let prefix = year.to_string();
            let stream = |name: &str| {
                summarize(records.iter().filter(|r| {
                    r.class.starts_with(&prefix)
                        && subject.matches(&r.subject)
                        && r.class.to_uppercase().contains(name)
                }))
                .mtm_pct
            };
            StreamComparison {
                year: format!("TAHUN {year}"),
                bestari_pct: stream("BESTARI"),
                cemerlang_pct: stream("CEMERLANG"),
            }
        })
        .collect()
}

/// Achieved as a share of target across all subjects.
pub fn achievement_rate(records: &[HeadcountRecord]) -> f64 {
    let (target, achieved) = records
        .iter()
        .fold((0.0, 0.0), |(t, a), r| (t + r.target, a + r.achieved));
    if target > 0.0 {
        achieved / target * 100.0
    } else {
        0.0
    }
}

pub fn event_stats(events: &[CalendarEvent], today: NaiveDate) -> EventStats {
    EventStats {
        total: events.len(),
        this_month: events
            .iter()
            .filter(|e| e.date.year() == today.year() && e.date.month() == today.month())
            .count(),
        units: events.iter().map(|e| e.unit.as_str()).collect::<BTreeSet<_>>().len(),
        upcoming: events.iter().filter(|e| e.date >= today).count(),
    }
}

/// Earliest upcoming exam, holiday, meeting, workshop or sports event.
pub fn next_key_event(events: &[CalendarEvent], today: NaiveDate) -> Option<Countdown> {
    events
        .iter()
        .filter(|e| e.date >= today)
        .filter(|e| {
            let program = e.program.to_uppercase();
            KEY_EVENT_WORDS.iter().any(|word| program.contains(word))
        })
        .min_by_key(|e| e.date)
        .map(|e| Countdown {
            program: e.program.clone(),
            date: e.date,
            days_left: (e.date - today).num_days(),
        })
}

/// The next few upcoming events the year planner highlights, soonest first.
pub fn important_dates(events: &[CalendarEvent], today: NaiveDate) -> Vec<&CalendarEvent> {
    let mut matched: Vec<&CalendarEvent> = events
        .iter()
        .filter(|e| e.date >= today)
        .filter(|e| {
            let program = e.program.to_uppercase();
            IMPORTANT_DATE_WORDS.iter().any(|word| program.contains(word))
        })
        .collect();
    matched.sort_by_key(|e| e.date);
    matched.truncate(IMPORTANT_DATES_SHOWN);
    matched
}

/// Events in a calendar month of any year whose program contains `search`.
pub fn filter_events<'a>(
    events: &'a [CalendarEvent],
    month: Option<u32>,
    search: Option<&str>,
) -> Vec<&'a CalendarEvent> {
    let search = search.map(str::to_lowercase);
    events
        .iter()
        .filter(|e| month.map_or(true, |m| e.date.month() == m))
        .filter(|e| {
            search
                .as_deref()
                .map_or(true, |term| e.program.to_lowercase().contains(term))
        })
        .collect()
}

pub fn month_count(events: &[CalendarEvent], month: u32) -> usize {
    events.iter().filter(|e| e.date.month() == month).count()
}

pub fn upcoming_events(events: &[CalendarEvent], today: NaiveDate, limit: usize) -> Vec<&CalendarEvent> {
    events.iter().filter(|e| e.date >= today).take(limit).collect()
}

/// Case-insensitive search over name, position and specialization.
pub fn search_teachers<'a>(teachers: &'a [TeacherRecord], term: &str) -> Vec<&'a TeacherRecord> {
    let term = term.trim().to_lowercase();
    teachers
        .iter()
        .filter(|t| {
            term.is_empty()
                || t.name.to_lowercase().contains(&term)
                || t.position.to_lowercase().contains(&term)
                || t.specialization.to_lowercase().contains(&term)
        })
        .collect()
}

/// Count per uppercased label, largest first, ties alphabetical.
fn ranked<'a>(labels: impl Iterator<Item = (&'a str, &'static str)>) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for (label, default) in labels {
        let label = label.trim();
        let label = if label.is_empty() { default } else { label };
        *counts.entry(label.to_uppercase()).or_default() += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

/// Roster breakdown by position and by specialization.
pub fn teacher_distribution(teachers: &[TeacherRecord]) -> TeacherDistribution {
    let mut positions = ranked(
        teachers
            .iter()
            .map(|t| (t.position.as_str(), DEFAULT_POSITION)),
    );
    let mut specializations = ranked(
        teachers
            .iter()
            .map(|t| (t.specialization.as_str(), DEFAULT_SPECIALIZATION)),
    );
    let specialization_count = specializations.len();
    positions.truncate(TOP_POSITIONS);
    specializations.truncate(TOP_SPECIALIZATIONS);

    TeacherDistribution {
        total: teachers.len(),
        specialization_count,
        positions,
        specializations,
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProgramFilter {
    pub search: Option<String>,
    pub domain: Option<String>,
    pub year: Option<i32>,
    pub month: Option<u32>,
}

/// Programs matching every set criterion, newest first.
pub fn filter_programs<'a>(
    programs: &'a [ProgramActivity],
    filter: &ProgramFilter,
) -> Vec<&'a ProgramActivity> {
    let search = filter.search.as_deref().map(str::to_lowercase);
    let mut matched: Vec<&ProgramActivity> = programs
        .iter()
        .filter(|p| {
            search.as_deref().map_or(true, |term| {
                p.program.to_lowercase().contains(term)
                    || p.unit.to_lowercase().contains(term)
                    || p.domain.to_lowercase().contains(term)
            })
        })
        .filter(|p| filter.domain.as_deref().map_or(true, |d| p.domain == d))
        .filter(|p| filter.year.map_or(true, |y| p.date.year() == y))
        .filter(|p| filter.month.map_or(true, |m| p.date.month() == m))
        .collect();
    matched.sort_by(|a, b| b.date.cmp(&a.date));
    matched
}

/// Images newest first by their date tag; undated images keep feed order at
/// the end.
pub fn images_by_recency(images: &[ImageAsset], fallback_year: i32) -> Vec<&ImageAsset> {
    let mut dated: Vec<(Option<NaiveDate>, &ImageAsset)> = images
        .iter()
        .map(|img| {
            let date = img
                .date_str
                .as_deref()
                .and_then(|raw| parse_flexible_date(raw, fallback_year));
            (date, img)
        })
        .collect();
    dated.sort_by(|a, b| b.0.cmp(&a.0));
    dated.into_iter().map(|(_, img)| img).collect()
}
