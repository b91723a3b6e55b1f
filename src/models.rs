use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarEvent {
    pub date: NaiveDate,
    pub program: String,
    pub unit: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramActivity {
    pub date: NaiveDate,
    pub domain: String,
    pub unit: String,
    pub program: String,
    pub image_urls: Vec<String>,
}

/// Student counts per proficiency tier (TP1..TP6) for one subject and class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentRecord {
    pub subject: String,
    pub class: String,
    pub tiers: [u32; 6],
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadcountRecord {
    pub subject: String,
    pub baseline: f64,
    pub target: f64,
    pub achieved: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeacherRecord {
    pub name: String,
    pub grade: String,
    pub position: String,
    pub specialization: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageAsset {
    pub url: String,
    pub name: String,
    pub date_str: Option<String>,
}

/// Everything one dashboard refresh produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub events: Vec<CalendarEvent>,
    pub programs: Vec<ProgramActivity>,
    pub assessments: Vec<AssessmentRecord>,
    pub headcount: Vec<HeadcountRecord>,
    pub teachers: Vec<TeacherRecord>,
    pub images: Vec<ImageAsset>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TierSummary {
    pub tiers: [u32; 6],
    pub total: u32,
    pub mtm_pct: f64,
    pub quality_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearBreakdown {
    pub year: String,
    pub tiers: [u32; 6],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamComparison {
    pub year: String,
    pub bestari_pct: f64,
    pub cemerlang_pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventStats {
    pub total: usize,
    pub this_month: usize,
    pub units: usize,
    pub upcoming: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Countdown {
    pub program: String,
    pub date: NaiveDate,
    pub days_left: i64,
}

/// Teacher counts per position and per specialization, largest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeacherDistribution {
    pub total: usize,
    pub specialization_count: usize,
    pub positions: Vec<(String, usize)>,
    pub specializations: Vec<(String, usize)>,
}
