//! Turn tokenized feed rows into typed records.
//!
//! Every parser here is synchronous and works on text that has already been
//! fetched. Bad rows are skipped, never reported; only a missing header or an
//! empty result surfaces as an error.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::date::parse_flexible_date;
use crate::error::{FeedError, FeedResult};
use crate::header::{detect_header, ColumnMap, Field, HeaderMatch, HeaderSpec};
use crate::models::{
    AssessmentRecord, CalendarEvent, HeadcountRecord, ImageAsset, ProgramActivity, TeacherRecord,
};
use crate::tokenizer::tokenize_feed;

pub const DEFAULT_UNIT: &str = "UMUM";
pub const DEFAULT_CLASS: &str = "N/A";
pub const DEFAULT_POSITION: &str = "Guru";
pub const DEFAULT_SPECIALIZATION: &str = "Am";

const TOTAL_LABELS: [&str; 6] = [
    "JUMLAH",
    "JUMLAH BESAR",
    "JUMLAH KESELURUHAN",
    "KESELURUHAN",
    "TOTAL",
    "GRAND TOTAL",
];

static DRIVE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-A-Za-z0-9_]{25,50}").expect("drive id pattern compiles"));

/// Display URL for a file-store identifier.
pub fn image_url(id: &str) -> String {
    format!("https://lh3.googleusercontent.com/d/{id}=s1600")
}

/// First identifier-looking token in `text`.
pub fn extract_drive_id(text: &str) -> Option<&str> {
    DRIVE_ID.find(text).map(|m| m.as_str())
}

/// Lenient integer count: the leading digits of the cell, zero otherwise.
pub fn parse_count(cell: &str) -> u32 {
    let cell = cell.trim();
    let cell = cell.strip_prefix('+').unwrap_or(cell);
    let end = cell
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(cell.len());
    cell[..end].parse().unwrap_or(0)
}

/// Lenient decimal: the leading signed number of the cell, zero otherwise.
pub fn parse_measure(cell: &str) -> f64 {
    let cell = cell.trim();
    let mut end = 0;
    let mut seen_dot = false;
    for (idx, c) in cell.char_indices() {
        let accept = match c {
            '+' | '-' => idx == 0,
            '.' if !seen_dot => {
                seen_dot = true;
                true
            }
            c => c.is_ascii_digit(),
        };
        if !accept {
            break;
        }
        end = idx + c.len_utf8();
    }
    cell[..end].parse().unwrap_or(0.0)
}

/// Sum of counts, pinned at `u32::MAX` instead of overflowing.
pub fn sum_counts(counts: &[u32]) -> u32 {
    counts.iter().fold(0u32, |acc, n| acc.saturating_add(*n))
}

fn is_numeric(cell: &str) -> bool {
    cell.chars().any(|c| c.is_ascii_digit())
        && cell
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | '+' | ' '))
}

fn is_total_label(cell: &str) -> bool {
    let upper = cell.trim().to_uppercase();
    TOTAL_LABELS.contains(&upper.as_str())
}

/// Text of `field` in `row`, or `default` when the column is absent or blank.
fn text_or(columns: &ColumnMap, row: &[String], field: Field, default: &str) -> String {
    match columns.cell(row, field) {
        Some(cell) if !cell.is_empty() => cell.to_string(),
        _ => default.to_string(),
    }
}

/// A feed whose header row has been located.
struct Table {
    rows: Vec<Vec<String>>,
    header: HeaderMatch,
    key: Field,
}

impl Table {
    fn locate(text: &str, spec: &HeaderSpec) -> FeedResult<Self> {
        let rows = tokenize_feed(text);
        let header = detect_header(&rows, spec).ok_or(FeedError::HeaderNotFound {
            feed: spec.feed,
            scanned: rows.len().min(spec.scan_window),
        })?;
        debug!(feed = spec.feed, row = header.row, score = header.score, "header found");
        Ok(Self {
            rows,
            header,
            key: spec.key,
        })
    }

    fn columns(&self) -> &ColumnMap {
        &self.header.columns
    }

    /// Rows after the header that carry a usable key, paired with that key.
    fn keyed_rows(&self) -> impl Iterator<Item = (&[String], &str)> + '_ {
        let key_idx = self.header.columns.get(self.key);
        let header_label = key_idx
            .and_then(|idx| self.rows[self.header.row].get(idx))
            .map(|cell| cell.trim().to_uppercase())
            .unwrap_or_default();

        self.rows[self.header.row + 1..].iter().filter_map(move |row| {
            let key = row.get(key_idx?)?.trim();
            let rejected = key.is_empty()
                || key.to_uppercase() == header_label
                || self.key.is_label(key)
                || is_total_label(key)
                || is_numeric(key);
            (!rejected).then_some((row.as_slice(), key))
        })
    }
}

fn non_empty<T>(records: Vec<T>, feed: &'static str) -> FeedResult<Vec<T>> {
    if records.is_empty() {
        Err(FeedError::NoRows { feed })
    } else {
        Ok(records)
    }
}

/// Calendar events, sorted by date.
pub fn parse_events(text: &str, fallback_year: i32) -> FeedResult<Vec<CalendarEvent>> {
    let spec = HeaderSpec::events();
    let table = Table::locate(text, &spec)?;
    let columns = table.columns();

    let mut events: Vec<CalendarEvent> = table
        .keyed_rows()
        .filter_map(|(row, program)| {
            let date = columns
                .cell(row, Field::Date)
                .and_then(|raw| parse_flexible_date(raw, fallback_year))?;
            Some(CalendarEvent {
                date,
                program: program.to_string(),
                unit: text_or(columns, row, Field::Unit, DEFAULT_UNIT),
                note: String::new(),
            })
        })
        .collect();

    events.sort_by_key(|event| event.date);
    non_empty(events, spec.feed)
}

/// Program activity log, in sheet order.
pub fn parse_programs(text: &str, fallback_year: i32) -> FeedResult<Vec<ProgramActivity>> {
    let spec = HeaderSpec::programs();
    let table = Table::locate(text, &spec)?;
    let columns = table.columns();

    let programs = table
        .keyed_rows()
        .filter(|(row, _)| row.len() >= 2)
        .filter_map(|(row, program)| {
            let date = columns
                .cell(row, Field::Date)
                .and_then(|raw| parse_flexible_date(raw, fallback_year))?;
            let image_urls = columns
                .cell(row, Field::Images)
                .map(|cell| {
                    DRIVE_ID
                        .find_iter(cell)
                        .map(|m| image_url(m.as_str()))
                        .collect()
                })
                .unwrap_or_default();
            Some(ProgramActivity {
                date,
                domain: text_or(columns, row, Field::Domain, DEFAULT_UNIT),
                unit: text_or(columns, row, Field::Unit, DEFAULT_UNIT),
                program: program.to_string(),
                image_urls,
            })
        })
        .collect();

    non_empty(programs, spec.feed)
}

/// Classroom assessment tier counts. Rows without any tier count are dropped.
pub fn parse_assessments(text: &str) -> FeedResult<Vec<AssessmentRecord>> {
    let spec = HeaderSpec::assessment();
    let table = Table::locate(text, &spec)?;
    let columns = table.columns();

    let records = table
        .keyed_rows()
        .filter_map(|(row, subject)| {
            let mut tiers = [0u32; 6];
            for (slot, field) in tiers.iter_mut().zip(Field::TIERS) {
                *slot = columns.cell(row, field).map(parse_count).unwrap_or(0);
            }

            let total = sum_counts(&tiers);
            if total == 0 {
                return None;
            }
            let explicit = columns.cell(row, Field::Total).map(parse_count).unwrap_or(0);
            if explicit != 0 && explicit != total {
                debug!(subject, explicit, total, "total column disagrees with tier sum");
            }

            Some(AssessmentRecord {
                subject: subject.to_string(),
                class: text_or(columns, row, Field::Class, DEFAULT_CLASS),
                tiers,
                total,
            })
        })
        .collect();

    non_empty(records, spec.feed)
}

/// Headcount targets against achievement per subject.
pub fn parse_headcount(text: &str) -> FeedResult<Vec<HeadcountRecord>> {
    let spec = HeaderSpec::headcount();
    let table = Table::locate(text, &spec)?;
    let columns = table.columns();
    let measure = |row: &[String], field| columns.cell(row, field).map(parse_measure).unwrap_or(0.0);

    let records = table
        .keyed_rows()
        .filter_map(|(row, subject)| {
            let target = measure(row, Field::Target);
            let achieved = measure(row, Field::Achieved);
            (target > 0.0 || achieved > 0.0).then(|| HeadcountRecord {
                subject: subject.to_string(),
                baseline: measure(row, Field::Baseline),
                target,
                achieved,
            })
        })
        .collect();

    non_empty(records, spec.feed)
}

/// Teacher roster.
pub fn parse_teachers(text: &str) -> FeedResult<Vec<TeacherRecord>> {
    let spec = HeaderSpec::teachers();
    let table = Table::locate(text, &spec)?;
    let columns = table.columns();

    let teachers = table
        .keyed_rows()
        .map(|(row, name)| TeacherRecord {
            name: name.to_string(),
            grade: text_or(columns, row, Field::Grade, ""),
            position: text_or(columns, row, Field::Position, DEFAULT_POSITION),
            specialization: text_or(columns, row, Field::Specialization, DEFAULT_SPECIALIZATION),
            email: columns
                .cell(row, Field::Email)
                .filter(|cell| !cell.is_empty())
                .map(str::to_string),
        })
        .collect();

    non_empty(teachers, spec.feed)
}

/// Image manifest: identifier, display name and an optional date tag per row,
/// after a single header line.
pub fn parse_images(text: &str) -> FeedResult<Vec<ImageAsset>> {
    let images = tokenize_feed(text)
        .iter()
        .skip(1)
        .filter(|row| row.len() >= 2)
        .filter_map(|row| {
            let id = extract_drive_id(&row[0])?;
            Some(ImageAsset {
                url: image_url(id),
                name: row[1].clone(),
                date_str: row.get(2).filter(|cell| !cell.is_empty()).cloned(),
            })
        })
        .collect();

    non_empty(images, "images")
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    const DRIVE: &str = "1lCegcUF3-GYyTPbSidhJdSfU_AZdyj8p";

    #[test]
    fn event_feed_with_leading_blank_line() {
        let text = "\nTARIKH,PROGRAM,UNIT\n15/3/2026,Mesyuarat Kurikulum,Unit Kurikulum";
        let events = parse_events(text, 2026).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].date, NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
        assert_eq!(events[0].program, "Mesyuarat Kurikulum");
        assert_eq!(events[0].unit, "Unit Kurikulum");
    }

    #[test]
    fn events_are_sorted_and_unit_defaults() {
        let text = "Tarikh,Aktiviti,Tindakan\n5/20/2026,Hari Sukan,\n1/10/2026,Bengkel PdPc,HEM\nx,Tanpa Tarikh,HEM";
        let events = parse_events(text, 2026).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].program, "Bengkel PdPc");
        assert_eq!(events[1].unit, DEFAULT_UNIT);
    }

    #[test]
    fn event_feed_without_header_is_structural_failure() {
        let err = parse_events("1/1/2026,Mesyuarat\n2/2/2026,Bengkel", 2026).unwrap_err();
        assert!(matches!(err, FeedError::HeaderNotFound { .. }));
        assert!(!err.is_transport());
    }

    #[test]
    fn empty_text_is_structural_failure() {
        assert!(matches!(
            parse_teachers(""),
            Err(FeedError::HeaderNotFound { .. })
        ));
    }

    #[test]
    fn header_only_feed_has_no_rows() {
        assert!(matches!(
            parse_events("TARIKH,PROGRAM", 2026),
            Err(FeedError::NoRows { .. })
        ));
    }

    #[test]
    fn key_row_skip_rules() {
        let text = "TARIKH,PROGRAM,UNIT\n\
                    1/5/2026,,HEM\n\
                    1/5/2026,2026,HEM\n\
                    1/5/2026,PROGRAM,HEM\n\
                    1/5/2026,Jumlah,HEM\n\
                    1/5/2026,\"1,234\",HEM\n\
                    1/5/2026,- 3,HEM\n\
                    1/5/2026,1 - 2,HEM\n\
                    1/5/2026,Program Literasi,HEM";
        let events = parse_events(text, 2026).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].program, "Program Literasi");
    }

    #[test]
    fn programs_collect_domain_and_images() {
        let text = format!(
            "LAPORAN PROGRAM 2026\nTARIKH,BIDANG,UNIT,PROGRAM,GAMBAR\n3/2/2026,Bahasa,Kurikulum,Minggu Bahasa,\"https://drive.google.com/file/d/{DRIVE}/view, {DRIVE}X\"\n3/3/2026,,,Kem Sains,"
        );
        let programs = parse_programs(&text, 2026).unwrap();
        assert_eq!(programs.len(), 2);
        assert_eq!(programs[0].domain, "Bahasa");
        assert_eq!(programs[0].image_urls.len(), 2);
        assert_eq!(programs[0].image_urls[0], image_url(DRIVE));
        assert_eq!(programs[1].unit, DEFAULT_UNIT);
        assert!(programs[1].image_urls.is_empty());
    }

    #[test]
    fn assessment_row_from_labelled_sheet() {
        let text = "PBD 2025,,,,,,,,\nSUBJEK,KELAS,TP1,TP2,TP3,TP4,TP5,TP6,JUMLAH\nMatematik,4 Bestari,5,3,10,8,6,2,34";
        let records = parse_assessments(text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tiers, [5, 3, 10, 8, 6, 2]);
        assert_eq!(records[0].total, 34);
        assert_eq!(records[0].class, "4 Bestari");
    }

    #[test]
    fn assessment_total_is_tier_sum_and_zero_rows_drop() {
        let text = "SUBJEK,KELAS,TP 1,TP 2,TP 3,TP 4,TP 5,TP 6,JUMLAH\n\
                    Sains,5 Cemerlang,0,0,5,3,2,0,99\n\
                    BM,5 Cemerlang,0,0,0,0,0,0,20";
        let records = parse_assessments(text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].subject, "Sains");
        assert_eq!(records[0].total, 10);
    }

    #[test]
    fn huge_tier_counts_saturate() {
        let text = "SUBJEK,KELAS,TP1,TP2,TP3,TP4,TP5,TP6\nBM,1 Bestari,4000000000,4000000000,0,0,0,0";
        let records = parse_assessments(text).unwrap();
        assert_eq!(records[0].tiers[0], 4_000_000_000);
        assert_eq!(records[0].total, u32::MAX);
    }

    #[test]
    fn quoted_program_with_comma_keeps_columns_aligned() {
        let text = "TARIKH,PROGRAM,UNIT\n1/5/2026, \"Literasi, Numerasi\",HEM";
        let events = parse_events(text, 2026).unwrap();
        assert_eq!(events[0].program, "Literasi, Numerasi");
        assert_eq!(events[0].unit, "HEM");
    }

    #[test]
    fn assessment_malformed_counts_contribute_zero() {
        let text = "SUBJEK,TP1,TP2,TP3\nBI,abc,4 murid,-\n";
        let records = parse_assessments(text).unwrap();
        assert_eq!(records[0].tiers, [0, 4, 0, 0, 0, 0]);
        assert_eq!(records[0].class, DEFAULT_CLASS);
    }

    #[test]
    fn assessment_repeated_header_and_total_rows_skip() {
        let text = "SUBJEK,KELAS,TP1,TP2,TP3\nBM,1 Bestari,1,2,3\nSUBJEK,KELAS,TP1,TP2,TP3\nJUMLAH,,1,2,3";
        let records = parse_assessments(text).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn headcount_needs_target_or_achievement() {
        let text = "SUBJEK,TOV,ETR,AR\nBM,60,75.5,70%\nBI,50,0,0\nSains,,,12";
        let records = parse_headcount(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].target, 75.5);
        assert_eq!(records[0].achieved, 70.0);
        assert_eq!(records[1].subject, "Sains");
        assert_eq!(records[1].baseline, 0.0);
    }

    #[test]
    fn numeric_teacher_name_is_skipped() {
        let text = "NAMA,JAWATAN,OPSYEN\n123,Guru,BM\nSiti Aminah,Guru Kanan,BM";
        let teachers = parse_teachers(text).unwrap();
        assert_eq!(teachers.len(), 1);
        assert_eq!(teachers[0].name, "Siti Aminah");
        assert_eq!(teachers[0].grade, "");
    }

    #[test]
    fn teacher_defaults_when_columns_missing() {
        let text = "BIL,NAMA GURU,GRED\n1,Ahmad Faizal,DG44";
        let teachers = parse_teachers(text).unwrap();
        assert_eq!(teachers[0].position, DEFAULT_POSITION);
        assert_eq!(teachers[0].specialization, DEFAULT_SPECIALIZATION);
        assert_eq!(teachers[0].grade, "DG44");
        assert_eq!(teachers[0].email, None);
    }

    #[test]
    fn short_image_identifier_is_skipped() {
        let text = format!("ID,NAMA,TARIKH\nshort,Gambar A,\n{DRIVE},Gambar B,3/1/2026");
        let images = parse_images(&text).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].name, "Gambar B");
        assert_eq!(images[0].url, image_url(DRIVE));
        assert_eq!(images[0].date_str.as_deref(), Some("3/1/2026"));
    }

    #[test]
    fn image_feed_with_only_short_ids_is_empty() {
        assert!(matches!(
            parse_images("ID,NAMA\nshort,Gambar"),
            Err(FeedError::NoRows { .. })
        ));
    }

    #[test]
    fn lenient_numbers() {
        assert_eq!(parse_count("12 murid"), 12);
        assert_eq!(parse_count("-3"), 0);
        assert_eq!(parse_count(""), 0);
        assert_eq!(parse_measure("85.5%"), 85.5);
        assert_eq!(parse_measure("-2.5"), -2.5);
        assert_eq!(parse_measure("n/a"), 0.0);
    }
}
