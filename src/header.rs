//! Header-row detection for spreadsheet exports whose header sits somewhere
//! below an unknown amount of title and metadata rows.

use std::collections::BTreeMap;

/// A column the feeds know how to interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Date,
    Program,
    Unit,
    Domain,
    Images,
    Subject,
    Class,
    Tier(u8),
    Total,
    Baseline,
    Target,
    Achieved,
    Name,
    Grade,
    Position,
    Specialization,
    Email,
}

/// How a keyword is compared with a header cell.
#[derive(Debug, Clone, Copy)]
enum Rule {
    /// Cell contains the keyword.
    Contains(&'static str),
    /// Cell with all whitespace removed contains the keyword.
    Compact(&'static str),
    /// Cell with all whitespace removed equals the keyword.
    Exact(&'static str),
}

impl Rule {
    fn matches(self, cell: &str, compact: &str) -> bool {
        match self {
            Rule::Contains(kw) => cell.contains(kw),
            Rule::Compact(kw) => compact.contains(kw),
            Rule::Exact(kw) => compact == kw,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            Rule::Contains(kw) | Rule::Compact(kw) | Rule::Exact(kw) => kw,
        }
    }
}

impl Field {
    fn rules(self) -> &'static [Rule] {
        use Rule::*;
        match self {
            Field::Date => &[Contains("TARIKH"), Exact("DATE")],
            Field::Program => &[Contains("PROGRAM"), Contains("AKTIVITI")],
            Field::Unit => &[Contains("UNIT"), Contains("TINDAKAN")],
            Field::Domain => &[Contains("BIDANG")],
            Field::Images => &[
                Contains("GAMBAR"),
                Contains("FOTO"),
                Contains("PAUTAN"),
                Exact("LINK"),
            ],
            Field::Subject => &[Contains("SUBJEK"), Contains("MATA PELAJARAN")],
            Field::Class => &[Contains("KELAS"), Contains("TAHUN")],
            Field::Tier(1) => &[Compact("TP1")],
            Field::Tier(2) => &[Compact("TP2")],
            Field::Tier(3) => &[Compact("TP3")],
            Field::Tier(4) => &[Compact("TP4")],
            Field::Tier(5) => &[Compact("TP5")],
            Field::Tier(6) => &[Compact("TP6")],
            Field::Tier(_) => &[],
            Field::Total => &[Contains("JUMLAH"), Contains("TOTAL"), Contains("MURID")],
            Field::Baseline => &[Exact("TOV"), Contains("TAKE OFF")],
            Field::Target => &[Exact("ETR"), Contains("SASARAN"), Contains("TARGET")],
            Field::Achieved => &[Exact("AR"), Contains("PENCAPAIAN"), Contains("ACHIEVED")],
            Field::Name => &[Contains("NAMA")],
            Field::Grade => &[Contains("GRED")],
            Field::Position => &[Contains("JAWATAN")],
            Field::Specialization => &[Contains("OPSYEN"), Contains("OPSION")],
            Field::Email => &[Contains("EMEL"), Contains("EMAIL")],
        }
    }

    /// Whether an uppercased, trimmed cell names this field.
    pub fn matches(self, cell: &str) -> bool {
        let compact: String = cell.chars().filter(|c| !c.is_whitespace()).collect();
        self.rules().iter().any(|rule| rule.matches(cell, &compact))
    }

    /// Whether the cell is just one of this field's keywords, i.e. a header
    /// label repeated inside the data.
    pub fn is_label(self, cell: &str) -> bool {
        let upper = cell.trim().to_uppercase();
        self.rules().iter().any(|rule| rule.keyword() == upper)
    }

    pub const TIERS: [Field; 6] = [
        Field::Tier(1),
        Field::Tier(2),
        Field::Tier(3),
        Field::Tier(4),
        Field::Tier(5),
        Field::Tier(6),
    ];
}

/// What one feed needs from its header row.
#[derive(Debug, Clone)]
pub struct HeaderSpec {
    pub feed: &'static str,
    /// Fields that count towards the header score.
    pub scored: Vec<Field>,
    /// Fields resolved when present but not scored.
    pub optional: Vec<Field>,
    /// Field that identifies a row; the header is rejected without it.
    pub key: Field,
    pub min_score: usize,
    pub scan_window: usize,
}

impl HeaderSpec {
    pub fn events() -> Self {
        Self {
            feed: "takwim",
            scored: vec![Field::Date, Field::Program],
            optional: vec![Field::Unit],
            key: Field::Program,
            min_score: 2,
            scan_window: 50,
        }
    }

    pub fn programs() -> Self {
        Self {
            feed: "programs",
            scored: vec![Field::Date, Field::Program],
            optional: vec![Field::Unit, Field::Domain, Field::Images],
            key: Field::Program,
            min_score: 2,
            scan_window: 20,
        }
    }

    pub fn assessment() -> Self {
        let mut scored = vec![Field::Subject, Field::Class];
        scored.extend(Field::TIERS);
        Self {
            feed: "pbd",
            scored,
            optional: vec![Field::Total],
            key: Field::Subject,
            min_score: 3,
            scan_window: 50,
        }
    }

    pub fn headcount() -> Self {
        Self {
            feed: "headcount",
            scored: vec![Field::Subject, Field::Baseline, Field::Target, Field::Achieved],
            optional: Vec::new(),
            key: Field::Subject,
            min_score: 2,
            scan_window: 50,
        }
    }

    pub fn teachers() -> Self {
        Self {
            feed: "teachers",
            scored: vec![Field::Name, Field::Grade, Field::Position, Field::Specialization],
            optional: vec![Field::Email],
            key: Field::Name,
            min_score: 1,
            scan_window: 50,
        }
    }
}

/// Column index per resolved field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: BTreeMap<Field, usize>,
}

impl ColumnMap {
    /// Map the first matching cell of `row` for each field.
    pub fn resolve<'a>(row: &[String], fields: impl IntoIterator<Item = &'a Field>) -> Self {
        let cells: Vec<String> = row.iter().map(|cell| cell.trim().to_uppercase()).collect();
        let columns = fields
            .into_iter()
            .filter_map(|field| {
                cells
                    .iter()
                    .position(|cell| !cell.is_empty() && field.matches(cell))
                    .map(|idx| (*field, idx))
            })
            .collect();
        Self { columns }
    }

    pub fn get(&self, field: Field) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    /// Number of `fields` that resolved to a column.
    pub fn score(&self, fields: &[Field]) -> usize {
        fields.iter().filter(|field| self.columns.contains_key(field)).count()
    }

    /// Cell for `field` in `row`, if the field resolved and the row is long
    /// enough.
    pub fn cell<'r>(&self, row: &'r [String], field: Field) -> Option<&'r str> {
        self.get(field)
            .and_then(|idx| row.get(idx))
            .map(|cell| cell.as_str())
    }
}

/// The header row picked for a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMatch {
    pub row: usize,
    pub score: usize,
    pub columns: ColumnMap,
}

/// Scan the first rows for the best-scoring header.
///
/// Ties keep the earlier row. A row that resolves every scored field ends the
/// scan. Returns `None` when no row reaches `min_score` with the key field
/// resolved.
pub fn detect_header(rows: &[Vec<String>], spec: &HeaderSpec) -> Option<HeaderMatch> {
    let mut best: Option<HeaderMatch> = None;

    for (idx, row) in rows.iter().take(spec.scan_window).enumerate() {
        let columns = ColumnMap::resolve(row, spec.scored.iter().chain(spec.optional.iter()));
        if columns.get(spec.key).is_none() {
            continue;
        }
        let score = columns.score(&spec.scored);
        if score < spec.min_score {
            continue;
        }

        if best.as_ref().map_or(true, |b| score > b.score) {
            tracing::trace!(feed = spec.feed, row = idx, score, "header candidate");
            best = Some(HeaderMatch { row: idx, score, columns });
        }

        if score == spec.scored.len() {
            break;
        }
    }

    best
}
