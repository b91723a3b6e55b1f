use chrono::NaiveDate;

const SEPARATORS: [char; 3] = ['/', '-', '.'];

/// Parse a loosely formatted spreadsheet date.
///
/// Parts are read month first (`3/4/2026` is 4 March). When the first part
/// can't be a month but the second can, the parts are read day first instead,
/// so `15/3/2026` is 15 March. A missing year takes `fallback_year`; two-digit
/// years land in the 2000s. Anything else resolves to `None`.
pub fn parse_flexible_date(raw: &str, fallback_year: i32) -> Option<NaiveDate> {
    let cleaned: String = raw
        .chars()
        .filter(|c| (' '..='~').contains(c))
        .collect::<String>()
        .trim()
        .to_lowercase();
    if cleaned.is_empty() {
        return None;
    }

    let separator = SEPARATORS.into_iter().find(|s| cleaned.contains(*s))?;
    let parts: Vec<&str> = cleaned.split(separator).collect();
    if !(2..=3).contains(&parts.len()) {
        return None;
    }

    let first = leading_number(parts[0])?;
    let second = leading_number(parts[1])?;
    let mut year = match parts.get(2) {
        Some(part) => i32::try_from(leading_number(part)?).ok()?,
        None => fallback_year,
    };
    if year < 100 {
        year += 2000;
    }

    let (month, day) = if first > 12 && second <= 12 {
        (second, first)
    } else {
        (first, second)
    };

    NaiveDate::from_ymd_opt(year, month, day)
}

/// Read the leading run of ASCII digits, ignoring surrounding spaces.
fn leading_number(part: &str) -> Option<u32> {
    let part = part.trim();
    let end = part
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(part.len());
    part[..end].parse().ok()
}
