/// Split one comma-delimited line into trimmed fields.
///
/// Every unescaped `"` toggles quoting wherever it appears in a field, and
/// `""` inside quotes stands for a literal quote. Commas inside quotes are
/// kept. An unterminated quote runs to the end of the line. The result always
/// has at least one field.
pub fn tokenize_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
            }
            '"' => quoted = !quoted,
            ',' if !quoted => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            c => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// Split feed text into lines and tokenize each one.
///
/// Surrounding whitespace of the whole text is dropped first, so a trailing
/// newline doesn't produce a phantom row. Blank lines inside the text are kept
/// as single-empty-field rows.
pub fn tokenize_feed(text: &str) -> Vec<Vec<String>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    trimmed
        .split('\n')
        .map(|line| tokenize_line(line.strip_suffix('\r').unwrap_or(line)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_line_matches_comma_split() {
        let line = " TARIKH , PROGRAM,UNIT ";
        let expected: Vec<String> = line.split(',').map(|f| f.trim().to_string()).collect();
        assert_eq!(tokenize_line(line), expected);
    }

    #[test]
    fn quoted_field_keeps_delimiter_and_escaped_quote() {
        let fields = tokenize_line(r#"x,"a,b""c",y"#);
        assert_eq!(fields, vec!["x", r#"a,b"c"#, "y"]);
    }

    #[test]
    fn quote_after_leading_space_still_opens_quoting() {
        let fields = tokenize_line(r#"x, "a,b""c""#);
        assert_eq!(fields, vec!["x", r#"a,b"c"#]);
    }

    #[test]
    fn quote_in_middle_of_field_toggles() {
        let fields = tokenize_line(r#"Program "Literasi, Numerasi" 2026,HEM"#);
        assert_eq!(fields, vec!["Program Literasi, Numerasi 2026", "HEM"]);
    }

    #[test]
    fn doubled_quote_outside_quotes_is_dropped() {
        assert_eq!(tokenize_line(r#"a""b,c"#), vec!["ab", "c"]);
    }

    #[test]
    fn empty_line_yields_one_empty_field() {
        assert_eq!(tokenize_line(""), vec![String::new()]);
    }

    #[test]
    fn trailing_delimiter_adds_empty_field() {
        assert_eq!(tokenize_line("a,b,"), vec!["a", "b", ""]);
    }

    #[test]
    fn unterminated_quote_runs_to_end_of_line() {
        let fields = tokenize_line(r#"1,"Bengkel, PdPc"#);
        assert_eq!(fields, vec!["1", "Bengkel, PdPc"]);
    }

    #[test]
    fn feed_splits_on_both_line_endings() {
        let rows = tokenize_feed("a,b\r\nc,d\ne,f\n");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], vec!["c", "d"]);
    }

    #[test]
    fn feed_keeps_inner_blank_lines() {
        let rows = tokenize_feed("a\n\nb");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], vec![String::new()]);
    }

    #[test]
    fn blank_feed_has_no_rows() {
        assert!(tokenize_feed("  \n \n").is_empty());
    }
}
