//! Parsers for the formatted cell values that appear in report tables.
//!
//! Every parser is total: noise degrades to the 0.0 default instead of
//! failing, so a single bad cell never aborts extraction of the rest of
//! the document.

/// Drop any parenthesized spans, e.g. the "(See Note 1)" annotations that
/// follow some cost figures. No nesting in source documents.
fn strip_parentheticals(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth = 0usize;
    for ch in s.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Currency cell to plain dollars: "$1,234,567" -> 1234567.0.
/// Strips `$`, thousands separators, and parenthetical annotations.
pub fn parse_currency(raw: &str) -> f64 {
    let cleaned = strip_parentheticals(raw);
    let cleaned: String = cleaned
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    cleaned.trim().parse().unwrap_or(0.0)
}

/// Percentage cell to a fraction: "32.7%" -> 0.327.
pub fn parse_percentage(raw: &str) -> f64 {
    raw.replace('%', "")
        .trim()
        .parse::<f64>()
        .map(|v| v / 100.0)
        .unwrap_or(0.0)
}

/// Power cell to megawatts: "20.2 MW" -> 20.2.
pub fn parse_mw(raw: &str) -> f64 {
    raw.replace("MW", "").trim().parse().unwrap_or(0.0)
}

/// Loading cell to the raw percentage number: "121.47 %" -> 121.47.
/// Loading ratios are compared against 100, so no division here.
pub fn parse_loading(raw: &str) -> f64 {
    raw.replace('%', "").trim().parse().unwrap_or(0.0)
}

/// Bare numeric cell (ratings, MVA figures). Same degrade-to-zero policy.
pub fn parse_number(raw: &str) -> f64 {
    raw.trim().parse().unwrap_or(0.0)
}

/// Split the composite upgrade identifier convention used by the source
/// documents: "n9670.0 / DAYr190039" carries the plan id and the owning
/// utility's internal id in one cell. Without the separator the whole
/// string is the plan id. The convention is isolated here so it can change
/// without touching extraction logic.
pub fn split_rtep_composite(raw: &str) -> (String, String) {
    match raw.split_once(" / ") {
        Some((rtep, to_id)) => (rtep.trim().to_string(), to_id.trim().to_string()),
        None => (raw.trim().to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_strips_symbols_and_separators() {
        assert_eq!(parse_currency("$1,234,567"), 1_234_567.0);
        assert_eq!(parse_currency("$59,900,000 (See Note 1)"), 59_900_000.0);
        assert_eq!(parse_currency("1234.56"), 1234.56);
    }

    #[test]
    fn currency_degrades_to_zero_on_noise() {
        assert_eq!(parse_currency(""), 0.0);
        assert_eq!(parse_currency("N/A"), 0.0);
        assert_eq!(parse_currency("TBD pending restudy"), 0.0);
    }

    #[test]
    fn percentage_becomes_a_fraction() {
        assert_eq!(parse_percentage("32.7%"), 0.327);
        assert_eq!(parse_percentage("100 %"), 1.0);
        assert_eq!(parse_percentage("not a number"), 0.0);
    }

    #[test]
    fn mw_strips_unit_suffix() {
        assert_eq!(parse_mw("20.2 MW"), 20.2);
        assert_eq!(parse_mw("150"), 150.0);
        assert_eq!(parse_mw(""), 0.0);
    }

    #[test]
    fn loading_keeps_the_raw_percentage() {
        assert_eq!(parse_loading("121.47 %"), 121.47);
        assert_eq!(parse_loading("98.2%"), 98.2);
        assert_eq!(parse_loading("--"), 0.0);
    }

    #[test]
    fn composite_rtep_id_splits_on_separator() {
        assert_eq!(
            split_rtep_composite("n9670.0 / DAYr190039"),
            ("n9670.0".to_string(), "DAYr190039".to_string())
        );
        assert_eq!(
            split_rtep_composite("(Pending) / EKPC-tc2-nu007"),
            ("(Pending)".to_string(), "EKPC-tc2-nu007".to_string())
        );
        assert_eq!(
            split_rtep_composite("b3201.5"),
            ("b3201.5".to_string(), String::new())
        );
    }
}
