//! Raw table model lifted out of the report HTML.
//!
//! Header text varies per document, so nothing downstream assumes a fixed
//! schema; tables carry whatever the document printed, whitespace-normalized,
//! with multi-level headers flattened into single strings.

use scraper::{ElementRef, Html, Selector};

/// One table as found in the document: flattened header strings plus body
/// rows of cell text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// All header text joined into one line, for token-presence checks.
    pub fn header_line(&self) -> String {
        self.headers.join(" ")
    }

    pub fn cell<'a>(&'a self, row: &'a [String], column: usize) -> &'a str {
        row.get(column).map(String::as_str).unwrap_or("")
    }
}

fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out.trim().to_string()
}

fn cell_texts(row: ElementRef<'_>, cells: &Selector) -> Vec<String> {
    row.select(cells)
        .map(|cell| normalize_ws(&cell.text().collect::<String>()))
        .collect()
}

/// Join multi-level header rows column-wise with a single space separator.
fn flatten_headers(levels: &[Vec<String>]) -> Vec<String> {
    let width = levels.iter().map(Vec::len).max().unwrap_or(0);
    (0..width)
        .map(|col| {
            let joined = levels
                .iter()
                .filter_map(|level| level.get(col))
                .filter(|text| !text.is_empty())
                .cloned()
                .collect::<Vec<_>>()
                .join(" ");
            normalize_ws(&joined)
        })
        .collect()
}

/// Parse every `<table>` in the document, in document order.
///
/// The leading run of rows containing a `<th>` forms the header (one or
/// more levels); everything after is body. Tables with no header rows get
/// empty headers and are left for the positional fallback to interpret.
pub fn parse_tables(html: &str) -> Vec<RawTable> {
    let document = Html::parse_document(html);
    let tables = Selector::parse("table").expect("static selector");
    let trs = Selector::parse("tr").expect("static selector");
    let ths = Selector::parse("th").expect("static selector");
    let cells = Selector::parse("th, td").expect("static selector");

    let mut out = Vec::new();
    for table in document.select(&tables) {
        let mut header_levels: Vec<Vec<String>> = Vec::new();
        let mut rows: Vec<Vec<String>> = Vec::new();

        for tr in table.select(&trs) {
            let is_header = rows.is_empty() && tr.select(&ths).next().is_some();
            let texts = cell_texts(tr, &cells);
            if texts.is_empty() {
                continue;
            }
            if is_header {
                header_levels.push(texts);
            } else {
                rows.push(texts);
            }
        }

        out.push(RawTable {
            headers: flatten_headers(&header_levels),
            rows,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_level_headers_come_through_flat() {
        let html = r#"
            <table>
              <tr><th>TO</th><th>RTEP ID</th><th>Title</th></tr>
              <tr><td>AEP</td><td>n9670.0 / DAYr190039</td><td>Rebuild line</td></tr>
            </table>
        "#;
        let tables = parse_tables(html);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].headers, vec!["TO", "RTEP ID", "Title"]);
        assert_eq!(tables[0].rows.len(), 1);
        assert_eq!(tables[0].rows[0][0], "AEP");
    }

    #[test]
    fn multi_level_headers_join_with_a_space() {
        let html = r#"
            <table>
              <thead>
                <tr><th>Description</th><th>Cost</th></tr>
                <tr><th></th><th>Allocated</th></tr>
              </thead>
              <tbody>
                <tr><td>Total</td><td>$10,000,000</td></tr>
              </tbody>
            </table>
        "#;
        let tables = parse_tables(html);
        assert_eq!(tables[0].headers, vec!["Description", "Cost Allocated"]);
        assert_eq!(tables[0].rows[0][1], "$10,000,000");
    }

    #[test]
    fn headerless_tables_keep_all_rows_as_body() {
        let html = r#"
            <table>
              <tr><td>Total</td><td>$1</td></tr>
              <tr><td>Network Upgrade</td><td>$2</td></tr>
            </table>
        "#;
        let tables = parse_tables(html);
        assert!(tables[0].headers.is_empty());
        assert_eq!(tables[0].rows.len(), 2);
    }

    #[test]
    fn cell_text_is_whitespace_normalized() {
        let html = "<table><tr><th>Facility\n   Name</th></tr><tr><td>  Line\t1 </td></tr></table>";
        let tables = parse_tables(html);
        assert_eq!(tables[0].headers, vec!["Facility Name"]);
        assert_eq!(tables[0].rows[0][0], "Line 1");
    }

    #[test]
    fn tables_are_returned_in_document_order() {
        let html = r#"
            <table><tr><th>First</th></tr></table>
            <table><tr><th>Second</th></tr></table>
        "#;
        let tables = parse_tables(html);
        assert_eq!(tables[0].headers, vec!["First"]);
        assert_eq!(tables[1].headers, vec!["Second"]);
    }
}
