use anyhow::Result;
use scraper::{ElementRef, Selector};
use std::collections::HashMap;

// ── Selectors ─────────────────────────────────────────────────────────────────

pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("selector `{}`: {:?}", css, e))
}

// ── Generic table ─────────────────────────────────────────────────────────────

/// A `<table>` flattened to header names plus text cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HtmlTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[cfg(test)]
impl HtmlTable {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Header row is the last `thead` row, or failing that the first row made
/// only of `th`. Body rows are every other row with at least one cell.
pub fn parse_html_table(table: ElementRef<'_>) -> Result<HtmlTable> {
    let thead_tr = selector("thead tr")?;
    let tr = selector("tr")?;

    let header_row = table.select(&thead_tr).last();
    let (headers, skip_first) = match header_row {
        Some(row) => (row_cells(row), false),
        None => match table.select(&tr).next() {
            Some(first) if is_header_row(first) => (row_cells(first), true),
            _ => (Vec::new(), false),
        },
    };

    let mut rows = Vec::new();
    for (i, row) in table.select(&tr).enumerate() {
        if skip_first && i == 0 {
            continue;
        }
        if in_thead(row) {
            continue;
        }
        let cells = row_cells(row);
        if cells.is_empty() {
            continue;
        }
        rows.push(cells);
    }

    Ok(HtmlTable {
        headers: dedupe_headers(headers),
        rows,
    })
}

/// Text of the first header cell, e.g. "Arsenal (4-3-3)".
pub fn first_header_text(table: ElementRef<'_>) -> Result<Option<String>> {
    let th = selector("th")?;
    Ok(table.select(&th).next().map(element_text))
}

/// Direct `th`/`td` children of a row, whitespace-normalised.
pub fn row_cells(row: ElementRef<'_>) -> Vec<String> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| matches!(el.value().name(), "th" | "td"))
        .map(element_text)
        .collect()
}

pub fn element_text(el: ElementRef<'_>) -> String {
    normalize_ws(&el.text().collect::<String>())
}

/// Collapse whitespace runs to one space. Non-breaking spaces are kept.
pub fn normalize_ws(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() && c != '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Repeated names get `.1`, `.2`, ... in order of appearance.
pub fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    headers
        .into_iter()
        .map(|h| {
            let n = seen.entry(h.clone()).or_insert(0);
            let name = if *n == 0 { h } else { format!("{}.{}", h, n) };
            *n += 1;
            name
        })
        .collect()
}

fn is_header_row(row: ElementRef<'_>) -> bool {
    let mut cells = row
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|el| matches!(el.value().name(), "th" | "td"))
        .peekable();
    cells.peek().is_some() && cells.all(|el| el.value().name() == "th")
}

fn in_thead(row: ElementRef<'_>) -> bool {
    row.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|el| el.value().name() == "thead")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_parse_table_with_thead() {
        let html = Html::parse_document(
            r#"<table>
                <thead><tr><th>Date</th><th>xG</th><th>Score</th><th>xG</th></tr></thead>
                <tbody>
                  <tr><th>2023-08-11</th><td>0.3</td><td>0–3</td><td>4.0</td></tr>
                  <tr class="spacer"></tr>
                </tbody>
            </table>"#,
        );
        let sel = selector("table").unwrap();
        let table = parse_html_table(html.select(&sel).next().unwrap()).unwrap();
        assert_eq!(table.headers, vec!["Date", "xG", "Score", "xG.1"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][0], "2023-08-11");
        assert_eq!(table.column("xG.1"), Some(3));
    }

    #[test]
    fn test_parse_table_header_row_without_thead() {
        let html = Html::parse_document(
            r#"<table>
                <tr><th colspan="2">Arsenal (4-3-3)</th></tr>
                <tr><td>1</td><td>Aaron Ramsdale</td></tr>
                <tr><td>4</td><td>Ben  White</td></tr>
            </table>"#,
        );
        let sel = selector("table").unwrap();
        let el = html.select(&sel).next().unwrap();
        let table = parse_html_table(el).unwrap();
        assert_eq!(table.headers, vec!["Arsenal (4-3-3)"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1][1], "Ben White");
        assert_eq!(first_header_text(el).unwrap().as_deref(), Some("Arsenal (4-3-3)"));
    }

    #[test]
    fn test_normalize_ws_keeps_nbsp() {
        assert_eq!(normalize_ws("  a \n\t b  "), "a b");
        assert_eq!(normalize_ws("Manager:\u{a0}Mikel"), "Manager:\u{a0}Mikel");
    }
}
