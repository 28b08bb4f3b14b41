//! Loader for raw football-data.co.uk season files.
//!
//! These files drift over the years: some are Windows-1252, some carry more
//! delimiters per row than the header declares, and the date format
//! changes between eras. Everything that leaves here has one fixed schema.

use crate::error::PageError;
use crate::scraper::cleaner::{parse_football_data_date, reverse_comma_name};
use crate::scraper::{RawPage, Source, SourceParser};
use anyhow::{Context, Result};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use tracing::{debug, info, warn};

pub const CLEAN_FOOTBALL_DATA_COLUMNS: &[&str] = &[
    "Div", "Date", "Time", "HomeTeam", "AwayTeam", "FTHG", "FTAG", "FTR", "HTHG", "HTAG",
    "HTR", "Referee", "HS", "AS", "HST", "AST", "HF", "AF", "HC", "AC",
    "HY", "AY", "HR", "AR", "B365H", "B365D", "B365A", "BWH", "BWD", "BWA",
    "IWH", "IWD", "IWA", "PSH", "PSD", "PSA", "WHH", "WHD", "WHA", "VCH",
    "VCD", "VCA", "MaxH", "MaxD", "MaxA", "AvgH", "AvgD", "AvgA", "B365>2.5", "B365<2.5",
    "P>2.5", "P<2.5", "Max>2.5", "Max<2.5", "Avg>2.5", "Avg<2.5", "AHh", "B365AHH", "B365AHA", "PAHH",
    "PAHA", "MaxAHH", "MaxAHA", "AvgAHH", "AvgAHA", "B365CH", "B365CD", "B365CA", "BWCH", "BWCD",
    "BWCA", "IWCH", "IWCD", "IWCA", "PSCH", "PSCD", "PSCA", "WHCH", "WHCD", "WHCA",
    "VCCH", "VCCD", "VCCA", "MaxCH", "MaxCD", "MaxCA", "AvgCH", "AvgCD", "AvgCA", "B365C>2.5",
    "B365C<2.5", "PC>2.5", "PC<2.5", "MaxC>2.5", "MaxC<2.5", "AvgC>2.5", "AvgC<2.5", "AHCh", "B365CAHH", "B365CAHA",
    "PCAHH", "PCAHA", "MaxCAHH", "MaxCAHA", "AvgCAHH", "AvgCAHA",
];

// ── Table ─────────────────────────────────────────────────────────────────────

/// Header plus string cells; every row has exactly `headers.len()` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DelimitedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl DelimitedTable {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn require(&self, name: &str) -> Result<usize, PageError> {
        self.column(name)
            .ok_or_else(|| PageError::MissingColumn(name.to_string()))
    }

    /// Reorder to exactly `schema`: missing columns become empty, anything
    /// else is dropped.
    pub fn conform_to(&self, schema: &[&str]) -> DelimitedTable {
        let positions: Vec<Option<usize>> = schema.iter().map(|c| self.column(c)).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                positions
                    .iter()
                    .map(|p| p.and_then(|i| row.get(i).cloned()).unwrap_or_default())
                    .collect()
            })
            .collect();
        DelimitedTable {
            headers: schema.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.into_inner().context("Failed to flush CSV buffer")
    }
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// UTF-8 first, then Windows-1252, which decodes any byte sequence.
pub fn decode_with_fallback(bytes: &[u8]) -> (String, &'static Encoding) {
    if let Some(text) = UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
        let text: &str = &text;
        return (text.strip_prefix('\u{feff}').unwrap_or(text).to_string(), UTF_8);
    }
    let (text, _had_errors) = WINDOWS_1252.decode_without_bom_handling(bytes);
    (text.into_owned(), WINDOWS_1252)
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Standard CSV parse. Short rows are padded to the header width; a row
/// wider than the header is an error.
pub fn parse_strict(text: &str) -> Result<DelimitedTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .context("Unreadable header row")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let expected = headers.len();

    let mut rows = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result.context("Malformed row")?;
        if record.len() > expected {
            anyhow::bail!(
                "Row {} has {} fields, header declares {}",
                i + 1,
                record.len(),
                expected
            );
        }
        let mut fields: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        fields.resize(expected, String::new());
        rows.push(fields);
    }

    Ok(DelimitedTable { headers, rows })
}

/// A header cell counts when it has at least one alphanumeric character.
fn is_valid_column(s: &str) -> bool {
    !s.trim().is_empty() && s.chars().any(char::is_alphanumeric)
}

/// Record-by-record parse, taking the header's valid column count as truth.
/// Extra trailing fields are cut off and short rows are padded.
pub fn repair_excess_delimiters(text: &str) -> Result<DelimitedTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut records = reader.records();

    let header = records.next().context("Empty file")?.context("Unreadable header row")?;
    let headers: Vec<String> = header
        .iter()
        .filter(|c| is_valid_column(c))
        .map(|c| c.trim().to_string())
        .collect();
    let expected = headers.len();

    let mut truncated = 0usize;
    let mut rows = Vec::new();
    for result in records {
        let record = result.context("Malformed row")?;
        if record.len() > expected {
            truncated += 1;
        }
        let mut fields: Vec<String> = record.iter().take(expected).map(|s| s.to_string()).collect();
        fields.resize(expected, String::new());
        rows.push(fields);
    }

    debug!("Delimiter repair: {} columns, {} rows truncated", expected, truncated);
    Ok(DelimitedTable { headers, rows })
}

/// Decode, then parse, falling back to the manual repair.
pub fn read_delimited(bytes: &[u8]) -> Result<DelimitedTable> {
    let (text, encoding) = decode_with_fallback(bytes);
    if encoding != UTF_8 {
        info!("Not UTF-8, decoded as {}", encoding.name());
    }

    match parse_strict(&text) {
        Ok(table) => Ok(table),
        Err(e) => {
            warn!("Standard parse failed ({:#}), repairing delimiters", e);
            repair_excess_delimiters(&text)
        }
    }
}

// ── Cleaning ──────────────────────────────────────────────────────────────────

/// Row and field cleanup, then conformance to [`CLEAN_FOOTBALL_DATA_COLUMNS`].
pub fn clean_football_data(table: &DelimitedTable) -> Result<DelimitedTable> {
    let div = table.require("Div")?;
    let date = table.require("Date")?;
    let referee = table.column("Referee");
    let teams: Vec<usize> = ["HomeTeam", "AwayTeam"]
        .iter()
        .filter_map(|c| table.column(c))
        .collect();

    let mut rows = Vec::with_capacity(table.rows.len());
    let mut bad_dates = 0usize;

    for row in &table.rows {
        if row.get(div).is_none_or(|d| d.trim().is_empty()) {
            continue;
        }
        let mut row = row.clone();

        let Some(parsed) = row.get(date).and_then(|d| parse_football_data_date(d)) else {
            bad_dates += 1;
            continue;
        };
        row[date] = parsed.format("%Y-%m-%d").to_string();

        if let Some(i) = referee {
            row[i] = reverse_comma_name(&row[i]);
        }
        for &i in &teams {
            row[i] = row[i].trim().to_string();
        }
        rows.push(row);
    }

    if bad_dates > 0 {
        warn!("Dropped {} rows with unparseable dates", bad_dates);
    }

    let cleaned = DelimitedTable {
        headers: table.headers.clone(),
        rows,
    };
    Ok(cleaned.conform_to(CLEAN_FOOTBALL_DATA_COLUMNS))
}

/// A raw season file, as downloaded or read back from storage.
pub struct FootballDataFileParser;

impl SourceParser for FootballDataFileParser {
    type Output = DelimitedTable;

    fn source(&self) -> Source {
        Source::FootballData
    }

    fn parse(&self, page: &RawPage) -> Result<DelimitedTable> {
        let table = read_delimited(&page.body)?;
        clean_football_data(&table)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = "Div,Date,HomeTeam,AwayTeam,FTHG,FTAG,Referee,Extra\n\
                        E0,19/08/00,Charlton ,Man City,4,0,\"Durkin, Paul\",x\n\
                        E0,19/08/2000,Chelsea,West Ham,4,2,M Dean,y\n\
                        ,,,,,,,\n";

    #[test]
    fn test_decode_falls_back_to_windows_1252() {
        let (text, enc) = decode_with_fallback("Div,Referee\nE0,Mr Ñ\n".as_bytes());
        assert_eq!(enc, UTF_8);
        assert!(text.contains('Ñ'));

        // 0xE9 is 'é' in cp1252 and invalid on its own in UTF-8
        let (text, enc) = decode_with_fallback(b"Div,HomeTeam\nF1,Saint-\xe9tienne\n");
        assert_eq!(enc, WINDOWS_1252);
        assert!(text.contains("Saint-étienne"));

        let (text, _) = decode_with_fallback("\u{feff}Div".as_bytes());
        assert_eq!(text, "Div");
    }

    #[test]
    fn test_excess_delimiters_are_truncated_to_header_width() {
        let text = "Div,Date,HomeTeam,AwayTeam\nE0,19/08/00,Charlton,Man City,,,\nE0,20/08/00,Leeds\n";
        assert!(parse_strict(text).is_err());

        let table = read_delimited(text.as_bytes()).unwrap();
        assert_eq!(table.headers.len(), 4);
        assert_eq!(table.rows[0], vec!["E0", "19/08/00", "Charlton", "Man City"]);
        assert_eq!(table.rows[1], vec!["E0", "20/08/00", "Leeds", ""]);
    }

    #[test]
    fn test_short_rows_are_padded_without_repair() {
        let text = "Div,Date,HomeTeam,AwayTeam,Referee,FTHG\n\
                    E0,19/08/00,Charlton,Man City,\"Durkin, Paul\",4\n\
                    E0,20/08/00\n";
        let table = parse_strict(text).unwrap();
        assert_eq!(table.rows[0][4], "Durkin, Paul");
        assert_eq!(table.rows[0][5], "4");
        assert_eq!(table.rows[1], vec!["E0", "20/08/00", "", "", "", ""]);
    }

    #[test]
    fn test_repair_keeps_quoted_commas_together() {
        let text = "Div,Date,HomeTeam,AwayTeam,Referee,FTHG\n\
                    E0,19/08/00,Charlton,Man City,\"Durkin, Paul\",4\n\
                    E0,20/08/00\n\
                    E0,21/08/00,Leeds,Everton,\"Poll, Graham\",2,,,\n";
        assert!(parse_strict(text).is_err());

        let table = read_delimited(text.as_bytes()).unwrap();
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0][4], "Durkin, Paul");
        assert_eq!(table.rows[0][5], "4");
        assert_eq!(table.rows[1].len(), 6);
        assert_eq!(table.rows[2], vec!["E0", "21/08/00", "Leeds", "Everton", "Poll, Graham", "2"]);

        let cleaned = clean_football_data(&table).unwrap();
        let referee = cleaned.column("Referee").unwrap();
        let fthg = cleaned.column("FTHG").unwrap();
        assert_eq!(cleaned.rows[0][referee], "Paul Durkin");
        assert_eq!(cleaned.rows[0][fthg], "4");
        assert_eq!(cleaned.rows[2][referee], "Graham Poll");
    }

    #[test]
    fn test_repair_drops_blank_header_cells() {
        let table = repair_excess_delimiters("Div,Date,,HomeTeam, ,\nE0,01/01/01,x,y\n").unwrap();
        assert_eq!(table.headers, vec!["Div", "Date", "HomeTeam"]);
        assert_eq!(table.rows[0].len(), 3);
    }

    #[test]
    fn test_clean_football_data_conforms_to_schema() {
        let table = read_delimited(GOOD.as_bytes()).unwrap();
        let cleaned = clean_football_data(&table).unwrap();

        assert_eq!(cleaned.headers.len(), CLEAN_FOOTBALL_DATA_COLUMNS.len());
        assert!(cleaned.column("Extra").is_none());
        assert_eq!(cleaned.rows.len(), 2);

        let date = cleaned.column("Date").unwrap();
        let home = cleaned.column("HomeTeam").unwrap();
        let referee = cleaned.column("Referee").unwrap();
        let b365 = cleaned.column("B365H").unwrap();
        assert_eq!(cleaned.rows[0][date], "2000-08-19");
        assert_eq!(cleaned.rows[1][date], "2000-08-19");
        assert_eq!(cleaned.rows[0][home], "Charlton");
        assert_eq!(cleaned.rows[0][referee], "Paul Durkin");
        assert_eq!(cleaned.rows[0][b365], "");
    }

    #[test]
    fn test_clean_requires_div() {
        let table = DelimitedTable {
            headers: vec!["Date".into()],
            rows: vec![],
        };
        let err = clean_football_data(&table).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PageError>(),
            Some(&PageError::MissingColumn("Div".into()))
        );
    }

    #[test]
    fn test_to_csv_writes_header_first() {
        let table = DelimitedTable {
            headers: vec!["Div".into(), "Referee".into()],
            rows: vec![vec!["E0".into(), "Paul Durkin".into()]],
        };
        let out = String::from_utf8(table.to_csv().unwrap()).unwrap();
        assert_eq!(out, "Div,Referee\nE0,Paul Durkin\n");
    }

    #[test]
    fn test_file_parser_end_to_end() {
        let page = RawPage::new("s3://raw/country=England/league=E0/season=0001/E0.csv", GOOD.as_bytes().to_vec());
        let cleaned = FootballDataFileParser.parse(&page).unwrap();
        assert_eq!(cleaned.rows.len(), 2);
    }
}
