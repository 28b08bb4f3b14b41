use crate::error::PageError;
use crate::models::MatchRecord;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use super::parsers::HtmlTable;

static PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)").expect("static regex"));
static TEAM_BEFORE_FORMATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^(]+) \(").expect("static regex"));
static TWO_YEAR_SEASON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4}-\d{4})").expect("static regex"));
static ONE_YEAR_SEASON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})").expect("static regex"));

/// Scoreline separator used by fbref.
pub const EN_DASH: char = '\u{2013}';

// ── Field parsers ─────────────────────────────────────────────────────────────

/// Drop every `( ... )` group and tidy the spacing left behind.
/// "(3) 1–1 (4)" → "1–1"
pub fn strip_parentheticals(s: &str) -> String {
    let stripped = PARENTHETICAL.replace_all(s, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// "2–0" → (2, 0) | "(3) 1–1 (4)" → (1, 1)
pub fn split_scoreline(s: &str) -> Option<(u32, u32)> {
    let cleaned = strip_parentheticals(s);
    let (home, away) = cleaned.split_once(EN_DASH)?;
    Some((home.trim().parse().ok()?, away.trim().parse().ok()?))
}

pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// "60,012" → 60012.0 | "" → None
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim().replace(',', "");
    if s.is_empty() {
        return None;
    }
    s.parse().ok()
}

pub fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() { None } else { Some(s.to_string()) }
}

/// Source header → canonical name. `None` for columns we discard.
pub fn canonical_header(header: &str) -> Option<String> {
    match header {
        "Match Report" | "Notes" => None,
        "xG" => Some("home_xg".to_string()),
        "xG.1" => Some("away_xg".to_string()),
        "Wk" => Some("week".to_string()),
        other => Some(other.to_lowercase()),
    }
}

/// "Arsenal (4-3-3)" → "Arsenal". Empty when no formation suffix.
pub fn team_from_header(header: &str) -> String {
    TEAM_BEFORE_FORMATION
        .captures(header)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// "Manager:\u{a0}Mikel Arteta" → "Mikel Arteta"
pub fn clean_manager_name(s: &str) -> String {
    s.replace('\u{a0}', " ").replace("Manager: ", "").trim().to_string()
}

/// "2023-2024 Premier League Scores & Fixtures" → "2023-2024", MLS → "2024"
pub fn season_from_fixtures_header(header: &str) -> Option<String> {
    TWO_YEAR_SEASON
        .captures(header)
        .or_else(|| ONE_YEAR_SEASON.captures(header))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Four-digit year tokens of an object key, hyphen-joined.
/// "2022-2023-Premier-League-Scores-and-Fixtures.csv" → "2022-2023"
pub fn season_from_key(key: &str) -> String {
    key.split('-')
        .filter(|t| t.len() == 4 && t.chars().all(|c| c.is_ascii_digit()))
        .collect::<Vec<_>>()
        .join("-")
}

/// Day and month always lead; the year field's own width picks `%y` or `%Y`.
pub fn parse_football_data_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let mut parts = s.split('/');
    let (_day, _month, year) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let format = if year.len() == 2 { "%d/%m/%y" } else { "%d/%m/%Y" };
    NaiveDate::parse_from_str(s, format).ok()
}

/// "Smith, John" → "John Smith". Names without a comma are left alone.
pub fn reverse_comma_name(s: &str) -> String {
    if !s.contains(',') {
        return s.to_string();
    }
    s.split(',')
        .rev()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Results table → MatchRecord ───────────────────────────────────────────────

/// Column positions under canonical names.
struct Columns {
    names: Vec<Option<String>>,
}

impl Columns {
    fn new(table: &HtmlTable) -> Self {
        Self {
            names: table.headers.iter().map(|h| canonical_header(h)).collect(),
        }
    }

    fn index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n.as_deref() == Some(name))
    }

    fn require(&self, name: &str) -> Result<usize, PageError> {
        self.index(name)
            .ok_or_else(|| PageError::MissingColumn(name.to_string()))
    }
}

/// Turn a season results table into played matches.
///
/// Dropped: separator rows (no date), repeated header rows, fixtures (no
/// score), scorelines that do not split into two goal counts, and, when
/// `played_before` is set, anything dated on or after it.
pub fn clean_results_table(
    table: &HtmlTable,
    league_name: &str,
    played_before: Option<NaiveDate>,
) -> Result<Vec<MatchRecord>, PageError> {
    let cols = Columns::new(table);
    let date_i = cols.require("date")?;
    let score_i = cols.require("score")?;
    let home_i = cols.require("home")?;
    let away_i = cols.require("away")?;

    let opt = |row: &[String], name: &str| -> Option<String> {
        cols.index(name)
            .and_then(|i| row.get(i))
            .and_then(|s| non_empty(s))
    };
    let num = |row: &[String], name: &str| -> Option<f64> {
        cols.index(name)
            .and_then(|i| row.get(i))
            .and_then(|s| parse_number(s))
    };

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for row in &table.rows {
        let Some(date_str) = row.get(date_i).and_then(|s| non_empty(s)) else {
            skipped += 1;
            continue;
        };
        if date_str.contains("Date") {
            skipped += 1;
            continue;
        }
        let Some(score_raw) = row.get(score_i).and_then(|s| non_empty(s)) else {
            skipped += 1;
            continue;
        };
        let Some(date) = parse_iso_date(&date_str) else {
            debug!("Unparseable date {:?}", date_str);
            skipped += 1;
            continue;
        };
        if played_before.is_some_and(|cutoff| date >= cutoff) {
            skipped += 1;
            continue;
        }
        let Some((home_goals, away_goals)) = split_scoreline(&score_raw) else {
            debug!("Unparseable scoreline {:?} on {}", score_raw, date);
            skipped += 1;
            continue;
        };

        records.push(MatchRecord {
            round: opt(row, "round"),
            week: num(row, "week"),
            day: opt(row, "day"),
            date,
            time: opt(row, "time"),
            home: row.get(home_i).map(|s| s.trim().to_string()).unwrap_or_default(),
            home_xg: num(row, "home_xg"),
            score: strip_parentheticals(&score_raw),
            away_xg: num(row, "away_xg"),
            away: row.get(away_i).map(|s| s.trim().to_string()).unwrap_or_default(),
            attendance: num(row, "attendance"),
            venue: opt(row, "venue"),
            referee: opt(row, "referee"),
            league_name: league_name.to_string(),
            home_goals,
            away_goals,
        });
    }

    debug!("{}: kept {} rows, skipped {}", league_name, records.len(), skipped);
    Ok(records)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
