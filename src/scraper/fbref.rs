//! fbref.com season results pages and match reports.

use crate::error::{LookupError, PageError};
use crate::models::{Competition, LineupReport, MatchRecord};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::LazyLock;
use url::Url;

use super::cleaner::{
    clean_manager_name, clean_results_table, season_from_fixtures_header, team_from_header,
};
use super::parsers::{element_text, first_header_text, parse_html_table, selector};

static COMP_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/comps/(\d+)/").expect("static regex"));

/// Starting players listed per side.
pub const STARTING_XI: usize = 11;

pub fn competition_from_url(link: &str) -> Result<&'static Competition, LookupError> {
    let id = COMP_ID
        .captures(link)
        .and_then(|c| c.get(1))
        .ok_or_else(|| LookupError::NoCompetitionInUrl(link.to_string()))?;
    Competition::from_id(id.as_str())
}

// ── Season results page ───────────────────────────────────────────────────────

/// Everything derived from one season page, computed when it is parsed.
#[derive(Debug, Clone)]
pub struct FbrefSeasonPage {
    link: String,
    league_name: &'static str,
    is_current_season: bool,
    output_file_name: String,
    matches: Vec<MatchRecord>,
    match_links: Vec<String>,
}

impl FbrefSeasonPage {
    /// `today` bounds the current season page to matches already played.
    pub fn parse(link: &str, html: &str, base_url: &str, today: NaiveDate) -> Result<Self> {
        let league_name = competition_from_url(link)?.name;
        let doc = Html::parse_document(html);

        let is_current_season = !has_anchor_text(&doc, "Next Season")?;
        let output_file_name = output_file_name(&doc, link, is_current_season)?;

        let table = results_table(&doc)?.ok_or(PageError::MissingResultsTable)?;
        let table = parse_html_table(table)?;
        let cutoff = is_current_season.then_some(today);
        let matches = clean_results_table(&table, league_name, cutoff)
            .with_context(|| format!("results table of {}", link))?;

        let match_links = match_links(&doc, base_url)?;

        Ok(Self {
            link: link.to_string(),
            league_name,
            is_current_season,
            output_file_name,
            matches,
            match_links,
        })
    }

    pub fn link(&self) -> &str {
        &self.link
    }
    pub fn league_name(&self) -> &'static str {
        self.league_name
    }
    /// The season still in progress: no "Next Season" link on the page.
    pub fn is_current_season(&self) -> bool {
        self.is_current_season
    }
    /// Object stem for the intermediate CSV.
    pub fn output_file_name(&self) -> &str {
        &self.output_file_name
    }
    pub fn matches(&self) -> &[MatchRecord] {
        &self.matches
    }
    pub fn match_links(&self) -> &[String] {
        &self.match_links
    }
}

fn has_anchor_text(doc: &Html, text: &str) -> Result<bool> {
    let a = selector("a[href]")?;
    Ok(doc.select(&a).any(|el| element_text(el) == text))
}

/// Historic pages carry the season in their URL already; the current page
/// does not, so it is read from the fixtures heading instead.
fn output_file_name(doc: &Html, link: &str, is_current_season: bool) -> Result<String> {
    let slug = link.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
    if !is_current_season {
        return Ok(slug.to_string());
    }

    let h2 = selector("h2")?;
    let span = selector("span")?;
    let heading = doc
        .select(&h2)
        .find(|el| el.text().any(|t| t.contains("Fixtures")))
        .ok_or(PageError::MissingElement("fixtures heading"))?;
    let header = heading
        .select(&span)
        .next()
        .map(element_text)
        .unwrap_or_else(|| element_text(heading));
    let season = season_from_fixtures_header(&header)
        .ok_or_else(|| PageError::NoSeasonInHeader(header.clone()))?;
    Ok(format!("{}-{}", season, slug))
}

fn results_table(doc: &Html) -> Result<Option<ElementRef<'_>>> {
    for css in ["table[id^=\"sched\"]", "table"] {
        let sel = selector(css)?;
        if let Some(table) = doc.select(&sel).next() {
            return Ok(Some(table));
        }
    }
    Ok(None)
}

/// Absolute match report URLs from the score cells.
fn match_links(doc: &Html, base_url: &str) -> Result<Vec<String>> {
    let base = Url::parse(base_url).with_context(|| format!("bad base url {}", base_url))?;
    let sel = selector("[data-stat=\"score\"].center a[href]")?;
    Ok(doc
        .select(&sel)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .map(String::from)
        .collect())
}

// ── Match report page ─────────────────────────────────────────────────────────

/// Starting lineups, managers and date from a match report.
pub fn parse_match_report(match_link: &str, html: &str) -> Result<LineupReport> {
    let doc = Html::parse_document(html);

    let tables = lineup_tables(&doc)?;
    if tables.len() < 2 {
        return Err(PageError::MissingLineupTables(tables.len()).into());
    }
    let (home_table, away_table) = (tables[0], tables[1]);

    let home_team = first_header_text(home_table)?
        .map(|h| team_from_header(&h))
        .unwrap_or_default();
    let away_team = first_header_text(away_table)?
        .map(|h| team_from_header(&h))
        .unwrap_or_default();

    let home_lineup = starting_players(home_table)?;
    let away_lineup = starting_players(away_table)?;

    let scorebox_sel = selector(".scorebox")?;
    let datapoint_sel = selector(".datapoint")?;
    let scorebox = doc
        .select(&scorebox_sel)
        .next()
        .ok_or(PageError::MissingElement("scorebox"))?;
    let datapoints: Vec<String> = scorebox
        .select(&datapoint_sel)
        .map(|el| el.text().collect::<String>())
        .collect();
    // home manager, home captain, away manager, away captain
    let home_manager = datapoints
        .first()
        .map(|s| clean_manager_name(s))
        .ok_or(PageError::MissingElement("home manager"))?;
    let away_manager = datapoints
        .get(2)
        .map(|s| clean_manager_name(s))
        .ok_or(PageError::MissingElement("away manager"))?;

    let date_sel = selector(".scorebox_meta span[data-venue-date]")?;
    let date = doc
        .select(&date_sel)
        .next()
        .and_then(|el| el.value().attr("data-venue-date"))
        .ok_or(PageError::MissingElement("venue date"))?
        .to_string();

    Ok(LineupReport {
        match_link: match_link.to_string(),
        date,
        home_team,
        away_team,
        home_lineup,
        away_lineup,
        home_manager,
        away_manager,
    })
}

fn lineup_tables(doc: &Html) -> Result<Vec<ElementRef<'_>>> {
    let in_lineup = selector("div.lineup table")?;
    let tables: Vec<_> = doc.select(&in_lineup).collect();
    if tables.len() >= 2 {
        return Ok(tables);
    }
    let any = selector("table")?;
    Ok(doc.select(&any).collect())
}

fn starting_players(table: ElementRef<'_>) -> Result<Vec<String>> {
    let parsed = parse_html_table(table)?;
    Ok(parsed
        .rows
        .iter()
        .take(STARTING_XI)
        .filter_map(|r| r.get(1).cloned())
        .collect())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
