pub mod cleaner;
pub mod fbref;
pub mod football_data;
pub mod http_client;
pub mod parsers;

use crate::models::{FootballDataSeason, LineupReport};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::borrow::Cow;
use std::fmt;
use tracing::debug;

use self::fbref::{FbrefSeasonPage, parse_match_report};

// ── Fetching ──────────────────────────────────────────────────────────────────

/// A fetched page or file, undecoded.
#[derive(Debug, Clone)]
pub struct RawPage {
    pub url: String,
    pub body: Vec<u8>,
}

impl RawPage {
    pub fn new(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            url: url.into(),
            body,
        }
    }

    /// HTML pages are UTF-8; stray bytes become U+FFFD.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Swappable page source, so runs can be driven from fixtures.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RawPage>;
}

// ── Sources ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Fbref,
    FootballData,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Fbref => write!(f, "fbref"),
            Source::FootballData => write!(f, "football-data"),
        }
    }
}

/// One site-specific page shape. Each source's quirks live behind this.
pub trait SourceParser {
    type Output;

    fn source(&self) -> Source;

    fn parse(&self, page: &RawPage) -> Result<Self::Output>;
}

/// Fetch `url` and hand it to `parser`.
pub async fn fetch_and_parse<P: SourceParser>(
    fetcher: &dyn PageFetcher,
    parser: &P,
    url: &str,
) -> Result<P::Output> {
    debug!("[{}] fetching {}", parser.source(), url);
    let page = fetcher.fetch(url).await?;
    parser
        .parse(&page)
        .with_context(|| format!("[{}] failed to parse {}", parser.source(), url))
}

/// Season results page.
pub struct FbrefSeasonParser {
    pub base_url: String,
    pub today: NaiveDate,
}

impl SourceParser for FbrefSeasonParser {
    type Output = FbrefSeasonPage;

    fn source(&self) -> Source {
        Source::Fbref
    }

    fn parse(&self, page: &RawPage) -> Result<FbrefSeasonPage> {
        FbrefSeasonPage::parse(&page.url, &page.text(), &self.base_url, self.today)
    }
}

/// Match report page.
pub struct FbrefMatchReportParser;

impl SourceParser for FbrefMatchReportParser {
    type Output = LineupReport;

    fn source(&self) -> Source {
        Source::Fbref
    }

    fn parse(&self, page: &RawPage) -> Result<LineupReport> {
        parse_match_report(&page.url, &page.text())
    }
}

/// Country index page listing season files.
pub struct FootballDataCountryParser {
    pub country: String,
}

impl SourceParser for FootballDataCountryParser {
    type Output = Vec<FootballDataSeason>;

    fn source(&self) -> Source {
        Source::FootballData
    }

    fn parse(&self, page: &RawPage) -> Result<Vec<FootballDataSeason>> {
        football_data::parse_country_page(&page.url, &page.text(), &self.country)
    }
}

// ── Test fetcher ──────────────────────────────────────────────────────────────
