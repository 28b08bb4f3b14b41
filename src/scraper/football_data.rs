//! football-data.co.uk country index pages.

use crate::models::FootballDataSeason;
use anyhow::{Context, Result};
use scraper::Html;
use tracing::debug;
use url::Url;

use super::parsers::selector;

/// Season files linked from a country page, resolved against `page_url`.
pub fn season_links(page_url: &str, html: &str) -> Result<Vec<String>> {
    let base = Url::parse(page_url).with_context(|| format!("bad page url {}", page_url))?;
    let doc = Html::parse_document(html);
    let a = selector("a[href]")?;

    Ok(doc
        .select(&a)
        .filter_map(|el| el.value().attr("href"))
        .filter(|href| href.contains(".csv"))
        .filter_map(|href| base.join(href).ok())
        .map(String::from)
        .collect())
}

/// Seasons listed on a country page. Links that do not decode to a season
/// are logged and skipped.
pub fn parse_country_page(page_url: &str, html: &str, country: &str) -> Result<Vec<FootballDataSeason>> {
    let seasons = season_links(page_url, html)?
        .into_iter()
        .filter_map(|link| {
            let season = FootballDataSeason::from_url(&link, country);
            if season.is_none() {
                debug!("{}: not a season file: {}", country, link);
            }
            season
        })
        .collect();
    Ok(seasons)
}

/// Seasons with the latest finish year, i.e. those still being played.
pub fn current_seasons(seasons: &[FootballDataSeason]) -> Vec<FootballDataSeason> {
    let Some(latest) = seasons.iter().map(|s| s.year()).max() else {
        return Vec::new();
    };
    seasons.iter().filter(|s| s.year() == latest).cloned().collect()
}
