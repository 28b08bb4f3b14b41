//! Pipeline orchestrator: ties scraper → storage together.
//!
//! ## Run modes
//!
//! `scrape_xg_result_seasons()`: historical crawl. Every competition-season
//!   in the configured window not yet in the ledger is scraped to CSV.
//!   Historic pages are ledgered; the season in progress never is, so it is
//!   re-checked on every run.
//!
//! `scrape_team_lineups()`: producer. Match links of every season page not
//!   in the ledger or on the queue are scraped and enqueued, then ledgered.
//!
//! `load_lineups()`: consumer. Drains the queue into per-match CSVs.
//!
//! `load_football_data()`: football-data.co.uk raw season files, either the
//!   current season only (`Update`) or everything listed (`Backfill`).
//!
//! Everything runs sequentially; the fetcher's fixed delay is the only
//! throttle. A crash between writing an object and appending to the ledger
//! means that link is redone next run, overwriting the same key.

use crate::config::AppConfig;
use crate::error::LookupError;
use crate::loader::FootballDataFileParser;
use crate::models::{
    COMPETITIONS, Competition, FOOTBALL_DATA_COUNTRIES, LineupMessage, MatchRecord,
    SeasonDescriptor, country_page_url, season_year,
};
use crate::planner::{ClaimSet, plan};
use crate::scraper::cleaner::season_from_key;
use crate::scraper::fbref::FbrefSeasonPage;
use crate::scraper::football_data::current_seasons;
use crate::scraper::http_client::HttpClient;
use crate::scraper::{
    FbrefMatchReportParser, FbrefSeasonParser, FootballDataCountryParser, PageFetcher, RawPage,
    SourceParser, fetch_and_parse,
};
use crate::storage::sink::{partition_key, records_from_csv, records_to_csv, to_parquet};
use crate::storage::{Ledger, MessageQueue, ObjectStore, inflight_links};
use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which football-data.co.uk seasons a run downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Seasons with the latest finish year only.
    Update,
    /// Every season listed.
    Backfill,
}

impl FromStr for LoadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "update" => Ok(LoadMode::Update),
            "backfill" => Ok(LoadMode::Backfill),
            other => Err(format!("Invalid mode: {}", other)),
        }
    }
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadMode::Update => write!(f, "update"),
            LoadMode::Backfill => write!(f, "backfill"),
        }
    }
}

pub struct Pipeline {
    config: AppConfig,
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn ObjectStore>,
    queue: Arc<dyn MessageQueue>,
    ledger: Ledger,
    today: NaiveDate,
}

impl Pipeline {
    pub fn new(
        config: AppConfig,
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn ObjectStore>,
        queue: Arc<dyn MessageQueue>,
    ) -> Self {
        let ledger = Ledger::new(
            Arc::clone(&store),
            config.storage.misc_bucket.clone(),
            config.storage.ledger_key.clone(),
        );
        Self {
            config,
            fetcher,
            store,
            queue,
            ledger,
            today: Utc::now().date_naive(),
        }
    }

    /// Live HTTP fetcher plus the configured storage backend.
    pub async fn connect(config: AppConfig) -> Result<Self> {
        let fetcher: Arc<dyn PageFetcher> = Arc::new(
            HttpClient::new(&config.scraper).context("Failed to build HTTP client")?,
        );
        let (store, queue) = crate::storage::connect(&config).await?;
        Ok(Self::new(config, fetcher, store, queue))
    }

    fn season_parser(&self) -> FbrefSeasonParser {
        FbrefSeasonParser {
            base_url: self.config.scraper.fbref_base_url.clone(),
            today: self.today,
        }
    }

    fn season_candidates(&self) -> Vec<SeasonDescriptor> {
        SeasonDescriptor::enumerate(&self.config.crawl.years(), &self.config.scraper.fbref_base_url)
    }

    /// Scrape one season page and land its matches as CSV.
    async fn scrape_results_page(&self, url: &str) -> Result<FbrefSeasonPage> {
        let page = fetch_and_parse(self.fetcher.as_ref(), &self.season_parser(), url).await?;
        let key = format!("{}.csv", page.output_file_name());
        let body = records_to_csv(page.matches())?;
        self.store
            .put(&self.config.storage.xg_results_bucket, &key, body)
            .await?;
        info!(
            "{}: {} matches → {}/{}",
            page.league_name(),
            page.matches().len(),
            self.config.storage.xg_results_bucket,
            key
        );
        Ok(page)
    }

    // ── xG results ────────────────────────────────────────────────────────────

    pub async fn scrape_xg_result_seasons(&self) -> Result<RunStats> {
        let committed = self.ledger.read().await?;
        let worklist = plan(self.season_candidates(), &committed, &HashSet::new());
        info!(
            "=== xG results: {} season pages to scrape ({} already ledgered) ===",
            worklist.len(),
            committed.len()
        );

        let mut stats = RunStats::planned(worklist.len());
        for season in &worklist {
            match self.scrape_results_page(season.url()).await {
                Ok(page) => {
                    stats.written += 1;
                    if page.is_current_season() {
                        debug!("{} is the current season; not ledgered", page.link());
                    } else if let Err(e) = self.ledger.append(&[page.link().to_string()]).await {
                        warn!("Could not ledger {}: {:#}", page.link(), e);
                        stats.errors += 1;
                    }
                }
                Err(e) => {
                    warn!("{} {}: {:#}", season.league_name(), season.year(), e);
                    stats.errors += 1;
                }
            }
        }
        stats.log("xG results");
        Ok(stats)
    }

    /// Re-scrape each competition's current-season page. A league whose
    /// season has not started just fails and is skipped.
    pub async fn scrape_current_seasons(&self) -> Result<RunStats> {
        let base = &self.config.scraper.fbref_base_url;
        let mut stats = RunStats::planned(COMPETITIONS.len());
        for comp in COMPETITIONS {
            let url = comp.current_season_url(base);
            match self.scrape_results_page(&url).await {
                Ok(_) => stats.written += 1,
                Err(e) => {
                    warn!("{}: {:#}", comp.name, e);
                    stats.errors += 1;
                }
            }
        }
        stats.log("Current seasons");
        Ok(stats)
    }

    // ── Lineups ───────────────────────────────────────────────────────────────

    pub async fn scrape_team_lineups(&self) -> Result<RunStats> {
        let claims = ClaimSet::new(
            self.ledger.read().await?,
            inflight_links(self.queue.as_ref()).await?,
        );
        info!(
            "=== Lineups: {} links ledgered, {} in flight ===",
            claims.committed_len(),
            claims.inflight_len()
        );

        let parser = self.season_parser();
        let mut stats = RunStats::default();
        for season in self.season_candidates() {
            let page = match fetch_and_parse(self.fetcher.as_ref(), &parser, season.url()).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("{}: {:#}", season.url(), e);
                    stats.errors += 1;
                    continue;
                }
            };

            let todo = claims.plan(page.match_links().iter().cloned());
            info!(
                "{} {}: {} of {} match reports to scrape",
                season.league_name(),
                season.season_code(),
                todo.len(),
                page.match_links().len()
            );
            stats.planned += todo.len();
            stats.skipped += page.match_links().len() - todo.len();

            for link in todo {
                match self.enqueue_lineup(&link, &season).await {
                    Ok(id) => {
                        debug!("{} → message {}", link, id);
                        stats.written += 1;
                        if let Err(e) = self.ledger.append(&[link.clone()]).await {
                            warn!("Could not ledger {}: {:#}", link, e);
                            stats.errors += 1;
                        }
                    }
                    Err(e) => {
                        warn!("{}: {:#}", link, e);
                        stats.errors += 1;
                    }
                }
            }
        }
        stats.log("Lineups");
        Ok(stats)
    }

    async fn enqueue_lineup(&self, link: &str, season: &SeasonDescriptor) -> Result<String> {
        let report = fetch_and_parse(self.fetcher.as_ref(), &FbrefMatchReportParser, link).await?;
        let message = LineupMessage {
            report,
            league: season.league_name().to_string(),
            season_code: season.season_code().to_string(),
        };
        let body = serde_json::to_string(&message)?;
        self.queue.send(&body).await
    }

    /// Write one queued lineup payload. Returns the object key.
    pub async fn load_lineup_message(&self, body: &str) -> Result<String> {
        let message: LineupMessage =
            serde_json::from_str(body).context("Unreadable lineup message")?;
        Competition::from_name(&message.league)?;
        if season_year(&message.league, &message.season_code).is_none() {
            bail!(
                "Season code {} does not fit {}",
                message.season_code,
                message.league
            );
        }
        let key = message.object_key();
        let csv = records_to_csv(&message.rows())?;
        self.store
            .put(&self.config.storage.lineups_bucket, &key, csv)
            .await?;
        Ok(key)
    }

    /// Consume the queue until it comes back empty. A message that fails to
    /// load is left on the queue for the next run.
    pub async fn load_lineups(&self) -> Result<RunStats> {
        let mut stats = RunStats::default();
        loop {
            let batch = self.queue.receive().await?;
            if batch.is_empty() {
                break;
            }
            stats.planned += batch.len();
            for msg in batch {
                match self.load_lineup_message(&msg.body).await {
                    Ok(key) => {
                        self.queue.delete(&msg.receipt).await?;
                        debug!("Loaded {}", key);
                        stats.written += 1;
                    }
                    Err(e) => {
                        warn!("message {}: {:#}", msg.receipt, e);
                        stats.errors += 1;
                    }
                }
            }
        }
        stats.log("Lineup loader");
        Ok(stats)
    }

    // ── Standardise ───────────────────────────────────────────────────────────

    /// Results CSV → partitioned Parquet in the clean bucket. Returns the
    /// written key.
    pub async fn standardise_xg_results(&self, bucket: &str, key: &str) -> Result<String> {
        let body = self
            .store
            .get(bucket, key)
            .await?
            .with_context(|| format!("No object at {}/{}", bucket, key))?;
        let records: Vec<MatchRecord> = records_from_csv(&body)
            .with_context(|| format!("{}/{} is not a results file", bucket, key))?;
        let Some(first) = records.first() else {
            bail!("{}/{} has no rows", bucket, key);
        };

        let out_key = partition_key(
            &[
                ("league", first.league_name.as_str()),
                ("season", season_from_key(key).as_str()),
            ],
            &format!("{}.parquet", key),
        );
        self.store
            .put(
                &self.config.storage.xg_results_clean_bucket,
                &out_key,
                to_parquet(&records)?,
            )
            .await?;
        info!("{}/{} → {}", bucket, key, out_key);
        Ok(out_key)
    }

    pub async fn restandardise_all(&self) -> Result<RunStats> {
        let bucket = self.config.storage.xg_results_bucket.clone();
        let keys = self.store.list(&bucket, "").await?;
        let mut stats = RunStats::planned(keys.len());
        for key in &keys {
            match self.standardise_xg_results(&bucket, key).await {
                Ok(_) => stats.written += 1,
                Err(e) => {
                    warn!("{}: {:#}", key, e);
                    stats.errors += 1;
                }
            }
        }
        stats.log("Restandardise");
        Ok(stats)
    }

    // ── football-data.co.uk ───────────────────────────────────────────────────

    pub async fn load_football_data(&self, mode: LoadMode) -> Result<RunStats> {
        self.load_football_data_for(FOOTBALL_DATA_COUNTRIES, mode).await
    }

    /// An unknown country is fatal; a failing file is not.
    pub async fn load_football_data_for(&self, countries: &[&str], mode: LoadMode) -> Result<RunStats> {
        let base = &self.config.scraper.football_data_base_url;
        let pages = countries
            .iter()
            .map(|c| country_page_url(base, c).map(|url| (*c, url)))
            .collect::<Result<Vec<_>, LookupError>>()?;

        let mut stats = RunStats::default();
        for (country, page_url) in pages {
            let parser = FootballDataCountryParser {
                country: country.to_string(),
            };
            let listed = match fetch_and_parse(self.fetcher.as_ref(), &parser, &page_url).await {
                Ok(seasons) => seasons,
                Err(e) => {
                    warn!("{}: {:#}", country, e);
                    stats.errors += 1;
                    continue;
                }
            };
            let seasons = match mode {
                LoadMode::Update => current_seasons(&listed),
                LoadMode::Backfill => listed,
            };
            info!("{} ({}): {} season files", country, mode, seasons.len());
            stats.planned += seasons.len();

            for season in &seasons {
                let key = season.raw_object_key();
                let result = match self.fetcher.fetch(season.url()).await {
                    Ok(page) => {
                        self.store
                            .put(&self.config.storage.football_data_raw_bucket, &key, page.body)
                            .await
                    }
                    Err(e) => Err(e),
                };
                match result {
                    Ok(()) => {
                        debug!(
                            "{} {} {} → {}",
                            season.country(),
                            season.league_code(),
                            season.season_code(),
                            key
                        );
                        stats.written += 1;
                    }
                    Err(e) => {
                        warn!("{}: {:#}", season.url(), e);
                        stats.errors += 1;
                    }
                }
            }
        }
        stats.log("football-data");
        Ok(stats)
    }

    /// Raw football-data file → fixed-schema CSV under the same key.
    pub async fn clean_football_data(&self, bucket: &str, key: &str) -> Result<usize> {
        let body = self
            .store
            .get(bucket, key)
            .await?
            .with_context(|| format!("No object at {}/{}", bucket, key))?;
        let table = FootballDataFileParser
            .parse(&RawPage::new(key, body))
            .with_context(|| format!("Failed to clean {}/{}", bucket, key))?;
        let rows = table.rows.len();
        self.store
            .put(
                &self.config.storage.football_data_clean_bucket,
                key,
                table.to_csv()?,
            )
            .await?;
        info!("{}/{}: {} clean rows", bucket, key, rows);
        Ok(rows)
    }

    pub async fn ledger_size(&self) -> Result<usize> {
        Ok(self.ledger.read().await?.len())
    }
}

// ── Stats ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub planned: usize,
    pub written: usize,
    /// Already claimed by the ledger or the queue.
    pub skipped: usize,
    pub errors: usize,
}

impl RunStats {
    fn planned(n: usize) -> Self {
        Self {
            planned: n,
            ..Self::default()
        }
    }

    fn log(&self, run: &str) {
        info!(
            "=== {} done: {} planned | {} written | {} skipped | {} errors ===",
            run, self.planned, self.written, self.skipped, self.errors
        );
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CrawlConfig, QueueConfig};
    use crate::scraper::fbref::tests::{CURRENT_URL, match_report_html, season_html};
    use crate::scraper::football_data::tests::{ENGLAND_URL, england_html};
    use crate::scraper::tests::FixtureFetcher;
    use crate::storage::local::LocalStore;

    const PREMIER_2023: &str =
        "https://fbref.com/en/comps/9/2022-2023/schedule/2022-2023-Premier-League-Scores-and-Fixtures";

    fn config() -> AppConfig {
        AppConfig {
            crawl: CrawlConfig {
                latest_year: Some(2023),
                lookback_years: 1,
            },
            ..AppConfig::default()
        }
    }

    fn local() -> Arc<LocalStore> {
        let s = Arc::new(LocalStore::open_in_memory(QueueConfig::default()).unwrap());
        s.run_migrations().unwrap();
        s
    }

    fn pipeline(fetcher: FixtureFetcher, store: Arc<LocalStore>) -> (Pipeline, Arc<FixtureFetcher>) {
        let fetcher = Arc::new(fetcher);
        let p = Pipeline::new(config(), fetcher.clone(), store.clone(), store);
        (p, fetcher)
    }

    #[tokio::test]
    async fn test_xg_run_ledgers_historic_pages_and_skips_them_next_time() {
        let store = local();
        let fetcher = FixtureFetcher::default().with(PREMIER_2023, season_html(true));
        let (p, fetcher) = pipeline(fetcher, store.clone());

        let stats = p.scrape_xg_result_seasons().await.unwrap();
        assert_eq!(stats.planned, COMPETITIONS.len());
        assert_eq!(stats.written, 1);
        assert_eq!(stats.errors, COMPETITIONS.len() - 1);

        let csv = store
            .get(
                "football-xg-results",
                "2022-2023-Premier-League-Scores-and-Fixtures.csv",
            )
            .await
            .unwrap()
            .unwrap();
        let records: Vec<MatchRecord> = records_from_csv(&csv).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(p.ledger_size().await.unwrap(), 1);

        let before = fetcher.requested().len();
        let stats = p.scrape_xg_result_seasons().await.unwrap();
        assert_eq!(stats.planned, COMPETITIONS.len() - 1);
        let rerun: Vec<String> = fetcher.requested()[before..].to_vec();
        assert!(!rerun.contains(&PREMIER_2023.to_string()));
    }

    #[tokio::test]
    async fn test_current_season_page_is_never_ledgered() {
        let store = local();
        let fetcher = FixtureFetcher::default().with(PREMIER_2023, season_html(false));
        let (p, _) = pipeline(fetcher, store.clone());

        p.scrape_xg_result_seasons().await.unwrap();
        assert_eq!(p.ledger_size().await.unwrap(), 0);
        assert_eq!(store.object_count("football-xg-results").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_current_seasons_skip_failing_leagues() {
        let store = local();
        let fetcher = FixtureFetcher::default().with(CURRENT_URL, season_html(false));
        let (p, _) = pipeline(fetcher, store.clone());

        let stats = p.scrape_current_seasons().await.unwrap();
        assert_eq!(stats.written, 1);
        assert_eq!(stats.errors, COMPETITIONS.len() - 1);
        assert_eq!(p.ledger_size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_lineups_round_trip_through_the_queue() {
        let store = local();
        let report = "https://fbref.com/en/matches/74125d47/Fulham-Liverpool";
        let fetcher = FixtureFetcher::default()
            .with(PREMIER_2023, season_html(true))
            .with(report, match_report_html());
        let (p, _) = pipeline(fetcher, store.clone());

        // one link already done, one failing to parse (not in fixtures)
        p.ledger
            .append(&["https://fbref.com/en/matches/e62f6e78/Crystal-Palace-Arsenal".to_string()])
            .await
            .unwrap();

        let stats = p.scrape_team_lineups().await.unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.planned, 2);
        assert_eq!(stats.written, 1);
        assert_eq!(store.queue_len().unwrap(), 1);
        assert_eq!(p.ledger_size().await.unwrap(), 2);

        let loaded = p.load_lineups().await.unwrap();
        assert_eq!(loaded.written, 1);
        assert_eq!(store.queue_len().unwrap(), 0);

        let key = "Premier-League/2022-2023/2022-11-05-Nottingham Forest-Brentford.csv";
        let csv = store
            .get("football-lineups-and-managers", key)
            .await
            .unwrap()
            .unwrap();
        let text = String::from_utf8(csv).unwrap();
        assert!(text.starts_with("home_player,away_player,home_manager"));
        assert_eq!(text.lines().count(), 12);
    }

    /// Local objects, except that the ledger bucket refuses writes.
    struct ReadOnlyLedger(Arc<LocalStore>);

    #[async_trait::async_trait]
    impl ObjectStore for ReadOnlyLedger {
        async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
            self.0.get(bucket, key).await
        }
        async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
            if bucket == "football-misc" {
                bail!("{} is read-only", bucket);
            }
            self.0.put(bucket, key, body).await
        }
        async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
            self.0.list(bucket, prefix).await
        }
    }

    #[tokio::test]
    async fn test_failed_ledger_write_is_counted_not_fatal() {
        let store = local();
        let report = "https://fbref.com/en/matches/74125d47/Fulham-Liverpool";
        let fetcher = Arc::new(
            FixtureFetcher::default()
                .with(PREMIER_2023, season_html(true))
                .with(report, match_report_html()),
        );
        let p = Pipeline::new(
            config(),
            fetcher,
            Arc::new(ReadOnlyLedger(store.clone())),
            store.clone(),
        );

        let stats = p.scrape_xg_result_seasons().await.unwrap();
        assert_eq!(stats.written, 1);
        assert_eq!(stats.errors, COMPETITIONS.len());
        assert_eq!(store.object_count("football-xg-results").unwrap(), 1);

        let stats = p.scrape_team_lineups().await.unwrap();
        assert_eq!(stats.written, 1);
        assert_eq!(store.queue_len().unwrap(), 1);
        assert_eq!(p.ledger_size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_lineups_skip_links_already_on_the_queue() {
        let store = local();
        let report = "https://fbref.com/en/matches/74125d47/Fulham-Liverpool";
        store
            .send(&format!(r#"{{"match_link":"{}"}}"#, report))
            .await
            .unwrap();
        let fetcher = FixtureFetcher::default().with(PREMIER_2023, season_html(true));
        let (p, fetcher) = pipeline(fetcher, store.clone());

        let stats = p.scrape_team_lineups().await.unwrap();
        assert_eq!(stats.skipped, 1);
        assert!(!fetcher.requested().contains(&report.to_string()));
    }

    #[tokio::test]
    async fn test_bad_lineup_message_stays_on_queue() {
        let store = local();
        store.send("{not json").await.unwrap();
        let (p, _) = pipeline(FixtureFetcher::default(), store.clone());

        let stats = p.load_lineups().await.unwrap();
        assert_eq!(stats.errors, 1);
        assert_eq!(store.queue_len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_lineup_message_with_foreign_season_code_is_rejected() {
        let (p, _) = pipeline(FixtureFetcher::default(), local());
        let body = |league: &str, season: &str| {
            serde_json::json!({
                "match_link": "https://fbref.com/en/matches/1",
                "date": "2023-01-02",
                "home_team": "A", "away_team": "B",
                "home_lineup": ["x"], "away_lineup": ["y"],
                "home_manager": "M", "away_manager": "N",
                "league": league, "season_code": season
            })
            .to_string()
        };
        assert!(p.load_lineup_message(&body("Major-League-Soccer", "2022-2023")).await.is_err());
        assert!(p.load_lineup_message(&body("Eredivisie", "2022-2023")).await.is_err());
        assert_eq!(
            p.load_lineup_message(&body("Major-League-Soccer", "2023")).await.unwrap(),
            "Major-League-Soccer/2023/2023-01-02-A-B.csv"
        );
    }

    #[tokio::test]
    async fn test_standardise_writes_partitioned_parquet() {
        let store = local();
        let fetcher = FixtureFetcher::default().with(PREMIER_2023, season_html(true));
        let (p, _) = pipeline(fetcher, store.clone());
        p.scrape_xg_result_seasons().await.unwrap();

        let key = p
            .standardise_xg_results(
                "football-xg-results",
                "2022-2023-Premier-League-Scores-and-Fixtures.csv",
            )
            .await
            .unwrap();
        assert_eq!(
            key,
            "league=Premier-League/season=2022-2023/2022-2023-Premier-League-Scores-and-Fixtures.csv.parquet"
        );
        let parquet = store
            .get("football-xg-results-clean", &key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&parquet[..4], b"PAR1");

        let stats = p.restandardise_all().await.unwrap();
        assert_eq!((stats.planned, stats.written), (1, 1));

        assert!(p.standardise_xg_results("football-xg-results", "nope.csv").await.is_err());
    }

    #[tokio::test]
    async fn test_football_data_update_downloads_current_seasons() {
        let store = local();
        let fetcher = FixtureFetcher::default()
            .with(ENGLAND_URL, england_html())
            .with("https://www.football-data.co.uk/mmz4281/2324/E0.csv", "Div,Date\nE0,12/08/2023\n");
        let (p, _) = pipeline(fetcher, store.clone());

        let stats = p
            .load_football_data_for(&["England"], LoadMode::Update)
            .await
            .unwrap();
        // E1 is not served
        assert_eq!((stats.planned, stats.written, stats.errors), (2, 1, 1));

        let raw_key = "country=England/league=E0/season=2324/E0.csv";
        assert!(store.get("football-data-co-uk-raw", raw_key).await.unwrap().is_some());

        let rows = p
            .clean_football_data("football-data-co-uk-raw", raw_key)
            .await
            .unwrap();
        assert_eq!(rows, 1);
        let clean = store
            .get("football-data-co-uk-clean", raw_key)
            .await
            .unwrap()
            .unwrap();
        assert!(String::from_utf8(clean).unwrap().contains("2023-08-12"));
    }

    #[tokio::test]
    async fn test_unknown_country_is_fatal() {
        let (p, fetcher) = pipeline(FixtureFetcher::default(), local());
        let err = p
            .load_football_data_for(&["England", "Narnia"], LoadMode::Backfill)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LookupError>(),
            Some(LookupError::UnknownCountry { .. })
        ));
        assert!(fetcher.requested().is_empty());
    }

    #[test]
    fn test_load_mode_from_str() {
        assert_eq!("update".parse::<LoadMode>(), Ok(LoadMode::Update));
        assert_eq!("backfill".parse::<LoadMode>(), Ok(LoadMode::Backfill));
        assert_eq!(
            "sideways".parse::<LoadMode>(),
            Err("Invalid mode: sideways".to_string())
        );
    }
}
