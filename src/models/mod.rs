use crate::error::LookupError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ── Competitions ──────────────────────────────────────────────────────────────

pub const MAJOR_LEAGUE_SOCCER: &str = "Major-League-Soccer";

/// An fbref competition: numeric id in the URL plus the slug used in page names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Competition {
    pub id: &'static str,
    pub name: &'static str,
}

pub const COMPETITIONS: &[Competition] = &[
    Competition { id: "9", name: "Premier-League" },
    Competition { id: "10", name: "Championship" },
    Competition { id: "12", name: "La-Liga" },
    Competition { id: "22", name: MAJOR_LEAGUE_SOCCER },
    Competition { id: "13", name: "Ligue-1" },
    Competition { id: "20", name: "Bundesliga" },
    Competition { id: "11", name: "Serie-A" },
    Competition { id: "15", name: "League-One" },
];

impl Competition {
    pub fn from_id(id: &str) -> Result<&'static Competition, LookupError> {
        COMPETITIONS
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| LookupError::UnknownCompetition(id.to_string()))
    }

    pub fn from_name(name: &str) -> Result<&'static Competition, LookupError> {
        COMPETITIONS
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| LookupError::UnknownLeague(name.to_string()))
    }

    /// The page listing the season in progress. Its URL carries no season.
    pub fn current_season_url(&self, base_url: &str) -> String {
        format!(
            "{}/en/comps/{}/schedule/{}-Scores-and-Fixtures",
            base_url.trim_end_matches('/'),
            self.id,
            self.name
        )
    }
}

/// "2022-2023" for split-year leagues, "2023" for MLS.
pub fn create_season_code(league_name: &str, year: i32) -> String {
    if league_name == MAJOR_LEAGUE_SOCCER {
        year.to_string()
    } else {
        format!("{}-{}", year - 1, year)
    }
}

/// Inverse of [`create_season_code`]: the finish year, if `code` has the
/// shape that league uses.
pub fn season_year(league_name: &str, code: &str) -> Option<i32> {
    if league_name == MAJOR_LEAGUE_SOCCER {
        return code.parse().ok();
    }
    let (start, finish) = code.split_once('-')?;
    let start: i32 = start.parse().ok()?;
    let finish: i32 = finish.parse().ok()?;
    (finish == start + 1).then_some(finish)
}

// ── Season descriptor ─────────────────────────────────────────────────────────

/// One competition-season, with its code and page URL worked out up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonDescriptor {
    competition: &'static Competition,
    year: i32,
    season_code: String,
    url: String,
}

impl SeasonDescriptor {
    pub fn new(competition: &'static Competition, year: i32, base_url: &str) -> Self {
        let season_code = create_season_code(competition.name, year);
        let url = format!(
            "{}/en/comps/{}/{code}/schedule/{code}-{}-Scores-and-Fixtures",
            base_url.trim_end_matches('/'),
            competition.id,
            competition.name,
            code = season_code,
        );
        Self {
            competition,
            year,
            season_code,
            url,
        }
    }

    /// Every competition crossed with every year, competition-major.
    pub fn enumerate(years: &[i32], base_url: &str) -> Vec<Self> {
        COMPETITIONS
            .iter()
            .flat_map(|c| years.iter().map(move |&y| Self::new(c, y, base_url)))
            .collect()
    }

    pub fn league_name(&self) -> &'static str {
        self.competition.name
    }
    pub fn year(&self) -> i32 {
        self.year
    }
    pub fn season_code(&self) -> &str {
        &self.season_code
    }
    pub fn url(&self) -> &str {
        &self.url
    }
}

// ── Results ───────────────────────────────────────────────────────────────────

/// One played match from an fbref season results table.
/// Field order is the column order of the intermediate CSV.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchRecord {
    pub round: Option<String>,
    pub week: Option<f64>,
    pub day: Option<String>,
    pub date: NaiveDate,
    pub time: Option<String>,
    pub home: String,
    pub home_xg: Option<f64>,
    pub score: String,
    pub away_xg: Option<f64>,
    pub away: String,
    pub attendance: Option<f64>,
    pub venue: Option<String>,
    pub referee: Option<String>,
    pub league_name: String,
    pub home_goals: u32,
    pub away_goals: u32,
}

// ── Lineups ───────────────────────────────────────────────────────────────────

/// What a match report page yields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineupReport {
    pub match_link: String,
    pub date: String,
    pub home_team: String,
    pub away_team: String,
    pub home_lineup: Vec<String>,
    pub away_lineup: Vec<String>,
    pub home_manager: String,
    pub away_manager: String,
}

/// Queue payload: a report plus the season context it was scraped under.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineupMessage {
    #[serde(flatten)]
    pub report: LineupReport,
    pub league: String,
    pub season_code: String,
}

/// Long-format row written by the lineups loader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineupRow {
    pub home_player: String,
    pub away_player: String,
    pub home_manager: String,
    pub away_manager: String,
    pub date: String,
    pub home_team: String,
    pub away_team: String,
    pub league: String,
    pub season_code: String,
}

impl LineupMessage {
    /// Pairs home and away players positionally; the shorter side bounds it.
    pub fn rows(&self) -> Vec<LineupRow> {
        let r = &self.report;
        r.home_lineup
            .iter()
            .zip(r.away_lineup.iter())
            .map(|(home, away)| LineupRow {
                home_player: home.clone(),
                away_player: away.clone(),
                home_manager: r.home_manager.clone(),
                away_manager: r.away_manager.clone(),
                date: r.date.clone(),
                home_team: r.home_team.clone(),
                away_team: r.away_team.clone(),
                league: self.league.clone(),
                season_code: self.season_code.clone(),
            })
            .collect()
    }

    /// `<league>/<season>/<date>-<home>-<away>.csv`
    pub fn object_key(&self) -> String {
        format!(
            "{}/{}/{}-{}-{}.csv",
            self.league,
            self.season_code,
            self.report.date,
            self.report.home_team,
            self.report.away_team
        )
    }
}

// ── football-data.co.uk ───────────────────────────────────────────────────────

pub const FOOTBALL_DATA_COUNTRIES: &[&str] = &[
    "England",
    "Scotland",
    "Germany",
    "Italy",
    "Spain",
    "France",
    "Netherlands",
    "Belgium",
    "Portugal",
    "Turkey",
    "Greece",
];

/// Index page listing every season file for a country.
pub fn country_page_url(base_url: &str, country: &str) -> Result<String, LookupError> {
    if !FOOTBALL_DATA_COUNTRIES.contains(&country) {
        return Err(LookupError::UnknownCountry {
            name: country.to_string(),
            known: FOOTBALL_DATA_COUNTRIES.join(", "),
        });
    }
    Ok(format!(
        "{}/{}m.php",
        base_url.trim_end_matches('/'),
        country.to_lowercase()
    ))
}

/// "1516" → 2016 | "9798" → 1998 | "9900" → 2000
pub fn season_code_to_year(code: &str) -> Option<i32> {
    if code.len() != 4 || !code.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let first: i32 = code[..2].parse().ok()?;
    let second: i32 = code[2..].parse().ok()?;
    if first > 50 && first < second {
        Some(1900 + second)
    } else {
        Some(2000 + second)
    }
}

/// A season file such as `.../mmz4281/2324/E0.csv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FootballDataSeason {
    url: String,
    country: String,
    season_code: String,
    league_code: String,
    year: i32,
}

impl FootballDataSeason {
    /// `None` when the URL does not end in `<season code>/<league code>.csv`.
    pub fn from_url(url: &str, country: &str) -> Option<Self> {
        let mut segments = url.trim_end_matches('/').rsplit('/');
        let file = segments.next()?;
        let season_code = segments.next()?;
        let league_code = file.strip_suffix(".csv")?;
        let year = season_code_to_year(season_code)?;
        Some(Self {
            url: url.to_string(),
            country: country.to_string(),
            season_code: season_code.to_string(),
            league_code: league_code.to_string(),
            year,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
    pub fn country(&self) -> &str {
        &self.country
    }
    pub fn season_code(&self) -> &str {
        &self.season_code
    }
    pub fn league_code(&self) -> &str {
        &self.league_code
    }
    pub fn year(&self) -> i32 {
        self.year
    }

    /// `country=<C>/league=<L>/season=<S>/<L>.csv`
    pub fn raw_object_key(&self) -> String {
        format!(
            "country={}/league={}/season={}/{}.csv",
            self.country, self.league_code, self.season_code, self.league_code
        )
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_season_code_round_trips_for_every_competition() {
        for comp in COMPETITIONS {
            for year in [2000, 2014, 2023, 2024] {
                let code = create_season_code(comp.name, year);
                assert_eq!(season_year(comp.name, &code), Some(year), "{}", comp.name);
            }
        }
        assert_eq!(create_season_code(MAJOR_LEAGUE_SOCCER, 2023), "2023");
        assert_eq!(create_season_code("Serie-A", 2023), "2022-2023");
        assert_eq!(season_year("Serie-A", "2021-2023"), None);
    }

    #[test]
    fn test_historic_season_urls() {
        let pl = Competition::from_id("9").unwrap();
        let d = SeasonDescriptor::new(pl, 2023, "https://fbref.com/");
        assert_eq!(
            d.url(),
            "https://fbref.com/en/comps/9/2022-2023/schedule/2022-2023-Premier-League-Scores-and-Fixtures"
        );

        let mls = Competition::from_name(MAJOR_LEAGUE_SOCCER).unwrap();
        let d = SeasonDescriptor::new(mls, 2023, "https://fbref.com");
        assert_eq!(
            d.url(),
            "https://fbref.com/en/comps/22/2023/schedule/2023-Major-League-Soccer-Scores-and-Fixtures"
        );
        assert_eq!(
            mls.current_season_url("https://fbref.com"),
            "https://fbref.com/en/comps/22/schedule/Major-League-Soccer-Scores-and-Fixtures"
        );
    }

    #[test]
    fn test_enumerate_is_competition_major() {
        let all = SeasonDescriptor::enumerate(&[2024, 2023], "https://fbref.com");
        assert_eq!(all.len(), COMPETITIONS.len() * 2);
        assert_eq!(all[0].league_name(), "Premier-League");
        assert_eq!(all[0].year(), 2024);
        assert_eq!(all[1].year(), 2023);
        assert_eq!(all[2].league_name(), "Championship");
    }

    #[test]
    fn test_unknown_lookups() {
        assert_eq!(
            Competition::from_id("99"),
            Err(LookupError::UnknownCompetition("99".into()))
        );
        assert!(matches!(
            country_page_url("https://www.football-data.co.uk", "Narnia"),
            Err(LookupError::UnknownCountry { .. })
        ));
        assert_eq!(
            country_page_url("https://www.football-data.co.uk", "England").unwrap(),
            "https://www.football-data.co.uk/englandm.php"
        );
    }

    #[test]
    fn test_season_code_to_year_century_rollover() {
        assert_eq!(season_code_to_year("1516"), Some(2016));
        assert_eq!(season_code_to_year("9798"), Some(1998));
        assert_eq!(season_code_to_year("9900"), Some(2000));
        assert_eq!(season_code_to_year("0001"), Some(2001));
        assert_eq!(season_code_to_year("15a6"), None);
    }

    #[test]
    fn test_football_data_season_from_url() {
        let s = FootballDataSeason::from_url(
            "https://www.football-data.co.uk/mmz4281/2324/E0.csv",
            "England",
        )
        .unwrap();
        assert_eq!(s.season_code(), "2324");
        assert_eq!(s.league_code(), "E0");
        assert_eq!(s.year(), 2024);
        assert_eq!(s.raw_object_key(), "country=England/league=E0/season=2324/E0.csv");
        assert!(FootballDataSeason::from_url("https://example.com/notes.txt", "England").is_none());
    }

    #[test]
    fn test_lineup_message_rows_and_key() {
        let msg = LineupMessage {
            report: LineupReport {
                match_link: "https://fbref.com/en/matches/abc".into(),
                date: "2022-11-05".into(),
                home_team: "Nottingham Forest".into(),
                away_team: "Brentford".into(),
                home_lineup: vec!["A".into(), "B".into()],
                away_lineup: vec!["X".into(), "Y".into()],
                home_manager: "Steve Cooper".into(),
                away_manager: "Thomas Frank".into(),
            },
            league: "Premier-League".into(),
            season_code: "2022-2023".into(),
        };
        let rows = msg.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].home_player, "B");
        assert_eq!(rows[1].away_player, "Y");
        assert_eq!(rows[0].league, "Premier-League");
        assert_eq!(
            msg.object_key(),
            "Premier-League/2022-2023/2022-11-05-Nottingham Forest-Brentford.csv"
        );

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["match_link"], "https://fbref.com/en/matches/abc");
        assert_eq!(json["season_code"], "2022-2023");
    }
}
