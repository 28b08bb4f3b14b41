use thiserror::Error;

/// Caller or configuration mistakes. These abort the run instead of being
/// skipped like a per-link failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("unknown competition id `{0}`")]
    UnknownCompetition(String),

    #[error("unknown league `{0}`")]
    UnknownLeague(String),

    #[error("unknown country `{name}`, must be one of: {known}")]
    UnknownCountry { name: String, known: String },

    #[error("no competition id found in url `{0}`")]
    NoCompetitionInUrl(String),
}

/// Structural problems with a single fetched page or file.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("no results table on page")]
    MissingResultsTable,

    #[error("expected two lineup tables, found {0}")]
    MissingLineupTables(usize),

    #[error("missing element: {0}")]
    MissingElement(&'static str),

    #[error("no season found in fixtures header `{0}`")]
    NoSeasonInHeader(String),

    #[error("required column `{0}` not present")]
    MissingColumn(String),
}
