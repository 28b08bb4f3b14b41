//! Serialisation for landed objects: CSV for the intermediate layers, Parquet
//! for the cleaned results layer.

use crate::models::MatchRecord;
use anyhow::{Context, Result};
use arrow_array::{Date32Array, Float64Array, RecordBatch, StringArray, UInt32Array};
use arrow_schema::{DataType, Field, Schema};
use chrono::{Datelike, NaiveDate};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// `num_days_from_ce` of 1970-01-01.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub fn records_to_csv<T: Serialize>(records: &[T]) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for r in records {
        wtr.serialize(r)?;
    }
    wtr.into_inner().context("Failed to flush CSV")
}

pub fn records_from_csv<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>> {
    let mut rdr = csv::Reader::from_reader(bytes);
    rdr.deserialize()
        .enumerate()
        .map(|(i, r)| r.with_context(|| format!("Bad CSV record at row {}", i + 1)))
        .collect()
}

/// `[("league", "Premier-League"), ("season", "2022-2023")], "x.parquet"`
/// → `league=Premier-League/season=2022-2023/x.parquet`
pub fn partition_key(partitions: &[(&str, &str)], file_name: &str) -> String {
    let mut key: String = partitions
        .iter()
        .map(|(k, v)| format!("{}={}/", k, v))
        .collect();
    key.push_str(file_name);
    key
}

// ── Standardised results ──────────────────────────────────────────────────────

/// A results row with the catalog's fill values for absent fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardisedResult {
    pub round: String,
    pub week: f64,
    pub day: Option<String>,
    pub date: NaiveDate,
    pub time: String,
    pub home: String,
    pub score: String,
    pub away: String,
    pub attendance: Option<f64>,
    pub venue: String,
    pub referee: Option<String>,
    pub home_goals: u32,
    pub away_goals: u32,
    pub home_xg: Option<f64>,
    pub away_xg: Option<f64>,
}

impl From<&MatchRecord> for StandardisedResult {
    fn from(m: &MatchRecord) -> Self {
        Self {
            round: m.round.clone().unwrap_or_else(|| "N/A".to_string()),
            week: m.week.unwrap_or(-1.0),
            day: m.day.clone(),
            date: m.date,
            time: m.time.clone().unwrap_or_else(|| "missing".to_string()),
            home: m.home.clone(),
            score: m.score.clone(),
            away: m.away.clone(),
            attendance: m.attendance,
            venue: m.venue.clone().unwrap_or_else(|| "missing".to_string()),
            referee: m.referee.clone(),
            home_goals: m.home_goals,
            away_goals: m.away_goals,
            home_xg: m.home_xg,
            away_xg: m.away_xg,
        }
    }
}

fn results_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("round", DataType::Utf8, false),
        Field::new("week", DataType::Float64, false),
        Field::new("day", DataType::Utf8, true),
        Field::new("date", DataType::Utf8, false),
        Field::new("time", DataType::Utf8, false),
        Field::new("home", DataType::Utf8, false),
        Field::new("score", DataType::Utf8, false),
        Field::new("away", DataType::Utf8, false),
        Field::new("attendance", DataType::Float64, true),
        Field::new("venue", DataType::Utf8, false),
        Field::new("referee", DataType::Utf8, true),
        Field::new("home_goals", DataType::UInt32, false),
        Field::new("away_goals", DataType::UInt32, false),
        Field::new("home_xg", DataType::Float64, true),
        Field::new("away_xg", DataType::Float64, true),
        Field::new("date_dt", DataType::Date32, false),
    ]))
}

fn strings<'a>(rows: &'a [StandardisedResult], f: impl Fn(&'a StandardisedResult) -> &'a str) -> StringArray {
    StringArray::from(rows.iter().map(f).collect::<Vec<_>>())
}

fn optional_strings<'a>(
    rows: &'a [StandardisedResult],
    f: impl Fn(&'a StandardisedResult) -> Option<&'a str>,
) -> StringArray {
    StringArray::from(rows.iter().map(f).collect::<Vec<_>>())
}

fn floats(rows: &[StandardisedResult], f: impl Fn(&StandardisedResult) -> Option<f64>) -> Float64Array {
    Float64Array::from(rows.iter().map(f).collect::<Vec<_>>())
}

pub fn results_batch(records: &[MatchRecord]) -> Result<RecordBatch> {
    let rows: Vec<StandardisedResult> = records.iter().map(StandardisedResult::from).collect();
    let dates: Vec<String> = rows.iter().map(|r| r.date.format("%Y-%m-%d").to_string()).collect();

    RecordBatch::try_new(
        results_schema(),
        vec![
            Arc::new(strings(&rows, |r| r.round.as_str())),
            Arc::new(floats(&rows, |r| Some(r.week))),
            Arc::new(optional_strings(&rows, |r| r.day.as_deref())),
            Arc::new(StringArray::from(dates)),
            Arc::new(strings(&rows, |r| r.time.as_str())),
            Arc::new(strings(&rows, |r| r.home.as_str())),
            Arc::new(strings(&rows, |r| r.score.as_str())),
            Arc::new(strings(&rows, |r| r.away.as_str())),
            Arc::new(floats(&rows, |r| r.attendance)),
            Arc::new(strings(&rows, |r| r.venue.as_str())),
            Arc::new(optional_strings(&rows, |r| r.referee.as_deref())),
            Arc::new(UInt32Array::from(rows.iter().map(|r| r.home_goals).collect::<Vec<_>>())),
            Arc::new(UInt32Array::from(rows.iter().map(|r| r.away_goals).collect::<Vec<_>>())),
            Arc::new(floats(&rows, |r| r.home_xg)),
            Arc::new(floats(&rows, |r| r.away_xg)),
            Arc::new(Date32Array::from(
                rows.iter()
                    .map(|r| r.date.num_days_from_ce() - EPOCH_DAYS_FROM_CE)
                    .collect::<Vec<_>>(),
            )),
        ],
    )
    .context("building results record batch")
}

/// One in-memory Parquet file, snappy-compressed.
pub fn to_parquet(records: &[MatchRecord]) -> Result<Vec<u8>> {
    let batch = results_batch(records)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(Vec::new(), batch.schema(), Some(props))
        .context("opening parquet writer")?;
    writer.write(&batch).context("writing record batch")?;
    writer.into_inner().context("closing parquet writer")
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::Array;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    fn record(round: Option<&str>, week: Option<f64>) -> MatchRecord {
        MatchRecord {
            round: round.map(str::to_string),
            week,
            day: Some("Sat".into()),
            date: NaiveDate::from_ymd_opt(2022, 8, 6).unwrap(),
            time: None,
            home: "Fulham".into(),
            home_xg: Some(1.2),
            score: "2–2".into(),
            away_xg: None,
            away: "Liverpool".into(),
            attendance: Some(22207.0),
            venue: None,
            referee: Some("Andy Madley".into()),
            league_name: "Premier-League".into(),
            home_goals: 2,
            away_goals: 2,
        }
    }

    #[test]
    fn test_partition_key() {
        assert_eq!(
            partition_key(&[("league", "La-Liga"), ("season", "2019-2020")], "a.parquet"),
            "league=La-Liga/season=2019-2020/a.parquet"
        );
        assert_eq!(partition_key(&[], "a.csv"), "a.csv");
    }

    #[test]
    fn test_csv_keeps_missing_fields_empty() {
        let records = vec![record(None, Some(1.0)), record(Some("Matchweek 1"), None)];
        let csv = records_to_csv(&records).unwrap();
        let text = String::from_utf8(csv.clone()).unwrap();
        assert!(text.starts_with("round,week,day,date,time,home,home_xg,score"));
        assert!(text.contains(",2022-08-06,,Fulham,1.2,2–2,,Liverpool,"));

        let back: Vec<MatchRecord> = records_from_csv(&csv).unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn test_standardised_defaults() {
        let s = StandardisedResult::from(&record(None, None));
        assert_eq!(s.round, "N/A");
        assert_eq!(s.week, -1.0);
        assert_eq!(s.time, "missing");
        assert_eq!(s.venue, "missing");
        assert_eq!(s.referee.as_deref(), Some("Andy Madley"));
    }

    #[test]
    fn test_parquet_columns_and_date_dt() {
        let bytes = to_parquet(&[record(None, Some(3.0))]).unwrap();
        let mut reader = ParquetRecordBatchReaderBuilder::try_new(bytes::Bytes::from(bytes))
            .unwrap()
            .build()
            .unwrap();
        let batch = reader.next().unwrap().unwrap();

        let names: Vec<String> = batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        assert_eq!(names.first().map(String::as_str), Some("round"));
        assert_eq!(names.last().map(String::as_str), Some("date_dt"));
        assert_eq!(names.len(), 16);
        assert_eq!(batch.num_rows(), 1);

        let date_dt = batch
            .column(15)
            .as_any()
            .downcast_ref::<Date32Array>()
            .unwrap();
        // 2022-08-06
        assert_eq!(date_dt.value(0), 19_210);

        let away_xg = batch
            .column(14)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert!(away_xg.is_null(0));
    }
}
