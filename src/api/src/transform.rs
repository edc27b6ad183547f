//! Transform stage: raw provider tables into normalized rows.
//!
//! Everything here is pure. Values the provider marks as not available
//! (NaN, empty strings, position markers such as "R") come out as `None`.

use chrono::{NaiveDate, TimeDelta};
use serde::Serialize;

use crate::extract::ExtractedRace;
use crate::provider::{RawLap, RawResult};

/// Errors raised while normalizing raw tables
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("{table} row {row}: missing required field '{field}'")]
    MissingField {
        table: &'static str,
        row: usize,
        field: &'static str,
    },

    #[error("{table} row {row}: invalid value '{value}' for '{field}'")]
    InvalidValue {
        table: &'static str,
        row: usize,
        field: &'static str,
        value: String,
    },
}

/// Race metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceInfo {
    pub year: i32,
    pub race_name: String,
    pub event_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub country: Option<String>,
}

/// Normalized lap row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LapRow {
    pub driver_code: String,
    pub driver_number: Option<i64>,
    pub lap_number: i64,
    pub lap_time_seconds: Option<f64>,
    pub compound: Option<String>,
    pub tyre_life: Option<i64>,
    pub stint: Option<i64>,
    pub team: Option<String>,
    pub is_personal_best: bool,
    pub pit_in_time: Option<f64>,
}

/// Normalized result row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub driver_number: Option<i64>,
    pub driver_code: String,
    pub broadcast_name: Option<String>,
    pub classified_position: Option<i64>,
    pub grid_position: Option<i64>,
    pub points: Option<f64>,
    pub status: Option<String>,
    pub team_name: Option<String>,
}

/// Output of the transform stage, input of the loader
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformedRace {
    pub race_info: RaceInfo,
    pub laps: Vec<LapRow>,
    pub results: Vec<ResultRow>,
    pub sprint_results: Option<Vec<ResultRow>>,
}

/// Normalize an extracted race
pub fn transform_race(extracted: &ExtractedRace) -> Result<TransformedRace, TransformError> {
    tracing::info!("TRANSFORM: Cleaning {} {}", extracted.year, extracted.race_name);

    let event = &extracted.session.event;
    let race_name = non_empty(Some(event.name.as_str()))
        .unwrap_or_else(|| extracted.race_name.trim().to_string());

    let race_info = RaceInfo {
        year: extracted.year,
        race_name,
        event_date: event.date,
        location: non_empty(event.location.as_deref()),
        country: non_empty(event.country.as_deref()),
    };

    let laps = extracted
        .laps_raw
        .iter()
        .enumerate()
        .map(|(i, lap)| transform_lap(i, lap))
        .collect::<Result<Vec<_>, _>>()?;

    let results = transform_results("results", &extracted.results_raw)?;

    let sprint_results = extracted
        .sprint_results_raw
        .as_deref()
        .map(|rows| transform_results("sprint_results", rows))
        .transpose()?;

    tracing::info!(
        "Transformed {} laps, {} results{}",
        laps.len(),
        results.len(),
        sprint_results
            .as_ref()
            .map(|s| format!(", {} sprint results", s.len()))
            .unwrap_or_default()
    );

    Ok(TransformedRace {
        race_info,
        laps,
        results,
        sprint_results,
    })
}

fn transform_lap(row: usize, lap: &RawLap) -> Result<LapRow, TransformError> {
    const TABLE: &str = "laps";

    let driver_code = non_empty(lap.driver.as_deref()).ok_or(TransformError::MissingField {
        table: TABLE,
        row,
        field: "Driver",
    })?;

    let lap_number = lap
        .lap_number
        .and_then(coerce_int)
        .ok_or(TransformError::MissingField {
            table: TABLE,
            row,
            field: "LapNumber",
        })?;

    Ok(LapRow {
        driver_code,
        driver_number: parse_number(TABLE, row, "DriverNumber", lap.driver_number.as_deref())?,
        lap_number,
        lap_time_seconds: lap.lap_time.map(total_seconds),
        compound: non_empty(lap.compound.as_deref()),
        tyre_life: lap.tyre_life.and_then(coerce_int),
        stint: lap.stint.and_then(coerce_int),
        team: non_empty(lap.team.as_deref()),
        is_personal_best: lap.is_personal_best.unwrap_or(false),
        pit_in_time: lap.pit_in_time.map(total_seconds),
    })
}

fn transform_results(
    table: &'static str,
    rows: &[RawResult],
) -> Result<Vec<ResultRow>, TransformError> {
    rows.iter()
        .enumerate()
        .map(|(row, r)| {
            let driver_code =
                non_empty(r.abbreviation.as_deref()).ok_or(TransformError::MissingField {
                    table,
                    row,
                    field: "Abbreviation",
                })?;

            Ok(ResultRow {
                driver_number: parse_number(table, row, "DriverNumber", r.driver_number.as_deref())?,
                driver_code,
                broadcast_name: non_empty(r.broadcast_name.as_deref()),
                classified_position: classified_position(r.classified_position.as_deref()),
                grid_position: r.grid_position.and_then(coerce_int),
                points: r.points.filter(|p| p.is_finite()),
                status: non_empty(r.status.as_deref()),
                team_name: non_empty(r.team_name.as_deref()),
            })
        })
        .collect()
}

/// Lap duration in (fractional) seconds
pub fn total_seconds(delta: TimeDelta) -> f64 {
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}

/// Numeric finishing position, or `None` for markers like "R" (retired),
/// "D" (disqualified), "W" (withdrawn) and "N" (not classified)
pub fn classified_position(value: Option<&str>) -> Option<i64> {
    let text = value?.trim();
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        return text.parse().ok();
    }
    // Float-formatted positions ("3.0")
    text.parse::<f64>().ok().and_then(coerce_int)
}

/// Whole number from a float column; NaN and infinities are missing
fn coerce_int(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 {
        Some(value as i64)
    } else {
        None
    }
}

fn parse_number(
    table: &'static str,
    row: usize,
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<i64>, TransformError> {
    match non_empty(value) {
        None => Ok(None),
        Some(text) => text
            .parse::<i64>()
            .map(Some)
            .map_err(|_| TransformError::InvalidValue {
                table,
                row,
                field,
                value: text,
            }),
    }
}

/// Trimmed text; empty and "nan"-style placeholders are missing
fn non_empty(value: Option<&str>) -> Option<String> {
    let text = value?.trim();
    if text.is_empty()
        || text.eq_ignore_ascii_case("nan")
        || text.eq_ignore_ascii_case("nat")
        || text.eq_ignore_ascii_case("none")
    {
        None
    } else {
        Some(text.to_string())
    }
}
