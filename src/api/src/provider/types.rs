//! Raw tables as delivered by the upstream provider.
//!
//! These mirror the provider's column contract closely: values are loosely
//! typed (floats for integral columns, free-text position markers, NaN-able
//! numbers) and cleaning them is the transformer's job.

use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Session kinds the pipeline asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionKind {
    Race,
    Sprint,
}

impl SessionKind {
    /// Session name as used by the provider
    pub fn session_name(&self) -> &'static str {
        match self {
            SessionKind::Race => "Race",
            SessionKind::Sprint => "Sprint",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.session_name())
    }
}

/// Event metadata attached to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInfo {
    /// Canonical event name, e.g. "Monaco Grand Prix"
    pub name: String,
    pub official_name: Option<String>,
    pub date: Option<NaiveDate>,
    pub location: Option<String>,
    pub country: Option<String>,
}

/// A resolved but not yet materialized session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub year: i32,
    pub kind: SessionKind,
    /// Provider key used to materialize the tables
    pub session_key: i64,
    pub event: EventInfo,
}

/// One row of the provider's lap table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawLap {
    /// Driver abbreviation
    pub driver: Option<String>,
    pub driver_number: Option<String>,
    pub lap_number: Option<f64>,
    pub lap_time: Option<TimeDelta>,
    pub compound: Option<String>,
    pub tyre_life: Option<f64>,
    pub stint: Option<f64>,
    pub team: Option<String>,
    pub is_personal_best: Option<bool>,
    pub pit_in_time: Option<TimeDelta>,
}

/// One row of the provider's result table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawResult {
    pub driver_number: Option<String>,
    pub abbreviation: Option<String>,
    pub broadcast_name: Option<String>,
    /// Numeric text, or a marker such as "R" (retired), "D", "W"
    pub classified_position: Option<String>,
    pub grid_position: Option<f64>,
    pub points: Option<f64>,
    pub status: Option<String>,
    pub team_name: Option<String>,
}

/// Materialized tables for one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionTables {
    pub laps: Vec<RawLap>,
    pub results: Vec<RawResult>,
}

/// Weekend format of a scheduled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventFormat {
    Conventional,
    Sprint,
    Testing,
}

impl EventFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventFormat::Conventional => "conventional",
            EventFormat::Sprint => "sprint",
            EventFormat::Testing => "testing",
        }
    }
}

/// One entry of a season's event schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub name: String,
    pub date: Option<NaiveDate>,
    pub location: Option<String>,
    pub country: Option<String>,
    pub format: EventFormat,
}
