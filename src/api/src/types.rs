//! Request and response types for the F1 API.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::stats::{DriverStats, PitStopStats, TeamPerformance};
use crate::storage::{Driver, FastestLap, Race, StoredLap, StoredResult};

pub const DEFAULT_SEASON: i32 = 2024;
pub const DEFAULT_FASTEST_LIMIT: usize = 10;
pub const MAX_RACE_LAPS: usize = 1000;

fn default_season() -> i32 {
    DEFAULT_SEASON
}

fn default_limit() -> usize {
    DEFAULT_FASTEST_LIMIT
}

// ==================== Query Parameters ====================

#[derive(Debug, Clone, Deserialize)]
pub struct SeasonQuery {
    #[serde(default = "default_season")]
    pub season: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompareQuery {
    pub driver1: String,
    pub driver2: String,
    #[serde(default = "default_season")]
    pub season: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LapsQuery {
    pub driver_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FastestLapsQuery {
    #[serde(default = "default_season")]
    pub season: i32,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

// ==================== Responses ====================

/// Service info
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub message: String,
    pub status: String,
    pub version: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
    pub races: i64,
    pub drivers: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverSummary {
    pub id: i64,
    pub code: String,
    pub name: Option<String>,
    pub number: Option<i64>,
}

impl From<Driver> for DriverSummary {
    fn from(d: Driver) -> Self {
        Self {
            id: d.id,
            code: d.driver_code,
            name: d.driver_name,
            number: d.driver_number,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DriversResponse {
    pub count: usize,
    pub drivers: Vec<DriverSummary>,
}

#[derive(Debug, Serialize)]
pub struct DriverStatsResponse {
    pub driver: DriverSummary,
    pub season: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub stats: Option<DriverStats>,
}

/// One side of a driver comparison
#[derive(Debug, Serialize)]
pub struct ComparedDriver {
    pub code: String,
    pub name: Option<String>,
    pub number: Option<i64>,
    #[serde(flatten)]
    pub stats: DriverStats,
}

#[derive(Debug, Serialize)]
pub struct ComparedDrivers {
    pub driver1: ComparedDriver,
    pub driver2: ComparedDriver,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub season: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub drivers: Option<ComparedDrivers>,
}

#[derive(Debug, Serialize)]
pub struct DriverRaceEntry {
    pub race_id: i64,
    pub race_name: String,
    pub date: Option<NaiveDate>,
    pub position: Option<i64>,
    pub grid_position: Option<i64>,
    pub points: f64,
    pub status: Option<String>,
}

impl From<(StoredResult, Race)> for DriverRaceEntry {
    fn from((result, race): (StoredResult, Race)) -> Self {
        Self {
            race_id: race.id,
            race_name: race.race_name,
            date: race.event_date,
            position: result.position,
            grid_position: result.grid_position,
            points: result.points,
            status: result.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DriverRacesResponse {
    pub driver: String,
    pub season: i32,
    pub races: Vec<DriverRaceEntry>,
}

#[derive(Debug, Serialize)]
pub struct RaceSummary {
    pub id: i64,
    pub name: String,
    pub date: Option<NaiveDate>,
    pub location: Option<String>,
    pub country: Option<String>,
}

impl From<Race> for RaceSummary {
    fn from(r: Race) -> Self {
        Self {
            id: r.id,
            name: r.race_name,
            date: r.event_date,
            location: r.location,
            country: r.country,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RacesResponse {
    pub season: i32,
    pub count: usize,
    pub races: Vec<RaceSummary>,
}

#[derive(Debug, Serialize)]
pub struct RaceDetail {
    pub id: i64,
    pub name: String,
    pub year: i32,
    pub date: Option<NaiveDate>,
    pub location: Option<String>,
    pub country: Option<String>,
}

impl From<Race> for RaceDetail {
    fn from(r: Race) -> Self {
        Self {
            id: r.id,
            name: r.race_name,
            year: r.year,
            date: r.event_date,
            location: r.location,
            country: r.country,
        }
    }
}

/// Short race reference embedded in nested responses
#[derive(Debug, Serialize)]
pub struct RaceRef {
    pub id: i64,
    pub name: String,
    pub date: Option<NaiveDate>,
}

impl From<&Race> for RaceRef {
    fn from(r: &Race) -> Self {
        Self {
            id: r.id,
            name: r.race_name.clone(),
            date: r.event_date,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResultEntry {
    pub position: Option<i64>,
    pub driver_code: String,
    pub driver_name: Option<String>,
    pub grid_position: Option<i64>,
    pub points: f64,
    pub status: Option<String>,
}

impl From<(StoredResult, Driver)> for ResultEntry {
    fn from((result, driver): (StoredResult, Driver)) -> Self {
        Self {
            position: result.position,
            driver_code: driver.driver_code,
            driver_name: driver.driver_name,
            grid_position: result.grid_position,
            points: result.points,
            status: result.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RaceResultsResponse {
    pub race: RaceRef,
    pub results: Vec<ResultEntry>,
}

#[derive(Debug, Serialize)]
pub struct LapEntry {
    pub lap_number: i64,
    pub driver_code: String,
    pub lap_time_seconds: Option<f64>,
    pub compound: Option<String>,
    pub tyre_life: Option<i64>,
    pub stint: Option<i64>,
    pub team: String,
    pub is_personal_best: bool,
    pub pit_in_time: Option<f64>,
}

impl From<(StoredLap, String)> for LapEntry {
    fn from((lap, driver_code): (StoredLap, String)) -> Self {
        Self {
            lap_number: lap.lap_number,
            driver_code,
            lap_time_seconds: lap.lap_time_seconds,
            compound: lap.compound,
            tyre_life: lap.tyre_life,
            stint: lap.stint,
            team: lap.team,
            is_personal_best: lap.is_personal_best,
            pit_in_time: lap.pit_in_time,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LapFilter {
    pub driver_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RaceLapsResponse {
    pub race: RaceRef,
    pub filter: LapFilter,
    pub count: usize,
    pub laps: Vec<LapEntry>,
}

#[derive(Debug, Serialize)]
pub struct FastestLapsResponse {
    pub season: i32,
    pub fastest_laps: Vec<FastestLap>,
}

#[derive(Debug, Serialize)]
pub struct TeamPerformanceResponse {
    pub team: String,
    pub season: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub stats: Option<TeamPerformance>,
}

#[derive(Debug, Serialize)]
pub struct PitStopsResponse {
    pub team: String,
    pub season: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub stats: Option<PitStopStats>,
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
