//! API route handlers.
//!
//! All handlers are read-only and only see races whose load completed.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::AppConfig;
use crate::stats::{driver_stats, pit_stop_stats, team_driver_ids, team_performance};
use crate::storage::{Driver, LoadStatus, Race, Repository, ResultTable};
use crate::types::{
    CompareQuery, CompareResponse, ComparedDriver, ComparedDrivers, DriverRacesResponse,
    DriverStatsResponse, DriverSummary, DriversResponse, ErrorResponse, FastestLapsQuery,
    FastestLapsResponse, HealthResponse, LapFilter, LapsQuery, PitStopsResponse, RaceDetail,
    RaceLapsResponse, RaceRef, RaceResultsResponse, RacesResponse, SeasonQuery, ServiceInfo,
    TeamPerformanceResponse, MAX_RACE_LAPS,
};

/// Application state shared across handlers.
pub struct AppState {
    pub db: Mutex<Repository>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(repo: Repository, config: AppConfig) -> Self {
        Self {
            db: Mutex::new(repo),
            config,
        }
    }

    fn repo(&self) -> Result<MutexGuard<'_, Repository>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::internal("Database lock poisoned"))
    }
}

/// Error type for API handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Query failed: {:#}", err);
        Self::internal(format!("Database query failed: {}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.status.to_string(),
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

fn require_driver(repo: &Repository, code: &str) -> Result<Driver, ApiError> {
    let code = code.trim().to_uppercase();
    repo.get_driver(&code)?
        .ok_or_else(|| ApiError::not_found(format!("Driver {} not found", code)))
}

fn require_race(repo: &Repository, race_id: i64) -> Result<Race, ApiError> {
    repo.get_race(race_id)?
        .filter(|r| r.load_status == LoadStatus::Complete)
        .ok_or_else(|| ApiError::not_found(format!("Race {} not found", race_id)))
}

fn no_races_message(season: i32) -> String {
    format!("No races found for season {}", season)
}

/// Service info endpoint.
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "F1 Analytics API".to_string(),
        status: "running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, ApiError> {
    let repo = state.repo()?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: state.config.database.path.display().to_string(),
        races: repo.race_count()?,
        drivers: repo.driver_count()?,
    }))
}

// ==================== Drivers ====================

pub async fn list_drivers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DriversResponse>, ApiError> {
    let drivers: Vec<DriverSummary> = state
        .repo()?
        .list_drivers()?
        .into_iter()
        .map(DriverSummary::from)
        .collect();

    Ok(Json(DriversResponse {
        count: drivers.len(),
        drivers,
    }))
}

pub async fn get_driver(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<DriverSummary>, ApiError> {
    let repo = state.repo()?;
    Ok(Json(require_driver(&repo, &code)?.into()))
}

pub async fn get_driver_stats(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Query(q): Query<SeasonQuery>,
) -> Result<Json<DriverStatsResponse>, ApiError> {
    let repo = state.repo()?;
    let driver = require_driver(&repo, &code)?;

    if repo.races_by_season(q.season)?.is_empty() {
        return Ok(Json(DriverStatsResponse {
            driver: driver.into(),
            season: q.season,
            message: Some(no_races_message(q.season)),
            stats: None,
        }));
    }

    let results: Vec<_> = repo
        .driver_results(driver.id, q.season)?
        .into_iter()
        .map(|(result, _)| result)
        .collect();
    let lap_times = repo.driver_lap_times(driver.id, q.season)?;

    Ok(Json(DriverStatsResponse {
        driver: driver.into(),
        season: q.season,
        message: None,
        stats: Some(driver_stats(&results, &lap_times)),
    }))
}

pub async fn get_driver_races(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Query(q): Query<SeasonQuery>,
) -> Result<Json<DriverRacesResponse>, ApiError> {
    let repo = state.repo()?;
    let driver = require_driver(&repo, &code)?;

    let races = repo
        .driver_results(driver.id, q.season)?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(DriverRacesResponse {
        driver: driver.driver_code,
        season: q.season,
        races,
    }))
}

pub async fn compare_drivers(
    State(state): State<Arc<AppState>>,
    Query(q): Query<CompareQuery>,
) -> Result<Json<CompareResponse>, ApiError> {
    let repo = state.repo()?;
    let first = require_driver(&repo, &q.driver1)?;
    let second = require_driver(&repo, &q.driver2)?;

    if repo.races_by_season(q.season)?.is_empty() {
        return Ok(Json(CompareResponse {
            season: q.season,
            message: Some(no_races_message(q.season)),
            drivers: None,
        }));
    }

    let compared = |driver: Driver| -> Result<ComparedDriver, ApiError> {
        let results: Vec<_> = repo
            .driver_results(driver.id, q.season)?
            .into_iter()
            .map(|(result, _)| result)
            .collect();
        let lap_times = repo.driver_lap_times(driver.id, q.season)?;
        Ok(ComparedDriver {
            code: driver.driver_code,
            name: driver.driver_name,
            number: driver.driver_number,
            stats: driver_stats(&results, &lap_times),
        })
    };

    Ok(Json(CompareResponse {
        season: q.season,
        message: None,
        drivers: Some(ComparedDrivers {
            driver1: compared(first)?,
            driver2: compared(second)?,
        }),
    }))
}

// ==================== Races ====================

pub async fn list_races(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SeasonQuery>,
) -> Result<Json<RacesResponse>, ApiError> {
    let races: Vec<_> = state
        .repo()?
        .races_by_season(q.season)?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(RacesResponse {
        season: q.season,
        count: races.len(),
        races,
    }))
}

pub async fn get_race(
    State(state): State<Arc<AppState>>,
    Path(race_id): Path<i64>,
) -> Result<Json<RaceDetail>, ApiError> {
    let repo = state.repo()?;
    Ok(Json(require_race(&repo, race_id)?.into()))
}

fn classification(
    state: &AppState,
    race_id: i64,
    table: ResultTable,
) -> Result<Json<RaceResultsResponse>, ApiError> {
    let repo = state.repo()?;
    let race = require_race(&repo, race_id)?;

    let results = repo
        .race_results(race.id, table)?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(RaceResultsResponse {
        race: RaceRef::from(&race),
        results,
    }))
}

pub async fn get_race_results(
    State(state): State<Arc<AppState>>,
    Path(race_id): Path<i64>,
) -> Result<Json<RaceResultsResponse>, ApiError> {
    classification(&state, race_id, ResultTable::Race)
}

pub async fn get_sprint_results(
    State(state): State<Arc<AppState>>,
    Path(race_id): Path<i64>,
) -> Result<Json<RaceResultsResponse>, ApiError> {
    classification(&state, race_id, ResultTable::Sprint)
}

pub async fn get_race_laps(
    State(state): State<Arc<AppState>>,
    Path(race_id): Path<i64>,
    Query(q): Query<LapsQuery>,
) -> Result<Json<RaceLapsResponse>, ApiError> {
    let repo = state.repo()?;
    let race = require_race(&repo, race_id)?;

    let driver = match q.driver_code.as_deref() {
        Some(code) => Some(require_driver(&repo, code)?),
        None => None,
    };

    let laps: Vec<_> = repo
        .race_laps(race.id, driver.as_ref().map(|d| d.id), MAX_RACE_LAPS)?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(RaceLapsResponse {
        race: RaceRef::from(&race),
        filter: LapFilter {
            driver_code: driver.map(|d| d.driver_code),
        },
        count: laps.len(),
        laps,
    }))
}

// ==================== Laps ====================

pub async fn get_fastest_laps(
    State(state): State<Arc<AppState>>,
    Query(q): Query<FastestLapsQuery>,
) -> Result<Json<FastestLapsResponse>, ApiError> {
    if q.limit == 0 || q.limit > MAX_RACE_LAPS {
        return Err(ApiError::bad_request(format!(
            "limit must be between 1 and {}",
            MAX_RACE_LAPS
        )));
    }

    let fastest_laps = state.repo()?.fastest_laps(q.season, q.limit)?;
    Ok(Json(FastestLapsResponse {
        season: q.season,
        fastest_laps,
    }))
}

// ==================== Teams ====================

pub async fn get_team_performance(
    State(state): State<Arc<AppState>>,
    Path(team): Path<String>,
    Query(q): Query<SeasonQuery>,
) -> Result<Json<TeamPerformanceResponse>, ApiError> {
    let repo = state.repo()?;

    if repo.races_by_season(q.season)?.is_empty() {
        return Ok(Json(TeamPerformanceResponse {
            team,
            season: q.season,
            message: Some(no_races_message(q.season)),
            stats: None,
        }));
    }

    let laps = repo.team_laps(&team, q.season)?;
    let results = repo.season_results_for_drivers(&team_driver_ids(&laps), q.season)?;
    let stats = team_performance(&laps, &results);
    let message = match stats {
        Some(_) => None,
        None => Some(format!("No data found for team {} in season {}", team, q.season)),
    };

    Ok(Json(TeamPerformanceResponse {
        team,
        season: q.season,
        message,
        stats,
    }))
}

pub async fn get_team_pit_stops(
    State(state): State<Arc<AppState>>,
    Path(team): Path<String>,
    Query(q): Query<SeasonQuery>,
) -> Result<Json<PitStopsResponse>, ApiError> {
    let repo = state.repo()?;

    if repo.races_by_season(q.season)?.is_empty() {
        return Ok(Json(PitStopsResponse {
            team,
            season: q.season,
            message: Some(no_races_message(q.season)),
            stats: None,
        }));
    }

    let stats = pit_stop_stats(&repo.team_laps(&team, q.season)?);
    let message = match stats {
        Some(_) => None,
        None => Some(format!(
            "No pit stop data found for team {} in season {}",
            team, q.season
        )),
    };

    Ok(Json(PitStopsResponse {
        team,
        season: q.season,
        message,
        stats,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::repository::{
        get_or_create_driver, insert_lap, insert_race, insert_result, mark_race_complete,
    };
    use crate::transform::{LapRow, RaceInfo, ResultRow};
    use chrono::NaiveDate;

    /// Two complete races and one partially loaded race in 2024
    fn state() -> Arc<AppState> {
        let repo = Repository::in_memory().unwrap();
        let conn = repo.conn();

        for (round, name) in ["Bahrain Grand Prix", "Saudi Arabian Grand Prix", "Australian Grand Prix"]
            .iter()
            .enumerate()
        {
            let race_id = insert_race(
                conn,
                &RaceInfo {
                    year: 2024,
                    race_name: name.to_string(),
                    event_date: NaiveDate::from_ymd_opt(2024, 3, 2 + 7 * round as u32),
                    location: None,
                    country: None,
                },
            )
            .unwrap();

            for (i, (code, team)) in [("VER", "Red Bull Racing"), ("PER", "Red Bull Racing"), ("LEC", "Ferrari")]
                .iter()
                .enumerate()
            {
                let (driver, _) = get_or_create_driver(conn, code, None, None).unwrap();
                let position = if *code == "PER" && round == 1 { None } else { Some(i as i64 + 1) };
                insert_result(
                    conn,
                    ResultTable::Race,
                    race_id,
                    driver.id,
                    &ResultRow {
                        driver_number: None,
                        driver_code: code.to_string(),
                        broadcast_name: None,
                        classified_position: position,
                        grid_position: Some(i as i64 + 1),
                        points: Some([25.0, 18.0, 15.0][i]),
                        status: None,
                        team_name: Some(team.to_string()),
                    },
                )
                .unwrap();

                for n in 1..=3 {
                    insert_lap(
                        conn,
                        race_id,
                        driver.id,
                        &LapRow {
                            driver_code: code.to_string(),
                            driver_number: None,
                            lap_number: n,
                            lap_time_seconds: Some(90.0 + i as f64 + n as f64 / 10.0),
                            compound: None,
                            tyre_life: None,
                            stint: None,
                            team: Some(team.to_string()),
                            is_personal_best: false,
                            pit_in_time: if n == 2 { Some(22.0 + i as f64) } else { None },
                        },
                    )
                    .unwrap();
                }
            }

            if round < 2 {
                mark_race_complete(conn, race_id).unwrap();
            }
        }

        Arc::new(AppState::new(repo, AppConfig::default()))
    }

    fn season(season: i32) -> Query<SeasonQuery> {
        Query(SeasonQuery { season })
    }

    #[tokio::test]
    async fn test_list_races_only_complete() {
        let Json(resp) = list_races(State(state()), season(2024)).await.unwrap();
        assert_eq!(resp.count, 2);
        assert_eq!(resp.races[0].name, "Bahrain Grand Prix");
        assert_eq!(resp.races[1].name, "Saudi Arabian Grand Prix");

        let err = get_race(State(state()), Path(3)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_race_results_unclassified_last() {
        let Json(resp) = get_race_results(State(state()), Path(2)).await.unwrap();
        let codes: Vec<&str> = resp.results.iter().map(|r| r.driver_code.as_str()).collect();
        assert_eq!(codes, vec!["VER", "LEC", "PER"]);

        let Json(sprint) = get_sprint_results(State(state()), Path(2)).await.unwrap();
        assert!(sprint.results.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_driver_is_not_found() {
        let err = get_driver(State(state()), Path("XXX".to_string())).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let Json(driver) = get_driver(State(state()), Path("ver".to_string())).await.unwrap();
        assert_eq!(driver.code, "VER");
    }

    #[tokio::test]
    async fn test_driver_stats() {
        let Json(resp) = get_driver_stats(State(state()), Path("PER".to_string()), season(2024))
            .await
            .unwrap();
        let stats = resp.stats.unwrap();
        assert_eq!(stats.races_entered, 2);
        assert_eq!(stats.total_points, 36.0);
        assert_eq!(stats.average_finish_position, Some(2.0));
        assert_eq!(stats.total_laps, 6);
        assert_eq!(stats.fastest_lap, Some(91.1));
    }

    #[tokio::test]
    async fn test_empty_season_has_message() {
        let Json(resp) = get_driver_stats(State(state()), Path("VER".to_string()), season(2019))
            .await
            .unwrap();
        assert!(resp.stats.is_none());
        assert_eq!(resp.message.as_deref(), Some("No races found for season 2019"));

        let Json(team) =
            get_team_performance(State(state()), Path("Ferrari".to_string()), season(2019))
                .await
                .unwrap();
        assert!(team.stats.is_none());
    }

    #[tokio::test]
    async fn test_compare_drivers() {
        let query = Query(CompareQuery {
            driver1: "VER".to_string(),
            driver2: "LEC".to_string(),
            season: 2024,
        });
        let Json(resp) = compare_drivers(State(state()), query).await.unwrap();
        let drivers = resp.drivers.unwrap();
        assert_eq!(drivers.driver1.stats.total_points, 50.0);
        assert_eq!(drivers.driver2.stats.total_points, 30.0);
    }

    #[tokio::test]
    async fn test_race_laps_filter() {
        let query = Query(LapsQuery {
            driver_code: Some("LEC".to_string()),
        });
        let Json(resp) = get_race_laps(State(state()), Path(1), query).await.unwrap();
        assert_eq!(resp.count, 3);
        assert!(resp.laps.iter().all(|l| l.driver_code == "LEC"));
        assert_eq!(resp.filter.driver_code.as_deref(), Some("LEC"));

        let Json(all) = get_race_laps(State(state()), Path(1), Query(LapsQuery::default()))
            .await
            .unwrap();
        assert_eq!(all.count, 9);
        assert_eq!(all.laps[0].lap_number, 1);
    }

    #[tokio::test]
    async fn test_fastest_laps() {
        let query = Query(FastestLapsQuery {
            season: 2024,
            limit: 2,
        });
        let Json(resp) = get_fastest_laps(State(state()), query).await.unwrap();
        assert_eq!(resp.fastest_laps.len(), 2);
        assert!(resp.fastest_laps.iter().all(|l| l.driver_code == "VER"));
        assert_eq!(resp.fastest_laps[0].lap_time, 90.1);

        let bad = Query(FastestLapsQuery {
            season: 2024,
            limit: 0,
        });
        let err = get_fastest_laps(State(state()), bad).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_team_endpoints() {
        let Json(perf) =
            get_team_performance(State(state()), Path("Red Bull Racing".to_string()), season(2024))
                .await
                .unwrap();
        let stats = perf.stats.unwrap();
        assert_eq!(stats.drivers_count, 2);
        assert_eq!(stats.races_entered, 2);
        assert_eq!(stats.total_laps, 12);
        assert_eq!(stats.total_points, 86.0);

        let Json(pits) =
            get_team_pit_stops(State(state()), Path("Ferrari".to_string()), season(2024))
                .await
                .unwrap();
        let pit_stats = pits.stats.unwrap();
        assert_eq!(pit_stats.total_pit_stops, 2);
        assert_eq!(pit_stats.races_with_pit_stops, 2);
        assert_eq!(pit_stats.average_pit_time_seconds, Some(24.0));

        let Json(unknown) =
            get_team_pit_stops(State(state()), Path("Minardi".to_string()), season(2024))
                .await
                .unwrap();
        assert!(unknown.stats.is_none());
        assert!(unknown.message.is_some());
    }
}
