//! SQLite repository for race telemetry
//!
//! Write helpers take a plain `&Connection` so the loader can run them inside
//! its own transactions; read queries live on [`Repository`].

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use serde::Serialize;
use std::path::Path;

use super::schema::create_tables;
use crate::transform::{LapRow, RaceInfo, ResultRow};

/// Whether all of a race's dependent rows have been committed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    Registered,
    Complete,
}

impl LoadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadStatus::Registered => "registered",
            LoadStatus::Complete => "complete",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "complete" => LoadStatus::Complete,
            _ => LoadStatus::Registered,
        }
    }
}

/// Stored race
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Race {
    pub id: i64,
    pub year: i32,
    pub race_name: String,
    pub event_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub country: Option<String>,
    pub load_status: LoadStatus,
}

/// Stored driver
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Driver {
    pub id: i64,
    pub driver_code: String,
    pub driver_name: Option<String>,
    pub driver_number: Option<i64>,
}

/// Stored classification row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredResult {
    pub race_id: i64,
    pub driver_id: i64,
    pub position: Option<i64>,
    pub grid_position: Option<i64>,
    pub points: f64,
    pub status: Option<String>,
}

/// Stored lap
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredLap {
    pub race_id: i64,
    pub driver_id: i64,
    pub lap_number: i64,
    pub lap_time_seconds: Option<f64>,
    pub compound: Option<String>,
    pub tyre_life: Option<i64>,
    pub stint: Option<i64>,
    pub team: String,
    pub is_personal_best: bool,
    pub pit_in_time: Option<f64>,
}

/// Result table a classification row goes into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultTable {
    Race,
    Sprint,
}

impl ResultTable {
    fn name(&self) -> &'static str {
        match self {
            ResultTable::Race => "results",
            ResultTable::Sprint => "sprint_results",
        }
    }
}

/// One of the fastest laps of a season
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FastestLap {
    pub lap_time: f64,
    pub driver_code: String,
    pub driver_name: Option<String>,
    pub race: String,
    pub lap_number: i64,
}

const RACE_COLUMNS: &str =
    "id, year, race_name, event_date, location, country, load_status";
const DRIVER_COLUMNS: &str = "id, driver_code, driver_name, driver_number";

fn race_from_row(row: &Row<'_>) -> rusqlite::Result<Race> {
    let date_str: Option<String> = row.get(3)?;
    let status: String = row.get(6)?;
    Ok(Race {
        id: row.get(0)?,
        year: row.get(1)?,
        race_name: row.get(2)?,
        event_date: date_str.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        location: row.get(4)?,
        country: row.get(5)?,
        load_status: LoadStatus::parse(&status),
    })
}

fn driver_from_row(row: &Row<'_>) -> rusqlite::Result<Driver> {
    Ok(Driver {
        id: row.get(0)?,
        driver_code: row.get(1)?,
        driver_name: row.get(2)?,
        driver_number: row.get(3)?,
    })
}

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<StoredResult> {
    Ok(StoredResult {
        race_id: row.get(0)?,
        driver_id: row.get(1)?,
        position: row.get(2)?,
        grid_position: row.get(3)?,
        points: row.get(4)?,
        status: row.get(5)?,
    })
}

fn lap_from_row(row: &Row<'_>) -> rusqlite::Result<StoredLap> {
    Ok(StoredLap {
        race_id: row.get(0)?,
        driver_id: row.get(1)?,
        lap_number: row.get(2)?,
        lap_time_seconds: row.get(3)?,
        compound: row.get(4)?,
        tyre_life: row.get(5)?,
        stint: row.get(6)?,
        team: row.get(7)?,
        is_personal_best: row.get(8)?,
        pit_in_time: row.get(9)?,
    })
}

// ==================== Write Operations ====================

/// Look up a race by its natural key
pub fn find_race(conn: &Connection, year: i32, race_name: &str) -> Result<Option<Race>> {
    let race = conn
        .query_row(
            &format!("SELECT {RACE_COLUMNS} FROM races WHERE year = ?1 AND race_name = ?2"),
            params![year, race_name],
            race_from_row,
        )
        .optional()?;
    Ok(race)
}

/// Insert a race in `registered` state and return its id
pub fn insert_race(conn: &Connection, race: &RaceInfo) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO races (year, race_name, event_date, location, country, load_status)
        VALUES (?1, ?2, ?3, ?4, ?5, 'registered')
        "#,
        params![
            race.year,
            race.race_name,
            race.event_date.map(|d| d.to_string()),
            race.location,
            race.country,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Flag a race as fully loaded
pub fn mark_race_complete(conn: &Connection, race_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE races SET load_status = 'complete' WHERE id = ?1",
        [race_id],
    )?;
    Ok(())
}

/// Look up a driver by code
pub fn find_driver(conn: &Connection, driver_code: &str) -> Result<Option<Driver>> {
    let driver = conn
        .query_row(
            &format!("SELECT {DRIVER_COLUMNS} FROM drivers WHERE driver_code = ?1"),
            [driver_code],
            driver_from_row,
        )
        .optional()?;
    Ok(driver)
}

/// Return the driver with this code, creating it if needed.
///
/// An existing driver keeps the name and number it was first created with.
/// The flag is `true` when a row was created.
pub fn get_or_create_driver(
    conn: &Connection,
    driver_code: &str,
    driver_name: Option<&str>,
    driver_number: Option<i64>,
) -> Result<(Driver, bool)> {
    if let Some(driver) = find_driver(conn, driver_code)? {
        return Ok((driver, false));
    }

    conn.execute(
        "INSERT INTO drivers (driver_code, driver_name, driver_number) VALUES (?1, ?2, ?3)",
        params![driver_code, driver_name, driver_number],
    )?;

    Ok((
        Driver {
            id: conn.last_insert_rowid(),
            driver_code: driver_code.to_string(),
            driver_name: driver_name.map(str::to_string),
            driver_number,
        },
        true,
    ))
}

/// Insert a classification row unless one exists for (race, driver).
///
/// Missing points are stored as 0. Returns `false` when the row was skipped.
pub fn insert_result(
    conn: &Connection,
    table: ResultTable,
    race_id: i64,
    driver_id: i64,
    result: &ResultRow,
) -> Result<bool> {
    let changed = conn.execute(
        &format!(
            r#"
            INSERT INTO {} (race_id, driver_id, position, grid_position, points, status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(race_id, driver_id) DO NOTHING
            "#,
            table.name()
        ),
        params![
            race_id,
            driver_id,
            result.classified_position,
            result.grid_position,
            result.points.unwrap_or(0.0),
            result.status,
        ],
    )?;
    Ok(changed > 0)
}

/// Insert a lap unless (race, driver, lap_number) exists.
///
/// Returns `false` when the lap was skipped. Other constraint violations
/// (such as a missing team) are errors.
pub fn insert_lap(conn: &Connection, race_id: i64, driver_id: i64, lap: &LapRow) -> Result<bool> {
    let changed = conn.execute(
        r#"
        INSERT INTO laps
        (race_id, driver_id, lap_number, lap_time_seconds, compound, tyre_life,
         stint, team, is_personal_best, pit_in_time)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(race_id, driver_id, lap_number) DO NOTHING
        "#,
        params![
            race_id,
            driver_id,
            lap.lap_number,
            lap.lap_time_seconds,
            lap.compound,
            lap.tyre_life,
            lap.stint,
            lap.team,
            lap.is_personal_best,
            lap.pit_in_time,
        ],
    )?;
    Ok(changed > 0)
}

/// Repository over the telemetry database
pub struct Repository {
    conn: Connection,
}

impl Repository {
    /// Open a repository, initializing the database if needed
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;

        Self::from_connection(conn)
    }

    /// Create an in-memory repository
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        // Enable foreign keys
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        create_tables(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Start a write transaction (rolled back on drop unless committed)
    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }

    // ==================== Counts ====================

    fn count(&self, table: &str) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn race_count(&self) -> Result<i64> {
        self.count("races")
    }

    pub fn driver_count(&self) -> Result<i64> {
        self.count("drivers")
    }

    pub fn result_count(&self) -> Result<i64> {
        self.count("results")
    }

    pub fn sprint_result_count(&self) -> Result<i64> {
        self.count("sprint_results")
    }

    pub fn lap_count(&self) -> Result<i64> {
        self.count("laps")
    }

    // ==================== Query Operations ====================

    pub fn find_race(&self, year: i32, race_name: &str) -> Result<Option<Race>> {
        find_race(&self.conn, year, race_name)
    }

    pub fn get_race(&self, race_id: i64) -> Result<Option<Race>> {
        let race = self
            .conn
            .query_row(
                &format!("SELECT {RACE_COLUMNS} FROM races WHERE id = ?1"),
                [race_id],
                race_from_row,
            )
            .optional()?;
        Ok(race)
    }

    /// Fully loaded races of a season, by date
    pub fn races_by_season(&self, year: i32) -> Result<Vec<Race>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RACE_COLUMNS} FROM races
             WHERE year = ?1 AND load_status = 'complete'
             ORDER BY event_date, id"
        ))?;

        let races = stmt
            .query_map([year], race_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(races)
    }

    pub fn list_drivers(&self) -> Result<Vec<Driver>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {DRIVER_COLUMNS} FROM drivers ORDER BY id"))?;

        let drivers = stmt
            .query_map([], driver_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(drivers)
    }

    pub fn get_driver(&self, driver_code: &str) -> Result<Option<Driver>> {
        find_driver(&self.conn, driver_code)
    }

    /// Classification of a race with drivers, by position (unclassified last)
    pub fn race_results(
        &self,
        race_id: i64,
        table: ResultTable,
    ) -> Result<Vec<(StoredResult, Driver)>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT r.race_id, r.driver_id, r.position, r.grid_position, r.points, r.status,
                    d.id, d.driver_code, d.driver_name, d.driver_number
             FROM {} r JOIN drivers d ON d.id = r.driver_id
             WHERE r.race_id = ?1
             ORDER BY r.position IS NULL, r.position, d.driver_code",
            table.name()
        ))?;

        let rows = stmt
            .query_map([race_id], |row| {
                Ok((
                    result_from_row(row)?,
                    Driver {
                        id: row.get(6)?,
                        driver_code: row.get(7)?,
                        driver_name: row.get(8)?,
                        driver_number: row.get(9)?,
                    },
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Laps of a race in lap order, optionally for one driver
    pub fn race_laps(
        &self,
        race_id: i64,
        driver_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<(StoredLap, String)>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT l.race_id, l.driver_id, l.lap_number, l.lap_time_seconds, l.compound,
                   l.tyre_life, l.stint, l.team, l.is_personal_best, l.pit_in_time,
                   d.driver_code
            FROM laps l JOIN drivers d ON d.id = l.driver_id
            WHERE l.race_id = ?1 AND (?2 IS NULL OR l.driver_id = ?2)
            ORDER BY l.lap_number, d.driver_code
            LIMIT ?3
            "#,
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let laps = stmt
            .query_map(params![race_id, driver_id, limit], |row| {
                Ok((lap_from_row(row)?, row.get(10)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(laps)
    }

    /// A driver's race classifications in a season, with the race
    pub fn driver_results(&self, driver_id: i64, year: i32) -> Result<Vec<(StoredResult, Race)>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT r.race_id, r.driver_id, r.position, r.grid_position, r.points, r.status,
                   ra.id, ra.year, ra.race_name, ra.event_date, ra.location, ra.country,
                   ra.load_status
            FROM results r JOIN races ra ON ra.id = r.race_id
            WHERE r.driver_id = ?1 AND ra.year = ?2 AND ra.load_status = 'complete'
            ORDER BY ra.event_date, ra.id
            "#,
        )?;

        let rows = stmt
            .query_map(params![driver_id, year], |row| {
                let date_str: Option<String> = row.get(9)?;
                let status: String = row.get(12)?;
                Ok((
                    result_from_row(row)?,
                    Race {
                        id: row.get(6)?,
                        year: row.get(7)?,
                        race_name: row.get(8)?,
                        event_date: date_str
                            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
                        location: row.get(10)?,
                        country: row.get(11)?,
                        load_status: LoadStatus::parse(&status),
                    },
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Timed laps of a driver in a season
    pub fn driver_lap_times(&self, driver_id: i64, year: i32) -> Result<Vec<f64>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT l.lap_time_seconds
            FROM laps l JOIN races ra ON ra.id = l.race_id
            WHERE l.driver_id = ?1 AND ra.year = ?2 AND ra.load_status = 'complete'
              AND l.lap_time_seconds IS NOT NULL
            "#,
        )?;

        let times = stmt
            .query_map(params![driver_id, year], |row| row.get(0))?
            .collect::<std::result::Result<Vec<f64>, _>>()?;
        Ok(times)
    }

    /// Fastest timed laps of a season
    pub fn fastest_laps(&self, year: i32, limit: usize) -> Result<Vec<FastestLap>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT l.lap_time_seconds, d.driver_code, d.driver_name, ra.race_name, l.lap_number
            FROM laps l
            JOIN drivers d ON d.id = l.driver_id
            JOIN races ra ON ra.id = l.race_id
            WHERE ra.year = ?1 AND ra.load_status = 'complete'
              AND l.lap_time_seconds IS NOT NULL
            ORDER BY l.lap_time_seconds
            LIMIT ?2
            "#,
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let laps = stmt
            .query_map(params![year, limit], |row| {
                Ok(FastestLap {
                    lap_time: row.get(0)?,
                    driver_code: row.get(1)?,
                    driver_name: row.get(2)?,
                    race: row.get(3)?,
                    lap_number: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(laps)
    }

    /// All laps driven for a team in a season
    pub fn team_laps(&self, team: &str, year: i32) -> Result<Vec<StoredLap>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT l.race_id, l.driver_id, l.lap_number, l.lap_time_seconds, l.compound,
                   l.tyre_life, l.stint, l.team, l.is_personal_best, l.pit_in_time
            FROM laps l JOIN races ra ON ra.id = l.race_id
            WHERE l.team = ?1 AND ra.year = ?2 AND ra.load_status = 'complete'
            ORDER BY l.race_id, l.driver_id, l.lap_number
            "#,
        )?;

        let laps = stmt
            .query_map(params![team, year], lap_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(laps)
    }

    /// Race classifications of the given drivers in a season
    pub fn season_results_for_drivers(
        &self,
        driver_ids: &[i64],
        year: i32,
    ) -> Result<Vec<StoredResult>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT r.race_id, r.driver_id, r.position, r.grid_position, r.points, r.status
            FROM results r JOIN races ra ON ra.id = r.race_id
            WHERE r.driver_id = ?1 AND ra.year = ?2 AND ra.load_status = 'complete'
            "#,
        )?;

        let mut results = Vec::new();
        for driver_id in driver_ids {
            let rows = stmt
                .query_map(params![driver_id, year], result_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            results.extend(rows);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn race_info(name: &str) -> RaceInfo {
        RaceInfo {
            year: 2024,
            race_name: name.to_string(),
            event_date: NaiveDate::from_ymd_opt(2024, 5, 26),
            location: Some("Monaco".to_string()),
            country: Some("Monaco".to_string()),
        }
    }

    fn result_row(code: &str, position: Option<i64>, points: Option<f64>) -> ResultRow {
        ResultRow {
            driver_number: Some(16),
            driver_code: code.to_string(),
            broadcast_name: Some("C LECLERC".to_string()),
            classified_position: position,
            grid_position: Some(1),
            points,
            status: Some("Finished".to_string()),
            team_name: Some("Ferrari".to_string()),
        }
    }

    fn lap_row(n: i64, time: Option<f64>) -> LapRow {
        LapRow {
            driver_code: "LEC".to_string(),
            driver_number: Some(16),
            lap_number: n,
            lap_time_seconds: time,
            compound: Some("HARD".to_string()),
            tyre_life: Some(n),
            stint: Some(1),
            team: Some("Ferrari".to_string()),
            is_personal_best: false,
            pit_in_time: None,
        }
    }

    #[test]
    fn test_insert_and_find_race() {
        let repo = Repository::in_memory().unwrap();
        let id = insert_race(repo.conn(), &race_info("Monaco Grand Prix")).unwrap();

        let race = repo.find_race(2024, "Monaco Grand Prix").unwrap().unwrap();
        assert_eq!(race.id, id);
        assert_eq!(race.load_status, LoadStatus::Registered);
        assert_eq!(race.event_date, NaiveDate::from_ymd_opt(2024, 5, 26));

        // Registered races are hidden from season listings
        assert!(repo.races_by_season(2024).unwrap().is_empty());
        mark_race_complete(repo.conn(), id).unwrap();
        assert_eq!(repo.races_by_season(2024).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_race_violates_unique_key() {
        let repo = Repository::in_memory().unwrap();
        insert_race(repo.conn(), &race_info("Monaco Grand Prix")).unwrap();
        assert!(insert_race(repo.conn(), &race_info("Monaco Grand Prix")).is_err());
    }

    #[test]
    fn test_get_or_create_driver_first_seen_wins() {
        let repo = Repository::in_memory().unwrap();

        let (first, created) =
            get_or_create_driver(repo.conn(), "LEC", Some("C LECLERC"), Some(16)).unwrap();
        assert!(created);

        let (second, created) =
            get_or_create_driver(repo.conn(), "LEC", Some("Charles Leclerc"), Some(99)).unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.driver_name.as_deref(), Some("C LECLERC"));
        assert_eq!(second.driver_number, Some(16));
        assert_eq!(repo.driver_count().unwrap(), 1);
    }

    #[test]
    fn test_insert_result_skips_duplicates_and_defaults_points() {
        let repo = Repository::in_memory().unwrap();
        let race_id = insert_race(repo.conn(), &race_info("Monaco Grand Prix")).unwrap();
        let (driver, _) = get_or_create_driver(repo.conn(), "LEC", None, Some(16)).unwrap();

        let row = result_row("LEC", Some(1), None);
        assert!(insert_result(repo.conn(), ResultTable::Race, race_id, driver.id, &row).unwrap());
        assert!(!insert_result(repo.conn(), ResultTable::Race, race_id, driver.id, &row).unwrap());
        // Sprint classification is a separate table
        assert!(insert_result(repo.conn(), ResultTable::Sprint, race_id, driver.id, &row).unwrap());

        let results = repo.race_results(race_id, ResultTable::Race).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.points, 0.0);
        assert_eq!(repo.sprint_result_count().unwrap(), 1);
    }

    #[test]
    fn test_result_requires_existing_race() {
        let repo = Repository::in_memory().unwrap();
        let (driver, _) = get_or_create_driver(repo.conn(), "LEC", None, None).unwrap();
        let row = result_row("LEC", Some(1), Some(25.0));
        assert!(insert_result(repo.conn(), ResultTable::Race, 42, driver.id, &row).is_err());
    }

    #[test]
    fn test_insert_lap_skips_duplicates_and_keeps_nulls() {
        let repo = Repository::in_memory().unwrap();
        let race_id = insert_race(repo.conn(), &race_info("Monaco Grand Prix")).unwrap();
        let (driver, _) = get_or_create_driver(repo.conn(), "LEC", None, None).unwrap();

        assert!(insert_lap(repo.conn(), race_id, driver.id, &lap_row(1, None)).unwrap());
        assert!(!insert_lap(repo.conn(), race_id, driver.id, &lap_row(1, Some(75.0))).unwrap());
        assert_eq!(repo.lap_count().unwrap(), 1);

        let stored: Option<f64> = repo
            .conn()
            .query_row("SELECT lap_time_seconds FROM laps", [], |row| row.get(0))
            .unwrap();
        assert_eq!(stored, None);
    }

    #[test]
    fn test_results_ordered_with_unclassified_last() {
        let repo = Repository::in_memory().unwrap();
        let race_id = insert_race(repo.conn(), &race_info("Monaco Grand Prix")).unwrap();

        for (code, pos) in [("PER", None), ("LEC", Some(1)), ("PIA", Some(2))] {
            let (driver, _) = get_or_create_driver(repo.conn(), code, None, None).unwrap();
            insert_result(
                repo.conn(),
                ResultTable::Race,
                race_id,
                driver.id,
                &result_row(code, pos, Some(0.0)),
            )
            .unwrap();
        }

        let codes: Vec<String> = repo
            .race_results(race_id, ResultTable::Race)
            .unwrap()
            .into_iter()
            .map(|(_, d)| d.driver_code)
            .collect();
        assert_eq!(codes, vec!["LEC", "PIA", "PER"]);
    }

    #[test]
    fn test_fastest_laps_and_driver_lap_times() {
        let repo = Repository::in_memory().unwrap();
        let race_id = insert_race(repo.conn(), &race_info("Monaco Grand Prix")).unwrap();
        let (driver, _) = get_or_create_driver(repo.conn(), "LEC", Some("C LECLERC"), None).unwrap();

        for (n, t) in [(1, Some(76.2)), (2, None), (3, Some(74.1)), (4, Some(75.0))] {
            insert_lap(repo.conn(), race_id, driver.id, &lap_row(n, t)).unwrap();
        }

        // Incomplete race is not visible yet
        assert!(repo.fastest_laps(2024, 10).unwrap().is_empty());
        mark_race_complete(repo.conn(), race_id).unwrap();

        let fastest = repo.fastest_laps(2024, 2).unwrap();
        assert_eq!(fastest.len(), 2);
        assert_eq!(fastest[0].lap_time, 74.1);
        assert_eq!(fastest[0].lap_number, 3);
        assert_eq!(fastest[0].race, "Monaco Grand Prix");

        let mut times = repo.driver_lap_times(driver.id, 2024).unwrap();
        times.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(times, vec![74.1, 75.0, 76.2]);

        let team = repo.team_laps("Ferrari", 2024).unwrap();
        assert_eq!(team.len(), 4);
        assert!(repo.team_laps("Ferrari", 2023).unwrap().is_empty());

        let laps = repo.race_laps(race_id, Some(driver.id), 2).unwrap();
        assert_eq!(laps.len(), 2);
        assert_eq!(laps[0].0.lap_number, 1);
        assert_eq!(laps[0].1, "LEC");
    }
}
