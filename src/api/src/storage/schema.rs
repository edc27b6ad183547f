//! SQLite schema definitions for race telemetry
//!
//! Tables:
//! - races: One row per (year, race_name), with load status
//! - drivers: Keyed by driver code
//! - results: Race classification, one row per (race, driver)
//! - sprint_results: Sprint classification, one row per (race, driver)
//! - laps: One row per (race, driver, lap_number)

use rusqlite::{Connection, Result};

/// Create all tables in the database
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS races (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            year INTEGER NOT NULL,
            race_name TEXT NOT NULL,
            event_date TEXT,
            location TEXT,
            country TEXT,
            load_status TEXT NOT NULL DEFAULT 'registered'
                CHECK (load_status IN ('registered', 'complete')),
            created_at TEXT DEFAULT (datetime('now')),
            UNIQUE(year, race_name)
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS drivers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            driver_code TEXT NOT NULL UNIQUE,
            driver_name TEXT,
            driver_number INTEGER
        )
        "#,
        [],
    )?;

    for table in ["results", "sprint_results"] {
        conn.execute(
            &format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    race_id INTEGER NOT NULL REFERENCES races(id),
                    driver_id INTEGER NOT NULL REFERENCES drivers(id),
                    position INTEGER,
                    grid_position INTEGER,
                    points REAL NOT NULL DEFAULT 0,
                    status TEXT,
                    UNIQUE(race_id, driver_id)
                )
                "#
            ),
            [],
        )?;
    }

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS laps (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            race_id INTEGER NOT NULL REFERENCES races(id),
            driver_id INTEGER NOT NULL REFERENCES drivers(id),
            lap_number INTEGER NOT NULL,
            lap_time_seconds REAL,
            compound TEXT,
            tyre_life INTEGER,
            stint INTEGER,
            team TEXT NOT NULL,
            is_personal_best INTEGER NOT NULL DEFAULT 0,
            pit_in_time REAL,
            UNIQUE(race_id, driver_id, lap_number)
        )
        "#,
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_races_year ON races(year)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_results_driver ON results(driver_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_laps_driver ON laps(driver_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_laps_team ON laps(team)",
        [],
    )?;

    Ok(())
}
