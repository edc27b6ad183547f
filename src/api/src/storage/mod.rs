//! SQLite storage for race telemetry
//!
//! Holds races, drivers, race and sprint classifications, and laps.

pub mod repository;
pub mod schema;

pub use repository::{
    Driver, FastestLap, LoadStatus, Race, Repository, ResultTable, StoredLap, StoredResult,
};
