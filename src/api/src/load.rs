//! Load stage: write one transformed race into the store.
//!
//! The race row is committed on its own, then drivers and classifications in
//! one transaction, then laps in fixed-size batches. A race is only marked
//! complete after its last lap batch commits, so an interrupted load is
//! resumed rather than skipped on the next run.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

use crate::storage::repository::{
    find_race, get_or_create_driver, insert_lap, insert_race, insert_result, mark_race_complete,
};
use crate::storage::{LoadStatus, Repository, ResultTable};
use crate::transform::{ResultRow, TransformedRace};

/// What a load wrote
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub race_id: i64,
    /// The race was already complete and nothing was written
    pub already_loaded: bool,
    pub drivers_created: usize,
    pub results_inserted: usize,
    pub results_skipped: usize,
    pub sprint_results_inserted: usize,
    pub laps_inserted: usize,
    pub laps_skipped: usize,
    /// Cumulative lap count at each lap commit
    pub lap_commits: Vec<usize>,
}

pub struct Loader {
    repo: Repository,
    lap_batch_size: usize,
}

impl Loader {
    pub fn new(repo: Repository, lap_batch_size: usize) -> Self {
        Self {
            repo,
            lap_batch_size: lap_batch_size.max(1),
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Load a race, reporting success.
    ///
    /// Failures are logged; the in-flight transaction is rolled back.
    pub fn load(&mut self, race: &TransformedRace) -> bool {
        let info = &race.race_info;
        match self.try_load(race) {
            Ok(report) => {
                if !report.already_loaded {
                    info!(
                        "LOAD: {} {} loaded (race_id={}, {} results, {} laps, {} duplicates skipped)",
                        info.year,
                        info.race_name,
                        report.race_id,
                        report.results_inserted,
                        report.laps_inserted,
                        report.results_skipped + report.laps_skipped
                    );
                }
                true
            }
            Err(e) => {
                error!("LOAD: Failed to load {} {}: {:#}", info.year, info.race_name, e);
                false
            }
        }
    }

    pub fn try_load(&mut self, race: &TransformedRace) -> Result<LoadReport> {
        let info = &race.race_info;
        info!("LOAD: Writing {} {} to database", info.year, info.race_name);

        let race_id = match find_race(self.repo.conn(), info.year, &info.race_name)? {
            Some(existing) if existing.load_status == LoadStatus::Complete => {
                info!(
                    "LOAD: {} {} already loaded (race_id={}), skipping",
                    info.year, info.race_name, existing.id
                );
                return Ok(LoadReport {
                    race_id: existing.id,
                    already_loaded: true,
                    ..LoadReport::default()
                });
            }
            Some(existing) => {
                warn!(
                    "LOAD: {} {} was partially loaded (race_id={}), resuming",
                    info.year, info.race_name, existing.id
                );
                existing.id
            }
            None => {
                let tx = self.repo.transaction()?;
                let id = insert_race(&tx, info).context("Failed to insert race")?;
                tx.commit()?;
                debug!("LOAD: Registered race_id={}", id);
                id
            }
        };
        let mut report = LoadReport {
            race_id,
            ..LoadReport::default()
        };

        let mut drivers: HashMap<String, i64> = HashMap::new();

        let tx = self.repo.transaction()?;
        for row in &race.results {
            let driver_id = resolve_driver(&tx, &mut drivers, row, &mut report)?;
            if insert_result(&tx, ResultTable::Race, race_id, driver_id, row)
                .with_context(|| format!("Failed to insert result for {}", row.driver_code))?
            {
                report.results_inserted += 1;
            } else {
                debug!("LOAD: Result for {} exists, skipping", row.driver_code);
                report.results_skipped += 1;
            }
        }
        for row in race.sprint_results.iter().flatten() {
            let driver_id = resolve_driver(&tx, &mut drivers, row, &mut report)?;
            if insert_result(&tx, ResultTable::Sprint, race_id, driver_id, row).with_context(
                || format!("Failed to insert sprint result for {}", row.driver_code),
            )? {
                report.sprint_results_inserted += 1;
            } else {
                debug!("LOAD: Sprint result for {} exists, skipping", row.driver_code);
            }
        }
        tx.commit().context("Failed to commit results")?;

        let mut written = 0;
        for batch in race.laps.chunks(self.lap_batch_size) {
            let tx = self.repo.transaction()?;
            for lap in batch {
                let driver_id = match drivers.get(&lap.driver_code) {
                    Some(id) => *id,
                    None => {
                        warn!(
                            "LOAD: Lap {} references driver {} without a result",
                            lap.lap_number, lap.driver_code
                        );
                        let (driver, created) =
                            get_or_create_driver(&tx, &lap.driver_code, None, lap.driver_number)?;
                        if created {
                            report.drivers_created += 1;
                        }
                        drivers.insert(lap.driver_code.clone(), driver.id);
                        driver.id
                    }
                };

                if insert_lap(&tx, race_id, driver_id, lap).with_context(|| {
                    format!("Failed to insert lap {} for {}", lap.lap_number, lap.driver_code)
                })? {
                    report.laps_inserted += 1;
                } else {
                    report.laps_skipped += 1;
                }
            }
            tx.commit().context("Failed to commit lap batch")?;
            written += batch.len();
            report.lap_commits.push(written);
            debug!("LOAD: Committed {} laps", written);
        }

        mark_race_complete(self.repo.conn(), race_id)?;
        Ok(report)
    }
}

fn resolve_driver(
    conn: &Connection,
    drivers: &mut HashMap<String, i64>,
    row: &ResultRow,
    report: &mut LoadReport,
) -> Result<i64> {
    if let Some(id) = drivers.get(&row.driver_code) {
        return Ok(*id);
    }

    let (driver, created) = get_or_create_driver(
        conn,
        &row.driver_code,
        row.broadcast_name.as_deref(),
        row.driver_number,
    )
    .with_context(|| format!("Failed to resolve driver {}", row.driver_code))?;

    if created {
        report.drivers_created += 1;
    }
    drivers.insert(row.driver_code.clone(), driver.id);
    Ok(driver.id)
}
