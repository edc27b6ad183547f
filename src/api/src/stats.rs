//! Season aggregates served by the query API.
//!
//! Inputs come from the repository; everything here is a pure reduction.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::storage::{StoredLap, StoredResult};

/// A driver's season aggregates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverStats {
    pub races_entered: usize,
    pub total_points: f64,
    pub average_finish_position: Option<f64>,
    pub total_laps: usize,
    pub average_lap_time: Option<f64>,
    pub fastest_lap: Option<f64>,
}

/// A team's season aggregates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamPerformance {
    pub races_entered: usize,
    pub total_points: f64,
    pub average_position: Option<f64>,
    pub total_laps: usize,
    pub average_lap_time: Option<f64>,
    pub drivers_count: usize,
}

/// A team's pit stop aggregates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PitStopStats {
    pub total_pit_stops: usize,
    pub races_with_pit_stops: usize,
    pub average_stops_per_race: f64,
    pub average_pit_time_seconds: Option<f64>,
    pub fastest_pit_time_seconds: Option<f64>,
    pub slowest_pit_time_seconds: Option<f64>,
}

/// Round to `places` decimal places
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Driver aggregates from the driver's results and timed laps
pub fn driver_stats(results: &[StoredResult], lap_times: &[f64]) -> DriverStats {
    let total_points: f64 = results.iter().map(|r| r.points).sum();
    let average_finish = mean(results.iter().filter_map(|r| r.position).map(|p| p as f64));

    DriverStats {
        races_entered: results.len(),
        total_points: round_to(total_points, 1),
        average_finish_position: average_finish.map(|v| round_to(v, 2)),
        total_laps: lap_times.len(),
        average_lap_time: mean(lap_times.iter().copied()).map(|v| round_to(v, 3)),
        fastest_lap: min_max(lap_times).map(|(lo, _)| round_to(lo, 3)),
    }
}

/// Drivers who drove at least one lap for the team, ascending
pub fn team_driver_ids(team_laps: &[StoredLap]) -> Vec<i64> {
    team_laps
        .iter()
        .map(|l| l.driver_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Team aggregates. Membership comes from laps; `team_results` are the race
/// results of those drivers. `None` when the team drove no laps.
pub fn team_performance(
    team_laps: &[StoredLap],
    team_results: &[StoredResult],
) -> Option<TeamPerformance> {
    if team_laps.is_empty() {
        return None;
    }

    let races: BTreeSet<i64> = team_results.iter().map(|r| r.race_id).collect();
    let total_points: f64 = team_results.iter().map(|r| r.points).sum();
    let average_position =
        mean(team_results.iter().filter_map(|r| r.position).map(|p| p as f64));

    Some(TeamPerformance {
        races_entered: races.len(),
        total_points: round_to(total_points, 1),
        average_position: average_position.map(|v| round_to(v, 2)),
        total_laps: team_laps.len(),
        average_lap_time: mean(team_laps.iter().filter_map(|l| l.lap_time_seconds))
            .map(|v| round_to(v, 3)),
        drivers_count: team_driver_ids(team_laps).len(),
    })
}

/// Pit stop aggregates over the team's laps with a pit time. `None` when
/// there are no pit stops.
pub fn pit_stop_stats(team_laps: &[StoredLap]) -> Option<PitStopStats> {
    let pit_times: Vec<f64> = team_laps.iter().filter_map(|l| l.pit_in_time).collect();
    let (fastest, slowest) = min_max(&pit_times)?;

    let mut per_race: BTreeMap<i64, usize> = BTreeMap::new();
    for lap in team_laps.iter().filter(|l| l.pit_in_time.is_some()) {
        *per_race.entry(lap.race_id).or_default() += 1;
    }

    Some(PitStopStats {
        total_pit_stops: pit_times.len(),
        races_with_pit_stops: per_race.len(),
        average_stops_per_race: round_to(pit_times.len() as f64 / per_race.len() as f64, 2),
        average_pit_time_seconds: mean(pit_times.iter().copied()).map(|v| round_to(v, 3)),
        fastest_pit_time_seconds: Some(round_to(fastest, 3)),
        slowest_pit_time_seconds: Some(round_to(slowest, 3)),
    })
}
