//! Pipeline orchestration: extract, transform and load races one at a time.
//!
//! Failures never escape a race. A season run records each race's outcome and
//! keeps going.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::extract::extract_race;
use crate::load::Loader;
use crate::provider::{DataProvider, EventFormat, ProviderError, ScheduledEvent};
use crate::transform::transform_race;

/// Outcome of one race within a season run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceOutcome {
    pub race: String,
    pub success: bool,
}

/// Per-race outcomes of a season run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeasonSummary {
    pub year: i32,
    pub outcomes: Vec<RaceOutcome>,
    /// Set when the schedule itself could not be fetched
    pub schedule_error: Option<String>,
}

impl SeasonSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn failed_races(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.success)
            .map(|o| o.race.as_str())
            .collect()
    }
}

/// Print a season summary table
pub fn print_season_summary(summary: &SeasonSummary) {
    println!("=== {} Season ===", summary.year);
    println!();
    if let Some(err) = &summary.schedule_error {
        println!("  Schedule unavailable: {}", err);
        println!();
        return;
    }

    println!("  Races:      {}", summary.outcomes.len());
    println!("  Succeeded:  {}", summary.succeeded());
    println!("  Failed:     {}", summary.failed());
    println!();

    if !summary.outcomes.is_empty() {
        println!("  {:40} {:>8}", "Race", "Status");
        println!("  {}", "-".repeat(49));
        for outcome in &summary.outcomes {
            println!(
                "  {:40} {:>8}",
                outcome.race,
                if outcome.success { "ok" } else { "FAILED" }
            );
        }
        println!();
    }
}

pub struct Pipeline<P> {
    provider: P,
    loader: Loader,
    exclude: Regex,
}

impl<P: DataProvider> Pipeline<P> {
    /// Build a pipeline; events whose name matches `exclude_pattern` are
    /// skipped in season runs
    pub fn new(provider: P, loader: Loader, exclude_pattern: &str) -> Result<Self> {
        let exclude = Regex::new(exclude_pattern)
            .with_context(|| format!("Invalid exclude pattern '{}'", exclude_pattern))?;
        Ok(Self {
            provider,
            loader,
            exclude,
        })
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    /// Run one race end to end. Any failure is logged and reported as `false`.
    pub async fn run_one(&mut self, year: i32, race: &str) -> bool {
        info!("PIPELINE: Processing {} {}", year, race);
        match self.try_run_one(year, race).await {
            Ok(success) => success,
            Err(e) => {
                error!("PIPELINE: {} {} failed: {:#}", year, race, e);
                false
            }
        }
    }

    async fn try_run_one(&mut self, year: i32, race: &str) -> Result<bool> {
        let extracted = extract_race(&self.provider, year, race)
            .await
            .context("Extract failed")?;
        let transformed = transform_race(&extracted).context("Transform failed")?;
        Ok(self.loader.load(&transformed))
    }

    /// Championship rounds of a season in schedule order
    pub async fn season_events(&self, year: i32) -> Result<Vec<ScheduledEvent>, ProviderError> {
        let schedule = self.provider.event_schedule(year).await?;
        let total = schedule.len();

        let events: Vec<ScheduledEvent> = schedule
            .into_iter()
            .filter(|e| self.is_championship_round(e))
            .collect();

        info!(
            "PIPELINE: {} schedule has {} events ({} excluded)",
            year,
            events.len(),
            total - events.len()
        );
        Ok(events)
    }

    fn is_championship_round(&self, event: &ScheduledEvent) -> bool {
        event.format != EventFormat::Testing && !self.exclude.is_match(&event.name)
    }

    /// Run a season sequentially: the given races, or every championship round
    /// from the schedule
    pub async fn run_season(&mut self, year: i32, races: Option<Vec<String>>) -> SeasonSummary {
        let mut summary = SeasonSummary {
            year,
            ..SeasonSummary::default()
        };

        let races = match races {
            Some(races) => races,
            None => match self.season_events(year).await {
                Ok(events) => events.into_iter().map(|e| e.name).collect(),
                Err(e) => {
                    error!("PIPELINE: Could not fetch {} schedule: {}", year, e);
                    summary.schedule_error = Some(e.to_string());
                    return summary;
                }
            },
        };

        info!("PIPELINE: Running {} races for {}", races.len(), year);

        for race in races {
            let success = self.run_one(year, &race).await;
            summary.outcomes.push(RaceOutcome { race, success });
        }

        info!(
            "PIPELINE: {} complete: {} succeeded, {} failed",
            year,
            summary.succeeded(),
            summary.failed()
        );
        if summary.failed() > 0 {
            warn!("PIPELINE: Failed races: {}", summary.failed_races().join(", "));
        }

        summary
    }

    pub async fn run_many_seasons(&mut self, years: &[i32]) -> Vec<SeasonSummary> {
        let mut summaries = Vec::with_capacity(years.len());
        for &year in years {
            summaries.push(self.run_season(year, None).await);
        }
        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::fake::FakeProvider;
    use crate::provider::{RawLap, RawResult, SessionTables};
    use crate::storage::Repository;
    use chrono::TimeDelta;

    fn tables(codes: &[&str], laps_each: usize) -> SessionTables {
        let mut laps = Vec::new();
        for code in codes {
            for n in 1..=laps_each {
                laps.push(RawLap {
                    driver: Some(code.to_string()),
                    lap_number: Some(n as f64),
                    lap_time: TimeDelta::try_milliseconds(80_000 + n as i64),
                    team: Some("McLaren".to_string()),
                    ..RawLap::default()
                });
            }
        }

        let results = codes
            .iter()
            .enumerate()
            .map(|(i, code)| RawResult {
                abbreviation: Some(code.to_string()),
                classified_position: Some((i + 1).to_string()),
                points: Some(10.0),
                team_name: Some("McLaren".to_string()),
                ..RawResult::default()
            })
            .collect();

        SessionTables { laps, results }
    }

    fn pipeline(provider: FakeProvider) -> Pipeline<FakeProvider> {
        let loader = Loader::new(Repository::in_memory().unwrap(), 100);
        Pipeline::new(provider, loader, "(?i)test").unwrap()
    }

    #[tokio::test]
    async fn test_run_one_loads_race() {
        let provider = FakeProvider::new().with_race("Bahrain Grand Prix", tables(&["NOR", "PIA"], 5));
        let mut pipeline = pipeline(provider);

        assert!(pipeline.run_one(2024, "Bahrain Grand Prix").await);
        // Second run is a successful no-op
        assert!(pipeline.run_one(2024, "Bahrain Grand Prix").await);

        let repo = pipeline.loader().repository();
        assert_eq!(repo.race_count().unwrap(), 1);
        assert_eq!(repo.lap_count().unwrap(), 10);
    }

    #[tokio::test]
    async fn test_run_one_reports_extract_and_transform_failures() {
        let mut broken = tables(&["NOR"], 2);
        broken.laps[1].driver = None;

        let provider = FakeProvider::new()
            .failing("Bahrain Grand Prix")
            .with_race("Saudi Arabian Grand Prix", broken);
        let mut pipeline = pipeline(provider);

        assert!(!pipeline.run_one(2024, "Bahrain Grand Prix").await);
        assert!(!pipeline.run_one(2024, "Saudi Arabian Grand Prix").await);
        assert_eq!(pipeline.loader().repository().race_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_season_filters_testing_and_continues_after_failure() {
        let mut bad_laps = tables(&["NOR"], 10);
        // Lap 7 of 10 has no team
        bad_laps.laps[6].team = None;

        let provider = FakeProvider::new()
            .with_schedule(
                2024,
                &[
                    ("Pre-Season Testing", EventFormat::Testing),
                    ("Bahrain Grand Prix", EventFormat::Conventional),
                    ("Saudi Arabian Grand Prix", EventFormat::Conventional),
                    ("Young Driver Test", EventFormat::Conventional),
                    ("Chinese Grand Prix", EventFormat::Sprint),
                ],
            )
            .with_race("Bahrain Grand Prix", tables(&["NOR", "PIA"], 3))
            .with_race("Saudi Arabian Grand Prix", bad_laps)
            .with_race("Chinese Grand Prix", tables(&["NOR", "PIA"], 3))
            .with_sprint("Chinese Grand Prix", tables(&["PIA", "NOR"], 0));
        let mut pipeline = pipeline(provider);

        let summary = pipeline.run_season(2024, None).await;

        let raced: Vec<&str> = summary.outcomes.iter().map(|o| o.race.as_str()).collect();
        assert_eq!(
            raced,
            vec!["Bahrain Grand Prix", "Saudi Arabian Grand Prix", "Chinese Grand Prix"]
        );
        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.failed_races(), vec!["Saudi Arabian Grand Prix"]);

        let repo = pipeline.loader().repository();
        assert_eq!(repo.races_by_season(2024).unwrap().len(), 2);
        assert_eq!(repo.sprint_result_count().unwrap(), 2);
        assert!(!pipeline
            .provider
            .call_log()
            .iter()
            .any(|c| c.contains("Testing") || c.contains("Young Driver")));
    }

    #[tokio::test]
    async fn test_explicit_race_list_skips_schedule() {
        let provider = FakeProvider::new().with_race("Monaco Grand Prix", tables(&["LEC"], 2));
        let mut pipeline = pipeline(provider);

        let summary = pipeline
            .run_season(2024, Some(vec!["Monaco Grand Prix".to_string()]))
            .await;
        assert!(summary.schedule_error.is_none());
        assert_eq!(summary.succeeded(), 1);
    }

    #[tokio::test]
    async fn test_schedule_failure_is_contained() {
        let mut pipeline = pipeline(FakeProvider::new());

        let summary = pipeline.run_season(2023, None).await;
        assert!(summary.schedule_error.is_some());
        assert!(summary.outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_run_many_seasons_in_order() {
        let provider = FakeProvider::new()
            .with_schedule(2023, &[("Monaco Grand Prix", EventFormat::Conventional)])
            .with_schedule(2024, &[("Monaco Grand Prix", EventFormat::Conventional)])
            .with_race("Monaco Grand Prix", tables(&["LEC"], 2));
        let mut pipeline = pipeline(provider);

        let summaries = pipeline.run_many_seasons(&[2023, 2024, 2025]).await;
        let years: Vec<i32> = summaries.iter().map(|s| s.year).collect();
        assert_eq!(years, vec![2023, 2024, 2025]);
        assert_eq!(summaries[0].succeeded(), 1);
        assert_eq!(summaries[1].succeeded(), 1);
        assert!(summaries[2].schedule_error.is_some());

        // Same event name in two seasons is two races, one driver
        let repo = pipeline.loader().repository();
        assert_eq!(repo.race_count().unwrap(), 2);
        assert_eq!(repo.driver_count().unwrap(), 1);
    }

    #[test]
    fn test_invalid_exclude_pattern() {
        let loader = Loader::new(Repository::in_memory().unwrap(), 100);
        assert!(Pipeline::new(FakeProvider::new(), loader, "(unclosed").is_err());
    }
}
