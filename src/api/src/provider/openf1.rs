//! OpenF1 REST client.
//!
//! Resolves events and sessions from `meetings`/`sessions`, and assembles the
//! lap and result tables from `drivers`, `laps`, `stints`, `pit`,
//! `session_result` and `starting_grid`.

use async_trait::async_trait;
use chrono::{NaiveDate, TimeDelta};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::cache::{CacheCategory, ResponseCache};
use super::error::ProviderError;
use super::rate_limiter::RateLimiter;
use super::types::{
    EventFormat, EventInfo, RawLap, RawResult, ScheduledEvent, SessionDescriptor, SessionKind,
    SessionTables,
};
use super::DataProvider;
use crate::config::ProviderConfig;

pub const DEFAULT_BASE_URL: &str = "https://api.openf1.org/v1";

#[derive(Debug, Clone, Deserialize)]
struct ApiMeeting {
    meeting_key: i64,
    meeting_name: String,
    #[serde(default)]
    meeting_official_name: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    country_name: Option<String>,
    #[serde(default)]
    circuit_short_name: Option<String>,
    #[serde(default)]
    date_start: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiSession {
    session_key: i64,
    meeting_key: i64,
    session_name: String,
    #[serde(default)]
    date_start: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiDriver {
    driver_number: i64,
    #[serde(default)]
    name_acronym: Option<String>,
    #[serde(default)]
    broadcast_name: Option<String>,
    #[serde(default)]
    team_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiLap {
    driver_number: i64,
    lap_number: i64,
    #[serde(default)]
    lap_duration: Option<f64>,
    #[serde(default)]
    is_pit_out_lap: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiStint {
    driver_number: i64,
    stint_number: i64,
    #[serde(default)]
    compound: Option<String>,
    #[serde(default)]
    lap_start: Option<i64>,
    #[serde(default)]
    lap_end: Option<i64>,
    #[serde(default)]
    tyre_age_at_start: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiPit {
    driver_number: i64,
    lap_number: i64,
    #[serde(default)]
    pit_duration: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiSessionResult {
    driver_number: i64,
    #[serde(default)]
    position: Option<i64>,
    #[serde(default)]
    points: Option<f64>,
    #[serde(default)]
    dnf: bool,
    #[serde(default)]
    dns: bool,
    #[serde(default)]
    dsq: bool,
    #[serde(default)]
    gap_to_leader: Value,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiGridPosition {
    driver_number: i64,
    #[serde(default)]
    position: Option<i64>,
}

/// HTTP client for the OpenF1 API with an on-disk response cache.
#[derive(Debug, Clone)]
pub struct OpenF1Client {
    http: Client,
    base_url: String,
    cache: ResponseCache,
    limiter: RateLimiter,
}

impl OpenF1Client {
    pub fn new(
        base_url: impl Into<String>,
        cache: ResponseCache,
        limiter: RateLimiter,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("f1-api/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            cache,
            limiter,
        })
    }

    /// Build a client from configuration
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let cache = if config.cache_enabled {
            ResponseCache::new(&config.cache_dir)
        } else {
            ResponseCache::disabled()
        };
        let limiter = RateLimiter::new(
            config.requests_per_minute,
            config.min_delay_secs,
            config.max_delay_secs,
        );

        Self::new(
            config.base_url.clone(),
            cache,
            limiter,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint)
    }

    /// GET an endpoint, going through the cache first.
    ///
    /// OpenF1 answers 404 when a filter matches nothing; that is an empty list.
    async fn fetch<T: DeserializeOwned>(
        &self,
        category: CacheCategory,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ProviderError> {
        let key = cache_key(endpoint, query);

        let body = match self.cache.get::<Value>(category, &key) {
            Some(cached) => {
                debug!("Cache hit: {}", key);
                cached
            }
            None => {
                self.limiter.acquire().await;
                let url = self.url(endpoint);
                debug!("GET {} {:?}", url, query);

                let resp = self.http.get(&url).query(query).send().await?;
                let status = resp.status();

                let body = if status == StatusCode::NOT_FOUND {
                    Value::Array(Vec::new())
                } else if !status.is_success() {
                    return Err(ProviderError::Status { url, status });
                } else {
                    resp.json::<Value>().await?
                };

                if let Err(e) = self.cache.set(category, &key, &body) {
                    tracing::warn!("Failed to cache {}: {}", key, e);
                }
                body
            }
        };

        Ok(serde_json::from_value(body)?)
    }

    async fn meetings(&self, year: i32) -> Result<Vec<ApiMeeting>, ProviderError> {
        let mut meetings: Vec<ApiMeeting> = self
            .fetch(CacheCategory::Schedule, "meetings", &[("year", year.to_string())])
            .await?;
        meetings.sort_by(|a, b| a.date_start.cmp(&b.date_start));
        Ok(meetings)
    }

    async fn session_rows<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        session_key: i64,
    ) -> Result<Vec<T>, ProviderError> {
        self.fetch(
            CacheCategory::Session,
            endpoint,
            &[("session_key", session_key.to_string())],
        )
        .await
    }
}

#[async_trait]
impl DataProvider for OpenF1Client {
    async fn get_session(
        &self,
        year: i32,
        event: &str,
        kind: SessionKind,
    ) -> Result<SessionDescriptor, ProviderError> {
        let meetings = self.meetings(year).await?;
        let meeting = match_event(&meetings, event).ok_or_else(|| ProviderError::EventNotFound {
            year,
            event: event.to_string(),
        })?;

        let sessions: Vec<ApiSession> = self
            .fetch(
                CacheCategory::Schedule,
                "sessions",
                &[("meeting_key", meeting.meeting_key.to_string())],
            )
            .await?;

        let session = sessions
            .iter()
            .find(|s| s.session_name.eq_ignore_ascii_case(kind.session_name()))
            .ok_or_else(|| match kind {
                SessionKind::Sprint => ProviderError::SprintNotAvailable {
                    year,
                    event: event.to_string(),
                },
                SessionKind::Race => ProviderError::SessionNotFound {
                    year,
                    event: event.to_string(),
                    kind,
                },
            })?;

        let date = session
            .date_start
            .as_deref()
            .and_then(parse_date)
            .or_else(|| meeting.date_start.as_deref().and_then(parse_date));

        Ok(SessionDescriptor {
            year,
            kind,
            session_key: session.session_key,
            event: EventInfo {
                name: meeting.meeting_name.clone(),
                official_name: meeting.meeting_official_name.clone(),
                date,
                location: meeting.location.clone(),
                country: meeting.country_name.clone(),
            },
        })
    }

    async fn load_session(
        &self,
        session: &SessionDescriptor,
    ) -> Result<SessionTables, ProviderError> {
        let key = session.session_key;

        let drivers: Vec<ApiDriver> = self.session_rows("drivers", key).await?;
        let laps: Vec<ApiLap> = self.session_rows("laps", key).await?;
        let stints: Vec<ApiStint> = self.session_rows("stints", key).await?;
        let pits: Vec<ApiPit> = self.session_rows("pit", key).await?;
        let results: Vec<ApiSessionResult> = self.session_rows("session_result", key).await?;
        let grid: Vec<ApiGridPosition> = self.session_rows("starting_grid", key).await?;

        if laps.is_empty() && results.is_empty() {
            return Err(ProviderError::SessionNotFound {
                year: session.year,
                event: session.event.name.clone(),
                kind: session.kind,
            });
        }

        Ok(SessionTables {
            laps: build_laps(&drivers, &laps, &stints, &pits),
            results: build_results(&drivers, &results, &grid),
        })
    }

    async fn event_schedule(&self, year: i32) -> Result<Vec<ScheduledEvent>, ProviderError> {
        let meetings = self.meetings(year).await?;
        let sessions: Vec<ApiSession> = self
            .fetch(CacheCategory::Schedule, "sessions", &[("year", year.to_string())])
            .await?;

        let mut by_meeting: HashMap<i64, Vec<&ApiSession>> = HashMap::new();
        for s in &sessions {
            by_meeting.entry(s.meeting_key).or_default().push(s);
        }

        Ok(meetings
            .iter()
            .map(|m| {
                let names: Vec<&str> = by_meeting
                    .get(&m.meeting_key)
                    .map(|v| v.iter().map(|s| s.session_name.as_str()).collect())
                    .unwrap_or_default();
                ScheduledEvent {
                    name: m.meeting_name.clone(),
                    date: m.date_start.as_deref().and_then(parse_date),
                    location: m.location.clone(),
                    country: m.country_name.clone(),
                    format: event_format(&m.meeting_name, &names),
                }
            })
            .collect())
    }
}

fn cache_key(endpoint: &str, query: &[(&str, String)]) -> String {
    let params: Vec<String> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{}?{}", endpoint, params.join("&"))
}

/// Parse the date part of an ISO-8601 timestamp
fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok()
}

fn event_format(meeting_name: &str, session_names: &[&str]) -> EventFormat {
    let has = |name: &str| session_names.iter().any(|s| s.eq_ignore_ascii_case(name));

    if is_testing(meeting_name) || !has("Race") {
        EventFormat::Testing
    } else if has("Sprint") {
        EventFormat::Sprint
    } else {
        EventFormat::Conventional
    }
}

fn is_testing(meeting_name: &str) -> bool {
    meeting_name.to_lowercase().contains("testing")
}

/// Find the meeting an event identifier refers to.
///
/// Testing meetings are never candidates. Exact (case-insensitive) matches on
/// any name field win over substring matches; ties go to the earliest meeting.
fn match_event<'a>(meetings: &'a [ApiMeeting], event: &str) -> Option<&'a ApiMeeting> {
    let needle = event.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    let candidates = || meetings.iter().filter(|m| !is_testing(&m.meeting_name));

    let fields = |m: &'a ApiMeeting| {
        [
            Some(m.meeting_name.as_str()),
            m.meeting_official_name.as_deref(),
            m.location.as_deref(),
            m.country_name.as_deref(),
            m.circuit_short_name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::to_lowercase)
    };

    candidates()
        .find(|m| fields(*m).any(|f| f == needle))
        .or_else(|| candidates().find(|m| fields(*m).any(|f| f.contains(&needle))))
}

fn seconds_to_delta(seconds: f64) -> Option<TimeDelta> {
    let micros = (seconds * 1_000_000.0).round();
    // Out-of-range values would saturate in the cast
    if !micros.is_finite() || micros.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(TimeDelta::microseconds(micros as i64))
}

fn build_laps(
    drivers: &[ApiDriver],
    laps: &[ApiLap],
    stints: &[ApiStint],
    pits: &[ApiPit],
) -> Vec<RawLap> {
    let driver_map: HashMap<i64, &ApiDriver> =
        drivers.iter().map(|d| (d.driver_number, d)).collect();
    let pit_map: HashMap<(i64, i64), f64> = pits
        .iter()
        .filter_map(|p| p.pit_duration.map(|d| ((p.driver_number, p.lap_number), d)))
        .collect();

    let mut ordered: Vec<&ApiLap> = laps.iter().collect();
    ordered.sort_by_key(|l| (l.driver_number, l.lap_number));

    let mut best: HashMap<i64, f64> = HashMap::new();
    let mut rows = Vec::with_capacity(ordered.len());

    for lap in ordered {
        let driver = driver_map.get(&lap.driver_number);
        let stint = stints.iter().find(|s| {
            s.driver_number == lap.driver_number
                && s.lap_start.is_some_and(|start| start <= lap.lap_number)
                && s.lap_end.is_none_or(|end| lap.lap_number <= end)
        });

        let duration = lap.lap_duration.filter(|d| d.is_finite());
        let is_personal_best = match duration {
            Some(d) if !lap.is_pit_out_lap.unwrap_or(false) => {
                let improved = best.get(&lap.driver_number).is_none_or(|b| d < *b);
                if improved {
                    best.insert(lap.driver_number, d);
                }
                improved
            }
            _ => false,
        };

        rows.push(RawLap {
            driver: driver.and_then(|d| d.name_acronym.clone()),
            driver_number: Some(lap.driver_number.to_string()),
            lap_number: Some(lap.lap_number as f64),
            lap_time: duration.and_then(seconds_to_delta),
            compound: stint.and_then(|s| s.compound.clone()),
            tyre_life: stint.and_then(|s| {
                let start = s.lap_start?;
                let age = s.tyre_age_at_start.unwrap_or(0);
                Some((age + lap.lap_number - start + 1) as f64)
            }),
            stint: stint.map(|s| s.stint_number as f64),
            team: driver.and_then(|d| d.team_name.clone()),
            is_personal_best: Some(is_personal_best),
            pit_in_time: pit_map
                .get(&(lap.driver_number, lap.lap_number))
                .copied()
                .and_then(seconds_to_delta),
        });
    }

    rows
}

fn classified_marker(r: &ApiSessionResult) -> String {
    if r.dsq {
        "D".to_string()
    } else if r.dns {
        "W".to_string()
    } else if let Some(p) = r.position {
        // Retirements past the classification distance keep their position
        p.to_string()
    } else if r.dnf {
        "R".to_string()
    } else {
        "N".to_string()
    }
}

fn status_text(r: &ApiSessionResult) -> String {
    if r.dsq {
        return "Disqualified".to_string();
    }
    if r.dns {
        return "Did not start".to_string();
    }
    if r.dnf {
        return "Retired".to_string();
    }
    match &r.gap_to_leader {
        Value::String(gap) if gap.to_uppercase().contains("LAP") => {
            let laps = gap.trim().trim_start_matches('+').split_whitespace().next();
            match laps {
                Some("1") => "+1 Lap".to_string(),
                Some(n) => format!("+{} Laps", n),
                None => "Finished".to_string(),
            }
        }
        _ => "Finished".to_string(),
    }
}

fn build_results(
    drivers: &[ApiDriver],
    results: &[ApiSessionResult],
    grid: &[ApiGridPosition],
) -> Vec<RawResult> {
    let driver_map: HashMap<i64, &ApiDriver> =
        drivers.iter().map(|d| (d.driver_number, d)).collect();
    let grid_map: HashMap<i64, i64> = grid
        .iter()
        .filter_map(|g| g.position.map(|p| (g.driver_number, p)))
        .collect();

    results
        .iter()
        .map(|r| {
            let driver = driver_map.get(&r.driver_number);
            RawResult {
                driver_number: Some(r.driver_number.to_string()),
                abbreviation: driver.and_then(|d| d.name_acronym.clone()),
                broadcast_name: driver.and_then(|d| d.broadcast_name.clone()),
                classified_position: Some(classified_marker(r)),
                grid_position: grid_map.get(&r.driver_number).map(|p| *p as f64),
                points: r.points,
                status: Some(status_text(r)),
                team_name: driver.and_then(|d| d.team_name.clone()),
            }
        })
        .collect()
}
