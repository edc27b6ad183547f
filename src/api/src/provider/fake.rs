//! Scripted in-process provider for tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::{
    DataProvider, EventFormat, EventInfo, ProviderError, ScheduledEvent, SessionDescriptor,
    SessionKind, SessionTables,
};

#[derive(Default)]
pub struct FakeProvider {
    races: HashMap<String, SessionTables>,
    sprints: HashMap<String, SessionTables>,
    failing: HashSet<String>,
    schedules: HashMap<i32, Vec<ScheduledEvent>>,
    /// Every `get_session` call as "year event kind"
    pub calls: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_race(mut self, event: &str, tables: SessionTables) -> Self {
        self.races.insert(event.to_string(), tables);
        self
    }

    pub fn with_sprint(mut self, event: &str, tables: SessionTables) -> Self {
        self.sprints.insert(event.to_string(), tables);
        self
    }

    /// Every request for this event fails with a server error
    pub fn failing(mut self, event: &str) -> Self {
        self.failing.insert(event.to_string());
        self
    }

    pub fn with_schedule(mut self, year: i32, events: &[(&str, EventFormat)]) -> Self {
        let events = events
            .iter()
            .enumerate()
            .map(|(i, (name, format))| ScheduledEvent {
                name: name.to_string(),
                date: NaiveDate::from_ymd_opt(year, 3, 1)
                    .and_then(|d| d.checked_add_days(chrono::Days::new(14 * i as u64))),
                location: None,
                country: None,
                format: *format,
            })
            .collect();
        self.schedules.insert(year, events);
        self
    }

    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn server_error(event: &str) -> ProviderError {
        ProviderError::Status {
            url: format!("fake://{}", event),
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[async_trait]
impl DataProvider for FakeProvider {
    async fn get_session(
        &self,
        year: i32,
        event: &str,
        kind: SessionKind,
    ) -> Result<SessionDescriptor, ProviderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(format!("{} {} {}", year, event, kind));
        }

        if self.failing.contains(event) {
            return Err(Self::server_error(event));
        }

        let known = match kind {
            SessionKind::Race => self.races.contains_key(event),
            SessionKind::Sprint => self.sprints.contains_key(event),
        };
        if !known {
            return Err(match kind {
                SessionKind::Race if !self.sprints.contains_key(event) => {
                    ProviderError::EventNotFound {
                        year,
                        event: event.to_string(),
                    }
                }
                SessionKind::Race => ProviderError::SessionNotFound {
                    year,
                    event: event.to_string(),
                    kind,
                },
                SessionKind::Sprint => ProviderError::SprintNotAvailable {
                    year,
                    event: event.to_string(),
                },
            });
        }

        Ok(SessionDescriptor {
            year,
            kind,
            session_key: 1,
            event: EventInfo {
                name: event.to_string(),
                official_name: None,
                date: NaiveDate::from_ymd_opt(year, 5, 26),
                location: Some("Circuit".to_string()),
                country: Some("Country".to_string()),
            },
        })
    }

    async fn load_session(
        &self,
        session: &SessionDescriptor,
    ) -> Result<SessionTables, ProviderError> {
        let tables = match session.kind {
            SessionKind::Race => self.races.get(&session.event.name),
            SessionKind::Sprint => self.sprints.get(&session.event.name),
        };
        tables.cloned().ok_or_else(|| ProviderError::SessionNotFound {
            year: session.year,
            event: session.event.name.clone(),
            kind: session.kind,
        })
    }

    async fn event_schedule(&self, year: i32) -> Result<Vec<ScheduledEvent>, ProviderError> {
        self.schedules
            .get(&year)
            .cloned()
            .ok_or_else(|| Self::server_error(&format!("schedule/{}", year)))
    }
}
