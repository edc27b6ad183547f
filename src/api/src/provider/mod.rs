//! Upstream motorsport data provider.
//!
//! Provides the provider abstraction used by the extractor, the OpenF1 HTTP
//! client, a file-based response cache and request rate limiting.

pub mod cache;
pub mod error;
#[cfg(test)]
pub mod fake;
pub mod openf1;
pub mod rate_limiter;
pub mod types;

use async_trait::async_trait;

pub use cache::ResponseCache;
pub use error::ProviderError;
pub use openf1::OpenF1Client;
pub use rate_limiter::RateLimiter;
pub use types::{
    EventFormat, EventInfo, RawLap, RawResult, ScheduledEvent, SessionDescriptor, SessionKind,
    SessionTables,
};

/// Source of session tables and season schedules.
///
/// Session access is two-step: [`DataProvider::get_session`] resolves a
/// descriptor without downloading telemetry, [`DataProvider::load_session`]
/// materializes the lap and result tables for it.
#[async_trait]
pub trait DataProvider {
    /// Resolve the session of `kind` for an event of the given season.
    ///
    /// Fails with [`ProviderError::SprintNotAvailable`] when a sprint is
    /// requested for a weekend without one.
    async fn get_session(
        &self,
        year: i32,
        event: &str,
        kind: SessionKind,
    ) -> Result<SessionDescriptor, ProviderError>;

    /// Download the lap and result tables of a resolved session.
    async fn load_session(
        &self,
        session: &SessionDescriptor,
    ) -> Result<SessionTables, ProviderError>;

    /// Season schedule in chronological order.
    async fn event_schedule(&self, year: i32) -> Result<Vec<ScheduledEvent>, ProviderError>;
}
