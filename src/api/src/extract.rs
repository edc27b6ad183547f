//! Extract stage: pull one race weekend's raw tables from the provider.

use tracing::{debug, info, warn};

use crate::provider::{
    DataProvider, ProviderError, RawLap, RawResult, SessionDescriptor, SessionKind,
};

/// Raw data for one race, tagged with the requested year and race name
#[derive(Debug, Clone)]
pub struct ExtractedRace {
    pub session: SessionDescriptor,
    pub laps_raw: Vec<RawLap>,
    pub results_raw: Vec<RawResult>,
    /// `None` when the weekend had no sprint
    pub sprint_results_raw: Option<Vec<RawResult>>,
    pub year: i32,
    pub race_name: String,
}

/// Fetch the race session's lap and result tables, plus sprint results when
/// the event has a sprint. Errors for the race session propagate.
pub async fn extract_race<P>(
    provider: &P,
    year: i32,
    race_name: &str,
) -> Result<ExtractedRace, ProviderError>
where
    P: DataProvider + ?Sized,
{
    info!("EXTRACT: Fetching {} {}", year, race_name);

    let session = provider.get_session(year, race_name, SessionKind::Race).await?;
    let tables = provider.load_session(&session).await?;

    info!(
        "EXTRACT: {}: {} laps, {} results",
        session.event.name,
        tables.laps.len(),
        tables.results.len()
    );

    let sprint_results_raw = extract_sprint(provider, year, race_name).await;

    Ok(ExtractedRace {
        session,
        laps_raw: tables.laps,
        results_raw: tables.results,
        sprint_results_raw,
        year,
        race_name: race_name.to_string(),
    })
}

/// Sprint results are optional: any failure leaves them out
async fn extract_sprint<P>(provider: &P, year: i32, race_name: &str) -> Option<Vec<RawResult>>
where
    P: DataProvider + ?Sized,
{
    let loaded = async {
        let session = provider.get_session(year, race_name, SessionKind::Sprint).await?;
        provider.load_session(&session).await
    }
    .await;

    match loaded {
        Ok(tables) => {
            info!("EXTRACT: Sprint session found ({} results)", tables.results.len());
            Some(tables.results)
        }
        Err(ProviderError::SprintNotAvailable { .. }) => {
            debug!("EXTRACT: No sprint session for {} {}", year, race_name);
            None
        }
        Err(e) => {
            warn!("EXTRACT: Sprint session for {} {} unavailable: {}", year, race_name, e);
            None
        }
    }
}
