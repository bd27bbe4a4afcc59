//! Fetch command.

use feedcal_core::{ResolvedOccurrence, TimeWindow};

use super::Session;
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::output;

/// Occurrences from the start of today to the end of the expansion window.
pub async fn upcoming(session: &Session, force: bool) -> Vec<ResolvedOccurrence> {
    session.refresh(force).await;
    let today = session.zone.today();
    let window = TimeWindow::expansion(today, &session.zone);
    session
        .cache
        .events_between(session.zone.start_of_day(today), window.end)
        .await
}

/// Refreshes every enabled source and prints upcoming occurrences.
pub async fn run(config: &ClientConfig, force: bool, json: bool) -> ClientResult<()> {
    let session = Session::open(config)?;
    let events = upcoming(&session, force).await;
    println!("{}", output::render(&events, &session.zone, json, "No upcoming events")?);
    session.finish().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing;

    #[tokio::test]
    async fn past_events_are_not_upcoming() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::open(&testing::config_in(dir.path())).unwrap();

        // The sample event is in March 2025.
        assert!(upcoming(&session, true).await.is_empty());
        assert_eq!(session.cache.events().await.len(), 1);
    }
}
