//! Day view.

use chrono::NaiveDate;
use feedcal_core::ResolvedOccurrence;

use super::Session;
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::output;

/// Occurrences on `date`, refreshing first when needed.
pub async fn collect(session: &Session, date: NaiveDate, force: bool) -> Vec<ResolvedOccurrence> {
    session.refresh(force).await;
    session.cache.events_on_date(date).await
}

/// Prints the occurrences of `date`, today by default.
pub async fn run(
    config: &ClientConfig,
    date: Option<NaiveDate>,
    force: bool,
    json: bool,
) -> ClientResult<()> {
    let session = Session::open(config)?;
    let date = date.unwrap_or_else(|| session.zone.today());
    let events = collect(&session, date, force).await;

    if !json {
        println!("{} ({})", date.format("%A %Y-%m-%d"), session.zone);
    }
    println!("{}", output::render(&events, &session.zone, json, "No events")?);

    session.finish().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing;

    #[tokio::test]
    async fn lists_the_day() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::open(&testing::config_in(dir.path())).unwrap();

        let monday = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let events = collect(&session, monday, false).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Planning");
        assert_eq!(events[0].source, "Work");

        let tuesday = monday.succ_opt().unwrap();
        assert!(collect(&session, tuesday, false).await.is_empty());
    }

    #[tokio::test]
    async fn second_run_starts_from_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = testing::config_in(dir.path());
        let monday = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

        let first = Session::open(&config).unwrap();
        collect(&first, monday, false).await;

        std::fs::remove_file(dir.path().join("work.ics")).unwrap();
        let second = Session::open(&config).unwrap();
        let events = collect(&second, monday, false).await;
        assert_eq!(events.len(), 1);
        second.cache.shutdown();
    }
}
