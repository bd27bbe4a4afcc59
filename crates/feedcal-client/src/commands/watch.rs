//! Watch command: refresh on a timer until interrupted.

use feedcal_ingest::RefreshScheduler;
use tracing::{info, warn};

use super::{Session, describe};
use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Runs the refresh scheduler until Ctrl-C.
pub async fn run(config: &ClientConfig, json: bool) -> ClientResult<()> {
    let session = Session::open(config)?;
    let scheduler = RefreshScheduler::new(session.cache.clone(), session.sources.clone());
    let handle = scheduler.handle();

    let task = tokio::spawn(scheduler.run_with(move |outcome| {
        let summary = describe(outcome);
        if json {
            println!("{}", serde_json::json!({ "status": summary }));
        } else {
            println!("{}", summary);
        }
    }));

    tokio::signal::ctrl_c().await?;
    info!("interrupted, stopping");

    if let Err(e) = handle.stop().await {
        warn!(error = %e, "scheduler already stopped");
    }
    if let Err(e) = task.await {
        warn!(error = %e, "scheduler task failed");
    }
    Ok(())
}
