//! Atticus news curator daemon entrypoint.
//! Runs one curation cycle immediately, then follows the daily schedule until
//! Ctrl-C.

use atticus_news_curator::{build_curator_from_env, metrics, scheduler, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();
    tracing::info!("Atticus news curator starting up");

    // Missing credentials or a broken config file are fatal.
    let mut curator = match build_curator_from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = ?e, "startup failed");
            return Err(e);
        }
    };

    if let Some(addr) = metrics::init_from_env()? {
        tracing::info!(%addr, "prometheus metrics exposed");
    }

    tracing::info!("running initial curation");
    if let Err(e) = curator.run_cycle().await {
        tracing::error!(error = %e, "initial curation failed");
    }

    tracing::info!("initial run completed, entering scheduled loop");
    tokio::select! {
        _ = scheduler::run_schedule(curator) => {}
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                tracing::warn!(error = %e, "ctrl-c handler failed");
            }
            tracing::info!("shutting down");
        }
    }
    Ok(())
}
