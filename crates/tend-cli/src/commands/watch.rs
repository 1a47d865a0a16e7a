//! `tend watch`: the long-running ingestion loop.
//!
//! Watcher events flow through the concurrency guard into the pipeline.
//! Every trigger outcome is logged rather than printed; this command is
//! meant to run unattended.

use crate::context::AppContext;
use anyhow::Result;
use std::sync::Arc;
use tend_pipeline::{
    ConcurrencyGuard, HeuristicEnricher, IngestionPipeline, PipelineError, TriggerOutcome,
};
use tend_watch::VaultWatcher;
use tokio::time::{interval, Duration};
use tracing::{info, warn};

const GC_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub async fn run(ctx: &AppContext) -> Result<()> {
    let guard = Arc::new(ConcurrencyGuard::new(ctx.config.guard.clone()));
    let pipeline = IngestionPipeline::new(
        Arc::clone(&ctx.store),
        Arc::new(HeuristicEnricher),
        guard,
        ctx.config.pipeline.clone(),
    );

    let mut watcher = VaultWatcher::start(Arc::clone(&ctx.layout), ctx.config.scan.clone())?;
    let mut gc = interval(GC_INTERVAL);
    info!(root = %ctx.config.root.display(), "watching vault; Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            _ = gc.tick() => {
                pipeline.gc_jobs().await;
            }
            event = watcher.next() => {
                let Some(event) = event else {
                    warn!("watcher channel closed");
                    break;
                };
                match pipeline.trigger(&event.note_id).await {
                    Ok(TriggerOutcome::Processed(outcome)) => {
                        info!(id = %event.note_id, score = outcome.quality_score, "note enriched");
                    }
                    Ok(TriggerOutcome::Cached(_)) => {
                        info!(id = %event.note_id, "served from result cache");
                    }
                    Ok(TriggerOutcome::Coalesced) => {}
                    Ok(TriggerOutcome::Skipped(reason)) => {
                        info!(id = %event.note_id, %reason, "trigger skipped");
                    }
                    Ok(TriggerOutcome::Failed { attempts, last_error }) => {
                        warn!(id = %event.note_id, attempts, error = %last_error, "enrichment failed");
                    }
                    Err(PipelineError::CircuitOpen { resource }) => {
                        warn!(id = %event.note_id, resource, "circuit open; trigger dropped");
                    }
                    Err(err) => {
                        warn!(id = %event.note_id, error = %err, "trigger errored");
                    }
                }
            }
        }
    }

    Ok(())
}
