//! `tend promote` and `tend auto-promote`.

use crate::context::AppContext;
use anyhow::Result;
use std::str::FromStr;
use tend_core::{NoteId, NoteType};
use tend_engine::{BatchOptions, ItemOutcome, SkipReason};
use tokio_util::sync::CancellationToken;

pub async fn promote(
    ctx: &AppContext,
    id: &str,
    threshold: Option<f64>,
    dry_run: bool,
) -> Result<()> {
    let id = NoteId::from(id);
    let result = match threshold {
        Some(threshold) => {
            ctx.engine
                .promote_with_threshold(&id, threshold, dry_run)
                .await?
        }
        None => ctx.engine.promote_one(&id, dry_run).await?,
    };

    match result.outcome {
        ItemOutcome::Promoted { resulting_path } => {
            println!("promoted {} -> {}", result.id, resulting_path.display());
        }
        ItemOutcome::NoOp { resulting_path } => {
            println!(
                "{} already settled at {}",
                result.id,
                resulting_path.display()
            );
        }
        ItemOutcome::WouldPromote { destination } => {
            println!(
                "would promote {} -> {} (dry run)",
                result.id,
                destination.display()
            );
        }
        ItemOutcome::Rejected { reason } => {
            println!("not promoted: {reason}");
        }
    }
    Ok(())
}

pub async fn mark_processed(ctx: &AppContext, id: &str, dry_run: bool) -> Result<()> {
    let id = NoteId::from(id);
    let result = ctx.engine.mark_processed(&id, dry_run).await?;

    match result.outcome {
        ItemOutcome::Promoted { resulting_path } => {
            println!("marked processed: {} ({})", result.id, resulting_path.display());
        }
        ItemOutcome::NoOp { resulting_path } => {
            println!("{} already processed ({})", result.id, resulting_path.display());
        }
        ItemOutcome::WouldPromote { destination } => {
            println!(
                "would mark {} processed at {} (dry run)",
                result.id,
                destination.display()
            );
        }
        ItemOutcome::Rejected { reason } => {
            println!("not marked: {reason}");
        }
    }
    Ok(())
}

pub async fn auto_promote(
    ctx: &AppContext,
    threshold: Option<f64>,
    type_filter: Option<String>,
    dry_run: bool,
) -> Result<()> {
    let type_filter = type_filter
        .map(|value| NoteType::from_str(&value))
        .transpose()?;

    let cancel = cancel_on_ctrl_c();
    let result = ctx
        .engine
        .auto_promote(
            BatchOptions {
                threshold,
                type_filter,
                dry_run,
            },
            &cancel,
        )
        .await;

    for (id, path) in &result.promoted {
        let verb = if dry_run { "would promote" } else { "promoted" };
        println!("{verb} {id} -> {}", path.display());
    }
    for (id, reason) in &result.skipped {
        match reason {
            SkipReason::Rejected(reason) => println!("skipped {id}: {reason}"),
            SkipReason::FilteredByType { actual } => {
                println!("skipped {id}: type {actual:?} filtered out")
            }
        }
    }
    for (id, error) in &result.failed {
        eprintln!("failed {id}: {error}");
    }
    if result.cancelled {
        println!("cancelled; notes processed so far are reported above");
    }
    println!(
        "{} promoted, {} skipped, {} failed",
        result.promoted.len(),
        result.skipped.len(),
        result.failed.len()
    );
    Ok(())
}

/// A token cancelled by the first Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trip = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trip.cancel();
        }
    });
    cancel
}
