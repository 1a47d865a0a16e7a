//! `tend scan-orphans` and `tend repair-orphans`.

use crate::commands::promote::cancel_on_ctrl_c;
use crate::context::AppContext;
use anyhow::Result;
use tend_engine::{OrphanKind, OrphanReport, RepairOutcome};

pub async fn scan(ctx: &AppContext) -> Result<()> {
    let reports = ctx.detector.scan().await;
    if reports.is_empty() {
        println!("no orphans found");
        return Ok(());
    }

    for report in &reports {
        print_report(report);
    }
    println!("{} orphan(s) found", reports.len());
    Ok(())
}

pub async fn repair(ctx: &AppContext, dry_run: bool) -> Result<()> {
    let reports = ctx.detector.scan().await;
    if reports.is_empty() {
        println!("no orphans found");
        return Ok(());
    }

    let cancel = cancel_on_ctrl_c();
    let result = ctx.detector.repair(reports, dry_run, &cancel).await?;

    if let Some(snapshot) = &result.snapshot {
        println!("vault backed up to {}", snapshot.display());
    }
    for (id, outcome) in &result.outcomes {
        match outcome {
            RepairOutcome::Repaired { resulting_path } => {
                println!("repaired {id} -> {}", resulting_path.display());
            }
            RepairOutcome::WouldRepair { destination } => {
                println!("would repair {id} -> {} (dry run)", destination.display());
            }
            RepairOutcome::Unsupported => {
                println!("cannot repair {id}: no directory mapping; resolve by hand");
            }
            RepairOutcome::Failed { error } => {
                eprintln!("failed to repair {id}: {error}");
            }
        }
    }
    if result.cancelled {
        println!("cancelled; repairs completed so far are reported above");
    }
    println!("{} repaired", result.repaired_count());
    Ok(())
}

fn print_report(report: &OrphanReport) {
    let kind = match report.kind {
        OrphanKind::StatusAheadOfLocation => "status ahead of location",
        OrphanKind::LocationAheadOfStatus => "location ahead of status",
        OrphanKind::UnsupportedType => "unsupported type",
    };
    match &report.expected_dir {
        Some(expected) => println!(
            "{}: {kind} ({:?} in {:?}, belongs in {})",
            report.id,
            report.status,
            report.found_role,
            expected.display()
        ),
        None => println!(
            "{}: {kind} ({:?} {:?} in {:?})",
            report.id, report.status, report.note_type, report.found_role
        ),
    }
}
