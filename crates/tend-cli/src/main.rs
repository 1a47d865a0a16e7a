use anyhow::Result;
use clap::Parser;
use tend_cli::cli::{Cli, Commands, LogLevel};
use tend_cli::commands;
use tend_cli::context::AppContext;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.verbose);

    let ctx = AppContext::build(cli.config, cli.vault).await?;

    match cli.command {
        Commands::Promote {
            id,
            threshold,
            dry_run,
        } => commands::promote::promote(&ctx, &id, threshold, dry_run).await,
        Commands::AutoPromote {
            threshold,
            type_filter,
            dry_run,
        } => commands::promote::auto_promote(&ctx, threshold, type_filter, dry_run).await,
        Commands::MarkProcessed { id, dry_run } => {
            commands::promote::mark_processed(&ctx, &id, dry_run).await
        }
        Commands::ScanOrphans => commands::orphans::scan(&ctx).await,
        Commands::RepairOrphans { dry_run } => commands::orphans::repair(&ctx, dry_run).await,
        Commands::Watch => commands::watch::run(&ctx).await,
    }
}

/// RUST_LOG wins; otherwise the flags decide, defaulting to warnings only.
fn init_logging(log_level: Option<LogLevel>, verbose: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level: LevelFilter = match (log_level, verbose) {
            (Some(level), _) => level.into(),
            (None, true) => LevelFilter::DEBUG,
            (None, false) => LevelFilter::WARN,
        };
        let directives = [
            "tend_core",
            "tend_config",
            "tend_store",
            "tend_engine",
            "tend_pipeline",
            "tend_watch",
            "tend_cli",
        ]
        .map(|krate| format!("{krate}={level}"))
        .join(",");
        EnvFilter::new(directives)
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
