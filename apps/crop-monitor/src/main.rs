use anyhow::{Context, Result};
use clap::Parser;
use crop_monitor::cli::{Cli, Commands, PanelsArgs, ReportArgs, SeriesArgs};
use crop_monitor::config::Config;
use crop_monitor::dashboard::build_snapshot;
use crop_monitor::fields::LookbackWindow;
use crop_monitor::panels::panel_links;
use crop_monitor::report::{self, ReportContext};
use crop_monitor::store::{InfluxStore, SeriesSource};

fn init_tracing() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,crop_monitor=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize output")?
    );
    Ok(())
}

fn run_report(config: &Config, args: ReportArgs) -> Result<()> {
    let window = LookbackWindow::new(args.lookback).map_err(anyhow::Error::msg)?;
    let store = InfluxStore::new(config.store.clone())?;
    let snapshot = build_snapshot(&store, window, &config.panels);
    if args.json {
        return print_json(&snapshot);
    }
    let ctx = ReportContext {
        bucket: &config.store.bucket,
        org: &config.store.org,
        timezone: config.timezone,
    };
    print!("{}", report::render_text(&snapshot, &ctx));
    Ok(())
}

fn run_series(config: &Config, args: SeriesArgs) -> Result<()> {
    let store = InfluxStore::new(config.store.clone())?;
    let table = store
        .fetch_series(&args.series, &args.field, args.lookback, args.limit)
        .with_context(|| format!("failed to fetch {}/{}", args.series, args.field))?;
    if args.json {
        return print_json(&table);
    }
    if table.is_empty() {
        println!(
            "No '{}' data in the last {} minutes.",
            args.field, args.lookback
        );
        return Ok(());
    }
    print!("{}", report::render_table(&table, table.len()));
    Ok(())
}

fn run_panels(config: &Config, args: PanelsArgs) -> Result<()> {
    let links = panel_links(&config.panels);
    if args.json {
        return print_json(&links);
    }
    print!("{}", report::render_panels(&links));
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    let config = Config::load(cli.config.as_deref())
        .context("crop-monitor cannot start without the InfluxDB connection settings")?;
    tracing::debug!(store = ?config.store, timezone = %config.timezone, "configuration loaded");

    match cli.command {
        Commands::Report(args) => run_report(&config, args),
        Commands::Series(args) => run_series(&config, args),
        Commands::Panels(args) => run_panels(&config, args),
    }
}
