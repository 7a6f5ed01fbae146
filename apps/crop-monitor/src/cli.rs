use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::fields::{LookbackWindow, ROW_LIMIT};

#[derive(Parser)]
#[command(
    name = "crop-monitor",
    version,
    about = "Recent sensor readings, statistics and plant-care recommendations for micro-crops"
)]
pub struct Cli {
    /// Setup config JSON (store settings, timezone, panel links).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch every monitored field and print stats and recommendations.
    Report(ReportArgs),
    /// Fetch a single series/field table.
    Series(SeriesArgs),
    /// List the external dashboard panel links.
    Panels(PanelsArgs),
}

#[derive(Args)]
pub struct ReportArgs {
    /// Lookback window in minutes: 10, 30, 60, 120, 180, 240 or 360.
    #[arg(long, default_value_t = LookbackWindow::default().minutes(), value_parser = parse_lookback)]
    pub lookback: u32,
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct SeriesArgs {
    /// Measurement name, e.g. airSensor.
    #[arg(long)]
    pub series: String,
    /// Field name, e.g. temperature.
    #[arg(long)]
    pub field: String,
    #[arg(long, default_value_t = LookbackWindow::default().minutes(), value_parser = parse_lookback)]
    pub lookback: u32,
    #[arg(long, default_value_t = ROW_LIMIT)]
    pub limit: usize,
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct PanelsArgs {
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

fn parse_lookback(raw: &str) -> Result<u32, String> {
    raw.parse::<LookbackWindow>().map(LookbackWindow::minutes)
}
