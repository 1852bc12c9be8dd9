// Entry point and high-level CLI flow.
//
// - `build` computes (or reuses) the indicator table and prints a summary.
// - `snapshot`, `trend` and `map` are the dashboard views over that table:
//   a ranked month, a portfolio time series, and a choropleth join.
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use drought_risk::choropleth;
use drought_risk::config::{DateRange, PipelineConfig, RegionDefinition};
use drought_risk::output;
use drought_risk::query::{self, Filter, Indicator};
use drought_risk::reports;
use drought_risk::store::{self, Origin};
use drought_risk::types::ScaledRow;
use drought_risk::util;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "drought_risk")]
#[command(about = "Composite drought-risk indicator for East African regions", long_about = None)]
struct Cli {
    /// Directory holding gee_monthly/ inputs and the persisted table
    #[arg(long, default_value = "data", global = true)]
    data_dir: PathBuf,

    /// First month to include (YYYY-MM or YYYY-MM-DD)
    #[arg(long, global = true, value_parser = month_arg)]
    start: Option<NaiveDate>,

    /// End of the range, exclusive
    #[arg(long, global = true, value_parser = month_arg)]
    end: Option<NaiveDate>,

    /// Key rows by this grid-cell column instead of admin names
    #[arg(long, value_name = "COLUMN", global = true)]
    grid_cells: Option<String>,

    /// Country lookup CSV (country_name, iso3_code, continent)
    #[arg(long, global = true)]
    country_codes: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct View {
    /// Comma-separated countries to keep (default: all)
    #[arg(long, value_delimiter = ',')]
    countries: Vec<String>,

    /// Indicator column to show
    #[arg(long, default_value = "risk_index_sm3")]
    indicator: Indicator,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the indicator table, reusing it when inputs are unchanged
    Build {
        /// Recompute even if the persisted table is fresh
        #[arg(long)]
        force: bool,

        /// Also write the run summary as JSON
        #[arg(long)]
        summary: Option<PathBuf>,
    },
    /// Highest and lowest regions at a month, with MoM / YoY change
    Snapshot {
        #[command(flatten)]
        view: View,

        /// Reference month (default: latest)
        #[arg(long, value_parser = month_arg)]
        date: Option<NaiveDate>,

        /// Rows to show at each end
        #[arg(long, default_value_t = 25)]
        top: usize,

        /// Export the full filtered snapshot as CSV
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Mean of the indicator across the selected regions per month
    Trend {
        #[command(flatten)]
        view: View,

        /// Only show the last N months
        #[arg(long)]
        last: Option<usize>,
    },
    /// Join a month onto admin boundaries and write GeoJSON
    Map {
        #[command(flatten)]
        view: View,

        #[arg(long)]
        geojson: PathBuf,

        #[arg(long)]
        out: PathBuf,

        #[arg(long, value_parser = month_arg)]
        date: Option<NaiveDate>,
    },
}

fn month_arg(s: &str) -> Result<NaiveDate, String> {
    util::parse_month(s).ok_or_else(|| format!("not a month: {s:?} (expected YYYY-MM or YYYY-MM-DD)"))
}

impl Cli {
    fn config(&self) -> PipelineConfig {
        let defaults = DateRange::default();
        let range = DateRange::new(
            self.start.unwrap_or(defaults.start),
            self.end.unwrap_or(defaults.end),
        );
        let region = match &self.grid_cells {
            Some(column) => RegionDefinition::Grid {
                id_column: column.clone(),
            },
            None => RegionDefinition::Admin,
        };
        let mut config = PipelineConfig::from_data_dir(&self.data_dir)
            .with_date_range(range)
            .with_region(region);
        if let Some(path) = &self.country_codes {
            config.country_lookup = Some(path.clone());
        }
        config
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = cli.config();
    if config.date_range.start >= config.date_range.end {
        bail!(
            "empty date range: {} is not before {}",
            config.date_range.start,
            config.date_range.end
        );
    }

    match cli.command {
        Commands::Build { force, summary } => handle_build(&config, force, summary),
        Commands::Snapshot {
            view,
            date,
            top,
            export,
        } => handle_snapshot(&config, view, date, top, export),
        Commands::Trend { view, last } => handle_trend(&config, view, last),
        Commands::Map {
            view,
            geojson,
            out,
            date,
        } => handle_map(&config, view, geojson, out, date),
    }
}

fn load(config: &PipelineConfig) -> Result<Vec<ScaledRow>> {
    let (rows, origin) =
        store::load_or_build(config, false).context("Data not found or unreadable")?;
    if origin == Origin::Rebuilt {
        info!(rows = rows.len(), "Indicator table recomputed");
    }
    Ok(rows)
}

/// The whole table plus the filter for a view; fails when the country
/// subset selects nothing.
fn filtered(
    config: &PipelineConfig,
    view: &View,
    date: Option<NaiveDate>,
) -> Result<(Vec<ScaledRow>, Filter)> {
    let rows = load(config)?;
    let filter = Filter {
        countries: view.countries.clone(),
        indicator: view.indicator,
        date,
    };
    if !rows.iter().any(|r| filter.matches(r)) {
        let available = query::countries(&rows).join(", ");
        bail!("No rows match the selected countries. Available: {}", available);
    }
    Ok((rows, filter))
}

fn handle_build(
    config: &PipelineConfig,
    force: bool,
    summary_path: Option<PathBuf>,
) -> Result<()> {
    let (rows, origin) =
        store::load_or_build(config, force).context("Failed to build indicator table")?;
    let summary = reports::generate_summary(&rows);

    match origin {
        Origin::Rebuilt => println!(
            "Processing dataset... ({} rows, {} regions)",
            util::format_int(summary.total_rows),
            util::format_int(summary.total_regions)
        ),
        Origin::Reused => println!(
            "Using persisted table {} ({} rows)",
            config.output.parquet.display(),
            util::format_int(summary.total_rows)
        ),
    }
    if let (Some(first), Some(last)) = (summary.first_date, summary.latest_date) {
        println!("Months: {} to {}", first.format("%Y-%m"), last.format("%Y-%m"));
    }
    println!(
        "Outputs: {}\n         {}\n",
        config.output.parquet.display(),
        config.output.csv.display()
    );

    println!("Risk categories at latest month:");
    for c in &summary.latest_categories {
        println!("  {:<8} {}", c.category.label(), util::format_int(c.regions));
    }
    println!();

    if let Some(path) = summary_path {
        output::write_json(&path, &summary)
            .with_context(|| format!("Failed to write summary {}", path.display()))?;
        println!("Summary written to {}\n", path.display());
    }
    Ok(())
}

fn handle_snapshot(
    config: &PipelineConfig,
    view: View,
    date: Option<NaiveDate>,
    top: usize,
    export: Option<PathBuf>,
) -> Result<()> {
    let (rows, filter) = filtered(config, &view, date)?;
    let Some((date, snap)) = query::filtered_snapshot(&rows, &filter) else {
        bail!("No dates available");
    };
    let snap = query::rank_descending(snap);
    if snap.is_empty() {
        bail!("No rows at {}", date.format("%Y-%m"));
    }

    let table = reports::snapshot_table(&snap);
    println!("Highest {}, {}\n", filter.indicator, date.format("%Y-%m"));
    output::preview_table_rows(&table, top);

    let tail: Vec<_> = table.iter().rev().take(top).rev().cloned().collect();
    println!("Lowest {}, {}\n", filter.indicator, date.format("%Y-%m"));
    output::preview_table_rows(&tail, top);

    if let Some(path) = export {
        output::write_snapshot_csv(&path, filter.indicator.column(), &snap)
            .with_context(|| format!("Failed to export {}", path.display()))?;
        println!("(Full snapshot exported to {})\n", path.display());
    }
    Ok(())
}

fn handle_trend(config: &PipelineConfig, view: View, last: Option<usize>) -> Result<()> {
    let (rows, filter) = filtered(config, &view, None)?;
    let points = query::portfolio_trend(&filter.apply(&rows), filter.indicator);
    let skip = last.map(|n| points.len().saturating_sub(n)).unwrap_or(0);
    let table = reports::trend_table(&points[skip..]);
    println!("Portfolio trend, {}\n", filter.indicator);
    output::preview_table_rows(&table, table.len());
    Ok(())
}

fn handle_map(
    config: &PipelineConfig,
    view: View,
    geojson: PathBuf,
    out: PathBuf,
    date: Option<NaiveDate>,
) -> Result<()> {
    let (rows, filter) = filtered(config, &view, date)?;
    let Some((date, snap)) = query::filtered_snapshot(&rows, &filter) else {
        bail!("No dates available");
    };

    let mut gj = choropleth::read_geojson(&geojson)
        .with_context(|| format!("No admin polygons at {}", geojson.display()))?;
    let report = choropleth::join(&mut gj, filter.indicator.column(), &snap);
    output::write_json(&out, &gj).with_context(|| format!("Failed to write {}", out.display()))?;
    println!(
        "Joined {} of {} features for {}, {} into {}",
        util::format_int(report.matched),
        util::format_int(report.features),
        filter.indicator,
        date.format("%Y-%m"),
        out.display()
    );
    Ok(())
}
