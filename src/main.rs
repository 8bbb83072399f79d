use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use futures_util::TryStreamExt;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use weather_pipeline::{
    backfill, run_local, store_dir_from_env, FileStore, NoaaClient, PipelineConfig,
    PipelineStats, RecordSource, Table, WeatherGetter, DEFAULT_COOLDOWN,
};

#[derive(Parser, Debug)]
#[command(name = "weather_pipeline")]
#[command(about = "Downloads NOAA daily observations into a local key-value store")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch one date range and store it
    Produce {
        /// NOAA API token
        #[arg(long, env = "NOAA_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// First day, YYYY-MM-DD
        #[arg(long)]
        start_date: NaiveDate,

        /// Last day (inclusive), YYYY-MM-DD
        #[arg(long)]
        end_date: NaiveDate,

        #[arg(long)]
        store_dir: Option<PathBuf>,
    },

    /// Fetch a date range one day at a time
    Backfill {
        #[arg(long, env = "NOAA_TOKEN", hide_env_values = true)]
        token: Option<String>,

        start: NaiveDate,

        end: NaiveDate,

        /// Seconds to wait between two days
        #[arg(long, default_value_t = DEFAULT_COOLDOWN.as_secs())]
        cooldown: u64,

        #[arg(long)]
        store_dir: Option<PathBuf>,
    },

    /// Print the stored readings of a location
    Query {
        /// precipitation or temperature
        table: Table,

        /// Location name, e.g. "Annapolis, MD US"
        location: String,

        /// Only readings whose date starts with this, e.g. 2021-10 or 2021-10-01
        #[arg(long)]
        date: Option<String>,

        /// Also write the readings to this parquet file
        #[arg(long)]
        parquet: Option<PathBuf>,

        #[arg(long)]
        store_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match args.command {
        Command::Produce {
            token,
            start_date,
            end_date,
            store_dir,
        } => produce(token, start_date, end_date, store_dir).await,
        Command::Backfill {
            token,
            start,
            end,
            cooldown,
            store_dir,
        } => run_backfill(token, start, end, Duration::from_secs(cooldown), store_dir).await,
        Command::Query {
            table,
            location,
            date,
            parquet,
            store_dir,
        } => query(table, &location, date.as_deref(), parquet, store_dir).await,
    }
}

async fn open_pipeline(
    token: Option<String>,
    store_dir: Option<PathBuf>,
    stats: Arc<PipelineStats>,
) -> Result<(PipelineConfig, Arc<dyn RecordSource>, Arc<FileStore>)> {
    let config = PipelineConfig::from_env(token, store_dir)?;
    let dir = config.prepare_store_dir().await?;
    let store = FileStore::open(&dir)
        .await
        .with_context(|| format!("Failed to open store in {}", dir.display()))?;
    let source: Arc<dyn RecordSource> = Arc::new(NoaaClient::new(&config)?.with_observer(stats));
    Ok((config, source, Arc::new(store)))
}

async fn produce(
    token: Option<String>,
    start: NaiveDate,
    end: NaiveDate,
    store_dir: Option<PathBuf>,
) -> Result<()> {
    let stats = Arc::new(PipelineStats::new());
    let (config, source, store) = open_pipeline(token, store_dir, stats.clone()).await?;

    let (produced, consumed) =
        run_local(&config, source, store, start, end, stats.clone()).await?;
    info!(
        "Stored {} record(s) ({} skipped) in {} page request(s)",
        consumed.records,
        produced.skipped,
        stats.snapshot().pages_requested
    );
    Ok(())
}

async fn run_backfill(
    token: Option<String>,
    start: NaiveDate,
    end: NaiveDate,
    cooldown: Duration,
    store_dir: Option<PathBuf>,
) -> Result<()> {
    let stats = Arc::new(PipelineStats::new());
    let (config, source, store) = open_pipeline(token, store_dir, stats.clone()).await?;

    let summary = backfill(start, end, cooldown, |day| {
        run_local(
            &config,
            Arc::clone(&source),
            Arc::clone(&store),
            day,
            day,
            stats.clone(),
        )
    })
    .await?;

    let snapshot = stats.snapshot();
    info!(
        "Stored {} precipitation and {} temperature record(s)",
        snapshot.precipitation_written, snapshot.temperature_written
    );
    if !summary.is_complete() {
        let days: Vec<String> = summary.failed_days.iter().map(|d| d.to_string()).collect();
        bail!(
            "{} day(s) failed and can be retried: {}",
            days.len(),
            days.join(", ")
        );
    }
    Ok(())
}

async fn query(
    table: Table,
    location: &str,
    date_prefix: Option<&str>,
    parquet: Option<PathBuf>,
    store_dir: Option<PathBuf>,
) -> Result<()> {
    let dir = store_dir_from_env(store_dir)?;
    let store = FileStore::open(&dir)
        .await
        .with_context(|| format!("Failed to open store in {}", dir.display()))?;
    let getter = WeatherGetter::new(Arc::new(store));

    println!("{}", query_header(location, date_prefix));
    let mut records = std::pin::pin!(getter.get(table, location, date_prefix));
    let mut count = 0;
    while let Some(record) = records.try_next().await? {
        println!(
            "({}) - {}: {}",
            record.date,
            record.datatype,
            table.format_value(record.value)
        );
        count += 1;
    }
    if count == 0 {
        println!("No {} readings for '{}'", table, location);
    }

    if let Some(path) = parquet {
        let rows = getter
            .series(table, location, date_prefix)
            .await?
            .with_readings()
            .write_parquet(&path)
            .await?;
        info!("Wrote {} row(s) to {}", rows, path.display());
    }
    Ok(())
}

fn query_header(location: &str, date_prefix: Option<&str>) -> String {
    format!(
        "weather stats for {} ({}):",
        location,
        date_prefix.unwrap_or("all")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_header() {
        assert_eq!(
            query_header("Annapolis, MD US", Some("2021-10")),
            "weather stats for Annapolis, MD US (2021-10):"
        );
        assert_eq!(
            query_header("Annapolis, MD US", None),
            "weather stats for Annapolis, MD US (all):"
        );
    }

    #[test]
    fn test_query_args_parse() {
        let args = Args::try_parse_from([
            "weather_pipeline",
            "query",
            "temperature",
            "Annapolis, MD US",
            "--date",
            "2021-10-01",
        ])
        .unwrap();
        match args.command {
            Command::Query {
                table,
                location,
                date,
                ..
            } => {
                assert_eq!(table, Table::Temperature);
                assert_eq!(location, "Annapolis, MD US");
                assert_eq!(date.as_deref(), Some("2021-10-01"));
            }
            other => panic!("expected query, got {other:?}"),
        }
    }
}
