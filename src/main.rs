use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use bib_monitor::{
    api::DashboardClient,
    config::{AppConfig, StoreBackend},
    db::Database,
    export,
    forecast::{DailyForecast, Forecaster},
    slot::{LAST_SLOT, SLOTS_PER_DAY, slot_to_time},
    traits::{Clock, SampleStore, SystemClock},
};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "bib-monitor")]
#[command(about = "Library seat occupancy forecasts")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Forecast occupancy of every location for one day
    Predict {
        /// Target date (YYYY-MM-DD)
        date: String,
        /// First slot to include
        #[arg(long, default_value_t = 0)]
        start_slot: u32,
        /// Last slot to include
        #[arg(long, default_value_t = LAST_SLOT)]
        end_slot: u32,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Override the configured sample store
        #[arg(long, value_enum)]
        store: Option<StoreArg>,
    },
    /// Print the slot table
    Slots,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StoreArg {
    Postgres,
    Http,
}

impl From<StoreArg> for StoreBackend {
    fn from(arg: StoreArg) -> Self {
        match arg {
            StoreArg::Postgres => StoreBackend::Postgres,
            StoreArg::Http => StoreBackend::Http,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays machine readable
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .parse_lossy("bib_monitor=debug");

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match args.command {
        Command::Slots => {
            print_slots();
            Ok(())
        }
        Command::Predict {
            date,
            start_slot,
            end_slot,
            format,
            output,
            store,
        } => {
            let config = AppConfig::load().context("Failed to load configuration")?;
            let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

            let backend = store.map(StoreBackend::from).unwrap_or(config.store.backend);
            let forecast = rt.block_on(async {
                match backend {
                    StoreBackend::Postgres => {
                        let url = config.database.url.as_deref().context(
                            "DATABASE_URL is not set; use --store http or configure database.url",
                        )?;
                        tracing::info!("Connecting to database...");
                        let database = Database::new(url).await?;
                        tracing::info!("Database connected successfully");
                        predict(database, &config, &date, start_slot, end_slot).await
                    }
                    StoreBackend::Http => {
                        let client = DashboardClient::new(
                            config.network.base_url.clone(),
                            &config.network,
                        )?;
                        tracing::info!("Using dashboard at {}", config.network.base_url);
                        predict(client, &config, &date, start_slot, end_slot).await
                    }
                }
            })?;

            write_output(&forecast, format, output)
        }
    }
}

async fn predict<S: SampleStore>(
    store: S,
    config: &AppConfig,
    date: &str,
    start_slot: u32,
    end_slot: u32,
) -> Result<DailyForecast> {
    let forecaster = Forecaster::new(store, SystemClock, config.forecast.clone())?
        .with_fetch_timeout(Duration::from_secs(config.store.fetch_timeout_secs));

    let forecast = forecaster.forecast(date, start_slot, end_slot).await?;
    if forecast.degraded {
        tracing::warn!("Forecast for {} is empty, the sample store could not be used", date);
    } else {
        tracing::info!(
            "Forecast for {} ready ({} locations)",
            date,
            forecast.occupancy.len()
        );
    }
    Ok(forecast)
}

fn write_output(
    forecast: &DailyForecast,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    match (format, output) {
        (OutputFormat::Json, None) => {
            let json = serde_json::to_string_pretty(forecast)?;
            println!("{}", json);
        }
        (OutputFormat::Json, Some(path)) => {
            let file = std::fs::File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            serde_json::to_writer_pretty(file, forecast)?;
            tracing::info!("Saved to {}", path.display());
        }
        (OutputFormat::Csv, None) => export::write_csv(forecast, std::io::stdout().lock())?,
        (OutputFormat::Csv, Some(path)) => {
            let path = if path.is_dir() {
                path.join(
                    export::default_export_path(&forecast.date, SystemClock.now_utc())
                        .file_name()
                        .unwrap_or_default(),
                )
            } else {
                path
            };
            export::write_csv_file(forecast, &path)?;
            tracing::info!("Saved to {}", path.display());
        }
    }
    Ok(())
}

fn print_slots() {
    for slot in 0..SLOTS_PER_DAY {
        println!("{:>3}  {}", slot, slot_to_time(slot));
    }
}
