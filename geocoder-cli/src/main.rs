//! `geocoder`: a batch Japanese address geocoder CLI. Two subcommands —
//! `download` fetches a CKAN package's reference data into `--data-dir`;
//! `geocode` resolves addresses from `--source` against it.

mod ckan;
mod commands;
mod config;
mod formatter;
mod progress;
mod store;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::geocode::{GeocodeOptions, OutputFormat};
use config::GeocoderConfig;
use formatter::Column;
use geocoder_core::GeocoderErrorKind;

const DEFAULT_CKAN_BASE_URL: &str = "https://catalog.registries.digital.go.jp";

#[derive(Parser)]
#[command(name = "geocoder", version, about = "Batch Japanese address geocoder")]
struct Cli {
    /// Directory holding the reference store and downloaded data.
    #[arg(long, global = true, default_value = "./data")]
    data_dir: PathBuf,

    /// Optional TOML file layered over the CLI-derived defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for cached download payloads (defaults to no caching).
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch a CKAN package's resources into `--data-dir`.
    Download {
        /// The CKAN resource id whose package is fetched.
        #[arg(long)]
        resource_id: String,

        /// Base URL of the CKAN instance.
        #[arg(long, default_value = DEFAULT_CKAN_BASE_URL)]
        ckan_base_url: String,

        /// Maximum in-flight download tasks.
        #[arg(long, default_value_t = 4)]
        worker_pool_size: usize,
    },
    /// Resolve addresses read from `--source` against the reference store.
    Geocode {
        /// Input file, or `-` for stdin. One address per line; blank lines
        /// and lines starting with `#` or `//` are skipped.
        #[arg(long, default_value = "-")]
        source: String,

        /// Output format.
        #[arg(long, value_enum, default_value = "csv")]
        format: FormatArg,

        /// Comma-separated column subset for CSV output (default: all).
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Suppress the CSV header row.
        #[arg(long)]
        no_header: bool,

        /// One wildcard character that may substitute for any single
        /// character of the target during trie lookups.
        #[arg(long)]
        fuzzy: Option<char>,

        /// Print per-stage timing after the results.
        #[arg(long)]
        stats: bool,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum FormatArg {
    Csv,
    Json,
    Ndjson,
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Ndjson => OutputFormat::Ndjson,
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    if let Err(err) = run().await {
        log::error!("{err}");
        std::process::exit(1);
    }
}

async fn run() -> geocoder_core::GeocoderResult<()> {
    let cli = Cli::parse();

    let mut config = GeocoderConfig::new(cli.data_dir.clone());
    config.cache_dir = cli.cache_dir.clone();
    if let Some(path) = &cli.config {
        config = GeocoderConfig::load_toml(path, config)?;
    }

    match cli.command {
        Command::Download {
            resource_id,
            ckan_base_url,
            worker_pool_size,
        } => {
            config.resource_id = Some(resource_id);
            config.worker_pool_size = worker_pool_size;
            commands::download::run(&config, &ckan_base_url).await
        }
        Command::Geocode {
            source,
            format,
            columns,
            no_header,
            fuzzy,
            stats,
        } => {
            config.fuzzy = fuzzy.or(config.fuzzy);
            let columns = parse_columns(&columns)?;
            let opts = GeocodeOptions {
                source,
                format: format.into(),
                columns,
                header: !no_header,
                stats,
            };
            commands::geocode::run(&config, &opts)
        }
    }
}

fn parse_columns(names: &[String]) -> geocoder_core::GeocoderResult<Vec<Column>> {
    if names.is_empty() {
        return Ok(Column::default_columns());
    }
    names
        .iter()
        .map(|name| {
            Column::parse(name)
                .ok_or_else(|| GeocoderErrorKind::Args.with_error(anyhow::anyhow!("unknown column `{name}`")))
        })
        .collect()
}
