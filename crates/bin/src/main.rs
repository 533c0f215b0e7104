//! Capstan CLI binary.
//!
//! Fits CAPM and Fama-French regressions for a stock and clusters a set of
//! stocks on the moments of their daily returns.

use capstan::data::french::{FileFactorSource, HttpFactorSource};
use capstan::data::yahoo::YahooQuoteProvider;
use capstan::data::{DataError, DateRange};
use capstan::models::RegressionResult;
use capstan::output::{
    ClusterSummary, CoefficientExport, ExportFormat, Exporter, FeatureTable, RegressionSummary,
    ReportBuilder,
};
use capstan::pipeline::{
    AnalysisConfig, DEFAULT_CONCURRENCY, DEFAULT_WINDOW_YEARS, PricePanel, cluster_stocks, feature_vectors,
    load_factors, load_price_panel_with, run_capm, run_fama_french,
};
use capstan::stats::{Initialization, elbow};
use capstan::{StaticUniverse, Universe};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "capstan")]
#[command(about = "Capstan: CAPM, Fama-French and return-moment clustering", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log progress (info level unless RUST_LOG is set)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Symbols fetched at once
    #[arg(long, global = true, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the CAPM for a stock against a market proxy
    Capm {
        /// Stock symbol
        symbol: String,

        /// Market proxy symbol
        #[arg(long)]
        market: Option<String>,

        /// Analysis period in years
        #[arg(long)]
        years: Option<u32>,

        /// Last day of the analysis window (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Annual risk-free rate
        #[arg(long)]
        risk_free: Option<f64>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Write coefficients to a .csv or .json file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Fit the Fama-French three-factor model for a stock
    FamaFrench {
        /// Stock symbol
        symbol: String,

        /// Daily factor table: a local CSV path or an http(s) URL
        #[arg(long)]
        factors: String,

        /// Analysis period in years
        #[arg(long)]
        years: Option<u32>,

        /// Last day of the analysis window (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Write coefficients to a .csv or .json file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Cluster stocks on mean, volatility, skewness and kurtosis
    Cluster {
        /// Symbols to cluster (default: ten US large caps)
        symbols: Vec<String>,

        /// Number of clusters
        #[arg(long)]
        k: Option<usize>,

        /// Seed for k-means++ initialization
        #[arg(long)]
        seed: Option<u64>,

        /// Centroid initialization (kmeans++ or farthest)
        #[arg(long)]
        init: Option<Initialization>,

        /// Analysis period in years
        #[arg(long)]
        years: Option<u32>,

        /// Last day of the analysis window (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Also print inertia for k = 2..=MAX_K
        #[arg(long, value_name = "MAX_K")]
        elbow: Option<usize>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Write cluster assignments to a .csv or .json file
        #[arg(long)]
        export: Option<PathBuf>,

        /// Write return moments to a .csv or .json file
        #[arg(long)]
        export_features: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let concurrency = cli.concurrency;

    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::from_json_file(path)?,
        None => AnalysisConfig::default(),
    };

    match cli.command {
        Commands::Capm {
            symbol,
            market,
            years,
            end,
            risk_free,
            format,
            export,
        } => {
            config.window = resolve_window(&config, years, end)?;
            if let Some(market) = market {
                config.market_symbol = market.to_uppercase();
            }
            if let Some(rate) = risk_free {
                config.capm_annual_risk_free = rate;
            }
            capm_command(
                &symbol.to_uppercase(),
                &config,
                concurrency,
                format,
                export.as_deref(),
            )
            .await?;
        }
        Commands::FamaFrench {
            symbol,
            factors,
            years,
            end,
            format,
            export,
        } => {
            config.window = resolve_window(&config, years, end)?;
            fama_french_command(
                &symbol.to_uppercase(),
                &factors,
                &config,
                concurrency,
                format,
                export.as_deref(),
            )
            .await?;
        }
        Commands::Cluster {
            symbols,
            k,
            seed,
            init,
            years,
            end,
            elbow,
            format,
            export,
            export_features,
        } => {
            config.window = resolve_window(&config, years, end)?;
            if let Some(k) = k {
                config.cluster.k = k;
            }
            if let Some(seed) = seed {
                config.cluster.seed = seed;
            }
            if let Some(init) = init {
                config.cluster.init = init;
            }
            let universe = if symbols.is_empty() {
                StaticUniverse::large_caps()
            } else {
                StaticUniverse::new("command line", symbols)
            };
            cluster_command(
                &universe,
                &config,
                concurrency,
                elbow,
                format,
                export.as_deref(),
                export_features.as_deref(),
            )
            .await?;
        }
    }

    Ok(())
}

/// Window from `--years`/`--end` when either is given, else the configured one.
fn resolve_window(
    config: &AnalysisConfig,
    years: Option<u32>,
    end: Option<NaiveDate>,
) -> Result<DateRange, DataError> {
    if years.is_none() && end.is_none() {
        return Ok(config.window);
    }
    DateRange::trailing_years(
        end.unwrap_or_else(|| config.window.end()),
        years.unwrap_or(DEFAULT_WINDOW_YEARS),
    )
}

fn print_banner(title: &str) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║{:^62}║", title);
    println!("╚══════════════════════════════════════════════════════════════╝");
}

async fn fetch_panel(
    symbols: &[String],
    config: &AnalysisConfig,
    concurrency: usize,
) -> Result<PricePanel, Box<dyn std::error::Error>> {
    let provider = YahooQuoteProvider::new()?;

    let pb = ProgressBar::new(symbols.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?,
    );
    pb.set_message("Fetching prices...");

    let result = load_price_panel_with(
        &provider,
        symbols,
        &config.window,
        concurrency,
        |symbol| {
            pb.set_message(format!("Fetched {}", symbol));
            pb.inc(1);
        },
    )
    .await;

    match result {
        Ok(panel) => {
            pb.finish_and_clear();
            Ok(panel)
        }
        Err(e) => {
            pb.finish_with_message("Failed!");
            Err(e.into())
        }
    }
}

fn export_coefficients(
    path: &Path,
    symbol: &str,
    model: &str,
    result: &RegressionResult,
) -> Result<(), Box<dyn std::error::Error>> {
    let records = CoefficientExport::from_result(symbol, model, result);
    records.export_to_file(path, ExportFormat::from_path(path)?)?;
    info!(path = %path.display(), "exported coefficients");
    Ok(())
}

fn print_regression(
    summary: &RegressionSummary,
    window: DateRange,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Text => println!("{}", summary.to_ascii_table()),
        OutputFormat::Json => {
            let report = ReportBuilder::new()
                .subject(summary.symbol.clone())
                .analysis(summary.model.clone())
                .window(window)
                .contents_from(summary)?
                .build()?;
            println!("{}", report.to_json()?);
        }
    }
    Ok(())
}

async fn capm_command(
    symbol: &str,
    config: &AnalysisConfig,
    concurrency: usize,
    format: OutputFormat,
    export: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    if format == OutputFormat::Text {
        print_banner(&format!("CAPM: {} vs {}", symbol, config.market_symbol));
        println!(
            "Window: {} to {}, risk-free {:.2}% p.a.",
            config.window.start(),
            config.window.end(),
            config.capm_annual_risk_free * 100.0
        );
    }

    let symbols = vec![symbol.to_string(), config.market_symbol.clone()];
    let panel = fetch_panel(&symbols, config, concurrency).await?;
    let result = run_capm(
        panel.require(symbol)?,
        panel.require(&config.market_symbol)?,
        config,
    )?;

    if let Some(path) = export {
        export_coefficients(path, symbol, "CAPM", &result)?;
    }
    print_regression(&RegressionSummary::new(symbol, "CAPM", result), config.window, format)
}

async fn fama_french_command(
    symbol: &str,
    factors: &str,
    config: &AnalysisConfig,
    concurrency: usize,
    format: OutputFormat,
    export: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    if format == OutputFormat::Text {
        print_banner(&format!("FAMA-FRENCH 3-FACTOR: {}", symbol));
        println!(
            "Window: {} to {}, factors from {}",
            config.window.start(),
            config.window.end(),
            factors
        );
    }

    let dataset = if factors.starts_with("http://") || factors.starts_with("https://") {
        load_factors(&HttpFactorSource::new(factors)?, &config.window).await?
    } else {
        load_factors(&FileFactorSource::new(factors), &config.window).await?
    };

    let panel = fetch_panel(&[symbol.to_string()], config, concurrency).await?;
    let result = run_fama_french(panel.require(symbol)?, &dataset, config)?;

    if let Some(path) = export {
        export_coefficients(path, symbol, "Fama-French", &result)?;
    }
    print_regression(
        &RegressionSummary::new(symbol, "Fama-French", result),
        config.window,
        format,
    )
}

async fn cluster_command(
    universe: &StaticUniverse,
    config: &AnalysisConfig,
    concurrency: usize,
    elbow_max_k: Option<usize>,
    format: OutputFormat,
    export: Option<&Path>,
    export_features: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let symbols = universe.symbols();
    if format == OutputFormat::Text {
        print_banner(&format!(
            "K-MEANS CLUSTERING: {} STOCKS, k = {}",
            symbols.len(),
            config.cluster.k
        ));
        println!(
            "Window: {} to {}, init {}, seed {}",
            config.window.start(),
            config.window.end(),
            config.cluster.init,
            config.cluster.seed
        );
    }

    let panel = fetch_panel(&symbols, config, concurrency).await?;
    let features = feature_vectors(&panel)?;
    let outcome = cluster_stocks(&features, &config.cluster)?;

    let curve = elbow_max_k
        .map(|max_k| {
            let ks: Vec<usize> = (2..=max_k.min(features.len())).collect();
            elbow(&features, &ks, &config.cluster)
        })
        .transpose()?;

    if let Some(path) = export {
        outcome
            .assignment
            .export_to_file(path, ExportFormat::from_path(path)?)?;
        info!(path = %path.display(), "exported cluster assignments");
    }
    if let Some(path) = export_features {
        features.export_to_file(path, ExportFormat::from_path(path)?)?;
        info!(path = %path.display(), "exported return moments");
    }

    match format {
        OutputFormat::Text => {
            println!("{}", FeatureTable::new(features).to_ascii_table());
            println!("{}", ClusterSummary::new(outcome).to_ascii_table());
            if let Some(curve) = curve {
                println!("Inertia by k:");
                for (k, inertia) in curve {
                    println!("  k = {:>2}: {:.4}", k, inertia);
                }
            }
        }
        OutputFormat::Json => {
            let report = ReportBuilder::new()
                .subject(universe.name())
                .analysis("k-means")
                .window(config.window)
                .contents(json!({
                    "features": features,
                    "clustering": outcome,
                    "elbow": curve,
                }))
                .build()?;
            println!("{}", report.to_json()?);
        }
    }

    Ok(())
}
