use clap::Parser;
use propscout_core::{ExportFormat, FilterConfig, RuntimeConfig, RuntimeConfigOverrides, ScrapingMode};
use propscout_scraper::run_session;
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use tracing::{error, info, Level};

/// Resilient large-scale real-estate listing scraper (spec §6 CLI surface).
/// Flags mirror the external collaborator contract: city, mode, max-pages,
/// individual-pages toggle, force-rescrape toggle, export-format set,
/// headless toggle, output directory.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// City to scrape (e.g. "gurgaon", "new-delhi")
    #[arg(short, long)]
    city: String,

    /// Scraping mode: FULL, INCREMENTAL, CONSERVATIVE, DATE_RANGE, CUSTOM
    /// (case-insensitive, spec §6)
    #[arg(short, long, default_value = "FULL")]
    mode: String,

    /// Maximum number of listing pages to traverse
    #[arg(long, default_value_t = 5)]
    max_pages: u32,

    /// Visit each property's detail page for richer fields
    #[arg(long, default_value_t = false)]
    individual_pages: bool,

    /// Skip smart-filter and re-scrape every PDP URL unconditionally
    #[arg(long, default_value_t = false)]
    force_rescrape: bool,

    /// Export formats to write, comma-separated: csv,json,spreadsheet
    #[arg(long, value_delimiter = ',', default_value = "csv,json")]
    export_format: Vec<String>,

    /// Run the browser headless (falls back to $HEADLESS, default true)
    #[arg(long)]
    headless: Option<bool>,

    /// Output directory for export files (falls back to $OUTPUT_DIR)
    #[arg(short, long)]
    output_dir: Option<String>,

    /// Path to the incremental tracker's sqlite store; omit to disable tracking
    #[arg(long)]
    tracker_db: Option<PathBuf>,

    /// PDP batch size
    #[arg(long)]
    batch_size: Option<usize>,

    /// Number of concurrent PDP workers
    #[arg(long)]
    concurrency: Option<usize>,

    /// Minimum stored quality score (0-100) below which a URL is re-scraped
    #[arg(long)]
    quality_threshold: Option<f64>,

    /// Tracker freshness window in days
    #[arg(long)]
    ttl_days: Option<i64>,

    /// Minimum price filter, in lac
    #[arg(long)]
    price_min_lac: Option<f64>,

    /// Maximum price filter, in lac
    #[arg(long)]
    price_max_lac: Option<f64>,

    /// Allow-listed property types (substring match, case-insensitive)
    #[arg(long, value_delimiter = ',')]
    property_types: Vec<String>,

    /// Deny-listed keywords (substring match over title + description)
    #[arg(long, value_delimiter = ',')]
    exclude_keywords: Vec<String>,
}

fn build_runtime_config(cli: &Cli) -> Result<RuntimeConfig, String> {
    let mut export_formats: HashSet<ExportFormat> = HashSet::new();
    for raw in &cli.export_format {
        export_formats.insert(ExportFormat::from_str(raw).map_err(|e| format!("invalid --export-format: {e}"))?);
    }

    let headless = cli.headless.or_else(|| {
        std::env::var("HEADLESS").ok().map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
    });
    let browser_binary_path = std::env::var("BROWSER_BINARY_PATH").ok();
    let output_dir = cli.output_dir.clone().or_else(|| std::env::var("OUTPUT_DIR").ok());

    let overrides = RuntimeConfigOverrides {
        pdp_batch_size: cli.batch_size,
        pdp_concurrency: cli.concurrency,
        quality_threshold: cli.quality_threshold,
        ttl_days: cli.ttl_days,
        individual_pages: Some(cli.individual_pages),
        force_rescrape: Some(cli.force_rescrape),
        headless,
        export_formats: if export_formats.is_empty() { None } else { Some(export_formats) },
        output_dir,
        browser_binary_path,
    };

    Ok(RuntimeConfig::default().merge(overrides))
}

fn build_filter_config(cli: &Cli) -> FilterConfig {
    FilterConfig {
        price_min_lac: cli.price_min_lac,
        price_max_lac: cli.price_max_lac,
        area_min_sqft: None,
        area_max_sqft: None,
        property_types: cli.property_types.clone(),
        bhk_values: Vec::new(),
        localities: Vec::new(),
        exclude_keywords: cli.exclude_keywords.clone(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let cli = Cli::parse();

    let mode = match ScrapingMode::from_str(&cli.mode) {
        Ok(m) => m,
        Err(e) => {
            error!(error = %e, "configuration error: unrecognized scraping mode");
            return ExitCode::from(1);
        }
    };

    let config = match build_runtime_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "configuration error");
            return ExitCode::from(1);
        }
    };

    let filters = build_filter_config(&cli);
    let tracker_path = cli.tracker_db.clone();

    info!(city = %cli.city, ?mode, max_pages = cli.max_pages, "propscout: starting run");

    match run_session(&cli.city, mode, cli.max_pages, config, filters, tracker_path, None).await {
        Ok(outcome) => {
            info!(
                properties_saved = outcome.stats.properties_saved,
                incremental_stopped = outcome.stats.incremental_stopped,
                export_paths = ?outcome.export_paths,
                "propscout: run complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "propscout: runtime failure");
            ExitCode::from(2)
        }
    }
}
