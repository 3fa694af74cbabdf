use anyhow::{Context, Result};
use clap::Parser;
use riskrouter::{
    clock::system_clock,
    config::{self, CONFIG_FILE_PATH},
    logger::{self, LogLevel, LogTag},
    pipeline::RiskPipeline,
    replay,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "riskrouter")]
#[command(about = "Decision routing and risk-tilt core", long_about = None)]
struct Args {
    /// Configuration file (TOML); defaults apply when it does not exist
    #[arg(short, long, default_value = CONFIG_FILE_PATH)]
    config: PathBuf,

    /// Load and validate the configuration, build every service, then exit
    #[arg(long)]
    check_config: bool,

    /// Replay ticks from a CSV file and print statistics as JSON
    #[arg(long, value_name = "CSV")]
    replay: Option<PathBuf>,

    /// Enable debug output for tags (comma separated, or `all`)
    #[arg(long, value_delimiter = ',')]
    debug: Vec<String>,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = config::load_config_from_path(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    let mut logger_config = config.logging.to_logger_config().with_debug_keys(&args.debug);
    if args.verbose {
        logger_config.min_level = LogLevel::Verbose;
    }
    logger::init(logger_config);
    logger::info(
        LogTag::System,
        &format!("riskrouter starting (config {})", args.config.display()),
    );

    if args.check_config {
        RiskPipeline::from_config(&config, system_clock(), Vec::new())
            .context("service construction failed")?;
        logger::info(LogTag::Config, "Configuration is valid");
        println!("{}", serde_json::to_string_pretty(&config)?);
        logger::flush();
        return Ok(());
    }

    let Some(path) = args.replay else {
        logger::warning(
            LogTag::System,
            "Nothing to do: pass --replay <csv> or --check-config",
        );
        logger::flush();
        return Ok(());
    };

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let ticks = replay::parse_ticks(&content)?;
    let summary = replay::run_replay(&config, &ticks).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    logger::flush();
    Ok(())
}
