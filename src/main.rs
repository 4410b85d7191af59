use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{debug, info};

use pmo_agent::batch::{assemble, load_projects, BatchResult, FailurePolicy};
use pmo_agent::config::{get_config_path, init::write_default_config, load_config, Config};
use pmo_agent::fetch::{fetch_all_history, fetch_analysis, fetch_batch};
use pmo_agent::history::HistoryKind;
use pmo_agent::ingest::{self, IngestedAnalysis};
use pmo_agent::output;
use pmo_agent::scoring::{PriorityRequest, Scorer};
use pmo_agent::service::{clear_cache, get_cache_path, DetailCache, ServiceClient};
use pmo_agent::{ContractError, ErrorKind};

const EXIT_SUCCESS: i32 = 0;
const EXIT_FAILURE: i32 = 1;
const EXIT_NETWORK: i32 = 2;
const EXIT_CONFIG: i32 = 4;
const EXIT_INVALID: i32 = 5;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RankFormat {
    Text,
    Tsv,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score a single project locally
    Score {
        #[arg(long)]
        roi: f64,
        #[arg(long)]
        urgency: f64,
        #[arg(long)]
        risk: f64,
        #[arg(long, default_value_t = 50.0)]
        strategic_alignment: f64,
        #[arg(long, default_value_t = 50.0)]
        resource_availability: f64,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Score and rank every project in a CSV, JSON or YAML file
    Rank {
        file: PathBuf,
        /// What to do with invalid projects (overrides batch.on_invalid)
        #[arg(long, value_enum)]
        on_invalid: Option<FailurePolicy>,
        #[arg(long, value_enum, default_value_t = RankFormat::Text)]
        format: RankFormat,
        /// Also save the ranking as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a saved analysis or batch response and print it
    Check {
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Cross-check a spreadsheet against a slide deck on the service
    Analyze {
        spreadsheet: PathBuf,
        deck: PathBuf,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Upload a project spreadsheet for batch prioritization on the service
    Upload {
        spreadsheet: PathBuf,
        #[arg(long, value_enum, default_value_t = RankFormat::Text)]
        format: RankFormat,
    },
    /// List recent cross-checks and batch prioritizations
    History {
        /// Records per listing (defaults to service.history_limit)
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// Show the stored result of one history record
    Show {
        #[arg(value_enum)]
        kind: HistoryKind,
        id: u64,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Print the configured priority tiers
    Tiers,
    /// Write a starter config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
    /// Manage the history detail cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// Delete all cached history details
    Clear,
}

#[derive(Parser, Debug)]
#[command(name = "pmo-agent")]
#[command(about = "Project prioritization and document cross-check CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (defaults to ~/.config/pmo-agent/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Bypass the history detail cache
    #[arg(long, global = true)]
    no_cache: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // These two work without a valid config
    match &cli.command {
        Commands::Init { force } => {
            let path = cli.config.clone().unwrap_or_else(get_config_path);
            match write_default_config(&path, *force) {
                Ok(()) => {
                    println!("Config written to {}", path.display());
                    std::process::exit(EXIT_SUCCESS);
                }
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    std::process::exit(EXIT_CONFIG);
                }
            }
        }
        Commands::Cache {
            action: CacheCommand::Clear,
        } => match clear_cache(&get_cache_path()) {
            Ok(()) => {
                println!("Cache cleared");
                std::process::exit(EXIT_SUCCESS);
            }
            Err(e) => {
                eprintln!("Error: {:#}", e);
                std::process::exit(EXIT_FAILURE);
            }
        },
        _ => {}
    }

    let config = match load_config(cli.config.clone()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    if let Err(e) = pmo_agent::telemetry::init(config.effective_log_level(), cli.verbose) {
        eprintln!("Config error: {:#}", e);
        std::process::exit(EXIT_CONFIG);
    }

    // Validate scoring config at startup
    let scorer = match Scorer::new(&config.scoring) {
        Ok(s) => s,
        Err(ContractError::Configuration(errors)) => {
            eprintln!("Scoring config errors:");
            for error in errors {
                eprintln!("  - {}", error);
            }
            std::process::exit(EXIT_CONFIG);
        }
        Err(e) => {
            eprintln!("Scoring config error: {}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    if let Err(e) = run(cli, &config, &scorer).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(exit_code(&e));
    }
    std::process::exit(EXIT_SUCCESS);
}

/// Map an error to an exit code by the contract error somewhere in its chain.
fn exit_code(err: &anyhow::Error) -> i32 {
    let kind = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<ContractError>())
        .map(ContractError::kind);
    match kind {
        Some(ErrorKind::Transport) => EXIT_NETWORK,
        Some(ErrorKind::Configuration) => EXIT_CONFIG,
        Some(ErrorKind::Range) | Some(ErrorKind::Validation) => EXIT_INVALID,
        None => EXIT_FAILURE,
    }
}

async fn run(cli: Cli, config: &Config, scorer: &Scorer) -> Result<()> {
    let use_colors = output::should_use_colors();

    match cli.command {
        Commands::Score {
            roi,
            urgency,
            risk,
            strategic_alignment,
            resource_availability,
            format,
        } => {
            let request = PriorityRequest {
                roi,
                urgency,
                risk,
                strategic_alignment,
                resource_availability,
            };
            let result = scorer.score_request(&request)?;
            match format {
                Format::Text => println!("{}", output::format_priority_detail(&result, use_colors)),
                Format::Json => println!("{}", output::to_json(&result)?),
            }
        }

        Commands::Rank {
            file,
            on_invalid,
            format,
            output: output_path,
        } => {
            let policy = on_invalid.or(config.on_invalid()).ok_or_else(|| {
                ContractError::Configuration(vec![
                    "no failure policy: pass --on-invalid abort|skip or set batch.on_invalid"
                        .to_string(),
                ])
            })?;
            let projects = load_projects(&file)?;
            let batch = assemble(&projects, scorer, policy)
                .with_context(|| format!("Failed to rank projects from {}", file.display()))?;

            if !batch.skipped.is_empty() {
                eprintln!("{}", output::format_skipped(&batch.skipped));
            }
            print_batch(&batch, format, use_colors)?;

            if let Some(path) = output_path {
                output::write_json(&path, &batch)?;
                info!(path = %path.display(), "saved ranking");
            }
        }

        Commands::Check { file, format } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let value: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON in {}", file.display()))?;

            if value.get("results").is_some() {
                debug!("checking batch result");
                let batch = ingest::batch_result(&value, scorer.tiers())?;
                let rank_format = match format {
                    Format::Text => RankFormat::Text,
                    Format::Json => RankFormat::Json,
                };
                print_batch(&batch, rank_format, use_colors)?;
            } else {
                debug!("checking analysis result");
                let ingested = ingest::analysis_result(&value, &config.validator)?;
                print_analysis(&ingested, format, use_colors)?;
            }
        }

        Commands::Analyze {
            spreadsheet,
            deck,
            format,
        } => {
            let client = ServiceClient::new(&config.service)?;
            let value = client.analyze(&spreadsheet, &deck).await?;
            let ingested = ingest::analysis_result(&value, &config.validator)?;
            print_analysis(&ingested, format, use_colors)?;
        }

        Commands::Upload {
            spreadsheet,
            format,
        } => {
            let client = ServiceClient::new(&config.service)?;
            let value = client.prioritize_batch(&spreadsheet).await?;
            let batch = ingest::batch_result(&value, scorer.tiers())?;
            print_batch(&batch, format, use_colors)?;
        }

        Commands::History { limit } => {
            let client = ServiceClient::new(&config.service)?;
            let limit = limit.unwrap_or_else(|| config.service.effective_history_limit());
            let overview = fetch_all_history(&client, limit).await?;

            for (kind, reason) in &overview.failures {
                eprintln!("Could not fetch {} history: {}", kind, reason);
            }
            for (kind, rejected) in &overview.rejected {
                eprintln!("{} {}", kind, output::format_rejected(std::slice::from_ref(rejected)));
            }
            println!(
                "{}",
                output::format_history(&overview.records, chrono::Utc::now(), use_colors)
            );
        }

        Commands::Show { kind, id, format } => {
            let client = ServiceClient::new(&config.service)?;
            let cache = if cli.no_cache {
                DetailCache::disabled()
            } else {
                DetailCache::new(get_cache_path(), true)
            };
            match kind {
                HistoryKind::CrossCheck => {
                    let ingested = fetch_analysis(&client, &cache, id, &config.validator).await?;
                    print_analysis(&ingested, format, use_colors)?;
                }
                HistoryKind::Batch => {
                    let batch = fetch_batch(&client, &cache, id, scorer.tiers()).await?;
                    let rank_format = match format {
                        Format::Text => RankFormat::Text,
                        Format::Json => RankFormat::Json,
                    };
                    print_batch(&batch, rank_format, use_colors)?;
                }
            }
        }

        Commands::Tiers => {
            println!("{}", output::format_tiers(scorer.tiers(), use_colors));
        }

        // Handled before the config is loaded
        Commands::Init { .. } | Commands::Cache { .. } => {}
    }

    Ok(())
}

fn print_batch(batch: &BatchResult, format: RankFormat, use_colors: bool) -> Result<()> {
    match format {
        RankFormat::Text => println!("{}", output::format_ranked_table(batch, use_colors)),
        RankFormat::Tsv => {
            let tsv = output::format_ranked_tsv(batch);
            if !tsv.is_empty() {
                println!("{}", tsv);
            }
        }
        RankFormat::Json => println!("{}", output::to_json(batch)?),
    }
    Ok(())
}

fn print_analysis(ingested: &IngestedAnalysis, format: Format, use_colors: bool) -> Result<()> {
    if !ingested.rejected.is_empty() {
        eprintln!("{}", output::format_rejected(&ingested.rejected));
    }
    match format {
        Format::Text => println!("{}", output::format_analysis(&ingested.result, use_colors)),
        Format::Json => println!("{}", output::to_json(&ingested.result)?),
    }
    Ok(())
}
