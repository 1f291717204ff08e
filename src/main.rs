//! Fraud Scoring - Operator CLI
//!
//! Scores transactions, ingests JSON-lines batches with bounded concurrency,
//! and exposes the role-scoped listing and analytics views.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fraud_scoring::config::{AppConfig, LoggingConfig, DEFAULT_CONFIG_PATH};
use fraud_scoring::feature_extractor::FEATURE_HASH_SCHEME;
use fraud_scoring::{
    ListFilter, RawAmount, RawTransaction, RequestContext, Role, ScoredTransaction,
    ScoringPipeline, SqliteStore, Transaction, TransactionStore,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "fraud-scoring")]
#[command(version, about = "Score financial transactions for fraud and inspect the results")]
struct Cli {
    /// Configuration file (TOML); missing files fall back to defaults
    #[arg(long, global = true, env = "FRAUD_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Caller identity for store access control
    #[arg(long, global = true, env = "FRAUD_USER_ID", default_value = "local")]
    user_id: String,

    /// Caller role
    #[arg(long, global = true, value_enum, default_value_t = RoleArg::User)]
    role: RoleArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum RoleArg {
    User,
    Admin,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::User => Role::User,
            RoleArg::Admin => Role::Admin,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score a single transaction and store the result
    Score {
        #[arg(long)]
        amount: String,
        #[arg(long, default_value = "")]
        merchant: String,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        location: String,
        #[arg(long, default_value = "")]
        card_type: String,
        /// Print the verdict without persisting it
        #[arg(long)]
        dry_run: bool,
    },

    /// Score and store every transaction in a JSON-lines file
    Ingest {
        /// One raw transaction object per line
        input: PathBuf,
    },

    /// List stored transactions, newest first
    List {
        /// Restrict to one owner (admins only for other users)
        #[arg(long)]
        owner: Option<String>,
    },

    /// Aggregate fraud statistics (admin only)
    Report,
}

#[derive(Serialize)]
struct ScoreOutput<'a> {
    transaction: &'a ScoredTransaction,
    stored: bool,
}

#[derive(Debug, Default, Serialize)]
struct IngestSummary {
    processed: u64,
    flagged: u64,
    invalid: u64,
    store_failures: u64,
}

impl IngestSummary {
    /// Fail when any scored verdict was not persisted
    fn ensure_stored(&self) -> Result<()> {
        if self.store_failures > 0 {
            anyhow::bail!(
                "{} of {} verdicts were computed but not stored",
                self.store_failures,
                self.processed
            );
        }
        Ok(())
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("fraud_scoring={}", logging.level).parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from_path(&cli.config)?;
    init_tracing(&config.logging)?;
    info!(
        config = %cli.config.display(),
        threshold = config.detection.threshold,
        time_basis = ?config.features.time_basis,
        "Configuration loaded"
    );

    let ctx = RequestContext {
        user_id: cli.user_id.clone(),
        role: cli.role.into(),
    };

    match cli.command {
        Commands::Score {
            amount,
            merchant,
            category,
            description,
            location,
            card_type,
            dry_run,
        } => {
            let raw = RawTransaction {
                amount: Some(RawAmount::Text(amount)),
                merchant,
                category,
                description,
                location,
                card_type,
            };
            score_one(&config, &ctx, raw, dry_run)
        }
        Commands::Ingest { input } => ingest_file(&config, ctx, input).await,
        Commands::List { owner } => {
            let store = SqliteStore::open(&config.store.path)?;
            let filter = owner.map(ListFilter::ByUser).unwrap_or(ListFilter::All);
            let transactions = store.list(&ctx, &filter)?;
            println!("{}", serde_json::to_string_pretty(&transactions)?);
            Ok(())
        }
        Commands::Report => {
            let store = SqliteStore::open(&config.store.path)?;
            let report = store.fraud_report(&ctx)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

fn score_one(
    config: &AppConfig,
    ctx: &RequestContext,
    raw: RawTransaction,
    dry_run: bool,
) -> Result<()> {
    let pipeline = ScoringPipeline::from_config(config);

    if dry_run {
        let tx = Transaction::from_raw(raw, &ctx.user_id, chrono::Utc::now())?;
        let verdict = pipeline.analyze(&tx)?;
        let scored = ScoredTransaction::new(tx, verdict);
        let output = ScoreOutput {
            transaction: &scored,
            stored: false,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let store = SqliteStore::open(&config.store.path)?;
    let report = pipeline.ingest(ctx, raw, &store)?;
    let output = ScoreOutput {
        transaction: &report.scored,
        stored: report.stored.is_ok(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    report
        .stored
        .context("Verdict computed but the transaction was not stored")
}

async fn ingest_file(config: &AppConfig, ctx: RequestContext, input: PathBuf) -> Result<()> {
    let contents = tokio::fs::read_to_string(&input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let pipeline = Arc::new(ScoringPipeline::from_config(config));
    let store = Arc::new(SqliteStore::open(&config.store.path)?);
    let ctx = Arc::new(ctx);

    let num_workers = config.pipeline.workers;
    let model_info = pipeline.adapter().model_info();
    info!(
        input = %input.display(),
        workers = num_workers,
        model_state = ?pipeline.state(),
        model = model_info.map(|m| m.name.as_str()).unwrap_or("none"),
        model_path = model_info.and_then(|m| m.path.as_deref()).unwrap_or("-"),
        model_loaded_at = ?model_info.map(|m| m.loaded_at),
        feature_hash = FEATURE_HASH_SCHEME,
        "Starting batch ingest"
    );

    // Semaphore to limit concurrent scoring
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let mut tasks = JoinSet::new();
    let mut summary = IngestSummary::default();

    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let raw: RawTransaction = match serde_json::from_str(line) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(line = line_no + 1, error = %e, "Failed to deserialize transaction");
                summary.invalid += 1;
                continue;
            }
        };

        let permit = semaphore.clone().acquire_owned().await?;
        let pipeline = pipeline.clone();
        let store = store.clone();
        let ctx = ctx.clone();

        tasks.spawn_blocking(move || {
            let result = pipeline.ingest(&ctx, raw, store.as_ref());
            drop(permit);
            (line_no + 1, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (line, result) = joined.context("Scoring task panicked")?;
        match result {
            Ok(report) => {
                summary.processed += 1;
                if report.scored.verdict.is_fraud {
                    summary.flagged += 1;
                }
                if report.stored.is_err() {
                    summary.store_failures += 1;
                }
            }
            Err(e) => {
                warn!(line = line, error = %e, "Transaction rejected");
                summary.invalid += 1;
            }
        }
    }

    pipeline.metrics().print_summary();
    println!("{}", serde_json::to_string_pretty(&summary)?);

    summary.ensure_stored()
}
