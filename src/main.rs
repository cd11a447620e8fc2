use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;

use resume_trust::config::AppConfig;
use resume_trust::db::{self, MemoryStore, PgStore, VerificationStore};
use resume_trust::intelligence::ModelArtifact;
use resume_trust::ledger::{HttpLedger, InMemoryLedger, LedgerAnchor, LedgerAuth, LedgerBackend};
use resume_trust::models::Claim;
use resume_trust::services::{JobStatus, JobTracker};
use resume_trust::sources::http_client;
use resume_trust::verification::SourceRegistry;
use resume_trust::VerificationPipeline;

#[derive(Debug, Parser)]
#[command(name = "resume-trust", version, about = "Verify resume claims and score their trustworthiness")]
struct Cli {
    /// Print the Prometheus scrape payload to stderr when done.
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Verify the claims in a JSON file and print the report.
    Verify {
        path: PathBuf,
        /// Required when the file is a bare claim list and claims disagree.
        #[arg(long)]
        resume_id: Option<String>,
    },
    /// Print the latest explanation stored for a claim.
    Explanation { claim_id: String },
    /// Print the latest ledger record stored for a resume.
    Ledger { resume_id: String },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClaimsFile {
    Resume { resume_id: String, claims: Vec<Claim> },
    List(Vec<Claim>),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    init_tracing(config.log_json);

    let metrics_handle = if cli.metrics {
        Some(resume_trust::metrics::init_metrics()?)
    } else {
        None
    };

    let model = ModelArtifact::load(&config.model_path)
        .with_context(|| format!("cannot start without model artifact {}", config.model_path))?;

    let store: Arc<dyn VerificationStore> = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let pool = db::init_pool(url).await?;
            tracing::info!("Database connected");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::info!("DATABASE_URL not set, results kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let backend: Arc<dyn LedgerBackend> = match &config.ledger_url {
        Some(url) => {
            let auth = match (&config.ledger_api_key, &config.ledger_api_secret) {
                (Some(key), Some(secret)) => Some(LedgerAuth::new(key.clone(), secret.clone())),
                _ => {
                    tracing::warn!("No register credentials, submissions will be unsigned");
                    None
                }
            };
            Arc::new(HttpLedger::new(http_client(config.per_source_timeout()), url, auth))
        }
        None => Arc::new(InMemoryLedger::new()),
    };
    let anchor = LedgerAnchor::new(backend, config.anchor());

    let pipeline = Arc::new(VerificationPipeline::new(
        SourceRegistry::from_config(&config),
        Arc::new(model),
        store,
        anchor,
        config.pipeline(),
    ));

    let outcome = run(cli.command, pipeline).await;

    if let Some(handle) = metrics_handle {
        eprintln!("{}", handle.render());
    }
    outcome
}

async fn run(command: Command, pipeline: Arc<VerificationPipeline>) -> anyhow::Result<()> {
    match command {
        Command::Verify { path, resume_id } => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let (resume_id, claims) = match serde_json::from_str::<ClaimsFile>(&raw)? {
                ClaimsFile::Resume { resume_id, claims } => (resume_id, claims),
                ClaimsFile::List(claims) => {
                    let resume_id = resume_id
                        .or_else(|| claims.first().map(|c| c.resume_id.clone()))
                        .context("empty claim list and no --resume-id")?;
                    (resume_id, claims)
                }
            };

            let tracker = JobTracker::new(pipeline);
            let mut handle = tracker.submit(resume_id, claims).await;
            let state = handle.wait_terminal().await?;
            match (state.status, state.report) {
                (JobStatus::Completed | JobStatus::Partial, Some(report)) => {
                    println!("{}", serde_json::to_string_pretty(report.as_ref())?);
                    Ok(())
                }
                _ => anyhow::bail!(
                    "verification failed: {}",
                    state.error.unwrap_or_else(|| "unknown error".into())
                ),
            }
        }
        Command::Explanation { claim_id } => {
            let explanation = pipeline.get_explanation(&claim_id).await?;
            if explanation.is_none() {
                tracing::warn!(claim_id = %claim_id, "No explanation stored for claim");
            }
            println!("{}", serde_json::to_string_pretty(&explanation)?);
            Ok(())
        }
        Command::Ledger { resume_id } => {
            let record = pipeline.get_ledger_record(&resume_id).await?;
            if record.is_none() {
                tracing::warn!(resume_id = %resume_id, "No ledger record stored for resume");
            }
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}
