use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use vecta_core::{Database, VectaCore};
use vecta_llm::{AnalysisService, HttpTextGenerator};
use vecta_server::config::ServiceConfig;
use vecta_server::logging::init_logging;
use vecta_server::port::find_free_port;
use vecta_server::scheduler::LearningScheduler;
use vecta_server::{router, AppState};

#[derive(Parser)]
#[command(name = "vecta-server")]
#[command(about = "Clinical LLM analysis service with expert validation and few-shot learning")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service (default)
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not start the background learning scheduler
        #[arg(long)]
        no_learning: bool,
    },
    /// Run one learning cycle and print the report
    Learn,
    /// Print validation statistics and improvement metrics
    Metrics,
    /// Create the validation database and data directory
    InitDb,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = ServiceConfig::load(cli.config.as_deref()).context("loading configuration")?;
    init_logging(&config.log_level, config.log_format);

    match cli.command.unwrap_or(Command::Serve {
        port: None,
        no_learning: false,
    }) {
        Command::Serve { port, no_learning } => {
            if let Some(port) = port {
                config.service_port = port;
                config.port_range_end = config.port_range_end.max(port);
            }
            if no_learning {
                config.learning.enabled = false;
            }
            serve(config).await
        }
        Command::Learn => {
            let core = open_core(&config)?;
            let report = tokio::task::spawn_blocking(move || core.run_learning_cycle()).await??;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Metrics => {
            let core = open_core(&config)?;
            let metrics = serde_json::json!({
                "validation": core.validation_stats()?,
                "improvement": core.improvement_metrics()?,
                "library": core.library_statistics()?,
                "rag": core.rag_stats()?,
            });
            println!("{}", serde_json::to_string_pretty(&metrics)?);
            Ok(())
        }
        Command::InitDb => {
            ensure_dirs(&config)?;
            Database::open(&config.db_path)
                .with_context(|| format!("initialising {}", config.db_path.display()))?;
            info!(path = %config.db_path.display(), "Validation database ready");
            Ok(())
        }
    }
}

async fn serve(config: ServiceConfig) -> anyhow::Result<()> {
    let core = open_core(&config)?;
    let generator = HttpTextGenerator::new(&config.model_endpoint, config.request_timeout())
        .context("building model client")?;
    let service = AnalysisService::new(Arc::new(generator), Arc::clone(&core), config.service_settings());

    let health = service.health().await;
    if health.model_loaded {
        info!(model = %config.model_name, endpoint = %config.model_endpoint, "Model endpoint reachable");
    } else {
        warn!(
            endpoint = %config.model_endpoint,
            error = health.load_error.as_deref().unwrap_or("unknown"),
            "Model endpoint not reachable yet, requests will fail until it is up"
        );
    }

    let scheduler = config
        .learning
        .enabled
        .then(|| LearningScheduler::new(Arc::clone(&core), config.learning.clone()).spawn());

    let port = find_free_port(&config.service_host, config.service_port, config.port_range_end);
    let addr = format!("{}:{}", config.service_host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(
        addr = %addr,
        max_concurrent = config.max_concurrent_users,
        sample_rate = config.sample_rate,
        "Vecta AI service listening"
    );

    let app = router(AppState::new(service, config));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(handle) = scheduler {
        handle.abort();
    }
    info!("Vecta AI service stopped");
    Ok(())
}

fn open_core(config: &ServiceConfig) -> anyhow::Result<Arc<VectaCore>> {
    ensure_dirs(config)?;
    let core = VectaCore::open(&config.data_dir, &config.db_path)
        .with_context(|| format!("opening store at {}", config.db_path.display()))?;
    Ok(Arc::new(core))
}

fn ensure_dirs(config: &ServiceConfig) -> anyhow::Result<()> {
    create_dir(&config.data_dir)?;
    if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir(parent)?;
    }
    Ok(())
}

fn create_dir(path: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(path).with_context(|| format!("creating {}", path.display()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
