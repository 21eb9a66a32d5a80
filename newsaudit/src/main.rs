/*
newsaudit - single-binary main.rs
Starts the Rocket HTTP server, or performs one analysis run and exits with --run-once.
*/

use anyhow::Result;
use clap::Parser;
use common::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use newsaudit::server::launch_rocket;
use newsaudit::service::RunRequest;

#[derive(Parser, Debug)]
#[command(name = "newsaudit", about = "News analysis with a second model cross-validating the first")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run the pipeline once, print the summary and exit (no HTTP server)
    #[arg(long)]
    run_once: bool,

    /// Search query for --run-once (defaults to [news].query)
    #[arg(long)]
    query: Option<String>,

    /// Number of articles to fetch for --run-once (defaults to [news].page_size)
    #[arg(long)]
    num_articles: Option<u32>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Secrets live in .env; a missing file is fine
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // Resolve config paths
    let default_path = PathBuf::from("config.default.toml");
    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %format!("{:#}", e), "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    let service = match newsaudit::build_service(&config) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!(error = %format!("{:#}", e), "failed to initialize analysis service");
            return Err(e);
        }
    };

    if args.run_once {
        info!("Running a single analysis (--run-once)");
        let request = RunRequest {
            query: args.query,
            num_articles: args.num_articles,
        };
        let report = service.run(request).await?;
        println!("{}", serde_json::to_string_pretty(&report.summary)?);
        info!(dir = %service.store().dir().display(), "artifacts written");
        return Ok(());
    }

    info!("Launching Rocket HTTP server");
    if let Err(e) = launch_rocket(service, &config.server).await {
        error!(%e, "Rocket server failed");
        return Err(e);
    }

    info!("Shutdown complete");
    Ok(())
}
