use clap::Parser;
use lifeos_core::{LifeOs, LifeOsConfig};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use lifeos_server::http;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "lifeos.toml")]
    config: String,

    /// Print the effective upstream configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience; production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match LifeOsConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging: RUST_LOG wins over service.log_level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    if args.check {
        let key = if config.upstream.resolved_api_key().is_some() {
            "✅ API key present"
        } else {
            "❌ API key missing (status will serve the fallback)"
        };
        println!("Upstream:  {}", config.upstream.base_url);
        println!("Model:     {}", config.upstream.model);
        println!("Key:       {}", key);
        println!(
            "Retry:     {} attempts, {} ms unit, {} s per attempt",
            config.upstream.retry.max_attempts,
            config.upstream.retry.base_delay_ms,
            config.upstream.retry.attempt_timeout_secs
        );
        return Ok(());
    }

    let lifeos = LifeOs::from_config(config)?;

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    http::start_http_server(lifeos, tx.subscribe()).await?;

    Ok(())
}
