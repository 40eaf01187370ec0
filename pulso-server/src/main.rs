use clap::Parser;
use pulso_core::PulsoConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "pulso.toml")]
    config: String,

    /// Check database connectivity and table counts, then exit
    #[arg(long)]
    health: bool,

    /// Apply schema migrations, then exit
    #[arg(long)]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience: production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match PulsoConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    // Connect to DB
    let pool = match pulso_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if args.migrate {
        pulso_core::db::run_migrations(&pool).await?;
        println!("✅ Migrations applied");
        return Ok(());
    }

    if args.health {
        match pulso_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }

        match pulso_core::db::table_counts(&pool).await {
            Ok(counts) => {
                for (table, count) in counts {
                    println!("   {:<18} {}", table, count);
                }
            }
            Err(e) => {
                println!("❌ Schema check failed (run --migrate?): {}", e);
                std::process::exit(1);
            }
        }

        if config.completion.api_key().is_empty() {
            println!(
                "⚠️  {} is not set; chat and food analysis will fail",
                config.completion.api_key_env
            );
        }

        println!("✅ Pulso health check passed");
        return Ok(());
    }

    if !config.http.enabled {
        anyhow::bail!("HTTP server disabled in config; nothing to run");
    }

    pulso_core::db::run_migrations(&pool).await?;

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

    tracing::info!(service = %config.service.name, "Starting Pulso server");
    pulso_server::http::start_http_server(pool, config, tx.subscribe()).await?;

    Ok(())
}
