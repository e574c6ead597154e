use std::env;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use officeflow::store::Stores;
use officeflow::{db, routes, AppState, Config};

const DEFAULT_ADDR: &str = "0.0.0.0:8888";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|arg| arg == "-help" || arg == "--help") {
        println!("Usage: officeflow [OPTIONS]");
        println!("Options:");
        println!("  -config <path>  Path to configuration file (default: ./etc/officeflow.toml)");
        println!("  -help, --help   Print this help message");
        return Ok(());
    }

    let config_path = args
        .iter()
        .skip_while(|arg| arg.as_str() != "-config")
        .nth(1)
        .map(|s| s.to_string())
        .unwrap_or_else(|| "./etc/officeflow.toml".to_string());

    // Load configuration first (before logging init)
    let config = Config::load(&config_path).unwrap_or_else(|e| {
        eprintln!("Could not load config file: {}, using defaults", e);
        Config::default()
    });

    // Priority: RUST_LOG env var > config file > default "info"
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting Officeflow server...");
    info!("Loading configuration from: {}", config_path);

    let stores = if config.database.is_memory() {
        info!("Using in-memory storage; data is lost on exit");
        Stores::memory()
    } else {
        let conn = db::init_database(&config.database).await.map_err(|e| {
            tracing::error!("Database initialization failed: {}", e);
            anyhow::anyhow!("Database initialization failed: {}", e)
        })?;
        Stores::sql(conn)
    };

    let state = AppState::new(config.clone(), stores);
    state
        .services
        .user
        .ensure_root(&config.root_password)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bootstrap root account: {}", e))?;

    let app = routes::create_router(state);

    let addr: SocketAddr = match config.addr.parse() {
        Ok(addr) => addr,
        Err(_) => {
            tracing::warn!("Invalid address '{}', using default {}", config.addr, DEFAULT_ADDR);
            DEFAULT_ADDR.parse()?
        }
    };

    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
