use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use plaza::config::{Cli, Config};
use plaza::state::AppState;
use plaza::{app, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli)?;
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;
    std::fs::create_dir_all(config.shadow_path())?;

    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;
    {
        let conn = pool.get()?;
        let purged = plaza::auth::session::purge_expired(&conn)?;
        if purged > 0 {
            tracing::info!("Purged {} expired sessions", purged);
        }
    }

    let state = AppState::new(pool, config.clone());
    let _watcher = state.sessions.spawn_bootstrap_watcher();

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
