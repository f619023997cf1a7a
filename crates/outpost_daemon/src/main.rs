mod config;
mod routes;
mod state;
mod stream;
mod tick_loop;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing::info;

use outpost_game::{ActionLog, SceneService, SceneStore};

use crate::config::Config;
use crate::state::{ActionApi, AppState, GameApi};
use crate::stream::SceneBroadcaster;
use crate::tick_loop::run_energy_ticker;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::parse();

    let request_logs = if cfg.is_production() {
        "tower_http=warn"
    } else {
        "tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("outpost_daemon=info".parse()?)
        .add_directive("outpost_game=info".parse()?)
        .add_directive(request_logs.parse()?);
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .idle_timeout(Duration::from_secs(10 * 60))
        .max_lifetime(Duration::from_secs(30 * 60))
        .acquire_timeout(Duration::from_secs(5))
        .connect(&cfg.database_url)
        .await
        .context("open database failed")?;
    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .context("ping database failed")?;

    let store = SceneStore::new(pool.clone());
    let game = Arc::new(
        SceneService::new(store, cfg.scene_id.clone())
            .await
            .context("load scene failed")?,
    );
    let actions = Arc::new(ActionLog::new(pool));
    let broadcaster = Arc::new(SceneBroadcaster::new());

    let app_state = AppState {
        game: game.clone() as Arc<dyn GameApi>,
        actions: actions as Arc<dyn ActionApi>,
        broadcaster: broadcaster.clone(),
        environment: cfg.environment.clone(),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ticker = tokio::spawn(run_energy_ticker(
        app_state.game.clone(),
        broadcaster.clone(),
        cfg.tick_interval(),
        cfg.effective_tick_seconds(),
        cfg.effective_drain_factor(),
        shutdown_rx,
    ));

    let router = routes::make_router(app_state);
    let listener = tokio::net::TcpListener::bind(cfg.address())
        .await
        .with_context(|| format!("bind {}", cfg.address()))?;
    info!(
        "outpost_daemon serving scene {} on http://{}",
        cfg.scene_id,
        cfg.address()
    );
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the ticker before tearing down its subscribers.
    let _ = shutdown_tx.send(true);
    let _ = ticker.await;
    broadcaster.stop();
    info!("outpost_daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
