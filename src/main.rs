use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod availability;
mod bus_list;
mod config;
mod error;
mod fleet;
mod gc;
mod map_view;
mod persistence;
mod reconciler;
mod refresh;
mod server;
mod state;
mod supabase;
mod types;
mod vehicle_feed;

use config::Config;
use gc::expire_stale_locations;
use persistence::{load_state, save_state};
use state::AppState;
use supabase::SupabaseFeed;

const GC_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("reading configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,warp=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 1. Initialize State
    let state = Arc::new(AppState::new(config.supabase.is_some()));

    // 2. Load Persistence (Recovery)
    if let Err(e) = load_state(&state, &config.data_dir) {
        warn!(error = ?e, "failed to load previous fleet state");
    }

    // 3. Remote feed, when the fleet lives in Supabase
    if let Some(sb) = config.supabase.clone() {
        info!(url = %sb.url, interval = ?sb.poll_interval, "mirroring fleet from Supabase");
        SupabaseFeed::new(sb).start_poller(state.clone());
    }

    // 4. Live map reconciler
    tokio::spawn(refresh::run(state.clone()));

    // 5. Persistence Loop
    let state_clone_persist = state.clone();
    let data_dir = config.data_dir.clone();
    let persist_interval = config.persist_interval;
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(persist_interval).await;
            if let Err(e) = save_state(&state_clone_persist, &data_dir) {
                error!(error = ?e, "failed to save fleet state");
            }
        }
    });

    // 6. Stale fix expiry. A mirrored fleet is refreshed by its owner instead.
    if let (Some(ttl), false) = (config.location_ttl, state.is_read_only()) {
        let state_clone_gc = state.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(GC_INTERVAL).await;
                expire_stale_locations(&state_clone_gc, ttl, Utc::now());
            }
        });
    }

    // 7. HTTP Server
    let routes = server::routes(state.clone(), Arc::new(config.admins.clone()));
    info!(port = config.port, "server running at http://localhost:{}", config.port);
    warp::serve(routes).run(([0, 0, 0, 0], config.port)).await;

    Ok(())
}
