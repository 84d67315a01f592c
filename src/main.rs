use camino_flow::{api, config, forecast, state};
use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock};

fn init_tracing() {
    let subscriber = tracing_subscriber::fmt().with_target(false).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    tracing::info!(
        config_path = config::DEFAULT_CONFIG_PATH,
        "camino-flow starting"
    );
    let config = config::load_default()?;
    let state = Arc::new(RwLock::new(state::AppState::new()));
    let options = config.forecast_options();
    let history_path = config.history_path().to_path_buf();

    // Initial forecast before serving; a missing or sparse history is not
    // fatal, the refresh thread retries on its own cadence.
    match forecast::reload_and_store(&history_path, &state, &options) {
        Ok(()) => tracing::info!(path = %history_path.display(), "Initial forecast ready"),
        Err(e) => tracing::warn!(
            path = %history_path.display(),
            error = %e,
            "Initial forecast unavailable, serving without data"
        ),
    }

    let stop_flag = Arc::new(AtomicBool::new(false));
    let refresh_interval = config.refresh_interval();
    tracing::info!(
        interval_secs = refresh_interval.as_secs(),
        "Starting forecast refresh thread"
    );
    let _refresh_handle = forecast::spawn_refresh_thread(
        history_path,
        Arc::clone(&state),
        options,
        refresh_interval,
        Arc::clone(&stop_flag),
    );

    let app = api::router(Arc::clone(&state));
    let port = config.server_port();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await?;

    // Signal refresh thread to stop
    stop_flag.store(true, std::sync::atomic::Ordering::Relaxed);

    Ok(())
}

#[cfg(test)]
mod tests {
    use camino_flow::config;

    #[test]
    fn default_config_is_valid_toml() -> Result<(), Box<dyn std::error::Error>> {
        let _config = config::load_default()?;
        Ok(())
    }
}
