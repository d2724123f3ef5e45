pub mod routes;
pub mod state;

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use tokio::{net::TcpListener, task::JoinHandle};
use tracing_subscriber::EnvFilter;

use crate::state::AppState;
use wayfare_cache::CacheClient;

#[derive(Debug, Parser)]
#[command(
	version = wayfare_cli::VERSION,
	rename_all = "kebab",
	styles = wayfare_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = wayfare_config::load(&args.config)?;

	init_tracing(&config)?;

	let http_addr: SocketAddr = config.service.http_bind.parse()?;
	let purge_interval = Duration::from_secs(config.cache.purge_interval_seconds.max(1));
	let state = AppState::new(config).await?;
	let janitor = spawn_cache_janitor(state.service.cache.clone(), purge_interval);
	let app = routes::router(state.clone());
	let http_listener = TcpListener::bind(http_addr).await?;

	tracing::info!(%http_addr, "HTTP server listening.");

	axum::serve(http_listener, app).with_graceful_shutdown(shutdown_signal()).await?;

	janitor.abort();

	tracing::info!(
		in_flight = state.service.tasks.in_flight(),
		"Waiting for background enrichment to settle."
	);

	state.service.tasks.wait_idle().await;
	state.service.cache.disconnect().await;

	Ok(())
}

fn init_tracing(config: &wayfare_config::Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	Ok(())
}

/// Sweeps expired cache entries until aborted.
fn spawn_cache_janitor(cache: Arc<CacheClient>, every: Duration) -> JoinHandle<()> {
	tokio::spawn(async move {
		let mut ticker = tokio::time::interval(every);

		// The first tick completes immediately.
		ticker.tick().await;

		loop {
			ticker.tick().await;

			let purged = cache.purge_expired().await;

			if purged > 0 {
				tracing::debug!(purged, "Expired cache entries purged.");
			}
		}
	})
}

async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %err, "Failed to listen for the shutdown signal.");

		std::future::pending::<()>().await;
	}

	tracing::info!("Shutdown requested.");
}
