use std::sync::Arc;

use color_eyre::eyre;

use wayfare_cache::CacheClient;
use wayfare_service::WayfareService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<WayfareService>,
}
impl AppState {
	/// Builds the service over the in-memory cache and opens the cache before serving.
	pub async fn new(config: wayfare_config::Config) -> color_eyre::Result<Self> {
		let cache = Arc::new(CacheClient::in_memory(&config.cache));

		if !cache.connect().await {
			return Err(eyre::eyre!("Cache backend could not be opened."));
		}

		let service = WayfareService::new(config, cache);

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: WayfareService) -> Self {
		Self { service: Arc::new(service) }
	}
}
