//! In-process fixtures for exercising the search pipeline without any network.

pub mod fakes;

pub use fakes::{
	Failure, FakeCompletion, FakeDirectory, FakeInsights, FakeQueryParser, FakeRates, Fakes,
};

use std::sync::Arc;

use serde_json::Map;

use wayfare_cache::CacheClient;
use wayfare_config::{
	Cache, Config, Enrichment, Fetch, LlmProviderConfig, Pools, ProviderConfig, Providers, Search,
	Service,
};
use wayfare_domain::{HotelCandidate, ParsedQuery};
use wayfare_service::WayfareService;

/// Config with short timeouts, a fixed scoring seed and no stagger delay to speak of.
pub fn test_config() -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
		},
		cache: Cache { namespace: "wayfare-test".to_string(), ..Cache::default() },
		pools: Pools { detail_concurrency: 4, sentiment_concurrency: 2 },
		fetch: Fetch { timeout_ms: 200, rate_limit_retry_delay_ms: 50 },
		search: Search { scoring_seed: Some(7), ..Search::default() },
		enrichment: Enrichment { stagger_ms: 5, insight_max_chars: 280, gallery_limit: 4 },
		providers: Providers {
			llm: llm_provider("llm"),
			query_parser: llm_provider("query-parser"),
			directory: provider("directory"),
			rates: provider("rates"),
			details: provider("details"),
			sentiment: provider("sentiment"),
		},
	}
}

pub fn provider(provider_id: &str) -> ProviderConfig {
	ProviderConfig {
		provider_id: provider_id.to_string(),
		api_base: "http://127.0.0.1:1".to_string(),
		api_key: "test-key".to_string(),
		path: format!("/{provider_id}"),
		timeout_ms: 1_000,
		default_headers: Map::new(),
	}
}

pub fn llm_provider(provider_id: &str) -> LlmProviderConfig {
	LlmProviderConfig {
		provider_id: provider_id.to_string(),
		api_base: "http://127.0.0.1:1".to_string(),
		api_key: "test-key".to_string(),
		path: "/v1/chat/completions".to_string(),
		model: "test-model".to_string(),
		temperature: 0.0,
		timeout_ms: 1_000,
		default_headers: Map::new(),
	}
}

/// Service over an in-memory cache and the given fakes.
pub fn service(cfg: Config, fakes: &Fakes) -> WayfareService {
	let cache = Arc::new(CacheClient::in_memory(&cfg.cache));

	WayfareService::with_providers(cfg, cache, fakes.providers())
}

/// Hotel `H{n}` with a star rating cycling through 1-5 and two directory images.
pub fn candidate(n: usize) -> HotelCandidate {
	let hotel_id = format!("H{n}");

	HotelCandidate {
		name: format!("Hotel {n}"),
		star_rating: (n % 5 + 1) as f32,
		city: "Lisbon".to_string(),
		country: "PT".to_string(),
		address: format!("Rua {n}, Lisboa"),
		latitude: Some(38.72),
		longitude: Some(-9.14),
		amenities: vec!["Pool".to_string(), "Free WiFi".to_string(), "Bar".to_string()],
		main_image: Some(format!("https://img.test/{hotel_id}/main.jpg")),
		images: vec![format!("https://img.test/{hotel_id}/lobby.jpg")],
		price_from: Some(60.0 + n as f64),
		hotel_id,
	}
}

/// `H1..=Hn`.
pub fn candidates(n: usize) -> Vec<HotelCandidate> {
	(1..=n).map(candidate).collect()
}

pub fn hotel_ids(range: std::ops::RangeInclusive<usize>) -> Vec<String> {
	range.map(|n| format!("H{n}")).collect()
}

/// "budget hotels in Lisbon with pool, Mar 10-13, 2 adults" as a parser would return it.
pub fn lisbon_query() -> ParsedQuery {
	ParsedQuery {
		destination: Some("Lisbon".to_string()),
		country_code: Some("PT".to_string()),
		check_in: Some("2026-03-10".to_string()),
		check_out: Some("2026-03-13".to_string()),
		adults: Some(2),
		children: Some(0),
		budget_min: None,
		budget_max: Some(120.0),
		currency: Some("EUR".to_string()),
		preferences: "budget, pool".to_string(),
	}
}
