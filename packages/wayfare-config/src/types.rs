use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	#[serde(default)]
	pub cache: Cache,
	#[serde(default)]
	pub pools: Pools,
	#[serde(default)]
	pub fetch: Fetch,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub enrichment: Enrichment,
	pub providers: Providers,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Cache {
	/// Prefix prepended to every key, e.g. "wayfare" -> "wayfare:search:<id>".
	pub namespace: String,
	pub detail_ttl_seconds: u64,
	pub sentiment_ttl_seconds: u64,
	pub search_ttl_seconds: u64,
	/// How often the in-memory backend sweeps expired entries.
	pub purge_interval_seconds: u64,
}
impl Default for Cache {
	fn default() -> Self {
		Self {
			namespace: "wayfare".to_string(),
			detail_ttl_seconds: 86_400,
			sentiment_ttl_seconds: 43_200,
			search_ttl_seconds: 3_600,
			purge_interval_seconds: 300,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Pools {
	pub detail_concurrency: u32,
	pub sentiment_concurrency: u32,
}
impl Default for Pools {
	fn default() -> Self {
		Self { detail_concurrency: 4, sentiment_concurrency: 2 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Fetch {
	pub timeout_ms: u64,
	pub rate_limit_retry_delay_ms: u64,
}
impl Default for Fetch {
	fn default() -> Self {
		Self { timeout_ms: 8_000, rate_limit_retry_delay_ms: 1_500 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Search {
	pub language: String,
	pub candidate_limit: u32,
	/// Candidates sent to the LLM for ranking. May be below `candidate_limit`; bookable hotels
	/// past this cut are scored heuristically and still compete for the shortlist.
	pub max_match_pool: u32,
	pub shortlist_size: u32,
	pub match_batch_size: u32,
	/// Fixes the heuristic fallback scorer. Unset means a fresh seed per search.
	pub scoring_seed: Option<u64>,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			language: "en".to_string(),
			candidate_limit: 100,
			max_match_pool: 90,
			shortlist_size: 5,
			match_batch_size: 30,
			scoring_seed: None,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Enrichment {
	pub stagger_ms: u64,
	pub insight_max_chars: u32,
	pub gallery_limit: u32,
}
impl Default for Enrichment {
	fn default() -> Self {
		Self { stagger_ms: 150, insight_max_chars: 280, gallery_limit: 6 }
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct Providers {
	pub llm: LlmProviderConfig,
	pub query_parser: LlmProviderConfig,
	pub directory: ProviderConfig,
	pub rates: ProviderConfig,
	pub details: ProviderConfig,
	pub sentiment: ProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}
