mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Cache, Config, Enrichment, Fetch, LlmProviderConfig, Pools, ProviderConfig, Providers, Search,
	Service,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	parse(&raw).map_err(|err| match err {
		Error::ParseConfig { source, .. } =>
			Error::ParseConfig { path: path.to_path_buf(), source },
		other => other,
	})
}

pub fn parse(raw: &str) -> Result<Config> {
	let mut cfg: Config = toml::from_str(raw)
		.map_err(|err| Error::ParseConfig { path: Default::default(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.cache.namespace.trim().is_empty() {
		return Err(Error::Validation { message: "cache.namespace must be non-empty.".to_string() });
	}

	for (label, ttl) in [
		("cache.detail_ttl_seconds", cfg.cache.detail_ttl_seconds),
		("cache.sentiment_ttl_seconds", cfg.cache.sentiment_ttl_seconds),
		("cache.search_ttl_seconds", cfg.cache.search_ttl_seconds),
		("cache.purge_interval_seconds", cfg.cache.purge_interval_seconds),
	] {
		if ttl == 0 {
			return Err(Error::Validation { message: format!("{label} must be greater than zero.") });
		}
	}

	if cfg.pools.detail_concurrency == 0 {
		return Err(Error::Validation {
			message: "pools.detail_concurrency must be greater than zero.".to_string(),
		});
	}
	if cfg.pools.sentiment_concurrency == 0 {
		return Err(Error::Validation {
			message: "pools.sentiment_concurrency must be greater than zero.".to_string(),
		});
	}
	if cfg.fetch.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "fetch.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.search.language.trim().is_empty() {
		return Err(Error::Validation { message: "search.language must be non-empty.".to_string() });
	}
	if cfg.search.candidate_limit == 0 {
		return Err(Error::Validation {
			message: "search.candidate_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.search.shortlist_size == 0 {
		return Err(Error::Validation {
			message: "search.shortlist_size must be greater than zero.".to_string(),
		});
	}
	if cfg.search.match_batch_size == 0 {
		return Err(Error::Validation {
			message: "search.match_batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.search.max_match_pool < cfg.search.shortlist_size {
		return Err(Error::Validation {
			message: "search.max_match_pool must be at least search.shortlist_size.".to_string(),
		});
	}
	if cfg.enrichment.insight_max_chars == 0 {
		return Err(Error::Validation {
			message: "enrichment.insight_max_chars must be greater than zero.".to_string(),
		});
	}

	for (label, provider) in
		[("llm", &cfg.providers.llm), ("query_parser", &cfg.providers.query_parser)]
	{
		if !provider.temperature.is_finite() {
			return Err(Error::Validation {
				message: format!("providers.{label}.temperature must be a finite number."),
			});
		}
		if !(0.0..=2.0).contains(&provider.temperature) {
			return Err(Error::Validation {
				message: format!("providers.{label}.temperature must be in the range 0.0-2.0."),
			});
		}
		if provider.model.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("providers.{label}.model must be non-empty."),
			});
		}
	}

	for (label, key) in [
		("llm", &cfg.providers.llm.api_key),
		("query_parser", &cfg.providers.query_parser.api_key),
		("directory", &cfg.providers.directory.api_key),
		("rates", &cfg.providers.rates.api_key),
		("details", &cfg.providers.details.api_key),
		("sentiment", &cfg.providers.sentiment.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.cache.namespace = cfg.cache.namespace.trim().trim_end_matches(':').to_string();
	cfg.search.language = cfg.search.language.trim().to_ascii_lowercase();

	for provider in [
		&mut cfg.providers.directory,
		&mut cfg.providers.rates,
		&mut cfg.providers.details,
		&mut cfg.providers.sentiment,
	] {
		provider.api_base = provider.api_base.trim_end_matches('/').to_string();
	}
	for provider in [&mut cfg.providers.llm, &mut cfg.providers.query_parser] {
		provider.api_base = provider.api_base.trim_end_matches('/').to_string();
	}
}
