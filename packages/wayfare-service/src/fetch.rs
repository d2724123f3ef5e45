//! Cache-first, pool-bounded fetchers for per-hotel detail and sentiment.
//!
//! A cache hit costs no external call and no pool slot. A miss takes a slot from the matching pool
//! and calls the provider under a fixed timeout. Every failure is reported as `None`; the caller
//! treats that as "enrichment unavailable".

use std::{sync::Arc, time::Duration};

use tokio::time::Instant;

use crate::{BoxFuture, HotelInsightsProvider, Pool, Pools, ProviderResult};
use wayfare_cache::CacheClient;
use wayfare_config::{Config, ProviderConfig};
use wayfare_domain::{HotelDetail, SentimentAnalysis};

const MAX_ATTEMPTS: u32 = 2;

#[derive(Clone)]
pub struct HotelFetcher {
	cache: Arc<CacheClient>,
	insights: Arc<dyn HotelInsightsProvider>,
	details_cfg: Arc<ProviderConfig>,
	sentiment_cfg: Arc<ProviderConfig>,
	pools: Pools,
	timeout: Duration,
	retry_delay: Duration,
}
impl HotelFetcher {
	pub fn new(
		cfg: &Config,
		cache: Arc<CacheClient>,
		insights: Arc<dyn HotelInsightsProvider>,
		pools: Pools,
	) -> Self {
		Self {
			cache,
			insights,
			details_cfg: Arc::new(cfg.providers.details.clone()),
			sentiment_cfg: Arc::new(cfg.providers.sentiment.clone()),
			pools,
			timeout: Duration::from_millis(cfg.fetch.timeout_ms),
			retry_delay: Duration::from_millis(cfg.fetch.rate_limit_retry_delay_ms),
		}
	}

	pub async fn hotel_detail(&self, hotel_id: &str) -> Option<HotelDetail> {
		if let Some(detail) = self.cache.get_hotel_detail(hotel_id).await {
			tracing::debug!(hotel_id, "Hotel detail served from cache.");

			return Some(detail);
		}

		let insights = self.insights.clone();
		let cfg = self.details_cfg.clone();
		let detail = self
			.call_through_pool(&self.pools.detail, hotel_id, move |hotel_id| {
				let insights = insights.clone();
				let cfg = cfg.clone();

				Box::pin(async move { insights.detail(&cfg, &hotel_id).await })
			})
			.await?;

		self.cache.set_hotel_detail(&detail).await;

		Some(detail)
	}

	pub async fn hotel_sentiment(&self, hotel_id: &str) -> Option<SentimentAnalysis> {
		if let Some(sentiment) = self.cache.get_hotel_sentiment(hotel_id).await {
			tracing::debug!(hotel_id, "Hotel sentiment served from cache.");

			return Some(sentiment);
		}

		let insights = self.insights.clone();
		let cfg = self.sentiment_cfg.clone();
		let sentiment = self
			.call_through_pool(&self.pools.sentiment, hotel_id, move |hotel_id| {
				let insights = insights.clone();
				let cfg = cfg.clone();

				Box::pin(async move { insights.sentiment(&cfg, &hotel_id).await })
			})
			.await?;

		self.cache.set_hotel_sentiment(&sentiment).await;

		Some(sentiment)
	}

	/// Runs `call` inside a pool slot. A rate-limited attempt is retried once after the configured
	/// delay; anything else gives up.
	///
	/// The call is detached from the caller: on timeout the caller stops waiting, but the call
	/// keeps its slot until it settles and its result is dropped.
	async fn call_through_pool<T, F>(&self, pool: &Pool, hotel_id: &str, call: F) -> Option<T>
	where
		T: Send + 'static,
		F: Fn(String) -> BoxFuture<'static, ProviderResult<T>>,
	{
		for attempt in 1..=MAX_ATTEMPTS {
			let permit = pool.acquire().await?;
			let request = call(hotel_id.to_string());
			let started = Instant::now();
			let handle = tokio::spawn(async move {
				let _permit = permit;

				request.await
			});
			let err = match tokio::time::timeout(self.timeout, handle).await {
				Ok(Ok(Ok(value))) => {
					tracing::debug!(
						pool = pool.name(),
						hotel_id,
						elapsed_ms = crate::elapsed_ms(started),
						"Fetch succeeded."
					);

					return Some(value);
				},
				Ok(Ok(Err(err))) => err,
				Ok(Err(err)) => {
					tracing::warn!(pool = pool.name(), hotel_id, error = %err, "Fetch task aborted.");

					return None;
				},
				Err(_) => {
					tracing::warn!(
						pool = pool.name(),
						hotel_id,
						timeout_ms = self.timeout.as_millis() as u64,
						"Fetch timed out."
					);

					return None;
				},
			};

			if err.is_rate_limited() && attempt < MAX_ATTEMPTS {
				tracing::warn!(
					pool = pool.name(),
					hotel_id,
					retry_in_ms = self.retry_delay.as_millis() as u64,
					"Fetch was rate limited; retrying once."
				);

				tokio::time::sleep(self.retry_delay).await;

				continue;
			}

			tracing::warn!(pool = pool.name(), hotel_id, attempt, error = %err, "Fetch failed.");

			return None;
		}

		None
	}
}
