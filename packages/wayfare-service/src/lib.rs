pub mod enrichment;
pub mod fetch;
pub mod matching;
pub mod pool;
pub mod search;
pub mod status;
pub mod tasks;

mod error;

pub use enrichment::{EnrichmentJob, EnrichmentTarget};
pub use error::{Error, Result, Step};
pub use fetch::HotelFetcher;
pub use matching::{ScoredCandidate, ScoredPool};
pub use pool::{Pool, Pools};
pub use search::SearchRequest;
pub use status::{SearchProgress, SearchResults};
pub use tasks::TaskRunner;

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;
use time::Date;

use wayfare_cache::CacheClient;
use wayfare_config::{Config, LlmProviderConfig, ProviderConfig};
use wayfare_domain::{
	HotelCandidate, HotelDetail, HotelRates, ParsedQuery, SearchParams, SentimentAnalysis,
};
use wayfare_providers::{
	completion, details, directory, directory::DirectoryQuery, query_parser, rates,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type ProviderResult<T> = wayfare_providers::Result<T>;

pub trait QueryParser
where
	Self: Send + Sync,
{
	fn parse<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		query: &'a str,
		today: Date,
	) -> BoxFuture<'a, ProviderResult<ParsedQuery>>;
}

pub trait HotelDirectory
where
	Self: Send + Sync,
{
	fn candidates<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a DirectoryQuery<'a>,
	) -> BoxFuture<'a, ProviderResult<Vec<HotelCandidate>>>;
}

pub trait RateProvider
where
	Self: Send + Sync,
{
	fn rates<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		hotel_ids: &'a [String],
		params: &'a SearchParams,
	) -> BoxFuture<'a, ProviderResult<Vec<HotelRates>>>;
}

pub trait CompletionProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, ProviderResult<String>>;
}

pub trait HotelInsightsProvider
where
	Self: Send + Sync,
{
	fn detail<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		hotel_id: &'a str,
	) -> BoxFuture<'a, ProviderResult<HotelDetail>>;

	fn sentiment<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		hotel_id: &'a str,
	) -> BoxFuture<'a, ProviderResult<SentimentAnalysis>>;
}

#[derive(Clone)]
pub struct Providers {
	pub query_parser: Arc<dyn QueryParser>,
	pub directory: Arc<dyn HotelDirectory>,
	pub rates: Arc<dyn RateProvider>,
	pub completion: Arc<dyn CompletionProvider>,
	pub insights: Arc<dyn HotelInsightsProvider>,
}
impl Providers {
	pub fn new(
		query_parser: Arc<dyn QueryParser>,
		directory: Arc<dyn HotelDirectory>,
		rates: Arc<dyn RateProvider>,
		completion: Arc<dyn CompletionProvider>,
		insights: Arc<dyn HotelInsightsProvider>,
	) -> Self {
		Self { query_parser, directory, rates, completion, insights }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self {
			query_parser: provider.clone(),
			directory: provider.clone(),
			rates: provider.clone(),
			completion: provider.clone(),
			insights: provider,
		}
	}
}

struct DefaultProviders;

impl QueryParser for DefaultProviders {
	fn parse<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		query: &'a str,
		today: Date,
	) -> BoxFuture<'a, ProviderResult<ParsedQuery>> {
		Box::pin(query_parser::parse_query(cfg, query, today))
	}
}

impl HotelDirectory for DefaultProviders {
	fn candidates<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a DirectoryQuery<'a>,
	) -> BoxFuture<'a, ProviderResult<Vec<HotelCandidate>>> {
		Box::pin(directory::fetch_candidates(cfg, query))
	}
}

impl RateProvider for DefaultProviders {
	fn rates<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		hotel_ids: &'a [String],
		params: &'a SearchParams,
	) -> BoxFuture<'a, ProviderResult<Vec<HotelRates>>> {
		Box::pin(rates::fetch_rates(cfg, hotel_ids, params))
	}
}

impl CompletionProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, ProviderResult<String>> {
		Box::pin(completion::complete(cfg, messages))
	}
}

impl HotelInsightsProvider for DefaultProviders {
	fn detail<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		hotel_id: &'a str,
	) -> BoxFuture<'a, ProviderResult<HotelDetail>> {
		Box::pin(details::fetch_detail(cfg, hotel_id))
	}

	fn sentiment<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		hotel_id: &'a str,
	) -> BoxFuture<'a, ProviderResult<SentimentAnalysis>> {
		Box::pin(details::fetch_sentiment(cfg, hotel_id))
	}
}

pub struct WayfareService {
	pub cfg: Config,
	pub cache: Arc<CacheClient>,
	pub providers: Providers,
	pub pools: Pools,
	pub fetcher: HotelFetcher,
	pub tasks: TaskRunner,
}
impl WayfareService {
	pub fn new(cfg: Config, cache: Arc<CacheClient>) -> Self {
		Self::with_providers(cfg, cache, Providers::default())
	}

	pub fn with_providers(cfg: Config, cache: Arc<CacheClient>, providers: Providers) -> Self {
		let pools = Pools::from_config(&cfg.pools);
		let fetcher =
			HotelFetcher::new(&cfg, cache.clone(), providers.insights.clone(), pools.clone());

		Self { cfg, cache, providers, pools, fetcher, tasks: TaskRunner::new() }
	}
}

pub(crate) fn elapsed_ms(started: tokio::time::Instant) -> u64 {
	started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}
