//! Deterministic stand-ins for every provider seam. Each fake counts its calls and can be told to
//! fail in the ways the real collaborators do.

use std::{
	collections::{BTreeMap, HashMap, HashSet},
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use serde_json::Value;
use time::Date;

use wayfare_config::{LlmProviderConfig, ProviderConfig};
use wayfare_domain::{
	HotelCandidate, HotelDetail, HotelRates, ParsedQuery, RateOffer, SearchParams,
	SentimentAnalysis,
};
use wayfare_providers::{Error, directory::DirectoryQuery};
use wayfare_service::{
	BoxFuture, CompletionProvider, HotelDirectory, HotelInsightsProvider, ProviderResult,
	Providers, QueryParser, RateProvider,
};

/// Failure modes a fake can be told to produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Failure {
	RateLimited,
	Status(u16),
	Timeout,
	Invalid,
}
impl Failure {
	pub fn to_error(self) -> Error {
		match self {
			Self::RateLimited => Error::RateLimited,
			Self::Status(status) => Error::Status { status },
			Self::Timeout => Error::Timeout,
			Self::Invalid => Error::InvalidResponse { message: "Injected bad payload.".to_string() },
		}
	}
}

fn hit(counter: &AtomicUsize) -> usize {
	counter.fetch_add(1, Ordering::SeqCst) + 1
}

pub struct FakeQueryParser {
	parsed: ParsedQuery,
	failure: Option<Failure>,
	calls: AtomicUsize,
}
impl FakeQueryParser {
	pub fn new(parsed: ParsedQuery) -> Self {
		Self { parsed, failure: None, calls: AtomicUsize::new(0) }
	}

	pub fn failing(failure: Failure) -> Self {
		Self { parsed: ParsedQuery::default(), failure: Some(failure), calls: AtomicUsize::new(0) }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl QueryParser for FakeQueryParser {
	fn parse<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_query: &'a str,
		_today: Date,
	) -> BoxFuture<'a, ProviderResult<ParsedQuery>> {
		hit(&self.calls);

		let out = match self.failure {
			Some(failure) => Err(failure.to_error()),
			None => Ok(self.parsed.clone()),
		};

		Box::pin(async move { out })
	}
}

pub struct FakeDirectory {
	candidates: Vec<HotelCandidate>,
	failure: Option<Failure>,
	calls: AtomicUsize,
}
impl FakeDirectory {
	pub fn new(candidates: Vec<HotelCandidate>) -> Self {
		Self { candidates, failure: None, calls: AtomicUsize::new(0) }
	}

	pub fn failing(failure: Failure) -> Self {
		Self { candidates: Vec::new(), failure: Some(failure), calls: AtomicUsize::new(0) }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl HotelDirectory for FakeDirectory {
	fn candidates<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		query: &'a DirectoryQuery<'a>,
	) -> BoxFuture<'a, ProviderResult<Vec<HotelCandidate>>> {
		hit(&self.calls);

		let out = match self.failure {
			Some(failure) => Err(failure.to_error()),
			None => Ok(self.candidates.iter().take(query.limit as usize).cloned().collect()),
		};

		Box::pin(async move { out })
	}
}

/// Quotes one offer per bookable hotel; every other requested hotel comes back without offers.
pub struct FakeRates {
	bookable: HashSet<String>,
	nightly: f64,
	failure: Option<Failure>,
	calls: AtomicUsize,
	requested: Mutex<Vec<String>>,
}
impl FakeRates {
	pub fn new<I>(bookable: I) -> Self
	where
		I: IntoIterator<Item = String>,
	{
		Self {
			bookable: bookable.into_iter().collect(),
			nightly: 95.0,
			failure: None,
			calls: AtomicUsize::new(0),
			requested: Mutex::new(Vec::new()),
		}
	}

	pub fn failing(failure: Failure) -> Self {
		Self { failure: Some(failure), ..Self::new(Vec::new()) }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	/// Hotel ids of the most recent call.
	pub fn requested(&self) -> Vec<String> {
		self.requested.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl RateProvider for FakeRates {
	fn rates<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		hotel_ids: &'a [String],
		params: &'a SearchParams,
	) -> BoxFuture<'a, ProviderResult<Vec<HotelRates>>> {
		hit(&self.calls);

		*self.requested.lock().unwrap_or_else(|err| err.into_inner()) = hotel_ids.to_vec();

		let out = match self.failure {
			Some(failure) => Err(failure.to_error()),
			None => Ok(hotel_ids
				.iter()
				.map(|hotel_id| HotelRates {
					hotel_id: hotel_id.clone(),
					offers: if self.bookable.contains(hotel_id) {
						vec![RateOffer {
							room_name: "Double room".to_string(),
							board: Some("BB".to_string()),
							amount: self.nightly * f64::from(params.nights()),
							currency: params.currency.clone(),
						}]
					} else {
						Vec::new()
					},
				})
				.collect()),
		};

		Box::pin(async move { out })
	}
}

/// Scripted LLM. Ranking requests (a JSON body with a `hotels` array) are answered with a score
/// per hotel; anything else is treated as an insight request.
pub struct FakeCompletion {
	scores: HashMap<String, u8>,
	fail_batches_with: HashSet<String>,
	garbled: bool,
	insight_failure: Option<Failure>,
	rank_calls: AtomicUsize,
	insight_calls: AtomicUsize,
}
impl FakeCompletion {
	pub fn new() -> Self {
		Self {
			scores: HashMap::new(),
			fail_batches_with: HashSet::new(),
			garbled: false,
			insight_failure: None,
			rank_calls: AtomicUsize::new(0),
			insight_calls: AtomicUsize::new(0),
		}
	}

	/// Fixed score for a hotel; unscored hotels get `60 + 5 × stars`.
	pub fn with_score(mut self, hotel_id: &str, score: u8) -> Self {
		self.scores.insert(hotel_id.to_string(), score);

		self
	}

	/// Any ranking batch containing `hotel_id` fails with a 503.
	pub fn failing_batches_with(mut self, hotel_id: &str) -> Self {
		self.fail_batches_with.insert(hotel_id.to_string());

		self
	}

	/// Ranking answers are prose with no JSON in them.
	pub fn garbled(mut self) -> Self {
		self.garbled = true;

		self
	}

	pub fn failing_insights(mut self, failure: Failure) -> Self {
		self.insight_failure = Some(failure);

		self
	}

	pub fn rank_calls(&self) -> usize {
		self.rank_calls.load(Ordering::SeqCst)
	}

	pub fn insight_calls(&self) -> usize {
		self.insight_calls.load(Ordering::SeqCst)
	}

	fn rank(&self, hotels: &[Value]) -> ProviderResult<String> {
		hit(&self.rank_calls);

		let ids: Vec<&str> =
			hotels.iter().filter_map(|hotel| hotel.get("hotel_id").and_then(Value::as_str)).collect();

		if ids.iter().any(|hotel_id| self.fail_batches_with.contains(*hotel_id)) {
			return Err(Error::Status { status: 503 });
		}
		if self.garbled {
			return Ok("I'd recommend all of them, honestly.".to_string());
		}

		let matches: Vec<Value> = hotels
			.iter()
			.filter_map(|hotel| {
				let hotel_id = hotel.get("hotel_id").and_then(Value::as_str)?;
				let stars = hotel.get("stars").and_then(Value::as_f64).unwrap_or(0.0);
				let score = self
					.scores
					.get(hotel_id)
					.copied()
					.unwrap_or_else(|| (60.0 + 5.0 * stars).min(100.0) as u8);

				Some(serde_json::json!({
					"hotel_id": hotel_id,
					"match_score": score,
					"rationale": format!("Matches the request at {score}."),
					"highlights": ["Pool"],
				}))
			})
			.collect();

		Ok(format!("```json\n{}\n```", serde_json::json!({ "matches": matches })))
	}

	fn insight(&self, prompt: &str) -> ProviderResult<String> {
		hit(&self.insight_calls);

		if let Some(failure) = self.insight_failure {
			return Err(failure.to_error());
		}

		let name = prompt
			.lines()
			.next()
			.and_then(|line| line.strip_prefix("Hotel: "))
			.unwrap_or("this hotel");

		Ok(format!("Guests love the location of {name}."))
	}
}
impl Default for FakeCompletion {
	fn default() -> Self {
		Self::new()
	}
}
impl CompletionProvider for FakeCompletion {
	fn complete<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, ProviderResult<String>> {
		let content = messages
			.last()
			.and_then(|message| message.get("content"))
			.and_then(Value::as_str)
			.unwrap_or_default();
		let body = serde_json::from_str::<Value>(content).ok();
		let out = match body.as_ref().and_then(|body| body.get("hotels")).and_then(Value::as_array)
		{
			Some(hotels) => self.rank(hotels),
			None => self.insight(content),
		};

		Box::pin(async move { out })
	}
}

/// Detail and sentiment for any hotel id, with per-hotel failure, delay and rate-limit injection.
pub struct FakeInsights {
	failing_details: HashSet<String>,
	failing_sentiment: HashMap<String, Failure>,
	slow_sentiment: HashMap<String, Duration>,
	rate_limited_once: Mutex<HashSet<String>>,
	detail_calls: AtomicUsize,
	sentiment_calls: AtomicUsize,
	calls_by_hotel: Mutex<HashMap<String, usize>>,
}
impl FakeInsights {
	pub fn new() -> Self {
		Self {
			failing_details: HashSet::new(),
			failing_sentiment: HashMap::new(),
			slow_sentiment: HashMap::new(),
			rate_limited_once: Mutex::new(HashSet::new()),
			detail_calls: AtomicUsize::new(0),
			sentiment_calls: AtomicUsize::new(0),
			calls_by_hotel: Mutex::new(HashMap::new()),
		}
	}

	pub fn failing_detail(mut self, hotel_id: &str) -> Self {
		self.failing_details.insert(hotel_id.to_string());

		self
	}

	pub fn failing_sentiment(mut self, hotel_id: &str, failure: Failure) -> Self {
		self.failing_sentiment.insert(hotel_id.to_string(), failure);

		self
	}

	/// Sentiment for `hotel_id` takes `delay` to arrive.
	pub fn slow_sentiment(mut self, hotel_id: &str, delay: Duration) -> Self {
		self.slow_sentiment.insert(hotel_id.to_string(), delay);

		self
	}

	/// The first detail or sentiment call for `hotel_id` answers 429.
	pub fn rate_limited_once(self, hotel_id: &str) -> Self {
		self.rate_limited_once
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.insert(hotel_id.to_string());

		self
	}

	pub fn detail_calls(&self) -> usize {
		self.detail_calls.load(Ordering::SeqCst)
	}

	pub fn sentiment_calls(&self) -> usize {
		self.sentiment_calls.load(Ordering::SeqCst)
	}

	/// Detail and sentiment calls made for one hotel.
	pub fn calls_for(&self, hotel_id: &str) -> usize {
		self.calls_by_hotel
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.get(hotel_id)
			.copied()
			.unwrap_or(0)
	}

	fn record(&self, hotel_id: &str) -> Option<Failure> {
		*self
			.calls_by_hotel
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.entry(hotel_id.to_string())
			.or_insert(0) += 1;

		let first_is_limited =
			self.rate_limited_once.lock().unwrap_or_else(|err| err.into_inner()).remove(hotel_id);

		first_is_limited.then_some(Failure::RateLimited)
	}
}
impl Default for FakeInsights {
	fn default() -> Self {
		Self::new()
	}
}
impl HotelInsightsProvider for FakeInsights {
	fn detail<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		hotel_id: &'a str,
	) -> BoxFuture<'a, ProviderResult<HotelDetail>> {
		hit(&self.detail_calls);

		let out = match self.record(hotel_id) {
			Some(failure) => Err(failure.to_error()),
			None if self.failing_details.contains(hotel_id) => Err(Error::Status { status: 500 }),
			None => Ok(HotelDetail {
				hotel_id: hotel_id.to_string(),
				description: Some(format!("Detail for {hotel_id}.")),
				images: (1..=3).map(|n| format!("https://img.test/{hotel_id}/detail-{n}.jpg")).collect(),
				facilities: vec!["Pool".to_string()],
			}),
		};

		Box::pin(async move { out })
	}

	fn sentiment<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		hotel_id: &'a str,
	) -> BoxFuture<'a, ProviderResult<SentimentAnalysis>> {
		hit(&self.sentiment_calls);

		let injected = self.record(hotel_id).or_else(|| self.failing_sentiment.get(hotel_id).copied());
		let delay = self.slow_sentiment.get(hotel_id).copied();
		let out = match injected {
			Some(failure) => Err(failure.to_error()),
			None => Ok(SentimentAnalysis {
				hotel_id: hotel_id.to_string(),
				overall_score: Some(8.6),
				categories: BTreeMap::from([
					("cleanliness".to_string(), 8.8),
					("location".to_string(), 9.3),
				]),
				pros: vec!["Rooftop pool".to_string()],
				cons: vec!["Small rooms".to_string()],
				review_count: 120,
			}),
		};

		Box::pin(async move {
			if let Some(delay) = delay {
				tokio::time::sleep(delay).await;
			}

			out
		})
	}
}

/// One instance of every fake, shared with the service through [`Fakes::providers`].
pub struct Fakes {
	pub query_parser: Arc<FakeQueryParser>,
	pub directory: Arc<FakeDirectory>,
	pub rates: Arc<FakeRates>,
	pub completion: Arc<FakeCompletion>,
	pub insights: Arc<FakeInsights>,
}
impl Fakes {
	/// Parser returns `parsed`, the directory lists `candidates`, `bookable` hotels have rates.
	pub fn new(
		parsed: ParsedQuery,
		candidates: Vec<HotelCandidate>,
		bookable: Vec<String>,
	) -> Self {
		Self {
			query_parser: Arc::new(FakeQueryParser::new(parsed)),
			directory: Arc::new(FakeDirectory::new(candidates)),
			rates: Arc::new(FakeRates::new(bookable)),
			completion: Arc::new(FakeCompletion::new()),
			insights: Arc::new(FakeInsights::new()),
		}
	}

	pub fn with_completion(mut self, completion: FakeCompletion) -> Self {
		self.completion = Arc::new(completion);

		self
	}

	pub fn with_insights(mut self, insights: FakeInsights) -> Self {
		self.insights = Arc::new(insights);

		self
	}

	pub fn with_rates(mut self, rates: FakeRates) -> Self {
		self.rates = Arc::new(rates);

		self
	}

	pub fn with_directory(mut self, directory: FakeDirectory) -> Self {
		self.directory = Arc::new(directory);

		self
	}

	pub fn with_query_parser(mut self, query_parser: FakeQueryParser) -> Self {
		self.query_parser = Arc::new(query_parser);

		self
	}

	pub fn providers(&self) -> Providers {
		Providers::new(
			self.query_parser.clone(),
			self.directory.clone(),
			self.rates.clone(),
			self.completion.clone(),
			self.insights.clone(),
		)
	}
}
