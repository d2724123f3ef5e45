use std::{
	cell::RefCell,
	collections::{BTreeMap, HashMap},
	rc::Rc,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use serde::{Deserialize, Serialize, Serializer, ser::Error as _};
use serde_json::Value;
use time::{Date, Month, OffsetDateTime};

use wayfare_cache::{
	BoxFuture, CacheBackend, CacheClient, CacheEntry, Error, MemoryBackend, MergeOutcome, Result,
	normalize::{CIRCULAR, UNSERIALIZABLE},
};
use wayfare_domain::{
	EnrichmentPayload, HotelMatch, InsightSource, ScoreSource, SearchParams, SearchPerformance,
	SearchRecord,
};

#[derive(Default)]
struct Counters {
	connects: AtomicUsize,
	disconnects: AtomicUsize,
	sets: AtomicUsize,
	msets: AtomicUsize,
}

/// Memory backend that counts the calls reaching the transport.
struct SpyBackend {
	inner: MemoryBackend,
	counters: Arc<Counters>,
}
impl SpyBackend {
	fn new() -> (Arc<Self>, Arc<Counters>) {
		let counters = Arc::new(Counters::default());

		(Arc::new(Self { inner: MemoryBackend::new(), counters: counters.clone() }), counters)
	}
}
impl CacheBackend for SpyBackend {
	fn connect(&self) -> BoxFuture<'_, Result<()>> {
		self.counters.connects.fetch_add(1, Ordering::SeqCst);

		self.inner.connect()
	}

	fn disconnect(&self) -> BoxFuture<'_, Result<()>> {
		self.counters.disconnects.fetch_add(1, Ordering::SeqCst);

		self.inner.disconnect()
	}

	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
		self.inner.get(key)
	}

	fn set<'a>(
		&'a self,
		key: &'a str,
		value: String,
		ttl: Option<Duration>,
	) -> BoxFuture<'a, Result<()>> {
		self.counters.sets.fetch_add(1, Ordering::SeqCst);

		self.inner.set(key, value, ttl)
	}

	fn mget<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<Vec<Option<String>>>> {
		self.inner.mget(keys)
	}

	fn mset(&self, entries: Vec<(String, String)>) -> BoxFuture<'_, Result<()>> {
		self.counters.msets.fetch_add(1, Ordering::SeqCst);

		self.inner.mset(entries)
	}

	fn purge_expired(&self) -> BoxFuture<'_, Result<usize>> {
		self.inner.purge_expired()
	}
}

/// Backend whose every operation fails.
struct BrokenBackend;
impl BrokenBackend {
	fn fail<T>() -> Result<T> {
		Err(Error::Backend { message: "connection refused".to_string() })
	}
}
impl CacheBackend for BrokenBackend {
	fn connect(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async { Ok(()) })
	}

	fn disconnect(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async { Self::fail() })
	}

	fn get<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
		Box::pin(async { Self::fail() })
	}

	fn set<'a>(
		&'a self,
		_key: &'a str,
		_value: String,
		_ttl: Option<Duration>,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async { Self::fail() })
	}

	fn mget<'a>(&'a self, _keys: &'a [String]) -> BoxFuture<'a, Result<Vec<Option<String>>>> {
		Box::pin(async { Self::fail() })
	}

	fn mset(&self, _entries: Vec<(String, String)>) -> BoxFuture<'_, Result<()>> {
		Box::pin(async { Self::fail() })
	}

	fn purge_expired(&self) -> BoxFuture<'_, Result<usize>> {
		Box::pin(async { Self::fail() })
	}
}

fn cache_config() -> wayfare_config::Cache {
	wayfare_config::Cache::default()
}

fn sample_record(id: &str) -> SearchRecord {
	let check_in = Date::from_calendar_date(2026, Month::March, 10).expect("Valid date.");
	let check_out = Date::from_calendar_date(2026, Month::March, 13).expect("Valid date.");

	SearchRecord {
		id: id.to_string(),
		search_params: SearchParams {
			destination: "Lisbon".to_string(),
			country_code: Some("PT".to_string()),
			check_in,
			check_out,
			adults: 2,
			children: 0,
			budget_min: None,
			budget_max: Some(150.0),
			currency: "EUR".to_string(),
			preferences: "pool".to_string(),
		},
		recommendations: vec![HotelMatch {
			hotel_id: "H1".to_string(),
			name: "Casa Azul".to_string(),
			match_score: 91,
			star_rating: 3.0,
			price: None,
			rationale: "Rooftop pool near the river.".to_string(),
			highlights: Vec::new(),
			gallery: Vec::new(),
			guest_insight: wayfare_domain::insight::PLACEHOLDER_INSIGHT.to_string(),
			address: String::new(),
			city: "Lisbon".to_string(),
			score_source: ScoreSource::Llm,
		}],
		insights_pending: true,
		insights: None,
		generated_at: OffsetDateTime::now_utc(),
		updated_at: None,
		performance: SearchPerformance::default(),
	}
}

fn payload_map(hotel_ids: &[&str]) -> Value {
	let map: BTreeMap<String, EnrichmentPayload> = hotel_ids
		.iter()
		.map(|hotel_id| {
			(
				hotel_id.to_string(),
				EnrichmentPayload {
					guest_insight: format!("Guests love {hotel_id}."),
					sentiment_ratings: BTreeMap::from([("location".to_string(), 9.1)]),
					insight_source: InsightSource::Llm,
					updated_at: OffsetDateTime::now_utc(),
				},
			)
		})
		.collect();

	wayfare_cache::normalize(&map)
}

#[tokio::test]
async fn connect_is_idempotent() {
	let (backend, counters) = SpyBackend::new();
	let cache = CacheClient::new(backend, &cache_config());

	assert!(cache.connect().await);
	assert!(cache.connect().await);
	assert_eq!(counters.connects.load(Ordering::SeqCst), 1);

	cache.disconnect().await;
	cache.disconnect().await;

	assert_eq!(counters.disconnects.load(Ordering::SeqCst), 1);
	assert!(!cache.is_connected());
}

#[tokio::test]
async fn concurrent_connects_share_one_handshake() {
	let (backend, counters) = SpyBackend::new();
	let cache = Arc::new(CacheClient::new(backend, &cache_config()));
	let mut handles = Vec::new();

	for _ in 0..8 {
		let cache = cache.clone();

		handles.push(tokio::spawn(async move { cache.connect().await }));
	}
	for handle in handles {
		assert!(handle.await.expect("Connect task panicked."));
	}

	assert_eq!(counters.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn backend_failures_degrade_to_miss_and_false() {
	let cache = CacheClient::new(Arc::new(BrokenBackend), &cache_config());

	assert_eq!(cache.get::<Value>("anything").await, None);
	assert!(!cache.set("anything", &serde_json::json!({ "a": 1 }), None).await);
	assert_eq!(cache.mget::<Value>(&["a", "b"]).await, vec![None, None]);
	assert!(!cache.mset(&[CacheEntry { key: "a".to_string(), value: 1, ttl: None }]).await);
	assert_eq!(cache.purge_expired().await, 0);
	assert!(cache.get_search_record("missing").await.is_none());
}

#[tokio::test]
async fn undecodable_values_read_as_misses() {
	let cache = CacheClient::in_memory(&cache_config());

	assert!(cache.set("hotel:detail:H9", &serde_json::json!({ "images": "not a list" }), None).await);
	assert!(cache.get_hotel_detail("H9").await.is_none());
}

#[derive(Serialize)]
struct Node {
	label: String,
	next: RefCell<Option<Rc<Node>>>,
}

#[tokio::test]
async fn cyclic_values_round_trip_without_failing() {
	let cache = CacheClient::in_memory(&cache_config());
	let a = Rc::new(Node { label: "a".to_string(), next: RefCell::new(None) });
	let b = Rc::new(Node { label: "b".to_string(), next: RefCell::new(Some(a.clone())) });

	*a.next.borrow_mut() = Some(b.clone());

	let stored = cache.set("graph", &a, None).await;

	*a.next.borrow_mut() = None;

	assert!(stored);

	let loaded: Value = cache.get("graph").await.expect("Graph must load.");

	assert_eq!(loaded["label"], "a");
	assert_eq!(loaded["next"]["label"], "b");
	assert_eq!(loaded["next"]["next"]["label"], "a");
	assert_eq!(loaded["next"]["next"]["next"], CIRCULAR);
}

struct Callback;
impl Serialize for Callback {
	fn serialize<S>(&self, _serializer: S) -> std::result::Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		Err(S::Error::custom("callbacks cannot be cached"))
	}
}

#[derive(Serialize)]
struct Job {
	name: String,
	on_done: Callback,
	retries: Option<u32>,
	marker: (),
	ratio: f64,
	huge: u128,
	by_slot: HashMap<u32, String>,
}

#[derive(Debug, Deserialize)]
struct LoadedJob {
	name: String,
	on_done: String,
	retries: Option<u32>,
	marker: Option<u32>,
	ratio: Option<f64>,
	huge: String,
	by_slot: BTreeMap<String, String>,
}

#[tokio::test]
async fn exotic_members_are_replaced_with_stand_ins() {
	let cache = CacheClient::in_memory(&cache_config());
	let job = Job {
		name: "enrich".to_string(),
		on_done: Callback,
		retries: None,
		marker: (),
		ratio: f64::NAN,
		huge: u128::MAX,
		by_slot: HashMap::from([(7, "seven".to_string())]),
	};

	assert!(cache.set("job", &job, None).await);

	let loaded: LoadedJob = cache.get("job").await.expect("Job must load.");

	assert_eq!(loaded.name, "enrich");
	assert_eq!(loaded.on_done, UNSERIALIZABLE);
	assert_eq!(loaded.retries, None);
	assert_eq!(loaded.marker, None);
	assert_eq!(loaded.ratio, None);
	assert_eq!(loaded.huge, u128::MAX.to_string());
	assert_eq!(loaded.by_slot.get("7").map(String::as_str), Some("seven"));
}

#[tokio::test(start_paused = true)]
async fn entries_expire_after_their_ttl() {
	let cache = CacheClient::in_memory(&cache_config());

	assert!(cache.set("short", &"lived", Some(Duration::from_secs(60))).await);
	assert!(cache.set("forever", &"kept", None).await);

	tokio::time::advance(Duration::from_secs(59)).await;

	assert_eq!(cache.get::<String>("short").await.as_deref(), Some("lived"));

	tokio::time::advance(Duration::from_secs(2)).await;

	assert_eq!(cache.get::<String>("short").await, None);
	assert_eq!(cache.get::<String>("forever").await.as_deref(), Some("kept"));
}

#[tokio::test(start_paused = true)]
async fn purge_removes_only_expired_entries() {
	let cache = CacheClient::in_memory(&cache_config());

	cache.set("a", &1, Some(Duration::from_secs(5))).await;
	cache.set("b", &2, Some(Duration::from_secs(50))).await;
	cache.set("c", &3, None).await;

	tokio::time::advance(Duration::from_secs(10)).await;

	assert_eq!(cache.purge_expired().await, 1);
	assert_eq!(cache.mget::<u32>(&["a", "b", "c"]).await, vec![None, Some(2), Some(3)]);
}

#[tokio::test]
async fn mset_writes_ttl_entries_individually_and_the_rest_in_one_batch() {
	let (backend, counters) = SpyBackend::new();
	let cache = CacheClient::new(backend, &cache_config());
	let ttl = Some(Duration::from_secs(30));
	let entries = vec![
		CacheEntry { key: "t1".to_string(), value: 1, ttl },
		CacheEntry { key: "n1".to_string(), value: 2, ttl: None },
		CacheEntry { key: "t2".to_string(), value: 3, ttl },
		CacheEntry { key: "n2".to_string(), value: 4, ttl: None },
		CacheEntry { key: "n3".to_string(), value: 5, ttl: None },
	];

	assert!(cache.mset(&entries).await);
	assert_eq!(counters.sets.load(Ordering::SeqCst), 2);
	assert_eq!(counters.msets.load(Ordering::SeqCst), 1);
	assert_eq!(
		cache.mget::<u32>(&["t1", "n1", "t2", "n2", "n3", "zz"]).await,
		vec![Some(1), Some(2), Some(3), Some(4), Some(5), None]
	);
}

#[tokio::test]
async fn keys_are_namespaced() {
	let backend = Arc::new(MemoryBackend::new());
	let cache = CacheClient::new(backend.clone(), &cache_config());

	cache.set("search:abc", &1, None).await;

	let raw = backend.get("wayfare:search:abc").await.expect("Backend is open.");

	assert_eq!(raw.as_deref(), Some("1"));
}

#[tokio::test]
async fn merge_into_missing_record_is_a_no_op() {
	let (backend, counters) = SpyBackend::new();
	let cache = CacheClient::new(backend, &cache_config());
	let outcome = cache
		.update_search_enrichment("gone", &payload_map(&["H1"]))
		.await
		.expect("Missing records are not an error.");

	assert_eq!(outcome, MergeOutcome::Missing);
	assert_eq!(counters.sets.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn merge_rejects_non_map_payloads_without_touching_the_record() {
	let cache = CacheClient::in_memory(&cache_config());
	let record = sample_record("s-1");

	assert!(cache.set_search_record(&record).await);

	let err = cache
		.update_search_enrichment("s-1", &serde_json::json!("not a map"))
		.await
		.expect_err("Strings are rejected.");

	assert!(matches!(err, Error::InvalidPayload { .. }));
	assert_eq!(cache.get_search_record("s-1").await, Some(record));
}

#[tokio::test]
async fn merge_flips_pending_and_keeps_existing_insights() {
	let cache = CacheClient::in_memory(&cache_config());

	assert!(cache.set_search_record(&sample_record("s-2")).await);

	let first = cache
		.update_search_enrichment("s-2", &payload_map(&["H1"]))
		.await
		.expect("Merge must succeed.");

	assert_eq!(first, MergeOutcome::Merged { hotel_count: 1 });

	let second = cache
		.update_search_enrichment("s-2", &payload_map(&["H2"]))
		.await
		.expect("Merge must succeed.");

	assert_eq!(second, MergeOutcome::Merged { hotel_count: 1 });

	let record = cache.get_search_record("s-2").await.expect("Record must exist.");
	let insights = record.insights.expect("Insights must be present.");

	assert!(!record.insights_pending);
	assert!(record.updated_at.is_some());
	assert_eq!(insights.keys().collect::<Vec<_>>(), vec!["H1", "H2"]);
	assert_eq!(insights["H1"].guest_insight, "Guests love H1.");
}
