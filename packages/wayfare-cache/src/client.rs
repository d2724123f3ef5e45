use std::{
	collections::BTreeMap,
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	time::Duration,
};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::{CacheBackend, Error, MemoryBackend, Result, normalize::normalize};
use wayfare_domain::{EnrichmentPayload, HotelDetail, SearchRecord, SentimentAnalysis};

/// One entry for [`CacheClient::mset`].
#[derive(Clone, Debug)]
pub struct CacheEntry<T> {
	pub key: String,
	pub value: T,
	pub ttl: Option<Duration>,
}

/// Expiry applied by the namespaced helpers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TtlPolicy {
	pub hotel_detail: Duration,
	pub hotel_sentiment: Duration,
	pub search_record: Duration,
}
impl TtlPolicy {
	pub fn from_config(cfg: &wayfare_config::Cache) -> Self {
		Self {
			hotel_detail: Duration::from_secs(cfg.detail_ttl_seconds),
			hotel_sentiment: Duration::from_secs(cfg.sentiment_ttl_seconds),
			search_record: Duration::from_secs(cfg.search_ttl_seconds),
		}
	}
}
impl Default for TtlPolicy {
	fn default() -> Self {
		Self::from_config(&wayfare_config::Cache::default())
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
	Merged { hotel_count: usize },
	/// The record expired or never existed; nothing was written.
	Missing,
	/// The record was read but could not be written back.
	Unavailable,
}

/// Cache facade used by the rest of the system.
///
/// Reads degrade to `None` and writes to `false`; no backend or codec failure escapes.
pub struct CacheClient {
	backend: Arc<dyn CacheBackend>,
	namespace: String,
	ttl: TtlPolicy,
	connected: AtomicBool,
	handshake: Mutex<()>,
}
impl CacheClient {
	pub fn new(backend: Arc<dyn CacheBackend>, cfg: &wayfare_config::Cache) -> Self {
		Self {
			backend,
			namespace: cfg.namespace.clone(),
			ttl: TtlPolicy::from_config(cfg),
			connected: AtomicBool::new(false),
			handshake: Mutex::new(()),
		}
	}

	pub fn in_memory(cfg: &wayfare_config::Cache) -> Self {
		Self::new(Arc::new(MemoryBackend::new()), cfg)
	}

	pub fn ttl(&self) -> TtlPolicy {
		self.ttl
	}

	pub fn is_connected(&self) -> bool {
		self.connected.load(Ordering::Acquire)
	}

	/// Opens the backend once; later calls return immediately while connected.
	pub async fn connect(&self) -> bool {
		if self.is_connected() {
			return true;
		}

		let _guard = self.handshake.lock().await;

		if self.is_connected() {
			return true;
		}

		match self.backend.connect().await {
			Ok(()) => {
				self.connected.store(true, Ordering::Release);

				tracing::info!(namespace = %self.namespace, "Cache connected.");

				true
			},
			Err(err) => {
				tracing::warn!(error = %err, "Cache connect failed.");

				false
			},
		}
	}

	pub async fn disconnect(&self) {
		if !self.is_connected() {
			return;
		}

		let _guard = self.handshake.lock().await;

		if !self.is_connected() {
			return;
		}
		if let Err(err) = self.backend.disconnect().await {
			tracing::warn!(error = %err, "Cache disconnect failed.");
		}

		self.connected.store(false, Ordering::Release);

		tracing::info!(namespace = %self.namespace, "Cache disconnected.");
	}

	pub async fn get<T>(&self, key: &str) -> Option<T>
	where
		T: DeserializeOwned,
	{
		if !self.connect().await {
			return None;
		}

		let full_key = self.key(key);
		let raw = match self.backend.get(&full_key).await {
			Ok(Some(raw)) => raw,
			Ok(None) => return None,
			Err(err) => {
				tracing::warn!(key = %full_key, error = %err, "Cache read failed.");

				return None;
			},
		};

		decode(&full_key, &raw)
	}

	pub async fn set<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool
	where
		T: ?Sized + Serialize,
	{
		if !self.connect().await {
			return false;
		}

		let full_key = self.key(key);
		let Some(raw) = encode(&full_key, value) else {
			return false;
		};

		match self.backend.set(&full_key, raw, ttl).await {
			Ok(()) => true,
			Err(err) => {
				tracing::warn!(key = %full_key, error = %err, "Cache write failed.");

				false
			},
		}
	}

	pub async fn mget<T>(&self, keys: &[&str]) -> Vec<Option<T>>
	where
		T: DeserializeOwned,
	{
		let misses = || -> Vec<Option<T>> { keys.iter().map(|_| None).collect() };

		if keys.is_empty() || !self.connect().await {
			return misses();
		}

		let full_keys: Vec<String> = keys.iter().map(|key| self.key(key)).collect();
		let raws = match self.backend.mget(&full_keys).await {
			Ok(raws) if raws.len() == full_keys.len() => raws,
			Ok(raws) => {
				tracing::warn!(
					expected = full_keys.len(),
					actual = raws.len(),
					"Cache batch read returned a mismatched result count."
				);

				return misses();
			},
			Err(err) => {
				tracing::warn!(error = %err, "Cache batch read failed.");

				return misses();
			},
		};

		full_keys
			.iter()
			.zip(raws)
			.map(|(key, raw)| raw.and_then(|raw| decode(key, &raw)))
			.collect()
	}

	/// Entries with a TTL are written one by one; the rest go out as a single batch.
	pub async fn mset<T>(&self, entries: &[CacheEntry<T>]) -> bool
	where
		T: Serialize,
	{
		if entries.is_empty() {
			return true;
		}
		if !self.connect().await {
			return false;
		}

		let mut ok = true;
		let mut batch = Vec::new();

		for entry in entries {
			let full_key = self.key(&entry.key);
			let Some(raw) = encode(&full_key, &entry.value) else {
				ok = false;

				continue;
			};

			match entry.ttl {
				Some(ttl) =>
					if let Err(err) = self.backend.set(&full_key, raw, Some(ttl)).await {
						tracing::warn!(key = %full_key, error = %err, "Cache write failed.");

						ok = false;
					},
				None => batch.push((full_key, raw)),
			}
		}

		if !batch.is_empty()
			&& let Err(err) = self.backend.mset(batch).await
		{
			tracing::warn!(error = %err, "Cache batch write failed.");

			ok = false;
		}

		ok
	}

	pub async fn purge_expired(&self) -> usize {
		if !self.connect().await {
			return 0;
		}

		match self.backend.purge_expired().await {
			Ok(count) => count,
			Err(err) => {
				tracing::warn!(error = %err, "Cache purge failed.");

				0
			},
		}
	}

	pub async fn get_hotel_detail(&self, hotel_id: &str) -> Option<HotelDetail> {
		self.get(&hotel_detail_key(hotel_id)).await
	}

	pub async fn set_hotel_detail(&self, detail: &HotelDetail) -> bool {
		self.set(&hotel_detail_key(&detail.hotel_id), detail, Some(self.ttl.hotel_detail)).await
	}

	pub async fn get_hotel_sentiment(&self, hotel_id: &str) -> Option<SentimentAnalysis> {
		self.get(&hotel_sentiment_key(hotel_id)).await
	}

	pub async fn set_hotel_sentiment(&self, sentiment: &SentimentAnalysis) -> bool {
		self.set(
			&hotel_sentiment_key(&sentiment.hotel_id),
			sentiment,
			Some(self.ttl.hotel_sentiment),
		)
		.await
	}

	pub async fn get_search_record(&self, search_id: &str) -> Option<SearchRecord> {
		self.get(&search_record_key(search_id)).await
	}

	pub async fn set_search_record(&self, record: &SearchRecord) -> bool {
		self.set(&search_record_key(&record.id), record, Some(self.ttl.search_record)).await
	}

	/// Read, validate, merge, write.
	///
	/// A missing record is reported as [`MergeOutcome::Missing`] with no write. A payload that is
	/// not a map of hotel id to [`EnrichmentPayload`] is rejected with [`Error::InvalidPayload`]
	/// and leaves the record untouched. On success the record's insights gain every key of the
	/// payload, `insights_pending` becomes false and `updated_at` is stamped.
	pub async fn update_search_enrichment(
		&self,
		search_id: &str,
		insights: &Value,
	) -> Result<MergeOutcome> {
		let Some(mut record) = self.get_search_record(search_id).await else {
			tracing::info!(search_id, "Search record is gone; enrichment merge skipped.");

			return Ok(MergeOutcome::Missing);
		};
		let incoming = decode_enrichment(insights)?;
		let hotel_count = incoming.len();

		record.insights.get_or_insert_with(BTreeMap::new).extend(incoming);
		record.insights_pending = false;
		record.updated_at = Some(OffsetDateTime::now_utc());

		if !self.set_search_record(&record).await {
			return Ok(MergeOutcome::Unavailable);
		}

		tracing::info!(search_id, hotel_count, "Search enrichment merged.");

		Ok(MergeOutcome::Merged { hotel_count })
	}

	fn key(&self, key: &str) -> String {
		format!("{}:{key}", self.namespace)
	}
}

pub fn hotel_detail_key(hotel_id: &str) -> String {
	format!("hotel:detail:{hotel_id}")
}

pub fn hotel_sentiment_key(hotel_id: &str) -> String {
	format!("hotel:sentiment:{hotel_id}")
}

pub fn search_record_key(search_id: &str) -> String {
	format!("search:{search_id}")
}

/// Validates the merge payload shape: an object keyed by non-empty hotel ids whose values are
/// enrichment payloads.
pub fn decode_enrichment(insights: &Value) -> Result<BTreeMap<String, EnrichmentPayload>> {
	let Value::Object(map) = insights else {
		return Err(Error::InvalidPayload {
			message: format!("expected an object keyed by hotel id, got {}", kind_of(insights)),
		});
	};
	let mut out = BTreeMap::new();

	for (hotel_id, payload) in map {
		if hotel_id.trim().is_empty() {
			return Err(Error::InvalidPayload { message: "hotel id must be non-empty".to_string() });
		}

		let payload: EnrichmentPayload =
			serde_json::from_value(payload.clone()).map_err(|err| Error::InvalidPayload {
				message: format!("entry {hotel_id} is not an enrichment payload: {err}"),
			})?;

		out.insert(hotel_id.clone(), payload);
	}

	Ok(out)
}

fn kind_of(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "an array",
		Value::Object(_) => "an object",
	}
}

fn encode<T>(key: &str, value: &T) -> Option<String>
where
	T: ?Sized + Serialize,
{
	match serde_json::to_string(&normalize(value)).map_err(Error::Encode) {
		Ok(raw) => Some(raw),
		Err(err) => {
			tracing::warn!(key, error = %err, "Cache value could not be encoded.");

			None
		},
	}
}

fn decode<T>(key: &str, raw: &str) -> Option<T>
where
	T: DeserializeOwned,
{
	match serde_json::from_str(raw).map_err(Error::Decode) {
		Ok(value) => Some(value),
		Err(err) => {
			tracing::warn!(key, error = %err, "Cache value could not be decoded.");

			None
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn enrichment_payload_must_be_an_object() {
		let err = decode_enrichment(&serde_json::json!(["H1"])).expect_err("Arrays are rejected.");

		assert!(matches!(err, Error::InvalidPayload { .. }));
		assert_eq!(
			err.to_string(),
			"Invalid enrichment payload: expected an object keyed by hotel id, got an array"
		);
	}

	#[test]
	fn enrichment_entries_must_match_the_payload_schema() {
		let err = decode_enrichment(&serde_json::json!({ "H1": { "guest_insight": 42 } }))
			.expect_err("Malformed entries are rejected.");

		assert!(matches!(err, Error::InvalidPayload { .. }));
	}

	#[test]
	fn well_formed_enrichment_decodes() {
		let decoded = decode_enrichment(&serde_json::json!({
			"H1": {
				"guest_insight": "Quiet rooms.",
				"sentiment_ratings": { "cleanliness": 9.0 },
				"insight_source": "llm",
				"updated_at": "2026-03-01T10:00:00Z"
			}
		}))
		.expect("Payload must decode.");

		assert_eq!(decoded["H1"].guest_insight, "Quiet rooms.");
	}
}
