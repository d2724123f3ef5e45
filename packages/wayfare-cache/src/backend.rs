use std::{
	collections::HashMap,
	future::Future,
	pin::Pin,
	sync::atomic::{AtomicBool, Ordering},
	time::Duration,
};

use tokio::{sync::RwLock, time::Instant};

use crate::{Error, Result};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Transport seam for the cache. Values cross it as encoded JSON text.
pub trait CacheBackend
where
	Self: Send + Sync,
{
	fn connect(&self) -> BoxFuture<'_, Result<()>>;

	fn disconnect(&self) -> BoxFuture<'_, Result<()>>;

	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>>;

	fn set<'a>(
		&'a self,
		key: &'a str,
		value: String,
		ttl: Option<Duration>,
	) -> BoxFuture<'a, Result<()>>;

	fn mget<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<Vec<Option<String>>>>;

	/// Stores every entry without expiry in one round trip.
	fn mset(&self, entries: Vec<(String, String)>) -> BoxFuture<'_, Result<()>>;

	/// Drops expired entries and returns how many were removed.
	fn purge_expired(&self) -> BoxFuture<'_, Result<usize>>;
}

struct StoredValue {
	raw: String,
	expires_at: Option<Instant>,
}
impl StoredValue {
	fn is_live(&self, now: Instant) -> bool {
		self.expires_at.map(|expires_at| expires_at > now).unwrap_or(true)
	}
}

/// Process-local backend with lazy expiry on read and eager expiry on purge.
///
/// Behaves like a network store: every operation fails until `connect` has been called.
#[derive(Default)]
pub struct MemoryBackend {
	open: AtomicBool,
	entries: RwLock<HashMap<String, StoredValue>>,
}
impl MemoryBackend {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn len(&self) -> usize {
		let now = Instant::now();

		self.entries.read().await.values().filter(|value| value.is_live(now)).count()
	}

	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}

	fn ensure_open(&self) -> Result<()> {
		if self.open.load(Ordering::Acquire) {
			return Ok(());
		}

		Err(Error::Backend { message: "Memory backend is not connected.".to_string() })
	}
}

impl CacheBackend for MemoryBackend {
	fn connect(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			self.open.store(true, Ordering::Release);

			Ok(())
		})
	}

	fn disconnect(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			self.open.store(false, Ordering::Release);

			Ok(())
		})
	}

	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
		Box::pin(async move {
			self.ensure_open()?;

			let now = Instant::now();
			{
				let entries = self.entries.read().await;

				match entries.get(key) {
					Some(value) if value.is_live(now) => return Ok(Some(value.raw.clone())),
					Some(_) => {},
					None => return Ok(None),
				}
			}

			let mut entries = self.entries.write().await;

			if entries.get(key).map(|value| !value.is_live(now)).unwrap_or(false) {
				entries.remove(key);
			}

			Ok(None)
		})
	}

	fn set<'a>(
		&'a self,
		key: &'a str,
		value: String,
		ttl: Option<Duration>,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.ensure_open()?;

			let expires_at = ttl.map(|ttl| Instant::now() + ttl);

			self.entries.write().await.insert(key.to_string(), StoredValue { raw: value, expires_at });

			Ok(())
		})
	}

	fn mget<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<Vec<Option<String>>>> {
		Box::pin(async move {
			self.ensure_open()?;

			let now = Instant::now();
			let entries = self.entries.read().await;

			Ok(keys
				.iter()
				.map(|key| {
					entries.get(key).filter(|value| value.is_live(now)).map(|value| value.raw.clone())
				})
				.collect())
		})
	}

	fn mset(&self, entries: Vec<(String, String)>) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			self.ensure_open()?;

			let mut stored = self.entries.write().await;

			for (key, raw) in entries {
				stored.insert(key, StoredValue { raw, expires_at: None });
			}

			Ok(())
		})
	}

	fn purge_expired(&self) -> BoxFuture<'_, Result<usize>> {
		Box::pin(async move {
			self.ensure_open()?;

			let now = Instant::now();
			let mut entries = self.entries.write().await;
			let before = entries.len();

			entries.retain(|_, value| value.is_live(now));

			Ok(before - entries.len())
		})
	}
}
