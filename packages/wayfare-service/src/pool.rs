use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Fixed-capacity gate for one category of external call.
///
/// Waiters are served in submission order.
#[derive(Clone)]
pub struct Pool {
	name: &'static str,
	capacity: usize,
	semaphore: Arc<Semaphore>,
}
impl Pool {
	pub fn new(name: &'static str, capacity: usize) -> Self {
		let capacity = capacity.max(1);

		Self { name, capacity, semaphore: Arc::new(Semaphore::new(capacity)) }
	}

	pub fn name(&self) -> &'static str {
		self.name
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	pub fn available(&self) -> usize {
		self.semaphore.available_permits()
	}

	pub fn in_use(&self) -> usize {
		self.capacity - self.available()
	}

	/// Waits for a slot. The slot is released when the permit drops.
	pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
		match self.semaphore.clone().acquire_owned().await {
			Ok(permit) => Some(permit),
			Err(err) => {
				tracing::warn!(pool = self.name, error = %err, "Pool is closed.");

				None
			},
		}
	}
}

/// One pool per call category so a slow category cannot starve the other.
#[derive(Clone)]
pub struct Pools {
	pub detail: Pool,
	pub sentiment: Pool,
}
impl Pools {
	pub fn from_config(cfg: &wayfare_config::Pools) -> Self {
		Self {
			detail: Pool::new("detail", cfg.detail_concurrency as usize),
			sentiment: Pool::new("sentiment", cfg.sentiment_concurrency as usize),
		}
	}
}
