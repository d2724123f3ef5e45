use std::{
	future::Future,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};

use tokio::sync::Notify;

use crate::Result;

/// Owns background jobs that outlive the request that started them.
///
/// Jobs are tracked until they settle; their errors and panics are logged here since there is no
/// caller left to report to.
#[derive(Clone, Default)]
pub struct TaskRunner {
	inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
	in_flight: AtomicUsize,
	idle: Notify,
}

impl TaskRunner {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn in_flight(&self) -> usize {
		self.inner.in_flight.load(Ordering::Acquire)
	}

	pub fn spawn<F>(&self, name: &'static str, job: F)
	where
		F: Future<Output = Result<()>> + Send + 'static,
	{
		let inner = self.inner.clone();

		inner.in_flight.fetch_add(1, Ordering::AcqRel);

		tokio::spawn(async move {
			match tokio::spawn(job).await {
				Ok(Ok(())) => tracing::debug!(task = name, "Background task finished."),
				Ok(Err(err)) => tracing::error!(task = name, error = %err, "Background task failed."),
				Err(err) => tracing::error!(task = name, error = %err, "Background task panicked."),
			}

			if inner.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
				inner.idle.notify_waiters();
			}
		});
	}

	/// Resolves once no job is in flight.
	pub async fn wait_idle(&self) {
		loop {
			let notified = self.inner.idle.notified();

			tokio::pin!(notified);

			notified.as_mut().enable();

			if self.in_flight() == 0 {
				return;
			}

			notified.await;
		}
	}
}
