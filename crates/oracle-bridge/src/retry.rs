//! Retries with exponential backoff for bridge requests.

use crate::BridgeError;
use backoff::{backoff::Backoff, ExponentialBackoff};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retries transient failures with exponential backoff, capped both by a
/// number of attempts and by a total elapsed time of 30 seconds.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
	backoff: ExponentialBackoff,
	max_retries: u32,
}

impl RetryPolicy {
	pub fn new(max_retries: u32) -> Self {
		let backoff = ExponentialBackoff {
			max_elapsed_time: Some(Duration::from_secs(30)),
			..Default::default()
		};

		Self {
			backoff,
			max_retries,
		}
	}

	pub fn with_initial_interval(mut self, interval: Duration) -> Self {
		self.backoff.initial_interval = interval;
		self.backoff.current_interval = interval;
		self
	}

	pub fn max_retries(&self) -> u32 {
		self.max_retries
	}

	/// Runs `request` until it succeeds, fails permanently or retries run out.
	pub async fn run<T, F, Fut>(&self, operation: &str, mut request: F) -> Result<T, BridgeError>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, BridgeError>>,
	{
		let mut backoff = self.backoff.clone();
		backoff.reset();
		let mut attempts = 0;

		loop {
			let e = match request().await {
				Ok(result) => return Ok(result),
				Err(e) if !e.is_transient() => return Err(e),
				Err(e) => e,
			};

			attempts += 1;
			if attempts > self.max_retries {
				warn!("{} failed after {} attempts, giving up: {}", operation, attempts, e);
				return Err(e);
			}

			match backoff.next_backoff() {
				Some(delay) => {
					warn!(
						"{} failed, attempt {}/{}, retrying in {:?}: {}",
						operation, attempts, self.max_retries, delay, e
					);
					tokio::time::sleep(delay).await;
				}
				None => {
					warn!("{} failed, backoff exhausted after {} attempts: {}", operation, attempts, e);
					return Err(e);
				}
			}
		}
	}
}
