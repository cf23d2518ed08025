//! Bounded retry with Fibonacci or exponential backoff.
//!
//! [`RetryPolicy::run`] re-invokes a fallible async operation while it keeps failing with
//! [retryable](crate::error::Error::is_retryable) errors. Cancellation is checked before
//! every attempt and during every backoff sleep, so a fired token never starts another
//! attempt. Sleeps only suspend the calling task.

// std
use std::time::Duration;
// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{_prelude::*, obs};

/// Maps a retry index to the delay slept before that retry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Backoff {
	/// Delays follow the Fibonacci sequence: 1, 1, 2, 3, 5, 8 times the interval.
	#[default]
	Fibonacci,
	/// Delays double each retry: 1, 2, 4, 8, 16 times the interval.
	Exponential,
}
impl Backoff {
	/// Delay before retry number `retry` (zero-based), scaled by `interval`.
	pub fn delay(self, interval: Duration, retry: u32) -> Duration {
		let factor = match self {
			Backoff::Fibonacci => fibonacci(retry),
			Backoff::Exponential => 1_u64.checked_shl(retry).unwrap_or(u64::MAX),
		};

		interval.saturating_mul(u32::try_from(factor).unwrap_or(u32::MAX))
	}

	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Backoff::Fibonacci => "fibonacci",
			Backoff::Exponential => "exponential",
		}
	}
}

/// Retry budget and backoff shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Delay strategy between attempts.
	pub backoff: Backoff,
	/// Base delay the strategy scales.
	pub interval: Duration,
	/// Retries after the first attempt.
	pub max_retries: u32,
}
impl RetryPolicy {
	/// Base delay used by the built-in constructors.
	pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);
	/// Retries allowed by the built-in constructors.
	pub const DEFAULT_MAX_RETRIES: u32 = 5;

	/// Fibonacci backoff, 100 ms interval, 5 retries. Used for credential issuance.
	pub const fn fibonacci() -> Self {
		Self {
			backoff: Backoff::Fibonacci,
			interval: Self::DEFAULT_INTERVAL,
			max_retries: Self::DEFAULT_MAX_RETRIES,
		}
	}

	/// Exponential backoff, 100 ms interval, 5 retries.
	pub const fn exponential() -> Self {
		Self {
			backoff: Backoff::Exponential,
			interval: Self::DEFAULT_INTERVAL,
			max_retries: Self::DEFAULT_MAX_RETRIES,
		}
	}

	/// Overrides the base delay.
	pub const fn with_interval(mut self, interval: Duration) -> Self {
		self.interval = interval;

		self
	}

	/// Overrides the retry count.
	pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;

		self
	}

	/// Total attempts, including the first.
	pub const fn max_attempts(&self) -> u32 {
		self.max_retries.saturating_add(1)
	}

	/// Runs `op` until it succeeds, fails with a non-retryable error, exhausts the budget, or
	/// `cancel` fires.
	///
	/// Non-retryable errors are returned as-is. Exhaustion returns
	/// [`Error::RetriesExhausted`] carrying the last error; cancellation returns
	/// [`Error::Cancelled`].
	pub async fn run<F, Fut, T>(&self, cancel: &CancellationToken, mut op: F) -> Result<T>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let mut attempt = 0;

		loop {
			if cancel.is_cancelled() {
				return Err(Error::Cancelled);
			}

			attempt += 1;

			let err = match op().await {
				Ok(value) => return Ok(value),
				Err(err) if !err.is_retryable() => return Err(err),
				Err(err) => err,
			};

			if attempt >= self.max_attempts() {
				obs::retries_exhausted(attempt, &err);

				return Err(Error::RetriesExhausted { attempts: attempt, source: Box::new(err) });
			}

			let delay = self.backoff.delay(self.interval, attempt - 1);

			obs::retrying(self.backoff, attempt, self.max_attempts(), delay, &err);

			tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(Error::Cancelled),
				_ = tokio::time::sleep(delay) => {},
			}
		}
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self::fibonacci()
	}
}

fn fibonacci(n: u32) -> u64 {
	let (mut current, mut next) = (1_u64, 1_u64);

	for _ in 0..n {
		(current, next) = (next, current.saturating_add(next));
	}

	current
}
