// std
use std::time::Duration as StdDuration;
// self
use crate::{_prelude::*, obs::OpKind, retry::Backoff};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// A span builder used by broker operations.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Creates a new span tagged with the provided operation + stage.
	pub fn new(kind: OpKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("registry_token_broker.op", op = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs a failed attempt that will be retried after `delay`.
pub fn retrying(backoff: Backoff, attempt: u32, max_attempts: u32, delay: StdDuration, err: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			backoff = backoff.as_str(),
			attempt,
			max_attempts,
			delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
			error = %err,
			"Attempt failed; retrying."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (backoff, attempt, max_attempts, delay, err);
	}
}

/// Logs the final failure once the retry budget is spent.
pub fn retries_exhausted(attempts: u32, err: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(attempts, error = %err, "Retry budget exhausted.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (attempts, err);
	}
}

/// Logs a lifecycle transition such as `started` or `stopped`.
pub fn lifecycle(event: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(event, "Broker lifecycle changed.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = event;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::ConfigError;

	#[test]
	fn log_helpers_accept_any_error() {
		let err = Error::from(ConfigError::MissingEndpoint);

		retrying(Backoff::Fibonacci, 1, 6, StdDuration::from_millis(100), &err);
		retries_exhausted(6, &err);
		lifecycle("stopped");
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = OpSpan::new(OpKind::Exchange, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
