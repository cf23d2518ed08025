//! Optional observability helpers for broker operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `registry_token_broker.op` with the `op`
//!   and `stage` (call site) fields, plus retry and lifecycle events.
//! - Enable `metrics` to increment the `registry_token_broker_operation_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Broker operations observed by spans and counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Reading the engine configuration.
	ConfigRead,
	/// Writing the engine configuration.
	ConfigWrite,
	/// Deleting the engine configuration.
	ConfigDelete,
	/// Reading a role.
	RoleRead,
	/// Creating or updating a role.
	RoleWrite,
	/// Deleting a role.
	RoleDelete,
	/// Listing role names.
	RoleList,
	/// Issuing a credential for a role, retries included.
	Issue,
	/// One token exchange against the auth server.
	Exchange,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::ConfigRead => "config_read",
			OpKind::ConfigWrite => "config_write",
			OpKind::ConfigDelete => "config_delete",
			OpKind::RoleRead => "role_read",
			OpKind::RoleWrite => "role_write",
			OpKind::RoleDelete => "role_delete",
			OpKind::RoleList => "role_list",
			OpKind::Issue => "issue",
			OpKind::Exchange => "exchange",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to a broker operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}

	/// Maps a result onto its terminal outcome.
	pub fn of<T>(result: &Result<T>) -> Self {
		if result.is_ok() { OpOutcome::Success } else { OpOutcome::Failure }
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside an operation span and records attempt plus terminal outcome.
pub async fn observe<F, T>(kind: OpKind, stage: &'static str, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	let span = OpSpan::new(kind, stage);

	record_outcome(kind, OpOutcome::Attempt);

	let result = span.instrument(fut).await;

	record_outcome(kind, OpOutcome::of(&result));

	result
}
