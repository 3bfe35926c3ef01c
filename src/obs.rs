//! Optional observability helpers for backplane operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `backplane.op` with the `op` and `stage`
//!   fields, plus degrade/publish warnings.
//! - Enable `metrics` to increment the `backplane_op_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Backplane operations observed by spans and metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Admission-control decision.
	Admission,
	/// Access + refresh pair issuance.
	IssuePair,
	/// Stateless access verification.
	VerifyAccess,
	/// Single-use refresh rotation.
	RotateRefresh,
	/// Refresh revocation (logout).
	Revoke,
	/// Cache-aside read.
	CacheRead,
	/// Write-time cache invalidation.
	CacheInvalidate,
	/// Domain event publication.
	Publish,
	/// Domain event consumption.
	Consume,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::Admission => "admission",
			OpKind::IssuePair => "issue_pair",
			OpKind::VerifyAccess => "verify_access",
			OpKind::RotateRefresh => "rotate_refresh",
			OpKind::Revoke => "revoke",
			OpKind::CacheRead => "cache_read",
			OpKind::CacheInvalidate => "cache_invalidate",
			OpKind::Publish => "publish",
			OpKind::Consume => "consume",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to a backplane operation.
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

	/// Maps a result reference onto the success/failure label.
	pub fn from_result<T, E>(result: &Result<T, E>) -> Self {
		match result {
			Ok(_) => Self::Success,
			Err(_) => Self::Failure,
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
