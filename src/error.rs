//! Error taxonomy shared by every service edge that consumes the backplane.

// self
use crate::{_prelude::*, admission::PolicyKind, asset::AssetHostError, event::BrokerError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical backplane error exposed by public APIs.
///
/// Each variant maps onto exactly one envelope status class via
/// [`Error::status`]; boundaries render the variant with
/// [`Error::public_message`] so internal detail never leaks to callers.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Caller-correctable request problem.
	#[error("Validation failed: {message}.")]
	Validation {
		/// Human-readable description safe to return to the caller.
		message: String,
	},
	/// Missing, invalid, or expired credential.
	#[error(transparent)]
	Authentication(#[from] AuthError),
	/// Admission control rejected the request before it reached a handler.
	#[error("Rate limit exceeded by the {policy} policy.")]
	AdmissionRejected {
		/// Policy that tripped.
		policy: PolicyKind,
		/// Seconds-granularity hint for when a retry may succeed.
		retry_after: Option<Duration>,
	},
	/// Requested resource does not exist.
	#[error("{resource} not found.")]
	NotFound {
		/// Resource label rendered into the envelope message.
		resource: String,
	},
	/// A collaborating store, broker, or asset host failed or timed out.
	#[error(transparent)]
	External(#[from] ExternalError),
	/// Unexpected fault; logged with full context, returned as a generic 500.
	#[error("Internal fault: {message}.")]
	Internal {
		/// Internal diagnostic, never rendered into the envelope.
		message: String,
	},
}
impl Error {
	/// HTTP-class status code carried by the envelope for this error.
	pub fn status(&self) -> u16 {
		match self {
			Self::Validation { .. } => 400,
			Self::Authentication(_) => 401,
			Self::NotFound { .. } => 404,
			Self::AdmissionRejected { .. } => 429,
			Self::External(_) | Self::Internal { .. } => 500,
		}
	}

	/// Message safe to place in the response envelope.
	///
	/// External and internal faults collapse to a generic message; everything
	/// else is already caller-facing.
	pub fn public_message(&self) -> String {
		match self {
			Self::External(_) | Self::Internal { .. } => "Internal server error".into(),
			other => other.to_string(),
		}
	}

	/// Retry hint in whole seconds, present only for admission rejections.
	pub fn retry_after_secs(&self) -> Option<u64> {
		match self {
			Self::AdmissionRejected { retry_after: Some(delay), .. } =>
				Some(delay.whole_seconds().max(1) as u64),
			_ => None,
		}
	}
}
impl From<crate::store::StoreError> for Error {
	fn from(e: crate::store::StoreError) -> Self {
		Self::External(ExternalError::from(e))
	}
}

/// Credential failures surfaced as 401-class envelope responses.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AuthError {
	/// No credential was attached to the request.
	#[error("Access attempted without credentials.")]
	MissingCredential,
	/// Access credential signature did not verify.
	#[error("Invalid access credential.")]
	InvalidAccess,
	/// Access credential signature verified but the expiry has passed.
	#[error("Expired access credential.")]
	ExpiredAccess,
	/// Refresh credential is absent, already consumed, or revoked.
	#[error("Refresh credential not found.")]
	RefreshNotFound,
	/// Refresh credential exists but its expiry has passed.
	#[error("Expired refresh credential.")]
	RefreshExpired,
}

/// Failures reaching an external collaborator.
///
/// Timeouts are folded into the same taxonomy so callers apply one
/// degrade-or-reject policy per dependency instead of special-casing stalls.
#[derive(Clone, Debug, ThisError)]
pub enum ExternalError {
	/// Shared counter/cache store is unreachable or misbehaving.
	#[error("Shared store failure: {message}.")]
	Store {
		/// Human-readable error payload.
		message: String,
	},
	/// Message broker is unreachable or refused the operation.
	#[error("Broker failure: {message}.")]
	Broker {
		/// Human-readable error payload.
		message: String,
	},
	/// External asset host rejected or failed the call.
	#[error("Asset host failure: {message}.")]
	AssetHost {
		/// Human-readable error payload.
		message: String,
	},
	/// A bounded outbound call exceeded its deadline.
	#[error("Timed out calling {dependency}.")]
	Timeout {
		/// Label of the dependency that stalled.
		dependency: &'static str,
	},
}
impl From<crate::store::StoreError> for ExternalError {
	fn from(e: crate::store::StoreError) -> Self {
		Self::Store { message: e.to_string() }
	}
}
impl From<BrokerError> for ExternalError {
	fn from(e: BrokerError) -> Self {
		match e {
			BrokerError::Timeout => Self::Timeout { dependency: "broker" },
			other => Self::Broker { message: other.to_string() },
		}
	}
}
impl From<AssetHostError> for ExternalError {
	fn from(e: AssetHostError) -> Self {
		match e {
			AssetHostError::Timeout => Self::Timeout { dependency: "asset host" },
			other => Self::AssetHost { message: other.to_string() },
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::StoreError;

	#[test]
	fn status_codes_follow_the_taxonomy() {
		assert_eq!(Error::Validation { message: "bad title".into() }.status(), 400);
		assert_eq!(Error::Authentication(AuthError::InvalidAccess).status(), 401);
		assert_eq!(Error::NotFound { resource: "Post".into() }.status(), 404);
		assert_eq!(
			Error::AdmissionRejected {
				policy: PolicyKind::TokenBucket,
				retry_after: Some(Duration::seconds(1)),
			}
			.status(),
			429
		);
		assert_eq!(Error::Internal { message: "boom".into() }.status(), 500);
	}

	#[test]
	fn external_faults_never_leak_detail() {
		let error = Error::from(StoreError::Backend { message: "redis at 10.0.0.3 down".into() });

		assert_eq!(error.public_message(), "Internal server error");
		assert!(error.to_string().contains("redis"));
	}

	#[test]
	fn retry_hint_rounds_up_to_a_second() {
		let error = Error::AdmissionRejected {
			policy: PolicyKind::FixedWindow,
			retry_after: Some(Duration::milliseconds(250)),
		};

		assert_eq!(error.retry_after_secs(), Some(1));
	}
}
