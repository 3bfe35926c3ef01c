//! The JSON response envelope every service edge speaks.
//!
//! Success: `{"success": true, "message": …, "data": …}`. Failure:
//! `{"success": false, "message": …}` with the status from
//! [`Error::status`] and, for admission rejections, a retry-after hint for
//! the response header.

// self
use crate::_prelude::*;

/// Uniform response body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
	/// Whether the request succeeded.
	pub success: bool,
	/// Human-readable summary.
	pub message: String,
	/// Response payload, omitted when absent.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
}
impl<T> Envelope<T> {
	/// Success envelope with a payload.
	pub fn ok(message: impl Into<String>, data: T) -> Self {
		Self { success: true, message: message.into(), data: Some(data) }
	}

	/// Success envelope without a payload (logout, deletes).
	pub fn accepted(message: impl Into<String>) -> Self {
		Self { success: true, message: message.into(), data: None }
	}
}
impl Envelope<()> {
	/// Failure envelope rendered from an error's public message.
	pub fn failure(error: &Error) -> Self {
		Self { success: false, message: error.public_message(), data: None }
	}
}

/// Status code, retry-after header value, and body for an error response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
	/// HTTP-class status code.
	pub status: u16,
	/// Seconds the caller should wait before retrying, when known.
	pub retry_after_secs: Option<u64>,
	/// Failure envelope body.
	pub body: Envelope<()>,
}
impl From<&Error> for Rejection {
	fn from(error: &Error) -> Self {
		Self {
			status: error.status(),
			retry_after_secs: error.retry_after_secs(),
			body: Envelope::failure(error),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{admission::PolicyKind, error::AuthError};

	#[test]
	fn success_envelope_omits_absent_data() {
		let with_data = serde_json::to_value(Envelope::ok("Post created successfully", 1))
			.expect("Envelope should serialize.");
		let without = serde_json::to_value(Envelope::<()>::accepted("Logged out"))
			.expect("Envelope should serialize.");

		assert_eq!(with_data["data"], 1);
		assert!(without.get("data").is_none());
	}

	#[test]
	fn admission_rejection_carries_the_retry_hint() {
		let error = Error::AdmissionRejected {
			policy: PolicyKind::FixedWindow,
			retry_after: Some(Duration::seconds(42)),
		};
		let rejection = Rejection::from(&error);

		assert_eq!(rejection.status, 429);
		assert_eq!(rejection.retry_after_secs, Some(42));
		assert!(!rejection.body.success);
		assert!(rejection.body.message.contains("fixed-window"));
	}

	#[test]
	fn authentication_failures_render_their_own_message() {
		let rejection = Rejection::from(&Error::Authentication(AuthError::MissingCredential));

		assert_eq!(rejection.status, 401);
		assert_eq!(rejection.body.message, "Access attempted without credentials.");
	}
}
