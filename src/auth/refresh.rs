//! Opaque, single-use refresh credentials and their durable records.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{Identity, TokenSecret},
};

/// Length of a generated refresh secret; 64 alphanumeric characters carry
/// well over the required 160 bits of entropy.
pub const REFRESH_SECRET_LEN: usize = 64;

/// Generates a fresh opaque refresh secret.
pub fn generate_refresh_secret() -> TokenSecret {
	let value: String =
		rand::rng().sample_iter(Alphanumeric).take(REFRESH_SECRET_LEN).map(char::from).collect();

	TokenSecret::new(value)
}

/// Digest under which a refresh secret is persisted.
///
/// The durable store only ever sees this SHA-256 fingerprint; a leaked store
/// snapshot therefore cannot be replayed as credentials.
pub fn refresh_digest(secret: &str) -> String {
	URL_SAFE_NO_PAD.encode(Sha256::digest(secret.as_bytes()))
}

/// Durable record backing one refresh credential.
///
/// Exactly one live record exists per login session; rotation and logout
/// consume it atomically via [`CredentialStore::take`](crate::store::CredentialStore::take).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRecord {
	/// Digest of the opaque secret; the record's store key.
	pub digest: String,
	/// Identity the credential was issued to.
	pub owner: Identity,
	/// Issue instant.
	pub issued_at: OffsetDateTime,
	/// Expiry instant; presenting the credential afterwards always fails.
	pub expires_at: OffsetDateTime,
}
impl RefreshRecord {
	/// Builds a record for a freshly generated secret.
	pub fn issue(
		secret: &TokenSecret,
		owner: Identity,
		issued_at: OffsetDateTime,
		ttl: Duration,
	) -> Self {
		Self { digest: refresh_digest(secret.expose()), owner, issued_at, expires_at: issued_at + ttl }
	}

	/// Whether the record has expired at `instant`.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}
}
