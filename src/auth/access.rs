//! Stateless access credentials: short-lived HS256-signed claim sets.
//!
//! Verification is signature + expiry only and never touches a store, so it
//! stays cheap enough to run on every inbound request.

// crates.io
use jsonwebtoken::{
	Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
// self
use crate::{
	_prelude::*,
	auth::{Identity, TokenSecret, UserId},
	error::AuthError,
};

/// Claim set carried by an access credential.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessClaims {
	/// Subject identity id.
	pub sub: String,
	/// Username attached for downstream handlers.
	pub username: String,
	/// Issued-at instant (unix seconds).
	pub iat: i64,
	/// Expiry instant (unix seconds).
	pub exp: i64,
}

/// Signs and verifies access credentials with a shared symmetric secret.
#[derive(Clone)]
pub struct AccessSigner {
	encoding: EncodingKey,
	decoding: DecodingKey,
	validation: Validation,
	ttl: Duration,
}
impl AccessSigner {
	/// Builds a signer from the configured signing secret and access TTL.
	pub fn new(signing_secret: &str, ttl: Duration) -> Self {
		let mut validation = Validation::new(Algorithm::HS256);

		// Zero leeway: an expired credential is expired, even by a second.
		validation.leeway = 0;
		validation.validate_exp = true;

		Self {
			encoding: EncodingKey::from_secret(signing_secret.as_bytes()),
			decoding: DecodingKey::from_secret(signing_secret.as_bytes()),
			validation,
			ttl,
		}
	}

	/// Signs a fresh credential for `identity`, valid from `now` for the
	/// configured TTL.
	pub fn sign_at(&self, identity: &Identity, now: OffsetDateTime) -> Result<TokenSecret> {
		let claims = AccessClaims {
			sub: identity.id.to_string(),
			username: identity.username.clone(),
			iat: now.unix_timestamp(),
			exp: (now + self.ttl).unix_timestamp(),
		};
		let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
			.map_err(|e| Error::Internal { message: format!("access credential encoding: {e}") })?;

		Ok(TokenSecret::new(token))
	}

	/// Verifies signature and expiry, returning the embedded identity.
	pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
		let data = decode::<AccessClaims>(token, &self.decoding, &self.validation).map_err(
			|e| match e.kind() {
				ErrorKind::ExpiredSignature => AuthError::ExpiredAccess,
				_ => AuthError::InvalidAccess,
			},
		)?;
		let id = UserId::new(&data.claims.sub).map_err(|_| AuthError::InvalidAccess)?;

		Ok(Identity { id, username: data.claims.username })
	}
}
impl Debug for AccessSigner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessSigner")
			.field("key", &"<redacted>")
			.field("ttl", &self.ttl)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn identity() -> Identity {
		Identity {
			id: UserId::new("u1").expect("Fixture id should be valid."),
			username: "alice".into(),
		}
	}

	#[test]
	fn sign_then_verify_round_trips_the_identity() {
		let signer = AccessSigner::new("unit-secret", Duration::minutes(15));
		let token = signer
			.sign_at(&identity(), OffsetDateTime::now_utc())
			.expect("Signing a fixture credential should succeed.");
		let verified = signer.verify(token.expose()).expect("Fresh credential should verify.");

		assert_eq!(verified.id.as_ref(), "u1");
		assert_eq!(verified.username, "alice");
	}

	#[test]
	fn expired_credential_fails_even_with_a_valid_signature() {
		let signer = AccessSigner::new("unit-secret", Duration::minutes(15));
		let token = signer
			.sign_at(&identity(), OffsetDateTime::now_utc() - Duration::minutes(16))
			.expect("Signing a back-dated credential should succeed.");

		assert_eq!(signer.verify(token.expose()), Err(AuthError::ExpiredAccess));
	}

	#[test]
	fn foreign_signature_fails_even_with_a_future_expiry() {
		let ours = AccessSigner::new("unit-secret", Duration::minutes(15));
		let theirs = AccessSigner::new("other-secret", Duration::minutes(15));
		let token = theirs
			.sign_at(&identity(), OffsetDateTime::now_utc())
			.expect("Signing with the foreign key should succeed.");

		assert_eq!(ours.verify(token.expose()), Err(AuthError::InvalidAccess));
	}
}
