//! Token lifecycle: issuing, verifying, rotating, and revoking credentials.
//!
//! The session state machine is `unauthenticated -> active -> refreshed ->
//! revoked`. Access credentials are stateless and verified locally; refresh
//! credentials are durable, single-use records consumed through the
//! credential store's atomic take.

pub mod access;
pub mod id;
pub mod refresh;
pub mod secret;

pub use access::{AccessClaims, AccessSigner};
pub use id::{IdentifierError, ResourceId, UserId};
pub use refresh::{REFRESH_SECRET_LEN, RefreshRecord, generate_refresh_secret, refresh_digest};
pub use secret::TokenSecret;

// self
use crate::{
	_prelude::*,
	error::AuthError,
	obs::{self, OpKind, OpOutcome, OpSpan},
	store::CredentialStore,
};

/// Authenticated identity attached to requests and credential records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
	/// Stable identity id.
	pub id: UserId,
	/// Display/login name propagated to downstream handlers.
	pub username: String,
}

/// Freshly issued access + refresh credential pair.
#[derive(Clone, Debug)]
pub struct TokenPair {
	/// Short-lived signed access credential.
	pub access: TokenSecret,
	/// Opaque single-use refresh credential.
	pub refresh: TokenSecret,
}

/// Issues, verifies, rotates, and revokes credentials for one deployment.
///
/// The manager owns the signing keys and a handle to the durable credential
/// store; it is cheap to clone and safe to share across request workers.
#[derive(Clone)]
pub struct TokenManager {
	signer: AccessSigner,
	store: Arc<dyn CredentialStore>,
	refresh_ttl: Duration,
}
impl TokenManager {
	/// Creates a manager from the signing secret and credential TTLs.
	pub fn new(
		signing_secret: &str,
		access_ttl: Duration,
		refresh_ttl: Duration,
		store: Arc<dyn CredentialStore>,
	) -> Self {
		Self { signer: AccessSigner::new(signing_secret, access_ttl), store, refresh_ttl }
	}

	/// Issues a new credential pair for `identity`.
	pub async fn issue_pair(&self, identity: &Identity) -> Result<TokenPair> {
		self.issue_pair_at(identity, OffsetDateTime::now_utc()).await
	}

	/// Issues a new credential pair with an explicit issue instant.
	pub async fn issue_pair_at(
		&self,
		identity: &Identity,
		now: OffsetDateTime,
	) -> Result<TokenPair> {
		const KIND: OpKind = OpKind::IssuePair;

		let span = OpSpan::new(KIND, "issue_pair");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				let access = self.signer.sign_at(identity, now)?;
				let refresh = generate_refresh_secret();
				let record =
					RefreshRecord::issue(&refresh, identity.clone(), now, self.refresh_ttl);

				self.store.save(record).await?;

				Ok(TokenPair { access, refresh })
			})
			.await;

		obs::record_op_outcome(KIND, OpOutcome::from_result(&result));

		result
	}

	/// Verifies an access credential: signature and expiry only, no store
	/// traffic.
	pub fn verify_access(&self, token: &str) -> Result<Identity, AuthError> {
		const KIND: OpKind = OpKind::VerifyAccess;

		let _guard = OpSpan::new(KIND, "verify_access").entered();

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = self.signer.verify(token);

		obs::record_op_outcome(KIND, OpOutcome::from_result(&result));

		result
	}

	/// Consumes a refresh credential and issues a replacement pair.
	pub async fn rotate_refresh(&self, token: &str) -> Result<TokenPair> {
		self.rotate_refresh_at(token, OffsetDateTime::now_utc()).await
	}

	/// [`Self::rotate_refresh`] with an explicit clock, for expiry tests.
	///
	/// The atomic take on the credential store is what makes the credential
	/// single-use: the losing side of a concurrent rotation observes an
	/// absent record and fails with [`AuthError::RefreshNotFound`]. An
	/// expired record is still consumed, so a replay after the expiry
	/// failure cannot resurrect it.
	pub async fn rotate_refresh_at(
		&self,
		token: &str,
		now: OffsetDateTime,
	) -> Result<TokenPair> {
		const KIND: OpKind = OpKind::RotateRefresh;

		let span = OpSpan::new(KIND, "rotate_refresh");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				let digest = refresh_digest(token);
				let record = self
					.store
					.take(&digest)
					.await?
					.ok_or(AuthError::RefreshNotFound)?;

				if record.is_expired_at(now) {
					return Err(AuthError::RefreshExpired.into());
				}

				self.issue_pair_at(&record.owner, now).await
			})
			.await;

		obs::record_op_outcome(KIND, OpOutcome::from_result(&result));

		result
	}

	/// Deletes the refresh credential; deleting an absent record is a no-op.
	pub async fn revoke(&self, token: &str) -> Result<()> {
		const KIND: OpKind = OpKind::Revoke;

		let span = OpSpan::new(KIND, "revoke");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				let digest = refresh_digest(token);

				self.store.take(&digest).await?;

				Ok(())
			})
			.await;

		obs::record_op_outcome(KIND, OpOutcome::from_result(&result));

		result
	}
}
