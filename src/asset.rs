//! Seam for the external asset host that stores uploaded media bytes.
//!
//! The cascade consumer deletes assets through [`AssetHost`] without caring
//! which vendor sits behind it. The default `reqwest` feature supplies an
//! HTTP implementation with a bounded request timeout; tests inject
//! [`MemoryAssetHost`] to observe and fail individual deletions.

// self
use crate::{_prelude::*, auth::ResourceId};

/// Boxed future returned by [`AssetHost`] methods.
pub type AssetFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AssetHostError>> + 'a + Send>>;

/// Error type produced by asset host implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AssetHostError {
	/// Request could not be built or sent.
	#[error("Request failure: {message}.")]
	Request {
		/// Human-readable error payload.
		message: String,
	},
	/// Host answered with an unexpected status.
	#[error("Unexpected status {status}.")]
	Status {
		/// HTTP status code returned by the host.
		status: u16,
	},
	/// The bounded request deadline elapsed.
	#[error("Asset host call timed out.")]
	Timeout,
}

/// External host holding uploaded asset bytes.
pub trait AssetHost
where
	Self: Send + Sync,
{
	/// Deletes the asset for `id`; deleting an absent asset is a no-op.
	fn delete_asset<'a>(&'a self, id: &'a ResourceId) -> AssetFuture<'a, ()>;
}

/// Recording in-process asset host for tests and demos.
///
/// Deletion ids are captured in call order; ids listed via
/// [`MemoryAssetHost::fail_on`] produce a request failure instead, which is
/// how the cascade suites exercise per-item degradation.
#[derive(Clone, Debug, Default)]
pub struct MemoryAssetHost {
	deleted: Arc<RwLock<Vec<ResourceId>>>,
	failing: Arc<RwLock<Vec<ResourceId>>>,
}
impl MemoryAssetHost {
	/// Marks `id` so its deletion fails.
	pub fn fail_on(&self, id: ResourceId) {
		self.failing.write().push(id);
	}

	/// Ids deleted so far, in call order.
	pub fn deleted(&self) -> Vec<ResourceId> {
		self.deleted.read().clone()
	}
}
impl AssetHost for MemoryAssetHost {
	fn delete_asset<'a>(&'a self, id: &'a ResourceId) -> AssetFuture<'a, ()> {
		let deleted = self.deleted.clone();
		let failing = self.failing.clone();
		let id = id.clone();

		Box::pin(async move {
			if failing.read().contains(&id) {
				return Err(AssetHostError::Request { message: format!("injected failure for {id}") });
			}

			deleted.write().push(id);

			Ok(())
		})
	}
}

#[cfg(feature = "reqwest")]
pub use reqwest_host::ReqwestAssetHost;
#[cfg(feature = "reqwest")]
mod reqwest_host {
	// crates.io
	use reqwest::{Client, StatusCode};
	// self
	use super::{AssetFuture, AssetHost, AssetHostError};
	use crate::{_prelude::*, auth::ResourceId};

	/// HTTP asset host client with a bounded per-request timeout.
	#[derive(Clone, Debug)]
	pub struct ReqwestAssetHost {
		client: Client,
		base: Url,
	}
	impl ReqwestAssetHost {
		/// Builds a client for the host at `base` with the given request
		/// deadline.
		pub fn new(base: Url, timeout: std::time::Duration) -> Result<Self, AssetHostError> {
			let client = Client::builder()
				.timeout(timeout)
				.build()
				.map_err(|e| AssetHostError::Request { message: e.to_string() })?;

			Ok(Self { client, base })
		}

		fn asset_url(&self, id: &ResourceId) -> Result<Url, AssetHostError> {
			self.base
				.join(&format!("assets/{id}"))
				.map_err(|e| AssetHostError::Request { message: e.to_string() })
		}
	}
	impl AssetHost for ReqwestAssetHost {
		fn delete_asset<'a>(&'a self, id: &'a ResourceId) -> AssetFuture<'a, ()> {
			Box::pin(async move {
				let url = self.asset_url(id)?;
				let response = self.client.delete(url).send().await.map_err(|e| {
					if e.is_timeout() {
						AssetHostError::Timeout
					} else {
						AssetHostError::Request { message: e.to_string() }
					}
				})?;

				let status = response.status();

				// 404 means the asset is already gone, which is the outcome
				// the caller wanted.
				if status.is_success() || status == StatusCode::NOT_FOUND {
					Ok(())
				} else {
					Err(AssetHostError::Status { status: status.as_u16() })
				}
			})
		}
	}
}
