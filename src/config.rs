//! Process-level configuration consumed by the backplane components.
//!
//! Connections themselves are injected (constructed at startup, closed at
//! shutdown); this module only carries the knobs: endpoints, the signing
//! secret, credential TTLs, outbound deadlines, and the admission policy
//! tables. [`Config::from_env`] reads the `BACKPLANE_*` variables the
//! deployment sets, with defaults for everything except the signing secret.

// std
use std::env;
// self
use crate::{_prelude::*, admission::{AdmissionConfig, RatePolicy}, auth::TokenSecret};

/// Environment variable holding the credential signing secret.
pub const ENV_SIGNING_SECRET: &str = "BACKPLANE_SIGNING_SECRET";
const ENV_STORE_URL: &str = "BACKPLANE_STORE_URL";
const ENV_BROKER_URL: &str = "BACKPLANE_BROKER_URL";
const ENV_ACCESS_TTL_SECS: &str = "BACKPLANE_ACCESS_TTL_SECS";
const ENV_REFRESH_TTL_SECS: &str = "BACKPLANE_REFRESH_TTL_SECS";
const ENV_GLOBAL_CAPACITY: &str = "BACKPLANE_GLOBAL_CAPACITY";
const ENV_GLOBAL_WINDOW_SECS: &str = "BACKPLANE_GLOBAL_WINDOW_SECS";
const ENV_SENSITIVE_CAPACITY: &str = "BACKPLANE_SENSITIVE_CAPACITY";
const ENV_SENSITIVE_WINDOW_SECS: &str = "BACKPLANE_SENSITIVE_WINDOW_SECS";
const ENV_DEPENDENCY_TIMEOUT_MS: &str = "BACKPLANE_DEPENDENCY_TIMEOUT_MS";

/// Configuration problems raised while assembling a [`Config`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ConfigError {
	/// A required environment variable is absent.
	#[error("Environment variable {name} is required.")]
	MissingVariable {
		/// Variable name.
		name: &'static str,
	},
	/// An endpoint variable did not parse as a URL.
	#[error("Environment variable {name} holds an invalid URL.")]
	InvalidUrl {
		/// Variable name.
		name: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A numeric variable did not parse or is out of range.
	#[error("Environment variable {name} holds an invalid number: {value}.")]
	InvalidNumber {
		/// Variable name.
		name: &'static str,
		/// Offending value.
		value: String,
	},
}

/// Knobs shared by every backplane component.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
	/// Shared counter/cache store endpoint.
	pub store_endpoint: Url,
	/// Message broker endpoint.
	pub broker_endpoint: Url,
	/// Symmetric secret signing access credentials.
	pub signing_secret: TokenSecret,
	/// Access credential lifetime (at most 15 minutes in production).
	pub access_ttl: Duration,
	/// Refresh credential lifetime (about 7 days in production).
	pub refresh_ttl: Duration,
	/// Deadline applied to each outbound store/broker/asset-host call.
	pub dependency_timeout: Duration,
	/// Admission policy tables.
	pub admission: AdmissionConfig,
}
impl Config {
	/// Builds a config with production defaults around the one mandatory
	/// value, the signing secret.
	pub fn new(signing_secret: impl Into<String>) -> Self {
		Self {
			store_endpoint: Url::parse("redis://127.0.0.1:6379")
				.expect("Default store endpoint is a valid URL."),
			broker_endpoint: Url::parse("amqp://127.0.0.1:5672")
				.expect("Default broker endpoint is a valid URL."),
			signing_secret: TokenSecret::new(signing_secret),
			access_ttl: Duration::minutes(15),
			refresh_ttl: Duration::days(7),
			dependency_timeout: Duration::seconds(2),
			admission: AdmissionConfig::default(),
		}
	}

	/// Reads the `BACKPLANE_*` environment variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		let signing_secret = env::var(ENV_SIGNING_SECRET)
			.map_err(|_| ConfigError::MissingVariable { name: ENV_SIGNING_SECRET })?;
		let mut config = Self::new(signing_secret);

		if let Some(endpoint) = read_url(ENV_STORE_URL)? {
			config.store_endpoint = endpoint;
		}
		if let Some(endpoint) = read_url(ENV_BROKER_URL)? {
			config.broker_endpoint = endpoint;
		}
		if let Some(secs) = read_u64(ENV_ACCESS_TTL_SECS)? {
			config.access_ttl = Duration::seconds(secs as i64);
		}
		if let Some(secs) = read_u64(ENV_REFRESH_TTL_SECS)? {
			config.refresh_ttl = Duration::seconds(secs as i64);
		}
		if let Some(ms) = read_u64(ENV_DEPENDENCY_TIMEOUT_MS)? {
			config.dependency_timeout = Duration::milliseconds(ms as i64);
		}

		let global_capacity = read_u64(ENV_GLOBAL_CAPACITY)?;
		let global_window = read_u64(ENV_GLOBAL_WINDOW_SECS)?;
		let sensitive_capacity = read_u64(ENV_SENSITIVE_CAPACITY)?;
		let sensitive_window = read_u64(ENV_SENSITIVE_WINDOW_SECS)?;

		if global_capacity.is_some() || global_window.is_some() {
			config.admission.global = vec![RatePolicy::token_bucket(
				Duration::seconds(global_window.unwrap_or(1) as i64),
				global_capacity.unwrap_or(5),
			)];
		}
		if sensitive_capacity.is_some() || sensitive_window.is_some() {
			config.admission.sensitive_write = vec![RatePolicy::fixed_window(
				Duration::seconds(sensitive_window.unwrap_or(300) as i64),
				sensitive_capacity.unwrap_or(50),
			)];
		}

		Ok(config)
	}

	/// Overrides the admission tables.
	pub fn with_admission(mut self, admission: AdmissionConfig) -> Self {
		self.admission = admission;

		self
	}

	/// Overrides the credential TTL pair.
	pub fn with_credential_ttls(mut self, access: Duration, refresh: Duration) -> Self {
		self.access_ttl = access;
		self.refresh_ttl = refresh;

		self
	}
}

fn read_url(name: &'static str) -> Result<Option<Url>, ConfigError> {
	match env::var(name) {
		Ok(value) =>
			Url::parse(&value).map(Some).map_err(|source| ConfigError::InvalidUrl { name, source }),
		Err(_) => Ok(None),
	}
}

fn read_u64(name: &'static str) -> Result<Option<u64>, ConfigError> {
	match env::var(name) {
		Ok(value) =>
			value.parse().map(Some).map_err(|_| ConfigError::InvalidNumber { name, value }),
		Err(_) => Ok(None),
	}
}
