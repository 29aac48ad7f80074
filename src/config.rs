//! Broker configuration: renewal timing, retry policy, and the managed role set.

// self
use crate::{_prelude::*, error::ConfigError, lease::RoleName};

/// Options recognized by [`CredentialBroker`](crate::broker::CredentialBroker).
///
/// Durations are encoded as whole seconds when (de)serialized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerConfig {
	/// Fraction of a lease's ttl after which renewal fires.
	pub renewal_fraction: f64,
	/// First retry delay after a failed renewal.
	#[serde(with = "duration_secs")]
	pub backoff_base: Duration,
	/// Upper bound for any retry delay.
	#[serde(with = "duration_secs")]
	pub backoff_cap: Duration,
	/// Relative jitter applied to each retry delay (`0.2` means ±20%).
	pub backoff_jitter: f64,
	/// Retry limit per renewal; `None` retries until the lease's hard expiry.
	pub max_renewal_retries: Option<u32>,
	/// Roles this broker manages.
	pub roles: BTreeSet<RoleName>,
	/// Number of retired leases remembered per role.
	pub history_limit: usize,
	/// Auth sessions are refreshed this long before they expire.
	#[serde(with = "duration_secs")]
	pub session_refresh_margin: Duration,
	/// Timeout used by `get_credential` when the caller does not pass one.
	#[serde(with = "duration_secs")]
	pub request_timeout: Duration,
}
impl BrokerConfig {
	/// Default renewal fraction.
	pub const DEFAULT_RENEWAL_FRACTION: f64 = 0.6;
	/// Default first retry delay.
	pub const DEFAULT_BACKOFF_BASE: Duration = Duration::seconds(5);
	/// Default retry delay ceiling.
	pub const DEFAULT_BACKOFF_CAP: Duration = Duration::seconds(60);
	/// Default relative retry jitter.
	pub const DEFAULT_BACKOFF_JITTER: f64 = 0.2;
	/// Default per-role history length.
	pub const DEFAULT_HISTORY_LIMIT: usize = 16;
	/// Default auth session refresh margin.
	pub const DEFAULT_SESSION_REFRESH_MARGIN: Duration = Duration::seconds(30);
	/// Default consumer request timeout.
	pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::seconds(10);

	/// Returns a builder seeded with defaults.
	pub fn builder() -> BrokerConfigBuilder {
		BrokerConfigBuilder::default()
	}

	/// Parses and validates a JSON configuration document.
	pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
		let de = &mut serde_json::Deserializer::from_str(raw);
		let config: Self = serde_path_to_error::deserialize(de)?;

		config.validate()?;

		Ok(config)
	}

	/// Returns `true` when `role` is managed by this configuration.
	pub fn manages(&self, role: &RoleName) -> bool {
		self.roles.contains(role)
	}

	/// Validates option ranges.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if !(self.renewal_fraction > 0. && self.renewal_fraction < 1.) {
			return Err(ConfigError::InvalidRenewalFraction { value: self.renewal_fraction });
		}
		if !(self.backoff_jitter >= 0. && self.backoff_jitter < 1.) {
			return Err(ConfigError::InvalidJitter { value: self.backoff_jitter });
		}
		if !self.backoff_base.is_positive() {
			return Err(ConfigError::NonPositiveDuration { option: "backoff_base" });
		}
		if self.backoff_cap < self.backoff_base {
			return Err(ConfigError::InvalidBackoff {
				reason: "backoff_cap must not be smaller than backoff_base",
			});
		}
		if self.session_refresh_margin.is_negative() {
			return Err(ConfigError::NonPositiveDuration { option: "session_refresh_margin" });
		}
		if !self.request_timeout.is_positive() {
			return Err(ConfigError::NonPositiveDuration { option: "request_timeout" });
		}
		if self.history_limit == 0 {
			return Err(ConfigError::InvalidHistoryLimit);
		}
		if self.roles.is_empty() {
			return Err(ConfigError::NoRoles);
		}

		Ok(())
	}
}
impl Default for BrokerConfig {
	fn default() -> Self {
		Self {
			renewal_fraction: Self::DEFAULT_RENEWAL_FRACTION,
			backoff_base: Self::DEFAULT_BACKOFF_BASE,
			backoff_cap: Self::DEFAULT_BACKOFF_CAP,
			backoff_jitter: Self::DEFAULT_BACKOFF_JITTER,
			max_renewal_retries: None,
			roles: BTreeSet::new(),
			history_limit: Self::DEFAULT_HISTORY_LIMIT,
			session_refresh_margin: Self::DEFAULT_SESSION_REFRESH_MARGIN,
			request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
		}
	}
}

/// Builder for [`BrokerConfig`] values.
#[derive(Debug, Default)]
pub struct BrokerConfigBuilder {
	config: BrokerConfig,
}
impl BrokerConfigBuilder {
	/// Adds a managed role.
	pub fn role(mut self, role: RoleName) -> Self {
		self.config.roles.insert(role);

		self
	}

	/// Adds multiple managed roles.
	pub fn roles<I>(mut self, roles: I) -> Self
	where
		I: IntoIterator<Item = RoleName>,
	{
		self.config.roles.extend(roles);

		self
	}

	/// Overrides the renewal fraction.
	pub fn renewal_fraction(mut self, fraction: f64) -> Self {
		self.config.renewal_fraction = fraction;

		self
	}

	/// Overrides the retry backoff base and cap.
	pub fn backoff(mut self, base: Duration, cap: Duration) -> Self {
		self.config.backoff_base = base;
		self.config.backoff_cap = cap;

		self
	}

	/// Overrides the relative retry jitter.
	pub fn backoff_jitter(mut self, jitter: f64) -> Self {
		self.config.backoff_jitter = jitter;

		self
	}

	/// Caps the number of retries per renewal.
	pub fn max_renewal_retries(mut self, retries: u32) -> Self {
		self.config.max_renewal_retries = Some(retries);

		self
	}

	/// Overrides the per-role history length.
	pub fn history_limit(mut self, limit: usize) -> Self {
		self.config.history_limit = limit;

		self
	}

	/// Overrides the auth session refresh margin.
	pub fn session_refresh_margin(mut self, margin: Duration) -> Self {
		self.config.session_refresh_margin = margin;

		self
	}

	/// Overrides the default consumer request timeout.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.config.request_timeout = timeout;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<BrokerConfig, ConfigError> {
		self.config.validate()?;

		Ok(self.config)
	}
}

mod duration_secs {
	// crates.io
	use serde::{Deserializer, Serializer, de::Error as _};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(value.whole_seconds())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		let secs = u64::deserialize(deserializer)?;
		let secs = i64::try_from(secs).map_err(D::Error::custom)?;

		Ok(Duration::seconds(secs))
	}
}
