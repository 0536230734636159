//! Broker configuration loaded from JSON.
//!
//! Every field has a default, so an empty document yields a broker with no platforms and
//! stock timeouts. Parse failures report the JSON path of the offending field.

// std
use std::{fs, path::Path};
// self
use crate::{
	_prelude::*,
	auth::{PlatformId, TokenSecret},
	error::ConfigError,
	flows::FlowSettings,
	platform::RetryPolicy,
	provider::{ClientCredentials, PlatformDescriptor, PlatformRegistry, catalog},
	vault::DEFAULT_GRACE_WINDOW,
};

/// Top-level broker configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerConfig {
	/// Pending authorization lifetime in seconds.
	pub pending_ttl_secs: u64,
	/// Token endpoint deadline in seconds.
	pub token_timeout_secs: u64,
	/// Platform API deadline in seconds.
	pub request_timeout_secs: u64,
	/// Window before expiry in which bundles are reported near expiry, in seconds.
	pub grace_window_secs: u64,
	/// Interval between pending authorization sweeps, in seconds.
	pub sweep_interval_secs: u64,
	/// Retry policy for platform requests.
	pub retry: RetryPolicy,
	/// Platforms to register.
	pub platforms: Vec<PlatformConfig>,
}
impl BrokerConfig {
	/// Parses a JSON document.
	pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
		let mut deserializer = serde_json::Deserializer::from_str(json);

		Ok(serde_path_to_error::deserialize(&mut deserializer)?)
	}

	/// Reads and parses a JSON file.
	pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		Self::from_json_str(&fs::read_to_string(path)?)
	}

	/// Flow tunables derived from this configuration.
	pub fn flow_settings(&self) -> FlowSettings {
		FlowSettings {
			pending_ttl: seconds(self.pending_ttl_secs),
			token_timeout: StdDuration::from_secs(self.token_timeout_secs),
		}
	}

	/// Grace window for [`TokenVault::with_grace_window`](crate::vault::TokenVault::with_grace_window).
	pub fn grace_window(&self) -> Duration {
		seconds(self.grace_window_secs)
	}

	/// Platform API deadline.
	pub fn request_timeout(&self) -> StdDuration {
		StdDuration::from_secs(self.request_timeout_secs)
	}

	/// Pending sweep interval.
	pub fn sweep_interval(&self) -> StdDuration {
		StdDuration::from_secs(self.sweep_interval_secs)
	}

	/// Builds a registry from the configured platforms.
	///
	/// Entries without a descriptor override must name a built-in platform.
	pub fn build_registry(&self) -> Result<PlatformRegistry, ConfigError> {
		let mut registry = PlatformRegistry::default();

		for platform in &self.platforms {
			let descriptor = platform.descriptor()?;
			let credentials = platform.credentials()?;

			if credentials.is_none() {
				tracing::warn!(platform = %platform.id, "Platform registered without client credentials.");
			}

			registry.register(descriptor, credentials);
		}

		Ok(registry)
	}
}
impl Default for BrokerConfig {
	fn default() -> Self {
		Self {
			pending_ttl_secs: FlowSettings::DEFAULT_PENDING_TTL.whole_seconds().unsigned_abs(),
			token_timeout_secs: FlowSettings::DEFAULT_TOKEN_TIMEOUT.as_secs(),
			request_timeout_secs: 30,
			grace_window_secs: DEFAULT_GRACE_WINDOW.whole_seconds().unsigned_abs(),
			sweep_interval_secs: 60,
			retry: RetryPolicy::default(),
			platforms: Vec::new(),
		}
	}
}

/// One configured platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformConfig {
	/// Platform identifier.
	pub id: PlatformId,
	/// Descriptor override; the built-in catalog entry is used when absent.
	#[serde(default)]
	pub descriptor: Option<PlatformDescriptor>,
	/// Client identifier issued by the platform.
	#[serde(default)]
	pub client_id: Option<String>,
	/// Client secret issued by the platform.
	#[serde(default)]
	pub client_secret: Option<TokenSecret>,
	/// Read `<PLATFORM>_CLIENT_ID` and `<PLATFORM>_CLIENT_SECRET` from the environment instead.
	#[serde(default)]
	pub credentials_from_env: bool,
}
impl PlatformConfig {
	fn descriptor(&self) -> Result<PlatformDescriptor, ConfigError> {
		let Some(descriptor) = self.descriptor.clone() else {
			return catalog::lookup(&self.id).ok_or_else(|| ConfigError::unknown_platform(&self.id))?;
		};

		if descriptor.id != self.id {
			return Err(ConfigError::DescriptorMismatch {
				expected: self.id.to_string(),
				found: descriptor.id.to_string(),
			});
		}

		descriptor.validate()?;

		Ok(descriptor)
	}

	fn credentials(&self) -> Result<Option<ClientCredentials>, ConfigError> {
		if self.credentials_from_env {
			return ClientCredentials::from_env(&self.id).map(Some);
		}

		Ok(self.client_id.as_ref().map(|client_id| ClientCredentials {
			client_id: client_id.clone(),
			client_secret: self.client_secret.clone(),
		}))
	}
}

fn seconds(secs: u64) -> Duration {
	Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn empty_document_uses_defaults() {
		let config = BrokerConfig::from_json_str("{}").expect("Empty config should parse.");

		assert_eq!(config, BrokerConfig::default());
		assert_eq!(config.flow_settings(), FlowSettings::default());
		assert_eq!(config.grace_window(), DEFAULT_GRACE_WINDOW);
		assert!(config.build_registry().expect("Registry should build.").is_empty());
	}

	#[test]
	fn builtin_platforms_register_with_inline_credentials() {
		let config = BrokerConfig::from_json_str(
			r#"{
				"pending_ttl_secs": 120,
				"retry": { "max_attempts": 5 },
				"platforms": [
					{ "id": "twitter", "client_id": "tw-client", "client_secret": "tw-secret" },
					{ "id": "facebook" }
				]
			}"#,
		)
		.expect("Config should parse.");

		assert_eq!(config.flow_settings().pending_ttl, Duration::minutes(2));
		assert_eq!(config.retry.max_attempts, 5);

		let registry = config.build_registry().expect("Registry should build.");
		let twitter = registry.entry("twitter").expect("Twitter should be registered.");

		assert_eq!(twitter.descriptor.quota.limit, 300);
		assert_eq!(
			twitter.require_credentials().expect("Credentials should be complete.").client_id,
			"tw-client"
		);
		assert!(registry.entry("facebook").expect("Facebook should be registered.").credentials.is_none());
	}

	#[test]
	fn secrets_stay_out_of_debug_output() {
		let config = BrokerConfig::from_json_str(
			r#"{ "platforms": [{ "id": "twitter", "client_id": "c", "client_secret": "hunter2" }] }"#,
		)
		.expect("Config should parse.");

		assert!(!format!("{config:?}").contains("hunter2"));
	}

	#[test]
	fn unknown_platforms_need_a_descriptor() {
		let config = BrokerConfig::from_json_str(r#"{ "platforms": [{ "id": "myspace" }] }"#)
			.expect("Config should parse.");
		let err = config.build_registry().expect_err("Unknown platform must be rejected.");

		assert!(matches!(err, ConfigError::UnknownPlatform { ref platform } if platform == "myspace"));
	}

	#[test]
	fn descriptor_overrides_are_validated() {
		let config = BrokerConfig::from_json_str(
			r#"{ "platforms": [{
				"id": "mastodon",
				"descriptor": {
					"id": "mastodon",
					"endpoints": {
						"authorization": "http://social.example/oauth/authorize",
						"token": "https://social.example/oauth/token",
						"revocation": null
					},
					"quota": { "limit": 300, "window_secs": 300 }
				}
			}] }"#,
		)
		.expect("Config should parse.");
		let err = config.build_registry().expect_err("Plain HTTP endpoints must be rejected.");

		assert!(matches!(err, ConfigError::Descriptor(_)));
	}

	#[test]
	fn mismatched_descriptor_ids_are_rejected() {
		let mut config = BrokerConfig::default();
		let descriptor = catalog::linkedin().expect("LinkedIn descriptor should build.");

		config.platforms.push(PlatformConfig {
			id: PlatformId::new("twitter").expect("Id should be valid."),
			descriptor: Some(descriptor),
			client_id: None,
			client_secret: None,
			credentials_from_env: false,
		});

		let err = config.build_registry().expect_err("Mismatched ids must be rejected.");

		assert!(matches!(err, ConfigError::DescriptorMismatch { .. }));
	}

	#[test]
	fn parse_errors_report_the_field_path() {
		let err = BrokerConfig::from_json_str(r#"{ "platforms": [{ "id": "twitter", "client_id": 7 }] }"#)
			.expect_err("Numeric client id must be rejected.");

		let ConfigError::Parse { path, .. } = err else {
			panic!("Expected a parse error, got {err:?}.");
		};

		assert_eq!(path, "platforms[0].client_id");
	}
}
