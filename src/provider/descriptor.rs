//! Platform descriptor data structures shared by all flows.
//!
//! Descriptors are immutable once built: the builder validates endpoints, quotas and quirks
//! so flows can trust every field without re-checking.

/// Builder API for assembling platform descriptors.
pub mod builder;
/// Grant identifiers used when classifying token endpoint failures.
pub mod grant;
/// Platform-specific quirk toggles.
pub mod quirks;
/// Request quota declared per platform.
pub mod quota;

pub use builder::*;
pub use grant::*;
pub use quirks::*;
pub use quota::*;

// self
use crate::{
	_prelude::*,
	auth::{PlatformId, ScopeSet},
};

/// Token lifetime assumed when a provider omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3_600;

/// Preferred client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
	/// Public clients that prove possession via PKCE.
	NoneWithPkce,
}
impl ClientAuthMethod {
	/// Returns `true` when the method sends a client secret to the token endpoint.
	pub fn requires_secret(self) -> bool {
		!matches!(self, Self::NoneWithPkce)
	}
}

/// Endpoint set declared by a platform descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformEndpoints {
	/// Browser-facing authorization endpoint.
	pub authorization: Url,
	/// Token endpoint used for exchanges and refreshes.
	pub token: Url,
	/// Optional revocation endpoint.
	pub revocation: Option<Url>,
}

/// Immutable platform descriptor consumed by flows, the rate limiter and dispatch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformDescriptor {
	/// Descriptor identifier.
	pub id: PlatformId,
	/// Endpoint definitions exposed by the platform.
	pub endpoints: PlatformEndpoints,
	/// Scopes requested when a caller does not supply any.
	#[serde(default)]
	pub default_scopes: ScopeSet,
	/// Whether the platform issues refresh tokens.
	#[serde(default)]
	pub supports_refresh: bool,
	/// Preferred client authentication mechanism.
	#[serde(default)]
	pub preferred_client_auth_method: ClientAuthMethod,
	/// Platform-specific quirks.
	#[serde(default)]
	pub quirks: PlatformQuirks,
	/// Request quota enforced by the rate limiter.
	#[serde(default)]
	pub quota: RateQuota,
	/// Token lifetime assumed when the provider omits `expires_in`.
	#[serde(default = "default_token_lifetime_secs")]
	pub default_token_lifetime_secs: u64,
}
impl PlatformDescriptor {
	/// Creates a new builder for the provided identifier.
	pub fn builder(id: PlatformId) -> PlatformDescriptorBuilder {
		PlatformDescriptorBuilder::new(id)
	}

	/// Returns `true` when the authorization request must carry a PKCE challenge.
	pub fn pkce_required(&self) -> bool {
		self.quirks.pkce_required
	}

	/// Token lifetime assumed when the provider omits `expires_in`.
	pub fn default_token_lifetime(&self) -> Duration {
		Duration::seconds(i64::try_from(self.default_token_lifetime_secs).unwrap_or(i64::MAX))
	}
}

fn default_token_lifetime_secs() -> u64 {
	DEFAULT_TOKEN_LIFETIME_SECS
}
