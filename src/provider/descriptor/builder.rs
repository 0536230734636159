// self
use crate::{
	_prelude::*,
	auth::{PlatformId, ScopeSet},
	provider::{
		ClientAuthMethod, DEFAULT_TOKEN_LIFETIME_SECS, PlatformDescriptor, PlatformEndpoints,
		PlatformQuirks, RateQuota,
	},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum PlatformDescriptorError {
	/// Authorization endpoint is required for Authorization Code flows.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Token endpoint is mandatory for all flows.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Endpoints must use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Reject scope delimiters that are control characters.
	#[error("Scope delimiter must be a printable character.")]
	InvalidScopeDelimiter {
		/// Invalid delimiter that was supplied.
		delimiter: char,
	},
	/// Quota must admit at least one request over a non-empty window.
	#[error("Rate quota must be non-zero, got {quota}.")]
	ZeroQuota {
		/// Quota that failed validation.
		quota: RateQuota,
	},
	/// Default token lifetime must be positive.
	#[error("Default token lifetime must be positive.")]
	ZeroTokenLifetime,
	/// Public clients cannot authenticate without PKCE.
	#[error("The `none_with_pkce` client authentication method requires `pkce_required`.")]
	PublicClientWithoutPkce,
}

/// Builder for [`PlatformDescriptor`] values.
#[derive(Debug)]
pub struct PlatformDescriptorBuilder {
	id: PlatformId,
	authorization_endpoint: Option<Url>,
	token_endpoint: Option<Url>,
	revocation_endpoint: Option<Url>,
	default_scopes: ScopeSet,
	supports_refresh: bool,
	preferred_client_auth_method: ClientAuthMethod,
	quirks: PlatformQuirks,
	quota: RateQuota,
	default_token_lifetime_secs: u64,
}
impl PlatformDescriptorBuilder {
	/// Creates a new builder seeded with the provided identifier.
	pub fn new(id: PlatformId) -> Self {
		Self {
			id,
			authorization_endpoint: None,
			token_endpoint: None,
			revocation_endpoint: None,
			default_scopes: ScopeSet::default(),
			supports_refresh: false,
			preferred_client_auth_method: ClientAuthMethod::default(),
			quirks: PlatformQuirks::default(),
			quota: RateQuota::default(),
			default_token_lifetime_secs: DEFAULT_TOKEN_LIFETIME_SECS,
		}
	}

	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the optional revocation endpoint.
	pub fn revocation_endpoint(mut self, url: Url) -> Self {
		self.revocation_endpoint = Some(url);

		self
	}

	/// Sets the scopes requested when callers do not supply any.
	pub fn default_scopes(mut self, scopes: ScopeSet) -> Self {
		self.default_scopes = scopes;

		self
	}

	/// Declares whether the platform issues refresh tokens.
	pub fn supports_refresh(mut self, supported: bool) -> Self {
		self.supports_refresh = supported;

		self
	}

	/// Overrides the preferred client authentication method.
	pub fn preferred_client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.preferred_client_auth_method = method;

		self
	}

	/// Overrides the platform quirks.
	pub fn quirks(mut self, quirks: PlatformQuirks) -> Self {
		self.quirks = quirks;

		self
	}

	/// Overrides the request quota; defaults to [`RateQuota::FALLBACK`].
	pub fn quota(mut self, quota: RateQuota) -> Self {
		self.quota = quota;

		self
	}

	/// Overrides the lifetime assumed when a provider omits `expires_in`.
	pub fn default_token_lifetime_secs(mut self, secs: u64) -> Self {
		self.default_token_lifetime_secs = secs;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<PlatformDescriptor, PlatformDescriptorError> {
		let authorization = self
			.authorization_endpoint
			.ok_or(PlatformDescriptorError::MissingAuthorizationEndpoint)?;
		let token = self.token_endpoint.ok_or(PlatformDescriptorError::MissingTokenEndpoint)?;
		let descriptor = PlatformDescriptor {
			id: self.id,
			endpoints: PlatformEndpoints {
				authorization,
				token,
				revocation: self.revocation_endpoint,
			},
			default_scopes: self.default_scopes,
			supports_refresh: self.supports_refresh,
			preferred_client_auth_method: self.preferred_client_auth_method,
			quirks: self.quirks,
			quota: self.quota,
			default_token_lifetime_secs: self.default_token_lifetime_secs,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl PlatformDescriptor {
	/// Validates descriptor invariants.
	///
	/// Deserialized descriptors (for example from configuration files) must pass through
	/// this check before reaching a registry.
	pub fn validate(&self) -> Result<(), PlatformDescriptorError> {
		validate_endpoint("authorization", &self.endpoints.authorization)?;
		validate_endpoint("token", &self.endpoints.token)?;

		if let Some(revocation) = self.endpoints.revocation.as_ref() {
			validate_endpoint("revocation", revocation)?;
		}
		if self.quirks.scope_delimiter.is_control() {
			return Err(PlatformDescriptorError::InvalidScopeDelimiter {
				delimiter: self.quirks.scope_delimiter,
			});
		}
		if self.quota.is_zero() {
			return Err(PlatformDescriptorError::ZeroQuota { quota: self.quota });
		}
		if self.default_token_lifetime_secs == 0 {
			return Err(PlatformDescriptorError::ZeroTokenLifetime);
		}
		if matches!(self.preferred_client_auth_method, ClientAuthMethod::NoneWithPkce)
			&& !self.quirks.pkce_required
		{
			return Err(PlatformDescriptorError::PublicClientWithoutPkce);
		}

		Ok(())
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), PlatformDescriptorError> {
	if url.scheme() != "https" {
		Err(PlatformDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	} else {
		Ok(())
	}
}
