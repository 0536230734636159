//! Registry pairing platform descriptors with client credentials and strategies.

// self
use crate::{
	_prelude::*,
	auth::{PlatformId, TokenSecret},
	error::ConfigError,
	provider::{DefaultPlatformStrategy, PlatformDescriptor, PlatformStrategy, RateQuota},
};

/// OAuth client credentials issued by a platform to this application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientCredentials {
	/// Public client identifier.
	pub client_id: String,
	/// Client secret for confidential clients.
	pub client_secret: Option<TokenSecret>,
}
impl ClientCredentials {
	/// Creates credentials for a public client.
	pub fn new(client_id: impl Into<String>) -> Self {
		Self { client_id: client_id.into(), client_secret: None }
	}

	/// Attaches a client secret.
	pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(TokenSecret::new(secret));

		self
	}

	/// Reads `<PLATFORM>_CLIENT_ID` and the optional `<PLATFORM>_CLIENT_SECRET` from the
	/// process environment.
	pub fn from_env(platform: &PlatformId) -> Result<Self, ConfigError> {
		Self::from_lookup(platform, |key| std::env::var(key).ok())
	}

	/// Same as [`from_env`](Self::from_env) but resolves variables through `lookup`.
	pub fn from_lookup<F>(platform: &PlatformId, lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let prefix = platform.to_ascii_uppercase().replace('-', "_");
		let client_id = lookup(&format!("{prefix}_CLIENT_ID"))
			.filter(|value| !value.trim().is_empty())
			.ok_or_else(|| ConfigError::missing_credentials(platform))?;
		let mut credentials = Self::new(client_id);

		if let Some(secret) =
			lookup(&format!("{prefix}_CLIENT_SECRET")).filter(|value| !value.trim().is_empty())
		{
			credentials = credentials.with_secret(secret);
		}

		Ok(credentials)
	}
}

/// Everything the broker knows about one platform.
#[derive(Clone)]
pub struct PlatformEntry {
	/// Validated descriptor.
	pub descriptor: Arc<PlatformDescriptor>,
	/// Client credentials, when configured.
	pub credentials: Option<ClientCredentials>,
	/// Token error classification strategy.
	pub strategy: Arc<dyn PlatformStrategy>,
}
impl PlatformEntry {
	/// Returns credentials usable with the descriptor's client authentication method.
	pub fn require_credentials(&self) -> Result<&ClientCredentials, ConfigError> {
		let credentials = self
			.credentials
			.as_ref()
			.filter(|c| !c.client_id.is_empty())
			.ok_or_else(|| ConfigError::missing_credentials(&self.descriptor.id))?;

		if self.descriptor.preferred_client_auth_method.requires_secret()
			&& credentials.client_secret.is_none()
		{
			return Err(ConfigError::missing_credentials(&self.descriptor.id));
		}

		Ok(credentials)
	}
}
impl Debug for PlatformEntry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PlatformEntry")
			.field("descriptor", &self.descriptor)
			.field("credentials", &self.credentials)
			.finish_non_exhaustive()
	}
}

/// Immutable-after-startup lookup table of configured platforms.
#[derive(Clone, Debug, Default)]
pub struct PlatformRegistry {
	entries: HashMap<PlatformId, PlatformEntry>,
}
impl PlatformRegistry {
	/// Registers a descriptor with the default strategy, replacing any previous entry.
	pub fn register(
		&mut self,
		descriptor: PlatformDescriptor,
		credentials: Option<ClientCredentials>,
	) -> &mut Self {
		self.register_with_strategy(descriptor, credentials, Arc::new(DefaultPlatformStrategy))
	}

	/// Registers a descriptor with a custom strategy, replacing any previous entry.
	pub fn register_with_strategy(
		&mut self,
		descriptor: PlatformDescriptor,
		credentials: Option<ClientCredentials>,
		strategy: Arc<dyn PlatformStrategy>,
	) -> &mut Self {
		let id = descriptor.id.clone();

		self.entries
			.insert(id, PlatformEntry { descriptor: Arc::new(descriptor), credentials, strategy });

		self
	}

	/// Looks up a platform entry.
	pub fn entry(&self, platform: &str) -> Result<&PlatformEntry, ConfigError> {
		self.entries.get(platform).ok_or_else(|| ConfigError::unknown_platform(platform))
	}

	/// Looks up a platform descriptor.
	pub fn descriptor(&self, platform: &str) -> Result<&Arc<PlatformDescriptor>, ConfigError> {
		self.entry(platform).map(|entry| &entry.descriptor)
	}

	/// Returns `true` if the platform is registered.
	pub fn contains(&self, platform: &str) -> bool {
		self.entries.contains_key(platform)
	}

	/// Iterates over registered platform identifiers.
	pub fn platforms(&self) -> impl Iterator<Item = &PlatformId> {
		self.entries.keys()
	}

	/// Iterates over the declared quota of every registered platform.
	pub fn quotas(&self) -> impl Iterator<Item = (&PlatformId, RateQuota)> {
		self.entries.iter().map(|(id, entry)| (id, entry.descriptor.quota))
	}

	/// Number of registered platforms.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns `true` when no platform is registered.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
