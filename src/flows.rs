//! OAuth flow orchestration: authorization code + PKCE, refresh, revocation.

pub mod auth_code_pkce;
pub mod common;
pub mod pending;
pub mod refresh;
pub mod revoke;

pub use auth_code_pkce::*;
pub use common::redact;
pub use pending::*;
pub use refresh::*;

// self
use crate::{
	_prelude::*,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	provider::PlatformRegistry,
	store::StoreKey,
	vault::TokenVault,
};
#[cfg(feature = "reqwest")]
use crate::{error::ConfigError, http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

/// Flow manager specialized for the crate's default reqwest transport stack.
#[cfg(feature = "reqwest")]
pub type ReqwestFlowManager = FlowManager<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Tunables shared by every flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlowSettings {
	/// Lifetime of a pending authorization.
	pub pending_ttl: Duration,
	/// Deadline applied to each token exchange, refresh and revocation.
	pub token_timeout: StdDuration,
}
impl FlowSettings {
	/// Default pending authorization lifetime.
	pub const DEFAULT_PENDING_TTL: Duration = Duration::minutes(10);
	/// Default token endpoint deadline.
	pub const DEFAULT_TOKEN_TIMEOUT: StdDuration = StdDuration::from_secs(30);
}
impl Default for FlowSettings {
	fn default() -> Self {
		Self { pending_ttl: Self::DEFAULT_PENDING_TTL, token_timeout: Self::DEFAULT_TOKEN_TIMEOUT }
	}
}

/// Coordinates OAuth 2.0 flows across every registered platform.
///
/// The manager owns the registry, the vault, pending state and the token transport, so
/// each flow only implements its grant-specific steps. Refreshes and revocations for one
/// (platform, user) pair serialize on a per-key guard; different pairs never contend.
pub struct FlowManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	registry: Arc<PlatformRegistry>,
	vault: Arc<TokenVault>,
	pending: Arc<dyn PendingStore>,
	http_client: Arc<C>,
	transport_mapper: Arc<M>,
	settings: FlowSettings,
	refresh_metrics: Arc<RefreshMetrics>,
	flow_guards: Mutex<HashMap<StoreKey, Arc<AsyncMutex<()>>>>,
}
impl<C, M> FlowManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a manager that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		registry: Arc<PlatformRegistry>,
		vault: Arc<TokenVault>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			registry,
			vault,
			pending: Arc::new(MemoryPendingStore::default()),
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			settings: FlowSettings::default(),
			refresh_metrics: Default::default(),
			flow_guards: Default::default(),
		}
	}

	/// Replaces the flow settings.
	pub fn with_settings(mut self, settings: FlowSettings) -> Self {
		self.settings = settings;

		self
	}

	/// Replaces the pending authorization store (for example with a shared TTL store).
	pub fn with_pending_store(mut self, pending: Arc<dyn PendingStore>) -> Self {
		self.pending = pending;

		self
	}

	/// Registered platforms.
	pub fn registry(&self) -> &Arc<PlatformRegistry> {
		&self.registry
	}

	/// Vault the flows persist into.
	pub fn vault(&self) -> &Arc<TokenVault> {
		&self.vault
	}

	/// Active settings.
	pub fn settings(&self) -> FlowSettings {
		self.settings
	}

	/// Counters for refresh outcomes.
	pub fn refresh_metrics(&self) -> &Arc<RefreshMetrics> {
		&self.refresh_metrics
	}
}
#[cfg(feature = "reqwest")]
impl FlowManager<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a manager with its own reqwest transport (30 second timeout, no redirects).
	pub fn new(registry: Arc<PlatformRegistry>, vault: Arc<TokenVault>) -> Result<Self, ConfigError> {
		Ok(Self::with_http_client(
			registry,
			vault,
			ReqwestHttpClient::new()?,
			Arc::new(ReqwestTransportErrorMapper),
		))
	}
}
impl<C, M> Debug for FlowManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FlowManager")
			.field("registry", &self.registry)
			.field("vault", &self.vault)
			.field("settings", &self.settings)
			.field("refresh_metrics", &self.refresh_metrics)
			.finish_non_exhaustive()
	}
}
