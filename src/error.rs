//! Broker-level error types shared across flows, the vault, and platform dispatch.

// self
use crate::_prelude::*;

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const STATE_REJECTED: &str = "Authorization state is invalid or has expired.";

/// Canonical authentication error exposed by the flow manager and the vault.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Encryption or decryption failure inside the token vault.
	#[error(transparent)]
	Vault(#[from] crate::vault::VaultError),
	/// Local configuration problem (unknown platform, missing credentials, bad descriptor).
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// No pending authorization matches the returned state.
	///
	/// Shares its message with [`Error::ExpiredState`] so callers cannot probe which one hit.
	#[error("{}", STATE_REJECTED)]
	InvalidState,
	/// The pending authorization outlived its TTL before the callback arrived.
	#[error("{}", STATE_REJECTED)]
	ExpiredState,
	/// The user (or provider) declined the authorization request.
	#[error("Authorization was denied: {reason}.")]
	AuthorizationDenied {
		/// Provider-supplied `error` value from the redirect.
		reason: String,
	},
	/// Provider rejected the authorization code.
	#[error("Authorization code exchange failed: {reason}.")]
	ExchangeFailed {
		/// Redacted provider- or broker-supplied reason string.
		reason: String,
	},
	/// Stored credentials are dead; the user must restart the authorization flow.
	#[error("Re-authorization is required: {reason}.")]
	ReauthRequired {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// The platform or the stored bundle cannot be refreshed.
	#[error("Credentials cannot be refreshed: {reason}.")]
	NotRefreshable {
		/// Broker-supplied reason string.
		reason: String,
	},
}
impl Error {
	/// Returns `true` when retrying the same operation later may succeed.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Transient(_) | Self::Transport(_))
	}
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Platform descriptor contains an invalid URL.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Platform descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] crate::provider::PlatformDescriptorError),
	/// A configured descriptor override names a different platform than its entry.
	#[error("Descriptor for `{found}` was configured under `{expected}`.")]
	DescriptorMismatch {
		/// Platform identifier of the configuration entry.
		expected: String,
		/// Platform identifier carried by the descriptor.
		found: String,
	},
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Identifier validation failed.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Platform is not registered.
	#[error("Platform `{platform}` is not configured.")]
	UnknownPlatform {
		/// Platform identifier string.
		platform: String,
	},
	/// Platform has no client credentials (or lacks the secret its auth method needs).
	#[error("Platform `{platform}` is missing client credentials.")]
	MissingCredentials {
		/// Platform identifier string.
		platform: String,
	},
	/// No platform API integration was registered for dispatch.
	#[error("Platform `{platform}` has no API integration registered.")]
	MissingPlatformApi {
		/// Platform identifier string.
		platform: String,
	},
	/// Request scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Token bundle builder validation failed.
	#[error("Unable to build token bundle.")]
	TokenBuild(#[from] crate::auth::TokenBundleBuilderError),
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Configuration document could not be parsed.
	#[error("Configuration is invalid at `{path}`.")]
	Parse {
		/// JSON path of the offending field.
		path: String,
		/// Underlying deserialization failure.
		#[source]
		source: serde_json::Error,
	},
	/// Configuration file could not be read.
	#[error("Configuration file could not be read.")]
	Io(#[from] std::io::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	pub(crate) fn unknown_platform(platform: impl Display) -> Self {
		Self::UnknownPlatform { platform: platform.to_string() }
	}

	pub(crate) fn missing_credentials(platform: impl Display) -> Self {
		Self::MissingCredentials { platform: platform.to_string() }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
impl From<serde_path_to_error::Error<serde_json::Error>> for ConfigError {
	fn from(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
		let path = e.path().to_string();

		Self::Parse { path, source: e.into_inner() }
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or broker-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token operation exceeded its deadline.
	#[error("Token endpoint call timed out after {timeout:?}.")]
	Timeout {
		/// Deadline that elapsed.
		timeout: StdDuration,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Terminal classification of a platform request made through
/// [`PlatformClient`](crate::platform::PlatformClient).
#[derive(Debug, ThisError)]
pub enum PlatformError {
	/// Configuration, storage, or vault failure that is not a request outcome.
	#[error(transparent)]
	Broker(Error),
	/// Platform quota exhausted and the local retry budget is spent.
	#[error("Platform rate limit exceeded.")]
	RateLimited {
		/// Server-provided cooldown, when supplied.
		retry_after: Option<Duration>,
	},
	/// Credentials are dead or could not be refreshed; the user must re-authorize.
	#[error("Platform credentials expired: {reason}.")]
	AuthExpired {
		/// Broker-supplied reason string.
		reason: String,
	},
	/// Platform rejected the payload; never retried.
	#[error("Platform rejected the request ({status}): {message}.")]
	Validation {
		/// HTTP status code returned by the platform.
		status: u16,
		/// Truncated response body or reason.
		message: String,
	},
	/// Platform (or token endpoint) failed temporarily and the retry budget is spent.
	#[error("Platform failed temporarily: {message}.")]
	TransientServer {
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Broker-supplied message summarizing the failure.
		message: String,
	},
	/// Platform request exceeded its deadline.
	#[error("Platform request timed out after {timeout:?}.")]
	OperationTimeout {
		/// Deadline that elapsed.
		timeout: StdDuration,
	},
}
impl PlatformError {
	/// Stable label used for logs and metrics.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Broker(_) => "broker",
			Self::RateLimited { .. } => "rate_limited",
			Self::AuthExpired { .. } => "auth_expired",
			Self::Validation { .. } => "validation",
			Self::TransientServer { .. } => "transient_server",
			Self::OperationTimeout { .. } => "operation_timeout",
		}
	}
}
impl From<Error> for PlatformError {
	fn from(e: Error) -> Self {
		match e {
			Error::ReauthRequired { reason } | Error::NotRefreshable { reason } =>
				Self::AuthExpired { reason },
			Error::Transient(TransientError::TokenEndpoint { message, status, .. }) =>
				Self::TransientServer { status, message },
			Error::Transient(other) => Self::TransientServer { status: None, message: other.to_string() },
			Error::Transport(other) => Self::TransientServer { status: None, message: other.to_string() },
			other => Self::Broker(other),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn state_errors_share_one_message() {
		assert_eq!(Error::InvalidState.to_string(), Error::ExpiredState.to_string());
	}

	#[test]
	fn reauth_and_not_refreshable_map_to_auth_expired() {
		let err = PlatformError::from(Error::ReauthRequired { reason: "invalid_grant".into() });

		assert!(matches!(err, PlatformError::AuthExpired { .. }));

		let err = PlatformError::from(Error::NotRefreshable { reason: "no refresh token".into() });

		assert!(matches!(err, PlatformError::AuthExpired { .. }));
	}

	#[test]
	fn transient_token_failures_map_to_transient_server() {
		let err = PlatformError::from(Error::from(TransientError::TokenEndpoint {
			message: "server_error".into(),
			status: Some(503),
			retry_after: None,
		}));

		assert!(matches!(err, PlatformError::TransientServer { status: Some(503), .. }));

		let err = PlatformError::from(Error::from(TransientError::Timeout {
			timeout: StdDuration::from_secs(30),
		}));

		assert_eq!(err.kind(), "transient_server");
	}

	#[test]
	fn configuration_errors_stay_broker_errors() {
		let err = PlatformError::from(Error::from(ConfigError::unknown_platform("myspace")));

		assert!(matches!(err, PlatformError::Broker(Error::Config(_))));
		assert!(err.to_string().contains("myspace"));
	}
}
