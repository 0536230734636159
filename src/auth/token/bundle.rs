//! Delegated credential bundle returned by token endpoints.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, token::secret::TokenSecret},
};

/// Token type assumed when a provider does not echo one back.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Errors produced by [`TokenBundleBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenBundleBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
	/// Issued when the expiry does not fall after the issued-at instant.
	#[error("Expiry must be later than the issued-at instant.")]
	NonPositiveLifetime,
}

/// Access credentials held for one (platform, user) pair.
///
/// Created on a successful code exchange, replaced on refresh, and deleted on revoke.
/// `expires_at` is always strictly after `issued_at`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBundle {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token secret, if the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Token type reported by the provider (usually `Bearer`).
	pub token_type: String,
	/// Scopes granted to this bundle.
	pub scope: ScopeSet,
	/// Instant the bundle was minted locally.
	pub issued_at: OffsetDateTime,
	/// Instant after which the access token is no longer usable.
	pub expires_at: OffsetDateTime,
}
impl TokenBundle {
	/// Returns a builder for the provided scope set.
	pub fn builder(scope: ScopeSet) -> TokenBundleBuilder {
		TokenBundleBuilder::new(scope)
	}

	/// Returns `true` once `instant` reaches `expires_at`.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Returns `true` when `instant` falls within `grace` of the expiry.
	pub fn is_near_expiry_at(&self, instant: OffsetDateTime, grace: Duration) -> bool {
		instant >= self.expires_at - grace
	}

	/// Remaining lifetime at `instant`, clamped at zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		(self.expires_at - instant).max(Duration::ZERO)
	}

	/// Returns `true` if the provider issued a refresh token.
	pub fn has_refresh_token(&self) -> bool {
		self.refresh_token.is_some()
	}
}
impl Debug for TokenBundle {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenBundle")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("token_type", &self.token_type)
			.field("scope", &self.scope)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`TokenBundle`].
#[derive(Clone, Debug)]
pub struct TokenBundleBuilder {
	scope: ScopeSet,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	token_type: Option<String>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl TokenBundleBuilder {
	fn new(scope: ScopeSet) -> Self {
		Self {
			scope,
			access_token: None,
			refresh_token: None,
			token_type: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
		}
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Carries over an already-wrapped refresh token (or clears it with `None`).
	pub fn refresh_secret(mut self, token: Option<TokenSecret>) -> Self {
		self.refresh_token = token;

		self
	}

	/// Overrides the token type; defaults to [`DEFAULT_TOKEN_TYPE`].
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Sets the issued-at instant; defaults to the current clock.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Consumes the builder and produces a [`TokenBundle`].
	pub fn build(self) -> Result<TokenBundle, TokenBundleBuilderError> {
		let access_token = self.access_token.ok_or(TokenBundleBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at + delta,
			(None, None) => return Err(TokenBundleBuilderError::MissingExpiry),
		};

		if expires_at <= issued_at {
			return Err(TokenBundleBuilderError::NonPositiveLifetime);
		}

		Ok(TokenBundle {
			access_token,
			refresh_token: self.refresh_token,
			token_type: self.token_type.unwrap_or_else(|| DEFAULT_TOKEN_TYPE.into()),
			scope: self.scope,
			issued_at,
			expires_at,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn scope() -> ScopeSet {
		ScopeSet::new(["tweet.read", "offline.access"]).expect("Scope fixture should be valid.")
	}

	#[test]
	fn builder_handles_relative_expiry() {
		let bundle = TokenBundle::builder(scope())
			.access_token("AT1")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::seconds(3_600))
			.build()
			.expect("Bundle builder should support relative expiry calculations.");

		assert_eq!(bundle.expires_at, macros::datetime!(2025-01-01 01:00 UTC));
		assert_eq!(bundle.token_type, DEFAULT_TOKEN_TYPE);
		assert!(!bundle.has_refresh_token());
	}

	#[test]
	fn builder_rejects_missing_fields_and_non_positive_lifetimes() {
		assert_eq!(
			TokenBundle::builder(scope()).expires_in(Duration::MINUTE).build().unwrap_err(),
			TokenBundleBuilderError::MissingAccessToken
		);
		assert_eq!(
			TokenBundle::builder(scope()).access_token("AT").build().unwrap_err(),
			TokenBundleBuilderError::MissingExpiry
		);
		assert_eq!(
			TokenBundle::builder(scope())
				.access_token("AT")
				.expires_in(Duration::ZERO)
				.build()
				.unwrap_err(),
			TokenBundleBuilderError::NonPositiveLifetime
		);
	}

	#[test]
	fn expiry_helpers_respect_grace_window() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let bundle = TokenBundle::builder(scope())
			.access_token("AT")
			.refresh_token("RT")
			.issued_at(issued)
			.expires_in(Duration::seconds(60))
			.build()
			.expect("Short-lived bundle should build.");

		assert!(bundle.is_near_expiry_at(issued, Duration::minutes(5)));
		assert!(!bundle.is_expired_at(issued));
		assert!(bundle.is_expired_at(issued + Duration::seconds(60)));
		assert_eq!(bundle.remaining_at(issued + Duration::hours(1)), Duration::ZERO);
	}

	#[test]
	fn debug_output_redacts_secrets() {
		let bundle = TokenBundle::builder(scope())
			.access_token("AT-very-secret")
			.refresh_token("RT-very-secret")
			.expires_in(Duration::HOUR)
			.build()
			.expect("Bundle should build.");
		let rendered = format!("{bundle:?}");

		assert!(!rendered.contains("very-secret"));
		assert!(rendered.contains("<redacted>"));
	}
}
