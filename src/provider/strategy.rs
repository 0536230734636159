//! Platform strategy hooks that classify token endpoint failures.
//!
//! Flows never branch on HTTP client types; they fill a [`TokenErrorContext`] and let the
//! platform's strategy decide whether the failure is fatal for the credential or worth
//! retrying.

// self
use crate::{_prelude::*, provider::descriptor::GrantType};

/// Strategy hook that maps token endpoint failures into broker categories.
///
/// Implementors must be `Send + Sync`; the registry shares one instance per platform across
/// every concurrent flow.
pub trait PlatformStrategy: Send + Sync {
	/// Maps low-level HTTP/JSON errors into the broker taxonomy for a token request.
	fn classify_token_error(&self, ctx: &TokenErrorContext) -> TokenErrorKind;
}

/// Canonical token endpoint failure categories used by strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenErrorKind {
	/// Provider rejected the grant (bad or consumed code, revoked refresh token).
	InvalidGrant,
	/// Client authentication failed.
	InvalidClient,
	/// Requested scopes exceed what the token covers.
	InsufficientScope,
	/// Failure is temporary and should be retried.
	Transient,
}

/// Context passed to strategies when classifying token errors.
///
/// Holds primitive data only (status code, OAuth fields, body preview) so strategies never
/// see transport types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenErrorContext {
	/// Grant type associated with the failing request.
	pub grant_type: GrantType,
	/// HTTP status code returned by the provider, when available.
	pub http_status: Option<u16>,
	/// Provider-supplied OAuth `error` field.
	pub oauth_error: Option<String>,
	/// Provider-supplied OAuth `error_description` field.
	pub error_description: Option<String>,
	/// Preview of the response body for non-JSON payloads.
	pub body_preview: Option<String>,
	/// Indicates whether the failure originated from the network/transport layer.
	pub network_error: bool,
}
impl TokenErrorContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Creates a new context scoped to the provided grant type.
	pub fn new(grant_type: GrantType) -> Self {
		Self {
			grant_type,
			http_status: None,
			oauth_error: None,
			error_description: None,
			body_preview: None,
			network_error: false,
		}
	}

	/// Convenience constructor for transport-level/network failures.
	pub fn network_failure(grant_type: GrantType) -> Self {
		let mut ctx = Self::new(grant_type);

		ctx.network_error = true;

		ctx
	}

	/// Adds an HTTP status code (e.g., 400, 401, 500).
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth error code string returned by the provider.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Adds a body preview for providers that return non-JSON payloads.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(truncate_preview(body.into()));

		self
	}
}

/// Default strategy that applies RFC 6749 heuristics.
///
/// Structured OAuth fields (`error`, `error_description`) win, then body text hints, then
/// the HTTP status code. Network failures are always transient.
#[derive(Debug, Default)]
pub struct DefaultPlatformStrategy;
impl Display for DefaultPlatformStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-platform-strategy")
	}
}
impl PlatformStrategy for DefaultPlatformStrategy {
	fn classify_token_error(&self, ctx: &TokenErrorContext) -> TokenErrorKind {
		if ctx.network_error {
			return TokenErrorKind::Transient;
		}
		if let Some(kind) =
			classify_oauth_error(ctx.oauth_error.as_deref(), ctx.error_description.as_deref())
		{
			return kind;
		}
		if let Some(kind) = classify_body(ctx.body_preview.as_deref()) {
			return kind;
		}

		classify_status(ctx.http_status)
	}
}

pub(crate) fn truncate_preview(body: String) -> String {
	if body.chars().count() <= TokenErrorContext::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = String::new();

	for (idx, ch) in body.chars().enumerate() {
		if idx >= TokenErrorContext::BODY_PREVIEW_LIMIT {
			buf.push('…');

			break;
		}
		buf.push(ch);
	}

	buf
}

fn classify_oauth_error(
	oauth_error: Option<&str>,
	error_description: Option<&str>,
) -> Option<TokenErrorKind> {
	oauth_error
		.and_then(match_exact_value)
		.or_else(|| error_description.and_then(match_exact_value))
		.or_else(|| classify_body(error_description))
}

fn match_exact_value(value: &str) -> Option<TokenErrorKind> {
	if value.eq_ignore_ascii_case("invalid_grant") || value.eq_ignore_ascii_case("access_denied") {
		Some(TokenErrorKind::InvalidGrant)
	} else if value.eq_ignore_ascii_case("invalid_client")
		|| value.eq_ignore_ascii_case("unauthorized_client")
	{
		Some(TokenErrorKind::InvalidClient)
	} else if value.eq_ignore_ascii_case("invalid_scope")
		|| value.eq_ignore_ascii_case("insufficient_scope")
	{
		Some(TokenErrorKind::InsufficientScope)
	} else if value.eq_ignore_ascii_case("temporarily_unavailable")
		|| value.eq_ignore_ascii_case("server_error")
	{
		Some(TokenErrorKind::Transient)
	} else {
		None
	}
}

fn classify_body(body: Option<&str>) -> Option<TokenErrorKind> {
	let body = body?;
	let lowered = body.to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("invalid_grant") => Some(TokenErrorKind::InvalidGrant),
		text if text.contains("invalid_client") => Some(TokenErrorKind::InvalidClient),
		text if text.contains("insufficient_scope") || text.contains("invalid_scope") =>
			Some(TokenErrorKind::InsufficientScope),
		text if text.contains("temporarily_unavailable") || text.contains("retry") =>
			Some(TokenErrorKind::Transient),
		_ => None,
	}
}

fn classify_status(status: Option<u16>) -> TokenErrorKind {
	match status {
		Some(400 | 404 | 410) => TokenErrorKind::InvalidGrant,
		Some(401) => TokenErrorKind::InvalidClient,
		Some(403) => TokenErrorKind::InsufficientScope,
		_ => TokenErrorKind::Transient,
	}
}
