//! Built-in descriptors for the platforms the broker ships with.
//!
//! Quotas mirror each platform's published application limits; callers may still register
//! their own descriptors (or override these through configuration).

// self
use crate::{
	_prelude::*,
	auth::{PlatformId, ScopeSet},
	error::ConfigError,
	provider::{ClientAuthMethod, PlatformDescriptor, PlatformQuirks, RateQuota},
};

struct Builtin {
	id: &'static str,
	authorization: &'static str,
	token: &'static str,
	revocation: Option<&'static str>,
	scopes: &'static [&'static str],
	supports_refresh: bool,
	pkce_required: bool,
	auth_method: ClientAuthMethod,
	scope_delimiter: char,
	quota: RateQuota,
}

const TWITTER: Builtin = Builtin {
	id: "twitter",
	authorization: "https://twitter.com/i/oauth2/authorize",
	token: "https://api.twitter.com/2/oauth2/token",
	revocation: Some("https://api.twitter.com/2/oauth2/revoke"),
	scopes: &["tweet.read", "tweet.write", "users.read", "offline.access"],
	supports_refresh: true,
	pkce_required: true,
	auth_method: ClientAuthMethod::ClientSecretBasic,
	scope_delimiter: ' ',
	quota: RateQuota::new(300, 900),
};
const LINKEDIN: Builtin = Builtin {
	id: "linkedin",
	authorization: "https://www.linkedin.com/oauth/v2/authorization",
	token: "https://www.linkedin.com/oauth/v2/accessToken",
	revocation: None,
	scopes: &["r_liteprofile", "r_emailaddress", "w_member_social"],
	supports_refresh: true,
	pkce_required: false,
	auth_method: ClientAuthMethod::ClientSecretPost,
	scope_delimiter: ' ',
	quota: RateQuota::new(100, 3_600),
};
const INSTAGRAM: Builtin = Builtin {
	id: "instagram",
	authorization: "https://api.instagram.com/oauth/authorize",
	token: "https://api.instagram.com/oauth/access_token",
	revocation: None,
	scopes: &["user_profile", "user_media"],
	supports_refresh: false,
	pkce_required: false,
	auth_method: ClientAuthMethod::ClientSecretPost,
	scope_delimiter: ',',
	quota: RateQuota::new(200, 3_600),
};
const FACEBOOK: Builtin = Builtin {
	id: "facebook",
	authorization: "https://www.facebook.com/v18.0/dialog/oauth",
	token: "https://graph.facebook.com/v18.0/oauth/access_token",
	revocation: None,
	scopes: &["public_profile", "email", "pages_manage_posts"],
	supports_refresh: false,
	pkce_required: false,
	auth_method: ClientAuthMethod::ClientSecretPost,
	scope_delimiter: ',',
	quota: RateQuota::new(200, 3_600),
};
const YOUTUBE: Builtin = Builtin {
	id: "youtube",
	authorization: "https://accounts.google.com/o/oauth2/v2/auth",
	token: "https://oauth2.googleapis.com/token",
	revocation: Some("https://oauth2.googleapis.com/revoke"),
	scopes: &["https://www.googleapis.com/auth/youtube.upload"],
	supports_refresh: true,
	pkce_required: false,
	auth_method: ClientAuthMethod::ClientSecretPost,
	scope_delimiter: ' ',
	quota: RateQuota::new(10_000, 86_400),
};
const BUILTINS: [&Builtin; 5] = [&TWITTER, &LINKEDIN, &INSTAGRAM, &FACEBOOK, &YOUTUBE];

/// Identifiers of every built-in platform.
pub fn builtin_ids() -> impl Iterator<Item = &'static str> {
	BUILTINS.iter().map(|builtin| builtin.id)
}

/// Returns the built-in descriptor for `platform`, if one ships with the crate.
pub fn lookup(platform: &str) -> Option<Result<PlatformDescriptor, ConfigError>> {
	BUILTINS.iter().find(|builtin| builtin.id == platform).map(|builtin| describe(builtin))
}

/// Builds every built-in descriptor.
pub fn all() -> Result<Vec<PlatformDescriptor>, ConfigError> {
	BUILTINS.iter().map(|builtin| describe(builtin)).collect()
}

/// X (Twitter) OAuth 2.0 with mandatory PKCE.
pub fn twitter() -> Result<PlatformDescriptor, ConfigError> {
	describe(&TWITTER)
}

/// LinkedIn OAuth 2.0.
pub fn linkedin() -> Result<PlatformDescriptor, ConfigError> {
	describe(&LINKEDIN)
}

/// Instagram Basic Display.
pub fn instagram() -> Result<PlatformDescriptor, ConfigError> {
	describe(&INSTAGRAM)
}

/// Facebook Login (Graph API v18.0).
pub fn facebook() -> Result<PlatformDescriptor, ConfigError> {
	describe(&FACEBOOK)
}

/// Google OAuth 2.0 for YouTube uploads.
pub fn youtube() -> Result<PlatformDescriptor, ConfigError> {
	describe(&YOUTUBE)
}

fn describe(builtin: &Builtin) -> Result<PlatformDescriptor, ConfigError> {
	let parse = |raw: &str| Url::parse(raw).map_err(|source| ConfigError::InvalidDescriptor { source });
	let mut builder = PlatformDescriptor::builder(PlatformId::new(builtin.id)?)
		.authorization_endpoint(parse(builtin.authorization)?)
		.token_endpoint(parse(builtin.token)?)
		.default_scopes(ScopeSet::new(builtin.scopes.iter().copied())?)
		.supports_refresh(builtin.supports_refresh)
		.preferred_client_auth_method(builtin.auth_method)
		.quirks(PlatformQuirks {
			pkce_required: builtin.pkce_required,
			scope_delimiter: builtin.scope_delimiter,
		})
		.quota(builtin.quota);

	if let Some(revocation) = builtin.revocation {
		builder = builder.revocation_endpoint(parse(revocation)?);
	}

	Ok(builder.build()?)
}
