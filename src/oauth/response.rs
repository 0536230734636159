//! Token endpoint success payload tolerant of providers that omit `token_type`.

// crates.io
use oauth2::{
	AccessToken, RefreshToken, Scope, TokenResponse,
	basic::BasicTokenType,
	helpers::{
		deserialize_space_delimited_vec, deserialize_untagged_enum_case_insensitive,
		serialize_space_delimited_vec,
	},
};
// self
use crate::_prelude::*;

/// RFC 6749 §5.1 response where a missing `token_type` means bearer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlatformTokenResponse {
	access_token: AccessToken,
	#[serde(default = "bearer", deserialize_with = "deserialize_untagged_enum_case_insensitive")]
	token_type: BasicTokenType,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	expires_in: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	refresh_token: Option<RefreshToken>,
	#[serde(
		rename = "scope",
		default,
		deserialize_with = "deserialize_space_delimited_vec",
		serialize_with = "serialize_space_delimited_vec",
		skip_serializing_if = "Option::is_none"
	)]
	scopes: Option<Vec<Scope>>,
}
impl TokenResponse for PlatformTokenResponse {
	type TokenType = BasicTokenType;

	fn access_token(&self) -> &AccessToken {
		&self.access_token
	}

	fn token_type(&self) -> &BasicTokenType {
		&self.token_type
	}

	fn expires_in(&self) -> Option<StdDuration> {
		self.expires_in.map(StdDuration::from_secs)
	}

	fn refresh_token(&self) -> Option<&RefreshToken> {
		self.refresh_token.as_ref()
	}

	fn scopes(&self) -> Option<&Vec<Scope>> {
		self.scopes.as_ref()
	}
}

fn bearer() -> BasicTokenType {
	BasicTokenType::Bearer
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn missing_token_type_defaults_to_bearer() {
		let response: PlatformTokenResponse =
			serde_json::from_str("{\"access_token\":\"AT1\",\"expires_in\":3600}")
				.expect("Minimal token response should parse.");

		assert_eq!(response.access_token().secret(), "AT1");
		assert_eq!(response.token_type(), &BasicTokenType::Bearer);
		assert_eq!(response.expires_in(), Some(StdDuration::from_secs(3600)));
		assert!(response.refresh_token().is_none());
		assert!(response.scopes().is_none());
	}

	#[test]
	fn explicit_fields_are_preserved() {
		let response: PlatformTokenResponse = serde_json::from_str(
			"{\"access_token\":\"AT1\",\"token_type\":\"MAC\",\"refresh_token\":\"RT1\",\"scope\":\"a b\"}",
		)
		.expect("Full token response should parse.");

		assert_eq!(response.token_type(), &BasicTokenType::Mac);
		assert_eq!(response.refresh_token().map(|t| t.secret().as_str()), Some("RT1"));
		assert_eq!(
			response.scopes().map(|s| s.iter().map(|s| s.as_str()).collect::<Vec<_>>()),
			Some(vec!["a", "b"])
		);
		assert!(response.expires_in().is_none());
	}
}
