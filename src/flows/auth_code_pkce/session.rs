// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{PlatformId, ScopeSet, UserId},
	provider::PlatformDescriptor,
};

const STATE_BYTES: usize = 32;
const PKCE_VERIFIER_BYTES: usize = 32;

/// Supported PKCE challenge methods surfaced via [`AuthorizationSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Everything a caller needs to send the user to the provider.
#[derive(Clone, Debug)]
pub struct AuthorizationSession {
	/// Platform the session targets.
	pub platform: PlatformId,
	/// User the credentials will belong to.
	pub user: UserId,
	/// Fully-formed authorize URL to redirect the user to.
	pub authorize_url: Url,
	/// Opaque state value that must round-trip via the redirect.
	pub state: String,
	/// Scope carried in the authorize URL.
	pub scope: ScopeSet,
	/// Instant after which the callback is rejected.
	pub expires_at: OffsetDateTime,
	/// PKCE challenge, present when the platform requires PKCE.
	pub code_challenge: Option<String>,
}
impl AuthorizationSession {
	/// PKCE challenge method, when a challenge was issued.
	pub fn code_challenge_method(&self) -> Option<PkceCodeChallengeMethod> {
		self.code_challenge.as_ref().map(|_| PkceCodeChallengeMethod::S256)
	}
}

pub(super) struct PkcePair {
	pub(super) verifier: String,
	pub(super) challenge: String,
}
impl PkcePair {
	pub(super) fn generate() -> Self {
		let verifier = random_token(PKCE_VERIFIER_BYTES);
		let challenge = compute_pkce_challenge(&verifier);

		Self { verifier, challenge }
	}
}

/// 256-bit CSRF state, base64url without padding.
pub(super) fn generate_state() -> String {
	random_token(STATE_BYTES)
}

pub(super) fn build_authorize_url(
	descriptor: &PlatformDescriptor,
	client_id: &str,
	redirect_uri: &Url,
	scope: &ScopeSet,
	state: &str,
	pkce: Option<&PkcePair>,
) -> Url {
	let mut url = descriptor.endpoints.authorization.clone();

	{
		let mut pairs = url.query_pairs_mut();

		pairs.append_pair("response_type", "code");
		pairs.append_pair("client_id", client_id);
		pairs.append_pair("redirect_uri", redirect_uri.as_str());

		if !scope.is_empty() {
			pairs.append_pair("scope", &scope.join(descriptor.quirks.scope_delimiter));
		}

		pairs.append_pair("state", state);

		if let Some(pkce) = pkce {
			pairs.append_pair("code_challenge", &pkce.challenge);
			pairs.append_pair("code_challenge_method", PkceCodeChallengeMethod::S256.as_str());
		}
	}

	url
}

fn random_token(len: usize) -> String {
	let mut bytes = vec![0_u8; len];

	rand::rng().fill(bytes.as_mut_slice());

	URL_SAFE_NO_PAD.encode(bytes)
}

pub(super) fn compute_pkce_challenge(verifier: &str) -> String {
	URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::provider::catalog;

	fn is_unreserved(c: char) -> bool {
		c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')
	}

	#[test]
	fn pkce_verifier_is_43_unreserved_chars_with_matching_challenge() {
		let pair = PkcePair::generate();

		assert_eq!(pair.verifier.len(), 43);
		assert!(pair.verifier.chars().all(is_unreserved));

		let expected = URL_SAFE_NO_PAD.encode(Sha256::digest(pair.verifier.as_bytes()));

		assert_eq!(pair.challenge, expected);
		assert_eq!(pair.challenge.len(), 43);
	}

	#[test]
	fn rfc7636_appendix_b_vector() {
		assert_eq!(
			compute_pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
			"E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
		);
	}

	#[test]
	fn state_is_256_bits_of_url_safe_text() {
		let state = generate_state();

		assert_eq!(state.len(), 43);
		assert!(state.chars().all(is_unreserved));
		assert_eq!(URL_SAFE_NO_PAD.decode(&state).expect("State should decode.").len(), 32);
	}

	#[test]
	fn authorize_url_carries_every_parameter() {
		let descriptor = catalog::facebook().expect("Facebook descriptor should build.");
		let scope = ScopeSet::new(["public_profile", "email"]).expect("Scope should be valid.");
		let redirect = Url::parse("https://app.example.com/cb").expect("Redirect should parse.");
		let pkce = PkcePair::generate();
		let url = build_authorize_url(&descriptor, "client", &redirect, &scope, "st", Some(&pkce));
		let pairs = url.query_pairs().into_owned().collect::<HashMap<_, _>>();

		assert_eq!(pairs.get("response_type").map(String::as_str), Some("code"));
		assert_eq!(pairs.get("client_id").map(String::as_str), Some("client"));
		assert_eq!(pairs.get("redirect_uri").map(String::as_str), Some("https://app.example.com/cb"));
		assert_eq!(pairs.get("scope").map(String::as_str), Some("email,public_profile"));
		assert_eq!(pairs.get("state").map(String::as_str), Some("st"));
		assert_eq!(pairs.get("code_challenge"), Some(&pkce.challenge));
		assert_eq!(pairs.get("code_challenge_method").map(String::as_str), Some("S256"));
	}
}
