//! AES-256-GCM envelope used for every persisted bundle.

// crates.io
use aes_gcm::{
	Aes256Gcm, KeyInit, Nonce,
	aead::{Aead, Payload},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use rand::Rng;
// self
use crate::{_prelude::*, vault::VaultError};

/// Algorithm identifier recorded next to every ciphertext.
pub const ALGORITHM: &str = "AES-256-GCM";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Process-wide 256-bit key established at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct VaultKey([u8; KEY_LEN]);
impl VaultKey {
	/// Generates a fresh key from the thread-local CSPRNG.
	pub fn generate() -> Self {
		let mut bytes = [0_u8; KEY_LEN];

		rand::rng().fill(&mut bytes);

		Self(bytes)
	}

	/// Wraps raw key material; exactly 32 bytes are required.
	pub fn from_bytes(bytes: &[u8]) -> Result<Self, VaultError> {
		let bytes = <[u8; KEY_LEN]>::try_from(bytes).map_err(|_| VaultError::InvalidKey {
			reason: format!("expected {KEY_LEN} bytes, got {}", bytes.len()),
		})?;

		Ok(Self(bytes))
	}

	/// Decodes a standard base64 key (as stored in a secret manager or environment variable).
	pub fn from_base64(encoded: &str) -> Result<Self, VaultError> {
		let bytes = STANDARD
			.decode(encoded.trim())
			.map_err(|e| VaultError::InvalidKey { reason: e.to_string() })?;

		Self::from_bytes(&bytes)
	}

	/// Encodes the key as standard base64 for export.
	pub fn to_base64(&self) -> String {
		STANDARD.encode(self.0)
	}
}
impl Debug for VaultKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("VaultKey").field(&"<redacted>").finish()
	}
}

/// Authenticated cipher bound to one [`VaultKey`].
pub(crate) struct VaultCipher(Aes256Gcm);
impl VaultCipher {
	pub(crate) fn new(key: &VaultKey) -> Self {
		Self(Aes256Gcm::new(&key.0.into()))
	}

	/// Encrypts `plaintext` with a random nonce; `aad` is authenticated but not stored.
	pub(crate) fn seal(&self, aad: &[u8], plaintext: &[u8]) -> Result<String, VaultError> {
		let mut nonce = [0_u8; NONCE_LEN];

		rand::rng().fill(&mut nonce);

		let sealed = self
			.0
			.encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
			.map_err(|_| VaultError::Encryption)?;
		let mut envelope = Vec::with_capacity(NONCE_LEN + sealed.len());

		envelope.extend_from_slice(&nonce);
		envelope.extend_from_slice(&sealed);

		Ok(STANDARD.encode(envelope))
	}

	/// Reverses [`seal`](Self::seal); fails if the key, nonce, AAD or ciphertext differ.
	pub(crate) fn open(&self, aad: &[u8], encoded: &str) -> Result<Vec<u8>, VaultError> {
		let envelope = STANDARD.decode(encoded).map_err(|_| VaultError::Decryption)?;

		if envelope.len() <= NONCE_LEN {
			return Err(VaultError::Decryption);
		}

		let (nonce, sealed) = envelope.split_at(NONCE_LEN);

		self.0
			.decrypt(Nonce::from_slice(nonce), Payload { msg: sealed, aad })
			.map_err(|_| VaultError::Decryption)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn seal_and_open_round_trip_with_fresh_nonces() {
		let cipher = VaultCipher::new(&VaultKey::generate());
		let first = cipher.seal(b"twitter:u1", b"payload").expect("Seal should succeed.");
		let second = cipher.seal(b"twitter:u1", b"payload").expect("Seal should succeed.");

		assert_ne!(first, second, "Each seal must use a fresh nonce.");
		assert_eq!(cipher.open(b"twitter:u1", &first).expect("Open should succeed."), b"payload");
	}

	#[test]
	fn open_rejects_wrong_aad_key_or_tampering() {
		let cipher = VaultCipher::new(&VaultKey::generate());
		let sealed = cipher.seal(b"twitter:u1", b"payload").expect("Seal should succeed.");

		assert!(matches!(cipher.open(b"twitter:u2", &sealed), Err(VaultError::Decryption)));

		let other = VaultCipher::new(&VaultKey::generate());

		assert!(matches!(other.open(b"twitter:u1", &sealed), Err(VaultError::Decryption)));

		let mut raw = STANDARD.decode(&sealed).expect("Envelope should be base64.");
		let last = raw.len() - 1;

		raw[last] ^= 0x01;

		assert!(matches!(
			cipher.open(b"twitter:u1", &STANDARD.encode(raw)),
			Err(VaultError::Decryption)
		));
		assert!(matches!(cipher.open(b"twitter:u1", "AAAA"), Err(VaultError::Decryption)));
	}

	#[test]
	fn keys_round_trip_through_base64_and_validate_length() {
		let key = VaultKey::generate();
		let restored = VaultKey::from_base64(&key.to_base64()).expect("Key should decode.");

		assert_eq!(key, restored);
		assert!(VaultKey::from_bytes(&[0_u8; 16]).is_err());
		assert!(VaultKey::from_base64("not base64!").is_err());
		assert_eq!(format!("{key:?}"), "VaultKey(\"<redacted>\")");
	}
}
