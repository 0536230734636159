//! Encrypted, cached, expiry-aware storage for credential bundles.
//!
//! The vault is the single source of truth for "is this token usable now". Bundles are
//! encrypted with AES-256-GCM before they reach a [`TokenStore`]; the (platform, user) key is
//! bound as associated data so a record copied under another key fails to decrypt. Reads
//! never hand out a bundle whose expiry has passed.
//!
//! Writes evict the cached entry before touching the backing store. Concurrent writes for the
//! same key are not ordered by the vault; [`FlowManager`](crate::flows::FlowManager) serializes
//! them per (platform, user) with its flow guards.

pub mod cipher;

pub use cipher::{ALGORITHM, VaultKey};

// self
use crate::{
	_prelude::*,
	auth::{PlatformId, TokenBundle, UserId},
	store::{StoreKey, StoredToken, TokenStore},
	vault::cipher::VaultCipher,
};

/// Grace window applied when callers do not override it.
pub const DEFAULT_GRACE_WINDOW: Duration = Duration::minutes(5);

/// Errors raised by the vault's cipher layer.
#[derive(Debug, ThisError)]
pub enum VaultError {
	/// Sealing the bundle failed; nothing was persisted.
	#[error("Token bundle could not be encrypted.")]
	Encryption,
	/// The record failed authentication (wrong key, wrong record key, or tampering).
	#[error("Token record could not be decrypted.")]
	Decryption,
	/// Bundle (de)serialization failed.
	#[error("Token bundle could not be serialized: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Key material is malformed.
	#[error("Vault key is invalid: {reason}.")]
	InvalidKey {
		/// Why the key was rejected.
		reason: String,
	},
	/// The record was written by a cipher this build does not support.
	#[error("Token record uses unsupported algorithm `{algorithm}`.")]
	UnsupportedAlgorithm {
		/// Algorithm identifier found on the record.
		algorithm: String,
	},
}

/// Result of a vault lookup, classified against the grace window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenLookup {
	/// Bundle is usable and outside the grace window.
	Valid(TokenBundle),
	/// Bundle is still usable but expires within the grace window.
	NearExpiry(TokenBundle),
	/// A bundle exists but its expiry has passed; it is withheld.
	Expired,
	/// No bundle is stored for the key.
	NotFound,
}
impl TokenLookup {
	/// Classification without the bundle.
	pub fn state(&self) -> TokenState {
		match self {
			Self::Valid(_) => TokenState::Valid,
			Self::NearExpiry(_) => TokenState::NearExpiry,
			Self::Expired => TokenState::Expired,
			Self::NotFound => TokenState::NotFound,
		}
	}
}

/// Bundle-free classification reported by [`TokenVault::state`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
	/// Bundle is usable and outside the grace window.
	Valid,
	/// Bundle expires within the grace window.
	NearExpiry,
	/// Bundle expired.
	Expired,
	/// No bundle stored.
	NotFound,
}
impl TokenState {
	/// Stable label for logs and status payloads.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Valid => "valid",
			Self::NearExpiry => "near_expiry",
			Self::Expired => "expired",
			Self::NotFound => "not_found",
		}
	}
}
impl Display for TokenState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Encrypting, caching front for a [`TokenStore`].
pub struct TokenVault {
	cipher: VaultCipher,
	store: Arc<dyn TokenStore>,
	cache: RwLock<HashMap<StoreKey, TokenBundle>>,
	grace: Duration,
}
impl TokenVault {
	/// Creates a vault sealing records with `key` and persisting through `store`.
	pub fn new(key: VaultKey, store: Arc<dyn TokenStore>) -> Self {
		Self {
			cipher: VaultCipher::new(&key),
			store,
			cache: RwLock::new(HashMap::new()),
			grace: DEFAULT_GRACE_WINDOW,
		}
	}

	/// Overrides the grace window used to report [`TokenLookup::NearExpiry`].
	pub fn with_grace_window(mut self, grace: Duration) -> Self {
		self.grace = grace.max(Duration::ZERO);

		self
	}

	/// Grace window currently applied.
	pub fn grace_window(&self) -> Duration {
		self.grace
	}

	/// Encrypts and persists `bundle`, replacing any previous record, then caches it.
	pub async fn store(
		&self,
		platform: &PlatformId,
		user: &UserId,
		bundle: &TokenBundle,
	) -> Result<()> {
		let key = StoreKey::new(platform, user);
		let plaintext = serde_json::to_vec(bundle)
			.map_err(|e| VaultError::Serialization { message: e.to_string() })?;
		let ciphertext = self.cipher.seal(key.to_string().as_bytes(), &plaintext)?;
		let record = StoredToken {
			platform: platform.clone(),
			user: user.clone(),
			algorithm: ALGORITHM.into(),
			ciphertext,
			stored_at: OffsetDateTime::now_utc(),
			expires_at: bundle.expires_at,
		};

		self.cache.write().remove(&key);
		self.store.save(record).await?;
		self.cache.write().insert(key, bundle.clone());

		tracing::debug!(%platform, %user, expires_at = %bundle.expires_at, "Stored token bundle.");

		Ok(())
	}

	/// Looks up and classifies the bundle for (platform, user).
	pub async fn get(&self, platform: &PlatformId, user: &UserId) -> Result<TokenLookup> {
		Ok(self.observe(platform, user).await?.0)
	}

	/// Classification only; the bundle never leaves the vault.
	pub async fn state(&self, platform: &PlatformId, user: &UserId) -> Result<TokenState> {
		Ok(self.get(platform, user).await?.state())
	}

	/// Removes the bundle from the cache and the backing store.
	pub async fn delete(&self, platform: &PlatformId, user: &UserId) -> Result<bool> {
		let key = StoreKey::new(platform, user);

		self.cache.write().remove(&key);

		let existed = self.store.delete(&key).await?;

		tracing::debug!(%platform, %user, existed, "Deleted token bundle.");

		Ok(existed)
	}

	/// Classifies like [`TokenVault::get`], also reporting the `issued_at` of the stored bundle.
	///
	/// The issue time identifies the bundle the caller saw, even when it is withheld as expired.
	pub(crate) async fn observe(
		&self,
		platform: &PlatformId,
		user: &UserId,
	) -> Result<(TokenLookup, Option<OffsetDateTime>)> {
		let key = StoreKey::new(platform, user);
		let now = OffsetDateTime::now_utc();
		let Some(bundle) = self.load(&key).await? else {
			return Ok((TokenLookup::NotFound, None));
		};
		let issued_at = Some(bundle.issued_at);
		let lookup = if bundle.is_expired_at(now) {
			TokenLookup::Expired
		} else if bundle.is_near_expiry_at(now, self.grace) {
			TokenLookup::NearExpiry(bundle)
		} else {
			TokenLookup::Valid(bundle)
		};

		Ok((lookup, issued_at))
	}

	/// Returns the stored bundle regardless of expiry.
	///
	/// Only the refresh flow may see expired bundles, because it needs their refresh token.
	pub(crate) async fn load(&self, key: &StoreKey) -> Result<Option<TokenBundle>> {
		let now = OffsetDateTime::now_utc();

		{
			let mut cache = self.cache.write();

			match cache.get(key) {
				Some(bundle) if !bundle.is_expired_at(now) => return Ok(Some(bundle.clone())),
				Some(_) => {
					cache.remove(key);
				},
				None => (),
			}
		}

		let Some(record) = self.store.fetch(key).await? else {
			return Ok(None);
		};

		if record.algorithm != ALGORITHM {
			return Err(VaultError::UnsupportedAlgorithm { algorithm: record.algorithm }.into());
		}

		let plaintext = self.cipher.open(key.to_string().as_bytes(), &record.ciphertext)?;
		let bundle: TokenBundle = serde_json::from_slice(&plaintext)
			.map_err(|e| VaultError::Serialization { message: e.to_string() })?;

		if !bundle.is_expired_at(now) {
			self.cache.write().insert(key.clone(), bundle.clone());
		}

		Ok(Some(bundle))
	}

	#[cfg(test)]
	fn evict_cache(&self) {
		self.cache.write().clear();
	}
}
impl Debug for TokenVault {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenVault")
			.field("cached", &self.cache.read().len())
			.field("grace", &self.grace)
			.finish_non_exhaustive()
	}
}
