//! Storage contracts and built-in backends for encrypted token records.
//!
//! Backends only ever see [`StoredToken`] values: ciphertext plus the metadata needed to
//! address and expire them. Encryption happens in [`TokenVault`](crate::vault::TokenVault).

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{PlatformId, UserId},
};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract implemented by token stores.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Persists or replaces the record addressed by its (platform, user) key.
	fn save(&self, record: StoredToken) -> StoreFuture<'_, ()>;

	/// Fetches the record for the key, if present.
	fn fetch<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<StoredToken>>;

	/// Removes the record for the key, returning whether one existed.
	fn delete<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, bool>;
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Unique (platform, user) key identifying a stored record.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StoreKey {
	/// Platform component.
	pub platform: PlatformId,
	/// User component.
	pub user: UserId,
}
impl StoreKey {
	/// Builds a key for the provided platform and user.
	pub fn new(platform: &PlatformId, user: &UserId) -> Self {
		Self { platform: platform.clone(), user: user.clone() }
	}
}
impl Display for StoreKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}:{}", self.platform, self.user)
	}
}

/// Encrypted-at-rest representation of a token bundle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
	/// Platform the bundle was issued by.
	pub platform: PlatformId,
	/// User the bundle was issued to.
	pub user: UserId,
	/// Cipher identifier (for example `AES-256-GCM`).
	pub algorithm: String,
	/// Base64 of nonce followed by the authenticated ciphertext.
	pub ciphertext: String,
	/// Instant the record was written.
	pub stored_at: OffsetDateTime,
	/// Expiry of the wrapped access token.
	pub expires_at: OffsetDateTime,
}
impl StoredToken {
	/// Key addressing this record.
	pub fn key(&self) -> StoreKey {
		StoreKey::new(&self.platform, &self.user)
	}
}
