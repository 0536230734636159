//! Single-use pending authorization state.
//!
//! A [`PendingAuthorization`] lives from `initiate` until its callback arrives (or its TTL
//! passes). [`PendingStore::take`] is the only way to read one, and it removes the entry in
//! the same step, so a state value can be redeemed at most once.

// self
use crate::{
	_prelude::*,
	auth::{PlatformId, ScopeSet, TokenSecret, UserId},
	store::{StoreError, StoreFuture},
};

/// Authorization attempt awaiting its provider callback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
	/// Opaque CSRF state echoed by the provider.
	pub state: String,
	/// Platform the attempt targets.
	pub platform: PlatformId,
	/// User the resulting credentials belong to.
	pub user: UserId,
	/// Redirect URI sent in the authorize request; replayed during the exchange.
	pub redirect_uri: Url,
	/// Scope requested in the authorize request.
	pub scope: ScopeSet,
	/// PKCE verifier, present only for platforms that require PKCE.
	pub code_verifier: Option<TokenSecret>,
	/// Creation instant.
	pub created_at: OffsetDateTime,
	/// Instant after which the attempt is unusable.
	pub expires_at: OffsetDateTime,
}
impl PendingAuthorization {
	/// Returns `true` once `instant` reaches the expiry.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}
}

/// Storage for pending authorizations.
///
/// Multi-instance deployments plug a shared TTL store in behind this trait; callbacks may
/// then land on any instance.
pub trait PendingStore
where
	Self: Send + Sync,
{
	/// Records a new pending authorization keyed by its state.
	fn insert(&self, pending: PendingAuthorization) -> StoreFuture<'_, ()>;

	/// Atomically removes and returns the entry for `state`.
	fn take<'a>(&'a self, state: &'a str) -> StoreFuture<'a, Option<PendingAuthorization>>;

	/// Drops every entry expired at `now`, returning how many were removed.
	fn sweep(&self, now: OffsetDateTime) -> StoreFuture<'_, usize>;
}

/// In-process [`PendingStore`] suitable for single-instance deployments.
#[derive(Debug, Default)]
pub struct MemoryPendingStore(Mutex<HashMap<String, PendingAuthorization>>);
impl MemoryPendingStore {
	/// Number of resident entries, expired or not.
	pub fn len(&self) -> usize {
		self.0.lock().len()
	}

	/// Returns `true` when nothing is pending.
	pub fn is_empty(&self) -> bool {
		self.0.lock().is_empty()
	}
}
impl PendingStore for MemoryPendingStore {
	fn insert(&self, pending: PendingAuthorization) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut entries = self.0.lock();

			if entries.contains_key(&pending.state) {
				return Err(StoreError::Backend { message: "Pending state collision.".into() });
			}

			entries.insert(pending.state.clone(), pending);

			Ok(())
		})
	}

	fn take<'a>(&'a self, state: &'a str) -> StoreFuture<'a, Option<PendingAuthorization>> {
		Box::pin(async move { Ok(self.0.lock().remove(state)) })
	}

	fn sweep(&self, now: OffsetDateTime) -> StoreFuture<'_, usize> {
		Box::pin(async move {
			let mut entries = self.0.lock();
			let before = entries.len();

			entries.retain(|_, pending| !pending.is_expired_at(now));

			Ok(before - entries.len())
		})
	}
}

#[cfg(test)]
pub(crate) mod tests {
	// self
	use super::*;

	pub(crate) fn pending_fixture(state: &str, expires_at: OffsetDateTime) -> PendingAuthorization {
		PendingAuthorization {
			state: state.into(),
			platform: PlatformId::new("twitter").expect("Platform fixture should be valid."),
			user: UserId::new("u1").expect("User fixture should be valid."),
			redirect_uri: Url::parse("https://app.example.com/callback")
				.expect("Redirect fixture should parse."),
			scope: ScopeSet::new(["tweet.read"]).expect("Scope fixture should be valid."),
			code_verifier: Some(TokenSecret::new("verifier")),
			created_at: expires_at - Duration::minutes(10),
			expires_at,
		}
	}

	#[tokio::test]
	async fn take_consumes_exactly_once() {
		let store = MemoryPendingStore::default();
		let expires_at = OffsetDateTime::now_utc() + Duration::minutes(10);

		store.insert(pending_fixture("s1", expires_at)).await.expect("Insert should succeed.");

		assert!(store.take("s1").await.expect("Take should succeed.").is_some());
		assert!(store.take("s1").await.expect("Take should succeed.").is_none());
		assert!(store.is_empty());
	}

	#[tokio::test]
	async fn duplicate_states_are_rejected() {
		let store = MemoryPendingStore::default();
		let expires_at = OffsetDateTime::now_utc() + Duration::minutes(10);

		store.insert(pending_fixture("dup", expires_at)).await.expect("Insert should succeed.");

		assert!(store.insert(pending_fixture("dup", expires_at)).await.is_err());
	}

	#[tokio::test]
	async fn sweep_removes_only_expired_entries() {
		let store = MemoryPendingStore::default();
		let now = OffsetDateTime::now_utc();

		store.insert(pending_fixture("old", now - Duration::seconds(1))).await.expect("Insert.");
		store.insert(pending_fixture("new", now + Duration::minutes(5))).await.expect("Insert.");

		assert_eq!(store.sweep(now).await.expect("Sweep should succeed."), 1);
		assert_eq!(store.len(), 1);
		assert!(store.take("new").await.expect("Take should succeed.").is_some());
	}
}
