//! Thread-safe in-memory [`TokenStore`] for single-process deployments and tests.

// self
use crate::{
	_prelude::*,
	store::{StoreError, StoreFuture, StoreKey, StoredToken, TokenStore},
};

type StoreMap = Arc<RwLock<HashMap<StoreKey, StoredToken>>>;

/// Storage backend that keeps encrypted records in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Number of stored records.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when no record is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Snapshot of every stored record, ordered by key.
	pub fn records(&self) -> Vec<StoredToken> {
		let mut records = self.0.read().values().cloned().collect::<Vec<_>>();

		records.sort_by_key(StoredToken::key);

		records
	}

	fn save_now(map: StoreMap, record: StoredToken) -> Result<(), StoreError> {
		map.write().insert(record.key(), record);

		Ok(())
	}
}
impl TokenStore for MemoryStore {
	fn save(&self, record: StoredToken) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::save_now(map, record) })
	}

	fn fetch<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<StoredToken>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(key).cloned()) })
	}

	fn delete<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, bool> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.write().remove(key).is_some()) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::tests::stored_fixture;

	#[tokio::test]
	async fn save_fetch_delete_round_trip() {
		let store = MemoryStore::default();
		let record = stored_fixture("linkedin", "u1", "ciphertext-a");
		let key = record.key();

		store.save(record.clone()).await.expect("Save should succeed.");

		assert_eq!(store.fetch(&key).await.expect("Fetch should succeed."), Some(record));
		assert!(store.delete(&key).await.expect("Delete should succeed."));
		assert!(!store.delete(&key).await.expect("Second delete should succeed."));
		assert!(store.is_empty());
	}

	#[tokio::test]
	async fn save_replaces_existing_record() {
		let store = MemoryStore::default();

		store.save(stored_fixture("twitter", "u1", "first")).await.expect("Save should succeed.");
		store.save(stored_fixture("twitter", "u1", "second")).await.expect("Save should succeed.");
		store.save(stored_fixture("twitter", "u2", "other")).await.expect("Save should succeed.");

		let records = store.records();

		assert_eq!(records.len(), 2);
		assert_eq!(records[0].ciphertext, "second");
	}
}
