//! File-backed [`TokenStore`] that keeps a JSON snapshot of encrypted records.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{StoreError, StoreFuture, StoreKey, StoredToken, TokenStore},
};

/// Persists encrypted records to a JSON file after each mutation.
///
/// The snapshot is rewritten through a temporary file and an atomic rename, so a crash never
/// leaves a half-written file behind. Only ciphertext reaches disk.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<BTreeMap<StoreKey, StoredToken>>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		ensure_parent_exists(&path)?;

		let snapshot = load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the snapshot file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn persist_locked(&self, contents: &BTreeMap<StoreKey, StoredToken>) -> Result<(), StoreError> {
		ensure_parent_exists(&self.path)?;

		let snapshot = contents.values().collect::<Vec<_>>();
		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| backend("create", &tmp_path, e))?;

			file.write_all(&serialized).map_err(|e| backend("write", &tmp_path, e))?;
			file.sync_all().map_err(|e| backend("sync", &tmp_path, e))?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| backend("replace", &self.path, e))
	}
}
impl TokenStore for FileStore {
	fn save(&self, record: StoredToken) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			guard.insert(record.key(), record);
			self.persist_locked(&guard)
		})
	}

	fn fetch<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<StoredToken>> {
		Box::pin(async move { Ok(self.inner.read().get(key).cloned()) })
	}

	fn delete<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			if guard.remove(key).is_none() {
				return Ok(false);
			}

			self.persist_locked(&guard)?;

			Ok(true)
		})
	}
}

fn load_snapshot(path: &Path) -> Result<BTreeMap<StoreKey, StoredToken>, StoreError> {
	if !path.exists() {
		return Ok(BTreeMap::new());
	}

	let bytes = fs::read(path).map_err(|e| backend("read", path, e))?;

	if bytes.is_empty() {
		return Ok(BTreeMap::new());
	}

	let entries: Vec<StoredToken> =
		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})?;

	Ok(entries.into_iter().map(|record| (record.key(), record)).collect())
}

fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(|e| backend("create directory", parent, e))?;
	}

	Ok(())
}

fn backend(action: &str, path: &Path, e: std::io::Error) -> StoreError {
	StoreError::Backend { message: format!("Failed to {action} {}: {e}", path.display()) }
}
