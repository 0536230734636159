#![cfg(feature = "reqwest")]

// std
use std::{env, fs, process};
// self
use platform_broker::{
	_preludet::*,
	auth::{PlatformId, UserId},
	store::FileStore,
	vault::{TokenLookup, TokenState, TokenVault, VaultKey},
};

fn snapshot_path() -> std::path::PathBuf {
	env::temp_dir().join(format!(
		"platform_broker_vault_it_{}_{}.json",
		process::id(),
		OffsetDateTime::now_utc().unix_timestamp_nanos(),
	))
}

fn ids() -> (PlatformId, UserId) {
	(
		PlatformId::new("linkedin").expect("Platform identifier should be valid."),
		UserId::new("user-file").expect("User identifier should be valid."),
	)
}

#[tokio::test]
async fn bundles_survive_a_restart_as_ciphertext_only() {
	let path = snapshot_path();
	let key = VaultKey::generate();
	let (platform, user) = ids();
	let bundle = bundle_fixture("AT-on-disk-marker", Some("RT-on-disk-marker"), Duration::hours(1));

	{
		let store = FileStore::open(&path).expect("File store should open.");
		let vault = TokenVault::new(key.clone(), Arc::new(store));

		vault.store(&platform, &user, &bundle).await.expect("Store should succeed.");
	}

	let snapshot = fs::read_to_string(&path).expect("Snapshot should be readable.");

	assert!(snapshot.contains("AES-256-GCM"));
	assert!(!snapshot.contains("AT-on-disk-marker"));
	assert!(!snapshot.contains("RT-on-disk-marker"));

	let reopened =
		TokenVault::new(key, Arc::new(FileStore::open(&path).expect("File store should reopen.")));

	assert_eq!(
		reopened.get(&platform, &user).await.expect("Lookup should succeed."),
		TokenLookup::Valid(bundle)
	);

	let stranger = TokenVault::new(
		VaultKey::generate(),
		Arc::new(FileStore::open(&path).expect("File store should reopen.")),
	);

	assert!(stranger.get(&platform, &user).await.is_err());

	assert!(reopened.delete(&platform, &user).await.expect("Delete should succeed."));
	assert_eq!(
		reopened.state(&platform, &user).await.expect("State should be readable."),
		TokenState::NotFound
	);

	let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn expired_and_near_expiry_bundles_are_classified() {
	let (vault, _) = build_memory_vault();
	let (platform, user) = ids();

	vault
		.store(&platform, &user, &bundle_fixture("AT-old", None, Duration::seconds(-1)))
		.await
		.expect("Store should succeed.");

	assert_eq!(vault.get(&platform, &user).await.expect("Lookup should succeed."), TokenLookup::Expired);

	vault
		.store(&platform, &user, &bundle_fixture("AT-aging", None, Duration::seconds(60)))
		.await
		.expect("Store should succeed.");

	assert_eq!(
		vault.state(&platform, &user).await.expect("State should be readable."),
		TokenState::NearExpiry
	);
}
