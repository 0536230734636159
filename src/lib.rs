//! Multi-platform delegated-credential broker: OAuth 2.0 + PKCE flows, an encrypted token
//! vault, single-flight refresh, and quota-aware dispatch to platform APIs.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod platform;
pub mod provider;
pub mod rate_limit;
pub mod store;
pub mod vault;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{PlatformId, ScopeSet, TokenBundle},
		flows::{FlowManager, FlowSettings},
		http::ReqwestHttpClient,
		oauth::ReqwestTransportErrorMapper,
		provider::{
			ClientAuthMethod, ClientCredentials, PlatformDescriptor, PlatformQuirks, PlatformRegistry,
			RateQuota,
		},
		store::MemoryStore,
		vault::{TokenVault, VaultKey},
	};

	/// Flow manager type alias used by reqwest-backed integration tests.
	pub type ReqwestTestFlows = FlowManager<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_client() -> ReqwestClient {
		ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.")
	}

	/// Token transport wrapper around [`test_reqwest_client`].
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		ReqwestHttpClient::with_client(test_reqwest_client())
	}

	/// Builds a refreshable, PKCE-requiring descriptor whose endpoints live on a mock server.
	///
	/// `url` maps a path such as `/token` to an absolute URL (typically `MockServer::url`).
	pub fn mock_platform_descriptor(platform: &str, url: impl Fn(&str) -> String) -> PlatformDescriptor {
		let endpoint = |path: &str| Url::parse(&url(path)).expect("Mock endpoint should parse.");

		PlatformDescriptor::builder(PlatformId::new(platform).expect("Platform id should be valid."))
			.authorization_endpoint(endpoint("/authorize"))
			.token_endpoint(endpoint("/token"))
			.revocation_endpoint(endpoint("/revoke"))
			.default_scopes(
				ScopeSet::new(["tweet.read", "offline.access"]).expect("Scopes should be valid."),
			)
			.supports_refresh(true)
			.preferred_client_auth_method(ClientAuthMethod::ClientSecretBasic)
			.quirks(PlatformQuirks { pkce_required: true, scope_delimiter: ' ' })
			.quota(RateQuota::new(300, 900))
			.build()
			.expect("Mock descriptor should build.")
	}

	/// Builds a bundle issued two hours ago that expires `remaining` from now.
	///
	/// A negative `remaining` yields an already expired bundle.
	pub fn bundle_fixture(access: &str, refresh: Option<&str>, remaining: Duration) -> TokenBundle {
		let now = OffsetDateTime::now_utc();
		let mut builder = TokenBundle::builder(
			ScopeSet::new(["tweet.read", "offline.access"]).expect("Scopes should be valid."),
		)
		.access_token(access)
		.issued_at(now - Duration::hours(2))
		.expires_at(now + remaining);

		if let Some(refresh) = refresh {
			builder = builder.refresh_token(refresh);
		}

		builder.build().expect("Bundle fixture should build.")
	}

	/// Builds a vault backed by an in-memory store and a freshly generated key.
	pub fn build_memory_vault() -> (Arc<TokenVault>, Arc<MemoryStore>) {
		let store = Arc::new(MemoryStore::default());
		let vault = Arc::new(TokenVault::new(VaultKey::generate(), store.clone()));

		(vault, store)
	}

	/// Constructs a [`FlowManager`] for a single descriptor, backed by an in-memory vault and
	/// the reqwest transport used across integration tests.
	pub fn build_reqwest_test_flows(
		descriptor: PlatformDescriptor,
		client_id: &str,
		client_secret: &str,
	) -> (Arc<ReqwestTestFlows>, Arc<TokenVault>, Arc<MemoryStore>) {
		let mut registry = PlatformRegistry::default();

		registry.register(
			descriptor,
			Some(ClientCredentials::new(client_id).with_secret(client_secret)),
		);

		let (vault, store) = build_memory_vault();
		let flows = FlowManager::with_http_client(
			Arc::new(registry),
			vault.clone(),
			test_reqwest_http_client(),
			Arc::new(ReqwestTransportErrorMapper),
		)
		.with_settings(FlowSettings::default());

		(Arc::new(flows), vault, store)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::Hash,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value as JsonValue;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, PlatformError, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
