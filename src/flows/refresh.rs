//! Refresh token orchestration with single-flight guards and metrics.
//!
//! Each caller records a baseline before queueing on the per-key guard: either the instant it
//! asked for a refresh, or the `issued_at` of the bundle its own vault lookup returned.
//! Whoever holds the guard re-reads the vault; a bundle newer than the baseline means another
//! caller already refreshed, so that result is returned without a second token endpoint call.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{TokenBundle, UserId},
	flows::{FlowManager, common},
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::StoreKey,
};

/// What a caller knew about the stored bundle before it queued for the guard.
#[derive(Clone, Copy, Debug)]
enum Baseline {
	/// Instant the refresh was requested.
	RequestedAt(OffsetDateTime),
	/// `issued_at` of the bundle seen by the caller's lookup; `None` when nothing was stored.
	Observed(Option<OffsetDateTime>),
}
impl Baseline {
	fn superseded_by(self, current: &TokenBundle) -> bool {
		match self {
			Self::RequestedAt(requested_at) => current.issued_at >= requested_at,
			Self::Observed(seen) => seen != Some(current.issued_at),
		}
	}
}

impl<C, M> FlowManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Exchanges the stored refresh token for a new bundle and persists it.
	///
	/// Rejections by the provider (`invalid_grant`, `invalid_client`, HTTP 401) delete the
	/// stored bundle and surface as [`Error::ReauthRequired`].
	pub async fn refresh(&self, platform: &str, user: &UserId) -> Result<TokenBundle> {
		self.refresh_since(platform, user, Baseline::RequestedAt(OffsetDateTime::now_utc())).await
	}

	/// Refreshes unless the stored bundle no longer matches the one a prior lookup returned.
	///
	/// `observed` is the `issued_at` of the bundle the deciding lookup saw, `None` if it saw none.
	pub(crate) async fn refresh_observed(
		&self,
		platform: &str,
		user: &UserId,
		observed: Option<OffsetDateTime>,
	) -> Result<TokenBundle> {
		self.refresh_since(platform, user, Baseline::Observed(observed)).await
	}

	async fn refresh_since(
		&self,
		platform: &str,
		user: &UserId,
		baseline: Baseline,
	) -> Result<TokenBundle> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh", platform);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let entry = self.registry.entry(platform)?;
				let descriptor = &entry.descriptor;

				if !descriptor.supports_refresh {
					return Err(Error::NotRefreshable {
						reason: format!("platform `{}` does not issue refresh tokens", descriptor.id),
					});
				}

				self.refresh_metrics.record_attempt();

				let key = StoreKey::new(&descriptor.id, user);
				let guard = common::flow_guard(self, &key);
				let _singleflight = guard.lock().await;
				let current = self.vault.load(&key).await.inspect_err(|_| {
					self.refresh_metrics.record_failure();
				})?;
				let Some(current) = current else {
					self.refresh_metrics.record_failure();

					return Err(Error::ReauthRequired { reason: "no stored credentials".into() });
				};

				if baseline.superseded_by(&current) {
					self.refresh_metrics.record_coalesced();

					tracing::debug!(%user, "Reused a refresh completed while waiting.");

					return Ok(current);
				}

				let Some(refresh_token) = current.refresh_token.as_ref() else {
					self.refresh_metrics.record_failure();

					return Err(Error::NotRefreshable {
						reason: "stored credentials carry no refresh token".into(),
					});
				};
				let refreshed = async {
					let facade = common::facade_for(self, entry)?;

					common::with_timeout(
						self.settings.token_timeout,
						facade.refresh_token(entry.strategy.as_ref(), refresh_token, &current.scope),
					)
					.await
				}
				.await;
				let bundle = match refreshed {
					Ok(bundle) => bundle,
					Err(e) => {
						self.refresh_metrics.record_failure();

						if matches!(e, Error::ReauthRequired { .. }) {
							self.vault.delete(&descriptor.id, user).await?;

							tracing::warn!(%user, error = %e, "Refresh rejected; deleted stored credentials.");
						}

						return Err(e);
					},
				};

				self.vault.store(&descriptor.id, user, &bundle).await.inspect_err(|_| {
					self.refresh_metrics.record_failure();
				})?;
				self.refresh_metrics.record_success();

				tracing::info!(%user, expires_at = %bundle.expires_at, "Refreshed credentials.");

				Ok(bundle)
			})
			.await;

		obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

		result
	}
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// crates.io
	use httpmock::prelude::*;
	// self
	use super::*;
	use crate::{
		_preludet::*,
		auth::{PlatformId, ScopeSet},
	};

	#[tokio::test]
	async fn lookups_overtaken_by_a_committed_refresh_reuse_its_bundle() {
		let server = MockServer::start_async().await;
		let descriptor = mock_platform_descriptor("twitter", |path| server.url(path));
		let (flows, vault, _) = build_reqwest_test_flows(descriptor, "client-race", "secret-race");
		let platform = PlatformId::new("twitter").expect("Platform identifier should be valid.");
		let user = UserId::new("user-race").expect("User identifier should be valid.");

		vault
			.store(&platform, &user, &bundle_fixture("AT-old", Some("RT1"), Duration::minutes(-1)))
			.await
			.expect("Seeding the vault should succeed.");

		let (_, observed) = vault.observe(&platform, &user).await.expect("Lookup should succeed.");
		// Issued before this caller queues, committed after its lookup.
		let committed = TokenBundle::builder(
			ScopeSet::new(["tweet.read", "offline.access"]).expect("Scopes should be valid."),
		)
		.access_token("AT-fresh")
		.refresh_token("RT2")
		.issued_at(OffsetDateTime::now_utc() - Duration::seconds(5))
		.expires_in(Duration::hours(1))
		.build()
		.expect("Committed bundle should build.");

		vault.store(&platform, &user, &committed).await.expect("Commit should succeed.");

		let mock = server
			.mock_async(|when, then| {
				when.method(POST).path("/token");
				then.status(200)
					.header("content-type", "application/json")
					.body("{\"access_token\":\"AT-extra\",\"expires_in\":3600}");
			})
			.await;
		let bundle = flows
			.refresh_observed("twitter", &user, observed)
			.await
			.expect("Overtaken refresh should reuse the committed bundle.");

		assert_eq!(bundle.access_token.expose(), "AT-fresh");
		assert_eq!(flows.refresh_metrics().coalesced(), 1);

		mock.assert_calls_async(0).await;

		let (_, observed) = vault.observe(&platform, &user).await.expect("Lookup should succeed.");
		let bundle = flows
			.refresh_observed("twitter", &user, observed)
			.await
			.expect("Current lookups should refresh.");

		assert_eq!(bundle.access_token.expose(), "AT-extra");
		assert_eq!(bundle.refresh_token.as_ref().map(|t| t.expose()), Some("RT2"));

		mock.assert_calls_async(1).await;
	}
}
