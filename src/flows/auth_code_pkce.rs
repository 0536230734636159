//! Authorization Code + PKCE flow.
//!
//! [`FlowManager::initiate`] mints a single-use state (and a PKCE pair when the platform
//! requires one), parks it in the [`PendingStore`](super::PendingStore), and returns the
//! authorize URL. [`FlowManager::handle_callback`] consumes that state before any network
//! call, exchanges the code, and persists the bundle in the vault.

mod session;

pub use session::{AuthorizationSession, PkceCodeChallengeMethod};

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenBundle, TokenSecret, UserId},
	flows::{FlowManager, PendingAuthorization, common},
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::StoreKey,
};

impl<C, M> FlowManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Starts an authorization attempt for `user` on `platform`.
	///
	/// An empty `scope` falls back to the platform's default scopes.
	pub async fn initiate(
		&self,
		platform: &str,
		user: &UserId,
		redirect_uri: Url,
		scope: ScopeSet,
	) -> Result<AuthorizationSession> {
		const KIND: FlowKind = FlowKind::AuthorizationCode;

		let span = FlowSpan::new(KIND, "initiate", platform);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let entry = self.registry.entry(platform)?;
				let descriptor = &entry.descriptor;
				let credentials = entry.require_credentials()?;
				let scope = if scope.is_empty() { descriptor.default_scopes.clone() } else { scope };
				let state = session::generate_state();
				let pkce = descriptor.pkce_required().then(session::PkcePair::generate);
				let authorize_url = session::build_authorize_url(
					descriptor,
					&credentials.client_id,
					&redirect_uri,
					&scope,
					&state,
					pkce.as_ref(),
				);
				let created_at = OffsetDateTime::now_utc();
				let expires_at = created_at + self.settings.pending_ttl;

				self.pending
					.insert(PendingAuthorization {
						state: state.clone(),
						platform: descriptor.id.clone(),
						user: user.clone(),
						redirect_uri,
						scope: scope.clone(),
						code_verifier: pkce.as_ref().map(|pair| TokenSecret::new(&pair.verifier)),
						created_at,
						expires_at,
					})
					.await?;

				tracing::debug!(%user, pkce = pkce.is_some(), "Authorization initiated.");

				Ok(AuthorizationSession {
					platform: descriptor.id.clone(),
					user: user.clone(),
					authorize_url,
					state,
					scope,
					expires_at,
					code_challenge: pkce.map(|pair| pair.challenge),
				})
			})
			.await;

		obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

		result
	}

	/// Completes an authorization attempt from the provider redirect.
	///
	/// `error` is the provider's `error` query parameter; when present the attempt is
	/// reported as denied and the pending entry is left to expire.
	pub async fn handle_callback(
		&self,
		platform: &str,
		code: &str,
		state: &str,
		error: Option<&str>,
	) -> Result<TokenBundle> {
		const KIND: FlowKind = FlowKind::AuthorizationCode;

		let span = FlowSpan::new(KIND, "handle_callback", platform);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				if let Some(reason) = error {
					return Err(Error::AuthorizationDenied { reason: reason.to_owned() });
				}

				let entry = self.registry.entry(platform)?;
				let pending = self.pending.take(state).await?.ok_or(Error::InvalidState)?;

				if pending.platform != entry.descriptor.id {
					return Err(Error::InvalidState);
				}
				if pending.is_expired_at(OffsetDateTime::now_utc()) {
					return Err(Error::ExpiredState);
				}

				let facade = common::facade_for(self, entry)?;
				let verifier = pending.code_verifier.as_ref().map(TokenSecret::expose);
				let exchanged = common::with_timeout(
					self.settings.token_timeout,
					facade.exchange_authorization_code(
						entry.strategy.as_ref(),
						code,
						verifier,
						&pending.scope,
						&pending.redirect_uri,
					),
				)
				.await;
				let bundle = match exchanged {
					Ok(bundle) => bundle,
					Err(Error::ExchangeFailed { reason }) => {
						let secret = entry
							.credentials
							.as_ref()
							.and_then(|c| c.client_secret.as_ref())
							.map_or("", TokenSecret::expose);
						let reason = common::redact(&reason, &[code, verifier.unwrap_or(""), secret]);

						tracing::warn!(user = %pending.user, %reason, "Authorization code exchange failed.");

						return Err(Error::ExchangeFailed { reason });
					},
					Err(e) => return Err(e),
				};

				let key = StoreKey::new(&pending.platform, &pending.user);
				let guard = common::flow_guard(self, &key);

				{
					let _exclusive = guard.lock().await;

					self.vault.store(&pending.platform, &pending.user, &bundle).await?;
				}

				tracing::info!(user = %pending.user, expires_at = %bundle.expires_at, "Authorization completed.");

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
	use crate::{_preludet::*, vault::TokenState};

	#[tokio::test]
	async fn callback_writes_wait_for_in_flight_revocations() {
		let server = MockServer::start_async().await;
		let descriptor = mock_platform_descriptor("twitter", |path| server.url(path));
		let (flows, vault, store) = build_reqwest_test_flows(descriptor, "client-guard", "secret");
		let user = UserId::new("user-guard").expect("User identifier should be valid.");
		let redirect = Url::parse("https://app.example.com/callback").expect("Redirect should parse.");
		let session = flows
			.initiate("twitter", &user, redirect, ScopeSet::default())
			.await
			.expect("Authorization should initiate.");

		server
			.mock_async(|when, then| {
				when.method(POST).path("/token");
				then.status(200)
					.header("content-type", "application/json")
					.body("{\"access_token\":\"AT1\",\"expires_in\":3600}");
			})
			.await;

		let key = StoreKey::new(&session.platform, &user);
		let guard = common::flow_guard(&*flows, &key);
		let held = guard.lock().await;
		let callback = tokio::spawn({
			let flows = flows.clone();
			let state = session.state.clone();

			async move { flows.handle_callback("twitter", "code", &state, None).await }
		});

		tokio::time::sleep(StdDuration::from_millis(300)).await;

		assert!(!callback.is_finished());
		assert_eq!(
			vault.state(&session.platform, &user).await.expect("State should be readable."),
			TokenState::NotFound
		);

		vault.delete(&session.platform, &user).await.expect("Delete should succeed.");
		drop(held);

		callback
			.await
			.expect("Callback task should not panic.")
			.expect("Callback should complete once the guard is released.");

		assert_eq!(store.len(), 1);
		assert_eq!(
			vault.state(&session.platform, &user).await.expect("State should be readable."),
			TokenState::Valid
		);
	}
}
