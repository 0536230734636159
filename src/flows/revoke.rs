//! Credential revocation and pending-state housekeeping.

// crates.io
use tokio::{task::JoinHandle, time};
// self
use crate::{
	_prelude::*,
	auth::UserId,
	flows::{FlowManager, common},
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
	/// Revokes the stored access token at the provider, then deletes it locally.
	///
	/// The provider call is best effort: failures are logged and never prevent the local
	/// deletion. Returns whether a stored bundle existed.
	pub async fn revoke(&self, platform: &str, user: &UserId) -> Result<bool> {
		const KIND: FlowKind = FlowKind::Revoke;

		let span = FlowSpan::new(KIND, "revoke", platform);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let entry = self.registry.entry(platform)?;
				let descriptor = &entry.descriptor;
				let key = StoreKey::new(&descriptor.id, user);
				let guard = common::flow_guard(self, &key);
				let _singleflight = guard.lock().await;

				if let Some(endpoint) = descriptor.endpoints.revocation.as_ref() {
					let revoked = async {
						let Some(bundle) = self.vault.load(&key).await? else {
							return Ok(None);
						};
						let facade = common::facade_for(self, entry)?;

						common::with_timeout(
							self.settings.token_timeout,
							facade.revoke(entry.strategy.as_ref(), endpoint, &bundle.access_token),
						)
						.await
						.map(Some)
					}
					.await;

					match revoked {
						Ok(Some(status)) => tracing::debug!(%user, status, "Provider revoked the token."),
						Ok(None) => (),
						Err(e) => tracing::warn!(%user, error = %e, "Token revocation failed."),
					}
				}

				let existed = self.vault.delete(&descriptor.id, user).await?;

				tracing::info!(%user, existed, "Disconnected credentials.");

				Ok(existed)
			})
			.await;

		obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

		result
	}

	/// Removes expired pending authorizations, returning how many were dropped.
	pub async fn sweep_pending(&self) -> Result<usize> {
		let removed = self.pending.sweep(OffsetDateTime::now_utc()).await?;

		if removed > 0 {
			tracing::debug!(removed, "Swept expired pending authorizations.");
		}

		Ok(removed)
	}

	/// Runs [`sweep_pending`](Self::sweep_pending) every `interval` on the tokio runtime.
	///
	/// The task stops on its own once the last strong reference to the manager is dropped.
	pub fn spawn_pending_sweeper(self: &Arc<Self>, interval: StdDuration) -> JoinHandle<()> {
		let manager = Arc::downgrade(self);

		tokio::spawn(async move {
			let mut ticker = time::interval(interval);

			ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

			loop {
				ticker.tick().await;

				let Some(manager) = manager.upgrade() else {
					break;
				};

				if let Err(e) = manager.sweep_pending().await {
					tracing::warn!(error = %e, "Pending authorization sweep failed.");
				}
			}
		})
	}
}
