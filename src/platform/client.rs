//! Quota-aware, refresh-aware dispatch to platform APIs.

// crates.io
use tokio::time;
// self
use crate::{
	_prelude::*,
	auth::{PlatformId, TokenSecret, UserId},
	error::ConfigError,
	flows::FlowManager,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	platform::{ApiCall, Operation, PlatformApi, PlatformResponse, RetryPolicy},
	rate_limit::{RateLimitStatus, RateLimiter},
	vault::{TokenLookup, TokenState},
};

const BODY_PREVIEW_CHARS: usize = 256;

/// Connection health for one (platform, user) pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
	/// Platform queried.
	pub platform: PlatformId,
	/// User queried.
	pub user: UserId,
	/// Classification of the stored credentials.
	pub token_state: TokenState,
	/// Current quota usage for the platform.
	pub rate_limit: RateLimitStatus,
}
impl ConnectionStatus {
	/// Returns `true` when a request could use the stored credentials without re-authorizing.
	pub fn is_connected(&self) -> bool {
		matches!(self.token_state, TokenState::Valid | TokenState::NearExpiry)
	}
}

/// Dispatches operations to registered [`PlatformApi`]s.
///
/// Every request waits for a rate-limit slot, obtains a usable access token (refreshing
/// through the [`FlowManager`] when needed), then classifies the platform's answer and
/// retries according to the [`RetryPolicy`].
pub struct PlatformClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	flows: Arc<FlowManager<C, M>>,
	limiter: Arc<RateLimiter>,
	apis: HashMap<PlatformId, Arc<dyn PlatformApi>>,
	retry: RetryPolicy,
	request_timeout: StdDuration,
}
impl<C, M> PlatformClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Default deadline applied to each platform call.
	pub const DEFAULT_REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(30);

	/// Creates a client without any platform API registered.
	pub fn new(flows: Arc<FlowManager<C, M>>, limiter: Arc<RateLimiter>) -> Self {
		Self {
			flows,
			limiter,
			apis: HashMap::new(),
			retry: RetryPolicy::default(),
			request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
		}
	}

	/// Registers the API used for `platform`, replacing any previous one.
	pub fn with_api(mut self, platform: PlatformId, api: Arc<dyn PlatformApi>) -> Self {
		self.apis.insert(platform, api);

		self
	}

	/// Replaces the retry policy.
	pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Replaces the per-call deadline.
	pub fn with_request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Flow manager used for refreshes and disconnects.
	pub fn flows(&self) -> &Arc<FlowManager<C, M>> {
		&self.flows
	}

	/// Shared rate limiter.
	pub fn limiter(&self) -> &Arc<RateLimiter> {
		&self.limiter
	}

	/// Executes `operation` for `user` on `platform`.
	pub async fn request(
		&self,
		platform: &str,
		user: &UserId,
		operation: Operation,
		payload: JsonValue,
	) -> Result<PlatformResponse, PlatformError> {
		const KIND: FlowKind = FlowKind::PlatformRequest;

		let span = FlowSpan::new(KIND, "request", platform);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let (result, attempts) =
			span.instrument(self.dispatch(platform, user, &operation, &payload)).await;

		match &result {
			Ok(response) => tracing::info!(
				platform,
				operation = %operation,
				outcome = "success",
				status = response.status,
				attempts,
				"Platform request completed."
			),
			Err(e) => tracing::warn!(
				platform,
				operation = %operation,
				outcome = e.kind(),
				attempts,
				error = %e,
				"Platform request failed."
			),
		}

		obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

		result
	}

	/// Publishes `content`.
	pub async fn post(
		&self,
		platform: &str,
		user: &UserId,
		content: JsonValue,
	) -> Result<PlatformResponse, PlatformError> {
		self.request(platform, user, Operation::Post, content).await
	}

	/// Reads analytics for `post_id`.
	pub async fn get_analytics(
		&self,
		platform: &str,
		user: &UserId,
		post_id: &str,
	) -> Result<PlatformResponse, PlatformError> {
		let operation = Operation::GetAnalytics { post_id: post_id.to_owned() };

		self.request(platform, user, operation, JsonValue::Null).await
	}

	/// Replaces the content of the published `post_id`.
	pub async fn update_post(
		&self,
		platform: &str,
		user: &UserId,
		post_id: &str,
		content: JsonValue,
	) -> Result<PlatformResponse, PlatformError> {
		let operation = Operation::UpdatePost { post_id: post_id.to_owned() };

		self.request(platform, user, operation, content).await
	}

	/// Deletes `post_id`.
	pub async fn delete_post(
		&self,
		platform: &str,
		user: &UserId,
		post_id: &str,
	) -> Result<PlatformResponse, PlatformError> {
		let operation = Operation::DeletePost { post_id: post_id.to_owned() };

		self.request(platform, user, operation, JsonValue::Null).await
	}

	/// Reads the connected account's profile.
	pub async fn profile(
		&self,
		platform: &str,
		user: &UserId,
	) -> Result<PlatformResponse, PlatformError> {
		self.request(platform, user, Operation::Profile, JsonValue::Null).await
	}

	/// Revokes and forgets the user's credentials for `platform`.
	pub async fn disconnect(&self, platform: &str, user: &UserId) -> Result<bool, PlatformError> {
		Ok(self.flows.revoke(platform, user).await?)
	}

	/// Reports token state and quota usage without exposing credentials.
	pub async fn connection_status(
		&self,
		platform: &str,
		user: &UserId,
	) -> Result<ConnectionStatus, PlatformError> {
		let id = self.platform_id(platform)?;
		let token_state = self.flows.vault().state(&id, user).await?;
		let rate_limit = self.limiter.status(&id);

		Ok(ConnectionStatus { platform: id, user: user.clone(), token_state, rate_limit })
	}

	async fn dispatch(
		&self,
		platform: &str,
		user: &UserId,
		operation: &Operation,
		payload: &JsonValue,
	) -> (Result<PlatformResponse, PlatformError>, u32) {
		let mut calls = 0;
		let result: Result<PlatformResponse, PlatformError> = async {
			let id = self.platform_id(platform)?;
			let api = self.apis.get(&id).cloned().ok_or_else(|| {
				Error::from(ConfigError::MissingPlatformApi { platform: id.to_string() })
			})?;
			let mut attempt = 0;
			let mut forced: Option<TokenSecret> = None;
			let mut reauthorized = false;

			loop {
				self.limiter.wait_until_allowed(&id).await;

				let access_token = match forced.take() {
					Some(token) => token,
					None => self.usable_token(platform, &id, user).await?,
				};
				let call = ApiCall { platform: &id, operation, payload, access_token: &access_token };

				attempt += 1;
				calls += 1;

				let response = match time::timeout(self.request_timeout, api.call(call)).await {
					Err(_) =>
						return Err(PlatformError::OperationTimeout { timeout: self.request_timeout }),
					Ok(Err(e)) => {
						if self.retry.allows_retry(attempt) {
							self.back_off(attempt).await;

							continue;
						}

						return Err(PlatformError::TransientServer { status: None, message: e.to_string() });
					},
					Ok(Ok(response)) => response,
				};

				match response.status {
					200..=299 => return Ok(response),
					429 => {
						let cooldown = response
							.retry_after
							.and_then(|d| StdDuration::try_from(d).ok())
							.unwrap_or(self.retry.default_cooldown);

						self.limiter.install_cooldown(&id, cooldown);

						if self.retry.allows_retry(attempt) && cooldown <= self.retry.max_rate_limit_wait {
							continue;
						}

						return Err(PlatformError::RateLimited {
							retry_after: Duration::try_from(cooldown).ok(),
						});
					},
					401 if !reauthorized => {
						reauthorized = true;
						// The rejected call does not spend retry budget.
						attempt -= 1;
						forced = Some(self.flows.refresh(platform, user).await?.access_token);
					},
					401 => {
						return Err(PlatformError::AuthExpired {
							reason: "platform rejected freshly refreshed credentials".into(),
						});
					},
					status @ 500.. => {
						if self.retry.allows_retry(attempt) {
							self.back_off(attempt).await;

							continue;
						}

						return Err(PlatformError::TransientServer {
							status: Some(status),
							message: body_preview(&response.body),
						});
					},
					status =>
						return Err(PlatformError::Validation {
							status,
							message: body_preview(&response.body),
						}),
				}
			}
		}
		.await;

		(result, calls)
	}

	async fn usable_token(
		&self,
		platform: &str,
		id: &PlatformId,
		user: &UserId,
	) -> Result<TokenSecret, PlatformError> {
		let (lookup, observed) = self.flows.vault().observe(id, user).await?;

		match lookup {
			TokenLookup::Valid(bundle) => Ok(bundle.access_token),
			TokenLookup::NearExpiry(bundle) =>
				match self.flows.refresh_observed(platform, user, observed).await {
					Ok(refreshed) => Ok(refreshed.access_token),
					Err(
						e @ (Error::NotRefreshable { .. } | Error::Transient(_) | Error::Transport(_)),
					) => {
						tracing::debug!(%user, error = %e, "Using near-expiry credentials.");

						Ok(bundle.access_token)
					},
					Err(e) => Err(e.into()),
				},
			TokenLookup::Expired | TokenLookup::NotFound =>
				Ok(self.flows.refresh_observed(platform, user, observed).await?.access_token),
		}
	}

	async fn back_off(&self, attempt: u32) {
		let delay = self.retry.backoff(attempt);

		tracing::debug!(attempt, ?delay, "Retrying platform request.");

		time::sleep(delay).await;
	}

	fn platform_id(&self, platform: &str) -> Result<PlatformId, PlatformError> {
		Ok(self.flows.registry().descriptor(platform).map_err(Error::from)?.id.clone())
	}
}
impl<C, M> Debug for PlatformClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PlatformClient")
			.field("flows", &self.flows)
			.field("limiter", &self.limiter)
			.field("apis", &self.apis.keys().collect::<Vec<_>>())
			.field("retry", &self.retry)
			.field("request_timeout", &self.request_timeout)
			.finish()
	}
}

fn body_preview(body: &JsonValue) -> String {
	let text = match body {
		JsonValue::Null => return "empty response body".into(),
		JsonValue::String(text) => text.clone(),
		other => other.to_string(),
	};

	text.chars().take(BODY_PREVIEW_CHARS).collect()
}
