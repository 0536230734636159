//! Shared per-platform rate limiter.
//!
//! Each platform owns one [`RateWindow`](window::RateWindow) behind its own lock; the map
//! lock is held only long enough to fetch the window handle, so callers targeting different
//! platforms never contend. Time comes from [`tokio::time::Instant`], which tests can pause
//! and advance.

mod window;

// crates.io
use tokio::time::{self, Instant};
// self
use crate::{
	_prelude::*,
	auth::PlatformId,
	provider::{PlatformRegistry, RateQuota},
	rate_limit::window::RateWindow,
};

/// Why a [`RateLimitDecision::Delay`] was issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayReason {
	/// The trailing window already holds `limit` requests.
	QuotaExhausted,
	/// A server-imposed cooldown (HTTP 429) is in effect.
	ServerCooldown,
}

/// Result emitted by [`RateLimiter::try_acquire`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
	/// The request may proceed immediately; the slot has been recorded.
	Allow,
	/// The request should be delayed.
	Delay(RetryDirective),
}

/// Advises callers when to retry after a [`RateLimitDecision::Delay`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDirective {
	/// Instant when it is safe to retry.
	pub earliest_retry_at: Instant,
	/// Suggested wait measured from the decision.
	pub recommended_backoff: StdDuration,
	/// What caused the delay.
	pub reason: DelayReason,
}

/// Point-in-time usage report for one platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
	/// Requests admitted per window.
	pub limit: u32,
	/// Requests currently inside the window.
	pub used: u32,
	/// Requests still admissible right now (ignoring cooldowns).
	pub remaining: u32,
	/// Time until the oldest in-window request ages out.
	pub resets_in: Option<StdDuration>,
	/// Time left on a server-imposed cooldown.
	pub cooldown_remaining: Option<StdDuration>,
}

/// Concurrency-safe quota enforcement shared by every platform caller.
#[derive(Debug)]
pub struct RateLimiter {
	quotas: HashMap<PlatformId, RateQuota>,
	fallback: RateQuota,
	windows: Mutex<HashMap<PlatformId, Arc<Mutex<RateWindow>>>>,
}
impl RateLimiter {
	/// Creates a limiter with explicit per-platform quotas.
	pub fn new<I>(quotas: I) -> Self
	where
		I: IntoIterator<Item = (PlatformId, RateQuota)>,
	{
		Self {
			quotas: quotas.into_iter().collect(),
			fallback: RateQuota::FALLBACK,
			windows: Mutex::new(HashMap::new()),
		}
	}

	/// Creates a limiter using the quota declared by every registered descriptor.
	pub fn from_registry(registry: &PlatformRegistry) -> Self {
		Self::new(registry.quotas().map(|(id, quota)| (id.clone(), quota)))
	}

	/// Overrides the quota applied to platforms without an explicit entry.
	pub fn with_fallback(mut self, quota: RateQuota) -> Self {
		self.fallback = quota;

		self
	}

	/// Quota enforced for `platform`.
	pub fn quota(&self, platform: &PlatformId) -> RateQuota {
		self.quotas.get(platform).copied().unwrap_or(self.fallback)
	}

	/// Reports whether a request would be admitted now, without recording it.
	pub fn check(&self, platform: &PlatformId) -> bool {
		self.window(platform).lock().blocked_until(Instant::now()).is_none()
	}

	/// Records a request against the platform's window.
	pub fn record(&self, platform: &PlatformId) {
		self.window(platform).lock().record(Instant::now());
	}

	/// Atomically checks and, when admitted, records a request.
	pub fn try_acquire(&self, platform: &PlatformId) -> RateLimitDecision {
		let window = self.window(platform);
		let mut window = window.lock();
		let now = Instant::now();

		match window.blocked_until(now) {
			None => {
				window.record(now);

				RateLimitDecision::Allow
			},
			Some((earliest_retry_at, reason)) => RateLimitDecision::Delay(RetryDirective {
				earliest_retry_at,
				recommended_backoff: earliest_retry_at.saturating_duration_since(now),
				reason,
			}),
		}
	}

	/// Suspends until a slot is free and reserves it for the caller.
	///
	/// Returns the total time spent waiting.
	pub async fn wait_until_allowed(&self, platform: &PlatformId) -> StdDuration {
		let started = Instant::now();

		loop {
			match self.try_acquire(platform) {
				RateLimitDecision::Allow => return started.elapsed(),
				RateLimitDecision::Delay(directive) => {
					tracing::debug!(
						%platform,
						reason = ?directive.reason,
						wait_ms = directive.recommended_backoff.as_millis() as u64,
						"Rate limit reached; waiting for the next slot."
					);

					time::sleep_until(directive.earliest_retry_at).await;
				},
			}
		}
	}

	/// Installs a server-imposed cooldown; the later of two deadlines wins.
	pub fn install_cooldown(&self, platform: &PlatformId, retry_after: StdDuration) {
		let until = Instant::now() + retry_after;

		self.window(platform).lock().install_cooldown(until);

		tracing::info!(%platform, retry_after_secs = retry_after.as_secs(), "Installed rate limit cooldown.");
	}

	/// Usage report for `platform`.
	pub fn status(&self, platform: &PlatformId) -> RateLimitStatus {
		self.window(platform).lock().status(Instant::now())
	}

	fn window(&self, platform: &PlatformId) -> Arc<Mutex<RateWindow>> {
		let mut windows = self.windows.lock();

		windows
			.entry(platform.clone())
			.or_insert_with(|| Arc::new(Mutex::new(RateWindow::new(self.quota(platform)))))
			.clone()
	}
}
