//! Retry budget and jittered backoff for platform requests.
//!
//! Cooldown defaults live here as well so a single policy governs every wait the client makes.

// crates.io
use rand::Rng;
// self
use crate::_prelude::*;

/// Retry budget and backoff shape applied by [`PlatformClient`](super::PlatformClient).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
	/// Total attempts per request, the first one included.
	pub max_attempts: u32,
	/// Backoff before the second attempt; doubles per attempt.
	#[serde(with = "millis")]
	pub base_delay: StdDuration,
	/// Upper bound on a single backoff.
	#[serde(with = "millis")]
	pub max_delay: StdDuration,
	/// Cooldown installed for a 429 without `Retry-After`.
	#[serde(with = "millis")]
	pub default_cooldown: StdDuration,
	/// Longest server cooldown the client waits out before returning `RateLimited`.
	#[serde(with = "millis")]
	pub max_rate_limit_wait: StdDuration,
}
impl RetryPolicy {
	/// Default attempt budget.
	pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
	/// Default cooldown for a 429 without `Retry-After`.
	pub const DEFAULT_COOLDOWN: StdDuration = StdDuration::from_secs(60);

	/// Policy that never retries.
	pub fn no_retry() -> Self {
		Self { max_attempts: 1, ..Default::default() }
	}

	/// Returns `true` while `attempt` (1-based, already made) leaves budget for another.
	pub fn allows_retry(&self, attempt: u32) -> bool {
		attempt < self.max_attempts
	}

	/// Jittered exponential backoff after `attempt` (1-based) failed.
	///
	/// The delay is drawn from `[d/2, d]` where `d = min(base * 2^(attempt-1), max)`.
	pub fn backoff(&self, attempt: u32) -> StdDuration {
		let exponent = attempt.saturating_sub(1).min(16);
		let capped = self.base_delay.saturating_mul(1 << exponent).min(self.max_delay);
		let ceiling = u64::try_from(capped.as_millis()).unwrap_or(u64::MAX);

		if ceiling == 0 {
			return StdDuration::ZERO;
		}

		StdDuration::from_millis(rand::rng().random_range(ceiling / 2..=ceiling))
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
			base_delay: StdDuration::from_millis(500),
			max_delay: StdDuration::from_secs(10),
			default_cooldown: Self::DEFAULT_COOLDOWN,
			max_rate_limit_wait: StdDuration::from_secs(120),
		}
	}
}

mod millis {
	// crates.io
	use serde::{Deserialize, Deserializer, Serializer};
	// self
	use crate::_prelude::StdDuration;

	pub(super) fn serialize<S>(duration: &StdDuration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
	}

	pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<StdDuration, D::Error>
	where
		D: Deserializer<'de>,
	{
		u64::deserialize(deserializer).map(StdDuration::from_millis)
	}
}
