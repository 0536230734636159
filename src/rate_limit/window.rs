// crates.io
use tokio::time::Instant;
// self
use crate::{
	_prelude::*,
	provider::RateQuota,
	rate_limit::{DelayReason, RateLimitStatus},
};

/// Per-platform trailing window of admitted request instants.
#[derive(Debug)]
pub(crate) struct RateWindow {
	quota: RateQuota,
	hits: VecDeque<Instant>,
	cooldown_until: Option<Instant>,
}
impl RateWindow {
	pub(crate) fn new(quota: RateQuota) -> Self {
		Self { quota, hits: VecDeque::new(), cooldown_until: None }
	}

	/// Returns `None` when a request may proceed at `now`, else when and why to retry.
	pub(crate) fn blocked_until(&mut self, now: Instant) -> Option<(Instant, DelayReason)> {
		self.prune(now);

		if let Some(until) = self.cooldown_until {
			return Some((until, DelayReason::ServerCooldown));
		}
		if self.hits.len() < self.limit() {
			return None;
		}

		// Full window: the oldest hit frees the next slot.
		self.hits.front().map(|oldest| (*oldest + self.quota.window(), DelayReason::QuotaExhausted))
	}

	pub(crate) fn record(&mut self, now: Instant) {
		self.prune(now);
		self.hits.push_back(now);
	}

	pub(crate) fn install_cooldown(&mut self, until: Instant) {
		self.cooldown_until = Some(self.cooldown_until.map_or(until, |current| current.max(until)));
	}

	pub(crate) fn status(&mut self, now: Instant) -> RateLimitStatus {
		self.prune(now);

		let used = u32::try_from(self.hits.len()).unwrap_or(u32::MAX);

		RateLimitStatus {
			limit: self.quota.limit,
			used,
			remaining: self.quota.limit.saturating_sub(used),
			resets_in: self
				.hits
				.front()
				.map(|oldest| (*oldest + self.quota.window()).saturating_duration_since(now)),
			cooldown_remaining: self.cooldown_until.map(|until| until.saturating_duration_since(now)),
		}
	}

	fn limit(&self) -> usize {
		usize::try_from(self.quota.limit).unwrap_or(usize::MAX)
	}

	fn prune(&mut self, now: Instant) {
		let window = self.quota.window();

		while self.hits.front().is_some_and(|oldest| now.saturating_duration_since(*oldest) >= window)
		{
			self.hits.pop_front();
		}
		if self.cooldown_until.is_some_and(|until| until <= now) {
			self.cooldown_until = None;
		}
	}
}
