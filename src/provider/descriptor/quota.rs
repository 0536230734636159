// self
use crate::_prelude::*;

/// Trailing-window request quota (`limit` requests per `window_secs`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateQuota {
	/// Maximum number of requests admitted per window.
	pub limit: u32,
	/// Window length in seconds.
	pub window_secs: u64,
}
impl RateQuota {
	/// Quota applied to platforms that never declared one.
	pub const FALLBACK: Self = Self { limit: 100, window_secs: 3_600 };

	/// Creates a quota of `limit` requests per `window_secs`.
	pub const fn new(limit: u32, window_secs: u64) -> Self {
		Self { limit, window_secs }
	}

	/// Window length as a standard duration.
	pub fn window(&self) -> StdDuration {
		StdDuration::from_secs(self.window_secs)
	}

	/// Returns `true` when either component is zero.
	pub fn is_zero(&self) -> bool {
		self.limit == 0 || self.window_secs == 0
	}
}
impl Default for RateQuota {
	fn default() -> Self {
		Self::FALLBACK
	}
}
impl Display for RateQuota {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}/{}s", self.limit, self.window_secs)
	}
}
