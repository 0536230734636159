// crates.io
use tracing::{Instrument, Span, instrument::Instrumented};
// self
use crate::{_prelude::*, obs::FlowKind};

/// Span wrapper used by every broker flow.
#[derive(Clone, Debug)]
pub struct FlowSpan(Span);
impl FlowSpan {
	/// Creates a span tagged with the flow kind, call site and platform.
	pub fn new(kind: FlowKind, stage: &'static str, platform: &str) -> Self {
		Self(tracing::info_span!("platform_broker.flow", flow = kind.as_str(), stage, platform))
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.0.clone())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = FlowSpan::new(FlowKind::Refresh, "instrument_wraps_future", "twitter");

		assert_eq!(FlowSpan::instrument(&span, async { 42 }).await, 42);
	}
}
