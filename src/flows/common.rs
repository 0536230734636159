//! Shared helpers for flow implementations (guards, deadlines, redaction, facades).

// self
use crate::{
	_prelude::*,
	error::TransientError,
	flows::FlowManager,
	http::TokenHttpClient,
	oauth::{BasicFacade, TransportErrorMapper},
	provider::PlatformEntry,
	store::StoreKey,
};

const REDACTED: &str = "[REDACTED]";

/// Returns (and creates on demand) the single-flight guard for a store key.
pub(crate) fn flow_guard<C, M>(manager: &FlowManager<C, M>, key: &StoreKey) -> Arc<AsyncMutex<()>>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let mut guards = manager.flow_guards.lock();

	guards.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
}

/// Builds the token facade for a registered platform.
pub(crate) fn facade_for<C, M>(
	manager: &FlowManager<C, M>,
	entry: &PlatformEntry,
) -> Result<BasicFacade<C, M>>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let credentials = entry.require_credentials()?;

	BasicFacade::from_descriptor(
		&entry.descriptor,
		credentials,
		manager.http_client.clone(),
		manager.transport_mapper.clone(),
	)
}

/// Bounds a token endpoint operation; elapsing yields [`TransientError::Timeout`].
pub(crate) async fn with_timeout<T, F>(timeout: StdDuration, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	match tokio::time::timeout(timeout, fut).await {
		Ok(result) => result,
		Err(_) => Err(TransientError::Timeout { timeout }.into()),
	}
}

/// Replaces every non-empty secret occurrence in `text`.
pub fn redact(text: &str, secrets: &[&str]) -> String {
	secrets
		.iter()
		.filter(|secret| !secret.is_empty())
		.fold(text.to_owned(), |acc, secret| acc.replace(secret, REDACTED))
}
