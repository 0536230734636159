//! HTTP transport seam for token endpoint traffic.
//!
//! Flows never talk to reqwest directly. They ask a [`TokenHttpClient`] for an
//! [`AsyncHttpClient`] handle bound to a fresh [`ResponseMetadataSlot`], hand that handle to
//! the `oauth2` crate (or call it directly for revocation), and read the slot afterwards so
//! error classification sees the HTTP status and any `Retry-After` hint.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{HeaderMap, header::RETRY_AFTER},
};
use time::format_description::well_known::Rfc2822;
// self
use crate::_prelude::*;

/// Deadline applied by [`ReqwestHttpClient::new`] to every token endpoint request.
pub const DEFAULT_HTTP_TIMEOUT: StdDuration = StdDuration::from_secs(30);

/// Transport able to execute token, refresh and revocation requests.
///
/// Implementations are shared behind `Arc` across every flow, so they must be
/// `Send + Sync + 'static`, and the futures their handles return must be `Send`.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to one [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds a handle that records response metadata in `slot`.
	///
	/// Handles clear the slot before sending and store the status plus `Retry-After` once a
	/// response (successful or not) arrives.
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Metadata captured from the most recent token endpoint response.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code, if a response arrived.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Shared slot the transport writes and the error mapper reads.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns and clears the captured metadata.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// reqwest-backed [`TokenHttpClient`].
///
/// Token endpoints answer directly, so the client built by [`new`](Self::new) never follows
/// redirects. Clients passed to [`with_client`](Self::with_client) should be configured the
/// same way.
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Builds a client with [`DEFAULT_HTTP_TIMEOUT`] and redirects disabled.
	pub fn new() -> Result<Self, crate::error::ConfigError> {
		let client = ReqwestClient::builder()
			.timeout(DEFAULT_HTTP_TIMEOUT)
			.redirect(reqwest::redirect::Policy::none())
			.build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl TokenHttpClient for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		InstrumentedHandle(Arc::new((self.0.clone(), slot)))
	}
}

/// Handle returned by [`ReqwestHttpClient::with_metadata`].
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<(ReqwestClient, ResponseMetadataSlot)>);
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let inner = Arc::clone(&self.0);

		Box::pin(async move {
			let (client, slot) = &*inner;

			slot.take();

			let response =
				client.execute(request.try_into().map_err(Box::new)?).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();

			slot.store(ResponseMetadata {
				status: Some(status.as_u16()),
				retry_after: parse_retry_after(&headers),
			});

			let mut converted =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

/// Reads `Retry-After` as delta-seconds or an HTTP date in the future.
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(secs.into()));
	}

	let delta = OffsetDateTime::parse(raw, &Rfc2822).ok()? - OffsetDateTime::now_utc();

	delta.is_positive().then_some(delta)
}
