//! Contract between [`PlatformClient`](super::PlatformClient) and a platform's REST API.
//!
//! Payloads and response bodies are opaque JSON; an implementation only maps an
//! [`Operation`] onto an HTTP route and reports the raw status back for classification.

// crates.io
use oauth2::http::Method;
// self
use crate::{
	_prelude::*,
	auth::{PlatformId, TokenSecret},
	error::TransportError,
};
#[cfg(feature = "reqwest")] use crate::{error::ConfigError, http::parse_retry_after};

/// Boxed future returned by [`PlatformApi::call`].
pub type ApiFuture<'a> = Pin<Box<dyn Future<Output = Result<PlatformResponse, TransportError>> + 'a + Send>>;

/// Operation requested against a platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
	/// Publish content.
	Post,
	/// Read engagement numbers for a published post.
	GetAnalytics {
		/// Platform-side post identifier.
		post_id: String,
	},
	/// Edit a published post in place.
	UpdatePost {
		/// Platform-side post identifier.
		post_id: String,
	},
	/// Remove a published post.
	DeletePost {
		/// Platform-side post identifier.
		post_id: String,
	},
	/// Read the connected account's profile.
	Profile,
	/// Any other route.
	Custom {
		/// Label used in logs.
		name: String,
		/// HTTP method.
		method: Method,
		/// Path relative to the API base URL.
		path: String,
	},
}
impl Operation {
	/// Stable label used in logs.
	pub fn name(&self) -> &str {
		match self {
			Operation::Post => "post",
			Operation::GetAnalytics { .. } => "get_analytics",
			Operation::UpdatePost { .. } => "update_post",
			Operation::DeletePost { .. } => "delete_post",
			Operation::Profile => "profile",
			Operation::Custom { name, .. } => name,
		}
	}

	/// HTTP method and relative path segments of the default route table.
	pub fn route(&self) -> (Method, Vec<&str>) {
		match self {
			Operation::Post => (Method::POST, vec!["posts"]),
			Operation::GetAnalytics { post_id } =>
				(Method::GET, vec!["posts", post_id.as_str(), "analytics"]),
			Operation::UpdatePost { post_id } => (Method::PATCH, vec!["posts", post_id.as_str()]),
			Operation::DeletePost { post_id } => (Method::DELETE, vec!["posts", post_id.as_str()]),
			Operation::Profile => (Method::GET, vec!["me"]),
			Operation::Custom { method, path, .. } =>
				(method.clone(), path.split('/').filter(|s| !s.is_empty()).collect()),
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.name())
	}
}

/// One request handed to a [`PlatformApi`].
#[derive(Debug)]
pub struct ApiCall<'a> {
	/// Target platform.
	pub platform: &'a PlatformId,
	/// Requested operation.
	pub operation: &'a Operation,
	/// Opaque request payload; `Null` means no body.
	pub payload: &'a JsonValue,
	/// Bearer credential for the connected user.
	pub access_token: &'a TokenSecret,
}

/// Raw platform answer, prior to classification.
#[derive(Clone, Debug, PartialEq)]
pub struct PlatformResponse {
	/// HTTP status code.
	pub status: u16,
	/// Parsed JSON body, a JSON string for non-JSON bodies, or `Null` when empty.
	pub body: JsonValue,
	/// Retry-After hint.
	pub retry_after: Option<Duration>,
}
impl PlatformResponse {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Platform API integration used by [`PlatformClient`](super::PlatformClient).
pub trait PlatformApi
where
	Self: Send + Sync,
{
	/// Executes `call`; only transport failures are errors, every HTTP status is a response.
	fn call<'a>(&'a self, call: ApiCall<'a>) -> ApiFuture<'a>;
}

/// JSON-over-HTTPS [`PlatformApi`] using the default route table and bearer auth.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestPlatformApi {
	client: ReqwestClient,
	base_url: Url,
}
#[cfg(feature = "reqwest")]
impl ReqwestPlatformApi {
	/// Creates an API rooted at `base_url` with a default reqwest client.
	pub fn new(base_url: Url) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(ConfigError::from)?;

		Ok(Self::with_client(client, base_url))
	}

	/// Creates an API rooted at `base_url` using `client`.
	pub fn with_client(client: ReqwestClient, base_url: Url) -> Self {
		Self { client, base_url }
	}

	/// Base URL every route is appended to.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	fn endpoint(&self, segments: &[&str]) -> Url {
		let mut url = self.base_url.clone();

		if let Ok(mut path) = url.path_segments_mut() {
			path.pop_if_empty().extend(segments);
		}

		url
	}
}
#[cfg(feature = "reqwest")]
impl PlatformApi for ReqwestPlatformApi {
	fn call<'a>(&'a self, call: ApiCall<'a>) -> ApiFuture<'a> {
		Box::pin(async move {
			let (method, segments) = call.operation.route();
			let mut request = self
				.client
				.request(method, self.endpoint(&segments))
				.bearer_auth(call.access_token.expose());

			if !call.payload.is_null() {
				request = request.json(call.payload);
			}

			let response = request.send().await?;
			let status = response.status().as_u16();
			let retry_after = parse_retry_after(response.headers());
			let bytes = response.bytes().await?;
			let body = if bytes.is_empty() {
				JsonValue::Null
			} else {
				serde_json::from_slice(&bytes).unwrap_or_else(|_| {
					JsonValue::String(String::from_utf8_lossy(&bytes).into_owned())
				})
			};

			Ok(PlatformResponse { status, body, retry_after })
		})
	}
}
