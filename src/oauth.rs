//! Token endpoint facade built on the `oauth2` crate.
//!
//! [`BasicFacade`] performs the three outbound token operations a flow needs (authorization
//! code exchange, refresh, revocation) and converts every failure into the broker taxonomy
//! through the platform's [`PlatformStrategy`] and a [`TransportErrorMapper`].

pub mod response;

pub use oauth2;
pub use response::*;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, EndpointNotSet,
	EndpointSet, HttpClientError, HttpRequest, PkceCodeVerifier, RedirectUrl, RefreshToken,
	RequestTokenError, StandardRevocableToken, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRequestTokenError, BasicRevocationErrorResponse,
		BasicTokenIntrospectionResponse, BasicTokenType,
	},
	http::{
		Method, Request,
		header::{ACCEPT, CONTENT_TYPE},
	},
};
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::{DEFAULT_TOKEN_TYPE, ScopeSet, TokenBundle, TokenSecret},
	error::{ConfigError, TransientError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	provider::{
		ClientAuthMethod, ClientCredentials, GrantType, PlatformDescriptor, PlatformStrategy,
		TokenErrorContext, TokenErrorKind,
	},
};

type ConfiguredClient = Client<
	BasicErrorResponse,
	PlatformTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Maps HTTP transport failures into broker [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a broker error.
	fn map_transport_error(
		&self,
		strategy: &dyn PlatformStrategy,
		grant: GrantType,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		strategy: &dyn PlatformStrategy,
		grant: GrantType,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(strategy, grant, meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => map_generic_transport_error(meta, message),
			_ => map_generic_transport_error(meta, "unrecognized transport failure"),
		}
	}
}

/// Per-platform `oauth2` client paired with the broker's transport.
pub(crate) struct BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredClient,
	client_id: String,
	scope_delimiter: char,
	default_lifetime: Duration,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn from_descriptor(
		descriptor: &PlatformDescriptor,
		credentials: &ClientCredentials,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Result<Self> {
		let auth_url = AuthUrl::new(descriptor.endpoints.authorization.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let token_url = TokenUrl::new(descriptor.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let mut oauth_client: ConfiguredClient =
			Client::new(ClientId::new(credentials.client_id.clone()))
				.set_auth_uri(auth_url)
				.set_token_uri(token_url);

		match (descriptor.preferred_client_auth_method, &credentials.client_secret) {
			(ClientAuthMethod::NoneWithPkce, _) => (),
			(method, Some(secret)) => {
				oauth_client =
					oauth_client.set_client_secret(ClientSecret::new(secret.expose().to_owned()));

				if matches!(method, ClientAuthMethod::ClientSecretPost) {
					oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
				}
			},
			(_, None) => return Err(ConfigError::missing_credentials(&descriptor.id).into()),
		}

		Ok(Self {
			oauth_client,
			client_id: credentials.client_id.clone(),
			scope_delimiter: descriptor.quirks.scope_delimiter,
			default_lifetime: descriptor.default_token_lifetime(),
			http_client,
			error_mapper,
		})
	}

	/// Exchanges an authorization code for a bundle.
	pub(crate) fn exchange_authorization_code<'a>(
		&'a self,
		strategy: &'a dyn PlatformStrategy,
		code: &'a str,
		pkce_verifier: Option<&'a str>,
		requested_scope: &'a ScopeSet,
		redirect_uri: &'a Url,
	) -> FacadeFuture<'a, TokenBundle> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let redirect_url = RedirectUrl::new(redirect_uri.to_string())
				.map_err(|source| ConfigError::InvalidRedirect { source })?;
			let mut request = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.set_redirect_uri(Cow::Owned(redirect_url));

			if let Some(verifier) = pkce_verifier {
				request = request.set_pkce_verifier(PkceCodeVerifier::new(verifier.to_owned()));
			}

			let response = request.request_async(&instrumented).await.map_err(|err| {
				map_request_error(
					strategy,
					GrantType::AuthorizationCode,
					meta.take(),
					err,
					self.error_mapper.as_ref(),
				)
			})?;

			self.bundle_from_response(&response, requested_scope, None)
		})
	}

	/// Redeems `refresh_token`; the old one is kept when the provider omits a replacement.
	pub(crate) fn refresh_token<'a>(
		&'a self,
		strategy: &'a dyn PlatformStrategy,
		refresh_token: &'a TokenSecret,
		requested_scope: &'a ScopeSet,
	) -> FacadeFuture<'a, TokenBundle> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let refresh_secret = RefreshToken::new(refresh_token.expose().to_owned());
			let request = self.oauth_client.exchange_refresh_token(&refresh_secret);
			let response = request.request_async(&instrumented).await.map_err(|err| {
				map_request_error(
					strategy,
					GrantType::RefreshToken,
					meta.take(),
					err,
					self.error_mapper.as_ref(),
				)
			})?;

			self.bundle_from_response(&response, requested_scope, Some(refresh_token.clone()))
		})
	}

	/// Posts `token` to the revocation endpoint as an access-token hint.
	///
	/// Returns the HTTP status on any 2xx; other statuses become transient errors.
	pub(crate) fn revoke<'a>(
		&'a self,
		strategy: &'a dyn PlatformStrategy,
		endpoint: &'a Url,
		token: &'a TokenSecret,
	) -> FacadeFuture<'a, u16> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let body = form_urlencoded::Serializer::new(String::new())
				.append_pair("token", token.expose())
				.append_pair("token_type_hint", "access_token")
				.append_pair("client_id", &self.client_id)
				.finish();
			let request: HttpRequest = Request::builder()
				.method(Method::POST)
				.uri(endpoint.as_str())
				.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
				.header(ACCEPT, "application/json")
				.body(body.into_bytes())
				.map_err(ConfigError::from)?;
			let instrumented = self.http_client.with_metadata(meta.clone());
			let response = oauth2::AsyncHttpClient::call(&instrumented, request).await.map_err(
				|err| {
					self.error_mapper.map_transport_error(
						strategy,
						GrantType::RefreshToken,
						meta.take().as_ref(),
						err,
					)
				},
			)?;
			let status = response.status();

			if status.is_success() {
				return Ok(status.as_u16());
			}

			let retry_after = meta.take().and_then(|value| value.retry_after);

			Err(TransientError::TokenEndpoint {
				message: format!("Revocation endpoint returned HTTP {}", status.as_u16()),
				status: Some(status.as_u16()),
				retry_after,
			}
			.into())
		})
	}

	fn bundle_from_response(
		&self,
		response: &PlatformTokenResponse,
		requested_scope: &ScopeSet,
		previous_refresh: Option<TokenSecret>,
	) -> Result<TokenBundle> {
		let lifetime = match response.expires_in() {
			Some(expires_in) => {
				let secs = i64::try_from(expires_in.as_secs())
					.map_err(|_| ConfigError::ExpiresInOutOfRange)?;

				if secs <= 0 {
					return Err(ConfigError::NonPositiveExpiresIn.into());
				}

				Duration::seconds(secs)
			},
			None => self.default_lifetime,
		};
		let scope = match response.scopes() {
			Some(granted) => {
				let joined = granted.iter().map(|scope| scope.as_str()).collect::<Vec<_>>().join(" ");

				ScopeSet::parse_delimited(&joined, self.scope_delimiter)
					.map_err(ConfigError::from)?
			},
			None => requested_scope.clone(),
		};
		let refresh = response
			.refresh_token()
			.map(|token| TokenSecret::new(token.secret().to_owned()))
			.or(previous_refresh);

		TokenBundle::builder(scope)
			.access_token(response.access_token().secret().to_owned())
			.refresh_secret(refresh)
			.token_type(match response.token_type() {
				BasicTokenType::Bearer => DEFAULT_TOKEN_TYPE,
				other => other.as_ref(),
			})
			.issued_at(OffsetDateTime::now_utc())
			.expires_in(lifetime)
			.build()
			.map_err(|e| ConfigError::from(e).into())
	}
}

fn map_request_error<E, M>(
	strategy: &dyn PlatformStrategy,
	grant: GrantType,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(strategy, grant, response, meta_ref),
		RequestTokenError::Request(error) =>
			mapper.map_transport_error(strategy, grant, meta_ref, error),
		RequestTokenError::Parse(error, body) => {
			// Non-JSON error pages still carry a status and body worth classifying.
			let mut ctx = TokenErrorContext::new(grant)
				.with_body_preview(String::from_utf8_lossy(&body).into_owned());

			if let Some(status) = meta_status(meta_ref) {
				ctx = ctx.with_http_status(status);
			}

			match strategy.classify_token_error(&ctx) {
				TokenErrorKind::Transient => TransientError::TokenResponseParse {
					source: error,
					status: meta_status(meta_ref),
				}
				.into(),
				_ => fatal_for_grant(
					grant,
					format!(
						"token endpoint rejected the request with HTTP {}",
						meta_status(meta_ref).map_or_else(|| "error".into(), |s| s.to_string())
					),
				),
			}
		},
		RequestTokenError::Other(message) => TransientError::TokenEndpoint {
			message: format!("unexpected token endpoint response: {message}"),
			status: meta_status(meta_ref),
			retry_after: meta_retry_after(meta_ref),
		}
		.into(),
	}
}

fn map_server_response_error(
	strategy: &dyn PlatformStrategy,
	grant: GrantType,
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let mut ctx =
		TokenErrorContext::new(grant).with_oauth_error(response.error().as_ref().to_string());

	if let Some(description) = response.error_description() {
		ctx = ctx.with_error_description(description.clone());
	}
	if let Some(status) = meta_status(meta) {
		ctx = ctx.with_http_status(status);
	}

	let message = match response.error_description() {
		Some(description) => format!("{}: {description}", response.error().as_ref()),
		None => response.error().as_ref().to_string(),
	};

	match strategy.classify_token_error(&ctx) {
		TokenErrorKind::Transient => TransientError::TokenEndpoint {
			message,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
		_ => fatal_for_grant(grant, message),
	}
}

/// Non-transient token failures end the credential for refresh and the attempt for codes.
fn fatal_for_grant(grant: GrantType, reason: String) -> Error {
	match grant {
		GrantType::AuthorizationCode => Error::ExchangeFailed { reason },
		GrantType::RefreshToken => Error::ReauthRequired { reason },
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(
	strategy: &dyn PlatformStrategy,
	grant: GrantType,
	meta: Option<&ResponseMetadata>,
	err: ReqwestError,
) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::TokenEndpoint {
			message: "request timed out while calling the token endpoint".into(),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: meta_retry_after(meta),
		}
		.into();
	}

	let ctx = TokenErrorContext::network_failure(grant);

	match strategy.classify_token_error(&ctx) {
		TokenErrorKind::Transient => TransportError::from(err).into(),
		_ => fatal_for_grant(grant, err.to_string()),
	}
}

fn map_generic_transport_error(meta: Option<&ResponseMetadata>, message: impl Display) -> Error {
	TransientError::TokenEndpoint {
		message: format!("HTTP client error while calling the token endpoint: {message}"),
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
	}
	.into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}
