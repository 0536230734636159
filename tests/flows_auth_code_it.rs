#![cfg(feature = "reqwest")]

// std
use std::collections::HashSet;
// crates.io
use httpmock::prelude::*;
// self
use platform_broker::{
	_preludet::*,
	auth::{DEFAULT_TOKEN_TYPE, ScopeSet, UserId},
	flows::{FlowManager, FlowSettings, PkceCodeChallengeMethod},
	oauth::ReqwestTransportErrorMapper,
	provider::{ClientCredentials, PlatformRegistry, catalog},
	vault::TokenLookup,
};

const CLIENT_ID: &str = "client-it";
const CLIENT_SECRET: &str = "secret-it";

fn user() -> UserId {
	UserId::new("user-42").expect("User identifier should be valid.")
}

fn redirect_uri() -> Url {
	Url::parse("https://app.example.com/callback").expect("Redirect URI should parse.")
}

#[tokio::test]
async fn twitter_authorization_exchanges_code_and_stores_bundle() {
	let server = MockServer::start_async().await;
	let descriptor = mock_platform_descriptor("twitter", |path| server.url(path));
	let (flows, vault, store) = build_reqwest_test_flows(descriptor, CLIENT_ID, CLIENT_SECRET);
	let session = flows
		.initiate("twitter", &user(), redirect_uri(), ScopeSet::default())
		.await
		.expect("Authorization should initiate.");

	assert_eq!(session.state.len(), 43);
	assert_eq!(session.code_challenge_method(), Some(PkceCodeChallengeMethod::S256));
	assert_eq!(session.scope.as_slice(), ["offline.access", "tweet.read"]);

	let pairs: HashMap<_, _> = session.authorize_url.query_pairs().into_owned().collect();

	assert_eq!(pairs.get("response_type"), Some(&"code".into()));
	assert_eq!(pairs.get("client_id"), Some(&CLIENT_ID.into()));
	assert_eq!(pairs.get("redirect_uri"), Some(&redirect_uri().as_str().into()));
	assert_eq!(pairs.get("scope"), Some(&"offline.access tweet.read".into()));
	assert_eq!(pairs.get("state"), Some(&session.state));
	assert_eq!(pairs.get("code_challenge"), session.code_challenge.as_ref());
	assert_eq!(pairs.get("code_challenge_method"), Some(&"S256".into()));

	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("content-type", "application/x-www-form-urlencoded")
				.header_exists("authorization")
				.body_includes("grant_type=authorization_code")
				.body_includes("code=auth-code-1")
				.body_includes("code_verifier=");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"AT1\",\"refresh_token\":\"RT1\",\"token_type\":\"bearer\",\"expires_in\":7200,\"scope\":\"tweet.read offline.access\"}",
			);
		})
		.await;
	let bundle = flows
		.handle_callback("twitter", "auth-code-1", &session.state, None)
		.await
		.expect("Callback should exchange the code.");

	mock.assert_async().await;

	assert_eq!(bundle.access_token.expose(), "AT1");
	assert_eq!(bundle.refresh_token.as_ref().map(|t| t.expose()), Some("RT1"));
	assert!(bundle.expires_at > bundle.issued_at);
	assert_eq!(store.len(), 1);

	let TokenLookup::Valid(stored) =
		vault.get(&session.platform, &user()).await.expect("Vault lookup should succeed.")
	else {
		panic!("Freshly exchanged bundle should be valid.");
	};

	assert_eq!(stored, bundle);

	let replay = flows
		.handle_callback("twitter", "auth-code-1", &session.state, None)
		.await
		.expect_err("A consumed state must not be accepted twice.");

	assert!(matches!(replay, Error::InvalidState));

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn minimal_token_responses_default_to_bearer() {
	let server = MockServer::start_async().await;
	let descriptor = mock_platform_descriptor("twitter", |path| server.url(path));
	let (flows, vault, _) = build_reqwest_test_flows(descriptor, CLIENT_ID, CLIENT_SECRET);
	let session = flows
		.initiate("twitter", &user(), redirect_uri(), ScopeSet::default())
		.await
		.expect("Authorization should initiate.");
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").body_includes("code=code123");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"AT1\",\"expires_in\":3600}");
		})
		.await;
	let bundle = flows
		.handle_callback("twitter", "code123", &session.state, None)
		.await
		.expect("A response without token_type should be accepted.");

	mock.assert_async().await;

	assert_eq!(bundle.access_token.expose(), "AT1");
	assert_eq!(bundle.token_type, DEFAULT_TOKEN_TYPE);
	assert!(bundle.refresh_token.is_none());
	assert_eq!(bundle.expires_at - bundle.issued_at, Duration::seconds(3600));
	assert_eq!(bundle.scope, session.scope);
	assert!(matches!(
		vault.get(&session.platform, &user()).await.expect("Vault lookup should succeed."),
		TokenLookup::Valid(_)
	));
}

#[tokio::test]
async fn concurrent_callbacks_consume_a_state_once() {
	let server = MockServer::start_async().await;
	let descriptor = mock_platform_descriptor("twitter", |path| server.url(path));
	let (flows, _, _) = build_reqwest_test_flows(descriptor, CLIENT_ID, CLIENT_SECRET);
	let session = flows
		.initiate("twitter", &user(), redirect_uri(), ScopeSet::default())
		.await
		.expect("Authorization should initiate.");
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"AT1\",\"token_type\":\"bearer\",\"expires_in\":3600}");
		})
		.await;
	let handles = (0..8)
		.map(|_| {
			let flows = flows.clone();
			let state = session.state.clone();

			tokio::spawn(async move { flows.handle_callback("twitter", "code", &state, None).await })
		})
		.collect::<Vec<_>>();
	let mut successes = 0;
	let mut rejections = 0;

	for handle in handles {
		match handle.await.expect("Callback task should not panic.") {
			Ok(_) => successes += 1,
			Err(Error::InvalidState) => rejections += 1,
			Err(e) => panic!("Unexpected callback error: {e:?}."),
		}
	}

	assert_eq!(successes, 1);
	assert_eq!(rejections, 7);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn ten_thousand_initiations_mint_distinct_states() {
	let mut registry = PlatformRegistry::default();

	registry.register(
		catalog::twitter().expect("Twitter descriptor should build."),
		Some(ClientCredentials::new(CLIENT_ID).with_secret(CLIENT_SECRET)),
	);

	let (vault, _) = build_memory_vault();
	let flows: ReqwestTestFlows = FlowManager::with_http_client(
		Arc::new(registry),
		vault,
		test_reqwest_http_client(),
		Arc::new(ReqwestTransportErrorMapper),
	);
	let mut states = HashSet::new();

	for _ in 0..10_000 {
		let session = flows
			.initiate("twitter", &user(), redirect_uri(), ScopeSet::default())
			.await
			.expect("Authorization should initiate.");

		assert!(states.insert(session.state));
	}

	assert_eq!(states.len(), 10_000);
}

#[tokio::test]
async fn stale_pending_state_is_rejected_without_an_exchange() {
	let server = MockServer::start_async().await;
	let descriptor = mock_platform_descriptor("twitter", |path| server.url(path));
	let (flows, _, _) = build_reqwest_test_flows(descriptor, CLIENT_ID, CLIENT_SECRET);
	let flows = Arc::into_inner(flows)
		.expect("Flow manager should not be shared yet.")
		.with_settings(FlowSettings { pending_ttl: Duration::seconds(-1), ..Default::default() });
	let session = flows
		.initiate("twitter", &user(), redirect_uri(), ScopeSet::default())
		.await
		.expect("Authorization should initiate.");
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"AT1\",\"token_type\":\"bearer\",\"expires_in\":3600}");
		})
		.await;
	let err = flows
		.handle_callback("twitter", "code", &session.state, None)
		.await
		.expect_err("Expired state must be rejected.");

	assert!(matches!(err, Error::ExpiredState));
	assert_eq!(err.to_string(), Error::InvalidState.to_string());

	let err = flows
		.handle_callback("twitter", "code", &session.state, None)
		.await
		.expect_err("Expired state is consumed by the first callback.");

	assert!(matches!(err, Error::InvalidState));

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn provider_denial_and_rejection_are_reported() {
	let server = MockServer::start_async().await;
	let descriptor = mock_platform_descriptor("twitter", |path| server.url(path));
	let (flows, _, store) = build_reqwest_test_flows(descriptor, CLIENT_ID, CLIENT_SECRET);
	let session = flows
		.initiate("twitter", &user(), redirect_uri(), ScopeSet::default())
		.await
		.expect("Authorization should initiate.");
	let err = flows
		.handle_callback("twitter", "", &session.state, Some("access_denied"))
		.await
		.expect_err("Denied authorization must fail.");

	assert!(matches!(err, Error::AuthorizationDenied { ref reason } if reason == "access_denied"));

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"code bad-code-7 was already used\"}");
		})
		.await;
	let err = flows
		.handle_callback("twitter", "bad-code-7", &session.state, None)
		.await
		.expect_err("Rejected code must fail.");

	mock.assert_async().await;

	let Error::ExchangeFailed { reason } = err else {
		panic!("Expected an exchange failure, got {err:?}.");
	};

	assert!(!reason.contains("bad-code-7"));
	assert!(reason.contains("[REDACTED]"));
	assert!(store.is_empty());
}

#[tokio::test]
async fn callbacks_for_another_platform_are_invalid() {
	let server = MockServer::start_async().await;
	let mut registry = PlatformRegistry::default();

	registry
		.register(
			mock_platform_descriptor("twitter", |path| server.url(path)),
			Some(ClientCredentials::new(CLIENT_ID).with_secret(CLIENT_SECRET)),
		)
		.register(
			mock_platform_descriptor("mastodon", |path| server.url(path)),
			Some(ClientCredentials::new(CLIENT_ID).with_secret(CLIENT_SECRET)),
		);

	let (vault, _) = build_memory_vault();
	let flows: ReqwestTestFlows = FlowManager::with_http_client(
		Arc::new(registry),
		vault,
		test_reqwest_http_client(),
		Arc::new(ReqwestTransportErrorMapper),
	);
	let session = flows
		.initiate("twitter", &user(), redirect_uri(), ScopeSet::default())
		.await
		.expect("Authorization should initiate.");
	let err = flows
		.handle_callback("mastodon", "code", &session.state, None)
		.await
		.expect_err("Cross-platform state must be rejected.");

	assert!(matches!(err, Error::InvalidState));

	let err = flows
		.initiate("myspace", &user(), redirect_uri(), ScopeSet::default())
		.await
		.expect_err("Unknown platforms must be rejected.");

	assert!(matches!(err, Error::Config(_)));
}
