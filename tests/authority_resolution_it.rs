#![cfg(feature = "reqwest")]

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use identity_broker::authority::{
	AuthorityEndpointCache, AuthorityError, AuthorityInfo, AuthorityKind,
	ReqwestDiscoveryClient, WellKnownConfigurationProvider,
};

fn cache() -> AuthorityEndpointCache {
	AuthorityEndpointCache::new(
		Arc::new(ReqwestDiscoveryClient::default()),
		Arc::new(WellKnownConfigurationProvider),
	)
}

fn authority(server: &MockServer, kind: AuthorityKind, tenant: &str) -> AuthorityInfo {
	AuthorityInfo::new(kind, &server.url(format!("/{tenant}")))
		.expect("Mock authority URI should parse successfully.")
}

#[tokio::test]
async fn discovery_runs_once_per_standard_authority() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/contoso/.well-known/openid-configuration");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"authorization_endpoint": "https://login.example.com/{tenant}/authorize",
				"token_endpoint": "https://login.example.com/{tenant}/token",
				"issuer": "https://sts.example.com/{tenant}/",
			}));
		})
		.await;
	let cache = cache();
	let authority = authority(&server, AuthorityKind::Aad, "contoso");
	let first = cache
		.resolve(&authority, None)
		.await
		.expect("Initial resolution against the mock provider should succeed.");
	let second = cache
		.resolve(&authority, None)
		.await
		.expect("Cached resolution should succeed without network traffic.");

	assert_eq!(first, second);
	assert_eq!(
		first.authorization_endpoint.as_str(),
		"https://login.example.com/contoso/authorize"
	);
	assert_eq!(first.token_endpoint.as_str(), "https://login.example.com/contoso/token");
	assert_eq!(first.self_signed_jwt_audience, "https://sts.example.com/contoso/");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn federated_authorities_revalidate_per_domain() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/adfs/.well-known/openid-configuration");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"authorization_endpoint": "https://adfs.example.com/adfs/oauth2/authorize",
				"token_endpoint": "https://adfs.example.com/adfs/oauth2/token",
				"issuer": "https://adfs.example.com/adfs",
			}));
		})
		.await;
	let cache = cache();
	let authority = authority(&server, AuthorityKind::Adfs, "adfs");

	cache
		.resolve(&authority, Some("alice@contoso.com"))
		.await
		.expect("First federated resolution should succeed.");
	cache
		.resolve(&authority, Some("carol@contoso.com"))
		.await
		.expect("Same-domain federated resolution should hit the cache.");

	mock.assert_calls_async(1).await;

	cache
		.resolve(&authority, Some("bob@fabrikam.com"))
		.await
		.expect("New-domain federated resolution should succeed.");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn incomplete_documents_name_the_missing_field() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/t1/.well-known/openid-configuration");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"authorization_endpoint": "https://login.example.com/t1/authorize",
				"issuer": "https://sts.example.com/t1/",
			}));
		})
		.await;

	let cache = cache();
	let authority = authority(&server, AuthorityKind::Aad, "t1");
	let error = cache
		.resolve(&authority, None)
		.await
		.expect_err("A document without a token endpoint must be rejected.");

	assert!(matches!(
		error,
		AuthorityError::TenantDiscoveryFailed { field: "token_endpoint" }
	));
}

#[tokio::test]
async fn transport_failures_surface_as_discovery_errors() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/down/.well-known/openid-configuration");
			then.status(503);
		})
		.await;

	let cache = cache();
	let authority = authority(&server, AuthorityKind::Aad, "down");
	let error = cache
		.resolve(&authority, None)
		.await
		.expect_err("A failing provider must surface a discovery error.");

	assert!(matches!(error, AuthorityError::Discovery { .. }));
}
