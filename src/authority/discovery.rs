//! Discovery-document fetch boundary and configuration-endpoint derivation.

// self
use crate::{
	_prelude::*,
	authority::{AuthorityError, AuthorityInfo, info::domain_from_upn},
};

/// Well-known OpenID configuration path appended to a canonical authority.
pub const WELL_KNOWN_PATH: &str = ".well-known/openid-configuration";

/// Future type returned by [`DiscoveryClient`] implementations.
pub type DiscoveryFuture<'a> =
	Pin<Box<dyn Future<Output = Result<DiscoveryDocument, AuthorityError>> + 'a + Send>>;

/// OpenID configuration document as fetched from the wire.
///
/// All fields are optional so the resolver can report exactly which required
/// field a provider omitted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryDocument {
	/// Authorization endpoint announced by the authority.
	#[serde(default)]
	pub authorization_endpoint: Option<String>,
	/// Token endpoint announced by the authority.
	#[serde(default)]
	pub token_endpoint: Option<String>,
	/// Issuer identifier used as the self-signed-JWT audience.
	#[serde(default)]
	pub issuer: Option<String>,
}

/// Transport boundary for fetching OpenID configuration documents.
pub trait DiscoveryClient
where
	Self: Send + Sync,
{
	/// Fetches and parses the configuration document at `url`.
	fn fetch_configuration<'a>(&'a self, url: &'a Url) -> DiscoveryFuture<'a>;
}

/// Derives the OpenID configuration document URL for an authority.
///
/// Standard authorities use the well-known path under the canonical authority.
/// Federated authorities are resolved per principal domain, which is why the
/// hint reaches this seam; custom providers can consult an on-premises
/// metadata service here instead.
pub trait OpenIdConfigurationProvider
where
	Self: Send + Sync,
{
	/// Returns the configuration document URL for the authority + principal pair.
	fn configuration_endpoint(
		&self,
		authority: &AuthorityInfo,
		principal_hint: Option<&str>,
	) -> Result<Url, AuthorityError>;
}

/// Default provider that serves every authority kind from its well-known path.
///
/// For federated authorities the principal's domain is validated for shape
/// here; the per-domain cache bookkeeping happens in the resolver.
#[derive(Clone, Copy, Debug, Default)]
pub struct WellKnownConfigurationProvider;
impl OpenIdConfigurationProvider for WellKnownConfigurationProvider {
	fn configuration_endpoint(
		&self,
		authority: &AuthorityInfo,
		principal_hint: Option<&str>,
	) -> Result<Url, AuthorityError> {
		if authority.kind().is_federated()
			&& principal_hint.and_then(domain_from_upn).is_none()
		{
			return Err(AuthorityError::MissingPrincipalHint);
		}

		// Canonical authorities always end with a slash, so a relative join keeps
		// the tenant segment.
		Url::parse(authority.canonical_authority())
			.and_then(|base| base.join(WELL_KNOWN_PATH))
			.map_err(|source| AuthorityError::InvalidAuthorityUri { source })
	}
}

#[cfg(feature = "reqwest")]
/// Reqwest-backed [`DiscoveryClient`].
#[derive(Clone, Default)]
pub struct ReqwestDiscoveryClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestDiscoveryClient {
	/// Wraps an existing [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl DiscoveryClient for ReqwestDiscoveryClient {
	fn fetch_configuration<'a>(&'a self, url: &'a Url) -> DiscoveryFuture<'a> {
		let client = self.0.clone();
		let url = url.clone();

		Box::pin(async move {
			let response = client
				.get(url)
				.send()
				.await
				.and_then(|response| response.error_for_status())
				.map_err(AuthorityError::discovery)?;
			let bytes = response.bytes().await.map_err(AuthorityError::discovery)?;
			let mut deserializer = serde_json::Deserializer::from_slice(&bytes);

			serde_path_to_error::deserialize(&mut deserializer)
				.map_err(|source| AuthorityError::DiscoveryParse { source })
		})
	}
}
