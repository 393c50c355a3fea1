//! Process-lifetime authority endpoint cache.

// self
use crate::{
	_prelude::*,
	authority::{
		AuthorityError, AuthorityInfo, DiscoveryClient, DiscoveryDocument,
		OpenIdConfigurationProvider, info::domain_from_upn,
	},
};

/// Literal placeholder providers embed where the tenant segment belongs.
pub const TENANT_PLACEHOLDER: &str = "{tenant}";

/// Resolved endpoints for one authority (or one authority + validated domain).
///
/// Produced once per resolution and never mutated afterwards; the cache hands
/// out `Arc` snapshots so concurrent requests share them safely.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorityEndpoints {
	/// Authorization endpoint with the tenant placeholder substituted.
	pub authorization_endpoint: Url,
	/// Token endpoint with the tenant placeholder substituted.
	pub token_endpoint: Url,
	/// Issuer string used as the audience for self-signed client assertions.
	pub self_signed_jwt_audience: String,
}

struct CacheEntry {
	endpoints: Arc<AuthorityEndpoints>,
	// Only populated for federated authorities; non-federated lookups never
	// consult it.
	valid_for_domains: HashSet<String>,
}

/// Thread-safe cache mapping canonical authority strings to resolved endpoints.
///
/// The cache is intentionally unbounded and never evicts: authorities form a
/// small, application-controlled set and their endpoints are effectively
/// static for the process lifetime. Hold one instance per client/session
/// handle and share it by reference; there is no process-global singleton.
///
/// Concurrent misses for the same authority may each perform discovery; the
/// last write wins for the endpoints while federated domain sets are unioned
/// with whatever an earlier writer recorded.
pub struct AuthorityEndpointCache {
	discovery: Arc<dyn DiscoveryClient>,
	configuration: Arc<dyn OpenIdConfigurationProvider>,
	entries: RwLock<HashMap<String, CacheEntry>>,
}
impl AuthorityEndpointCache {
	/// Creates an empty cache backed by the provided collaborators.
	pub fn new(
		discovery: Arc<dyn DiscoveryClient>,
		configuration: Arc<dyn OpenIdConfigurationProvider>,
	) -> Self {
		Self { discovery, configuration, entries: RwLock::new(HashMap::new()) }
	}

	/// Resolves the endpoints for `authority`, consulting the cache first.
	///
	/// Federated authorities require a `user@domain` principal hint and hit the
	/// cache only when the hint's domain was previously validated; standard
	/// authorities hit on entry presence alone. No lock is held across the
	/// discovery await.
	pub async fn resolve(
		&self,
		authority: &AuthorityInfo,
		principal_hint: Option<&str>,
	) -> Result<Arc<AuthorityEndpoints>, AuthorityError> {
		if authority.kind().is_federated()
			&& !principal_hint.is_some_and(|hint| !hint.is_empty())
		{
			return Err(AuthorityError::MissingPrincipalHint);
		}
		if let Some(endpoints) = self.lookup(authority, principal_hint) {
			return Ok(endpoints);
		}

		let configuration_endpoint =
			self.configuration.configuration_endpoint(authority, principal_hint)?;
		let document = self.discovery.fetch_configuration(&configuration_endpoint).await?;
		let endpoints = Arc::new(endpoints_from_document(authority, document)?);

		self.store(authority, principal_hint, endpoints.clone());

		Ok(endpoints)
	}

	fn lookup(
		&self,
		authority: &AuthorityInfo,
		principal_hint: Option<&str>,
	) -> Option<Arc<AuthorityEndpoints>> {
		let guard = self.entries.read();
		let entry = guard.get(authority.canonical_authority())?;

		if !authority.kind().is_federated() {
			return Some(entry.endpoints.clone());
		}

		let domain = principal_hint.and_then(domain_from_upn)?.to_lowercase();

		entry.valid_for_domains.contains(&domain).then(|| entry.endpoints.clone())
	}

	fn store(
		&self,
		authority: &AuthorityInfo,
		principal_hint: Option<&str>,
		endpoints: Arc<AuthorityEndpoints>,
	) {
		let mut entry = CacheEntry { endpoints, valid_for_domains: HashSet::new() };
		let mut guard = self.entries.write();

		if authority.kind().is_federated() {
			// We just heard from the backend, so the fresh endpoints replace the
			// old ones, but domains validated by earlier resolutions stay valid.
			if let Some(existing) = guard.get(authority.canonical_authority()) {
				entry.valid_for_domains.extend(existing.valid_for_domains.iter().cloned());
			}
			if let Some(domain) = principal_hint.and_then(domain_from_upn) {
				entry.valid_for_domains.insert(domain.to_lowercase());
			}
		}

		guard.insert(authority.canonical_authority().to_owned(), entry);
	}
}
impl Debug for AuthorityEndpointCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorityEndpointCache")
			.field("entries", &self.entries.read().len())
			.finish()
	}
}

fn endpoints_from_document(
	authority: &AuthorityInfo,
	document: DiscoveryDocument,
) -> Result<AuthorityEndpoints, AuthorityError> {
	let authorization =
		required_field(document.authorization_endpoint, "authorization_endpoint")?;
	let token = required_field(document.token_endpoint, "token_endpoint")?;
	let issuer = required_field(document.issuer, "issuer")?;
	let tenant = authority.tenant();
	let authorization_endpoint = parse_endpoint(&substitute_tenant(&authorization, tenant), "authorization_endpoint")?;
	let token_endpoint = parse_endpoint(&substitute_tenant(&token, tenant), "token_endpoint")?;

	Ok(AuthorityEndpoints {
		authorization_endpoint,
		token_endpoint,
		self_signed_jwt_audience: substitute_tenant(&issuer, tenant),
	})
}

fn required_field(
	value: Option<String>,
	field: &'static str,
) -> Result<String, AuthorityError> {
	value
		.filter(|value| !value.is_empty())
		.ok_or(AuthorityError::TenantDiscoveryFailed { field })
}

fn substitute_tenant(value: &str, tenant: &str) -> String {
	value.replace(TENANT_PLACEHOLDER, tenant)
}

fn parse_endpoint(value: &str, field: &'static str) -> Result<Url, AuthorityError> {
	Url::parse(value).map_err(|source| AuthorityError::InvalidDiscoveryEndpoint { field, source })
}
