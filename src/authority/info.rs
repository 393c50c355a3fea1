//! Canonical authority values and principal helpers.

// self
use crate::{_prelude::*, authority::AuthorityError};

/// Closed set of authority flavors the client understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthorityKind {
	/// Cloud directory authority (tenant identified by the URI alone).
	Aad,
	/// Federated ADFS-style authority; endpoint validity depends on the user's domain.
	Adfs,
	/// Consumer/B2C policy authority.
	B2c,
}
impl AuthorityKind {
	/// Returns true for authorities whose endpoint validity is per-domain.
	pub const fn is_federated(self) -> bool {
		matches!(self, AuthorityKind::Adfs)
	}
}

/// Immutable description of one authority.
///
/// Identity is the canonical URI string: two values with equal canonical
/// authorities address the same cache entry regardless of how the input URI
/// was spelled.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthorityInfo {
	canonical_authority: String,
	kind: AuthorityKind,
	tenant: String,
	host: String,
}
impl AuthorityInfo {
	/// Canonicalizes the provided authority URI and extracts the tenant segment.
	///
	/// Canonical form is `scheme://host/tenant/` with the host lower-cased and any
	/// extra path segments, query, and fragment dropped.
	pub fn new(kind: AuthorityKind, uri: &str) -> Result<Self, AuthorityError> {
		let parsed =
			Url::parse(uri).map_err(|source| AuthorityError::InvalidAuthorityUri { source })?;
		let host = parsed.host_str().ok_or(AuthorityError::MissingTenant)?.to_lowercase();
		let tenant = parsed
			.path_segments()
			.and_then(|mut segments| segments.next())
			.filter(|segment| !segment.is_empty())
			.ok_or(AuthorityError::MissingTenant)?
			.to_lowercase();
		// `Url::port` is `None` for the scheme's default port, so default ports
		// never leak into the canonical form.
		let canonical_authority = match parsed.port() {
			Some(port) => format!("{}://{host}:{port}/{tenant}/", parsed.scheme()),
			None => format!("{}://{host}/{tenant}/", parsed.scheme()),
		};

		Ok(Self { canonical_authority, kind, tenant, host })
	}

	/// The canonical authority URI string.
	pub fn canonical_authority(&self) -> &str {
		&self.canonical_authority
	}

	/// The authority kind.
	pub fn kind(&self) -> AuthorityKind {
		self.kind
	}

	/// The tenant segment parsed out of the canonical authority path.
	pub fn tenant(&self) -> &str {
		&self.tenant
	}

	/// The lower-cased authority host.
	pub fn host(&self) -> &str {
		&self.host
	}
}
impl Display for AuthorityInfo {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.canonical_authority)
	}
}

/// Extracts the domain portion of a `user@domain` principal, if any.
pub fn domain_from_upn(upn: &str) -> Option<&str> {
	upn.split_once('@').map(|(_, domain)| domain).filter(|domain| !domain.is_empty())
}
