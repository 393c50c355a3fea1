//! Broker request payload assembly.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore as _;
// self
use crate::{
	_prelude::*,
	auth::{ClientId, CorrelationId, ScopeNormalizationError, ScopeSet},
	authority::AuthorityInfo,
};

/// Fixed wire keys understood by every broker implementation.
pub mod params {
	/// Canonical authority URI.
	pub const AUTHORITY: &str = "authority";
	/// Space-joined requested scopes.
	pub const REQUEST_SCOPES: &str = "request_scopes";
	/// Application client id.
	pub const CLIENT_ID: &str = "client_id";
	/// Per-request correlation identifier.
	pub const CORRELATION_ID: &str = "correlation_id";
	/// Library version string.
	pub const CLIENT_VERSION: &str = "client_version";
	/// Interactive prompt override flag.
	pub const FORCE: &str = "force";
	/// Absolute redirect URI.
	pub const REDIRECT_URI: &str = "redirect_uri";
	/// Account username, or empty when no account is attached.
	pub const USERNAME: &str = "username";
	/// Marker for OIDC scope extension.
	pub const EXTRA_OIDC_SCOPES: &str = "extra_oidc_scopes";
	/// Constant value carried under [`EXTRA_OIDC_SCOPES`].
	pub const OIDC_SCOPES_VALUE: &str = "openid offline_access profile";
	/// Base64url-encoded broker encryption key material.
	pub const BROKER_KEY: &str = "broker_key";
	/// Broker protocol version field; the value is always [`MSG_PROTOCOL_V3`].
	pub const MSG_PROTOCOL_VER: &str = "msg_protocol_ver";
	/// Current broker protocol version.
	pub const MSG_PROTOCOL_V3: &str = "3";
	/// Presence marker identifying a silent (non-interactive) flow.
	pub const SILENT_BROKER_FLOW: &str = "silent_broker_flow";
}

/// Flat key/value message handed to the broker transport.
///
/// Mutable only while being built; afterwards transports treat it as an opaque
/// message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerPayload(BTreeMap<String, String>);
impl BrokerPayload {
	/// Creates an empty payload.
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts or replaces an entry.
	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.0.insert(key.into(), value.into());
	}

	/// Returns the value stored under `key`, if any.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.get(key).map(String::as_str)
	}

	/// Returns true if the payload carries `key`.
	pub fn contains_key(&self, key: &str) -> bool {
		self.0.contains_key(key)
	}

	/// Number of entries.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true if no entries are present.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Iterator over entries in key order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	/// Renders the payload as a percent-encoded query string for URI transports.
	pub fn to_query_string(&self) -> String {
		let mut serializer = url::form_urlencoded::Serializer::new(String::new());

		for (key, value) in &self.0 {
			serializer.append_pair(key, value);
		}

		serializer.finish()
	}
}
impl FromIterator<(String, String)> for BrokerPayload {
	fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
		Self(iter.into_iter().collect())
	}
}

/// Device-bound symmetric key material shared with the broker.
///
/// The broker encrypts its response with this key; only the base64url form
/// ever crosses the process boundary.
#[derive(Clone, PartialEq, Eq)]
pub struct BrokerKey([u8; 32]);
impl BrokerKey {
	/// Generates fresh random key material.
	pub fn generate() -> Self {
		let mut material = [0_u8; 32];

		rand::rng().fill_bytes(&mut material);

		Self(material)
	}

	/// Wraps existing key material (e.g., loaded from a platform keystore).
	pub fn from_material(material: [u8; 32]) -> Self {
		Self(material)
	}

	/// Returns the base64url (no padding) wire form.
	pub fn to_base64url(&self) -> String {
		URL_SAFE_NO_PAD.encode(self.0)
	}

	/// Exposes the raw key material for the decryptor collaborator.
	pub fn material(&self) -> &[u8; 32] {
		&self.0
	}
}
impl Debug for BrokerKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("BrokerKey").field(&"<redacted>").finish()
	}
}

/// Request flavor selecting interactive or silent broker behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BrokerRequestKind {
	/// Broker may show UI and prompt the user.
	Interactive,
	/// Broker must complete without UI or fail.
	Silent,
}

/// Inputs required to assemble a broker payload.
#[derive(Clone, Debug)]
pub struct BrokerRequestParams<'a> {
	/// Target authority.
	pub authority: &'a AuthorityInfo,
	/// Requested scopes (must be non-empty after normalization).
	pub scopes: &'a ScopeSet,
	/// Application client id.
	pub client_id: &'a ClientId,
	/// Per-request correlation identifier.
	pub correlation_id: &'a CorrelationId,
	/// Absolute redirect URI registered for the broker flow.
	pub redirect_uri: &'a Url,
	/// Account username; sent as the empty string when absent.
	pub username: Option<&'a str>,
	/// Encryption key material shared with the broker.
	pub broker_key: &'a BrokerKey,
	/// Whether an interactive request should force a fresh prompt.
	pub force_prompt: bool,
}

/// Assembles the outgoing broker payload for the given request kind.
///
/// Caller-supplied entries in `existing` pass through untouched unless they
/// collide with a protocol field, in which case the builder's value wins so
/// protocol-critical keys (client id, correlation id, key material) cannot be
/// spoofed. No I/O happens here.
pub fn build(
	kind: BrokerRequestKind,
	request: &BrokerRequestParams,
	existing: BrokerPayload,
) -> Result<BrokerPayload, ScopeNormalizationError> {
	if request.scopes.is_empty() {
		return Err(ScopeNormalizationError::EmptySet);
	}

	let mut payload = existing;

	payload.insert(params::AUTHORITY, request.authority.canonical_authority());
	payload.insert(params::REQUEST_SCOPES, request.scopes.normalized());
	payload.insert(params::CLIENT_ID, request.client_id.as_ref());
	payload.insert(params::CORRELATION_ID, request.correlation_id.as_ref());
	payload.insert(params::CLIENT_VERSION, env!("CARGO_PKG_VERSION"));
	payload.insert(params::REDIRECT_URI, request.redirect_uri.as_str());
	payload.insert(params::USERNAME, request.username.unwrap_or_default());
	payload.insert(params::EXTRA_OIDC_SCOPES, params::OIDC_SCOPES_VALUE);
	payload.insert(params::BROKER_KEY, request.broker_key.to_base64url());
	payload.insert(params::MSG_PROTOCOL_VER, params::MSG_PROTOCOL_V3);

	match kind {
		BrokerRequestKind::Interactive => {
			payload.insert(params::FORCE, if request.force_prompt { "YES" } else { "NO" });
		},
		BrokerRequestKind::Silent => {
			payload.insert(params::SILENT_BROKER_FLOW, "");
		},
	}

	Ok(payload)
}
