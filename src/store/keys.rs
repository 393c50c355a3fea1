//! Deterministic cache key derivation for persisted credentials.

// crates.io
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, auth::ScopeSet};

/// Component delimiter of the composite key grammar.
const DELIMITER: &str = "-";

/// Error raised when cache key attributes fail validation.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum KeyError {
	/// A required key attribute is empty.
	#[error("Cache key attribute `{field}` must not be empty.")]
	InvalidKeyAttributes {
		/// Name of the offending attribute.
		field: &'static str,
	},
}

/// Credential class discriminator embedded in every derived key.
///
/// Distinct kinds never collide even when every other attribute matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialKind {
	/// An access token credential.
	AccessToken,
	/// A refresh token credential.
	RefreshToken,
	/// An ID token credential.
	IdToken,
}
impl CredentialKind {
	/// Lowercase wire discriminator used in key composition.
	pub fn discriminator(self) -> &'static str {
		match self {
			Self::AccessToken => "accesstoken",
			Self::RefreshToken => "refreshtoken",
			Self::IdToken => "idtoken",
		}
	}
}

/// Identity attributes a credential key is derived from.
///
/// Construction validates the required attributes once; derivation itself is
/// pure and infallible. Absent optionals participate as empty components so
/// the delimiter count stays fixed and the grammar stays injective.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheKeyAttributes {
	environment: String,
	tenant: Option<String>,
	home_account_id: Option<String>,
	client_id: String,
	scopes: String,
}
impl CacheKeyAttributes {
	/// Validates and captures the attribute tuple.
	///
	/// `environment` is the issuer host the token was obtained from; `scopes`
	/// is already normalized by [`ScopeSet`].
	pub fn new(
		environment: impl Into<String>,
		tenant: Option<&str>,
		home_account_id: Option<&str>,
		client_id: impl Into<String>,
		scopes: &ScopeSet,
	) -> Result<Self, KeyError> {
		let environment = environment.into();
		let client_id = client_id.into();

		if environment.is_empty() {
			return Err(KeyError::InvalidKeyAttributes { field: "environment" });
		}
		if client_id.is_empty() {
			return Err(KeyError::InvalidKeyAttributes { field: "client_id" });
		}

		Ok(Self {
			environment,
			tenant: tenant.map(Into::into),
			home_account_id: home_account_id.map(Into::into),
			client_id,
			scopes: scopes.normalized(),
		})
	}

	/// Derives the full composite credential key.
	///
	/// Deterministic across processes and restarts; equal attribute tuples
	/// always produce equal keys and distinct tuples distinct keys.
	pub fn credential_key(&self, kind: CredentialKind) -> String {
		[
			self.home_account_id.as_deref().unwrap_or_default(),
			self.environment.as_str(),
			kind.discriminator(),
			self.client_id.as_str(),
			self.tenant.as_deref().unwrap_or_default(),
			self.scopes.as_str(),
		]
		.join(DELIMITER)
		.to_lowercase()
	}

	/// Derives the fixed-length fallback key for backends with length ceilings.
	///
	/// Lowercase hex SHA-256 of the credential key: 64 characters, always under
	/// the 255-character backend ceiling.
	pub fn hashed_key(&self, kind: CredentialKind) -> String {
		use std::fmt::Write as _;

		Sha256::digest(self.credential_key(kind).as_bytes()).iter().fold(
			String::with_capacity(64),
			|mut hex, byte| {
				let _ = write!(hex, "{byte:02x}");

				hex
			},
		)
	}

	/// Splits the key into the account/service/generic triple used by keychain
	/// style backends.
	pub fn split_key_triple(&self, kind: CredentialKind) -> KeyTriple {
		let account =
			[self.home_account_id.as_deref().unwrap_or_default(), self.environment.as_str()]
				.join(DELIMITER)
				.to_lowercase();
		let service = [
			kind.discriminator(),
			self.client_id.as_str(),
			self.tenant.as_deref().unwrap_or_default(),
			self.scopes.as_str(),
		]
		.join(DELIMITER)
		.to_lowercase();
		let generic = [
			kind.discriminator(),
			self.client_id.as_str(),
			self.tenant.as_deref().unwrap_or_default(),
		]
		.join(DELIMITER)
		.to_lowercase();

		KeyTriple { account, service, generic }
	}
}

/// Account/service/generic decomposition of a credential key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyTriple {
	/// Who the credential belongs to: home account id + environment.
	pub account: String,
	/// What the credential is: kind + client id + tenant + scopes.
	pub service: String,
	/// Scope-independent grouping key: kind + client id + tenant.
	pub generic: String,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn scopes() -> ScopeSet {
		ScopeSet::new(["User.Read", "openid"]).expect("Scope fixture should normalize.")
	}

	fn attributes() -> CacheKeyAttributes {
		CacheKeyAttributes::new(
			"login.example.com",
			Some("Contoso"),
			Some("uid.utid"),
			"Client-1",
			&scopes(),
		)
		.expect("Attribute fixture should validate.")
	}

	#[test]
	fn credential_key_is_lowercased_composite() {
		assert_eq!(
			attributes().credential_key(CredentialKind::AccessToken),
			"uid.utid-login.example.com-accesstoken-client-1-contoso-openid user.read"
		);
	}

	#[test]
	fn absent_optionals_keep_their_delimiters() {
		let attributes =
			CacheKeyAttributes::new("login.example.com", None, None, "client-1", &scopes())
				.expect("Attribute fixture should validate.");

		assert_eq!(
			attributes.credential_key(CredentialKind::RefreshToken),
			"-login.example.com-refreshtoken-client-1--openid user.read"
		);
	}

	#[test]
	fn distinct_kinds_never_collide() {
		let attributes = attributes();

		assert_ne!(
			attributes.credential_key(CredentialKind::AccessToken),
			attributes.credential_key(CredentialKind::RefreshToken)
		);
		assert_ne!(
			attributes.credential_key(CredentialKind::RefreshToken),
			attributes.credential_key(CredentialKind::IdToken)
		);
	}

	#[test]
	fn hashed_key_is_fixed_length_hex() {
		let hashed = attributes().hashed_key(CredentialKind::AccessToken);

		assert_eq!(hashed.len(), 64);
		assert!(hashed.len() <= 255);
		assert!(hashed.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
	}

	#[test]
	fn hashed_key_tracks_attribute_changes() {
		let a = attributes();
		let b = CacheKeyAttributes::new(
			"login.example.com",
			Some("fabrikam"),
			Some("uid.utid"),
			"client-1",
			&scopes(),
		)
		.expect("Attribute fixture should validate.");

		assert_ne!(
			a.hashed_key(CredentialKind::AccessToken),
			b.hashed_key(CredentialKind::AccessToken)
		);
		assert_eq!(
			a.hashed_key(CredentialKind::AccessToken),
			attributes().hashed_key(CredentialKind::AccessToken),
			"Equal attribute tuples must derive equal keys."
		);
	}

	#[test]
	fn split_triple_partitions_the_composite() {
		let triple = attributes().split_key_triple(CredentialKind::AccessToken);

		assert_eq!(triple.account, "uid.utid-login.example.com");
		assert_eq!(triple.service, "accesstoken-client-1-contoso-openid user.read");
		assert_eq!(triple.generic, "accesstoken-client-1-contoso");
	}

	#[test]
	fn empty_required_attributes_are_rejected() {
		assert!(matches!(
			CacheKeyAttributes::new("", None, None, "client-1", &scopes()),
			Err(KeyError::InvalidKeyAttributes { field: "environment" })
		));
		assert!(matches!(
			CacheKeyAttributes::new("login.example.com", None, None, "", &scopes()),
			Err(KeyError::InvalidKeyAttributes { field: "client_id" })
		));
	}
}
