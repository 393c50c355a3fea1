//! Cryptographic verification and normalization of broker response messages.

// crates.io
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, auth::TokenSecret, broker::BrokerProtocolError};

/// Wire field names and placeholder values of the broker response grammar.
pub mod fields {
	/// Authorization code field.
	pub const CODE: &str = "code";
	/// Error code field.
	pub const ERROR: &str = "error";
	/// Human-readable error description field.
	pub const ERROR_DESCRIPTION: &str = "error_description";
	/// Integrity digest over the decrypted payload.
	pub const HASH: &str = "hash";
	/// Encrypted token payload field.
	pub const RESPONSE: &str = "response";
	/// Access token field inside the decrypted payload.
	pub const ACCESS_TOKEN: &str = "access_token";
	/// Access token lifetime in seconds inside the decrypted payload.
	pub const EXPIRES_IN: &str = "expires_in";
	/// ID token field inside the decrypted payload.
	pub const ID_TOKEN: &str = "id_token";
	/// Refresh token field inside the decrypted payload.
	pub const REFRESH_TOKEN: &str = "refresh_token";
	/// Placeholder some brokers emit instead of omitting the code field.
	pub const NULL_PLACEHOLDER: &str = "(null)";
	/// Generic error code synthesized when the broker reports neither a code nor
	/// an explicit error.
	pub const BROKER_ERROR_CODE: &str = "broker_error";
	/// Stable error code for an integrity digest mismatch.
	pub const HASH_MISMATCH_CODE: &str = "broker_response_hash_mismatch";
}

/// Access token lifetime assumed when the broker omits `expires_in`.
const DEFAULT_EXPIRES_IN: Duration = Duration::seconds(3_600);

/// Decrypts the broker's sealed payload with the device-bound key.
///
/// The concrete implementation lives next to the platform transport; the
/// verifier only needs the plaintext back.
pub trait BrokerResponseDecryptor
where
	Self: Send + Sync,
{
	/// Decrypts `ciphertext` into the plaintext response form.
	fn decrypt(&self, ciphertext: &str) -> Result<String, Box<dyn StdError + Send + Sync>>;
}

/// Normalized outcome of a verified broker response.
///
/// Both variants are terminal for the message that produced them; whether an
/// [`BrokerResponse::Error`] is worth a fresh invocation is the caller's call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BrokerResponse {
	/// The broker returned verified token material.
	Token(BrokerTokenResponse),
	/// The broker declined the request, or verification downgraded it.
	Error(BrokerErrorResponse),
}

/// Token material extracted from a verified broker payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerTokenResponse {
	/// Issued access token.
	pub access_token: TokenSecret,
	/// Access token lifetime relative to receipt.
	pub expires_in: Duration,
	/// ID token, when the broker issued one.
	pub id_token: Option<TokenSecret>,
	/// Refresh token, when the broker issued one.
	pub refresh_token: Option<TokenSecret>,
}

/// Error outcome reported by, or attributed to, the broker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerErrorResponse {
	/// Stable error code.
	pub code: String,
	/// Human-readable description, when the broker supplied one.
	pub description: Option<String>,
}
impl BrokerErrorResponse {
	/// Returns true if this error is the verifier's own integrity downgrade
	/// rather than a code the broker sent.
	pub fn is_hash_mismatch(&self) -> bool {
		self.code == fields::HASH_MISMATCH_CODE
	}
}

/// Computes the integrity digest the broker protocol uses: lowercase hex
/// SHA-256 over the plaintext response.
pub fn response_hash(plaintext: &str) -> String {
	use std::fmt::Write as _;

	Sha256::digest(plaintext.as_bytes()).iter().fold(
		String::with_capacity(64),
		|mut hex, byte| {
			let _ = write!(hex, "{byte:02x}");

			hex
		},
	)
}

/// Verifies and normalizes a raw broker response message.
///
/// The outer message is `&`-separated percent-encoded `key=value` pairs. An
/// explicit error short-circuits before any decryption. Otherwise the sealed
/// payload is decrypted, its digest checked against the `hash` field, and the
/// plaintext re-parsed with the same grammar. A digest mismatch is reported as
/// an [`BrokerResponse::Error`] carrying [`fields::HASH_MISMATCH_CODE`] so the
/// caller can tell it apart from a broker-sent code; it is never retried by
/// re-reading the same message.
pub fn verify(
	raw: &str,
	decryptor: &dyn BrokerResponseDecryptor,
) -> Result<BrokerResponse, BrokerProtocolError> {
	let outer = parse_pairs(raw)?;

	if let Some(error) = declined(&outer) {
		return Ok(BrokerResponse::Error(error));
	}
	// The null-code signal arrives on the outer message, before any sealed
	// payload is opened; a well-formed payload next to it does not rescue the
	// response.
	if null_code(&outer) {
		return Ok(BrokerResponse::Error(BrokerErrorResponse {
			code: fields::BROKER_ERROR_CODE.to_owned(),
			description: None,
		}));
	}

	let expected_hash = outer
		.get(fields::HASH)
		.ok_or(BrokerProtocolError::MalformedResponse { reason: "missing hash field" })?;
	let sealed = outer
		.get(fields::RESPONSE)
		.ok_or(BrokerProtocolError::MalformedResponse { reason: "missing response field" })?;
	let plaintext =
		decryptor.decrypt(sealed).map_err(BrokerProtocolError::decryption_failed)?;

	if !hash_matches(expected_hash, &response_hash(&plaintext)) {
		return Ok(BrokerResponse::Error(BrokerErrorResponse {
			code: fields::HASH_MISMATCH_CODE.to_owned(),
			description: Some("broker response failed integrity verification".to_owned()),
		}));
	}

	let inner = parse_pairs(&plaintext)?;

	if let Some(error) = declined(&inner) {
		return Ok(BrokerResponse::Error(error));
	}
	if null_code(&inner) {
		return Ok(BrokerResponse::Error(BrokerErrorResponse {
			code: fields::BROKER_ERROR_CODE.to_owned(),
			description: None,
		}));
	}

	token_response(&inner).map(BrokerResponse::Token)
}

fn parse_pairs(message: &str) -> Result<BTreeMap<String, String>, BrokerProtocolError> {
	let mut pairs = BTreeMap::new();

	for segment in message.split('&').filter(|segment| !segment.is_empty()) {
		if !segment.contains('=') {
			return Err(BrokerProtocolError::MalformedResponse {
				reason: "pair without key/value separator",
			});
		}

		// Decode one pair at a time so a bad segment is caught above instead of
		// being silently treated as a value-less key.
		if let Some((key, value)) = url::form_urlencoded::parse(segment.as_bytes()).next() {
			pairs.insert(key.into_owned(), value.into_owned());
		}
	}

	Ok(pairs)
}

fn declined(pairs: &BTreeMap<String, String>) -> Option<BrokerErrorResponse> {
	let description = pairs.get(fields::ERROR_DESCRIPTION).cloned();

	if let Some(code) = pairs.get(fields::ERROR) {
		return Some(BrokerErrorResponse { code: code.clone(), description });
	}

	// A bare description is still an explicit decline; the broker just failed
	// to attach a code.
	description.map(|description| BrokerErrorResponse {
		code: fields::BROKER_ERROR_CODE.to_owned(),
		description: Some(description),
	})
}

// Some broker builds send the literal "(null)" where the code belongs instead
// of an error field.
fn null_code(pairs: &BTreeMap<String, String>) -> bool {
	pairs
		.get(fields::CODE)
		.is_some_and(|code| code.eq_ignore_ascii_case(fields::NULL_PLACEHOLDER))
}

fn hash_matches(expected: &str, actual: &str) -> bool {
	// Brokers format the digest with dash separators and varying case.
	expected.replace('-', "").eq_ignore_ascii_case(actual)
}

fn token_response(
	pairs: &BTreeMap<String, String>,
) -> Result<BrokerTokenResponse, BrokerProtocolError> {
	let access_token = pairs
		.get(fields::ACCESS_TOKEN)
		.ok_or(BrokerProtocolError::MalformedResponse { reason: "missing access_token field" })?;
	let expires_in = match pairs.get(fields::EXPIRES_IN) {
		Some(seconds) => Duration::seconds(seconds.parse().map_err(|_| {
			BrokerProtocolError::MalformedResponse { reason: "non-numeric expires_in field" }
		})?),
		None => DEFAULT_EXPIRES_IN,
	};

	Ok(BrokerTokenResponse {
		access_token: TokenSecret::new(access_token),
		expires_in,
		id_token: pairs.get(fields::ID_TOKEN).map(TokenSecret::new),
		refresh_token: pairs.get(fields::REFRESH_TOKEN).map(TokenSecret::new),
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::{IdentityDecryptor, sealed_broker_response};

	fn plaintext() -> String {
		"access_token=at-1&expires_in=1800&id_token=idt-1&refresh_token=rt-1".to_owned()
	}

	struct PanickingDecryptor;
	impl BrokerResponseDecryptor for PanickingDecryptor {
		fn decrypt(&self, _: &str) -> Result<String, Box<dyn StdError + Send + Sync>> {
			panic!("Decryption must not run for declined responses.");
		}
	}

	#[test]
	fn verified_token_response_extracts_all_fields() {
		let raw = sealed_broker_response(&plaintext());
		let response =
			verify(&raw, &IdentityDecryptor).expect("Sealed response should verify.");
		let BrokerResponse::Token(token) = response else {
			panic!("Expected a token outcome.");
		};

		assert_eq!(token.access_token.expose(), "at-1");
		assert_eq!(token.expires_in, Duration::seconds(1_800));
		assert_eq!(token.id_token.expect("ID token should be present.").expose(), "idt-1");
		assert_eq!(
			token.refresh_token.expect("Refresh token should be present.").expose(),
			"rt-1"
		);
	}

	#[test]
	fn explicit_error_short_circuits_before_decryption() {
		let response = verify(
			"error=invalid_grant&error_description=the%20grant%20expired",
			&PanickingDecryptor,
		)
		.expect("Declined response should still normalize.");
		let BrokerResponse::Error(error) = response else {
			panic!("Expected an error outcome.");
		};

		assert_eq!(error.code, "invalid_grant");
		assert_eq!(error.description.as_deref(), Some("the grant expired"));
		assert!(!error.is_hash_mismatch());
	}

	#[test]
	fn hash_mismatch_is_a_distinguishable_error() {
		let raw = format!("hash={}&response={}", response_hash("something else"), plaintext());
		let response = verify(&raw, &IdentityDecryptor)
			.expect("Tampered response should normalize to an error.");
		let BrokerResponse::Error(error) = response else {
			panic!("Expected an error outcome.");
		};

		assert!(error.is_hash_mismatch());
		assert_eq!(error.code, fields::HASH_MISMATCH_CODE);
	}

	#[test]
	fn expected_hash_tolerates_dashes_and_case() {
		let body = plaintext();
		let dashed = response_hash(&body)
			.to_uppercase()
			.chars()
			.enumerate()
			.flat_map(|(i, c)| if i > 0 && i % 8 == 0 { vec!['-', c] } else { vec![c] })
			.collect::<String>();
		let raw = format!(
			"hash={}&response={}",
			url::form_urlencoded::byte_serialize(dashed.as_bytes()).collect::<String>(),
			url::form_urlencoded::byte_serialize(body.as_bytes()).collect::<String>()
		);

		assert!(matches!(
			verify(&raw, &IdentityDecryptor),
			Ok(BrokerResponse::Token(_))
		));
	}

	#[test]
	fn bare_error_description_is_still_a_decline() {
		let response = verify("error_description=something%20went%20wrong", &PanickingDecryptor)
			.expect("Description-only decline should still normalize.");
		let BrokerResponse::Error(error) = response else {
			panic!("Expected an error outcome.");
		};

		assert_eq!(error.code, fields::BROKER_ERROR_CODE);
		assert_eq!(error.description.as_deref(), Some("something went wrong"));
	}

	#[test]
	fn outer_null_code_overrides_a_sealed_payload() {
		// Case-insensitive placeholder next to an otherwise valid sealed
		// payload; the null-code signal must win without any decryption.
		let raw = format!(
			"code=(NULL)&{}",
			sealed_broker_response("access_token=at-1&expires_in=3600")
		);
		let response = verify(&raw, &PanickingDecryptor)
			.expect("Null-code response should normalize to an error.");
		let BrokerResponse::Error(error) = response else {
			panic!("Expected an error outcome.");
		};

		assert_eq!(error.code, fields::BROKER_ERROR_CODE);
		assert!(error.description.is_none());
	}

	#[test]
	fn null_code_placeholder_synthesizes_generic_error() {
		let raw = sealed_broker_response("code=(null)");
		let response =
			verify(&raw, &IdentityDecryptor).expect("Placeholder response should normalize.");
		let BrokerResponse::Error(error) = response else {
			panic!("Expected an error outcome.");
		};

		assert_eq!(error.code, fields::BROKER_ERROR_CODE);
		assert!(error.description.is_none());
	}

	#[test]
	fn pair_without_separator_is_malformed() {
		assert!(matches!(
			verify("error&hash=x", &IdentityDecryptor),
			Err(BrokerProtocolError::MalformedResponse { .. })
		));
	}

	#[test]
	fn missing_protocol_fields_are_malformed() {
		assert!(matches!(
			verify("response=abc", &IdentityDecryptor),
			Err(BrokerProtocolError::MalformedResponse { reason: "missing hash field" })
		));
		assert!(matches!(
			verify("hash=abc", &IdentityDecryptor),
			Err(BrokerProtocolError::MalformedResponse { reason: "missing response field" })
		));
	}

	#[test]
	fn decryption_failure_is_not_retried_as_plaintext() {
		struct FailingDecryptor;
		impl BrokerResponseDecryptor for FailingDecryptor {
			fn decrypt(&self, _: &str) -> Result<String, Box<dyn StdError + Send + Sync>> {
				Err("device key unavailable".into())
			}
		}

		let raw = sealed_broker_response(&plaintext());

		assert!(matches!(
			verify(&raw, &FailingDecryptor),
			Err(BrokerProtocolError::DecryptionFailed { .. })
		));
	}

	#[test]
	fn missing_expires_in_falls_back_to_default_lifetime() {
		let raw = sealed_broker_response("access_token=at-1");
		let response = verify(&raw, &IdentityDecryptor).expect("Response should verify.");
		let BrokerResponse::Token(token) = response else {
			panic!("Expected a token outcome.");
		};

		assert_eq!(token.expires_in, DEFAULT_EXPIRES_IN);
	}
}
