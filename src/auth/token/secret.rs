//! Secure token secret wrapper that redacts and zeroes sensitive material.

// self
use crate::_prelude::*;

/// Redacted token secret that zeroes its buffer on drop.
///
/// Formatting never prints the inner value, and the backing bytes are
/// overwritten with zeroes on every exit path, including error paths, because
/// release happens in [`Drop`] rather than an explicit cleanup call.
#[derive(Default)]
pub struct TokenSecret(Vec<u8>);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into().into_bytes())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		// The buffer only ever holds bytes of a `String`, so it stays valid UTF-8.
		std::str::from_utf8(&self.0).unwrap_or_default()
	}
}
impl Drop for TokenSecret {
	fn drop(&mut self) {
		self.0.fill(0);
	}
}
impl Clone for TokenSecret {
	fn clone(&self) -> Self {
		Self(self.0.clone())
	}
}
impl PartialEq for TokenSecret {
	fn eq(&self, other: &Self) -> bool {
		self.0 == other.0
	}
}
impl Eq for TokenSecret {}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl From<&str> for TokenSecret {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
impl Serialize for TokenSecret {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		serializer.serialize_str(self.expose())
	}
}
impl<'de> Deserialize<'de> for TokenSecret {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		Ok(Self::new(String::deserialize(deserializer)?))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn secret_formatters_redact() {
		let secret = TokenSecret::new("super-secret");

		assert_eq!(format!("{secret:?}"), "TokenSecret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
		assert_eq!(secret.expose(), "super-secret");
	}

	#[test]
	fn serde_round_trips_plain_value() {
		let secret = TokenSecret::new("value");
		let payload = serde_json::to_string(&secret).expect("Secret should serialize.");

		assert_eq!(payload, "\"value\"");

		let round_trip: TokenSecret =
			serde_json::from_str(&payload).expect("Secret should deserialize.");

		assert_eq!(round_trip, secret);
	}
}
