//! Scope normalization shared by cache keys and broker payloads.

// std
use std::collections::BTreeSet;
// self
use crate::_prelude::*;

/// Errors emitted when normalizing scopes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ScopeNormalizationError {
	/// The requested scope set is empty after normalization.
	#[error("Scope set is empty after normalization.")]
	EmptySet,
	/// Empty scope entries are not allowed.
	#[error("Scope entries cannot be empty.")]
	EmptyEntry,
	/// Scopes cannot contain embedded whitespace characters.
	#[error("Scope contains whitespace: {scope}.")]
	ContainsWhitespace {
		/// The offending scope string.
		scope: String,
	},
}

/// Normalized set of OAuth scopes.
///
/// Entries are lower-cased, deduplicated, and sorted alphabetically so the
/// space-joined form is stable across processes. Cache keys and the broker
/// `request_scopes` field both rely on this canonical ordering.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeSet(Arc<[String]>);
impl ScopeSet {
	/// Creates a normalized scope set from any iterator of scope strings.
	pub fn new<I, S>(scopes: I) -> Result<Self, ScopeNormalizationError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut set = BTreeSet::new();

		for scope in scopes {
			let owned: String = scope.into();

			if owned.is_empty() {
				return Err(ScopeNormalizationError::EmptyEntry);
			}
			if owned.chars().any(char::is_whitespace) {
				return Err(ScopeNormalizationError::ContainsWhitespace { scope: owned });
			}

			set.insert(owned.to_lowercase());
		}

		Ok(Self(Arc::from(set.into_iter().collect::<Vec<_>>())))
	}

	/// Number of distinct scopes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true if no scopes are defined.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Returns true if the normalized set contains the provided scope.
	pub fn contains(&self, scope: &str) -> bool {
		self.0.binary_search_by(|candidate| candidate.as_str().cmp(scope)).is_ok()
	}

	/// Iterator over normalized scopes.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(|s| s.as_str())
	}

	/// Returns the normalized string representation (space-delimited, lower-cased, sorted).
	pub fn normalized(&self) -> String {
		self.0.join(" ")
	}
}
impl Debug for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ScopeSet").field(&self.0).finish()
	}
}
impl Display for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.normalized())
	}
}
impl FromStr for ScopeSet {
	type Err = ScopeNormalizationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.is_empty() {
			return Ok(Self::default());
		}
		if s.chars().all(char::is_whitespace) {
			return Err(ScopeNormalizationError::EmptyEntry);
		}

		Self::new(s.split_whitespace())
	}
}
impl TryFrom<Vec<String>> for ScopeSet {
	type Error = ScopeNormalizationError;

	fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl Serialize for ScopeSet {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		serializer.collect_seq(self.0.iter())
	}
}
impl<'de> Deserialize<'de> for ScopeSet {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		let values = <Vec<String>>::deserialize(deserializer)?;

		ScopeSet::new(values).map_err(serde::de::Error::custom)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn scopes_lowercase_sort_and_deduplicate() {
		let scopes = ScopeSet::new(["User.Read", "openid", "user.read"])
			.expect("Scope fixture should be valid.");

		assert_eq!(scopes.normalized(), "openid user.read");
		assert_eq!(scopes.len(), 2);
		assert!(scopes.contains("user.read"));
	}

	#[test]
	fn equal_sets_regardless_of_input_order() {
		let lhs = ScopeSet::new(["profile", "email"]).expect("Left scope set should be valid.");
		let rhs = ScopeSet::new(["EMAIL", "profile"]).expect("Right scope set should be valid.");

		assert_eq!(lhs, rhs);
		assert_eq!(lhs.normalized(), rhs.normalized());
	}

	#[test]
	fn invalid_scopes_error() {
		assert!(ScopeSet::new([""]).is_err());
		assert!(ScopeSet::new(["contains space"]).is_err());
		assert!(ScopeSet::from_str("   ").is_err());
		assert!(ScopeSet::from_str("").is_ok(), "Empty string represents an empty scope set.");
	}

	#[test]
	fn serde_round_trip() {
		let scopes = ScopeSet::new(["openid", "profile"]).expect("Scope fixture should be valid.");
		let payload = serde_json::to_string(&scopes).expect("Scope set should serialize.");

		assert_eq!(payload, "[\"openid\",\"profile\"]");

		let round_trip: ScopeSet =
			serde_json::from_str(&payload).expect("Scope set should deserialize.");

		assert_eq!(round_trip, scopes);
	}
}
