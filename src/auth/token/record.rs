//! Immutable token record structs, lifecycle helpers, and builders.

// self
use crate::{_prelude::*, auth::ScopeSet, auth::token::secret::TokenSecret};

/// Current lifecycle status for a token record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token is currently valid.
	Active,
	/// Token exceeded its expiry instant.
	Expired,
}

/// Errors produced by [`TokenRecordBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenRecordBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
}

/// Immutable record describing tokens issued for one client + scope combination.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TokenRecord {
	/// Normalized scopes granted to this record.
	pub scope: ScopeSet,
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// ID token secret, if the provider issued one.
	pub id_token: Option<TokenSecret>,
	/// Refresh token secret, if the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Issued-at instant recorded from the provider response.
	pub issued_at: OffsetDateTime,
	/// Expiry instant derived from issued_at plus expires_in or absolute expiry.
	pub expires_at: OffsetDateTime,
}
impl TokenRecord {
	/// Returns a builder for constructing records.
	pub fn builder(scope: ScopeSet) -> TokenRecordBuilder {
		TokenRecordBuilder::new(scope)
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		if instant >= self.expires_at {
			return TokenStatus::Expired;
		}

		TokenStatus::Active
	}

	/// Returns `true` if the record has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), TokenStatus::Expired)
	}

	/// Returns `true` if the record is expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}
}
impl Debug for TokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRecord")
			.field("scope", &self.scope)
			.field("access_token", &"<redacted>")
			.field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`TokenRecord`].
#[derive(Clone, Debug)]
pub struct TokenRecordBuilder {
	scope: ScopeSet,
	access_token: Option<TokenSecret>,
	id_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl TokenRecordBuilder {
	fn new(scope: ScopeSet) -> Self {
		Self {
			scope,
			access_token: None,
			id_token: None,
			refresh_token: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
		}
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the ID token value.
	pub fn id_token(mut self, token: impl Into<String>) -> Self {
		self.id_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Consumes the builder and produces a [`TokenRecord`].
	pub fn build(self) -> Result<TokenRecord, TokenRecordBuilderError> {
		let access_token = self.access_token.ok_or(TokenRecordBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at + delta,
			(None, None) => return Err(TokenRecordBuilderError::MissingExpiry),
		};

		Ok(TokenRecord {
			scope: self.scope,
			access_token,
			id_token: self.id_token,
			refresh_token: self.refresh_token,
			issued_at,
			expires_at,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn scope() -> ScopeSet {
		ScopeSet::new(["user.read"]).expect("Scope fixture should be valid.")
	}

	#[test]
	fn builder_handles_relative_expiry() {
		let record = TokenRecord::builder(scope())
			.access_token("secret")
			.issued_at(macros::datetime!(2026-01-01 00:00 UTC))
			.expires_in(Duration::minutes(30))
			.build()
			.expect("Token record builder should support relative expiry.");

		assert_eq!(record.expires_at, macros::datetime!(2026-01-01 00:30 UTC));
		assert!(!record.is_expired_at(macros::datetime!(2026-01-01 00:29 UTC)));
		assert!(record.is_expired_at(macros::datetime!(2026-01-01 00:30 UTC)));
	}

	#[test]
	fn builder_requires_access_token_and_expiry() {
		assert_eq!(
			TokenRecord::builder(scope()).expires_in(Duration::hours(1)).build(),
			Err(TokenRecordBuilderError::MissingAccessToken)
		);
		assert_eq!(
			TokenRecord::builder(scope()).access_token("secret").build(),
			Err(TokenRecordBuilderError::MissingExpiry)
		);
	}

	#[test]
	fn debug_redacts_secrets() {
		let record = TokenRecord::builder(scope())
			.access_token("at-value-1")
			.id_token("idt-value-1")
			.refresh_token("rt-value-1")
			.expires_in(Duration::hours(1))
			.build()
			.expect("Token record fixture should build.");
		let rendered = format!("{record:?}");

		assert!(!rendered.contains("at-value-1"), "Access token value must not leak: {rendered}");
		assert!(!rendered.contains("rt-value-1"), "Refresh token value must not leak: {rendered}");
	}
}
