//! Error types shared across authority resolution, broker delegation, and cache keys.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Authority endpoint resolution failure.
	#[error(transparent)]
	Authority(#[from] crate::authority::AuthorityError),
	/// Broker protocol failure (malformed, undecryptable, or undeliverable response).
	#[error(transparent)]
	BrokerProtocol(#[from] crate::broker::BrokerProtocolError),
	/// Cache-key attribute validation failure.
	#[error(transparent)]
	Key(#[from] crate::store::KeyError),
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(#[from] crate::store::StoreError),
	/// Requested scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeNormalizationError),
	/// Identifier validation failed.
	#[error(transparent)]
	Identifier(#[from] crate::auth::IdentifierError),
	/// Token record builder validation failed.
	#[error("Unable to build token record.")]
	TokenBuild(#[from] crate::auth::TokenRecordBuilderError),

	/// No broker is available on this platform or the broker cannot be invoked.
	#[error("Broker cannot be invoked on this platform.")]
	BrokerUnavailable,
	/// The broker completed the exchange but declined the request.
	///
	/// Distinct from [`Error::BrokerProtocol`]: a declined request is a well-formed,
	/// verified answer from the broker, while protocol failures indicate a tampered
	/// or corrupted response.
	#[error("Broker declined the request: {code}: {description}.")]
	BrokerDeclined {
		/// Stable error code reported by the broker.
		code: String,
		/// Human-readable description reported by the broker.
		description: String,
	},
}
