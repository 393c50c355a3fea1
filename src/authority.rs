//! Authority modeling, OpenID configuration discovery, and endpoint resolution.
//!
//! `info` models canonical authorities and their kind; `discovery` defines the
//! discovery-document fetch boundary; `resolver` owns the process-lifetime
//! endpoint cache with per-domain validity tracking for federated authorities.

pub mod discovery;
pub mod info;
pub mod resolver;

pub use discovery::*;
pub use info::*;
pub use resolver::*;

// self
use crate::_prelude::*;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Errors raised during authority canonicalization and endpoint resolution.
#[derive(Debug, ThisError)]
pub enum AuthorityError {
	/// Authority URI cannot be parsed.
	#[error("Authority URI is invalid.")]
	InvalidAuthorityUri {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Authority URI carries no tenant path segment.
	#[error("Authority URI is missing the tenant path segment.")]
	MissingTenant,
	/// Federated authority resolution requires a principal hint.
	#[error("A user principal (user@domain) is required to validate a federated authority.")]
	MissingPrincipalHint,
	/// The discovery document omitted a required field.
	#[error("Tenant discovery failed: {field} was not found in the OpenID configuration.")]
	TenantDiscoveryFailed {
		/// Name of the missing discovery-document field.
		field: &'static str,
	},
	/// The discovery document carried an endpoint that is not a valid URL.
	#[error("Tenant discovery returned an invalid {field} URL.")]
	InvalidDiscoveryEndpoint {
		/// Name of the malformed discovery-document field.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Transport-level failure while fetching the discovery document.
	#[error("OpenID configuration could not be fetched.")]
	Discovery {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// The discovery document could not be parsed as JSON.
	#[error("OpenID configuration returned malformed JSON.")]
	DiscoveryParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl AuthorityError {
	/// Wraps a transport-specific discovery failure.
	pub fn discovery(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Discovery { source: Box::new(src) }
	}
}
