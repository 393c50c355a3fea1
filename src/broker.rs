//! Broker delegation: payload assembly, transport boundary, and response verification.
//!
//! `payload` builds the cross-process request mapping; `transport` defines the
//! platform launcher boundary plus the single-slot response rendezvous;
//! `verifier` validates, decrypts, and normalizes the broker's answer.

pub mod payload;
pub mod transport;
pub mod verifier;

pub use payload::*;
pub use transport::*;
pub use verifier::*;

// self
use crate::_prelude::*;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Protocol-level failures raised while talking to the broker.
///
/// Every variant is terminal for the response that produced it; retrying means
/// re-invoking the broker, never re-interpreting the same message.
#[derive(Debug, ThisError)]
pub enum BrokerProtocolError {
	/// The raw response could not be parsed as `&`-separated key/value pairs,
	/// or a required protocol field was absent.
	#[error("Broker response is malformed: {reason}.")]
	MalformedResponse {
		/// Short description of the offending pair or missing field.
		reason: &'static str,
	},
	/// The encrypted payload could not be decrypted with the device-bound key.
	#[error("Broker response could not be decrypted.")]
	DecryptionFailed {
		/// Failure reported by the decryptor collaborator.
		#[source]
		source: BoxError,
	},
	/// A second broker invocation was attempted while one is outstanding.
	#[error("A broker invocation is already in flight.")]
	InvocationInFlight,
	/// The response slot was dropped before the broker delivered anything.
	#[error("Broker response channel closed before a response was delivered.")]
	ResponseChannelClosed,
	/// The waiting request abandoned the slot before delivery.
	#[error("Broker response was delivered after the waiting request went away.")]
	ResponseAbandoned,
	/// Platform transport failed to launch or reach the broker.
	#[error("Broker transport failed.")]
	Transport {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
}
impl BrokerProtocolError {
	/// Wraps a decryptor collaborator failure.
	pub fn decryption_failed(src: impl Into<BoxError>) -> Self {
		Self::DecryptionFailed { source: src.into() }
	}

	/// Wraps a platform transport failure.
	pub fn transport(src: impl Into<BoxError>) -> Self {
		Self::Transport { source: src.into() }
	}
}
