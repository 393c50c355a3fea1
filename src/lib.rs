//! Request-execution core for an OAuth 2.0/OIDC identity client—authority endpoint
//! resolution with caching, verified broker delegation, and platform-aware token cache keys.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod authority;
pub mod broker;
pub mod error;
pub mod flows;
pub mod obs;
pub mod store;
pub mod telemetry;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience fakes and helpers for tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use crate::{
		authority::{AuthorityError, DiscoveryClient, DiscoveryDocument, DiscoveryFuture},
		broker::{
			BrokerFuture, BrokerPayload, BrokerProtocolError, BrokerResponseDecryptor,
			BrokerTransport, response_hash,
		},
		telemetry::{TelemetryEvent, TelemetryReceiver},
	};

	/// Discovery client that serves a fixed document and counts invocations.
	#[derive(Debug)]
	pub struct StaticDiscoveryClient {
		/// Document returned for every fetch.
		pub document: DiscoveryDocument,
		calls: AtomicUsize,
	}
	impl StaticDiscoveryClient {
		/// Wraps the provided document.
		pub fn new(document: DiscoveryDocument) -> Self {
			Self { document, calls: AtomicUsize::new(0) }
		}

		/// Returns the number of discovery calls observed so far.
		pub fn call_count(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl DiscoveryClient for StaticDiscoveryClient {
		fn fetch_configuration<'a>(&'a self, _url: &'a Url) -> DiscoveryFuture<'a> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			let document = self.document.clone();

			Box::pin(async move { Ok::<_, AuthorityError>(document) })
		}
	}

	/// Broker transport that replays a canned raw response message.
	#[derive(Clone, Debug)]
	pub struct StaticBrokerTransport {
		/// Raw response message handed back for every invocation.
		pub response: String,
		/// Whether the broker reports itself as invocable.
		pub invocable: bool,
	}
	impl StaticBrokerTransport {
		/// Wraps a canned response message.
		pub fn new(response: impl Into<String>) -> Self {
			Self { response: response.into(), invocable: true }
		}
	}
	impl BrokerTransport for StaticBrokerTransport {
		fn can_invoke_broker(&self) -> bool {
			self.invocable
		}

		fn acquire_token_using_broker<'a>(
			&'a self,
			_payload: &'a BrokerPayload,
		) -> BrokerFuture<'a, String> {
			let response = self.response.clone();

			Box::pin(async move { Ok::<_, BrokerProtocolError>(response) })
		}
	}

	/// Decryptor fake that treats the ciphertext as the plaintext.
	#[derive(Clone, Copy, Debug, Default)]
	pub struct IdentityDecryptor;
	impl BrokerResponseDecryptor for IdentityDecryptor {
		fn decrypt(
			&self,
			ciphertext: &str,
		) -> Result<String, Box<dyn StdError + Send + Sync + 'static>> {
			Ok(ciphertext.to_owned())
		}
	}

	/// Telemetry receiver that records every flushed batch.
	#[derive(Debug, Default)]
	pub struct RecordingReceiver(pub Mutex<Vec<Vec<TelemetryEvent>>>);
	impl RecordingReceiver {
		/// Returns a copy of the recorded batches.
		pub fn batches(&self) -> Vec<Vec<TelemetryEvent>> {
			self.0.lock().clone()
		}
	}
	impl TelemetryReceiver for RecordingReceiver {
		fn receive(&self, events: Vec<TelemetryEvent>) {
			self.0.lock().push(events);
		}
	}

	/// Builds a verifiable broker success message from plaintext token fields.
	///
	/// The "encryption" is the identity transform so the message pairs with
	/// [`IdentityDecryptor`]; the hash field carries the real digest of the plaintext.
	pub fn sealed_broker_response(plaintext: &str) -> String {
		let mut serializer = url::form_urlencoded::Serializer::new(String::new());

		serializer.append_pair("hash", &response_hash(plaintext));
		serializer.append_pair("response", plaintext);

		serializer.finish()
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, HashSet},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::Client as ReqwestClient;
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
