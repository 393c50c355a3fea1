//! Shared fakes for broker flow integration tests.

// crates.io
use parking_lot::Mutex;
// self
use identity_broker::{
	authority::{AuthorityError, DiscoveryClient, DiscoveryDocument, DiscoveryFuture},
	broker::{
		BrokerFuture, BrokerPayload, BrokerProtocolError, BrokerResponseDecryptor,
		BrokerTransport, response_hash,
	},
	telemetry::{TelemetryEvent, TelemetryReceiver},
	url::{Url, form_urlencoded},
};

/// Discovery client that serves one fixed document for every authority.
pub struct FixedDiscovery(pub DiscoveryDocument);
impl DiscoveryClient for FixedDiscovery {
	fn fetch_configuration<'a>(&'a self, _url: &'a Url) -> DiscoveryFuture<'a> {
		let document = self.0.clone();

		Box::pin(async move { Ok::<_, AuthorityError>(document) })
	}
}

/// Transport that replays one canned raw response message.
pub struct ScriptedTransport(pub String);
impl BrokerTransport for ScriptedTransport {
	fn can_invoke_broker(&self) -> bool {
		true
	}

	fn acquire_token_using_broker<'a>(
		&'a self,
		_payload: &'a BrokerPayload,
	) -> BrokerFuture<'a, String> {
		let response = self.0.clone();

		Box::pin(async move { Ok::<_, BrokerProtocolError>(response) })
	}
}

/// Decryptor whose "encryption" is the identity transform; pairs with [`seal`].
pub struct PlainDecryptor;
impl BrokerResponseDecryptor for PlainDecryptor {
	fn decrypt(
		&self,
		ciphertext: &str,
	) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
		Ok(ciphertext.to_owned())
	}
}

/// Receiver that records every flushed batch for inspection.
#[derive(Default)]
pub struct CapturingReceiver(Mutex<Vec<Vec<TelemetryEvent>>>);
impl CapturingReceiver {
	pub fn batches(&self) -> Vec<Vec<TelemetryEvent>> {
		self.0.lock().clone()
	}
}
impl TelemetryReceiver for CapturingReceiver {
	fn receive(&self, events: Vec<TelemetryEvent>) {
		self.0.lock().push(events);
	}
}

/// Builds a verifiable broker success message around the plaintext token form.
pub fn seal(plaintext: &str) -> String {
	let mut serializer = form_urlencoded::Serializer::new(String::new());

	serializer.append_pair("hash", &response_hash(plaintext));
	serializer.append_pair("response", plaintext);

	serializer.finish()
}
