//! Platform broker transport boundary and the response rendezvous.

// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	broker::{BrokerPayload, BrokerProtocolError},
};

/// Future type returned by [`BrokerTransport`] implementations.
pub type BrokerFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, BrokerProtocolError>> + 'a + Send>>;

/// Platform boundary that launches the broker and returns its raw response.
///
/// One implementation exists per OS; the orchestrator selects one at startup
/// via platform detection and shares it behind `Arc<dyn BrokerTransport>`.
/// Implementations typically hand a [`BrokerResponseSlot`] to the OS callback
/// and await the paired [`BrokerResponseHandle`].
pub trait BrokerTransport
where
	Self: Send + Sync,
{
	/// Returns true if a broker is installed and reachable on this platform.
	fn can_invoke_broker(&self) -> bool;

	/// Launches the broker with `payload` and resolves with the raw response message.
	fn acquire_token_using_broker<'a>(
		&'a self,
		payload: &'a BrokerPayload,
	) -> BrokerFuture<'a, String>;
}

/// Creates a connected response slot/handle pair for one broker invocation.
///
/// The pair replaces any module-level static response slot: each in-flight
/// invocation owns its own rendezvous, so a later invocation can never
/// overwrite an earlier one's response.
pub fn response_rendezvous() -> (BrokerResponseSlot, BrokerResponseHandle) {
	let (tx, rx) = oneshot::channel();

	(BrokerResponseSlot(tx), BrokerResponseHandle(rx))
}

/// Producer half of the rendezvous, handed to the out-of-band OS callback.
///
/// Delivery consumes the slot, so exactly one response can ever be published
/// per invocation; that single-delivery guarantee is structural, not checked
/// at runtime.
#[derive(Debug)]
pub struct BrokerResponseSlot(oneshot::Sender<String>);
impl BrokerResponseSlot {
	/// Publishes the broker's raw response to the waiting request.
	pub fn deliver(self, raw_response: String) -> Result<(), BrokerProtocolError> {
		self.0.send(raw_response).map_err(|_| BrokerProtocolError::ResponseAbandoned)
	}
}

/// Consumer half of the rendezvous, awaited by the request thread.
#[derive(Debug)]
pub struct BrokerResponseHandle(oneshot::Receiver<String>);
impl BrokerResponseHandle {
	/// Suspends until the broker delivers its response.
	///
	/// There is no built-in timeout; cancellation is layered by the caller.
	pub async fn wait(self) -> Result<String, BrokerProtocolError> {
		self.0.await.map_err(|_| BrokerProtocolError::ResponseChannelClosed)
	}
}
