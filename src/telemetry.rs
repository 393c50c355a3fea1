//! Per-request telemetry correlation and dispatch.
//!
//! Each logical request owns one [`RequestTelemetryContext`]; events append in
//! call order and are handed to the configured receiver exactly once at flush.
//! There is no global event table, so orphaned events cannot exist and nothing
//! needs sweeping.

// self
use crate::{_prelude::*, auth::CorrelationId};

/// Event and property names of the telemetry schema.
pub mod schema {
	/// Name of the top-level API event describing a whole request.
	pub const API_EVENT: &str = "api_event";
	/// Name of the process-identity record prefixed to every dispatched batch.
	pub const CLIENT_IDENTITY_EVENT: &str = "client_identity";
	/// Property marking whether the API call succeeded.
	pub const WAS_SUCCESSFUL: &str = "was_successful";
	/// Property carrying the request correlation id.
	pub const CORRELATION_ID: &str = "correlation_id";
	/// Property carrying the client application id.
	pub const CLIENT_ID: &str = "client_id";
	/// Property carrying the library version.
	pub const CLIENT_VERSION: &str = "client_version";
	/// Property carrying the executed flow kind.
	pub const FLOW: &str = "flow";
}

/// One telemetry record: a name plus ordered string properties.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryEvent {
	/// Event name from [`schema`].
	pub name: String,
	/// Event properties.
	pub properties: BTreeMap<String, String>,
}
impl TelemetryEvent {
	/// Creates an empty event with the provided name.
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into(), properties: BTreeMap::new() }
	}

	/// Creates a top-level API event.
	pub fn api() -> Self {
		Self::new(schema::API_EVENT)
	}

	/// Sets a property, replacing any previous value.
	pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.properties.insert(key.into(), value.into());

		self
	}

	/// Marks the API outcome on this event.
	pub fn with_success(self, was_successful: bool) -> Self {
		self.with(schema::WAS_SUCCESSFUL, if was_successful { "true" } else { "false" })
	}

	/// Returns true if this is an API event recorded as successful.
	pub fn is_successful_api(&self) -> bool {
		self.name == schema::API_EVENT
			&& self.properties.get(schema::WAS_SUCCESSFUL).is_some_and(|value| value == "true")
	}
}

/// Receives completed event batches; transmission is out of scope here.
pub trait TelemetryReceiver
where
	Self: Send + Sync,
{
	/// Accepts one flushed batch.
	fn receive(&self, events: Vec<TelemetryEvent>);
}

/// Telemetry state owned by a single logical request.
///
/// Not shared across requests. Flushing closes the context; a closed context
/// silently ignores further events because late events after dispatch have no
/// batch to join.
pub struct RequestTelemetryContext {
	receiver: Option<Arc<dyn TelemetryReceiver>>,
	failures_only: bool,
	client_id: String,
	correlation_id: CorrelationId,
	events: Vec<TelemetryEvent>,
	closed: bool,
}
impl RequestTelemetryContext {
	/// Creates a context for one request.
	///
	/// With `failures_only` set, batches whose API event completed successfully
	/// are discarded at flush instead of dispatched.
	pub fn new(
		receiver: Option<Arc<dyn TelemetryReceiver>>,
		failures_only: bool,
		client_id: impl Into<String>,
		correlation_id: CorrelationId,
	) -> Self {
		Self {
			receiver,
			failures_only,
			client_id: client_id.into(),
			correlation_id,
			events: Vec::new(),
			closed: false,
		}
	}

	/// Appends an event, stamping it with the request correlation id.
	///
	/// No-op once the context is flushed.
	pub fn add_event(&mut self, event: TelemetryEvent) {
		if self.closed {
			return;
		}

		self.events
			.push(event.with(schema::CORRELATION_ID, &*self.correlation_id));
	}

	/// Dispatches the collected batch to the receiver and closes the context.
	///
	/// Without a receiver this only closes the context. The process-identity
	/// record is prefixed to the batch so receivers can attribute every batch
	/// without out-of-band state. Flushing twice dispatches nothing twice.
	pub fn flush(&mut self) {
		if self.closed {
			return;
		}

		self.closed = true;

		let events = std::mem::take(&mut self.events);
		let Some(receiver) = self.receiver.take() else {
			return;
		};

		if self.failures_only && events.iter().any(TelemetryEvent::is_successful_api) {
			return;
		}

		let mut batch = Vec::with_capacity(events.len() + 1);

		batch.push(
			TelemetryEvent::new(schema::CLIENT_IDENTITY_EVENT)
				.with(schema::CLIENT_ID, &self.client_id)
				.with(schema::CLIENT_VERSION, env!("CARGO_PKG_VERSION")),
		);
		batch.extend(events);
		receiver.receive(batch);
	}
}
impl Debug for RequestTelemetryContext {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestTelemetryContext")
			.field("failures_only", &self.failures_only)
			.field("client_id", &self.client_id)
			.field("correlation_id", &self.correlation_id)
			.field("events", &self.events.len())
			.field("closed", &self.closed)
			.finish()
	}
}
