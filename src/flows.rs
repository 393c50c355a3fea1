//! Token acquisition orchestration: resolve, delegate, verify, persist.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, CorrelationId, ScopeSet, TokenRecord},
	authority::{AuthorityEndpointCache, AuthorityEndpoints, AuthorityInfo},
	broker::{
		self, BrokerKey, BrokerPayload, BrokerProtocolError, BrokerRequestKind,
		BrokerRequestParams, BrokerResponse, BrokerResponseDecryptor, BrokerTokenResponse,
		BrokerTransport,
	},
	obs::{self, RequestKind, RequestOutcome, RequestSpan},
	store::{CacheKeyAttributes, CredentialKind, TokenStore},
	telemetry::{RequestTelemetryContext, TelemetryEvent, TelemetryReceiver, schema},
};

/// One token acquisition request.
#[derive(Clone, Debug)]
pub struct TokenRequest {
	/// Target authority.
	pub authority: AuthorityInfo,
	/// Requested scopes.
	pub scopes: ScopeSet,
	/// Account hint; required for federated authorities.
	pub username: Option<String>,
	/// Per-request correlation identifier.
	pub correlation_id: CorrelationId,
	/// Whether an interactive request should force a fresh prompt.
	pub force_prompt: bool,
}
impl TokenRequest {
	/// Creates a request without an account hint or forced prompt.
	pub fn new(authority: AuthorityInfo, scopes: ScopeSet, correlation_id: CorrelationId) -> Self {
		Self { authority, scopes, username: None, correlation_id, force_prompt: false }
	}

	/// Attaches an account username hint.
	pub fn with_username(mut self, username: impl Into<String>) -> Self {
		self.username = Some(username.into());

		self
	}

	/// Forces a fresh interactive prompt even when the broker has a session.
	pub fn with_force_prompt(mut self) -> Self {
		self.force_prompt = true;

		self
	}
}

/// Coordinates token acquisition through the platform broker.
///
/// Owns every collaborator explicitly so two instances never share hidden
/// state: the endpoint cache, the platform transport, the response decryptor,
/// the token store, and the telemetry configuration all live here rather than
/// in process-global singletons. Both suspension points (endpoint discovery
/// and the broker invocation) are awaited without holding any lock; the
/// invocation guard only rejects a concurrent second broker launch.
pub struct IdentityBroker {
	endpoints: AuthorityEndpointCache,
	transport: Arc<dyn BrokerTransport>,
	decryptor: Arc<dyn BrokerResponseDecryptor>,
	store: Arc<dyn TokenStore>,
	client_id: ClientId,
	redirect_uri: Url,
	broker_key: BrokerKey,
	telemetry: Option<Arc<dyn TelemetryReceiver>>,
	telemetry_failures_only: bool,
	invocation_guard: AsyncMutex<()>,
}
impl IdentityBroker {
	/// Creates an orchestrator with freshly generated broker key material.
	pub fn new(
		endpoints: AuthorityEndpointCache,
		transport: Arc<dyn BrokerTransport>,
		decryptor: Arc<dyn BrokerResponseDecryptor>,
		store: Arc<dyn TokenStore>,
		client_id: ClientId,
		redirect_uri: Url,
	) -> Self {
		Self {
			endpoints,
			transport,
			decryptor,
			store,
			client_id,
			redirect_uri,
			broker_key: BrokerKey::generate(),
			telemetry: None,
			telemetry_failures_only: false,
			invocation_guard: AsyncMutex::new(()),
		}
	}

	/// Replaces the generated broker key, e.g. with one loaded from a keystore.
	pub fn with_broker_key(mut self, key: BrokerKey) -> Self {
		self.broker_key = key;

		self
	}

	/// Attaches a telemetry receiver.
	///
	/// With `failures_only` set, batches for successful requests are discarded
	/// at flush time instead of dispatched.
	pub fn with_telemetry(
		mut self,
		receiver: Arc<dyn TelemetryReceiver>,
		failures_only: bool,
	) -> Self {
		self.telemetry = Some(receiver);
		self.telemetry_failures_only = failures_only;

		self
	}

	/// Acquires a token interactively; the broker may surface UI.
	pub async fn acquire_token_interactive(&self, request: &TokenRequest) -> Result<TokenRecord> {
		self.execute(RequestKind::Interactive, request).await
	}

	/// Acquires a token silently; the broker must complete without UI or fail.
	pub async fn acquire_token_silent(&self, request: &TokenRequest) -> Result<TokenRecord> {
		self.execute(RequestKind::Silent, request).await
	}

	async fn execute(&self, kind: RequestKind, request: &TokenRequest) -> Result<TokenRecord> {
		let span = RequestSpan::new(kind, "acquire_token");

		obs::record_request_outcome(kind, RequestOutcome::Attempt);

		let mut telemetry = RequestTelemetryContext::new(
			self.telemetry.clone(),
			self.telemetry_failures_only,
			self.client_id.as_ref(),
			request.correlation_id.clone(),
		);
		let result = span.instrument(self.run(kind, request, &mut telemetry)).await;

		telemetry.add_event(
			TelemetryEvent::api().with(schema::FLOW, kind.as_str()).with_success(result.is_ok()),
		);
		telemetry.flush();

		match &result {
			Ok(_) => obs::record_request_outcome(kind, RequestOutcome::Success),
			Err(_) => obs::record_request_outcome(kind, RequestOutcome::Failure),
		}

		result
	}

	async fn run(
		&self,
		kind: RequestKind,
		request: &TokenRequest,
		telemetry: &mut RequestTelemetryContext,
	) -> Result<TokenRecord> {
		if !self.transport.can_invoke_broker() {
			return Err(Error::BrokerUnavailable);
		}

		// Endpoint resolution settles before any payload exists, so a
		// misconfigured authority fails without surfacing broker UI.
		let endpoints =
			self.endpoints.resolve(&request.authority, request.username.as_deref()).await?;

		telemetry.add_event(TelemetryEvent::new("authority_resolution"));

		let payload = broker::build(
			broker_kind(kind),
			&BrokerRequestParams {
				authority: &request.authority,
				scopes: &request.scopes,
				client_id: &self.client_id,
				correlation_id: &request.correlation_id,
				redirect_uri: &self.redirect_uri,
				username: request.username.as_deref(),
				broker_key: &self.broker_key,
				force_prompt: request.force_prompt,
			},
			BrokerPayload::new(),
		)?;
		let raw = {
			let Some(_in_flight) = self.invocation_guard.try_lock() else {
				return Err(BrokerProtocolError::InvocationInFlight.into());
			};

			self.transport.acquire_token_using_broker(&payload).await?
		};

		telemetry.add_event(TelemetryEvent::new("broker_invocation"));

		let token = match broker::verify(&raw, self.decryptor.as_ref())? {
			BrokerResponse::Token(token) => token,
			BrokerResponse::Error(declined) =>
				return Err(Error::BrokerDeclined {
					code: declined.code,
					description: declined.description.unwrap_or_default(),
				}),
		};

		self.persist(request, &endpoints, token).await
	}

	async fn persist(
		&self,
		request: &TokenRequest,
		endpoints: &AuthorityEndpoints,
		token: BrokerTokenResponse,
	) -> Result<TokenRecord> {
		let attributes = CacheKeyAttributes::new(
			environment_from(endpoints, &request.authority),
			Some(request.authority.tenant()),
			request.username.as_deref(),
			self.client_id.as_ref(),
			&request.scopes,
		)?;
		let key = attributes.credential_key(CredentialKind::AccessToken);
		let mut builder = TokenRecord::builder(request.scopes.clone())
			.issued_at(OffsetDateTime::now_utc())
			.expires_in(token.expires_in)
			.access_token(token.access_token.expose());

		if let Some(id_token) = &token.id_token {
			builder = builder.id_token(id_token.expose());
		}
		if let Some(refresh_token) = &token.refresh_token {
			builder = builder.refresh_token(refresh_token.expose());
		}

		let record = builder.build()?;

		self.store.save(&key, record.clone()).await?;

		Ok(record)
	}
}
impl Debug for IdentityBroker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdentityBroker")
			.field("client_id", &self.client_id)
			.field("redirect_uri", &self.redirect_uri.as_str())
			.field("telemetry_failures_only", &self.telemetry_failures_only)
			.finish()
	}
}

const fn broker_kind(kind: RequestKind) -> BrokerRequestKind {
	match kind {
		RequestKind::Interactive => BrokerRequestKind::Interactive,
		RequestKind::Silent => BrokerRequestKind::Silent,
	}
}

/// Environment (issuer host) a token should be cached under.
///
/// The discovered issuer is authoritative; the authority host only backstops
/// issuers that are not absolute URIs.
fn environment_from(endpoints: &AuthorityEndpoints, authority: &AuthorityInfo) -> String {
	Url::parse(&endpoints.self_signed_jwt_audience)
		.ok()
		.and_then(|issuer| issuer.host_str().map(str::to_lowercase))
		.unwrap_or_else(|| authority.host().to_owned())
}
