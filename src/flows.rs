//! Broker facade and the flows it exposes.
//!
//! A [`Broker`] is one application identity: it owns the identity fields, one
//! [`CredentialCache`] per [`CredentialClass`], the callback allow-list, and the collaborators
//! used to reach the network and the webhook crypto library. Clones share all of that state.

pub mod retry;

mod access_token;
mod allow_list;
mod signature;
mod ticket;
mod webhook;

pub use retry::*;

// self
use crate::{
	_prelude::*,
	allowlist::IpAllowList,
	auth::{AppIdentity, CredentialClass, TicketKind},
	cache::CredentialCache,
	clock::{Clock, SystemClock},
	http::CorpApi,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	webhook::MessageCrypto,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestCorpApi;

#[cfg(feature = "reqwest")]
/// Broker specialized for the crate's default reqwest transport.
pub type ReqwestBroker = Broker<ReqwestCorpApi>;

/// Credential lifecycle broker for one application identity.
pub struct Broker<A>
where
	A: ?Sized + CorpApi,
{
	/// Immutable identity fields.
	pub identity: Arc<AppIdentity>,
	/// Network collaborator used for every fetch and API call.
	pub api: Arc<A>,
	/// Optional webhook crypto collaborator.
	pub crypto: Option<Arc<dyn MessageCrypto>>,
	/// Invalid-credential retry budget and backoff.
	pub retry_policy: RetryPolicy,
	clock: Arc<dyn Clock>,
	caches: Arc<Caches>,
	allow_list: Arc<IpAllowList>,
}
impl<A> Broker<A>
where
	A: ?Sized + CorpApi,
{
	/// Creates a broker for `identity` that reaches the network through `api`.
	pub fn with_api(identity: AppIdentity, api: impl Into<Arc<A>>) -> Self {
		let clock: Arc<dyn Clock> = Arc::new(SystemClock);

		Self {
			identity: Arc::new(identity),
			api: api.into(),
			crypto: None,
			retry_policy: RetryPolicy::default(),
			caches: Arc::new(Caches::new(&clock)),
			clock,
			allow_list: Default::default(),
		}
	}

	/// Replaces the time source.
	///
	/// Caches are rebuilt empty so every record is stamped by the same clock; call this while
	/// configuring the broker.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.caches = Arc::new(Caches::new(&clock));
		self.clock = clock;

		self
	}

	/// Overrides the invalid-credential retry policy.
	pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
		self.retry_policy = policy;

		self
	}

	/// Attaches the webhook crypto collaborator.
	pub fn with_crypto(mut self, crypto: Arc<dyn MessageCrypto>) -> Self {
		self.crypto = Some(crypto);

		self
	}

	/// Cache serving `class`.
	pub fn cache(&self, class: CredentialClass) -> &CredentialCache {
		self.caches.get(class)
	}

	/// Callback source allow-list.
	pub fn allow_list(&self) -> &IpAllowList {
		&self.allow_list
	}

	/// Time source in use.
	pub fn clock(&self) -> &dyn Clock {
		self.clock.as_ref()
	}
}
#[cfg(feature = "reqwest")]
impl Broker<ReqwestCorpApi> {
	/// Creates a broker backed by a reqwest transport pointed at the public API.
	pub fn new(identity: AppIdentity) -> Result<Self> {
		Ok(Self::with_api(identity, ReqwestCorpApi::new()?))
	}
}
impl<A> Clone for Broker<A>
where
	A: ?Sized + CorpApi,
{
	fn clone(&self) -> Self {
		Self {
			identity: self.identity.clone(),
			api: self.api.clone(),
			crypto: self.crypto.clone(),
			retry_policy: self.retry_policy.clone(),
			clock: self.clock.clone(),
			caches: self.caches.clone(),
			allow_list: self.allow_list.clone(),
		}
	}
}
impl<A> Debug for Broker<A>
where
	A: ?Sized + CorpApi,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("identity", &self.identity)
			.field("crypto_set", &self.crypto.is_some())
			.field("retry_policy", &self.retry_policy)
			.field("caches", &self.caches)
			.field("allow_list_len", &self.allow_list.len())
			.finish()
	}
}

#[derive(Debug)]
struct Caches {
	access_token: CredentialCache,
	default_ticket: CredentialCache,
	agent_ticket: CredentialCache,
}
impl Caches {
	fn new(clock: &Arc<dyn Clock>) -> Self {
		let cache = |class| CredentialCache::with_clock(class, clock.clone());

		Self {
			access_token: cache(CredentialClass::AccessToken),
			default_ticket: cache(CredentialClass::Ticket(TicketKind::Default)),
			agent_ticket: cache(CredentialClass::Ticket(TicketKind::AgentScoped)),
		}
	}

	fn get(&self, class: CredentialClass) -> &CredentialCache {
		match class {
			CredentialClass::AccessToken => &self.access_token,
			CredentialClass::Ticket(TicketKind::Default) => &self.default_ticket,
			CredentialClass::Ticket(TicketKind::AgentScoped) => &self.agent_ticket,
		}
	}
}

/// Runs `fut` inside a flow span and records its attempt and outcome.
async fn observed<T, Fut>(kind: FlowKind, stage: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = FlowSpan::new(kind, stage);

	obs::record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = span.instrument(fut).await;

	obs::record_flow_outcome(kind, FlowOutcome::of(&result));

	result
}
