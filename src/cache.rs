//! Per-class credential caches with single-flight refresh.
//!
//! A [`CredentialCache`] owns the current [`CredentialRecord`] for one [`CredentialClass`] behind
//! a short-held mutex and a [`RefreshState`] guard that admits at most one network fetch at a
//! time. Callers hand the cache a fetch closure; the cache decides whether to run it:
//!
//! - [`CredentialCache::get`] serves the cached secret while `now < expires_at` and refreshes
//!   otherwise.
//! - [`CredentialCache::force_refresh`] always asks for a refresh.
//! - A caller that loses the single-flight race never fetches. It is handed the current secret
//!   even if stale; only when no secret exists at all does it wait for the winner to land.

mod metrics;
mod state;

pub use metrics::RefreshMetrics;
pub use state::*;

// self
use crate::{
	_prelude::*,
	auth::{CredentialClass, CredentialRecord, CredentialRecordBuilderError},
	clock::{Clock, SystemClock},
	error::ConfigError,
	obs,
};

/// Secret and remote TTL returned by a successful network fetch.
#[derive(Clone, PartialEq, Eq)]
pub struct FreshCredential {
	/// Secret issued by the remote service.
	pub secret: String,
	/// Lifetime advertised by the remote service.
	pub ttl: Duration,
}
impl FreshCredential {
	/// Creates a fetch result from a secret and a TTL in seconds.
	pub fn new(secret: impl Into<String>, ttl_seconds: i64) -> Self {
		Self { secret: secret.into(), ttl: Duration::seconds(ttl_seconds) }
	}
}
impl Debug for FreshCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FreshCredential")
			.field("secret", &"<redacted>")
			.field("ttl", &self.ttl)
			.finish()
	}
}

/// Holds the current record for one credential class plus its refresh guard.
pub struct CredentialCache {
	class: CredentialClass,
	record: Mutex<Option<CredentialRecord>>,
	state: RefreshState,
	metrics: RefreshMetrics,
	clock: Arc<dyn Clock>,
}
impl CredentialCache {
	/// Creates an empty cache that reads time from the system clock.
	pub fn new(class: CredentialClass) -> Self {
		Self::with_clock(class, Arc::new(SystemClock))
	}

	/// Creates an empty cache driven by the provided clock.
	pub fn with_clock(class: CredentialClass, clock: Arc<dyn Clock>) -> Self {
		Self {
			class,
			record: Mutex::new(None),
			state: RefreshState::new(),
			metrics: RefreshMetrics::default(),
			clock,
		}
	}

	/// Credential class served by this cache.
	pub fn class(&self) -> CredentialClass {
		self.class
	}

	/// Refresh counters for this cache.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Single-flight guard for this cache.
	pub fn refresh_state(&self) -> &RefreshState {
		&self.state
	}

	/// Returns a copy of the installed record, if any.
	pub fn snapshot(&self) -> Option<CredentialRecord> {
		self.record.lock().clone()
	}

	/// Returns the cached secret when it is present and unexpired.
	pub fn usable_secret(&self) -> Option<String> {
		let now = self.clock.now();

		self.record
			.lock()
			.as_ref()
			.filter(|record| record.is_usable_at(now))
			.map(|record| record.secret.expose().to_owned())
	}

	/// Returns the cached secret regardless of expiry, unless it is absent.
	pub fn current_secret(&self) -> Option<String> {
		self.record
			.lock()
			.as_ref()
			.filter(|record| !record.is_absent())
			.map(|record| record.secret.expose().to_owned())
	}

	/// Returns the cached secret if usable, otherwise refreshes through `fetch`.
	pub async fn get<F, Fut>(&self, fetch: F) -> Result<String>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<FreshCredential>>,
	{
		if let Some(secret) = self.usable_secret() {
			return Ok(secret);
		}

		self.force_refresh(fetch).await
	}

	/// Refreshes through `fetch` unless another refresh of this class is already in flight.
	pub async fn force_refresh<F, Fut>(&self, fetch: F) -> Result<String>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<FreshCredential>>,
	{
		self.metrics.record_attempt();

		let Some(flight) = self.state.try_begin() else {
			return self.coalesce().await;
		};
		let outcome = match fetch().await {
			Ok(fresh) => self.install(fresh),
			Err(err) => Err(err),
		};

		// Release only after the record is installed so woken waiters observe it.
		drop(flight);

		match &outcome {
			Ok(_) => self.metrics.record_success(),
			Err(err) => {
				self.metrics.record_failure();
				obs::refresh_failed(self.class, err);
			},
		}

		outcome
	}

	/// Installs a freshly fetched secret, bringing its expiry forward by the safety margin.
	///
	/// An empty secret or a TTL past the representable date range is rejected with
	/// [`Error::UnusableCredential`] and leaves the current record in place. Returns the installed
	/// secret.
	pub(crate) fn install(&self, fresh: FreshCredential) -> Result<String> {
		let FreshCredential { secret, ttl } = fresh;

		if secret.is_empty() {
			return Err(self.unusable("empty secret"));
		}

		let record = CredentialRecord::builder()
			.secret(secret.clone())
			.issued_at(self.clock.now())
			.remote_ttl(ttl)
			.build()
			.map_err(|e| match e {
				CredentialRecordBuilderError::ExpiryOutOfRange =>
					self.unusable("expiry out of range"),
				e => ConfigError::from(e).into(),
			})?;

		*self.record.lock() = Some(record);

		obs::credential_installed(self.class, ttl);

		Ok(secret)
	}

	fn unusable(&self, reason: &'static str) -> Error {
		Error::UnusableCredential { class: self.class, reason }
	}

	async fn coalesce(&self) -> Result<String> {
		self.metrics.record_coalesced();
		obs::refresh_coalesced(self.class);

		if let Some(secret) = self.current_secret() {
			return Ok(secret);
		}

		self.state.wait_idle().await;

		self.current_secret().ok_or(Error::CredentialUnavailable { class: self.class })
	}
}
impl Debug for CredentialCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialCache")
			.field("class", &self.class)
			.field("record", &self.snapshot())
			.field("state", &self.state)
			.field("metrics", &self.metrics)
			.finish()
	}
}
