//! Invalid-credential retry coordinator.
//!
//! Every authenticated remote call runs through the same loop: obtain the secret, run the
//! operation, and only when the remote service rejects the credential force a refresh, pause, and
//! try again. Any other error returns at once. A failed forced refresh aborts the loop with the
//! refresh error.

// self
use crate::{
	_prelude::*,
	auth::CredentialClass,
	flows::{self, Broker},
	http::{ApiRequest, CorpApi},
	obs::{self, FlowKind},
};

/// Retry budget and pause applied after an invalid-credential rejection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
	/// Retries allowed after the first attempt.
	pub max_retries: u32,
	/// Pause between a forced refresh and the next attempt.
	pub backoff: Duration,
}
impl RetryPolicy {
	/// Overrides the pause between attempts; non-positive values disable it.
	pub fn with_backoff(mut self, backoff: Duration) -> Self {
		self.backoff = backoff;

		self
	}

	/// Overrides the retry budget.
	pub fn with_max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;

		self
	}

	/// Total attempts the policy allows, counting the first.
	pub fn max_attempts(&self) -> u32 {
		self.max_retries.saturating_add(1)
	}

	async fn pause(&self) {
		if !self.backoff.is_positive() {
			return;
		}

		let Ok(delay) = std::time::Duration::try_from(self.backoff) else {
			return;
		};

		tokio::time::sleep(delay).await;
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self { max_retries: 2, backoff: Duration::SECOND }
	}
}

impl<A> Broker<A>
where
	A: ?Sized + CorpApi,
{
	/// Runs `op` with the secret of `class`, forcing a refresh and retrying when the remote
	/// service rejects the credential.
	///
	/// `op` receives an owned secret per attempt. At most [`RetryPolicy::max_attempts`] attempts
	/// are made; on exhaustion the last [`Error::InvalidCredential`] is returned.
	pub async fn with_retry<T, F, Fut>(&self, class: CredentialClass, op: F) -> Result<T>
	where
		F: FnMut(String) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		self.run_with_retry(class, |force| self.secret_for(class, force), op).await
	}

	/// Performs an authenticated API call with the access token, retrying on rejection.
	pub async fn call_api(&self, request: &ApiRequest) -> Result<serde_json::Value> {
		flows::observed(
			FlowKind::ApiCall,
			"call_api",
			self.with_retry(CredentialClass::AccessToken, |token| async move {
				self.api.invoke(&token, request).await
			}),
		)
		.await
	}

	/// Retry loop parameterised over the secret source.
	///
	/// `source(false)` reads through the cache and `source(true)` forces a refresh. Ticket fetches
	/// pass an access-token-only source so the ticket flow never re-enters itself.
	pub(crate) async fn run_with_retry<T, S, SFut, F, Fut>(
		&self,
		class: CredentialClass,
		mut source: S,
		mut op: F,
	) -> Result<T>
	where
		S: FnMut(bool) -> SFut,
		SFut: Future<Output = Result<String>>,
		F: FnMut(String) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let mut secret = source(false).await?;
		let mut retries = 0;

		let max_retries = self.retry_policy.max_retries;

		loop {
			match op(secret).await {
				Err(err) if err.is_invalid_credential() && retries < max_retries => {
					retries += 1;

					obs::retrying(class, retries, &err);

					secret = source(true).await?;

					self.retry_policy.pause().await;
				},
				result => return result,
			}
		}
	}

	async fn secret_for(&self, class: CredentialClass, force: bool) -> Result<String> {
		match (class, force) {
			(CredentialClass::AccessToken, _) => self.access_token_secret(force).await,
			(CredentialClass::Ticket(kind), false) => self.get_ticket(kind).await,
			(CredentialClass::Ticket(kind), true) => self.refresh_ticket(kind).await,
		}
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::{
		auth::{AppIdentity, CorpId, TicketKind},
		cache::FreshCredential,
		error::TransportError,
		http::ApiFuture,
	};

	/// Issues `TOK1`, `TOK2`, ... and counts fetches.
	#[derive(Default)]
	struct CountingApi {
		token_fetches: AtomicUsize,
		ticket_fetches: AtomicUsize,
		fail_token_after: Option<usize>,
	}
	impl CorpApi for CountingApi {
		fn fetch_access_token<'a>(
			&'a self,
			_: &'a CorpId,
			_: &'a str,
		) -> ApiFuture<'a, FreshCredential> {
			Box::pin(async move {
				let n = self.token_fetches.fetch_add(1, Ordering::SeqCst) + 1;

				if self.fail_token_after.is_some_and(|limit| n > limit) {
					return Err(
						TransportError::network(std::io::Error::other("connection reset")).into()
					);
				}

				Ok(FreshCredential::new(format!("TOK{n}"), 7200))
			})
		}

		fn fetch_ticket<'a>(&'a self, _: &'a str, _: TicketKind) -> ApiFuture<'a, FreshCredential> {
			Box::pin(async move {
				let n = self.ticket_fetches.fetch_add(1, Ordering::SeqCst) + 1;

				Ok(FreshCredential::new(format!("TICKET{n}"), 7200))
			})
		}

		fn fetch_allowed_ips<'a>(&'a self, _: &'a str) -> ApiFuture<'a, Vec<String>> {
			Box::pin(async { Ok(Vec::new()) })
		}

		fn invoke<'a>(
			&'a self,
			_: &'a str,
			_: &'a ApiRequest,
		) -> ApiFuture<'a, serde_json::Value> {
			Box::pin(async { Ok(serde_json::Value::Null) })
		}
	}

	fn broker(api: CountingApi) -> Broker<CountingApi> {
		let identity = AppIdentity::builder(CorpId::new("ww-corp").expect("Corp should be valid."))
			.secret("s")
			.build()
			.expect("Identity should build.");

		Broker::with_api(identity, api)
			.with_retry_policy(RetryPolicy::default().with_backoff(Duration::ZERO))
	}

	fn rejected() -> Error {
		Error::InvalidCredential { code: 40014, message: "invalid access_token".into() }
	}

	#[test]
	fn default_policy_allows_three_attempts() {
		let policy = RetryPolicy::default();

		assert_eq!(policy.max_retries, 2);
		assert_eq!(policy.max_attempts(), 3);
		assert_eq!(policy.backoff, Duration::SECOND);
	}

	#[tokio::test]
	async fn always_rejected_operation_stops_after_three_attempts() {
		let broker = broker(CountingApi::default());
		let attempts = &AtomicUsize::new(0);
		let err = broker
			.with_retry(CredentialClass::AccessToken, |_| async move {
				attempts.fetch_add(1, Ordering::SeqCst);

				Err::<(), _>(rejected())
			})
			.await
			.expect_err("Exhausted retries must return the last rejection.");

		assert!(err.is_invalid_credential());
		assert_eq!(attempts.load(Ordering::SeqCst), 3);
		// One initial fetch plus two forced refreshes.
		assert_eq!(broker.api.token_fetches.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn recovers_after_two_rejections() {
		let broker = broker(CountingApi::default());
		let seen = &Mutex::new(Vec::new());
		let value = broker
			.with_retry(CredentialClass::AccessToken, |token| async move {
				let attempt = {
					let mut seen = seen.lock();

					seen.push(token);

					seen.len()
				};

				if attempt < 3 { Err(rejected()) } else { Ok(attempt) }
			})
			.await
			.expect("Third attempt should succeed.");

		assert_eq!(value, 3);
		assert_eq!(*seen.lock(), vec!["TOK1".to_owned(), "TOK2".to_owned(), "TOK3".to_owned()]);
		assert_eq!(broker.cache(CredentialClass::AccessToken).metrics().successes(), 3);
	}

	#[tokio::test]
	async fn other_errors_are_not_retried() {
		let broker = broker(CountingApi::default());
		let attempts = &AtomicUsize::new(0);
		let err = broker
			.with_retry(CredentialClass::AccessToken, |_| async move {
				attempts.fetch_add(1, Ordering::SeqCst);

				Err::<(), _>(Error::Business { code: 60011, message: "no privilege".into() })
			})
			.await
			.expect_err("Business errors propagate.");

		assert!(matches!(err, Error::Business { code: 60011, .. }));
		assert_eq!(attempts.load(Ordering::SeqCst), 1);
		assert_eq!(broker.api.token_fetches.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn failed_forced_refresh_aborts_the_loop() {
		let broker = broker(CountingApi { fail_token_after: Some(1), ..Default::default() });
		let attempts = &AtomicUsize::new(0);
		let err = broker
			.with_retry(CredentialClass::AccessToken, |_| async move {
				attempts.fetch_add(1, Ordering::SeqCst);

				Err::<(), _>(rejected())
			})
			.await
			.expect_err("Refresh failure must abort the loop.");

		assert!(matches!(err, Error::Transport(_)));
		assert_eq!(attempts.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn ticket_class_refreshes_the_ticket() {
		let broker = broker(CountingApi::default());
		let class = CredentialClass::Ticket(TicketKind::Default);
		let seen = &Mutex::new(Vec::new());
		let value = broker
			.with_retry(class, |ticket| async move {
				let first = {
					let mut seen = seen.lock();

					seen.push(ticket.clone());

					seen.len() == 1
				};

				if first { Err(rejected()) } else { Ok(ticket) }
			})
			.await
			.expect("Second attempt should succeed with a fresh ticket.");

		assert_eq!(value, "TICKET2");
		assert_eq!(broker.api.ticket_fetches.load(Ordering::SeqCst), 2);
		// Both ticket fetches reuse the cached access token.
		assert_eq!(broker.api.token_fetches.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn backoff_pauses_between_attempts() {
		let broker = broker(CountingApi::default())
			.with_retry_policy(RetryPolicy::default().with_backoff(Duration::milliseconds(30)));
		let started = std::time::Instant::now();
		let _ = broker
			.with_retry(CredentialClass::AccessToken, |_| async { Err::<(), _>(rejected()) })
			.await;

		assert!(started.elapsed() >= std::time::Duration::from_millis(60));
	}
}
