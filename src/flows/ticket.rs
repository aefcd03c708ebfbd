//! Ticket retrieval with single-flight refresh.
//!
//! A ticket fetch needs an access token, so it runs through the retry loop with the access-token
//! class: a ticket endpoint rejecting the token forces a token refresh before the fetch is retried.

// self
use crate::{
	_prelude::*,
	auth::{CredentialClass, TicketKind},
	cache::FreshCredential,
	flows::{self, Broker},
	http::CorpApi,
	obs::FlowKind,
};

impl<A> Broker<A>
where
	A: ?Sized + CorpApi,
{
	/// Returns the cached ticket of `kind`, fetching a new one when it is absent or expired.
	pub async fn get_ticket(&self, kind: TicketKind) -> Result<String> {
		flows::observed(
			FlowKind::Ticket,
			"get_ticket",
			self.cache(kind.into()).get(|| self.fetch_ticket(kind)),
		)
		.await
	}

	/// Forces a refresh of the ticket of `kind`.
	///
	/// When another refresh of the same kind is in flight the current (possibly stale) ticket is
	/// returned without a second fetch.
	pub async fn refresh_ticket(&self, kind: TicketKind) -> Result<String> {
		flows::observed(
			FlowKind::Ticket,
			"refresh_ticket",
			self.cache(kind.into()).force_refresh(|| self.fetch_ticket(kind)),
		)
		.await
	}

	async fn fetch_ticket(&self, kind: TicketKind) -> Result<FreshCredential> {
		self.run_with_retry(
			CredentialClass::AccessToken,
			|force| self.access_token_secret(force),
			|token| async move { self.api.fetch_ticket(&token, kind).await },
		)
		.await
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::{
		auth::{AppIdentity, CorpId},
		flows::RetryPolicy,
		http::{ApiFuture, ApiRequest},
	};

	/// Rejects the first access token on the ticket endpoint, then issues tickets per kind.
	#[derive(Default)]
	struct TicketApi {
		token_fetches: AtomicUsize,
		ticket_calls: Mutex<Vec<(String, TicketKind)>>,
	}
	impl CorpApi for TicketApi {
		fn fetch_access_token<'a>(
			&'a self,
			_: &'a CorpId,
			_: &'a str,
		) -> ApiFuture<'a, FreshCredential> {
			Box::pin(async move {
				let n = self.token_fetches.fetch_add(1, Ordering::SeqCst) + 1;

				Ok(FreshCredential::new(format!("TOK{n}"), 7200))
			})
		}

		fn fetch_ticket<'a>(
			&'a self,
			access_token: &'a str,
			kind: TicketKind,
		) -> ApiFuture<'a, FreshCredential> {
			Box::pin(async move {
				self.ticket_calls.lock().push((access_token.to_owned(), kind));

				if access_token == "TOK1" {
					return Err(Error::InvalidCredential {
						code: 40014,
						message: "invalid access_token".into(),
					});
				}

				Ok(FreshCredential::new(format!("{}-{access_token}", kind.as_str()), 7200))
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

	fn broker() -> Broker<TicketApi> {
		let identity = AppIdentity::builder(CorpId::new("ww-corp").expect("Corp should be valid."))
			.secret("s")
			.build()
			.expect("Identity should build.");

		Broker::with_api(identity, TicketApi::default())
			.with_retry_policy(RetryPolicy::default().with_backoff(Duration::ZERO))
	}

	#[tokio::test]
	async fn rejected_token_is_refreshed_before_ticket_retry() {
		let broker = broker();
		let ticket =
			broker.get_ticket(TicketKind::Default).await.expect("Ticket should be issued.");

		assert_eq!(ticket, "default_ticket-TOK2");
		assert_eq!(broker.api.token_fetches.load(Ordering::SeqCst), 2);
		assert_eq!(
			*broker.api.ticket_calls.lock(),
			vec![("TOK1".to_owned(), TicketKind::Default), ("TOK2".to_owned(), TicketKind::Default)]
		);
	}

	#[tokio::test]
	async fn ticket_kinds_use_independent_caches() {
		let broker = broker();
		let default = broker.get_ticket(TicketKind::Default).await.expect("Default ticket.");
		let agent = broker.get_ticket(TicketKind::AgentScoped).await.expect("Agent ticket.");

		assert_eq!(default, "default_ticket-TOK2");
		assert_eq!(agent, "agent_ticket-TOK2");
		assert_eq!(broker.get_ticket(TicketKind::Default).await.expect("Cache hit."), default);
		assert_eq!(broker.api.ticket_calls.lock().len(), 3);

		let refreshed =
			broker.refresh_ticket(TicketKind::AgentScoped).await.expect("Forced refresh.");

		assert_eq!(refreshed, "agent_ticket-TOK2");
		assert_eq!(broker.api.ticket_calls.lock().len(), 4);
		assert_eq!(
			broker.cache(CredentialClass::Ticket(TicketKind::AgentScoped)).metrics().successes(),
			2
		);
	}
}
