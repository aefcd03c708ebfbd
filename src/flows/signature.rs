//! Ticket signature bundles for client-side SDK configuration.

// self
use crate::{
	_prelude::*,
	auth::TicketKind,
	flows::{self, Broker},
	http::CorpApi,
	obs::FlowKind,
	sign::{TicketSignature, nonce},
};

/// Nonce length used for broker-issued signatures.
pub const SIGNATURE_NONCE_LEN: usize = 16;

impl<A> Broker<A>
where
	A: ?Sized + CorpApi,
{
	/// Signs `ticket` for `url` with a fresh nonce and the current timestamp.
	///
	/// Pure apart from the clock and RNG; no cache or network interaction.
	pub fn sign_ticket_operation(&self, ticket: &str, url: &str) -> TicketSignature {
		let (timestamp, nonce) = nonce::timestamp_and_nonce(self.clock(), SIGNATURE_NONCE_LEN);

		TicketSignature::new(
			self.identity.corp_id.clone(),
			self.identity.agent_id.clone(),
			ticket,
			url,
			nonce,
			timestamp,
		)
	}

	/// Obtains the ticket of `kind` (through the cache) and signs it for `url`.
	pub async fn sign_url(&self, kind: TicketKind, url: &str) -> Result<TicketSignature> {
		flows::observed(FlowKind::Signature, "sign_url", async {
			let ticket = self.get_ticket(kind).await?;

			Ok(self.sign_ticket_operation(&ticket, url))
		})
		.await
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{
		auth::{AgentId, AppIdentity, CorpId},
		cache::FreshCredential,
		clock::{Clock, ManualClock},
		http::{ApiFuture, ApiRequest},
		sign,
	};

	struct FixedApi;
	impl CorpApi for FixedApi {
		fn fetch_access_token<'a>(
			&'a self,
			_: &'a CorpId,
			_: &'a str,
		) -> ApiFuture<'a, FreshCredential> {
			Box::pin(async { Ok(FreshCredential::new("TOK", 7200)) })
		}

		fn fetch_ticket<'a>(&'a self, _: &'a str, _: TicketKind) -> ApiFuture<'a, FreshCredential> {
			Box::pin(async { Ok(FreshCredential::new("abc", 7200)) })
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

	#[tokio::test]
	async fn signed_bundle_carries_identity_and_clock_time() {
		let identity = AppIdentity::builder(CorpId::new("ww-corp").expect("Corp should be valid."))
			.agent_id(AgentId::new("1000002").expect("Agent should be valid."))
			.secret("s")
			.build()
			.expect("Identity should build.");
		let clock: Arc<dyn Clock> =
			Arc::new(ManualClock::at(macros::datetime!(2001-09-09 01:46:40 UTC)));
		let broker = Broker::with_api(identity, FixedApi).with_clock(clock);
		let bundle = broker
			.sign_url(TicketKind::AgentScoped, "http://example.com")
			.await
			.expect("Signing should succeed.");

		assert_eq!(&*bundle.corp_id, "ww-corp");
		assert_eq!(bundle.agent_id.as_deref(), Some("1000002"));
		assert_eq!(bundle.timestamp, 1_000_000_000);
		assert_eq!(bundle.nonce.len(), SIGNATURE_NONCE_LEN);
		assert_eq!(
			bundle.signature,
			sign::sign_ticket("abc", &bundle.nonce, "http://example.com", 1_000_000_000)
		);
	}
}
