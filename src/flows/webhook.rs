//! Inbound webhook verification through the message-crypto collaborator.

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	flows::Broker,
	http::CorpApi,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	webhook::{EchoRequest, MessageCrypto, SignedPayload, WebhookKeys},
};

impl<A> Broker<A>
where
	A: ?Sized + CorpApi,
{
	/// Verifies and decrypts an inbound callback body.
	///
	/// Fails with [`ConfigError`] before calling the collaborator when the crypto implementation,
	/// signing token, or encoding key is missing. Collaborator failures surface as
	/// [`Error::Crypto`] with the collaborator's code and message.
	pub fn decrypt_inbound(
		&self,
		signature: &str,
		timestamp: &str,
		nonce: &str,
		body: &[u8],
	) -> Result<Vec<u8>> {
		self.run_crypto("decrypt_inbound", |crypto, keys| {
			crypto
				.decrypt(keys, &SignedPayload { signature, timestamp, nonce, data: body })
				.map_err(Error::from)
		})
	}

	/// Handles a callback URL verification request, returning the decrypted `echostr`.
	///
	/// Accepts an absolute URL or a path with its query string; the `msg_signature`,
	/// `timestamp`, `nonce`, and `echostr` parameters are all required.
	pub fn verify_echo_url(&self, url: &str) -> Result<Vec<u8>> {
		self.run_crypto("verify_echo_url", |crypto, keys| {
			let request = EchoRequest::from_url(url)?;

			crypto.verify_url(keys, &request.payload()).map_err(Error::from)
		})
	}

	fn run_crypto<F>(&self, stage: &'static str, f: F) -> Result<Vec<u8>>
	where
		F: FnOnce(&dyn MessageCrypto, &WebhookKeys<'_>) -> Result<Vec<u8>>,
	{
		const KIND: FlowKind = FlowKind::Webhook;

		let _span = FlowSpan::new(KIND, stage).entered();

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = self.crypto_context().and_then(|(crypto, keys)| f(crypto, &keys));

		obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

		result
	}

	fn crypto_context(&self) -> Result<(&dyn MessageCrypto, WebhookKeys<'_>)> {
		let crypto = self.crypto.as_deref().ok_or(ConfigError::MissingCrypto)?;
		let (signing_token, encoding_key) = self.identity.webhook_secrets()?;

		Ok((crypto, WebhookKeys { signing_token, encoding_key, corp_id: &self.identity.corp_id }))
	}
}
