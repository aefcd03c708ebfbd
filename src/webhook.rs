//! Boundary to the webhook message-crypto collaborator.
//!
//! Signature checks and AES decryption of inbound callbacks live outside this crate. The broker
//! only supplies its identity fields ([`WebhookKeys`]) plus the request's signed parts
//! ([`SignedPayload`]) and surfaces a [`CryptoFailure`] as [`Error::Crypto`] unchanged.

// self
use crate::{_prelude::*, error::ConfigError};

/// Failure reported by a [`MessageCrypto`] implementation.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Crypto failure ({code}): {message}.")]
pub struct CryptoFailure {
	/// Numeric code defined by the crypto implementation.
	pub code: i32,
	/// Human-readable description.
	pub message: String,
}
impl CryptoFailure {
	/// Creates a failure with the given code and message.
	pub fn new(code: i32, message: impl Into<String>) -> Self {
		Self { code, message: message.into() }
	}
}
impl From<CryptoFailure> for Error {
	fn from(failure: CryptoFailure) -> Self {
		Self::Crypto { code: failure.code, message: failure.message }
	}
}

/// Identity fields required to verify and decrypt callbacks.
#[derive(Clone, Copy)]
pub struct WebhookKeys<'a> {
	/// Callback signing token.
	pub signing_token: &'a str,
	/// Callback encoding (AES) key.
	pub encoding_key: &'a str,
	/// Enterprise identifier the payload must be addressed to.
	pub corp_id: &'a str,
}
impl Debug for WebhookKeys<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("WebhookKeys")
			.field("signing_token", &"<redacted>")
			.field("encoding_key", &"<redacted>")
			.field("corp_id", &self.corp_id)
			.finish()
	}
}

/// Signed parts of one inbound request.
#[derive(Clone, Copy, Debug)]
pub struct SignedPayload<'a> {
	/// `msg_signature` query parameter.
	pub signature: &'a str,
	/// `timestamp` query parameter.
	pub timestamp: &'a str,
	/// `nonce` query parameter.
	pub nonce: &'a str,
	/// Encrypted body (message) or `echostr` (URL verification).
	pub data: &'a [u8],
}

/// Message crypto collaborator (signature verification plus decryption).
pub trait MessageCrypto
where
	Self: 'static + Send + Sync,
{
	/// Verifies and decrypts an inbound message body.
	fn decrypt(
		&self,
		keys: &WebhookKeys<'_>,
		payload: &SignedPayload<'_>,
	) -> Result<Vec<u8>, CryptoFailure>;

	/// Verifies and decrypts the `echostr` of a callback URL verification request.
	fn verify_url(
		&self,
		keys: &WebhookKeys<'_>,
		payload: &SignedPayload<'_>,
	) -> Result<Vec<u8>, CryptoFailure>;
}

/// Query parameters of a callback URL verification request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EchoRequest {
	/// `msg_signature` parameter.
	pub msg_signature: String,
	/// `timestamp` parameter.
	pub timestamp: String,
	/// `nonce` parameter.
	pub nonce: String,
	/// `echostr` parameter.
	pub echostr: String,
}
impl EchoRequest {
	/// Extracts the verification parameters from an absolute URL or a path with a query string.
	///
	/// Every parameter must be present and non-empty.
	pub fn from_url(raw: &str) -> Result<Self, ConfigError> {
		let url = match Url::parse(raw) {
			Err(url::ParseError::RelativeUrlWithoutBase) =>
				Url::parse("http://callback.invalid/").and_then(|base| base.join(raw)),
			parsed => parsed,
		}
		.map_err(|e| ConfigError::InvalidEchoUrl { reason: e.to_string() })?;
		let mut msg_signature = None;
		let mut timestamp = None;
		let mut nonce = None;
		let mut echostr = None;

		for (key, value) in url.query_pairs() {
			let slot = match &*key {
				"msg_signature" => &mut msg_signature,
				"timestamp" => &mut timestamp,
				"nonce" => &mut nonce,
				"echostr" => &mut echostr,
				_ => continue,
			};

			if slot.is_none() {
				*slot = Some(value.into_owned());
			}
		}

		Ok(Self {
			msg_signature: required(msg_signature, "msg_signature")?,
			timestamp: required(timestamp, "timestamp")?,
			nonce: required(nonce, "nonce")?,
			echostr: required(echostr, "echostr")?,
		})
	}

	/// Borrows the request as a [`SignedPayload`] whose data is the `echostr`.
	pub fn payload(&self) -> SignedPayload<'_> {
		SignedPayload {
			signature: &self.msg_signature,
			timestamp: &self.timestamp,
			nonce: &self.nonce,
			data: self.echostr.as_bytes(),
		}
	}
}

fn required(value: Option<String>, name: &str) -> Result<String, ConfigError> {
	value
		.filter(|value| !value.is_empty())
		.ok_or_else(|| ConfigError::InvalidEchoUrl {
			reason: format!("missing `{name}` parameter"),
		})
}
