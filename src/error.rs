//! Broker-level error types shared across caches, flows, and transports.

// self
use crate::{_prelude::*, auth::CredentialClass};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Remote error codes that signal an expired or malformed access token or ticket.
pub const INVALID_CREDENTIAL_CODES: [i64; 2] = [40014, 40021];

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem detected before any network call.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Remote service rejected the presented access token or ticket.
	///
	/// This is the only variant that triggers the refresh-and-retry protocol.
	#[error("Remote service rejected the credential ({code}): {message}.")]
	InvalidCredential {
		/// Remote numeric error code.
		code: i64,
		/// Remote error message.
		message: String,
	},
	/// Remote service returned a body that could not be parsed.
	#[error("Remote service returned a malformed response.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Remote service reported an error unrelated to credentials.
	#[error("Remote service returned error {code}: {message}.")]
	Business {
		/// Remote numeric error code.
		code: i64,
		/// Remote error message.
		message: String,
	},
	/// Webhook signature verification or decryption failed.
	#[error("Webhook crypto failure ({code}): {message}.")]
	Crypto {
		/// Numeric code reported by the crypto collaborator.
		code: i32,
		/// Message reported by the crypto collaborator.
		message: String,
	},
	/// A fetch succeeded but the remote service issued a credential that cannot be installed.
	#[error("Remote service issued an unusable {class}: {reason}.")]
	UnusableCredential {
		/// Credential class that was fetched.
		class: CredentialClass,
		/// What was wrong with the issued credential.
		reason: &'static str,
	},
	/// A concurrent refresh of this class failed and no previous secret exists to serve.
	#[error("No {class} is available because the concurrent refresh failed.")]
	CredentialUnavailable {
		/// Credential class that could not be served.
		class: CredentialClass,
	},
}
impl Error {
	/// Maps a remote `errcode`/`errmsg` pair into a broker error, returning `None` for success.
	pub fn from_remote(code: i64, message: impl Into<String>) -> Option<Self> {
		if code == 0 {
			return None;
		}

		let message = message.into();

		if INVALID_CREDENTIAL_CODES.contains(&code) {
			Some(Self::InvalidCredential { code, message })
		} else {
			Some(Self::Business { code, message })
		}
	}

	/// Returns `true` when the error should trigger a forced refresh and retry.
	pub fn is_invalid_credential(&self) -> bool {
		matches!(self, Self::InvalidCredential { .. })
	}

	/// Returns the remote numeric code carried by the error, if any.
	pub fn remote_code(&self) -> Option<i64> {
		match self {
			Self::InvalidCredential { code, .. } | Self::Business { code, .. } => Some(*code),
			Self::Crypto { code, .. } => Some(i64::from(*code)),
			_ => None,
		}
	}
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Endpoint base URL or request path is invalid.
	#[error("Endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	RequestBody(#[source] serde_json::Error),
	/// A required identity field is empty or missing.
	#[error("Application identity is missing the {field} field.")]
	MissingField {
		/// Name of the missing field.
		field: &'static str,
	},
	/// An identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// The callback encoding key is not a 43-character base64 encoding of 32 bytes.
	#[error("Callback encoding key must be 43 base64 characters decoding to 32 bytes.")]
	InvalidEncodingKey,
	/// Webhook operation requested without a configured crypto collaborator.
	#[error("No message crypto implementation is configured.")]
	MissingCrypto,
	/// Echo verification URL is unparsable or lacks a required query parameter.
	#[error("Echo verification URL is invalid: {reason}.")]
	InvalidEchoUrl {
		/// What was wrong with the URL.
		reason: String,
	},
	/// Credential record builder validation failed.
	#[error("Unable to build credential record.")]
	RecordBuild(#[from] crate::auth::CredentialRecordBuilderError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure or timeout.
	#[error("Network error occurred while calling the remote service.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the remote service.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
