//! Immutable application identity used to mint credentials and verify webhooks.

// crates.io
use base64::{
	Engine as _,
	alphabet,
	engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
// self
use crate::{
	_prelude::*,
	auth::{AgentId, CorpId, CredentialSecret},
	error::ConfigError,
};

const ENCODING_KEY_LEN: usize = 43;
const ENCODING_KEY_BYTES: usize = 32;
// Keys are issued as unpadded base64 whose final symbol may carry non-zero trailing bits.
const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
	&alphabet::STANDARD,
	GeneralPurposeConfig::new()
		.with_decode_allow_trailing_bits(true)
		.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Identity fields of one application; set once at construction and never changed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AppIdentityConfig")]
pub struct AppIdentity {
	/// Enterprise identifier.
	pub corp_id: CorpId,
	/// Application identifier; included in ticket signature bundles when present.
	pub agent_id: Option<AgentId>,
	/// Shared secret exchanged for access tokens.
	pub secret: CredentialSecret,
	/// Callback signing token used for webhook verification.
	pub signing_token: Option<CredentialSecret>,
	/// Callback encoding (AES) key used for webhook decryption.
	pub encoding_key: Option<CredentialSecret>,
}
impl AppIdentity {
	/// Creates a new builder for the provided corp identifier.
	pub fn builder(corp_id: CorpId) -> AppIdentityBuilder {
		AppIdentityBuilder::new(corp_id)
	}

	/// Returns the signing token and encoding key, failing fast when either is missing.
	pub fn webhook_secrets(&self) -> Result<(&str, &str), ConfigError> {
		let token = self
			.signing_token
			.as_ref()
			.map(CredentialSecret::expose)
			.ok_or(ConfigError::MissingField { field: "signing_token" })?;
		let key = self
			.encoding_key
			.as_ref()
			.map(CredentialSecret::expose)
			.ok_or(ConfigError::MissingField { field: "encoding_key" })?;

		Ok((token, key))
	}
}
impl Debug for AppIdentity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AppIdentity")
			.field("corp_id", &self.corp_id)
			.field("agent_id", &self.agent_id)
			.field("secret_set", &!self.secret.is_empty())
			.field("signing_token_set", &self.signing_token.is_some())
			.field("encoding_key_set", &self.encoding_key.is_some())
			.finish()
	}
}

/// Builder for [`AppIdentity`] values.
#[derive(Debug)]
pub struct AppIdentityBuilder {
	corp_id: CorpId,
	agent_id: Option<AgentId>,
	secret: Option<CredentialSecret>,
	signing_token: Option<CredentialSecret>,
	encoding_key: Option<CredentialSecret>,
}
impl AppIdentityBuilder {
	fn new(corp_id: CorpId) -> Self {
		Self { corp_id, agent_id: None, secret: None, signing_token: None, encoding_key: None }
	}

	/// Sets the application (agent) identifier.
	pub fn agent_id(mut self, agent_id: AgentId) -> Self {
		self.agent_id = Some(agent_id);

		self
	}

	/// Sets the shared application secret.
	pub fn secret(mut self, secret: impl Into<String>) -> Self {
		self.secret = Some(CredentialSecret::new(secret));

		self
	}

	/// Sets the callback signing token.
	pub fn signing_token(mut self, token: impl Into<String>) -> Self {
		self.signing_token = Some(CredentialSecret::new(token));

		self
	}

	/// Sets the callback encoding key.
	pub fn encoding_key(mut self, key: impl Into<String>) -> Self {
		self.encoding_key = Some(CredentialSecret::new(key));

		self
	}

	/// Consumes the builder and validates the resulting identity.
	pub fn build(self) -> Result<AppIdentity, ConfigError> {
		let secret = self
			.secret
			.filter(|secret| !secret.is_empty())
			.ok_or(ConfigError::MissingField { field: "secret" })?;
		let signing_token = self.signing_token.filter(|token| !token.is_empty());
		let encoding_key = self.encoding_key.filter(|key| !key.is_empty());

		if let Some(key) = encoding_key.as_ref() {
			validate_encoding_key(key.expose())?;
		}

		Ok(AppIdentity {
			corp_id: self.corp_id,
			agent_id: self.agent_id,
			secret,
			signing_token,
			encoding_key,
		})
	}
}

/// Serialized shape accepted when loading an identity from configuration files.
#[derive(Clone, Debug, Deserialize)]
struct AppIdentityConfig {
	corp_id: CorpId,
	#[serde(default)]
	agent_id: Option<AgentId>,
	secret: CredentialSecret,
	#[serde(default)]
	signing_token: Option<CredentialSecret>,
	#[serde(default)]
	encoding_key: Option<CredentialSecret>,
}
impl TryFrom<AppIdentityConfig> for AppIdentity {
	type Error = ConfigError;

	fn try_from(config: AppIdentityConfig) -> Result<Self, Self::Error> {
		let mut builder = AppIdentity::builder(config.corp_id).secret(config.secret.expose());

		if let Some(agent_id) = config.agent_id {
			builder = builder.agent_id(agent_id);
		}
		if let Some(token) = config.signing_token {
			builder = builder.signing_token(token.expose());
		}
		if let Some(key) = config.encoding_key {
			builder = builder.encoding_key(key.expose());
		}

		builder.build()
	}
}

fn validate_encoding_key(key: &str) -> Result<(), ConfigError> {
	if key.len() != ENCODING_KEY_LEN {
		return Err(ConfigError::InvalidEncodingKey);
	}

	match LENIENT_STANDARD.decode(key) {
		Ok(bytes) if bytes.len() == ENCODING_KEY_BYTES => Ok(()),
		_ => Err(ConfigError::InvalidEncodingKey),
	}
}
