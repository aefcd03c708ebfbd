//! Ticket signatures for client-side (JS-SDK style) configuration.
//!
//! [`sign_ticket`] is a pure function over its inputs; [`nonce`] supplies the random nonce and the
//! timestamp that go into it.

pub mod nonce;

// crates.io
use sha1::{Digest, Sha1};
// self
use crate::{
	_prelude::*,
	auth::{AgentId, CorpId},
};

/// Returns the lowercase hex SHA-1 of
/// `jsapi_ticket=<ticket>&noncestr=<nonce>&timestamp=<timestamp>&url=<url>`.
///
/// Inputs are concatenated verbatim; the URL is not normalized or escaped.
pub fn sign_ticket(ticket: &str, nonce: &str, url: &str, timestamp: i64) -> String {
	let canonical =
		format!("jsapi_ticket={ticket}&noncestr={nonce}&timestamp={timestamp}&url={url}");
	let digest = Sha1::digest(canonical.as_bytes());

	format!("{digest:x}")
}

/// Signature bundle handed to a browser page so it can configure the client-side SDK.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSignature {
	/// Enterprise identifier.
	#[serde(rename = "corpid")]
	pub corp_id: CorpId,
	/// Application identifier, when the broker was built with one.
	#[serde(rename = "agentid", default, skip_serializing_if = "Option::is_none")]
	pub agent_id: Option<AgentId>,
	/// Unix timestamp (seconds) used in the signature.
	pub timestamp: i64,
	/// Nonce used in the signature.
	#[serde(rename = "nonceStr")]
	pub nonce: String,
	/// Lowercase hex SHA-1 signature.
	pub signature: String,
}
impl TicketSignature {
	/// Signs `ticket` for `url` with caller-provided nonce and timestamp.
	pub fn new(
		corp_id: CorpId,
		agent_id: Option<AgentId>,
		ticket: &str,
		url: &str,
		nonce: impl Into<String>,
		timestamp: i64,
	) -> Self {
		let nonce = nonce.into();
		let signature = sign_ticket(ticket, &nonce, url, timestamp);

		Self { corp_id, agent_id, timestamp, nonce, signature }
	}
}
