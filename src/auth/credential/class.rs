//! Credential classes: the access token and the two ticket variants.

// self
use crate::_prelude::*;

/// Ticket variants issued for client-side signature generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketKind {
	/// Enterprise-wide ticket.
	Default,
	/// Ticket scoped to a single application (agent).
	AgentScoped,
}
impl TicketKind {
	/// Every ticket variant, in cache order.
	pub const ALL: [TicketKind; 2] = [TicketKind::Default, TicketKind::AgentScoped];

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			TicketKind::Default => "default_ticket",
			TicketKind::AgentScoped => "agent_ticket",
		}
	}
}
impl Display for TicketKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Credential class; each class owns exactly one cache inside a broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialClass {
	/// Bearer token required by nearly all outbound API calls.
	AccessToken,
	/// Ticket required for client-side signature generation.
	Ticket(TicketKind),
}
impl CredentialClass {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CredentialClass::AccessToken => "access_token",
			CredentialClass::Ticket(kind) => kind.as_str(),
		}
	}
}
impl From<TicketKind> for CredentialClass {
	fn from(kind: TicketKind) -> Self {
		Self::Ticket(kind)
	}
}
impl Display for CredentialClass {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
