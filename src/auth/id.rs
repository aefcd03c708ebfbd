//! Validated identifiers for the enterprise and its applications.
//!
//! Corp identifiers are short ASCII tokens (`ww…`) and agent identifiers are decimal numbers, so
//! both are checked once at construction and then travel as plain strings in query parameters
//! and signature bundles.

// std
use std::ops::Deref;
// self
use crate::_prelude::*;

const CORP_ID_MAX_LEN: usize = 64;
const AGENT_ID_MAX_LEN: usize = 20;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal, $rule:expr) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Validates `value` and wraps it.
			pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
				let value = value.into();

				$rule.check($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::new(value)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
	};
}

/// Error returned when an identifier fails validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Identifier kind (`Corp` or `Agent`).
		kind: &'static str,
	},
	/// The identifier contains a character its kind does not allow.
	#[error("{kind} identifier contains the disallowed character {found:?}.")]
	InvalidCharacter {
		/// Identifier kind (`Corp` or `Agent`).
		kind: &'static str,
		/// First offending character.
		found: char,
	},
	/// The identifier is longer than its kind allows.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Identifier kind (`Corp` or `Agent`).
		kind: &'static str,
		/// Maximum permitted length.
		max: usize,
	},
}

/// Character set and length limit of one identifier kind.
struct Rule {
	max_len: usize,
	allowed: fn(char) -> bool,
}
impl Rule {
	fn check(&self, kind: &'static str, value: &str) -> Result<(), IdentifierError> {
		if value.is_empty() {
			return Err(IdentifierError::Empty { kind });
		}
		if let Some(found) = value.chars().find(|c| !(self.allowed)(*c)) {
			return Err(IdentifierError::InvalidCharacter { kind, found });
		}
		if value.len() > self.max_len {
			return Err(IdentifierError::TooLong { kind, max: self.max_len });
		}

		Ok(())
	}
}

const CORP_RULE: Rule = Rule {
	max_len: CORP_ID_MAX_LEN,
	allowed: |c| c.is_ascii_alphanumeric() || c == '-' || c == '_',
};
const AGENT_RULE: Rule = Rule { max_len: AGENT_ID_MAX_LEN, allowed: |c| c.is_ascii_digit() };

def_id! {
	CorpId,
	"Enterprise (corp) identifier issued by the remote service.",
	"Corp",
	CORP_RULE
}
def_id! {
	AgentId,
	"Numeric identifier of an application (agent) inside an enterprise.",
	"Agent",
	AGENT_RULE
}
