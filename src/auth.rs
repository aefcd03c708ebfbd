//! Auth-domain identifiers, application identity, and credential models.

pub mod credential;
pub mod id;
pub mod identity;

pub use credential::{class::*, record::*, secret::*};
pub use id::*;
pub use identity::*;
