//! Credential classes, immutable records, and redacted secrets.

pub mod class;
pub mod record;
pub mod secret;
