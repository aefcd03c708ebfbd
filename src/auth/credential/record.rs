//! Immutable credential records, expiry helpers, and builders.

// self
use crate::{_prelude::*, auth::credential::secret::CredentialSecret};

/// Lead time subtracted from a remote TTL so credentials are refreshed before the remote
/// service invalidates them.
pub const SAFETY_MARGIN: Duration = Duration::seconds(300);

/// Current lifecycle status for a credential record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialStatus {
	/// Record carries an empty secret and is treated as missing.
	Absent,
	/// Record is usable.
	Active,
	/// Record reached its (margin-adjusted) expiry instant.
	Expired,
}

/// Errors produced by [`CredentialRecordBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CredentialRecordBuilderError {
	/// Issued when no secret value was provided.
	#[error("Credential secret is required.")]
	MissingSecret,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
	/// Issued when the relative expiry lands outside the representable date range.
	#[error("Expiry lies outside the representable date range.")]
	ExpiryOutOfRange,
}

/// Brings a remote TTL forward by [`SAFETY_MARGIN`] when it exceeds the margin; shorter TTLs are
/// returned unchanged.
pub fn margin_adjusted(ttl: Duration) -> Duration {
	if ttl > SAFETY_MARGIN { ttl - SAFETY_MARGIN } else { ttl }
}

/// Immutable record describing one issued access token or ticket.
#[derive(Serialize, Deserialize, Clone)]
pub struct CredentialRecord {
	/// Secret issued by the remote service; callers must avoid logging it.
	pub secret: CredentialSecret,
	/// Instant the record was installed.
	pub issued_at: OffsetDateTime,
	/// Instant after which the secret must be treated as unusable.
	pub expires_at: OffsetDateTime,
}
impl CredentialRecord {
	/// Returns a builder for constructing records.
	pub fn builder() -> CredentialRecordBuilder {
		CredentialRecordBuilder::default()
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> CredentialStatus {
		if self.secret.is_empty() {
			return CredentialStatus::Absent;
		}
		if instant >= self.expires_at {
			return CredentialStatus::Expired;
		}

		CredentialStatus::Active
	}

	/// Returns `true` if the record can be handed to callers at the provided instant.
	pub fn is_usable_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), CredentialStatus::Active)
	}

	/// Returns `true` if the record carries an empty secret.
	pub fn is_absent(&self) -> bool {
		self.secret.is_empty()
	}

	/// Remaining lifetime at the provided instant (negative once expired).
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		self.expires_at - instant
	}
}
impl Debug for CredentialRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialRecord")
			.field("secret", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`CredentialRecord`].
#[derive(Clone, Debug, Default)]
pub struct CredentialRecordBuilder {
	secret: Option<CredentialSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl CredentialRecordBuilder {
	/// Provides the secret value.
	pub fn secret(mut self, secret: impl Into<String>) -> Self {
		self.secret = Some(CredentialSecret::new(secret));

		self
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Sets a relative expiry from a remote TTL, applying [`margin_adjusted`].
	pub fn remote_ttl(self, ttl: Duration) -> Self {
		self.expires_in(margin_adjusted(ttl))
	}

	/// Consumes the builder and produces a [`CredentialRecord`].
	pub fn build(self) -> Result<CredentialRecord, CredentialRecordBuilderError> {
		let secret = self.secret.ok_or(CredentialRecordBuilderError::MissingSecret)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at
				.checked_add(delta)
				.ok_or(CredentialRecordBuilderError::ExpiryOutOfRange)?,
			(None, None) => return Err(CredentialRecordBuilderError::MissingExpiry),
		};

		Ok(CredentialRecord { secret, issued_at, expires_at })
	}
}
