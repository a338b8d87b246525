//! Immutable bearer credentials and their refresh-threshold arithmetic.

// self
use crate::{_prelude::*, auth::secret::AuthSecret};

/// Fraction of the granted lifetime after which a refresh is triggered, expressed as
/// `REFRESH_NUMERATOR / REFRESH_DENOMINATOR`. Refreshing at 80% of the time-to-live
/// keeps an almost-expired token from being sent mid-flight.
const REFRESH_NUMERATOR: i32 = 4;
const REFRESH_DENOMINATOR: i32 = 5;

/// Errors produced while validating credential instants.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CredentialError {
	/// Issued when the expiry instant does not fall after the issue instant.
	#[error("Credential expiry must fall after its issue instant.")]
	NonPositiveLifetime,
}

/// Immutable bearer credential with issue and expiry instants.
///
/// A refresh never mutates an existing credential; it produces a new value that the
/// [`TokenCache`](crate::auth::TokenCache) swaps in atomically.
#[derive(Clone)]
pub struct Credential {
	token: AuthSecret,
	issued_at: OffsetDateTime,
	expires_at: OffsetDateTime,
}
impl Credential {
	/// Creates a credential, enforcing that the expiry falls after the issue instant.
	pub fn new(
		token: AuthSecret,
		issued_at: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> Result<Self, CredentialError> {
		if expires_at <= issued_at {
			return Err(CredentialError::NonPositiveLifetime);
		}

		Ok(Self { token, issued_at, expires_at })
	}

	/// Creates a credential from an issue instant and a granted time-to-live.
	pub fn from_ttl(
		token: AuthSecret,
		issued_at: OffsetDateTime,
		ttl: Duration,
	) -> Result<Self, CredentialError> {
		Self::new(token, issued_at, issued_at + ttl)
	}

	/// Returns the bearer token value.
	pub fn token(&self) -> &AuthSecret {
		&self.token
	}

	/// Returns the instant the credential was issued.
	pub fn issued_at(&self) -> OffsetDateTime {
		self.issued_at
	}

	/// Returns the instant the credential expires.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.expires_at
	}

	/// Returns the granted time-to-live.
	pub fn lifetime(&self) -> Duration {
		self.expires_at - self.issued_at
	}

	/// Returns `true` once the credential has passed its hard expiry.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Returns `true` once 80% of the granted lifetime has elapsed.
	pub fn needs_refresh_at(&self, instant: OffsetDateTime) -> bool {
		let threshold = self.issued_at + self.lifetime() * REFRESH_NUMERATOR / REFRESH_DENOMINATOR;

		instant >= threshold
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("token", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn hour_credential() -> Credential {
		Credential::from_ttl(
			AuthSecret::new("token"),
			macros::datetime!(2025-01-01 00:00 UTC),
			Duration::hours(1),
		)
		.expect("Credential fixture should be valid.")
	}

	#[test]
	fn refresh_threshold_sits_at_eighty_percent_of_lifetime() {
		let credential = hour_credential();

		assert!(!credential.needs_refresh_at(macros::datetime!(2025-01-01 00:30 UTC)));
		assert!(!credential.needs_refresh_at(macros::datetime!(2025-01-01 00:47 UTC)));
		assert!(credential.needs_refresh_at(macros::datetime!(2025-01-01 00:48 UTC)));
		assert!(credential.needs_refresh_at(macros::datetime!(2025-01-01 01:00 UTC)));
	}

	#[test]
	fn hard_expiry_is_inclusive() {
		let credential = hour_credential();

		assert!(!credential.is_expired_at(macros::datetime!(2025-01-01 00:59 UTC)));
		assert!(credential.is_expired_at(macros::datetime!(2025-01-01 01:00 UTC)));
	}

	#[test]
	fn non_positive_lifetimes_are_rejected() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);

		let err = Credential::new(AuthSecret::new("token"), issued, issued)
			.expect_err("Zero-lifetime credentials should be rejected.");

		assert_eq!(err, CredentialError::NonPositiveLifetime);

		let err = Credential::from_ttl(AuthSecret::new("token"), issued, Duration::seconds(-5))
			.expect_err("Negative-lifetime credentials should be rejected.");

		assert_eq!(err, CredentialError::NonPositiveLifetime);
	}
}
