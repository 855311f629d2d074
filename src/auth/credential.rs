//! Credential pair model and the backend grant it is derived from.

// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Token triple returned by the login and refresh endpoints.
///
/// Field names are the wire contract: `{accessToken, refreshToken, expiresIn}`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
	/// Newly issued bearer credential.
	pub access_token: TokenSecret,
	/// Rotated refresh credential.
	pub refresh_token: TokenSecret,
	/// Access-token lifetime in seconds.
	pub expires_in: i64,
}
impl TokenGrant {
	/// Creates a grant from raw token strings and a lifetime in seconds.
	pub fn new(
		access_token: impl Into<String>,
		refresh_token: impl Into<String>,
		expires_in: i64,
	) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: TokenSecret::new(refresh_token),
			expires_in,
		}
	}
}
impl Debug for TokenGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenGrant")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("expires_in", &self.expires_in)
			.finish()
	}
}

/// The unit of session state: one access credential, its refresh credential, and the derived
/// expiry instant.
///
/// `expires_at` is always derived from `expires_in` at save time; a pair is replaced as a whole and
/// never patched field by field.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPair {
	/// Short-lived bearer credential.
	pub access_token: TokenSecret,
	/// Long-lived credential used only to mint new pairs.
	pub refresh_token: TokenSecret,
	/// Absolute expiry instant for `access_token`.
	pub expires_at: OffsetDateTime,
	/// Lifetime reported by the backend, kept for diagnostics.
	pub expires_in: Duration,
}
impl CredentialPair {
	/// Derives a pair from a backend grant, stamping `expires_at = now + expires_in`.
	pub fn from_grant(grant: TokenGrant, now: OffsetDateTime) -> Result<Self, ConfigError> {
		if grant.expires_in <= 0 {
			return Err(ConfigError::NonPositiveExpiresIn);
		}

		let expires_in = Duration::seconds(grant.expires_in);

		Ok(Self {
			access_token: grant.access_token,
			refresh_token: grant.refresh_token,
			expires_at: now + expires_in,
			expires_in,
		})
	}

	/// A pair without a refresh credential is unauthenticated regardless of its access token.
	pub fn is_authenticated(&self) -> bool {
		!self.refresh_token.is_empty()
	}

	/// Instant at which proactive renewal should kick in.
	pub fn renewal_due_at(&self, buffer: Duration) -> OffsetDateTime {
		self.expires_at - buffer
	}

	/// Returns `true` once `now` has entered the renewal window.
	pub fn needs_renewal_at(&self, now: OffsetDateTime, buffer: Duration) -> bool {
		now >= self.renewal_due_at(buffer)
	}

	/// Returns `true` once the access credential is past its expiry.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.expires_at
	}
}
impl Debug for CredentialPair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialPair")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &(!self.refresh_token.is_empty()).then_some("<redacted>"))
			.field("expires_at", &self.expires_at)
			.field("expires_in", &self.expires_in)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn pair_derives_expiry_from_grant() {
		let now = macros::datetime!(2025-11-10 12:00 UTC);
		let pair = CredentialPair::from_grant(TokenGrant::new("a", "r", 3600), now)
			.expect("Positive lifetimes should build a pair.");

		assert_eq!(pair.expires_at, macros::datetime!(2025-11-10 13:00 UTC));
		assert_eq!(pair.expires_in, Duration::hours(1));
		assert!(pair.is_authenticated());
	}

	#[test]
	fn renewal_window_opens_at_buffer_boundary() {
		let now = macros::datetime!(2025-11-10 12:00 UTC);
		let pair = CredentialPair::from_grant(TokenGrant::new("a", "r", 3600), now)
			.expect("Positive lifetimes should build a pair.");
		let buffer = Duration::minutes(10);

		assert!(!pair.needs_renewal_at(pair.expires_at - Duration::minutes(11), buffer));
		assert!(pair.needs_renewal_at(pair.expires_at - Duration::minutes(10), buffer));
		assert!(pair.needs_renewal_at(pair.expires_at - Duration::minutes(9), buffer));
		assert!(!pair.is_expired_at(pair.expires_at - Duration::minutes(9)));
	}

	#[test]
	fn non_positive_lifetimes_are_rejected() {
		let now = OffsetDateTime::now_utc();

		assert!(matches!(
			CredentialPair::from_grant(TokenGrant::new("a", "r", 0), now),
			Err(ConfigError::NonPositiveExpiresIn)
		));
	}

	#[test]
	fn empty_refresh_token_is_unauthenticated() {
		let now = OffsetDateTime::now_utc();
		let pair = CredentialPair::from_grant(TokenGrant::new("a", "", 60), now)
			.expect("Positive lifetimes should build a pair.");

		assert!(!pair.is_authenticated());
	}

	#[test]
	fn grant_uses_camel_case_wire_names() {
		let grant: TokenGrant = serde_json::from_str(
			"{\"accessToken\":\"a\",\"refreshToken\":\"r\",\"expiresIn\":3600}",
		)
		.expect("Wire payload should deserialize.");

		assert_eq!(grant.access_token.expose(), "a");
		assert_eq!(grant.refresh_token.expose(), "r");
		assert_eq!(grant.expires_in, 3600);
	}
}
