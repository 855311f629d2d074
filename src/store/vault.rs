//! Typed adapter that maps credential pairs and the device identity onto a [`CredentialStore`].

// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, DeviceIdentity, TokenSecret},
	store::{CompareAndSwapOutcome, CredentialStore, StoreError, StoreKey},
};

/// Reads and writes whole credential pairs against the raw key layout.
///
/// Every pair write touches all four credential keys in one batch, so a reader never observes an
/// access token paired with a stale expiry.
#[derive(Clone)]
pub struct CredentialVault {
	store: Arc<dyn CredentialStore>,
	device_info: String,
}
impl CredentialVault {
	/// Wraps a store; `device_info` is attached to the lazily created device identity.
	pub fn new(store: Arc<dyn CredentialStore>, device_info: impl Into<String>) -> Self {
		Self { store, device_info: device_info.into() }
	}

	/// Underlying key/value store.
	pub fn store(&self) -> &Arc<dyn CredentialStore> {
		&self.store
	}

	/// Loads the latest persisted pair, or `None` when neither credential is stored.
	///
	/// A missing or unreadable `expires-at` loads as the Unix epoch so the pair is treated as
	/// expiring rather than trusted.
	pub async fn load_credentials(&self) -> Result<Option<CredentialPair>, StoreError> {
		let mut values = self.store.fetch(&StoreKey::CREDENTIALS).await?.into_iter();
		let access = values.next().flatten();
		let refresh = values.next().flatten();
		let expires_at = values.next().flatten();
		let expires_in = values.next().flatten();

		if access.is_none() && refresh.is_none() {
			return Ok(None);
		}

		Ok(Some(CredentialPair {
			access_token: TokenSecret::new(access.unwrap_or_default()),
			refresh_token: TokenSecret::new(refresh.unwrap_or_default()),
			expires_at: expires_at
				.as_deref()
				.and_then(decode_instant)
				.unwrap_or(OffsetDateTime::UNIX_EPOCH),
			expires_in: expires_in
				.as_deref()
				.and_then(|raw| raw.parse::<i64>().ok())
				.map(Duration::seconds)
				.unwrap_or(Duration::ZERO),
		}))
	}

	/// Replaces the stored pair unconditionally.
	pub async fn save_credentials(&self, pair: &CredentialPair) -> Result<(), StoreError> {
		self.store.save(encode_pair(pair)).await
	}

	/// Replaces the stored pair only if the stored refresh token still equals `expected_refresh`.
	pub async fn rotate_credentials(
		&self,
		expected_refresh: &TokenSecret,
		pair: &CredentialPair,
	) -> Result<CompareAndSwapOutcome, StoreError> {
		self.store
			.compare_and_swap(
				StoreKey::RefreshToken,
				Some(expected_refresh.expose()),
				encode_pair(pair),
			)
			.await
	}

	/// Wipes the credential keys, returning `true` if anything was stored.
	///
	/// The device identity is left in place.
	pub async fn clear_credentials(&self) -> Result<bool, StoreError> {
		Ok(self.store.remove(&StoreKey::CREDENTIALS).await? > 0)
	}

	/// Wipes the credential keys only while the stored refresh token still equals `expected`.
	///
	/// Used when the backend rejects a specific refresh token, so a session stored after that
	/// token was read is left alone.
	pub async fn clear_credentials_if_current(
		&self,
		expected: &TokenSecret,
	) -> Result<CompareAndSwapOutcome, StoreError> {
		self.store
			.compare_and_remove(StoreKey::RefreshToken, expected.expose(), &StoreKey::CREDENTIALS)
			.await
	}

	/// Returns the device identity, generating and persisting an identifier on first access.
	pub async fn device_identity(&self) -> Result<DeviceIdentity, StoreError> {
		if let Some(id) = self.stored_device_id().await? {
			return Ok(DeviceIdentity::new(id, self.device_info.clone()));
		}

		let candidate = DeviceIdentity::generate_id();
		let outcome = self
			.store
			.compare_and_swap(
				StoreKey::DeviceId,
				None,
				vec![(StoreKey::DeviceId, candidate.clone())],
			)
			.await?;
		let device_id = match outcome {
			CompareAndSwapOutcome::Updated => {
				tracing::debug!("generated a new device identifier");

				candidate
			},
			_ => self.stored_device_id().await?.ok_or_else(|| StoreError::Backend {
				message: "Device identifier vanished during initialization".into(),
			})?,
		};

		Ok(DeviceIdentity::new(device_id, self.device_info.clone()))
	}

	async fn stored_device_id(&self) -> Result<Option<String>, StoreError> {
		Ok(self.store.fetch(&[StoreKey::DeviceId]).await?.into_iter().next().flatten())
	}
}
impl Debug for CredentialVault {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialVault").field("device_info", &self.device_info).finish()
	}
}

fn encode_pair(pair: &CredentialPair) -> Vec<(StoreKey, String)> {
	vec![
		(StoreKey::AccessToken, pair.access_token.expose().to_owned()),
		(StoreKey::RefreshToken, pair.refresh_token.expose().to_owned()),
		(StoreKey::ExpiresAt, encode_instant(pair.expires_at)),
		(StoreKey::ExpiresIn, pair.expires_in.whole_seconds().to_string()),
	]
}

fn encode_instant(instant: OffsetDateTime) -> String {
	(instant.unix_timestamp_nanos() / 1_000_000).to_string()
}

fn decode_instant(raw: &str) -> Option<OffsetDateTime> {
	let millis = raw.trim().parse::<i128>().ok()?;

	OffsetDateTime::from_unix_timestamp_nanos(millis.checked_mul(1_000_000)?).ok()
}
