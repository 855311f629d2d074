//! Storage contracts and built-in key/value stores for session credentials.
//!
//! A [`CredentialStore`] is deliberately dumb: it maps a handful of well-known [`StoreKey`]s to
//! strings, applies batches atomically, and offers a single compare-and-swap primitive. The
//! typed view (credential pairs, expiry math, device identity) lives in [`CredentialVault`].

pub mod file;
pub mod memory;
pub mod vault;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use vault::CredentialVault;

// self
use crate::_prelude::*;

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Key/value persistence contract for one client installation.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Reads the provided keys from one consistent snapshot, preserving order.
	fn fetch<'a>(&'a self, keys: &'a [StoreKey]) -> StoreFuture<'a, Vec<Option<String>>>;

	/// Writes every entry atomically.
	fn save(&self, entries: Vec<(StoreKey, String)>) -> StoreFuture<'_, ()>;

	/// Removes the provided keys atomically, returning how many were present.
	fn remove<'a>(&'a self, keys: &'a [StoreKey]) -> StoreFuture<'a, usize>;

	/// Writes `entries` only if the current value of `guard` equals `expected`.
	fn compare_and_swap<'a>(
		&'a self,
		guard: StoreKey,
		expected: Option<&'a str>,
		entries: Vec<(StoreKey, String)>,
	) -> StoreFuture<'a, CompareAndSwapOutcome>;

	/// Removes `keys` only if the current value of `guard` equals `expected`.
	fn compare_and_remove<'a>(
		&'a self,
		guard: StoreKey,
		expected: &'a str,
		keys: &'a [StoreKey],
	) -> StoreFuture<'a, CompareAndSwapOutcome>;
}

/// Persisted key layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreKey {
	/// Bearer credential string.
	AccessToken,
	/// Opaque long-lived credential string.
	RefreshToken,
	/// Absolute expiry in epoch milliseconds.
	ExpiresAt,
	/// Lifetime in seconds as returned by the backend.
	ExpiresIn,
	/// Stable per-installation identifier.
	DeviceId,
}
impl StoreKey {
	/// Keys that make up the credential pair; cleared together.
	pub const CREDENTIALS: [StoreKey; 4] =
		[StoreKey::AccessToken, StoreKey::RefreshToken, StoreKey::ExpiresAt, StoreKey::ExpiresIn];
}

/// Result of a compare-and-swap attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAndSwapOutcome {
	/// The guard matched the expected value and the entries were written.
	Updated,
	/// The guard holds a different value; nothing was written.
	Mismatch,
	/// The guard is absent while a value was expected; nothing was written.
	Missing,
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Compares the guard against `expected` without touching the map.
pub(crate) fn cas_check(
	map: &HashMap<StoreKey, String>,
	guard: StoreKey,
	expected: Option<&str>,
) -> CompareAndSwapOutcome {
	match (map.get(&guard).map(String::as_str), expected) {
		(None, None) => CompareAndSwapOutcome::Updated,
		(Some(current), Some(expected)) if current == expected => CompareAndSwapOutcome::Updated,
		(None, Some(_)) => CompareAndSwapOutcome::Missing,
		_ => CompareAndSwapOutcome::Mismatch,
	}
}

/// Applies compare-and-swap semantics to a map snapshot; shared by the built-in stores.
pub(crate) fn cas_apply(
	map: &mut HashMap<StoreKey, String>,
	guard: StoreKey,
	expected: Option<&str>,
	entries: Vec<(StoreKey, String)>,
) -> CompareAndSwapOutcome {
	let outcome = cas_check(map, guard, expected);

	if outcome == CompareAndSwapOutcome::Updated {
		map.extend(entries);
	}

	outcome
}

/// Removes `keys` when the guard still holds `expected`; shared by the built-in stores.
pub(crate) fn cas_remove(
	map: &mut HashMap<StoreKey, String>,
	guard: StoreKey,
	expected: &str,
	keys: &[StoreKey],
) -> CompareAndSwapOutcome {
	let outcome = cas_check(map, guard, Some(expected));

	if outcome == CompareAndSwapOutcome::Updated {
		for key in keys {
			map.remove(key);
		}
	}

	outcome
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn store_keys_use_kebab_case_labels() {
		let payload =
			serde_json::to_string(&StoreKey::ExpiresAt).expect("StoreKey should serialize.");

		assert_eq!(payload, "\"expires-at\"");

		let labels: Vec<_> = StoreKey::CREDENTIALS
			.iter()
			.map(|key| serde_json::to_string(key).expect("StoreKey should serialize."))
			.collect();

		assert_eq!(
			labels,
			["\"access-token\"", "\"refresh-token\"", "\"expires-at\"", "\"expires-in\""]
		);
	}

	#[test]
	fn guarded_removal_only_fires_on_a_match() {
		let mut map = HashMap::from([
			(StoreKey::AccessToken, "a9".to_owned()),
			(StoreKey::RefreshToken, "r9".to_owned()),
			(StoreKey::DeviceId, "d".to_owned()),
		]);

		assert_eq!(
			cas_remove(&mut map, StoreKey::RefreshToken, "r0", &StoreKey::CREDENTIALS),
			CompareAndSwapOutcome::Mismatch
		);
		assert_eq!(map.len(), 3);
		assert_eq!(
			cas_remove(&mut map, StoreKey::RefreshToken, "r9", &StoreKey::CREDENTIALS),
			CompareAndSwapOutcome::Updated
		);
		assert_eq!(map.keys().collect::<Vec<_>>(), vec![&StoreKey::DeviceId]);
		assert_eq!(
			cas_remove(&mut map, StoreKey::RefreshToken, "r9", &StoreKey::CREDENTIALS),
			CompareAndSwapOutcome::Missing
		);
	}

	#[test]
	fn cas_covers_match_mismatch_and_missing() {
		let mut map = HashMap::new();
		let entries = || vec![(StoreKey::AccessToken, "a2".to_owned())];

		assert_eq!(
			cas_apply(&mut map, StoreKey::RefreshToken, Some("r1"), entries()),
			CompareAndSwapOutcome::Missing
		);
		assert!(map.is_empty());

		map.insert(StoreKey::RefreshToken, "r1".to_owned());

		assert_eq!(
			cas_apply(&mut map, StoreKey::RefreshToken, Some("other"), entries()),
			CompareAndSwapOutcome::Mismatch
		);
		assert_eq!(
			cas_apply(&mut map, StoreKey::RefreshToken, None, entries()),
			CompareAndSwapOutcome::Mismatch
		);
		assert_eq!(
			cas_apply(&mut map, StoreKey::RefreshToken, Some("r1"), entries()),
			CompareAndSwapOutcome::Updated
		);
		assert_eq!(map.get(&StoreKey::AccessToken).map(String::as_str), Some("a2"));
	}
}
