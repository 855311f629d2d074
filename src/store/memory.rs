//! Thread-safe in-memory [`CredentialStore`] for tests and ephemeral sessions.

// self
use crate::{
	_prelude::*,
	store::{self, CompareAndSwapOutcome, CredentialStore, StoreFuture, StoreKey},
};

type StoreMap = Arc<RwLock<HashMap<StoreKey, String>>>;

/// Storage backend that keeps entries in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Returns the raw value stored under `key`, bypassing the async contract.
	pub fn peek(&self, key: StoreKey) -> Option<String> {
		self.0.read().get(&key).cloned()
	}

	/// Returns `true` when no entries are stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn fetch_now(map: StoreMap, keys: &[StoreKey]) -> Vec<Option<String>> {
		let guard = map.read();

		keys.iter().map(|key| guard.get(key).cloned()).collect()
	}

	fn remove_now(map: StoreMap, keys: &[StoreKey]) -> usize {
		let mut guard = map.write();

		keys.iter().filter(|key| guard.remove(key).is_some()).count()
	}
}
impl CredentialStore for MemoryStore {
	fn fetch<'a>(&'a self, keys: &'a [StoreKey]) -> StoreFuture<'a, Vec<Option<String>>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::fetch_now(map, keys)) })
	}

	fn save(&self, entries: Vec<(StoreKey, String)>) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().extend(entries);

			Ok(())
		})
	}

	fn remove<'a>(&'a self, keys: &'a [StoreKey]) -> StoreFuture<'a, usize> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::remove_now(map, keys)) })
	}

	fn compare_and_swap<'a>(
		&'a self,
		guard: StoreKey,
		expected: Option<&'a str>,
		entries: Vec<(StoreKey, String)>,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		let map = self.0.clone();

		Box::pin(async move { Ok(store::cas_apply(&mut map.write(), guard, expected, entries)) })
	}

	fn compare_and_remove<'a>(
		&'a self,
		guard: StoreKey,
		expected: &'a str,
		keys: &'a [StoreKey],
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		let map = self.0.clone();

		Box::pin(async move { Ok(store::cas_remove(&mut map.write(), guard, expected, keys)) })
	}
}
