//! File-backed [`CredentialStore`] that survives process restarts.
//!
//! The file holds one JSON object keyed by [`StoreKey`] labels, for example
//! `{"access-token": "...", "device-id": "..."}`. Every mutation writes a sibling `.tmp` file and
//! renames it over the original, so a crash leaves either the old or the new snapshot.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{self, CompareAndSwapOutcome, CredentialStore, StoreError, StoreFuture, StoreKey},
};

type Snapshot = HashMap<StoreKey, String>;

/// One file is one installation namespace.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	entries: Arc<RwLock<Snapshot>>,
}
impl FileStore {
	/// Opens the store at `path`, creating parent directories and loading any existing snapshot.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| io_failure("create directory", parent, e))?;
		}

		let entries = read_snapshot(&path)?;

		Ok(Self { path, entries: Arc::new(RwLock::new(entries)) })
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Applies `change` to a copy of the entries and commits it once the file is written.
	///
	/// `change` returns whether anything changed; unchanged snapshots skip the disk write.
	fn mutate<T>(&self, change: impl FnOnce(&mut Snapshot) -> (T, bool)) -> Result<T, StoreError> {
		let mut entries = self.entries.write();
		let mut next = entries.clone();
		let (value, changed) = change(&mut next);

		if changed {
			write_snapshot(&self.path, &next)?;

			*entries = next;
		}

		Ok(value)
	}
}
impl CredentialStore for FileStore {
	fn fetch<'a>(&'a self, keys: &'a [StoreKey]) -> StoreFuture<'a, Vec<Option<String>>> {
		let entries = self.entries.read();
		let values = keys.iter().map(|key| entries.get(key).cloned()).collect();

		Box::pin(async move { Ok(values) })
	}

	fn save(&self, batch: Vec<(StoreKey, String)>) -> StoreFuture<'_, ()> {
		let result = self.mutate(|entries| {
			entries.extend(batch);

			((), true)
		});

		Box::pin(async move { result })
	}

	fn remove<'a>(&'a self, keys: &'a [StoreKey]) -> StoreFuture<'a, usize> {
		let result = self.mutate(|entries| {
			let removed = keys.iter().filter(|key| entries.remove(key).is_some()).count();

			(removed, removed > 0)
		});

		Box::pin(async move { result })
	}

	fn compare_and_swap<'a>(
		&'a self,
		guard: StoreKey,
		expected: Option<&'a str>,
		batch: Vec<(StoreKey, String)>,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		let result = self.mutate(|entries| {
			let outcome = store::cas_apply(entries, guard, expected, batch);

			(outcome, outcome == CompareAndSwapOutcome::Updated)
		});

		Box::pin(async move { result })
	}

	fn compare_and_remove<'a>(
		&'a self,
		guard: StoreKey,
		expected: &'a str,
		keys: &'a [StoreKey],
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		let result = self.mutate(|entries| {
			let outcome = store::cas_remove(entries, guard, expected, keys);

			(outcome, outcome == CompareAndSwapOutcome::Updated)
		});

		Box::pin(async move { result })
	}
}

fn read_snapshot(path: &Path) -> Result<Snapshot, StoreError> {
	let bytes = match fs::read(path) {
		Ok(bytes) => bytes,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Snapshot::new()),
		Err(e) => return Err(io_failure("read", path, e)),
	};

	if bytes.iter().all(u8::is_ascii_whitespace) {
		return Ok(Snapshot::new());
	}

	serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
		message: format!("Failed to parse {}: {e}", path.display()),
	})
}

fn write_snapshot(path: &Path, entries: &Snapshot) -> Result<(), StoreError> {
	// Sorted so the file diffs cleanly between writes.
	let sorted: BTreeMap<_, _> = entries.iter().collect();
	let payload = serde_json::to_vec_pretty(&sorted).map_err(|e| StoreError::Serialization {
		message: format!("Failed to encode store snapshot: {e}"),
	})?;
	let tmp = path.with_extension("tmp");
	let mut file = File::create(&tmp).map_err(|e| io_failure("create", &tmp, e))?;

	file.write_all(&payload).map_err(|e| io_failure("write", &tmp, e))?;
	file.sync_all().map_err(|e| io_failure("sync", &tmp, e))?;
	drop(file);

	fs::rename(&tmp, path).map_err(|e| io_failure("replace", path, e))
}

fn io_failure(action: &str, path: &Path, e: std::io::Error) -> StoreError {
	StoreError::Backend { message: format!("Failed to {action} {}: {e}", path.display()) }
}
