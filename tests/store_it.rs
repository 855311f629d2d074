mod common;

// std
use std::path::PathBuf;
// crates.io
use session_broker::{auth::DeviceIdentity, store::FileStore};
// self
use common::*;

fn scratch_path(name: &str) -> PathBuf {
	let path = std::env::temp_dir()
		.join(format!("session-broker-{name}-{}.json", DeviceIdentity::generate_id()));
	let _ = std::fs::remove_file(&path);

	path
}

#[tokio::test]
async fn concurrent_device_identity_creation_converges() {
	let store = MemoryStore::default();
	let vault = CredentialVault::new(Arc::new(store.clone()), "test-device");
	let tasks: Vec<_> = (0..8)
		.map(|_| {
			let vault = vault.clone();

			tokio::spawn(async move { vault.device_identity().await })
		})
		.collect();
	let mut ids = Vec::new();

	for task in tasks {
		let identity =
			task.await.expect("Task should not panic.").expect("Identity should be created.");

		ids.push(identity.device_id);
	}

	ids.dedup();

	assert_eq!(ids.len(), 1);
	assert_eq!(store.peek(StoreKey::DeviceId), ids.pop());
}

#[tokio::test]
async fn file_store_survives_a_restart() {
	let path = scratch_path("restart");
	let backend = Arc::new(ScriptedBackend::default());
	let first = TokenCoordinator::builder(
		Arc::new(FileStore::open(&path).expect("File store should open.")),
		backend.clone(),
	)
	.build()
	.expect("Coordinator should build.");

	first
		.save_grant(TokenGrant::new("access-0", "refresh-0", 3_600))
		.await
		.expect("Saving a grant should succeed.");

	let device = first.device_identity().await.expect("Identity should exist.");

	first.dispose();
	drop(first);

	let second = TokenCoordinator::builder(
		Arc::new(FileStore::open(&path).expect("File store should reopen.")),
		backend.clone(),
	)
	.build()
	.expect("Coordinator should build.");

	second.init().await.expect("Init should succeed.");

	assert_eq!(
		second.get_valid_credential().await.expect("Lookup should succeed."),
		Some(TokenSecret::new("access-0"))
	);
	assert_eq!(second.device_identity().await.expect("Identity should load."), device);
	assert!(second.has_scheduled_renewal());

	second.logout().await.expect("Logout should succeed.");

	assert!(second.credentials().await.expect("Lookup should succeed.").is_none());
	assert_eq!(backend.logout_requests.lock().len(), 1);

	second.dispose();

	let _ = std::fs::remove_file(&path);
}
