//! Per-installation device identity.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
// self
use crate::_prelude::*;

/// Stable identifier for this client installation plus a descriptive label.
///
/// The identifier outlives credential lifecycles so the same device can re-authenticate after a
/// logout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIdentity {
	/// Stable per-installation identifier.
	pub device_id: String,
	/// Human-readable client description sent alongside the identifier.
	pub device_info: String,
}
impl DeviceIdentity {
	const ID_BYTES: usize = 16;

	/// Creates an identity from existing parts.
	pub fn new(device_id: impl Into<String>, device_info: impl Into<String>) -> Self {
		Self { device_id: device_id.into(), device_info: device_info.into() }
	}

	/// Generates a fresh random identifier (128 bits, URL-safe base64).
	pub fn generate_id() -> String {
		let mut bytes = [0_u8; Self::ID_BYTES];

		rand::rng().fill_bytes(&mut bytes);

		URL_SAFE_NO_PAD.encode(bytes)
	}
}

/// Default device description built from the crate version and target platform.
pub fn default_device_info() -> String {
	format!(
		"{}/{} ({}; {})",
		env!("CARGO_PKG_NAME"),
		env!("CARGO_PKG_VERSION"),
		std::env::consts::OS,
		std::env::consts::ARCH,
	)
}
