//! Session-domain models: redacted secrets, credential pairs, and the device identity.

pub mod credential;
pub mod device;
pub mod secret;

pub use credential::*;
pub use device::*;
pub use secret::*;
