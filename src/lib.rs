//! Keep a client continuously authenticated against a backend that issues short-lived access
//! tokens and long-lived, rotating refresh tokens.
//!
//! The crate is built around four collaborators:
//!
//! - [`store::CredentialStore`] persists the credential pair and the device identity, with
//!   [`store::CredentialVault`] adapting the raw key/value layout into typed records.
//! - [`session::TokenCoordinator`] owns refresh scheduling, single-flight deduplication,
//!   retry/backoff, and event emission.
//! - [`interceptor::RequestInterceptor`] attaches the bearer credential to outbound calls and
//!   performs at most one coordinated refresh-and-replay when a call comes back unauthorized.
//! - [`events::SessionEventBus`] fans session events out to in-process observers.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod backend;
pub mod error;
pub mod events;
pub mod http;
pub mod interceptor;
pub mod obs;
pub mod session;
pub mod store;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::{Arc, Weak},
	};

	pub use async_lock::OnceCell as AsyncOnceCell;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use httpmock as _;
