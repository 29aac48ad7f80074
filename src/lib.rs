//! Dynamic database credential lease broker. Obtains short-lived database credentials from a
//! secrets backend, caches them per role, renews them ahead of expiry on independent timers,
//! and revokes the ones it retires.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod backend;
pub mod broker;
pub mod clock;
pub mod config;
pub mod error;
pub mod lease;
pub mod obs;
pub mod scheduler;
pub mod store;

pub use broker::CredentialBroker;
pub use config::BrokerConfig;
pub use error::{Error, LeaseUnavailable, Result};

mod _prelude {
	pub use std::{
		collections::{BTreeSet, HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};

	pub use crate::error::{Error, Result};
}
