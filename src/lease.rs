//! Lease-domain identifiers, redacted secrets, and immutable lease records.

pub mod id;
pub mod record;
pub mod secret;

pub use id::*;
pub use record::*;
pub use secret::*;
