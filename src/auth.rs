//! Backend access sessions: pluggable handshakes and the single-flight [`AuthProvider`].

pub mod provider;
pub mod session;

pub use provider::*;
pub use session::*;
