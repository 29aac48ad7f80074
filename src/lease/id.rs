//! Strongly typed identifiers for roles, credentials, and revocation handles.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Validates `value` and takes an owned copy.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 256;

/// Rejected identifier, tagged with the kind that was being built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// Nothing to identify by.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// `Role`, `Credential`, or `RevocationToken`.
		kind: &'static str,
	},
	/// Whitespace and control characters never appear in backend paths.
	#[error("{kind} identifier contains the forbidden character {found:?}.")]
	ForbiddenCharacter {
		/// `Role`, `Credential`, or `RevocationToken`.
		kind: &'static str,
		/// First offending character.
		found: char,
	},
	/// Longer than backends accept in a path segment.
	#[error("{kind} identifier is longer than {max} bytes.")]
	TooLong {
		/// `Role`, `Credential`, or `RevocationToken`.
		kind: &'static str,
		/// Byte limit.
		max: usize,
	},
}

def_id! { RoleName, "Named backend policy under which leases are requested.", "Role" }
def_id! { CredentialId, "Opaque backend-assigned identifier of an issued credential.", "Credential" }
def_id! { RevocationToken, "Opaque handle used to revoke a lease early.", "RevocationToken" }

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}
	if let Some(found) = view.chars().find(|c| c.is_whitespace() || c.is_control()) {
		return Err(IdentifierError::ForbiddenCharacter { kind, found });
	}

	Ok(())
}
