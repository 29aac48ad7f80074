//! Credential passwords and session tokens, kept out of logs.

// self
use crate::_prelude::*;

const REDACTED: &str = "<redacted>";

/// Password or token whose formatters print a placeholder.
///
/// Serde still sees the real value so credentials can cross process boundaries; use
/// [`Secret::expose`] at the point of use and nowhere else.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);
impl Secret {
	/// Takes ownership of `value`.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Plain-text value for handing to a database driver.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Whether the backend handed back an empty value.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl From<String> for Secret {
	fn from(value: String) -> Self {
		Self(value)
	}
}
impl Debug for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Secret({REDACTED:?})")
	}
}
impl Display for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(REDACTED)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn formatting_never_leaks_the_value() {
		let password = Secret::from(String::from("p@ssw0rd"));

		assert_eq!(format!("{password:?}"), "Secret(\"<redacted>\")");
		assert_eq!(password.to_string(), "<redacted>");
		assert_eq!(password.expose(), "p@ssw0rd");
		assert!(!password.is_empty());
	}

	#[test]
	fn serde_carries_the_plain_value() {
		let token = Secret::new("s.token");

		assert_eq!(serde_json::to_string(&token).expect("Secret should serialize."), "\"s.token\"");
	}
}
