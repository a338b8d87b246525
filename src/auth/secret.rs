//! Redacting wrapper for credential material.

// self
use crate::_prelude::*;

/// Redacted wrapper for bearer tokens, API keys, and client secrets.
///
/// Formatting never reveals the inner value, so secrets can safely travel through
/// logs, spans, and error chains.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSecret(String);
impl AuthSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for AuthSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for AuthSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("AuthSecret").field(&"<redacted>").finish()
	}
}
impl Display for AuthSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
