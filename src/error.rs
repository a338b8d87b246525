//! Crate-level error types shared across the pipeline, policies, and credential layer.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Credential acquisition or refresh failure.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Redirect protocol violation; never retried.
	#[error(transparent)]
	Protocol(#[from] ProtocolError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Terminal HTTP error response after retries were exhausted or skipped.
	#[error(transparent)]
	Response(#[from] ResponseError),

	/// The logical call was cancelled before completion.
	#[error("Request was cancelled before completion.")]
	Cancelled,
}

/// Configuration and validation failures raised before a request leaves the process.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Request URL cannot be parsed.
	#[error("Request URL is invalid.")]
	InvalidUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Credential acquisition failures; cached tokens are never served in their place.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// Token endpoint answered with an error status.
	#[error("Token endpoint rejected the request with status {status}: {message}.")]
	Endpoint {
		/// HTTP status code returned by the token endpoint.
		status: u16,
		/// Server-supplied message parsed from the error body.
		message: String,
	},
	/// Token endpoint responded with JSON that could not be decoded.
	#[error("Token endpoint returned a malformed token response.")]
	ResponseParse {
		/// Structured parsing failure with the offending JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the malformed response.
		status: u16,
	},
	/// Token endpoint granted an invalid credential lifetime.
	#[error("Token endpoint granted an invalid credential lifetime.")]
	InvalidLifetime(#[from] crate::auth::CredentialError),
	/// Credential material cannot be carried in an HTTP header.
	#[error("Credential cannot be encoded into an Authorization header.")]
	UnencodableCredential,
}

/// Redirect protocol violations raised while following a response chain.
#[derive(Debug, ThisError)]
pub enum ProtocolError {
	/// Redirect response carried no usable `Location` header.
	#[error("Redirect response {status} is missing a Location header.")]
	MissingLocation {
		/// Status code of the offending redirect response.
		status: u16,
	},
	/// `Location` header could not be resolved into a URL.
	#[error("Redirect Location header cannot be resolved.")]
	InvalidLocation {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Redirect target switches the URL scheme of the original request.
	#[error("Redirect changes the request scheme from {expected} to {found}.")]
	SchemeMismatch {
		/// Scheme of the original request chain.
		expected: String,
		/// Scheme of the rejected redirect target.
		found: String,
	},
	/// Redirect chain exceeded the configured hop limit.
	#[error("Too many redirects; gave up after {hops} hops.")]
	TooManyRedirects {
		/// Number of hops already followed.
		hops: u32,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while sending the request.")]
	Io(#[from] std::io::Error),
	/// TLS handshake failure; surfaced separately only to sharpen the message.
	#[error(
		"TLS handshake failed while connecting to the server; verify the endpoint's certificate \
		 configuration."
	)]
	Tls {
		/// Transport-specific handshake error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Wraps a transport-specific TLS handshake error.
	pub fn tls(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Tls { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if error_chain_mentions_tls(&e) {
			Self::tls(e)
		} else {
			Self::network(e)
		}
	}
}

/// Terminal HTTP error carrying the status code and the parsed server message.
#[derive(Debug, ThisError)]
#[error("Server returned {status}: {message}.")]
pub struct ResponseError {
	/// Terminal HTTP status code.
	pub status: StatusCode,
	/// Server-supplied message parsed from the response body.
	pub message: String,
}

#[cfg(feature = "reqwest")]
fn error_chain_mentions_tls(error: &(dyn StdError + 'static)) -> bool {
	let mut current: Option<&(dyn StdError + 'static)> = Some(error);

	while let Some(err) = current {
		let text = err.to_string().to_ascii_lowercase();

		if ["certificate", "handshake", "tls", "ssl"].iter().any(|needle| text.contains(needle)) {
			return true;
		}

		current = err.source();
	}

	false
}
