//! Transport primitives for outgoing API requests.
//!
//! The module exposes the [`Transport`] capability alongside the owned [`Request`] and
//! [`Response`] value types so downstream crates can integrate custom HTTP stacks. A
//! transport receives a fully-built request and returns either a response (whatever its
//! status) or a transport-level failure; classification of statuses, retries, and
//! redirects all happen above this seam in the [`pipeline`](crate::pipeline).

// std
use std::{borrow::Cow, ops::Deref};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};

/// Boxed future returned by [`Transport::call`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<Response, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing a single request exchange.
///
/// The trait is the crate's only dependency on an HTTP stack. Implementations must be
/// `Send + Sync + 'static` so one transport instance can be shared by concurrent logical
/// calls, and the returned future must be `Send` so pipeline futures can hop executors.
/// Implementations must not follow redirects themselves; the pipeline owns redirect
/// handling, including the cross-domain header-safety rule.
pub trait Transport
where
	Self: 'static + Send + Sync,
{
	/// Executes the request and returns the raw response.
	///
	/// Error statuses are not failures at this layer: any response obtained from the
	/// server resolves to `Ok`, and `Err` is reserved for transport-level problems
	/// (DNS, TCP, TLS, I/O).
	fn call(&self, request: Request) -> TransportFuture<'_>;
}

/// Owned outgoing request value: method, URL, headers, and an optional body.
#[derive(Clone, Debug)]
pub struct Request {
	method: Method,
	url: Url,
	headers: HeaderMap,
	body: Option<Vec<u8>>,
}
impl Request {
	/// Creates a request with no headers and no body.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: None }
	}

	/// Convenience constructor for a GET request from a raw URL string.
	pub fn get(url: &str) -> Result<Self, ConfigError> {
		Ok(Self::new(Method::GET, parse_url(url)?))
	}

	/// Convenience constructor for a POST request from a raw URL string.
	pub fn post(url: &str) -> Result<Self, ConfigError> {
		Ok(Self::new(Method::POST, parse_url(url)?))
	}

	/// Adds a header, replacing any previous value under the same name.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Attaches a request body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Returns the request method.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Returns the request URL.
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// Returns the request host, when the URL carries one.
	pub fn host(&self) -> Option<&str> {
		self.url.host_str()
	}

	/// Returns the request headers.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Returns a mutable view of the request headers.
	pub fn headers_mut(&mut self) -> &mut HeaderMap {
		&mut self.headers
	}

	/// Returns the request body, if one is attached.
	pub fn body(&self) -> Option<&[u8]> {
		self.body.as_deref()
	}

	/// Decomposes the request for transport implementations.
	pub fn into_parts(self) -> (Method, Url, HeaderMap, Option<Vec<u8>>) {
		(self.method, self.url, self.headers, self.body)
	}

	pub(crate) fn from_parts(
		method: Method,
		url: Url,
		headers: HeaderMap,
		body: Option<Vec<u8>>,
	) -> Self {
		Self { method, url, headers, body }
	}
}

/// Owned response value: status, headers, and the fully-read body.
#[derive(Clone, Debug)]
pub struct Response {
	status: StatusCode,
	headers: HeaderMap,
	body: Vec<u8>,
}
impl Response {
	/// Assembles a response from its parts.
	pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
		Self { status, headers, body }
	}

	/// Returns the response status code.
	pub fn status(&self) -> StatusCode {
		self.status
	}

	/// Returns the response headers.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Returns the first value of the named header as ASCII text.
	pub fn header_str(&self, name: &HeaderName) -> Option<&str> {
		self.headers.get(name).and_then(|value| value.to_str().ok())
	}

	/// Returns the response body bytes.
	pub fn body(&self) -> &[u8] {
		&self.body
	}

	/// Consumes the response and returns the body bytes.
	pub fn into_body(self) -> Vec<u8> {
		self.body
	}

	/// Returns the body decoded as text, replacing invalid UTF-8.
	pub fn text(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(&self.body)
	}

	/// Extracts a human-readable error message from the response.
	///
	/// Well-known JSON message fields are preferred; otherwise a snippet of the raw
	/// body is used, falling back to the status line's canonical reason.
	pub fn server_message(&self) -> String {
		if let Some(message) = json_message(&self.body) {
			return message;
		}

		let text = self.text();
		let trimmed = text.trim();

		if !trimmed.is_empty() {
			return snippet(trimmed);
		}

		self.status.canonical_reason().unwrap_or("unknown error").to_owned()
	}
}

const MESSAGE_SNIPPET_LEN: usize = 256;

fn parse_url(url: &str) -> Result<Url, ConfigError> {
	Url::parse(url).map_err(|source| ConfigError::InvalidUrl { source })
}

fn json_message(body: &[u8]) -> Option<String> {
	let value = serde_json::from_slice::<serde_json::Value>(body).ok()?;

	for key in ["message", "error_description", "errorMessage"] {
		if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
			return Some(text.to_owned());
		}
	}
	if let Some(error) = value.get("error") {
		if let Some(text) = error.as_str() {
			return Some(text.to_owned());
		}
		if let Some(text) = error.get("message").and_then(|v| v.as_str()) {
			return Some(text.to_owned());
		}
	}
	if let Some(text) = value
		.get("errors")
		.and_then(|errors| errors.as_array())
		.and_then(|errors| errors.first())
		.and_then(|first| first.get("message"))
		.and_then(|message| message.as_str())
	{
		return Some(text.to_owned());
	}

	None
}

fn snippet(text: &str) -> String {
	if text.len() <= MESSAGE_SNIPPET_LEN {
		return text.to_owned();
	}

	let mut end = MESSAGE_SNIPPET_LEN;

	while !text.is_char_boundary(end) {
		end -= 1;
	}

	text[..end].to_owned()
}

/// Thin wrapper around [`ReqwestClient`] implementing [`Transport`].
///
/// The wrapped client must not follow redirects on its own; the pipeline re-issues
/// redirected requests itself so it can enforce the hop limit and strip sensitive
/// headers across trust domains. [`ReqwestTransport::new`] configures this, and any
/// custom client passed to [`ReqwestTransport::with_client`] must do the same.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport(ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a transport with redirect following disabled.
	pub fn new() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(ConfigError::http_client_build)?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
	fn call(&self, request: Request) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let (method, url, headers, body) = request.into_parts();
			let mut builder = client.request(method, url).headers(headers);

			if let Some(body) = body {
				builder = builder.body(body);
			}

			let response = builder.send().await.map_err(TransportError::from)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await.map_err(TransportError::from)?.to_vec();

			Ok(Response::new(status, headers, body))
		})
	}
}
