//! Redirect following with a hop limit and a cross-domain header-safety rule.
//!
//! A redirect chain is evaluated hop by hop: the `Location` header is resolved against
//! the current request URL, scheme changes are rejected, body-bearing methods are
//! downgraded to GET outside 307/308, and sensitive headers are stripped whenever the
//! target host leaves the trust domain the chain started in. Once stripped, credentials
//! are never re-attached for the remainder of the chain.

// crates.io
use http::header::{
	AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, LOCATION, TRANSFER_ENCODING,
	WWW_AUTHENTICATE,
};
// self
use crate::{
	_prelude::*,
	error::ProtocolError,
	http::{Request, Response},
};

/// Default ceiling on followed redirects per logical request chain.
pub const DEFAULT_MAX_HOPS: u32 = 10;

const COOKIE2: HeaderName = HeaderName::from_static("cookie2");

/// Returns `true` for the redirect status codes this crate follows.
pub fn is_redirect(status: StatusCode) -> bool {
	matches!(status.as_u16(), 300 | 301 | 302 | 303 | 307 | 308)
}

/// Which headers count as sensitive, and which hosts share a trust domain.
#[derive(Clone, Debug)]
pub struct SafeHeaderPolicy {
	sensitive: Vec<HeaderName>,
	trusted_suffix: Option<String>,
}
impl SafeHeaderPolicy {
	/// Creates the policy with the standard sensitive set and no trusted suffix.
	pub fn new() -> Self {
		Self {
			sensitive: vec![AUTHORIZATION, WWW_AUTHENTICATE, COOKIE, COOKIE2],
			trusted_suffix: None,
		}
	}

	/// Declares a domain suffix inside which cross-host redirects keep their headers.
	pub fn with_trusted_suffix(mut self, suffix: impl Into<String>) -> Self {
		self.trusted_suffix = Some(suffix.into().to_ascii_lowercase());

		self
	}

	/// Replaces the sensitive header set.
	pub fn with_sensitive_headers(mut self, headers: impl IntoIterator<Item = HeaderName>) -> Self {
		self.sensitive = headers.into_iter().collect();

		self
	}

	/// Decides whether a redirect from `origin_host` to `target_host` stays inside the
	/// trust domain: same host, or both hosts under the trusted suffix.
	pub fn is_safe(&self, origin_host: Option<&str>, target_host: Option<&str>) -> bool {
		let (Some(origin), Some(target)) = (origin_host, target_host) else {
			return false;
		};

		if origin.eq_ignore_ascii_case(target) {
			return true;
		}

		let Some(suffix) = &self.trusted_suffix else {
			return false;
		};

		origin.to_ascii_lowercase().ends_with(suffix)
			&& target.to_ascii_lowercase().ends_with(suffix)
	}

	/// Removes every sensitive header; removing an absent header is a no-op.
	pub fn strip(&self, headers: &mut HeaderMap) {
		for name in &self.sensitive {
			headers.remove(name);
		}
	}
}
impl Default for SafeHeaderPolicy {
	fn default() -> Self {
		Self::new()
	}
}

/// Per-chain redirect bookkeeping: hops followed plus the origin's scheme and host.
#[derive(Clone, Debug)]
pub struct RedirectState {
	hops: u32,
	original_scheme: String,
	original_host: Option<String>,
}
impl RedirectState {
	/// Captures the chain origin from the initial request.
	pub fn new(request: &Request) -> Self {
		Self {
			hops: 0,
			original_scheme: request.url().scheme().to_owned(),
			original_host: request.host().map(str::to_owned),
		}
	}

	/// Returns the number of redirects already followed.
	pub fn hops(&self) -> u32 {
		self.hops
	}
}

/// Rewritten request for the next hop of a redirect chain.
#[derive(Clone, Debug)]
pub struct RedirectHop {
	/// The request to re-issue.
	pub request: Request,
	/// `true` when the target stays inside the trust domain, so credentials may be
	/// (re)stamped on it; `false` once sensitive headers have been stripped.
	pub trusted: bool,
}

/// Pure redirect decision policy; configuration plus inputs fully determine the output.
#[derive(Clone, Debug, Default)]
pub struct RedirectPolicy {
	max_hops: Option<u32>,
	headers: SafeHeaderPolicy,
}
impl RedirectPolicy {
	/// Creates a policy with the default hop limit and header-safety rule.
	pub fn new() -> Self {
		Self::default()
	}

	/// Overrides the hop limit.
	pub fn with_max_hops(mut self, max_hops: u32) -> Self {
		self.max_hops = Some(max_hops);

		self
	}

	/// Replaces the header-safety policy.
	pub fn with_header_policy(mut self, headers: SafeHeaderPolicy) -> Self {
		self.headers = headers;

		self
	}

	/// Declares the trusted-domain suffix on the underlying header policy.
	pub fn with_trusted_suffix(mut self, suffix: impl Into<String>) -> Self {
		self.headers = self.headers.with_trusted_suffix(suffix);

		self
	}

	/// Evaluates a response against the chain state.
	///
	/// Returns `Ok(None)` for terminal responses, `Ok(Some(hop))` when the redirect
	/// should be followed, and a [`ProtocolError`] when the chain must be abandoned.
	pub fn evaluate(
		&self,
		request: &Request,
		response: &Response,
		state: &mut RedirectState,
	) -> Result<Option<RedirectHop>> {
		let status = response.status();

		if !is_redirect(status) {
			return Ok(None);
		}

		let max_hops = self.max_hops.unwrap_or(DEFAULT_MAX_HOPS);

		if state.hops >= max_hops {
			return Err(ProtocolError::TooManyRedirects { hops: state.hops }.into());
		}

		let location = response
			.header_str(&LOCATION)
			.map(str::trim)
			.filter(|value| !value.is_empty())
			.ok_or_else(|| ProtocolError::MissingLocation { status: status.as_u16() })?;
		let target = request
			.url()
			.join(location)
			.map_err(|source| ProtocolError::InvalidLocation { source })?;

		if target.scheme() != state.original_scheme {
			return Err(ProtocolError::SchemeMismatch {
				expected: state.original_scheme.clone(),
				found: target.scheme().to_owned(),
			}
			.into());
		}

		let (method, _, mut headers, body) = request.clone().into_parts();
		let (method, body) = if matches!(status.as_u16(), 307 | 308)
			|| method == Method::GET
			|| method == Method::HEAD
		{
			(method, body)
		} else {
			headers.remove(TRANSFER_ENCODING);
			headers.remove(CONTENT_LENGTH);
			headers.remove(CONTENT_TYPE);

			(Method::GET, None)
		};
		let trusted = self.headers.is_safe(state.original_host.as_deref(), target.host_str());

		if !trusted {
			self.headers.strip(&mut headers);
		}

		state.hops += 1;

		Ok(Some(RedirectHop { request: Request::from_parts(method, target, headers, body), trusted }))
	}
}
