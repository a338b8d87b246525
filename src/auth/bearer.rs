//! Bearer authenticator stamping `Authorization: Bearer <token>` onto requests.

// crates.io
use http::header::AUTHORIZATION;
// self
use crate::{
	_prelude::*,
	auth::{AuthenticateFuture, Authenticator, cache::TokenCache, secret::AuthSecret},
	error::AuthError,
	http::Request,
};

/// Produces valid bearer tokens and attaches them to outgoing requests.
///
/// Two modes exist: a caller-supplied static token, returned unconditionally with no
/// expiry tracking, and a managed mode backed by a shared [`TokenCache`] that refreshes
/// through its token source when the cached credential grows stale.
#[derive(Clone, Debug)]
pub struct BearerAuthenticator {
	mode: BearerMode,
}
impl BearerAuthenticator {
	/// Creates an authenticator that always serves the provided token.
	pub fn with_static_token(token: impl Into<String>) -> Self {
		Self { mode: BearerMode::Static(AuthSecret::new(token)) }
	}

	/// Creates an authenticator backed by a shared [`TokenCache`].
	pub fn with_cache(cache: Arc<TokenCache>) -> Self {
		Self { mode: BearerMode::Managed(cache) }
	}

	/// Returns a currently valid bearer token, refreshing the managed cache if needed.
	pub async fn bearer(&self) -> Result<AuthSecret> {
		match &self.mode {
			BearerMode::Static(token) => Ok(token.clone()),
			BearerMode::Managed(cache) => cache.bearer().await,
		}
	}
}
impl Authenticator for BearerAuthenticator {
	fn authenticate<'a>(&'a self, request: &'a mut Request) -> AuthenticateFuture<'a> {
		Box::pin(async move {
			let token = self.bearer().await?;

			request.headers_mut().insert(AUTHORIZATION, bearer_header_value(&token)?);

			Ok(())
		})
	}
}

#[derive(Clone, Debug)]
enum BearerMode {
	Static(AuthSecret),
	Managed(Arc<TokenCache>),
}

fn bearer_header_value(token: &AuthSecret) -> Result<HeaderValue> {
	let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose()))
		.map_err(|_| AuthError::UnencodableCredential)?;

	value.set_sensitive(true);

	Ok(value)
}
