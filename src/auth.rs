//! Bearer-credential domain: redacted secrets, cached credentials, token sources, and the
//! authenticator capability that stamps outgoing requests.

pub mod bearer;
pub mod cache;
pub mod credential;
pub mod secret;
pub mod source;

pub use bearer::*;
pub use cache::*;
pub use credential::*;
pub use secret::*;
pub use source::*;

// self
use crate::{_prelude::*, http::Request};

/// Boxed future returned by [`Authenticator::authenticate`].
pub type AuthenticateFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + 'a + Send>>;

/// Capability that attaches valid credentials to an outgoing request.
///
/// Implementations must be cheap to call when credentials are already fresh; the
/// pipeline invokes them once per attempt so a token refreshed mid-chain is picked up
/// by the next resubmission.
pub trait Authenticator
where
	Self: Send + Sync,
{
	/// Ensures a valid credential and stamps it onto the request.
	fn authenticate<'a>(&'a self, request: &'a mut Request) -> AuthenticateFuture<'a>;
}
