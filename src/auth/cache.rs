//! Shared credential cache with single-flight refresh.

// self
use crate::{
	_prelude::*,
	auth::{credential::Credential, secret::AuthSecret, source::TokenSource},
	clock::Clock,
	obs::{self, Outcome, Stage},
};

/// Caches one bearer [`Credential`] and refreshes it through a pluggable
/// [`TokenSource`].
///
/// The cache is the only state shared between concurrent logical calls. Reads take a
/// short lock on the credential slot; a refresh serializes on an async guard so that
/// callers observing a stale token at the same time produce exactly one token-endpoint
/// call and all await its result. A failed refresh is surfaced to every waiting caller
/// and never overwrites the slot.
pub struct TokenCache {
	source: Arc<dyn TokenSource>,
	clock: Arc<dyn Clock>,
	slot: RwLock<Option<Credential>>,
	refresh_guard: AsyncMutex<()>,
}
impl TokenCache {
	/// Creates a cache that refreshes through the provided source and clock.
	pub fn new(source: Arc<dyn TokenSource>, clock: Arc<dyn Clock>) -> Self {
		Self { source, clock, slot: RwLock::new(None), refresh_guard: AsyncMutex::new(()) }
	}

	/// Replaces the cached credential with a caller-supplied one.
	pub fn replace(&self, credential: Credential) {
		*self.slot.write() = Some(credential);
	}

	/// Drops the cached credential, forcing the next [`bearer`](Self::bearer) call to refresh.
	pub fn invalidate(&self) {
		*self.slot.write() = None;
	}

	/// Returns a currently valid bearer token, refreshing first when the cached
	/// credential is missing or past 80% of its time-to-live.
	pub async fn bearer(&self) -> Result<AuthSecret> {
		if let Some(token) = self.fresh_token() {
			return Ok(token);
		}

		let _refresh = self.refresh_guard.lock().await;

		// Another caller may have completed the refresh while we waited on the guard.
		if let Some(token) = self.fresh_token() {
			return Ok(token);
		}

		obs::record_stage_outcome(Stage::TokenRefresh, Outcome::Attempt);

		let credential = match self.source.fetch().await {
			Ok(credential) => credential,
			Err(err) => {
				obs::record_stage_outcome(Stage::TokenRefresh, Outcome::Failure);

				return Err(err);
			},
		};
		let token = credential.token().clone();

		*self.slot.write() = Some(credential);

		obs::record_stage_outcome(Stage::TokenRefresh, Outcome::Success);

		Ok(token)
	}

	fn fresh_token(&self) -> Option<AuthSecret> {
		let now = self.clock.now();

		self.slot
			.read()
			.as_ref()
			.filter(|credential| !credential.needs_refresh_at(now))
			.map(|credential| credential.token().clone())
	}
}
impl Debug for TokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCache").field("cached", &self.slot.read().is_some()).finish()
	}
}
