//! Clock abstraction so credential expiry can be tested without sleeping.

// self
use crate::_prelude::*;

/// Source of the current instant used by expiry checks.
pub trait Clock
where
	Self: 'static + Send + Sync,
{
	/// Returns the current instant.
	fn now(&self) -> OffsetDateTime;
}

/// Production clock backed by the system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Settable clock for tests and simulations.
///
/// Cloning shares the underlying instant, so a clock handed to a [`TokenCache`](crate::auth::TokenCache)
/// can still be advanced by the test that created it.
#[derive(Clone, Debug)]
pub struct ManualClock(Arc<Mutex<OffsetDateTime>>);
impl ManualClock {
	/// Creates a clock frozen at the provided instant.
	pub fn starting_at(instant: OffsetDateTime) -> Self {
		Self(Arc::new(Mutex::new(instant)))
	}

	/// Moves the clock forward by the provided duration.
	pub fn advance(&self, delta: Duration) {
		let mut instant = self.0.lock();

		*instant += delta;
	}

	/// Replaces the current instant.
	pub fn set(&self, instant: OffsetDateTime) {
		*self.0.lock() = instant;
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.lock()
	}
}
