//! Deterministic retry policy for transient failures.
//!
//! Retry is indicated for 429, for 500–599 except 501 (a server answering `Not
//! Implemented` will never start supporting the operation), and for transport-level
//! failures. Delays honor a positive-integer `Retry-After` header, clamped to the
//! configured ceiling, and otherwise follow capped exponential backoff. There is no
//! jitter: identical inputs always produce identical delays.

// std
use std::{
	sync::atomic::{AtomicU64, Ordering},
	time::Duration,
};
// crates.io
use http::{HeaderMap, StatusCode, header::RETRY_AFTER};

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Default ceiling on the number of resubmissions per logical request.
pub const DEFAULT_MAX_RETRIES: u32 = 4;
/// Default base interval for exponential backoff.
pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_secs(1);
/// Default ceiling applied to every computed delay.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(30);

/// Classified outcome of one send attempt, as far as retry logic is concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetrySignal {
	/// The server answered with this status code.
	Status(StatusCode),
	/// The transport failed before a response was obtained.
	TransportFailure,
}

/// Attempt bookkeeping scoped to one logical (possibly resubmitted) request.
///
/// Created lazily by the send loop once a retry is actually indicated, so requests
/// that succeed on the first attempt pay no bookkeeping cost. The request id is an
/// opaque process-local counter used purely for log correlation.
#[derive(Clone, Debug)]
pub struct RetryContext {
	attempt: u32,
	request_id: u64,
}
impl RetryContext {
	/// Creates a context for a request whose first retry is being considered.
	pub fn new() -> Self {
		Self { attempt: 0, request_id: NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed) }
	}

	/// Returns the number of retries already performed.
	pub fn attempt(&self) -> u32 {
		self.attempt
	}

	/// Returns the opaque id correlating every attempt of this logical request.
	pub fn request_id(&self) -> u64 {
		self.request_id
	}

	/// Records that another retry has been scheduled.
	pub fn record_attempt(&mut self) {
		self.attempt = self.attempt.saturating_add(1);
	}
}
impl Default for RetryContext {
	fn default() -> Self {
		Self::new()
	}
}

/// Pure retry decision policy; configuration plus inputs fully determine the output.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
	max_retries: u32,
	base_interval: Duration,
	max_interval: Duration,
}
impl RetryPolicy {
	/// Creates a policy with the default bounds.
	pub fn new() -> Self {
		Self {
			max_retries: DEFAULT_MAX_RETRIES,
			base_interval: DEFAULT_BASE_INTERVAL,
			max_interval: DEFAULT_MAX_INTERVAL,
		}
	}

	/// Overrides the retry count ceiling.
	pub fn with_max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;

		self
	}

	/// Overrides the backoff base interval.
	pub fn with_base_interval(mut self, base_interval: Duration) -> Self {
		self.base_interval = base_interval;

		self
	}

	/// Overrides the delay ceiling.
	pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
		self.max_interval = max_interval;

		self
	}

	/// Returns `true` when the status alone marks a response as transient.
	pub fn retryable_status(status: StatusCode) -> bool {
		let code = status.as_u16();

		code == 429 || ((500..=599).contains(&code) && code != 501)
	}

	/// Decides whether the attempt described by `signal` should be resubmitted.
	pub fn should_retry(&self, signal: RetrySignal, context: &RetryContext) -> bool {
		if context.attempt >= self.max_retries {
			return false;
		}

		match signal {
			RetrySignal::Status(status) => Self::retryable_status(status),
			RetrySignal::TransportFailure => true,
		}
	}

	/// Computes the wait before the next resubmission.
	///
	/// A positive-integer `Retry-After` value (seconds) wins, clamped to the ceiling;
	/// non-numeric or non-positive values are ignored in favor of exponential backoff
	/// `min(max_interval, 2^attempt * base_interval)` with a 0-based attempt counter.
	pub fn next_delay(&self, headers: Option<&HeaderMap>, context: &RetryContext) -> Duration {
		if let Some(seconds) = headers.and_then(parse_retry_after) {
			return Duration::from_secs(seconds).min(self.max_interval);
		}

		let exponent = context.attempt.min(31);
		let multiplier = 1_u128 << exponent;
		let delay_ms = self
			.base_interval
			.as_millis()
			.saturating_mul(multiplier)
			.min(self.max_interval.as_millis())
			.min(u64::MAX as u128) as u64;

		Duration::from_millis(delay_ms)
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self::new()
	}
}

/// Extracts a usable `Retry-After` hint: integer seconds, strictly positive.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
	let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
	let seconds = raw.parse::<i64>().ok()?;

	if seconds > 0 { Some(seconds as u64) } else { None }
}
