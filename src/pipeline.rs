//! Request pipeline composing authentication, retry, and redirect around a transport.
//!
//! One logical call proceeds in three layers: the request is stamped with credentials,
//! sent through the transport with the retry policy governing resubmission of the same
//! request, and the stable response is then handed to the redirect policy, which may
//! produce a rewritten request that re-enters the stamped, retry-aware send path. The
//! chain ends with a terminal response, a protocol error, or retry exhaustion.

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	auth::Authenticator,
	error::ResponseError,
	http::{Request, Response, Transport},
	obs::{self, Outcome, PipelineSpan, Stage},
	redirect::{RedirectPolicy, RedirectState},
	retry::{RetryContext, RetryPolicy, RetrySignal},
};

/// Executes logical requests against a transport with retry, redirect, and
/// authentication policies applied.
///
/// Policies are injected at construction; the pipeline holds no global state. One
/// pipeline may serve many concurrent calls: retry and redirect bookkeeping is scoped
/// per call, and only the authenticator's token cache is shared.
pub struct Pipeline<T>
where
	T: ?Sized + Transport,
{
	transport: Arc<T>,
	authenticator: Option<Arc<dyn Authenticator>>,
	retry: RetryPolicy,
	redirect: RedirectPolicy,
}
impl<T> Pipeline<T>
where
	T: Transport,
{
	/// Starts building a pipeline around the provided transport.
	pub fn builder(transport: impl Into<Arc<T>>) -> PipelineBuilder<T> {
		PipelineBuilder {
			transport: transport.into(),
			authenticator: None,
			retry: RetryPolicy::default(),
			redirect: RedirectPolicy::default(),
		}
	}
}
impl<T> Pipeline<T>
where
	T: ?Sized + Transport,
{
	/// Executes one logical call and returns the terminal response.
	///
	/// The future suspends, without blocking a thread, for every backoff wait; dropping
	/// it abandons the call. Non-2xx terminal responses surface as
	/// [`ResponseError`](crate::error::ResponseError).
	pub async fn execute(&self, request: Request) -> Result<Response> {
		let target = request.host().unwrap_or("-").to_owned();
		let span = PipelineSpan::new(Stage::Execute, &target);

		obs::record_stage_outcome(Stage::Execute, Outcome::Attempt);

		let result = span.instrument(self.run(request)).await;

		match &result {
			Ok(_) => obs::record_stage_outcome(Stage::Execute, Outcome::Success),
			Err(_) => obs::record_stage_outcome(Stage::Execute, Outcome::Failure),
		}

		result
	}

	/// Executes one logical call, aborting with [`Error::Cancelled`] as soon as
	/// `cancel` completes.
	///
	/// Cancellation interrupts any pending retry or redirect wait; no further requests
	/// are sent once it fires.
	pub async fn execute_cancellable<F>(&self, request: Request, cancel: F) -> Result<Response>
	where
		F: Future<Output = ()> + Send,
	{
		tokio::select! {
			biased;

			() = cancel => Err(Error::Cancelled),
			result = self.execute(request) => result,
		}
	}

	async fn run(&self, request: Request) -> Result<Response> {
		let mut state = RedirectState::new(&request);
		let mut current = request;
		// Chains lose their credential entitlement at the first untrusted hop and
		// never regain it, so a strip cannot be undone by a later re-stamp.
		let mut entitled = true;

		loop {
			let authenticator = if entitled { self.authenticator.as_deref() } else { None };
			let response = self.send_with_retry(&current, authenticator).await?;

			match self.redirect.evaluate(&current, &response, &mut state)? {
				Some(hop) => {
					obs::record_stage_outcome(Stage::Redirect, Outcome::Attempt);

					entitled = entitled && hop.trusted;
					current = hop.request;
				},
				None => return finalize(response),
			}
		}
	}

	/// Sends one request, resubmitting it on transient failures under the retry policy.
	///
	/// The retry context is created lazily on the first retryable outcome, and each
	/// resubmission is re-stamped so a token refreshed mid-backoff is picked up.
	async fn send_with_retry(
		&self,
		request: &Request,
		authenticator: Option<&dyn Authenticator>,
	) -> Result<Response> {
		let mut context: Option<RetryContext> = None;

		loop {
			let mut attempt = request.clone();

			if let Some(authenticator) = authenticator {
				authenticator.authenticate(&mut attempt).await?;
			}

			obs::record_stage_outcome(Stage::Attempt, Outcome::Attempt);

			match self.transport.call(attempt).await {
				Ok(response) => {
					let status = response.status();

					if RetryPolicy::retryable_status(status) {
						let context = context.get_or_insert_with(RetryContext::new);

						if self.retry.should_retry(RetrySignal::Status(status), context) {
							let delay = self.retry.next_delay(Some(response.headers()), context);

							context.record_attempt();
							self.wait(delay).await;

							continue;
						}
					}

					obs::record_stage_outcome(Stage::Attempt, Outcome::Success);

					return Ok(response);
				},
				Err(err) => {
					let context = context.get_or_insert_with(RetryContext::new);

					if self.retry.should_retry(RetrySignal::TransportFailure, context) {
						let delay = self.retry.next_delay(None, context);

						context.record_attempt();
						self.wait(delay).await;

						continue;
					}

					obs::record_stage_outcome(Stage::Attempt, Outcome::Failure);

					return Err(err.into());
				},
			}
		}
	}

	async fn wait(&self, delay: StdDuration) {
		tokio::time::sleep(delay).await;
	}
}
impl<T> Debug for Pipeline<T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Pipeline")
			.field("authenticated", &self.authenticator.is_some())
			.field("retry", &self.retry)
			.field("redirect", &self.redirect)
			.finish()
	}
}

/// Builder assembling a [`Pipeline`] from injected policies.
pub struct PipelineBuilder<T>
where
	T: ?Sized + Transport,
{
	transport: Arc<T>,
	authenticator: Option<Arc<dyn Authenticator>>,
	retry: RetryPolicy,
	redirect: RedirectPolicy,
}
impl<T> PipelineBuilder<T>
where
	T: ?Sized + Transport,
{
	/// Attaches an authenticator that stamps every credentialed request.
	pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
		self.authenticator = Some(authenticator);

		self
	}

	/// Replaces the retry policy.
	pub fn retry(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Replaces the redirect policy.
	pub fn redirect(mut self, redirect: RedirectPolicy) -> Self {
		self.redirect = redirect;

		self
	}

	/// Finishes the build.
	pub fn build(self) -> Pipeline<T> {
		Pipeline {
			transport: self.transport,
			authenticator: self.authenticator,
			retry: self.retry,
			redirect: self.redirect,
		}
	}
}

fn finalize(response: Response) -> Result<Response> {
	let status = response.status();

	if status.is_success() {
		return Ok(response);
	}

	Err(ResponseError { status, message: response.server_message() }.into())
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::VecDeque;
	// crates.io
	use http::header::{AUTHORIZATION, LOCATION};
	// self
	use super::*;
	use crate::{
		auth::BearerAuthenticator,
		error::{ProtocolError, TransportError},
		http::TransportFuture,
		redirect::SafeHeaderPolicy,
	};

	struct ScriptedTransport {
		script: Mutex<VecDeque<Result<Response, TransportError>>>,
		seen: Mutex<Vec<Request>>,
	}
	impl ScriptedTransport {
		fn new(script: impl IntoIterator<Item = Result<Response, TransportError>>) -> Arc<Self> {
			Arc::new(Self {
				script: Mutex::new(script.into_iter().collect()),
				seen: Mutex::new(Vec::new()),
			})
		}

		fn calls(&self) -> usize {
			self.seen.lock().len()
		}

		fn request(&self, index: usize) -> Request {
			self.seen.lock()[index].clone()
		}
	}
	impl Transport for ScriptedTransport {
		fn call(&self, request: Request) -> TransportFuture<'_> {
			self.seen.lock().push(request);

			let next = self.script.lock().pop_front();

			Box::pin(async move {
				match next {
					Some(outcome) => outcome,
					// Keep the call pending forever once the script runs dry so
					// cancellation tests have something to interrupt.
					None => std::future::pending().await,
				}
			})
		}
	}

	fn ok_response() -> Result<Response, TransportError> {
		Ok(Response::new(StatusCode::OK, HeaderMap::new(), b"done".to_vec()))
	}

	fn status_response(status: u16, body: &str) -> Result<Response, TransportError> {
		Ok(Response::new(
			StatusCode::from_u16(status).expect("Status fixture should be valid."),
			HeaderMap::new(),
			body.as_bytes().to_vec(),
		))
	}

	fn redirect_response(status: u16, location: &str) -> Result<Response, TransportError> {
		let mut headers = HeaderMap::new();

		headers.insert(LOCATION, location.parse().expect("Location fixture should parse."));

		Ok(Response::new(
			StatusCode::from_u16(status).expect("Status fixture should be valid."),
			headers,
			Vec::new(),
		))
	}

	fn io_failure() -> Result<Response, TransportError> {
		Err(TransportError::Io(std::io::Error::other("connection reset")))
	}

	fn fast_retry(max_retries: u32) -> RetryPolicy {
		RetryPolicy::new()
			.with_max_retries(max_retries)
			.with_base_interval(StdDuration::from_millis(1))
			.with_max_interval(StdDuration::from_millis(4))
	}

	fn builder(transport: &Arc<ScriptedTransport>) -> PipelineBuilder<ScriptedTransport> {
		Pipeline::builder(transport.clone())
	}

	fn request() -> Request {
		Request::get("https://api.example.com/v1/items").expect("Request URL should parse.")
	}

	#[tokio::test]
	async fn first_attempt_success_needs_no_retry_bookkeeping() {
		let transport = ScriptedTransport::new([ok_response()]);
		let pipeline = builder(&transport).build();
		let response =
			pipeline.execute(request()).await.expect("Plain success should pass through.");

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(transport.calls(), 1);
	}

	#[tokio::test]
	async fn transient_statuses_are_resubmitted_until_success() {
		let transport = ScriptedTransport::new([
			status_response(503, ""),
			status_response(429, ""),
			ok_response(),
		]);
		let pipeline = builder(&transport).retry(fast_retry(4)).build();
		let response =
			pipeline.execute(request()).await.expect("Retries should recover the call.");

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(transport.calls(), 3);
	}

	#[tokio::test]
	async fn transport_failures_retry_like_transient_statuses() {
		let transport = ScriptedTransport::new([io_failure(), ok_response()]);
		let pipeline = builder(&transport).retry(fast_retry(4)).build();
		let response = pipeline
			.execute(request())
			.await
			.expect("Transport failures should be retried.");

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(transport.calls(), 2);
	}

	#[tokio::test]
	async fn exhausted_retries_surface_the_last_response_as_an_error() {
		let transport = ScriptedTransport::new([
			status_response(503, "{\"message\":\"still down\"}"),
			status_response(503, "{\"message\":\"still down\"}"),
		]);
		let pipeline = builder(&transport).retry(fast_retry(1)).build();
		let err = pipeline
			.execute(request())
			.await
			.expect_err("Exhausted retries should surface an error.");

		assert_eq!(transport.calls(), 2);
		assert!(matches!(
			err,
			Error::Response(ResponseError { status: StatusCode::SERVICE_UNAVAILABLE, ref message })
				if message == "still down"
		));
	}

	#[tokio::test]
	async fn non_retryable_statuses_fail_immediately() {
		let transport =
			ScriptedTransport::new([status_response(404, "{\"message\":\"no such item\"}")]);
		let pipeline = builder(&transport).retry(fast_retry(4)).build();
		let err =
			pipeline.execute(request()).await.expect_err("404 should surface immediately.");

		assert_eq!(transport.calls(), 1);
		assert!(matches!(
			err,
			Error::Response(ResponseError { status: StatusCode::NOT_FOUND, ref message })
				if message == "no such item"
		));
	}

	#[tokio::test]
	async fn not_implemented_is_never_resubmitted() {
		let transport = ScriptedTransport::new([status_response(501, "")]);
		let pipeline = builder(&transport).retry(fast_retry(4)).build();
		let err = pipeline
			.execute(request())
			.await
			.expect_err("501 should surface without retries.");

		assert_eq!(transport.calls(), 1);
		assert!(matches!(
			err,
			Error::Response(ResponseError { status: StatusCode::NOT_IMPLEMENTED, .. })
		));
	}

	#[tokio::test]
	async fn redirected_requests_reenter_the_retry_path() {
		let transport = ScriptedTransport::new([
			redirect_response(301, "https://api.example.com/v2/items"),
			status_response(503, ""),
			ok_response(),
		]);
		let pipeline = builder(&transport).retry(fast_retry(4)).build();
		let response = pipeline
			.execute(request())
			.await
			.expect("Redirect followed by retry should succeed.");

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(transport.calls(), 3);
		assert_eq!(transport.request(1).url().as_str(), "https://api.example.com/v2/items");
	}

	#[tokio::test]
	async fn eleventh_consecutive_redirect_fails_without_another_request() {
		let script: Vec<_> = (0..20)
			.map(|_| redirect_response(301, "https://api.example.com/v1/items"))
			.collect();
		let transport = ScriptedTransport::new(script);
		let pipeline = builder(&transport).build();
		let err = pipeline
			.execute(request())
			.await
			.expect_err("Hop limit should abandon the chain.");

		assert!(matches!(err, Error::Protocol(ProtocolError::TooManyRedirects { hops: 10 })));
		// Initial request plus ten followed hops; the eleventh re-issue never happens.
		assert_eq!(transport.calls(), 11);
	}

	#[tokio::test]
	async fn credentials_are_not_restamped_after_an_unsafe_redirect() {
		let transport = ScriptedTransport::new([
			redirect_response(307, "https://elsewhere.example.net/v1/items"),
			ok_response(),
		]);
		let authenticator: Arc<dyn Authenticator> =
			Arc::new(BearerAuthenticator::with_static_token("chain-token"));
		let pipeline = builder(&transport).authenticator(authenticator).build();

		pipeline.execute(request()).await.expect("Unsafe redirect chain should succeed.");

		assert!(transport.request(0).headers().contains_key(AUTHORIZATION));
		assert!(!transport.request(1).headers().contains_key(AUTHORIZATION));
	}

	#[tokio::test]
	async fn trusted_redirects_stay_credentialed() {
		let transport = ScriptedTransport::new([
			redirect_response(307, "https://region2.cloud.example.com/v1/items"),
			ok_response(),
		]);
		let authenticator: Arc<dyn Authenticator> =
			Arc::new(BearerAuthenticator::with_static_token("chain-token"));
		let pipeline = builder(&transport)
			.authenticator(authenticator)
			.redirect(RedirectPolicy::new().with_header_policy(
				SafeHeaderPolicy::new().with_trusted_suffix(".cloud.example.com"),
			))
			.build();
		let initial = Request::get("https://region1.cloud.example.com/v1/items")
			.expect("Request URL should parse.");

		pipeline.execute(initial).await.expect("Trusted redirect chain should succeed.");

		assert!(transport.request(0).headers().contains_key(AUTHORIZATION));
		assert!(transport.request(1).headers().contains_key(AUTHORIZATION));
	}

	#[tokio::test]
	async fn cancellation_interrupts_a_pending_backoff() {
		// The script runs dry after the first 503, so any further attempt would hang;
		// cancellation must fire during the one-second backoff instead.
		let transport = ScriptedTransport::new([status_response(503, "")]);
		let pipeline = builder(&transport).build();
		let err = pipeline
			.execute_cancellable(request(), async {
				tokio::time::sleep(StdDuration::from_millis(10)).await;
			})
			.await
			.expect_err("Cancellation should interrupt the wait.");

		assert!(matches!(err, Error::Cancelled));
		assert_eq!(transport.calls(), 1);
	}
}
