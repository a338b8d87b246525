//! Token sources: the issuance contract plus the form-POST token endpoint client.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
// self
use crate::{
	_prelude::*,
	auth::{credential::Credential, secret::AuthSecret},
	clock::{Clock, SystemClock},
	error::AuthError,
	http::{Request, Transport},
};

/// Grant type sent when exchanging an API key.
pub const GRANT_TYPE_API_KEY: &str = "apikey";
/// Grant type sent when exchanging confidential client credentials.
pub const GRANT_TYPE_CLIENT_CREDENTIALS: &str = "client_credentials";

// Fixed Basic pair protecting API-key token endpoints that have no per-client secret.
const DEFAULT_BASIC_ID: &str = "default";
const DEFAULT_BASIC_SECRET: &str = "default";

/// Boxed future returned by [`TokenSource::fetch`].
pub type TokenSourceFuture<'a> = Pin<Box<dyn Future<Output = Result<Credential>> + 'a + Send>>;

/// Contract for collaborators that can mint a fresh [`Credential`].
pub trait TokenSource
where
	Self: Send + Sync,
{
	/// Obtains a new credential from the issuing authority.
	fn fetch(&self) -> TokenSourceFuture<'_>;
}

/// Request-scoped credentials presented to the token endpoint.
#[derive(Clone, Debug)]
pub enum EndpointCredentials {
	/// API key posted in the form body; the endpoint itself is guarded by a fixed
	/// default Basic pair.
	ApiKey(AuthSecret),
	/// Confidential client id/secret sent via HTTP Basic authentication.
	ClientSecretBasic {
		/// OAuth-style client identifier.
		client_id: String,
		/// Secret paired with the client identifier.
		client_secret: AuthSecret,
	},
}
impl EndpointCredentials {
	fn default_grant_type(&self) -> &'static str {
		match self {
			Self::ApiKey(_) => GRANT_TYPE_API_KEY,
			Self::ClientSecretBasic { .. } => GRANT_TYPE_CLIENT_CREDENTIALS,
		}
	}

	fn basic_pair(&self) -> (&str, &str) {
		match self {
			Self::ApiKey(_) => (DEFAULT_BASIC_ID, DEFAULT_BASIC_SECRET),
			Self::ClientSecretBasic { client_id, client_secret } =>
				(client_id, client_secret.expose()),
		}
	}
}

/// Form-POST token endpoint client implementing [`TokenSource`].
///
/// The exchange is a `POST` with a form-url-encoded body carrying a `grant_type`
/// field and, for API keys, the key itself; the endpoint is authenticated with an
/// HTTP Basic header. A successful reply is JSON carrying the access token, token
/// type, and time-to-live in seconds.
pub struct TokenEndpoint<T>
where
	T: ?Sized + Transport,
{
	url: Url,
	credentials: EndpointCredentials,
	grant_type: String,
	transport: Arc<T>,
	clock: Arc<dyn Clock>,
}
impl<T> TokenEndpoint<T>
where
	T: ?Sized + Transport,
{
	/// Creates an endpoint client using the system clock.
	pub fn new(url: Url, credentials: EndpointCredentials, transport: impl Into<Arc<T>>) -> Self {
		let grant_type = credentials.default_grant_type().to_owned();

		Self {
			url,
			credentials,
			grant_type,
			transport: transport.into(),
			clock: Arc::new(SystemClock),
		}
	}

	/// Overrides the clock used to stamp credential issue instants.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Overrides the `grant_type` form field.
	pub fn with_grant_type(mut self, grant_type: impl Into<String>) -> Self {
		self.grant_type = grant_type.into();

		self
	}

	async fn exchange(&self) -> Result<Credential> {
		let request = self.build_request()?;
		let response = self.transport.call(request).await.map_err(Error::from)?;
		let status = response.status();

		if !status.is_success() {
			return Err(AuthError::Endpoint {
				status: status.as_u16(),
				message: response.server_message(),
			}
			.into());
		}

		let mut deserializer = serde_json::Deserializer::from_slice(response.body());
		let parsed: TokenExchangeResponse = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| AuthError::ResponseParse { source, status: status.as_u16() })?;
		let issued_at = self.clock.now();
		let credential = Credential::from_ttl(
			AuthSecret::new(parsed.access_token),
			issued_at,
			Duration::seconds(parsed.expires_in),
		)
		.map_err(AuthError::from)?;

		Ok(credential)
	}

	fn build_request(&self) -> Result<Request> {
		let mut form = url::form_urlencoded::Serializer::new(String::new());

		form.append_pair("grant_type", &self.grant_type);

		if let EndpointCredentials::ApiKey(key) = &self.credentials {
			form.append_pair("apikey", key.expose());
		}

		let (user, password) = self.credentials.basic_pair();
		let basic = BASE64_STANDARD.encode(format!("{user}:{password}"));
		let mut authorization = HeaderValue::from_str(&format!("Basic {basic}"))
			.map_err(|_| AuthError::UnencodableCredential)?;

		authorization.set_sensitive(true);

		Ok(Request::new(Method::POST, self.url.clone())
			.with_header(CONTENT_TYPE, HeaderValue::from_static("application/x-www-form-urlencoded"))
			.with_header(ACCEPT, HeaderValue::from_static("application/json"))
			.with_header(AUTHORIZATION, authorization)
			.with_body(form.finish()))
	}
}
impl<T> TokenSource for TokenEndpoint<T>
where
	T: ?Sized + Transport,
{
	fn fetch(&self) -> TokenSourceFuture<'_> {
		Box::pin(self.exchange())
	}
}
impl<T> Debug for TokenEndpoint<T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenEndpoint")
			.field("url", &self.url.as_str())
			.field("grant_type", &self.grant_type)
			.finish()
	}
}

#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
	access_token: String,
	#[serde(rename = "token_type")]
	_token_type: String,
	expires_in: i64,
}
