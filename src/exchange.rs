//! Token exchange client for registry auth servers.
//!
//! One exchange is a single `GET {endpoint}/token` carrying `client_id`, `service`, and
//! `scope` query parameters (each omitted when empty) and optional HTTP Basic credentials.
//! A `200 OK` JSON body is decoded, its signed `token` is split without signature
//! verification, and the access claims are flattened into scope expressions.

pub mod claims;
pub mod token;

pub use claims::*;
pub use token::*;

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	config::Config,
	error::{ConfigError, TransientError, TransportError},
	http::{BasicAuth, EXCHANGE_TIMEOUT, HttpRequest, TokenHttpClient},
	obs::{self, OpKind},
	role::Role,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

/// Boxed future returned by [`RegistryClient::token`].
pub type ExchangeFuture<'a> = Pin<Box<dyn Future<Output = Result<RegistryToken>> + 'a + Send>>;

#[cfg(feature = "reqwest")]
/// Exchange client specialized for the crate's default reqwest transport.
pub type ReqwestExchangeClient = TokenExchangeClient<ReqwestHttpClient>;

/// Source of registry credentials; the broker's only dependency on the exchange protocol.
pub trait RegistryClient
where
	Self: Send + Sync,
{
	/// Performs one exchange. Must not retry internally and must abort when `cancel` fires.
	fn token<'a>(
		&'a self,
		request: &'a TokenRequest,
		cancel: &'a CancellationToken,
	) -> ExchangeFuture<'a>;
}

/// Inputs of one exchange.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TokenRequest {
	/// Base URL of the auth server.
	pub endpoint: String,
	/// `client_id` query parameter.
	pub client_id: String,
	/// Basic-auth username.
	pub username: String,
	/// Basic-auth password.
	pub password: String,
	/// `service` query parameter.
	pub service: String,
	/// `scope` query parameter, space-separated scope expressions.
	pub scope: String,
}
impl TokenRequest {
	/// Combines the engine configuration with a role; role scopes are joined with spaces.
	pub fn new(config: &Config, role: &Role) -> Self {
		Self {
			endpoint: config.endpoint_url.clone(),
			client_id: config.client_id.clone(),
			username: config.username.clone(),
			password: config.password.clone(),
			service: role.service.clone(),
			scope: role.scope(),
		}
	}

	/// Fails with [`ConfigError::MissingEndpoint`] when no endpoint is set.
	pub fn validate(&self) -> Result<()> {
		if self.endpoint.is_empty() {
			return Err(ConfigError::MissingEndpoint.into());
		}

		Ok(())
	}

	/// Builds `{endpoint}/token` with the non-empty query parameters.
	pub fn token_url(&self) -> Result<Url> {
		self.validate()?;

		let base = self.endpoint.trim_end_matches('/');
		let mut url = Url::parse(&format!("{base}/token"))
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let params = [
			("client_id", self.client_id.as_str()),
			("service", self.service.as_str()),
			("scope", self.scope.as_str()),
		];
		let mut params = params.into_iter().filter(|(_, value)| !value.is_empty()).peekable();

		if params.peek().is_some() {
			url.query_pairs_mut().extend_pairs(params);
		}

		Ok(url)
	}

	/// Basic credentials, only when both username and password are set.
	pub fn basic_auth(&self) -> Option<BasicAuth> {
		if self.username.is_empty() || self.password.is_empty() {
			return None;
		}

		Some(BasicAuth { username: self.username.clone(), password: self.password.clone() })
	}

	/// Scope string split on single spaces, as reported back in the credential.
	pub fn request_scopes(&self) -> Vec<String> {
		self.scope.split(' ').map(str::to_owned).collect()
	}
}
impl Debug for TokenRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRequest")
			.field("endpoint", &self.endpoint)
			.field("client_id", &self.client_id)
			.field("username", &self.username)
			.field("password_set", &!self.password.is_empty())
			.field("service", &self.service)
			.field("scope", &self.scope)
			.finish()
	}
}

/// JSON body returned by the token endpoint.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenResponse {
	/// Signed bearer token.
	pub token: String,
	/// OAuth2-compatible access token.
	pub access_token: String,
	/// Lifetime in seconds.
	pub expires_in: i64,
	/// Issuance timestamp as reported by the server.
	pub issued_at: String,
	/// Token identifier.
	pub jti: String,
	/// Subject.
	pub sub: String,
}
impl Debug for TokenResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenResponse")
			.field("token", &"<redacted>")
			.field("access_token", &"<redacted>")
			.field("expires_in", &self.expires_in)
			.field("issued_at", &self.issued_at)
			.field("jti", &self.jti)
			.field("sub", &self.sub)
			.finish()
	}
}

/// Exchange client over any [`TokenHttpClient`].
pub struct TokenExchangeClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	http_client: Arc<C>,
	timeout: StdDuration,
}
impl<C> TokenExchangeClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Creates a client around the provided transport with the default 30 s timeout.
	pub fn with_http_client(http_client: impl Into<Arc<C>>) -> Self {
		Self { http_client: http_client.into(), timeout: EXCHANGE_TIMEOUT }
	}

	/// Overrides the per-exchange timeout.
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Performs one exchange.
	///
	/// An empty endpoint fails before any I/O. The request is abandoned as soon as `cancel`
	/// fires or the timeout elapses.
	pub async fn exchange(
		&self,
		request: &TokenRequest,
		cancel: &CancellationToken,
	) -> Result<RegistryToken> {
		obs::observe(OpKind::Exchange, "exchange", self.exchange_inner(request, cancel)).await
	}

	async fn exchange_inner(
		&self,
		request: &TokenRequest,
		cancel: &CancellationToken,
	) -> Result<RegistryToken> {
		let url = request.token_url()?;

		if cancel.is_cancelled() {
			return Err(Error::Cancelled);
		}

		let http_request =
			HttpRequest { url, basic_auth: request.basic_auth(), timeout: self.timeout };
		let network = |e: Box<dyn StdError + Send + Sync>| {
			TransportError::network(request.service.as_str(), request.scope.as_str(), e)
		};
		let response = tokio::select! {
			biased;
			_ = cancel.cancelled() => return Err(Error::Cancelled),
			response = tokio::time::timeout(self.timeout, self.http_client.get(http_request)) =>
				response.map_err(|e| network(e.into()))?.map_err(|e| network(e.into()))?,
		};

		if response.status != 200 {
			return Err(TransientError::TokenEndpoint {
				scope: request.scope.clone(),
				status: response.status,
				status_line: response.status_line(),
			}
			.into());
		}

		let mut deserializer = serde_json::Deserializer::from_slice(&response.body);
		let body: TokenResponse = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| TransientError::TokenResponseParse {
				scope: request.scope.clone(),
				source,
			})?;
		let signed = SignedToken::parse(&body.token).map_err(|source| {
			TransientError::MalformedToken { scope: request.scope.clone(), source }
		})?;
		let claims: TokenClaims =
			signed.claims().map_err(|source| TransientError::TokenClaims { source })?;
		let issued_at = OffsetDateTime::now_utc();

		Ok(RegistryToken {
			registry_url: request.endpoint.clone(),
			service: request.service.clone(),
			request_scopes: request.request_scopes(),
			token_scopes: claims.scopes(),
			token: TokenSecret::new(body.token),
			access_token: TokenSecret::new(body.access_token),
			expires_at: issued_at.saturating_add(Duration::seconds(body.expires_in)),
		})
	}
}
#[cfg(feature = "reqwest")]
impl Default for TokenExchangeClient<ReqwestHttpClient> {
	fn default() -> Self {
		Self::with_http_client(ReqwestHttpClient::default())
	}
}
impl<C> RegistryClient for TokenExchangeClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn token<'a>(
		&'a self,
		request: &'a TokenRequest,
		cancel: &'a CancellationToken,
	) -> ExchangeFuture<'a> {
		Box::pin(self.exchange(request, cancel))
	}
}
impl<C> Debug for TokenExchangeClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenExchangeClient").field("timeout", &self.timeout).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::http::{HttpFuture, HttpResponse};

	fn request() -> TokenRequest {
		TokenRequest {
			endpoint: "https://auth.example.com".into(),
			client_id: "ci-client".into(),
			username: "robot".into(),
			password: "hunter2".into(),
			service: "registry.example.com".into(),
			scope: "repository:myimg:pull repository:other:pull,push".into(),
		}
	}

	#[test]
	fn token_url_includes_non_empty_params() {
		let url = request().token_url().expect("Fixture request should build a URL.");
		let pairs = url.query_pairs().into_owned().collect::<Vec<_>>();

		assert_eq!(url.path(), "/token");
		assert_eq!(
			pairs,
			vec![
				("client_id".into(), "ci-client".into()),
				("service".into(), "registry.example.com".into()),
				("scope".into(), "repository:myimg:pull repository:other:pull,push".into()),
			],
		);
	}

	#[test]
	fn token_url_omits_empty_params() {
		for (client_id, service, scope) in
			[("", "svc", "s"), ("id", "", "s"), ("id", "svc", ""), ("", "", "")]
		{
			let request = TokenRequest {
				client_id: client_id.into(),
				service: service.into(),
				scope: scope.into(),
				..request()
			};
			let url = request.token_url().expect("Fixture request should build a URL.");
			let keys = url.query_pairs().map(|(key, _)| key.into_owned()).collect::<Vec<_>>();

			assert_eq!(keys.contains(&"client_id".to_owned()), !client_id.is_empty());
			assert_eq!(keys.contains(&"service".to_owned()), !service.is_empty());
			assert_eq!(keys.contains(&"scope".to_owned()), !scope.is_empty());
		}

		let bare = TokenRequest { endpoint: "https://auth.example.com/".into(), ..Default::default() }
			.token_url()
			.expect("Bare request should build a URL.");

		assert_eq!(bare.as_str(), "https://auth.example.com/token");
	}

	#[test]
	fn basic_auth_requires_both_parts() {
		assert!(request().basic_auth().is_some());
		assert!(TokenRequest { password: String::new(), ..request() }.basic_auth().is_none());
		assert!(TokenRequest { username: String::new(), ..request() }.basic_auth().is_none());
	}

	#[test]
	fn request_scopes_split_on_single_spaces() {
		assert_eq!(
			request().request_scopes(),
			vec!["repository:myimg:pull", "repository:other:pull,push"],
		);
	}

	#[test]
	fn debug_hides_password() {
		assert!(!format!("{:?}", request()).contains("hunter2"));
	}

	struct PanickingHttpClient;
	impl TokenHttpClient for PanickingHttpClient {
		type TransportError = std::io::Error;

		fn get(&self, _request: HttpRequest) -> HttpFuture<'_, Self::TransportError> {
			panic!("No HTTP call may be issued for this request.");
		}
	}

	struct StaticHttpClient(HttpResponse);
	impl TokenHttpClient for StaticHttpClient {
		type TransportError = std::io::Error;

		fn get(&self, _request: HttpRequest) -> HttpFuture<'_, Self::TransportError> {
			let response = self.0.clone();

			Box::pin(async move { Ok(response) })
		}
	}

	#[tokio::test]
	async fn empty_endpoint_fails_without_io() {
		let client = TokenExchangeClient::with_http_client(PanickingHttpClient);
		let request = TokenRequest { endpoint: String::new(), ..request() };
		let err = client
			.exchange(&request, &CancellationToken::new())
			.await
			.expect_err("Empty endpoint should be rejected.");

		assert!(matches!(err, Error::Config(ConfigError::MissingEndpoint)));
	}

	#[tokio::test]
	async fn fired_token_aborts_before_io() {
		let client = TokenExchangeClient::with_http_client(PanickingHttpClient);
		let cancel = CancellationToken::new();

		cancel.cancel();

		let err = client.exchange(&request(), &cancel).await.expect_err("Cancelled exchange should fail.");

		assert!(matches!(err, Error::Cancelled));
	}

	#[tokio::test]
	async fn non_200_names_the_scope_and_skips_the_body() {
		let client = TokenExchangeClient::with_http_client(StaticHttpClient(HttpResponse {
			status: 401,
			reason: Some("Unauthorized".into()),
			body: b"not json at all".to_vec(),
		}));
		let err = client
			.exchange(&request(), &CancellationToken::new())
			.await
			.expect_err("Unauthorized responses should fail.");

		assert!(err.is_retryable());
		assert!(err.to_string().contains("repository:myimg:pull"));
		assert!(err.to_string().contains("401 Unauthorized"));
	}

	#[tokio::test]
	async fn garbage_body_is_a_parse_error() {
		let client = TokenExchangeClient::with_http_client(StaticHttpClient(HttpResponse {
			status: 200,
			reason: Some("OK".into()),
			body: b"<html>proxy error</html>".to_vec(),
		}));
		let err = client
			.exchange(&request(), &CancellationToken::new())
			.await
			.expect_err("HTML bodies should fail to parse.");

		assert!(matches!(err, Error::Transient(TransientError::TokenResponseParse { .. })));
	}

	#[tokio::test]
	async fn unsigned_garbage_token_is_malformed() {
		let client = TokenExchangeClient::with_http_client(StaticHttpClient(HttpResponse {
			status: 200,
			reason: Some("OK".into()),
			body: br#"{"token":"definitely-not-a-jwt","expires_in":60}"#.to_vec(),
		}));
		let err = client
			.exchange(&request(), &CancellationToken::new())
			.await
			.expect_err("Opaque tokens should be rejected.");

		assert!(matches!(err, Error::Transient(TransientError::MalformedToken { .. })));
	}
}
