//! Transport primitives for token exchanges.
//!
//! The exchange client depends on HTTP only through [`TokenHttpClient`], a single
//! GET-with-optional-basic-auth operation. [`ReqwestHttpClient`] is the default
//! implementation; tests and embedders can plug in their own.

// std
use std::time::Duration;
// self
use crate::_prelude::*;

/// Per-request timeout applied to every exchange.
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound on the response body read from the token endpoint.
pub const MAX_RESPONSE_BYTES: usize = 5 << 20;

/// Boxed future returned by [`TokenHttpClient::get`].
pub type HttpFuture<'a, E> = Pin<Box<dyn Future<Output = Result<HttpResponse, E>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of performing token exchanges.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared across
/// concurrent requests, and the returned future must be `Send`. Dropping the future must
/// abort the in-flight request; the exchange client relies on that for cancellation.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Performs a GET request.
	///
	/// Only the body of a `200 OK` response is needed; implementations should skip reading
	/// other bodies and must stop reading after [`MAX_RESPONSE_BYTES`].
	fn get(&self, request: HttpRequest) -> HttpFuture<'_, Self::TransportError>;
}

/// Outbound request description.
#[derive(Clone, Debug)]
pub struct HttpRequest {
	/// Fully built URL including query parameters.
	pub url: Url,
	/// Basic credentials, when configured.
	pub basic_auth: Option<BasicAuth>,
	/// Deadline for the whole request.
	pub timeout: Duration,
}

/// HTTP Basic credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
	/// Username.
	pub username: String,
	/// Password; redacted from debug output.
	pub password: String,
}
impl Debug for BasicAuth {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BasicAuth")
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Response captured from the token endpoint.
#[derive(Clone, Debug, Default)]
pub struct HttpResponse {
	/// HTTP status code.
	pub status: u16,
	/// Canonical reason phrase, when known.
	pub reason: Option<String>,
	/// Body bytes, capped at [`MAX_RESPONSE_BYTES`]. Empty for non-200 responses.
	pub body: Vec<u8>,
}
impl HttpResponse {
	/// Status code followed by the reason phrase, e.g. `401 Unauthorized`.
	pub fn status_line(&self) -> String {
		match &self.reason {
			Some(reason) => format!("{} {reason}", self.status),
			None => self.status.to_string(),
		}
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl TokenHttpClient for ReqwestHttpClient {
	type TransportError = ReqwestError;

	fn get(&self, request: HttpRequest) -> HttpFuture<'_, Self::TransportError> {
		let client = self.0.clone();

		Box::pin(async move {
			let mut builder = client.get(request.url).timeout(request.timeout);

			if let Some(auth) = request.basic_auth {
				builder = builder.basic_auth(auth.username, Some(auth.password));
			}

			let mut response = builder.send().await?;
			let status = response.status();
			let mut body = Vec::new();

			if status == reqwest::StatusCode::OK {
				while let Some(chunk) = response.chunk().await? {
					let room = MAX_RESPONSE_BYTES - body.len();

					if chunk.len() >= room {
						body.extend_from_slice(&chunk[..room]);

						break;
					}

					body.extend_from_slice(&chunk);
				}
			}

			Ok(HttpResponse {
				status: status.as_u16(),
				reason: status.canonical_reason().map(str::to_owned),
				body,
			})
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn status_line_includes_reason_when_known() {
		let response =
			HttpResponse { status: 401, reason: Some("Unauthorized".into()), body: Vec::new() };

		assert_eq!(response.status_line(), "401 Unauthorized");
		assert_eq!(HttpResponse { status: 599, ..Default::default() }.status_line(), "599");
	}

	#[test]
	fn basic_auth_debug_redacts_password() {
		let auth = BasicAuth { username: "robot".into(), password: "hunter2".into() };
		let rendered = format!("{auth:?}");

		assert!(rendered.contains("robot"));
		assert!(!rendered.contains("hunter2"));
	}
}
