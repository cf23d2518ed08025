//! Broker-level error types shared across the exchange client, retry policy, and stores.

// self
use crate::_prelude::*;

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Request fields failed schema validation.
	#[error(transparent)]
	Validation(#[from] ValidationError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Storage-layer failure, wrapped with the operation that hit it.
	#[error("{context}: {source}")]
	Storage {
		/// Operation being performed against the store.
		context: &'static str,
		/// Underlying store failure.
		#[source]
		source: crate::store::StoreError,
	},
	/// The shutdown token or the caller's token fired before the operation finished.
	#[error("Operation was cancelled.")]
	Cancelled,
	/// Every attempt allowed by the retry policy failed.
	#[error("Gave up after {attempts} attempts: {source}")]
	RetriesExhausted {
		/// Number of attempts performed, including the first one.
		attempts: u32,
		/// Error returned by the final attempt.
		#[source]
		source: Box<Error>,
	},
	/// Credential issuance failed.
	#[error("Unable to retrieve token: {source}")]
	TokenRetrieval {
		/// Underlying failure.
		#[source]
		source: Box<Error>,
	},
}
impl Error {
	/// Wraps a store failure with the operation that produced it.
	pub fn storage(context: &'static str, source: crate::store::StoreError) -> Self {
		Self::Storage { context, source }
	}

	/// Returns `true` for failures worth another exchange attempt.
	///
	/// Transport failures, non-200 responses, and unreadable bodies, tokens, or claims are
	/// retried; everything else short-circuits the retry loop.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Transport(_) | Self::Transient(_))
	}

	/// Returns `true` when the caller supplied bad input (HTTP 400 class).
	pub fn is_client_error(&self) -> bool {
		matches!(self.root(), Self::Validation(_))
	}

	/// Walks through retry and retrieval wrappers to the error that caused them.
	pub fn root(&self) -> &Error {
		match self {
			Self::RetriesExhausted { source, .. } | Self::TokenRetrieval { source } =>
				source.root(),
			other => other,
		}
	}
}

/// Request fields rejected before any handler runs.
///
/// Messages use the lower-case, unpunctuated field-error form (`unknown fields: a, b`);
/// the other error families are sentences ending in a period.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ValidationError {
	/// Fields not present in the operation's table.
	#[error("unknown fields: {}", .names.join(", "))]
	UnknownFields {
		/// Offending field names, sorted.
		names: Vec<String>,
	},
	/// Required fields absent from the request.
	#[error("missing required field(s): {names:?}")]
	MissingFields {
		/// Missing field names.
		names: Vec<String>,
	},
	/// Field present with the wrong JSON type.
	#[error("field `{field}` must be {expected}")]
	InvalidType {
		/// Field name.
		field: String,
		/// Human-readable expected type.
		expected: &'static str,
	},
	/// Field well-typed but semantically invalid.
	#[error("field `{field}` is invalid: {reason}")]
	InvalidValue {
		/// Field name.
		field: String,
		/// Why the value was rejected.
		reason: String,
	},
	/// Request body is not a JSON object.
	#[error("request data must be a JSON object")]
	NotAnObject,
}

/// Configuration failures raised before any network I/O.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// No endpoint URL is configured.
	#[error("Unable to query registry without endpoint url defined.")]
	MissingEndpoint,
	/// The configured endpoint does not form a valid token URL.
	#[error("endpoint_url is not a valid URL.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Token endpoint answered with a status other than 200.
	///
	/// Retried exactly like [`TransportError::Network`]; the split only keeps the status
	/// available to callers.
	#[error("Error getting auth token for {scope:?}: {status_line}.")]
	TokenEndpoint {
		/// Scope string sent with the request.
		scope: String,
		/// HTTP status code.
		status: u16,
		/// Status code and reason phrase, e.g. `401 Unauthorized`.
		status_line: String,
	},
	/// Token endpoint responded with a body that does not match the response schema.
	#[error("Error parsing token response for {scope:?}.")]
	TokenResponseParse {
		/// Scope string sent with the request.
		scope: String,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The `token` field is not a compact signed token.
	#[error("Error reading signed token for {scope:?}: {source}.")]
	MalformedToken {
		/// Scope string sent with the request.
		scope: String,
		/// Decoder failure for the header or payload segment.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
	/// The token payload decoded but its claims could not be extracted.
	#[error("Unable to extract token claims.")]
	TokenClaims {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Error getting auth token for service={service:?} scope={scope:?}: {source}.")]
	Network {
		/// Service sent with the request.
		service: String,
		/// Scope string sent with the request.
		scope: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error together with the request's service and scope.
	pub fn network(
		service: impl Into<String>,
		scope: impl Into<String>,
		src: impl Into<BoxError>,
	) -> Self {
		Self::Network { service: service.into(), scope: scope.into(), source: src.into() }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn only_network_and_transient_errors_retry() {
		let network: Error = TransportError::network("svc", "repo:a:pull", "connection reset").into();
		let status: Error = TransientError::TokenEndpoint {
			scope: "repo:a:pull".into(),
			status: 503,
			status_line: "503 Service Unavailable".into(),
		}
		.into();

		assert!(network.is_retryable());
		assert!(status.is_retryable());
		assert!(!Error::from(ConfigError::MissingEndpoint).is_retryable());
		assert!(!Error::Cancelled.is_retryable());
		assert!(!Error::from(ValidationError::NotAnObject).is_retryable());
	}

	#[test]
	fn root_unwraps_retry_and_retrieval_context() {
		let inner: Error = TransientError::TokenEndpoint {
			scope: "repository:myimg:pull".into(),
			status: 401,
			status_line: "401 Unauthorized".into(),
		}
		.into();
		let wrapped = Error::TokenRetrieval {
			source: Box::new(Error::RetriesExhausted { attempts: 6, source: Box::new(inner) }),
		};

		assert!(matches!(
			wrapped.root(),
			Error::Transient(TransientError::TokenEndpoint { status: 401, .. })
		));
		assert!(wrapped.to_string().starts_with("Unable to retrieve token: Gave up after 6"));
		assert!(wrapped.to_string().contains("401 Unauthorized"));
	}

	#[test]
	fn network_errors_carry_their_cause() {
		let network: Error = TransportError::network("svc", "repo:a:pull", "connection reset").into();

		assert_eq!(
			network.to_string(),
			"Error getting auth token for service=\"svc\" scope=\"repo:a:pull\": connection reset.",
		);

		let wrapped = Error::TokenRetrieval {
			source: Box::new(Error::RetriesExhausted { attempts: 6, source: Box::new(network) }),
		};

		assert!(wrapped.to_string().ends_with(": connection reset."));
	}

	#[test]
	fn unknown_fields_are_listed_in_one_message() {
		let err = ValidationError::UnknownFields { names: vec!["alpha".into(), "beta".into()] };

		assert_eq!(err.to_string(), "unknown fields: alpha, beta");
		assert!(Error::from(err).is_client_error());
	}

	#[test]
	fn message_styles_follow_the_error_family() {
		let field_errors = [
			ValidationError::UnknownFields { names: vec!["a".into()] },
			ValidationError::MissingFields { names: vec!["name".into()] },
			ValidationError::InvalidType { field: "scopes".into(), expected: "a string" },
			ValidationError::InvalidValue { field: "name".into(), reason: "bad".into() },
			ValidationError::NotAnObject,
		];

		for err in field_errors {
			let message = err.to_string();

			assert!(message.starts_with(char::is_lowercase), "{message}");
			assert!(!message.ends_with('.'), "{message}");
		}

		let other_errors: [Error; 4] = [
			ConfigError::MissingEndpoint.into(),
			TransportError::network("svc", "repo:a:pull", "connection reset").into(),
			TransientError::TokenEndpoint {
				scope: "repo:a:pull".into(),
				status: 503,
				status_line: "503 Service Unavailable".into(),
			}
			.into(),
			Error::Cancelled,
		];

		for err in other_errors {
			let message = err.to_string();

			assert!(message.starts_with(char::is_uppercase), "{message}");
			assert!(message.ends_with('.'), "{message}");
		}
	}

	#[test]
	fn missing_fields_are_quoted() {
		let err = ValidationError::MissingFields { names: vec!["name".into()] };

		assert_eq!(err.to_string(), "missing required field(s): [\"name\"]");
	}
}
