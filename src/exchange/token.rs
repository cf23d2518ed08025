//! Credential produced by one successful exchange.

// self
use crate::_prelude::*;

/// Redacted token secret wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Registry credential. Built fresh per exchange and never persisted.
#[derive(Clone, Debug)]
pub struct RegistryToken {
	/// Endpoint the token was obtained from.
	pub registry_url: String,
	/// Service the token was requested for.
	pub service: String,
	/// Requested scope string split on single spaces.
	pub request_scopes: Vec<String>,
	/// Scopes the issuer reports having granted, from the unverified token claims.
	pub token_scopes: Vec<String>,
	/// Signed bearer token.
	pub token: TokenSecret,
	/// OAuth2-compatible access token, often identical to `token`.
	pub access_token: TokenSecret,
	/// Issuance time plus the server-declared lifetime.
	pub expires_at: OffsetDateTime,
}
impl RegistryToken {
	/// Flat view handed back to callers, secrets included.
	pub fn view(&self) -> CredentialView {
		CredentialView {
			registry_url: self.registry_url.clone(),
			service: self.service.clone(),
			request_scopes: self.request_scopes.clone(),
			token_scopes: self.token_scopes.clone(),
			token: self.token.expose().to_owned(),
			access_token: self.access_token.expose().to_owned(),
			expires_at: self.expires_at.to_offset(time::UtcOffset::UTC),
		}
	}
}

/// Credential as a flat field map; `expires_at` serializes as RFC 3339 UTC.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialView {
	/// Endpoint the token was obtained from.
	pub registry_url: String,
	/// Service the token was requested for.
	pub service: String,
	/// Requested scopes.
	pub request_scopes: Vec<String>,
	/// Scopes reported by the issuer.
	pub token_scopes: Vec<String>,
	/// Signed bearer token.
	pub token: String,
	/// OAuth2-compatible access token.
	pub access_token: String,
	/// Expiry instant.
	#[serde(with = "time::serde::rfc3339")]
	pub expires_at: OffsetDateTime,
}
impl Debug for CredentialView {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialView")
			.field("registry_url", &self.registry_url)
			.field("service", &self.service)
			.field("request_scopes", &self.request_scopes)
			.field("token_scopes", &self.token_scopes)
			.field("token", &"<redacted>")
			.field("access_token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn token() -> RegistryToken {
		RegistryToken {
			registry_url: "https://auth.docker.io".into(),
			service: "registry.docker.io".into(),
			request_scopes: vec!["repository:myimg:pull".into()],
			token_scopes: vec!["repository:myimg:pull".into()],
			token: TokenSecret::new("header.payload.sig"),
			access_token: TokenSecret::new("access"),
			expires_at: macros::datetime!(2025-11-10 12:02 +01:00),
		}
	}

	#[test]
	fn secret_formatters_redact() {
		let secret = TokenSecret::new("super-secret");

		assert_eq!(format!("{secret:?}"), "TokenSecret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
		assert!(!format!("{:?}", token()).contains("header.payload.sig"));
		assert!(!format!("{:?}", token().view()).contains("header.payload.sig"));
	}

	#[test]
	fn view_serializes_to_flat_map() {
		let value = serde_json::to_value(token().view()).expect("View should serialize.");
		let map = value.as_object().expect("View should serialize to an object.");
		let mut keys = map.keys().map(String::as_str).collect::<Vec<_>>();

		keys.sort_unstable();

		assert_eq!(
			keys,
			vec![
				"access_token",
				"expires_at",
				"registry_url",
				"request_scopes",
				"service",
				"token",
				"token_scopes",
			],
		);
		assert_eq!(map["expires_at"], "2025-11-10T11:02:00Z");
		assert_eq!(map["token"], "header.payload.sig");
	}
}
