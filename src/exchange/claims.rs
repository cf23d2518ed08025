//! Unverified decoding of compact signed tokens issued by the registry auth server.
//!
//! The issuer's certificate chain is not available here, so signatures are never checked.
//! Decoded claims describe what the issuer says it granted; they are reported back to the
//! caller as-is and must not drive any local authorization decision.

// crates.io
use jsonwebtoken::{DecodingKey, Header, Validation, errors::Error as JwtError};
use serde_json::Value;
// self
use crate::_prelude::*;

/// Compact signed token split into its decoded parts.
#[derive(Clone, Debug)]
pub struct SignedToken {
	/// Decoded protected header.
	pub header: Header,
	claims: Value,
}
impl SignedToken {
	/// Decodes `header.payload.signature` without verifying the signature or any time claim.
	pub fn parse(compact: &str) -> Result<Self, JwtError> {
		let data = jsonwebtoken::decode::<Value>(
			compact,
			&DecodingKey::from_secret(&[]),
			&unverified_validation(),
		)?;

		Ok(Self { header: data.header, claims: data.claims })
	}

	/// Deserializes the payload into `T`.
	pub fn claims<T>(&self) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
	where
		T: for<'de> Deserialize<'de>,
	{
		serde_path_to_error::deserialize(self.claims.clone())
	}
}

/// Claims carried by a registry token. Advisory only.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenClaims {
	/// Audience (the registry service).
	pub aud: String,
	/// Issuer.
	pub iss: String,
	/// Expiry, seconds since the epoch.
	pub exp: u64,
	/// Not-before, seconds since the epoch.
	pub nbf: u64,
	/// Issued-at, seconds since the epoch.
	pub iat: u64,
	/// Access records granted by the issuer.
	pub access: Vec<AccessEntry>,
}
impl TokenClaims {
	/// One `type:name:actions` expression per access record, in claim order.
	pub fn scopes(&self) -> Vec<String> {
		self.access.iter().map(ToString::to_string).collect()
	}
}

/// One granted resource and its actions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessEntry {
	/// Resource type, e.g. `repository`.
	#[serde(rename = "type")]
	pub kind: String,
	/// Resource name.
	pub name: String,
	/// Granted actions, e.g. `pull`.
	pub actions: Vec<String>,
}
impl Display for AccessEntry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}:{}:{}", self.kind, self.name, self.actions.join(","))
	}
}

// Registry tokens carry `aud` and `exp`, but neither is ours to enforce.
fn unverified_validation() -> Validation {
	let mut validation = Validation::default();

	validation.insecure_disable_signature_validation();
	validation.validate_exp = false;
	validation.validate_aud = false;
	validation.required_spec_claims.clear();

	validation
}
