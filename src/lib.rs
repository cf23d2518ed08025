//! Short-lived container registry bearer tokens on demand: role-scoped token exchanges with
//! bounded retries, unverified claim inspection, and pluggable storage.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod broker;
pub mod config;
pub mod error;
pub mod exchange;
pub mod http;
pub mod obs;
pub mod retry;
pub mod role;
pub mod schema;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for unit and integration tests.

	pub use crate::_prelude::*;

	// std
	use std::time::Duration as StdDuration;
	// crates.io
	use jsonwebtoken::{Algorithm, EncodingKey, Header};
	use serde_json::{Value, json};
	// self
	use crate::{
		broker::ReqwestBroker,
		config::Config,
		exchange::ReqwestExchangeClient,
		http::ReqwestHttpClient,
		retry::RetryPolicy,
		store::{MemoryStore, Storage},
	};

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Constructs a [`ReqwestBroker`] backed by an in-memory store whose configuration points
	/// at `server_url`.
	///
	/// The retry interval is shortened to 1 ms so failure paths finish quickly.
	pub async fn build_test_broker(server_url: &str) -> (ReqwestBroker, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn Storage> = store_backend.clone();
		let config = Config { endpoint_url: server_url.to_owned(), ..Default::default() };

		config.persist(store.as_ref()).await.expect("Test configuration should persist.");

		let client = ReqwestExchangeClient::with_http_client(test_reqwest_http_client());
		let broker = ReqwestBroker::with_client(store, client)
			.with_retry_policy(RetryPolicy::fibonacci().with_interval(StdDuration::from_millis(1)));

		(broker, store_backend)
	}

	/// Mints a token whose claims grant `access`, signed with a key the broker never sees.
	pub fn test_token(access: Value) -> String {
		jsonwebtoken::encode(
			&Header::new(Algorithm::HS256),
			&json!({
				"aud": "registry.docker.io",
				"iss": "auth.docker.io",
				"exp": 4_102_444_800_u64,
				"nbf": 0,
				"iat": 0,
				"access": access,
			}),
			&EncodingKey::from_secret(b"registry-issuer"),
		)
		.expect("Test token should encode.")
	}

	/// Token endpoint body wrapping `token` with the given lifetime.
	pub fn token_response(token: &str, expires_in: i64) -> Value {
		json!({
			"token": token,
			"access_token": token,
			"expires_in": expires_in,
			"issued_at": "2025-01-01T00:00:00Z",
			"jti": "test-jti",
			"sub": "robot",
		})
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
