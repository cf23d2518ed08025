//! Demonstrates configuring a role and issuing a registry credential against a mocked auth
//! server with the default reqwest transport and in-memory store.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::json;
// self
use registry_token_broker::{
	broker::ReqwestBroker,
	store::{MemoryStore, Storage},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token = jsonwebtoken::encode(
		&Header::new(Algorithm::HS256),
		&json!({
			"aud": "registry.docker.io",
			"iss": "auth.docker.io",
			"access": [{ "type": "repository", "name": "library/alpine", "actions": ["pull"] }],
		}),
		&EncodingKey::from_secret(b"demo-issuer"),
	)?;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/token")
				.query_param("service", "registry.docker.io")
				.query_param("scope", "repository:library/alpine:pull");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"token": token,
				"access_token": token,
				"expires_in": 300,
			}));
		})
		.await;
	let store: Arc<dyn Storage> = Arc::new(MemoryStore::default());
	let broker = ReqwestBroker::new(store);

	broker.write_config(&json!({ "endpoint_url": server.base_url() })).await?;
	broker.write_role("alpine-pull", &json!({ "scopes": ["repository:library/alpine:pull"] })).await?;

	let credential = broker.read_credentials(&json!({ "name": "alpine-pull" })).await?;

	println!("roles: {:?}", broker.list_roles().await?);
	println!("token scopes: {:?}", credential.token_scopes);
	println!("expires at: {}", credential.expires_at);

	token_mock.assert_async().await;
	broker.stop();

	Ok(())
}
