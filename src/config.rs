//! Engine configuration: exchange endpoint plus the identity presented to it.

// self
use crate::{
	_prelude::*,
	error::ValidationError,
	schema::{FieldData, FieldKind, FieldRequest, FieldSchema, FieldTable},
	store::{Storage, StoreEntry},
};

/// Endpoint used until an operator configures another one.
pub const DEFAULT_ENDPOINT: &str = "https://auth.docker.io";
/// Storage key holding the configuration.
pub const CONFIG_KEY: &str = "config";

/// Stored configuration.
///
/// Missing fields in a stored document keep their defaults.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Base URL of the token-issuing service; `/token` is appended per exchange.
	pub endpoint_url: String,
	/// `client_id` query parameter sent with every exchange.
	pub client_id: String,
	/// Basic-auth username.
	pub username: String,
	/// Basic-auth password; never logged.
	pub password: String,
}
impl Config {
	/// Loads the configuration, returning defaults when nothing is stored.
	pub async fn load(store: &dyn Storage) -> Result<Self> {
		let entry = store
			.get(CONFIG_KEY)
			.await
			.map_err(|e| Error::storage("failed to get configuration from storage", e))?;
		let mut config = match entry {
			Some(entry) if !entry.is_empty() => entry
				.decode_json::<Self>()
				.map_err(|e| Error::storage("failed to decode configuration", e))?,
			_ => return Ok(Self::default()),
		};

		if config.endpoint_url.trim().is_empty() {
			config.endpoint_url = DEFAULT_ENDPOINT.into();
		}

		Ok(config)
	}

	/// Applies the supplied fields and reports whether anything changed.
	///
	/// Values are trimmed before comparison. An empty `endpoint_url` resets the default.
	pub fn update(&mut self, fields: &ConfigFields) -> bool {
		let mut changed = false;

		if let Some(value) = fields.endpoint_url.as_deref() {
			let value = match value.trim() {
				"" => DEFAULT_ENDPOINT,
				trimmed => trimmed,
			};

			changed |= assign(&mut self.endpoint_url, value);
		}
		if let Some(value) = fields.client_id.as_deref() {
			changed |= assign(&mut self.client_id, value.trim());
		}
		if let Some(value) = fields.username.as_deref() {
			changed |= assign(&mut self.username, value.trim());
		}
		if let Some(value) = fields.password.as_deref() {
			changed |= assign(&mut self.password, value.trim());
		}

		changed
	}

	/// Writes the configuration. Callers skip this when [`Config::update`] reported no change.
	pub async fn persist(&self, store: &dyn Storage) -> Result<()> {
		let entry = StoreEntry::json(CONFIG_KEY, self)
			.map_err(|e| Error::storage("failed to generate JSON configuration", e))?;

		store
			.put(entry)
			.await
			.map_err(|e| Error::storage("failed to persist configuration to storage", e))
	}

	/// Removes the stored configuration so the next load returns defaults.
	pub async fn delete(store: &dyn Storage) -> Result<()> {
		store
			.delete(CONFIG_KEY)
			.await
			.map_err(|e| Error::storage("failed to delete configuration from storage", e))
	}

	/// Read-side view with the password withheld.
	pub fn view(&self) -> ConfigView {
		ConfigView {
			endpoint_url: self.endpoint_url.clone(),
			client_id: self.client_id.clone(),
			username: self.username.clone(),
			password_set: !self.password.is_empty(),
		}
	}
}
impl Default for Config {
	fn default() -> Self {
		Self {
			endpoint_url: DEFAULT_ENDPOINT.into(),
			client_id: String::new(),
			username: String::new(),
			password: String::new(),
		}
	}
}
impl Debug for Config {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Config")
			.field("endpoint_url", &self.endpoint_url)
			.field("client_id", &self.client_id)
			.field("username", &self.username)
			.field("password_set", &!self.password.is_empty())
			.finish()
	}
}

/// Configuration as returned to readers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigView {
	/// Token endpoint base URL.
	pub endpoint_url: String,
	/// Configured client identifier.
	pub client_id: String,
	/// Configured basic-auth username.
	pub username: String,
	/// Whether a password is stored.
	pub password_set: bool,
}

/// Typed `write_config` request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigFields {
	/// New endpoint; empty resets the default.
	pub endpoint_url: Option<String>,
	/// New client identifier.
	pub client_id: Option<String>,
	/// New basic-auth username.
	pub username: Option<String>,
	/// New basic-auth password.
	pub password: Option<String>,
}
impl FieldRequest for ConfigFields {
	const TABLE: FieldTable = FieldTable::new(&[
		FieldSchema::optional("endpoint_url", FieldKind::String),
		FieldSchema::optional("client_id", FieldKind::String),
		FieldSchema::optional("username", FieldKind::String),
		FieldSchema::optional("password", FieldKind::String),
	]);

	fn from_data(data: FieldData) -> Result<Self, ValidationError> {
		let endpoint_url = data.get_ok_str("endpoint_url").map(str::to_owned);

		if let Some(endpoint) = endpoint_url.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
			validate_endpoint(endpoint)?;
		}

		Ok(Self {
			endpoint_url,
			client_id: data.get_ok_str("client_id").map(str::to_owned),
			username: data.get_ok_str("username").map(str::to_owned),
			password: data.get_ok_str("password").map(str::to_owned),
		})
	}
}

fn validate_endpoint(endpoint: &str) -> Result<(), ValidationError> {
	let invalid = |reason: String| ValidationError::InvalidValue {
		field: "endpoint_url".into(),
		reason,
	};
	let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;

	match url.scheme() {
		"http" | "https" => Ok(()),
		other => Err(invalid(format!("unsupported scheme `{other}`"))),
	}
}

fn assign(slot: &mut String, value: &str) -> bool {
	if slot == value {
		return false;
	}

	*slot = value.to_owned();

	true
}
