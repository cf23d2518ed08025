//! Credential broker service object.
//!
//! [`Broker`] ties the stored configuration and roles to a [`RegistryClient`] through the
//! [`RetryPolicy`]. Every call loads what it needs from storage, so one broker can be shared
//! freely between tasks. The only shared mutable state is the shutdown token owned by the
//! broker's [`Lifecycle`].

// crates.io
use serde_json::Value;
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	config::{Config, ConfigFields, ConfigView},
	error::ValidationError,
	exchange::{CredentialView, RegistryClient, RegistryToken, TokenRequest},
	obs::{self, OpKind},
	retry::RetryPolicy,
	role::{CredsFields, Role, RoleFields, validate_role_name},
	schema::FieldRequest,
	store::Storage,
};
#[cfg(feature = "reqwest")] use crate::exchange::ReqwestExchangeClient;

#[cfg(feature = "reqwest")]
/// Broker specialized for the crate's default reqwest transport.
pub type ReqwestBroker = Broker<ReqwestExchangeClient>;

/// Shutdown token shared by every in-flight issuance.
///
/// Each issuance runs under a child of the current token, so [`Lifecycle::stop`] aborts all of
/// them at once. The mutex only serializes start/stop transitions.
#[derive(Debug, Default)]
pub struct Lifecycle {
	shutdown: Mutex<CancellationToken>,
}
impl Lifecycle {
	/// Re-arms a fresh token when the current one has already fired.
	pub fn start(&self) {
		let mut shutdown = self.shutdown.lock();

		if shutdown.is_cancelled() {
			*shutdown = CancellationToken::new();
		}

		obs::lifecycle("started");
	}

	/// Fires the current token. Safe to call repeatedly and concurrently.
	pub fn stop(&self) {
		self.shutdown.lock().cancel();

		obs::lifecycle("stopped");
	}

	/// Whether the current token has fired.
	pub fn is_stopped(&self) -> bool {
		self.shutdown.lock().is_cancelled()
	}

	/// Token cancelled by the next [`Lifecycle::stop`].
	pub fn child(&self) -> CancellationToken {
		self.shutdown.lock().child_token()
	}
}

/// Issues registry credentials for stored roles.
pub struct Broker<R>
where
	R: ?Sized + RegistryClient,
{
	/// Backing store for the configuration and roles.
	pub store: Arc<dyn Storage>,
	/// Client performing each exchange.
	pub client: Arc<R>,
	/// Retry budget applied to issuance.
	pub retry: RetryPolicy,
	lifecycle: Arc<Lifecycle>,
}
impl<R> Broker<R>
where
	R: ?Sized + RegistryClient,
{
	/// Creates a broker around a caller-provided exchange client.
	pub fn with_client(store: Arc<dyn Storage>, client: impl Into<Arc<R>>) -> Self {
		Self {
			store,
			client: client.into(),
			retry: RetryPolicy::fibonacci(),
			lifecycle: Default::default(),
		}
	}

	/// Replaces the retry policy used for issuance.
	pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Shutdown state shared with every clone of this broker.
	pub fn lifecycle(&self) -> &Lifecycle {
		&self.lifecycle
	}

	/// Allows issuance again after [`Broker::stop`].
	pub fn start(&self) {
		self.lifecycle.start();
	}

	/// Aborts every in-flight issuance; later issuances fail with [`Error::Cancelled`] until
	/// [`Broker::start`] is called.
	pub fn stop(&self) {
		self.lifecycle.stop();
	}

	/// Current configuration with the password hidden.
	pub async fn read_config(&self) -> Result<ConfigView> {
		obs::observe(OpKind::ConfigRead, "read_config", async {
			Ok(Config::load(self.store.as_ref()).await?.view())
		})
		.await
	}

	/// Applies the supplied configuration fields, persisting only when something changed.
	pub async fn write_config(&self, raw: &Value) -> Result<bool> {
		obs::observe(OpKind::ConfigWrite, "write_config", async {
			let fields = ConfigFields::parse(raw)?;
			let mut config = Config::load(self.store.as_ref()).await?;
			let changed = config.update(&fields);

			if changed {
				config.persist(self.store.as_ref()).await?;
			}

			Ok(changed)
		})
		.await
	}

	/// Removes the stored configuration; later reads return defaults.
	pub async fn delete_config(&self) -> Result<()> {
		obs::observe(OpKind::ConfigDelete, "delete_config", Config::delete(self.store.as_ref()))
			.await
	}

	/// Stored role, if any.
	pub async fn read_role(&self, name: &str) -> Result<Option<Role>> {
		obs::observe(OpKind::RoleRead, "read_role", async {
			let name = role_name(name)?;

			Role::fetch(self.store.as_ref(), &name).await
		})
		.await
	}

	/// Creates or updates the named role.
	///
	/// `name` overrides any `name` field in `raw`. New roles default their service to
	/// [`DEFAULT_SERVICE`](crate::role::DEFAULT_SERVICE). Returns whether a write happened.
	pub async fn write_role(&self, name: &str, raw: &Value) -> Result<bool> {
		obs::observe(OpKind::RoleWrite, "write_role", async {
			let raw = with_path_name(name, raw)?;
			let fields = RoleFields::parse(&raw)?;
			let (mut role, fields) = match Role::fetch(self.store.as_ref(), &fields.name).await? {
				Some(role) => (role, fields),
				None => (Role::default(), fields.or_default_service()),
			};
			let changed = role.update(&fields);

			if changed {
				role.persist(self.store.as_ref()).await?;
			}

			Ok(changed)
		})
		.await
	}

	/// Removes the named role. Missing roles are not an error.
	pub async fn delete_role(&self, name: &str) -> Result<()> {
		obs::observe(OpKind::RoleDelete, "delete_role", async {
			let name = role_name(name)?;

			Role::delete(self.store.as_ref(), &name).await
		})
		.await
	}

	/// Names of all stored roles, sorted.
	pub async fn list_roles(&self) -> Result<Vec<String>> {
		obs::observe(OpKind::RoleList, "list_roles", Role::list(self.store.as_ref())).await
	}

	/// Issues a fresh credential for the named role.
	pub async fn issue(&self, name: &str) -> Result<RegistryToken> {
		self.issue_with_cancel(name, &CancellationToken::new()).await
	}

	/// Issues a fresh credential, aborting when either `cancel` or the broker's shutdown token
	/// fires.
	///
	/// A role that does not exist is exchanged with an empty service and scope.
	pub async fn issue_with_cancel(
		&self,
		name: &str,
		cancel: &CancellationToken,
	) -> Result<RegistryToken> {
		obs::observe(OpKind::Issue, "issue", async {
			let name = role_name(name)?;
			let shutdown = self.lifecycle.child();

			tokio::select! {
				biased;
				_ = cancel.cancelled() => Err(Error::Cancelled),
				result = self.issue_inner(&name, &shutdown) => result,
			}
		})
		.await
	}

	/// Validates a credential request and issues the credential as a flat field map.
	pub async fn read_credentials(&self, raw: &Value) -> Result<CredentialView> {
		let fields = CredsFields::parse(raw)?;

		Ok(self.issue(&fields.name).await?.view())
	}

	async fn issue_inner(&self, name: &str, shutdown: &CancellationToken) -> Result<RegistryToken> {
		let config = Config::load(self.store.as_ref()).await?;
		let role = Role::load(self.store.as_ref(), name).await?;
		let request = TokenRequest::new(&config, &role);

		request.validate()?;

		self.retry
			.run(shutdown, || self.client.token(&request, shutdown))
			.await
			.map_err(|e| match e {
				Error::Cancelled => Error::Cancelled,
				e => Error::TokenRetrieval { source: Box::new(e) },
			})
	}
}
#[cfg(feature = "reqwest")]
impl Broker<ReqwestExchangeClient> {
	/// Creates a broker with the default reqwest-backed exchange client.
	pub fn new(store: Arc<dyn Storage>) -> Self {
		Self::with_client(store, ReqwestExchangeClient::default())
	}
}
impl<R> Clone for Broker<R>
where
	R: ?Sized + RegistryClient,
{
	fn clone(&self) -> Self {
		Self {
			store: self.store.clone(),
			client: self.client.clone(),
			retry: self.retry,
			lifecycle: self.lifecycle.clone(),
		}
	}
}
impl<R> Debug for Broker<R>
where
	R: ?Sized + RegistryClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("retry", &self.retry)
			.field("stopped", &self.lifecycle.is_stopped())
			.finish()
	}
}

fn role_name(name: &str) -> Result<String, ValidationError> {
	let name = name.to_lowercase();

	validate_role_name(&name)?;

	Ok(name)
}

fn with_path_name(name: &str, raw: &Value) -> Result<Value, ValidationError> {
	let mut raw = match raw {
		Value::Null => Value::Object(Default::default()),
		Value::Object(_) => raw.clone(),
		_ => return Err(ValidationError::NotAnObject),
	};

	if let Value::Object(map) = &mut raw {
		map.insert("name".into(), Value::String(name.to_owned()));
	}

	Ok(raw)
}
