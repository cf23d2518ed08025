//! Named roles mapping a logical identity to a target service and requested scopes.

// self
use crate::{
	_prelude::*,
	error::ValidationError,
	schema::{FieldData, FieldKind, FieldRequest, FieldSchema, FieldTable},
	store::{Storage, StoreEntry},
};

/// Service assigned to new roles that do not name one.
pub const DEFAULT_SERVICE: &str = "registry.docker.io";
/// Storage prefix under which roles live.
pub const ROLES_PREFIX: &str = "roles/";

/// Stored role.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Role {
	/// Role name, also the last segment of its storage key.
	pub name: String,
	/// `service` query parameter sent with each exchange.
	pub service: String,
	/// Scope expressions (`type:name:actions`) requested for each exchange.
	pub scopes: Vec<String>,
}
impl Role {
	/// Storage key for the named role.
	pub fn storage_key(name: &str) -> String {
		format!("{ROLES_PREFIX}{name}")
	}

	/// Loads the named role, returning a zero-valued role when none is stored.
	pub async fn load(store: &dyn Storage, name: &str) -> Result<Self> {
		Ok(Self::fetch(store, name).await?.unwrap_or_default())
	}

	/// Loads the named role, if stored.
	pub async fn fetch(store: &dyn Storage, name: &str) -> Result<Option<Self>> {
		let key = Self::storage_key(name);
		let entry = store
			.get(&key)
			.await
			.map_err(|e| Error::storage("failed to get role from storage", e))?;

		match entry {
			Some(entry) if !entry.is_empty() => entry
				.decode_json()
				.map(Some)
				.map_err(|e| Error::storage("failed to decode role", e)),
			_ => Ok(None),
		}
	}

	/// Names of all stored roles, sorted.
	pub async fn list(store: &dyn Storage) -> Result<Vec<String>> {
		store.list(ROLES_PREFIX).await.map_err(|e| Error::storage("failed to list roles", e))
	}

	/// Removes the named role. Missing roles are not an error.
	pub async fn delete(store: &dyn Storage, name: &str) -> Result<()> {
		store
			.delete(&Self::storage_key(name))
			.await
			.map_err(|e| Error::storage("failed to delete role from storage", e))
	}

	/// Applies the supplied fields and reports whether anything changed.
	///
	/// Supplied scopes replace the stored ones wholesale.
	pub fn update(&mut self, fields: &RoleFields) -> bool {
		let mut changed = false;
		let name = fields.name.trim();

		if self.name != name {
			self.name = name.to_owned();
			changed = true;
		}
		if let Some(service) = fields.service.as_deref().map(str::trim) {
			if self.service != service {
				self.service = service.to_owned();
				changed = true;
			}
		}
		if let Some(scopes) = &fields.scopes {
			if self.scopes != *scopes {
				self.scopes = scopes.clone();
				changed = true;
			}
		}

		changed
	}

	/// Writes the role under its name. Callers skip this when [`Role::update`] reported no
	/// change.
	pub async fn persist(&self, store: &dyn Storage) -> Result<()> {
		let entry = StoreEntry::json(Self::storage_key(&self.name), self)
			.map_err(|e| Error::storage("failed to generate JSON role", e))?;

		store.put(entry).await.map_err(|e| Error::storage("failed to persist role to storage", e))
	}

	/// Scopes joined with single spaces, as sent in the `scope` query parameter.
	pub fn scope(&self) -> String {
		self.scopes.join(" ")
	}
}

/// Typed `write_role` request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleFields {
	/// Role name, lower-cased.
	pub name: String,
	/// Target service, lower-cased.
	pub service: Option<String>,
	/// Replacement scope list.
	pub scopes: Option<Vec<String>>,
}
impl RoleFields {
	/// Fills in the table's `service` default ([`DEFAULT_SERVICE`]) when no service was
	/// supplied; applied to new roles only.
	pub fn or_default_service(mut self) -> Self {
		if self.service.is_none() {
			self.service = Self::TABLE.default_of("service").map(str::to_owned);
		}

		self
	}
}
impl FieldRequest for RoleFields {
	const TABLE: FieldTable = FieldTable::new(&[
		FieldSchema::required("name", FieldKind::LowerCaseString),
		FieldSchema::optional("service", FieldKind::LowerCaseString).with_default(DEFAULT_SERVICE),
		FieldSchema::optional("scopes", FieldKind::StringSlice),
	]);

	fn from_data(data: FieldData) -> Result<Self, ValidationError> {
		let name = data.get_ok_str("name").unwrap_or_default().to_owned();

		validate_role_name(&name)?;

		Ok(Self {
			name,
			service: data.get_ok_str("service").map(str::to_owned),
			scopes: data.get_ok_slice("scopes").map(<[String]>::to_vec),
		})
	}
}

/// Typed `read_credentials` request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredsFields {
	/// Role to issue a credential for.
	pub name: String,
}
impl FieldRequest for CredsFields {
	const TABLE: FieldTable =
		FieldTable::new(&[FieldSchema::required("name", FieldKind::String)]);

	fn from_data(data: FieldData) -> Result<Self, ValidationError> {
		let name = data.get_ok_str("name").unwrap_or_default().to_owned();

		validate_role_name(&name)?;

		Ok(Self { name })
	}
}

/// Role names are word characters, optionally with `-` or `.` between them.
pub fn validate_role_name(name: &str) -> Result<(), ValidationError> {
	let word = |c: char| c.is_ascii_alphanumeric() || c == '_';
	let valid = match (name.chars().next(), name.chars().last()) {
		(Some(first), Some(last)) =>
			word(first) && word(last) && name.chars().all(|c| word(c) || c == '-' || c == '.'),
		_ => false,
	};

	if valid {
		Ok(())
	} else {
		Err(ValidationError::InvalidValue {
			field: "name".into(),
			reason: format!("{name:?} is not a valid role name"),
		})
	}
}
