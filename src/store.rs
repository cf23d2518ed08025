//! Key-value storage contract consumed by the config and role models, plus built-in backends.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::_prelude::*;

/// Boxed future returned by [`Storage`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Opaque keyed blob storage used to persist config and roles.
///
/// Implementations must offer read-your-writes per key; no cross-key transactions are needed.
pub trait Storage
where
	Self: Send + Sync,
{
	/// Fetches the entry stored under `key`, if present.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<StoreEntry>>;

	/// Inserts or replaces an entry.
	fn put(&self, entry: StoreEntry) -> StoreFuture<'_, ()>;

	/// Removes the entry stored under `key`. Missing keys are not an error.
	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;

	/// Lists keys under `prefix`, relative to it and sorted.
	fn list<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, Vec<String>>;
}

/// One stored blob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreEntry {
	/// Storage key.
	pub key: String,
	/// Raw value, JSON for every entity this crate persists.
	pub value: Vec<u8>,
}
impl StoreEntry {
	/// Serializes `value` as JSON under `key`.
	pub fn json<T>(key: impl Into<String>, value: &T) -> Result<Self, StoreError>
	where
		T: ?Sized + Serialize,
	{
		let value = serde_json::to_vec(value)
			.map_err(|e| StoreError::Serialization { message: e.to_string() })?;

		Ok(Self { key: key.into(), value })
	}

	/// Returns `true` when the entry carries no bytes.
	pub fn is_empty(&self) -> bool {
		self.value.is_empty()
	}

	/// Decodes the JSON value into `T`.
	pub fn decode_json<T>(&self) -> Result<T, StoreError>
	where
		T: for<'de> Deserialize<'de>,
	{
		serde_json::from_slice(&self.value).map_err(|e| StoreError::Serialization {
			message: format!("Failed to decode {}: {e}", self.key),
		})
	}
}

/// Error type produced by [`Storage`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced while encoding or decoding entries.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Returns the keys under `prefix` relative to it, skipping anything deeper than one level.
pub(crate) fn list_relative<'a, I>(keys: I, prefix: &str) -> Vec<String>
where
	I: IntoIterator<Item = &'a String>,
{
	let mut out = Vec::new();

	for key in keys {
		let Some(rest) = key.strip_prefix(prefix) else { continue };

		if rest.is_empty() {
			continue;
		}

		// Nested keys collapse to their first segment plus a trailing slash.
		let item = match rest.find('/') {
			Some(idx) => rest[..=idx].to_owned(),
			None => rest.to_owned(),
		};

		out.push(item);
	}

	out.sort();
	out.dedup();

	out
}
