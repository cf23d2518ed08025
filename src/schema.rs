//! Explicit field tables used to validate request data before any handler runs.
//!
//! Every operation declares a static [`FieldTable`] listing the fields it accepts. Raw
//! JSON request data is checked against that table (unknown names, missing required
//! fields, wrong types) and turned into a typed request via [`FieldRequest`].

// crates.io
use serde_json::{Map, Value};
// self
use crate::{_prelude::*, error::ValidationError};

/// Value types a field may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
	/// Plain string.
	String,
	/// String lower-cased during validation.
	LowerCaseString,
	/// List of strings; accepts a JSON array or a whitespace-separated string.
	StringSlice,
}
impl FieldKind {
	const fn expected(self) -> &'static str {
		match self {
			FieldKind::String | FieldKind::LowerCaseString => "a string",
			FieldKind::StringSlice => "a string or an array of strings",
		}
	}
}

/// One entry of a [`FieldTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSchema {
	/// Field name as it appears in request data.
	pub name: &'static str,
	/// Accepted value type.
	pub kind: FieldKind,
	/// Whether validation fails when the field is absent.
	pub required: bool,
	/// Value reported by [`FieldData::get_str`] when the field is absent.
	pub default: Option<&'static str>,
}
impl FieldSchema {
	/// Optional field without a default.
	pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
		Self { name, kind, required: false, default: None }
	}

	/// Required field.
	pub const fn required(name: &'static str, kind: FieldKind) -> Self {
		Self { name, kind, required: true, default: None }
	}

	/// Attaches a default value.
	pub const fn with_default(mut self, default: &'static str) -> Self {
		self.default = Some(default);

		self
	}
}

/// Validated field value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
	/// Value of a [`FieldKind::String`] or [`FieldKind::LowerCaseString`] field.
	String(String),
	/// Value of a [`FieldKind::StringSlice`] field.
	StringSlice(Vec<String>),
}

/// Static list of the fields an operation accepts.
#[derive(Clone, Copy, Debug)]
pub struct FieldTable(&'static [FieldSchema]);
impl FieldTable {
	/// Wraps a static field list.
	pub const fn new(fields: &'static [FieldSchema]) -> Self {
		Self(fields)
	}

	/// Looks up a field by name.
	pub fn schema(&self, name: &str) -> Option<&'static FieldSchema> {
		self.0.iter().find(|field| field.name == name)
	}

	/// Default declared for `name`, if any.
	pub fn default_of(&self, name: &str) -> Option<&'static str> {
		self.schema(name).and_then(|field| field.default)
	}

	/// Checks raw request data against the table.
	///
	/// `null` request data counts as an empty object and `null` field values count as absent.
	pub fn validate(&self, raw: &Value) -> Result<FieldData, ValidationError> {
		let empty = Map::new();
		let object = match raw {
			Value::Object(object) => object,
			Value::Null => &empty,
			_ => return Err(ValidationError::NotAnObject),
		};
		let mut unknown =
			object.keys().filter(|key| self.schema(key).is_none()).cloned().collect::<Vec<_>>();

		if !unknown.is_empty() {
			unknown.sort();

			return Err(ValidationError::UnknownFields { names: unknown });
		}

		let mut values = BTreeMap::new();
		let mut missing = Vec::new();

		for field in self.0 {
			match object.get(field.name).filter(|value| !value.is_null()) {
				Some(value) => {
					values.insert(field.name, coerce(field, value)?);
				},
				None if field.required => missing.push(field.name.to_owned()),
				None => {},
			}
		}

		if !missing.is_empty() {
			return Err(ValidationError::MissingFields { names: missing });
		}

		Ok(FieldData { table: *self, values })
	}
}

/// Request data that passed [`FieldTable::validate`].
#[derive(Clone, Debug)]
pub struct FieldData {
	table: FieldTable,
	values: BTreeMap<&'static str, FieldValue>,
}
impl FieldData {
	/// Returns `true` if the caller supplied the field.
	pub fn contains(&self, name: &str) -> bool {
		self.values.contains_key(name)
	}

	/// String value supplied by the caller, ignoring defaults.
	pub fn get_ok_str(&self, name: &str) -> Option<&str> {
		match self.values.get(name) {
			Some(FieldValue::String(value)) => Some(value),
			_ => None,
		}
	}

	/// String value supplied by the caller, falling back to the table default.
	pub fn get_str(&self, name: &str) -> Option<&str> {
		self.get_ok_str(name).or_else(|| self.table.default_of(name))
	}

	/// String list supplied by the caller.
	pub fn get_ok_slice(&self, name: &str) -> Option<&[String]> {
		match self.values.get(name) {
			Some(FieldValue::StringSlice(values)) => Some(values),
			_ => None,
		}
	}
}

/// Typed request produced from a validated [`FieldTable`].
pub trait FieldRequest
where
	Self: Sized,
{
	/// Fields accepted by the request.
	const TABLE: FieldTable;

	/// Builds the typed request from validated data.
	fn from_data(data: FieldData) -> Result<Self, ValidationError>;

	/// Validates raw request data and builds the typed request.
	fn parse(raw: &Value) -> Result<Self, ValidationError> {
		Self::from_data(Self::TABLE.validate(raw)?)
	}
}

fn coerce(field: &FieldSchema, value: &Value) -> Result<FieldValue, ValidationError> {
	let invalid =
		|| ValidationError::InvalidType { field: field.name.to_owned(), expected: field.kind.expected() };

	match (field.kind, value) {
		(FieldKind::String, Value::String(s)) => Ok(FieldValue::String(s.clone())),
		(FieldKind::LowerCaseString, Value::String(s)) => Ok(FieldValue::String(s.to_lowercase())),
		(FieldKind::StringSlice, Value::String(s)) =>
			Ok(FieldValue::StringSlice(s.split_whitespace().map(str::to_owned).collect())),
		(FieldKind::StringSlice, Value::Array(items)) => {
			let mut out = Vec::with_capacity(items.len());

			for item in items {
				let s = item.as_str().ok_or_else(invalid)?.trim();

				if !s.is_empty() {
					out.push(s.to_owned());
				}
			}

			Ok(FieldValue::StringSlice(out))
		},
		_ => Err(invalid()),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	const TABLE: FieldTable = FieldTable::new(&[
		FieldSchema::required("name", FieldKind::LowerCaseString),
		FieldSchema::optional("service", FieldKind::LowerCaseString)
			.with_default("registry.docker.io"),
		FieldSchema::optional("scopes", FieldKind::StringSlice),
	]);

	#[test]
	fn unknown_fields_are_rejected_together_and_sorted() {
		let err = TABLE
			.validate(&json!({ "name": "ci", "zeta": 1, "alpha": true }))
			.expect_err("Unknown fields should be rejected.");

		assert_eq!(err, ValidationError::UnknownFields { names: vec!["alpha".into(), "zeta".into()] });
	}

	#[test]
	fn missing_required_fields_are_reported() {
		let err = TABLE.validate(&json!({})).expect_err("Missing name should be rejected.");

		assert_eq!(err, ValidationError::MissingFields { names: vec!["name".into()] });
	}

	#[test]
	fn defaults_apply_only_through_get() {
		let data = TABLE.validate(&json!({ "name": "CI" })).expect("Fields should validate.");

		assert_eq!(data.get_ok_str("name"), Some("ci"));
		assert_eq!(data.get_ok_str("service"), None);
		assert_eq!(data.get_str("service"), Some("registry.docker.io"));
		assert!(!data.contains("scopes"));
	}

	#[test]
	fn string_slices_accept_arrays_and_strings() {
		let data = TABLE
			.validate(&json!({ "name": "ci", "scopes": [" repository:a:pull ", "", "repository:b:push,pull"] }))
			.expect("Array scopes should validate.");

		assert_eq!(
			data.get_ok_slice("scopes"),
			Some(&["repository:a:pull".to_owned(), "repository:b:push,pull".to_owned()][..]),
		);

		let data = TABLE
			.validate(&json!({ "name": "ci", "scopes": "repository:a:pull  repository:b:pull" }))
			.expect("String scopes should validate.");

		assert_eq!(data.get_ok_slice("scopes").map(<[String]>::len), Some(2));
	}

	#[test]
	fn type_mismatches_are_rejected() {
		let err = TABLE
			.validate(&json!({ "name": 42 }))
			.expect_err("Numeric names should be rejected.");

		assert!(matches!(err, ValidationError::InvalidType { ref field, .. } if field == "name"));
		assert_eq!(
			TABLE.validate(&json!(["name"])).expect_err("Arrays are not request objects."),
			ValidationError::NotAnObject,
		);
	}

	#[test]
	fn null_values_count_as_absent() {
		let data = TABLE
			.validate(&json!({ "name": "ci", "scopes": null }))
			.expect("Null fields should validate.");

		assert!(!data.contains("scopes"));
	}
}
