use std::fmt;

use chrono::{DateTime, Utc};

use crate::IdentityKey;

/// Identity and age extraction shared by every resource kind.
///
/// This is the only place identity is derived from an object; views never key
/// objects any other way.
pub trait Identifiable {
	fn name(&self) -> &str;

	/// Namespace of the object, or `None` for cluster-scoped kinds.
	fn namespace(&self) -> Option<&str>;

	fn creation_timestamp(&self) -> Option<DateTime<Utc>>;

	fn identity_key(&self) -> IdentityKey {
		IdentityKey::new(self.namespace(), self.name())
	}
}

/// Kind-specific attribute lookup used for text filtering and sorting.
pub trait FieldAccess: Identifiable {
	/// Resolves `field` to a comparable value.
	///
	/// Implementations should fall back to [`meta_field`] so that `name`,
	/// `namespace`, and `age` work for every kind.
	fn field(&self, field: &str) -> Option<FieldValue> {
		meta_field(self, field)
	}
}

/// Everything a live view needs from an object type.
pub trait Resource: FieldAccess + Clone + Send + Sync + 'static {}

impl<T> Resource for T where T: FieldAccess + Clone + Send + Sync + 'static {}

/// Resolves the built-in metadata fields shared by all kinds.
pub fn meta_field<T: Identifiable + ?Sized>(object: &T, field: &str) -> Option<FieldValue> {
	match field {
		"name" => Some(FieldValue::Text(object.name().to_string())),
		"namespace" => object.namespace().map(|ns| FieldValue::Text(ns.to_string())),
		"age" | "creationTimestamp" => object.creation_timestamp().map(FieldValue::Time),
		_ => None,
	}
}

/// An extracted attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
	Text(String),
	Number(f64),
	Time(DateTime<Utc>),
	Flag(bool),
}

impl FieldValue {
	/// Text the free-text filter matches against.
	pub fn search_text(&self) -> String {
		match self {
			Self::Text(text) => text.clone(),
			Self::Number(number) => number.to_string(),
			Self::Time(time) => time.to_rfc3339(),
			Self::Flag(flag) => flag.to_string(),
		}
	}
}

impl fmt::Display for FieldValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.search_text())
	}
}
