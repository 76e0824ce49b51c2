use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{FieldAccess, FieldValue, Identifiable, meta_field};

/// Standard object metadata in the cluster API's camelCase layout.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub namespace: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub creation_timestamp: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub labels: BTreeMap<String, String>,
}

/// An opaque attribute bag: metadata plus whatever body the kind carries.
///
/// Views only look at identity and timestamps; the body is reachable through
/// dotted field paths (`status.phase`, `spec.replicas`) for filtering and
/// sorting.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicObject {
	pub metadata: ObjectMeta,
	#[serde(flatten)]
	pub data: Map<String, Value>,
}

impl DynamicObject {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			metadata: ObjectMeta {
				name: name.into(),
				..ObjectMeta::default()
			},
			data: Map::new(),
		}
	}

	pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
		let mut object = Self::new(name);
		object.metadata.namespace = Some(namespace.into());
		object
	}

	pub fn created_at(mut self, timestamp: DateTime<Utc>) -> Self {
		self.metadata.creation_timestamp = Some(timestamp);
		self
	}

	pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.metadata.labels.insert(key.into(), value.into());
		self
	}

	/// Sets a dotted body path, creating intermediate objects as needed.
	///
	/// Non-object values sitting on the path are overwritten.
	pub fn with_path(mut self, path: &str, value: impl Into<Value>) -> Self {
		self.set_path(path, value.into());
		self
	}

	pub fn set_path(&mut self, path: &str, value: Value) {
		let mut segments = path.split('.').peekable();
		let mut cursor = &mut self.data;
		while let Some(segment) = segments.next() {
			if segments.peek().is_none() {
				cursor.insert(segment.to_string(), value);
				return;
			}
			let slot = cursor.entry(segment.to_string()).or_insert_with(|| Value::Object(Map::new()));
			if !slot.is_object() {
				*slot = Value::Object(Map::new());
			}
			let Value::Object(next) = slot else {
				return;
			};
			cursor = next;
		}
	}

	/// Looks up a dotted body path.
	pub fn path(&self, path: &str) -> Option<&Value> {
		let mut segments = path.split('.');
		let first = segments.next()?;
		segments.try_fold(self.data.get(first)?, |value, segment| value.get(segment))
	}
}

impl Identifiable for DynamicObject {
	fn name(&self) -> &str {
		&self.metadata.name
	}

	fn namespace(&self) -> Option<&str> {
		self.metadata.namespace.as_deref()
	}

	fn creation_timestamp(&self) -> Option<DateTime<Utc>> {
		self.metadata.creation_timestamp
	}
}

impl FieldAccess for DynamicObject {
	fn field(&self, field: &str) -> Option<FieldValue> {
		if let Some(value) = meta_field(self, field) {
			return Some(value);
		}
		if let Some(label) = field.strip_prefix("labels.") {
			return self.metadata.labels.get(label).map(|value| FieldValue::Text(value.clone()));
		}
		match self.path(field)? {
			Value::String(text) => Some(FieldValue::Text(text.clone())),
			Value::Number(number) => number.as_f64().map(FieldValue::Number),
			Value::Bool(flag) => Some(FieldValue::Flag(*flag)),
			Value::Null => None,
			other => Some(FieldValue::Text(other.to_string())),
		}
	}
}
