//! View options and their TOML representation.
//!
//! ```toml
//! snapshot_timeout_ms = 15000
//! attach = "before-snapshot"
//! search_fields = ["name", "namespace"]
//! event_capacity = 64
//!
//! [sort]
//! field = "name"
//! direction = "asc"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::projector::SortSpec;

/// Errors that can occur when loading view options.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),

	/// Error reading an options file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Options parsed but are unusable.
	#[error("invalid view options: {0}")]
	Invalid(String),
}

/// Result type for option loading.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// When the change feed is attached relative to the snapshot fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttachMode {
	/// Subscribe first and request the snapshot once the watch is attached,
	/// buffering events until it lands. Every change after the snapshot read is
	/// also on the feed. A failed subscribe still loads the snapshot, and the
	/// wait for the attach is bounded by the snapshot timeout.
	#[default]
	BeforeSnapshot,
	/// Subscribe alongside the fetch and buffer events until the snapshot lands.
	/// A change committed after the list read but before the watch opens is missed.
	Concurrent,
	/// Subscribe once the snapshot is applied. A failed snapshot never subscribes,
	/// but changes made between the list and the subscribe are never seen.
	AfterSnapshot,
}

/// Tunables for a [`ResourceView`](crate::ResourceView).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewOptions {
	pub snapshot_timeout_ms: u64,
	pub attach: AttachMode,
	pub search_fields: Vec<String>,
	pub sort: SortSpec,
	pub event_capacity: usize,
}

impl Default for ViewOptions {
	fn default() -> Self {
		Self {
			snapshot_timeout_ms: 15_000,
			attach: AttachMode::BeforeSnapshot,
			search_fields: vec!["name".to_string(), "namespace".to_string()],
			sort: SortSpec::default(),
			event_capacity: 64,
		}
	}
}

impl ViewOptions {
	/// Parses and validates options from TOML text. Missing keys take defaults.
	pub fn from_toml_str(input: &str) -> Result<Self> {
		let options: Self = toml::from_str(input)?;
		options.validate()?;
		Ok(options)
	}

	/// Reads, parses, and validates an options file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&input)
	}

	pub fn validate(&self) -> Result<()> {
		if self.snapshot_timeout_ms == 0 {
			return Err(ConfigError::Invalid("snapshot_timeout_ms must be positive".into()));
		}
		if self.event_capacity == 0 {
			return Err(ConfigError::Invalid("event_capacity must be positive".into()));
		}
		if self.sort.field.trim().is_empty() {
			return Err(ConfigError::Invalid("sort.field must not be empty".into()));
		}
		if let Some(blank) = self.search_fields.iter().position(|field| field.trim().is_empty()) {
			return Err(ConfigError::Invalid(format!("search_fields[{blank}] is empty")));
		}
		Ok(())
	}

	pub fn snapshot_timeout(&self) -> Duration {
		Duration::from_millis(self.snapshot_timeout_ms)
	}

	pub fn with_snapshot_timeout(mut self, timeout: Duration) -> Self {
		self.snapshot_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX).max(1);
		self
	}

	pub fn with_attach(mut self, attach: AttachMode) -> Self {
		self.attach = attach;
		self
	}

	pub fn with_search_fields<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.search_fields = fields.into_iter().map(Into::into).collect();
		self
	}

	pub fn with_sort(mut self, sort: SortSpec) -> Self {
		self.sort = sort;
		self
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::projector::SortDirection;

	#[test]
	fn empty_document_yields_defaults() {
		assert_eq!(ViewOptions::from_toml_str("").expect("parse"), ViewOptions::default());
	}

	#[test]
	fn parses_every_key() {
		let options = ViewOptions::from_toml_str(
			r#"
snapshot_timeout_ms = 250
attach = "concurrent"
search_fields = ["name", "labels.app"]
event_capacity = 8

[sort]
field = "age"
direction = "desc"
"#,
		)
		.expect("parse");

		assert_eq!(options.snapshot_timeout(), Duration::from_millis(250));
		assert_eq!(options.attach, AttachMode::Concurrent);
		assert_eq!(options.search_fields, vec!["name", "labels.app"]);
		assert_eq!(options.sort.field, "age");
		assert_eq!(options.sort.direction, SortDirection::Desc);
		assert_eq!(options.event_capacity, 8);
	}

	#[test]
	fn attach_modes_use_kebab_case_and_default_to_attach_first() {
		assert_eq!(ViewOptions::default().attach, AttachMode::BeforeSnapshot);
		for (text, mode) in [
			("before-snapshot", AttachMode::BeforeSnapshot),
			("concurrent", AttachMode::Concurrent),
			("after-snapshot", AttachMode::AfterSnapshot),
		] {
			let options = ViewOptions::from_toml_str(&format!("attach = \"{text}\"")).expect("parse");
			assert_eq!(options.attach, mode);
		}
	}

	#[test]
	fn rejects_unknown_keys_and_bad_values() {
		assert!(matches!(ViewOptions::from_toml_str("bogus = 1"), Err(ConfigError::Parse(_))));
		assert!(matches!(
			ViewOptions::from_toml_str("snapshot_timeout_ms = 0"),
			Err(ConfigError::Invalid(_))
		));
		assert!(matches!(
			ViewOptions::from_toml_str("search_fields = ['name', ' ']"),
			Err(ConfigError::Invalid(_))
		));
	}

	#[test]
	fn load_reports_missing_file_path() {
		let dir = tempfile::tempdir().expect("tempdir");
		let path = dir.path().join("view.toml");
		match ViewOptions::load(&path) {
			Err(ConfigError::Io { path: reported, .. }) => assert_eq!(reported, path),
			other => panic!("expected Io error, got {other:?}"),
		}

		std::fs::write(&path, "attach = \"concurrent\"\n").expect("write");
		assert_eq!(ViewOptions::load(&path).expect("load").attach, AttachMode::Concurrent);
	}
}
