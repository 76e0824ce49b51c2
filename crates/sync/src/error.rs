use std::time::Duration;

use clusterview_model::{BackendError, IdentityKey};
use thiserror::Error;

/// Errors surfaced through a view's snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
	/// The snapshot fetch failed.
	#[error("failed to load resources: {message}")]
	Fetch { message: String },

	/// The snapshot fetch did not complete before the deadline.
	#[error("timed out loading resources after {}ms", .after.as_millis())]
	Timeout { after: Duration },

	/// The change feed reported an error or could not be attached. Never fatal.
	#[error("change feed: {message}")]
	Watch { message: String },

	/// The view actor has stopped.
	#[error("resource view stopped")]
	Closed,
}

impl ViewError {
	pub fn is_timeout(&self) -> bool {
		matches!(self, Self::Timeout { .. })
	}

	/// True for errors that put the view into the `Error` phase.
	pub fn is_fetch_failure(&self) -> bool {
		matches!(self, Self::Fetch { .. } | Self::Timeout { .. })
	}
}

/// Errors returned by create/update/delete requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
	#[error("{key}: {source}")]
	Backend { key: IdentityKey, source: BackendError },

	/// An object with the same identity is already in the view.
	#[error("{key} already exists in this view")]
	Conflict { key: IdentityKey },

	/// The view has no active scope, or its snapshot failed.
	#[error("no active scope")]
	Inactive,

	#[error("resource view stopped")]
	Closed,
}

impl MutationError {
	pub fn key(&self) -> Option<&IdentityKey> {
		match self {
			Self::Backend { key, .. } | Self::Conflict { key } => Some(key),
			Self::Inactive | Self::Closed => None,
		}
	}
}
