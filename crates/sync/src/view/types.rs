use std::sync::Arc;

use clusterview_model::{IdentityKey, Scope};

use crate::error::{MutationError, ViewError};
use crate::lifecycle::Phase;
use crate::projector::{SortSpec, ViewItem};

/// Observable state of a view, published by the actor after every change.
#[derive(Debug, Clone)]
pub struct ViewSnapshot<T> {
	/// Active scope, `None` while idle.
	pub scope: Option<Scope>,
	pub generation: u64,
	pub phase: Phase,
	/// True while the snapshot fetch for the active scope is in flight.
	pub loading: bool,
	/// Fetch or timeout error of the active scope.
	pub error: Option<ViewError>,
	/// Latest non-fatal change feed problem.
	pub warning: Option<ViewError>,
	/// Current projection.
	pub items: Arc<[ViewItem<T>]>,
	/// Selected keys in key order.
	pub selection: Vec<IdentityKey>,
	pub watching: bool,
	/// Size of the canonical collection, before filtering.
	pub total: usize,
	pub query: String,
	pub sort: SortSpec,
}

impl<T> Default for ViewSnapshot<T> {
	fn default() -> Self {
		Self {
			scope: None,
			generation: 0,
			phase: Phase::Idle,
			loading: false,
			error: None,
			warning: None,
			items: Arc::from(Vec::new()),
			selection: Vec::new(),
			watching: false,
			total: 0,
			query: String::new(),
			sort: SortSpec::default(),
		}
	}
}

impl<T> ViewSnapshot<T> {
	pub fn is_selected(&self, key: &IdentityKey) -> bool {
		self.selection.binary_search(key).is_ok()
	}

	pub fn item(&self, key: &IdentityKey) -> Option<&ViewItem<T>> {
		self.items.iter().find(|item| &item.key == key)
	}
}

/// Push notifications broadcast by a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
	/// The published snapshot changed.
	Changed { generation: u64 },
	/// The change feed reported an error, failed to attach, or closed.
	WatchWarning { message: String },
	/// A create, update, or delete was rejected.
	MutationFailed { key: IdentityKey, message: String },
}

/// Outcome of [`ResourceView::delete_selected`](crate::ResourceView::delete_selected).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
	pub deleted: Vec<IdentityKey>,
	pub failed: Vec<MutationError>,
}

impl DeleteReport {
	/// True when every requested key was deleted.
	pub fn is_complete(&self) -> bool {
		self.failed.is_empty()
	}
}
