use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use clusterview_model::{ContextId, IdentityKey, NamespaceSelector, Resource, ResourceBackend, Scope};
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use super::actor::{ViewActor, ViewCmd};
use super::types::{DeleteReport, ViewEvent, ViewSnapshot};
use crate::config::{self, ViewOptions};
use crate::error::{MutationError, ViewError};
use crate::lifecycle::Phase;
use crate::projector::{SortSpec, ViewItem};
use crate::task::{self, TaskClass};

/// Handle to a live resource view.
///
/// Commands are queued to the view actor and return immediately; observable
/// state is read from the snapshot the actor publishes. Dropping the last
/// handle stops the actor and releases its watch.
pub struct ResourceView<T: Resource> {
	shared: Arc<RwLock<ViewSnapshot<T>>>,
	changed: Arc<AtomicBool>,
	events: broadcast::Sender<ViewEvent>,
	command_tx: mpsc::UnboundedSender<ViewCmd<T>>,
	_actor_task: JoinHandle<()>,
}

impl<T: Resource> ResourceView<T> {
	/// Validates `options` and spawns the view actor on the current tokio runtime.
	///
	/// # Errors
	///
	/// Returns [`ConfigError::Invalid`](crate::ConfigError::Invalid) when
	/// [`ViewOptions::validate`] rejects `options`.
	///
	/// # Panics
	///
	/// Panics when called outside a tokio runtime.
	pub fn new(backend: Arc<dyn ResourceBackend<T>>, options: ViewOptions) -> config::Result<Self> {
		options.validate()?;
		Ok(Self::spawn(backend, options))
	}

	fn spawn(backend: Arc<dyn ResourceBackend<T>>, options: ViewOptions) -> Self {
		let shared = Arc::new(RwLock::new(ViewSnapshot {
			sort: options.sort.clone(),
			..ViewSnapshot::default()
		}));
		let changed = Arc::new(AtomicBool::new(false));
		let (events, _) = broadcast::channel(options.event_capacity.max(1));
		let (command_tx, command_rx) = mpsc::unbounded_channel();
		let (event_tx, event_rx) = mpsc::unbounded_channel();

		let actor = ViewActor::new(backend, options, event_tx, Arc::clone(&shared), Arc::clone(&changed), events.clone());
		let actor_task = task::spawn(TaskClass::View, actor.run(command_rx, event_rx));

		Self {
			shared,
			changed,
			events,
			command_tx,
			_actor_task: actor_task,
		}
	}

	/// Spawns a view with default options and immediately activates `scope`.
	pub fn watching(backend: Arc<dyn ResourceBackend<T>>, scope: Scope) -> Self {
		let view = Self::spawn(backend, ViewOptions::default());
		view.set_scope(scope);
		view
	}

	fn send(&self, cmd: ViewCmd<T>) -> bool {
		self.command_tx.send(cmd).is_ok()
	}

	/// Switches to `scope`. Re-selecting the active scope is a no-op.
	pub fn set_scope(&self, scope: Scope) -> bool {
		self.send(ViewCmd::SetScope(scope))
	}

	/// Switches cluster context, keeping the current namespace selector.
	pub fn set_context(&self, context: impl Into<ContextId>) -> bool {
		self.send(ViewCmd::SetContext(context.into()))
	}

	/// Changes the namespace selector. Restarts the active scope, if any.
	///
	/// While idle the selector is only remembered for the next [`set_context`](Self::set_context);
	/// [`set_scope`](Self::set_scope) carries its own selector and replaces it.
	pub fn set_namespace_selector(&self, namespaces: NamespaceSelector) -> bool {
		self.send(ViewCmd::SetNamespaces(namespaces))
	}

	/// Returns to idle, releasing the watch and discarding all scope state.
	pub fn clear_scope(&self) -> bool {
		self.send(ViewCmd::ClearScope)
	}

	/// Reloads the current scope after a fetch failure. Ignored outside `Error`.
	pub fn retry(&self) -> bool {
		self.send(ViewCmd::Retry)
	}

	pub fn set_query(&self, query: impl Into<String>) -> bool {
		self.send(ViewCmd::SetQuery(query.into()))
	}

	pub fn set_sort(&self, sort: SortSpec) -> bool {
		self.send(ViewCmd::SetSort(sort))
	}

	pub fn toggle_one(&self, key: IdentityKey) -> bool {
		self.send(ViewCmd::ToggleOne(key))
	}

	/// Selects or unselects every item of the current projection.
	pub fn toggle_all_visible(&self, checked: bool) -> bool {
		self.send(ViewCmd::ToggleAllVisible(checked))
	}

	pub fn clear_selection(&self) -> bool {
		self.send(ViewCmd::ClearSelection)
	}

	/// Creates `object`.
	///
	/// A pending entry is visible in the projection before the backend answers;
	/// it is rolled back if the backend rejects the create.
	pub async fn create(&self, object: T) -> Result<T, MutationError> {
		let (reply, rx) = oneshot::channel();
		if !self.send(ViewCmd::Create { object, reply }) {
			return Err(MutationError::Closed);
		}
		rx.await.unwrap_or(Err(MutationError::Closed))
	}

	/// Updates `object`. The view changes only when the feed confirms it.
	pub async fn update(&self, object: T) -> Result<T, MutationError> {
		let (reply, rx) = oneshot::channel();
		if !self.send(ViewCmd::Update { object, reply }) {
			return Err(MutationError::Closed);
		}
		rx.await.unwrap_or(Err(MutationError::Closed))
	}

	/// Deletes every selected object and reports per-key outcomes.
	pub async fn delete_selected(&self) -> Result<DeleteReport, MutationError> {
		let (reply, rx) = oneshot::channel();
		if !self.send(ViewCmd::DeleteSelected { reply }) {
			return Err(MutationError::Closed);
		}
		rx.await.unwrap_or(Err(MutationError::Closed))
	}

	pub fn snapshot(&self) -> ViewSnapshot<T> {
		self.shared.read().clone()
	}

	pub fn items(&self) -> Arc<[ViewItem<T>]> {
		Arc::clone(&self.shared.read().items)
	}

	pub fn phase(&self) -> Phase {
		self.shared.read().phase
	}

	pub fn loading(&self) -> bool {
		self.shared.read().loading
	}

	pub fn error(&self) -> Option<ViewError> {
		self.shared.read().error.clone()
	}

	pub fn warning(&self) -> Option<ViewError> {
		self.shared.read().warning.clone()
	}

	pub fn selection(&self) -> Vec<IdentityKey> {
		self.shared.read().selection.clone()
	}

	pub fn generation(&self) -> u64 {
		self.shared.read().generation
	}

	pub fn is_watching(&self) -> bool {
		self.shared.read().watching
	}

	/// Returns true once per batch of published changes.
	pub fn take_changed(&self) -> bool {
		self.changed.swap(false, AtomicOrdering::AcqRel)
	}

	pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
		self.events.subscribe()
	}

	pub fn is_closed(&self) -> bool {
		self.command_tx.is_closed()
	}

	/// Stops the actor and waits until its watch is released.
	pub async fn shutdown(self) {
		let (done, rx) = oneshot::channel();
		if self.send(ViewCmd::Shutdown { done }) {
			let _ = rx.await;
		}
	}
}
