use std::iter;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use clusterview_model::{BackendError, ContextId, IdentityKey, NamespaceSelector, Resource, ResourceBackend, Scope, WatchEvent, WatchRelease};
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc, oneshot};

use super::types::{DeleteReport, ViewEvent, ViewSnapshot};
use crate::collection::{Change, Collection};
use crate::config::{AttachMode, ViewOptions};
use crate::error::{MutationError, ViewError};
use crate::generation::ScopeToken;
use crate::lifecycle::{Activation, Phase, ScopeLifecycle};
use crate::loader::load_snapshot;
use crate::optimistic::{PendingCreates, PendingTicket};
use crate::projector::{ProjectionSpec, SortSpec, ViewItem, project};
use crate::selection::Selection;
use crate::subscriber::{FeedMsg, FeedSink, run_feed};
use crate::task::{self, TaskClass};

pub(crate) type Reply<R> = oneshot::Sender<Result<R, MutationError>>;

/// Commands sent by [`ResourceView`](crate::ResourceView) handles.
pub(crate) enum ViewCmd<T> {
	SetScope(Scope),
	SetContext(ContextId),
	SetNamespaces(NamespaceSelector),
	ClearScope,
	Retry,
	SetQuery(String),
	SetSort(SortSpec),
	ToggleOne(IdentityKey),
	ToggleAllVisible(bool),
	ClearSelection,
	Create { object: T, reply: Reply<T> },
	Update { object: T, reply: Reply<T> },
	DeleteSelected { reply: Reply<DeleteReport> },
	Shutdown { done: oneshot::Sender<()> },
}

/// Results reported back by spawned tasks, tagged with the generation that started them.
pub(crate) enum TaskEvt<T> {
	Snapshot {
		generation: u64,
		result: Result<Vec<T>, ViewError>,
	},
	Feed {
		generation: u64,
		msg: FeedMsg<T>,
	},
	Created {
		generation: u64,
		ticket: PendingTicket,
		result: Result<T, BackendError>,
		reply: Reply<T>,
	},
	Updated {
		key: IdentityKey,
		result: Result<T, BackendError>,
		reply: Reply<T>,
	},
	Deleted {
		generation: u64,
		keys: Vec<IdentityKey>,
		results: Vec<Result<(), BackendError>>,
		reply: Reply<DeleteReport>,
	},
}

/// How much of the published state a message invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Dirty {
	Clean,
	/// Shared snapshot only (selection, phase, warnings).
	Snapshot,
	/// Projection must be recomputed too.
	Projection,
}

/// Authoritative owner of one view's state.
pub(crate) struct ViewActor<T: Resource> {
	backend: Arc<dyn ResourceBackend<T>>,
	options: ViewOptions,
	event_tx: mpsc::UnboundedSender<TaskEvt<T>>,
	lifecycle: ScopeLifecycle,
	/// Selector applied to the next context activation.
	namespaces: NamespaceSelector,
	collection: Collection<T>,
	pending: PendingCreates<T>,
	selection: Selection,
	/// Feed events received while the snapshot is still loading.
	buffered: Vec<WatchEvent<T>>,
	watch: Option<WatchRelease>,
	/// Starts a fetch that waits for the feed to attach. Dropping it starts the fetch too.
	snapshot_gate: Option<oneshot::Sender<()>>,
	error: Option<ViewError>,
	warning: Option<ViewError>,
	query: String,
	sort: SortSpec,
	items: Arc<[ViewItem<T>]>,
	dirty: Dirty,
	shared: Arc<RwLock<ViewSnapshot<T>>>,
	changed: Arc<AtomicBool>,
	events: broadcast::Sender<ViewEvent>,
}

impl<T: Resource> ViewActor<T> {
	pub(crate) fn new(
		backend: Arc<dyn ResourceBackend<T>>,
		options: ViewOptions,
		event_tx: mpsc::UnboundedSender<TaskEvt<T>>,
		shared: Arc<RwLock<ViewSnapshot<T>>>,
		changed: Arc<AtomicBool>,
		events: broadcast::Sender<ViewEvent>,
	) -> Self {
		let sort = options.sort.clone();
		Self {
			backend,
			options,
			event_tx,
			lifecycle: ScopeLifecycle::default(),
			namespaces: NamespaceSelector::All,
			collection: Collection::new(),
			pending: PendingCreates::default(),
			selection: Selection::default(),
			buffered: Vec::new(),
			watch: None,
			snapshot_gate: None,
			error: None,
			warning: None,
			query: String::new(),
			sort,
			items: Arc::from(Vec::new()),
			dirty: Dirty::Clean,
			shared,
			changed,
			events,
		}
	}

	/// Processes handle commands and task results until every handle is gone
	/// or a shutdown is requested.
	pub(crate) async fn run(mut self, mut command_rx: mpsc::UnboundedReceiver<ViewCmd<T>>, mut event_rx: mpsc::UnboundedReceiver<TaskEvt<T>>) {
		loop {
			tokio::select! {
				biased;
				cmd = command_rx.recv() => match cmd {
					Some(ViewCmd::Shutdown { done }) => {
						self.teardown();
						let _ = done.send(());
						return;
					}
					Some(cmd) => self.handle_cmd(cmd),
					None => break,
				},
				Some(evt) = event_rx.recv() => self.handle_evt(evt),
			}
			self.flush();
		}
		self.teardown();
	}

	fn handle_cmd(&mut self, cmd: ViewCmd<T>) {
		match cmd {
			ViewCmd::SetScope(scope) => {
				self.namespaces = scope.namespaces.clone();
				self.activate(scope);
			}
			ViewCmd::SetContext(context) => {
				let scope = Scope::new(context, self.namespaces.clone());
				self.activate(scope);
			}
			ViewCmd::SetNamespaces(namespaces) => {
				self.namespaces = namespaces.clone();
				if let Some(scope) = self.lifecycle.scope() {
					let scope = scope.with_namespaces(namespaces);
					self.activate(scope);
				}
			}
			ViewCmd::ClearScope => {
				if self.lifecycle.deactivate() {
					tracing::debug!(generation = self.lifecycle.generation(), "view.scope.cleared");
					self.reset_scope_state();
				}
			}
			ViewCmd::Retry => match self.lifecycle.retry() {
				Some(activation) => self.begin(activation),
				None => tracing::trace!(phase = self.lifecycle.phase().as_str(), "view.retry.ignored"),
			},
			ViewCmd::SetQuery(query) => {
				if self.query != query {
					self.query = query;
					self.mark(Dirty::Projection);
				}
			}
			ViewCmd::SetSort(sort) => {
				if self.sort != sort {
					self.sort = sort;
					self.mark(Dirty::Projection);
				}
			}
			ViewCmd::ToggleOne(key) => {
				if self.selection.toggle_one(&key, &self.collection) {
					self.mark(Dirty::Snapshot);
				}
			}
			ViewCmd::ToggleAllVisible(checked) => {
				if self.selection.toggle_all_visible(checked, self.items.iter().map(|item| &item.key)) {
					self.mark(Dirty::Snapshot);
				}
			}
			ViewCmd::ClearSelection => {
				if self.selection.clear() {
					self.mark(Dirty::Snapshot);
				}
			}
			ViewCmd::Create { object, reply } => self.create(object, reply),
			ViewCmd::Update { object, reply } => self.update(object, reply),
			ViewCmd::DeleteSelected { reply } => self.delete_selected(reply),
			ViewCmd::Shutdown { .. } => {}
		}
	}

	fn handle_evt(&mut self, evt: TaskEvt<T>) {
		match evt {
			TaskEvt::Snapshot { generation, result } => self.on_snapshot(generation, result),
			TaskEvt::Feed { generation, msg } => self.on_feed(generation, msg),
			TaskEvt::Created {
				generation,
				ticket,
				result,
				reply,
			} => self.on_created(generation, ticket, result, reply),
			TaskEvt::Updated { key, result, reply } => self.on_updated(key, result, reply),
			TaskEvt::Deleted {
				generation,
				keys,
				results,
				reply,
			} => self.on_deleted(generation, keys, results, reply),
		}
	}

	fn activate(&mut self, scope: Scope) {
		match self.lifecycle.activate(scope) {
			Some(activation) => self.begin(activation),
			None => tracing::trace!(generation = self.lifecycle.generation(), "view.scope.unchanged"),
		}
	}

	/// Starts loading a fresh activation. The previous watch is released
	/// before anything is requested for the new scope.
	fn begin(&mut self, activation: Activation) {
		let generation = activation.generation();
		tracing::debug!(generation, scope = %activation.scope, "view.scope.activate");
		self.reset_scope_state();
		let Activation { scope, token } = activation;
		match self.options.attach {
			AttachMode::BeforeSnapshot => {
				let (gate, attached) = oneshot::channel();
				self.snapshot_gate = Some(gate);
				self.spawn_snapshot(generation, scope.clone(), token.clone(), Some(attached));
				self.spawn_feed(scope, token);
			}
			AttachMode::Concurrent => {
				self.spawn_snapshot(generation, scope.clone(), token.clone(), None);
				self.spawn_feed(scope, token);
			}
			AttachMode::AfterSnapshot => self.spawn_snapshot(generation, scope, token, None),
		}
	}

	fn reset_scope_state(&mut self) {
		self.release_watch();
		self.collection.clear();
		self.pending.clear();
		self.selection.clear();
		self.buffered.clear();
		self.snapshot_gate = None;
		self.error = None;
		self.warning = None;
		self.mark(Dirty::Projection);
	}

	fn release_watch(&mut self) {
		if let Some(release) = self.watch.take() {
			release.release();
			tracing::debug!(generation = self.lifecycle.generation(), "view.watch.released");
			self.mark(Dirty::Snapshot);
		}
	}

	/// Spawns the fetch. With `attached`, the fetch waits (up to the snapshot
	/// timeout) for the feed to attach or give up before listing.
	fn spawn_snapshot(&self, generation: u64, scope: Scope, token: ScopeToken, attached: Option<oneshot::Receiver<()>>) {
		let backend = Arc::clone(&self.backend);
		let event_tx = self.event_tx.clone();
		let deadline = self.options.snapshot_timeout();
		task::spawn(TaskClass::Snapshot, async move {
			if let Some(attached) = attached {
				tokio::select! {
					biased;
					_ = token.cancelled() => return,
					waited = tokio::time::timeout(deadline, attached) => {
						if waited.is_err() {
							tracing::debug!(generation, scope = %scope, "view.snapshot.attach_wait_expired");
						}
					}
				}
			}
			let result = load_snapshot(backend.as_ref(), &scope, deadline).await;
			let _ = event_tx.send(TaskEvt::Snapshot { generation, result });
		});
	}

	fn spawn_feed(&self, scope: Scope, token: ScopeToken) {
		let generation = token.generation();
		let event_tx = self.event_tx.clone();
		let sink: FeedSink<T> = Arc::new(move |msg| event_tx.send(TaskEvt::Feed { generation, msg }).is_ok());
		task::spawn(TaskClass::Watch, run_feed(Arc::clone(&self.backend), scope, token, sink));
	}

	fn on_snapshot(&mut self, generation: u64, result: Result<Vec<T>, ViewError>) {
		if !self.lifecycle.is_current(generation) || self.lifecycle.phase() != Phase::Loading {
			tracing::debug!(generation, current = self.lifecycle.generation(), "view.snapshot.stale");
			return;
		}

		match result {
			Ok(objects) => {
				self.collection.replace_all(objects);
				self.pending.reapply(&mut self.collection);
				let buffered = mem::take(&mut self.buffered);
				let replayed = buffered.len();
				self.lifecycle.snapshot_applied(generation);
				for event in buffered {
					self.apply_event(event);
				}
				self.selection.prune(&self.collection);
				tracing::debug!(generation, count = self.collection.len(), replayed, "view.snapshot.applied");

				if self.options.attach == AttachMode::AfterSnapshot
					&& let (Some(scope), Some(token)) = (self.lifecycle.scope().cloned(), self.lifecycle.token().cloned())
				{
					self.spawn_feed(scope, token);
				}
			}
			Err(error) => {
				tracing::warn!(generation, error = %error, "view.snapshot.error");
				self.lifecycle.snapshot_failed(generation);
				self.reset_scope_state();
				self.error = Some(error);
			}
		}
		self.mark(Dirty::Projection);
	}

	fn on_feed(&mut self, generation: u64, msg: FeedMsg<T>) {
		let current = self.lifecycle.is_current(generation);
		match msg {
			FeedMsg::Attached { release } => {
				if !current {
					tracing::debug!(generation, "view.watch.stale");
					release.release();
					return;
				}
				if let Some(previous) = self.watch.replace(release) {
					previous.release();
				}
				if let Some(gate) = self.snapshot_gate.take() {
					let _ = gate.send(());
				}
				tracing::debug!(generation, "view.watch.attached");
				self.mark(Dirty::Snapshot);
			}
			_ if !current => tracing::trace!(generation, "view.watch.stale"),
			FeedMsg::Failed { error } => {
				self.snapshot_gate = None;
				self.watch_warning(format!("subscribe failed: {error}"));
			}
			FeedMsg::Event(event) => match self.lifecycle.phase() {
				Phase::Loading => self.buffered.push(event),
				Phase::Live => self.apply_event(event),
				Phase::Idle | Phase::Error => {}
			},
			FeedMsg::Closed => {
				self.release_watch();
				self.watch_warning("change feed closed".to_string());
			}
		}
	}

	fn apply_event(&mut self, event: WatchEvent<T>) {
		let event = match event {
			WatchEvent::Error(message) => return self.watch_warning(message),
			event => event,
		};
		let Some(key) = event.key() else {
			return;
		};
		tracing::trace!(key = %key, kind = event.kind().as_str(), "view.watch.apply");
		if self.collection.apply(event) == Change::Unchanged {
			return;
		}
		self.pending.observe(&self.collection, &key);
		if !self.collection.contains(&key) {
			self.selection.remove_all(iter::once(&key));
		}
		self.mark(Dirty::Projection);
	}

	fn watch_warning(&mut self, message: String) {
		tracing::warn!(generation = self.lifecycle.generation(), message = %message, "view.watch.error");
		self.warning = Some(ViewError::Watch { message: message.clone() });
		let _ = self.events.send(ViewEvent::WatchWarning { message });
		self.mark(Dirty::Snapshot);
	}

	/// Scope for a mutation, or `None` when the view cannot accept one.
	fn mutation_scope(&self) -> Option<Scope> {
		if !self.lifecycle.phase().is_active() {
			return None;
		}
		self.lifecycle.scope().cloned()
	}

	fn create(&mut self, object: T, reply: Reply<T>) {
		let Some(scope) = self.mutation_scope() else {
			let _ = reply.send(Err(MutationError::Inactive));
			return;
		};
		let ticket = match self.pending.begin(&mut self.collection, object.clone()) {
			Ok(ticket) => ticket,
			Err(error) => {
				let _ = reply.send(Err(error));
				return;
			}
		};
		let generation = self.lifecycle.generation();
		tracing::debug!(generation, key = %ticket.key, "view.create.pending");
		self.mark(Dirty::Projection);

		let backend = Arc::clone(&self.backend);
		let event_tx = self.event_tx.clone();
		task::spawn(TaskClass::Mutation, async move {
			let result = backend.create(&scope, object).await;
			let _ = event_tx.send(TaskEvt::Created {
				generation,
				ticket,
				result,
				reply,
			});
		});
	}

	fn on_created(&mut self, generation: u64, ticket: PendingTicket, result: Result<T, BackendError>, reply: Reply<T>) {
		let source = match result {
			Ok(object) => {
				tracing::debug!(generation, key = %ticket.key, "view.create.accepted");
				let _ = reply.send(Ok(object));
				return;
			}
			Err(source) => source,
		};

		tracing::warn!(generation, key = %ticket.key, error = %source, "view.create.failed");
		if self.lifecycle.is_current(generation) && self.pending.rollback(&mut self.collection, &ticket) {
			self.selection.remove_all(iter::once(&ticket.key));
			tracing::debug!(generation, key = %ticket.key, "view.create.rollback");
			self.mark(Dirty::Projection);
		}
		self.flush();
		let error = MutationError::Backend { key: ticket.key, source };
		self.report_failure(&error);
		let _ = reply.send(Err(error));
	}

	fn update(&mut self, object: T, reply: Reply<T>) {
		let Some(scope) = self.mutation_scope() else {
			let _ = reply.send(Err(MutationError::Inactive));
			return;
		};
		let key = object.identity_key();
		tracing::debug!(generation = self.lifecycle.generation(), key = %key, "view.update.request");

		let backend = Arc::clone(&self.backend);
		let event_tx = self.event_tx.clone();
		task::spawn(TaskClass::Mutation, async move {
			let result = backend.update(&scope, object).await;
			let _ = event_tx.send(TaskEvt::Updated { key, result, reply });
		});
	}

	fn on_updated(&mut self, key: IdentityKey, result: Result<T, BackendError>, reply: Reply<T>) {
		match result {
			Ok(object) => {
				let _ = reply.send(Ok(object));
			}
			Err(source) => {
				tracing::warn!(key = %key, error = %source, "view.update.failed");
				let error = MutationError::Backend { key, source };
				self.report_failure(&error);
				let _ = reply.send(Err(error));
			}
		}
	}

	fn delete_selected(&mut self, reply: Reply<DeleteReport>) {
		let Some(scope) = self.mutation_scope() else {
			let _ = reply.send(Err(MutationError::Inactive));
			return;
		};
		if self.selection.is_empty() {
			let _ = reply.send(Ok(DeleteReport::default()));
			return;
		}

		let generation = self.lifecycle.generation();
		let keys = self.selection.to_vec();
		tracing::debug!(generation, count = keys.len(), "view.delete.request");

		let backend = Arc::clone(&self.backend);
		let event_tx = self.event_tx.clone();
		task::spawn(TaskClass::Mutation, async move {
			let results = backend.delete(&scope, &keys).await;
			let _ = event_tx.send(TaskEvt::Deleted {
				generation,
				keys,
				results,
				reply,
			});
		});
	}

	fn on_deleted(&mut self, generation: u64, keys: Vec<IdentityKey>, results: Vec<Result<(), BackendError>>, reply: Reply<DeleteReport>) {
		let mut report = DeleteReport::default();
		let mut results = results.into_iter();
		for key in keys {
			match results.next() {
				Some(Ok(())) => report.deleted.push(key),
				Some(Err(source)) => report.failed.push(MutationError::Backend { key, source }),
				None => report.failed.push(MutationError::Backend {
					key,
					source: BackendError::Rejected("no result returned for key".to_string()),
				}),
			}
		}
		tracing::debug!(generation, deleted = report.deleted.len(), failed = report.failed.len(), "view.delete.settled");

		if self.lifecycle.is_current(generation) {
			let changed = if report.is_complete() {
				self.selection.clear()
			} else {
				self.selection.remove_all(report.deleted.iter())
			};
			if changed {
				self.mark(Dirty::Snapshot);
			}
		}
		self.flush();
		for error in &report.failed {
			tracing::warn!(generation, error = %error, "view.delete.failed");
			self.report_failure(error);
		}
		let _ = reply.send(Ok(report));
	}

	fn report_failure(&self, error: &MutationError) {
		if let Some(key) = error.key() {
			let _ = self.events.send(ViewEvent::MutationFailed {
				key: key.clone(),
				message: error.to_string(),
			});
		}
	}

	fn teardown(&mut self) {
		if self.lifecycle.deactivate() {
			self.reset_scope_state();
		}
		self.release_watch();
		self.flush();
		tracing::debug!(generation = self.lifecycle.generation(), "view.stopped");
	}

	fn mark(&mut self, dirty: Dirty) {
		self.dirty = self.dirty.max(dirty);
	}

	fn projection_spec(&self) -> ProjectionSpec {
		ProjectionSpec {
			namespaces: self
				.lifecycle
				.scope()
				.map_or_else(|| self.namespaces.clone(), |scope| scope.namespaces.clone()),
			query: self.query.clone(),
			search_fields: self.options.search_fields.clone(),
			sort: self.sort.clone(),
		}
	}

	/// Publishes pending changes to the shared snapshot and notifies observers.
	fn flush(&mut self) {
		let dirty = mem::replace(&mut self.dirty, Dirty::Clean);
		if dirty == Dirty::Clean {
			return;
		}
		if dirty == Dirty::Projection {
			self.items = Arc::from(project(&self.collection, &self.projection_spec()));
		}

		let phase = self.lifecycle.phase();
		let generation = self.lifecycle.generation();
		{
			let mut shared = self.shared.write();
			*shared = ViewSnapshot {
				scope: self.lifecycle.scope().cloned(),
				generation,
				phase,
				loading: phase == Phase::Loading,
				error: self.error.clone(),
				warning: self.warning.clone(),
				items: Arc::clone(&self.items),
				selection: self.selection.to_vec(),
				watching: self.watch.is_some(),
				total: self.collection.len(),
				query: self.query.clone(),
				sort: self.sort.clone(),
			};
		}
		self.changed.store(true, AtomicOrdering::Release);
		let _ = self.events.send(ViewEvent::Changed { generation });
	}
}
