use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clusterview_model::{BackendError, ContextId, IdentityKey, Resource, ResourceBackend, Scope, Subscription, WatchEvent, WatchRelease};
use futures::StreamExt;
use futures::channel::mpsc;
use parking_lot::Mutex;

use crate::faults::{Faults, MutationGate};

struct WatchSlot<T> {
	scope: Scope,
	tx: mpsc::UnboundedSender<WatchEvent<T>>,
}

struct State<T> {
	stores: HashMap<ContextId, BTreeMap<IdentityKey, T>>,
	watches: BTreeMap<u64, WatchSlot<T>>,
	next_watch: u64,
	list_calls: usize,
	subscribe_calls: usize,
	faults: Faults,
}

impl<T: Resource> State<T> {
	fn objects_in(&self, scope: &Scope) -> Vec<T> {
		self.stores
			.get(&scope.context)
			.map(|store| {
				store
					.values()
					.filter(|object| scope.namespaces.admits(object.namespace()))
					.cloned()
					.collect()
			})
			.unwrap_or_default()
	}

	/// Fans `event` out to every open watch whose scope admits it.
	fn publish(&mut self, context: &ContextId, event: WatchEvent<T>) {
		let namespace = event.object().and_then(|object| object.namespace().map(str::to_owned));
		let mut delivered = 0usize;
		for slot in self.watches.values() {
			if slot.scope.context != *context {
				continue;
			}
			if event.object().is_some() && !slot.scope.namespaces.admits(namespace.as_deref()) {
				continue;
			}
			if slot.tx.unbounded_send(event.clone()).is_ok() {
				delivered += 1;
			}
		}
		tracing::trace!(context = %context, kind = event.kind().as_str(), delivered, "memory.publish");
	}
}

struct Inner<T> {
	state: Mutex<State<T>>,
}

/// Resource backend that keeps every context in memory.
///
/// Watches are plain channels filtered by scope; external changes are simulated
/// with [`MemoryBackend::upsert`], [`MemoryBackend::remove`], and
/// [`MemoryBackend::emit`]. Failures and latency are injected through the
/// `fail_*`/`set_*`/`hold_*` knobs.
pub struct MemoryBackend<T> {
	inner: Arc<Inner<T>>,
}

impl<T> Clone for MemoryBackend<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T: Resource> Default for MemoryBackend<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Resource> MemoryBackend<T> {
	pub fn new() -> Self {
		Self {
			inner: Arc::new(Inner {
				state: Mutex::new(State {
					stores: HashMap::new(),
					watches: BTreeMap::new(),
					next_watch: 0,
					list_calls: 0,
					subscribe_calls: 0,
					faults: Faults::default(),
				}),
			}),
		}
	}

	/// Inserts objects without emitting events.
	pub fn seed(&self, context: impl Into<ContextId>, objects: impl IntoIterator<Item = T>) {
		let mut state = self.inner.state.lock();
		let store = state.stores.entry(context.into()).or_default();
		for object in objects {
			store.insert(object.identity_key(), object);
		}
	}

	/// Stores `object` and emits `Added` or `Modified` to matching watches.
	pub fn upsert(&self, context: impl Into<ContextId>, object: T) {
		let context = context.into();
		let mut state = self.inner.state.lock();
		let existed = state
			.stores
			.entry(context.clone())
			.or_default()
			.insert(object.identity_key(), object.clone())
			.is_some();
		let event = if existed { WatchEvent::Modified(object) } else { WatchEvent::Added(object) };
		state.publish(&context, event);
	}

	/// Removes an object and emits `Deleted` when it existed.
	pub fn remove(&self, context: impl Into<ContextId>, key: &IdentityKey) -> Option<T> {
		let context = context.into();
		let mut state = self.inner.state.lock();
		let removed = state.stores.get_mut(&context)?.remove(key)?;
		state.publish(&context, WatchEvent::Deleted(removed.clone()));
		Some(removed)
	}

	/// Emits a raw event without touching the store.
	pub fn emit(&self, context: impl Into<ContextId>, event: WatchEvent<T>) {
		self.inner.state.lock().publish(&context.into(), event);
	}

	/// Every object stored for `context`, in key order.
	pub fn objects(&self, context: impl Into<ContextId>) -> Vec<T> {
		self.inner
			.state
			.lock()
			.stores
			.get(&context.into())
			.map(|store| store.values().cloned().collect())
			.unwrap_or_default()
	}

	/// Makes the next `list` call fail with `error`. Failures queue up.
	pub fn fail_next_list(&self, error: BackendError) {
		self.inner.state.lock().faults.list_failures.push_back(error);
	}

	/// Delays every `list` for `context` by `delay`.
	pub fn set_list_delay(&self, context: impl Into<ContextId>, delay: Duration) {
		self.inner.state.lock().faults.list_delays.insert(context.into(), delay);
	}

	pub fn clear_list_delay(&self, context: impl Into<ContextId>) {
		self.inner.state.lock().faults.list_delays.remove(&context.into());
	}

	/// Makes `subscribe` fail until cleared with `None`.
	pub fn fail_subscribe(&self, error: Option<BackendError>) {
		self.inner.state.lock().faults.subscribe_failure = error;
	}

	/// Makes the next create/update fail with `error`. Failures queue up.
	pub fn fail_next_mutation(&self, error: BackendError) {
		self.inner.state.lock().faults.mutation_failures.push_back(error);
	}

	/// Makes deletes of `key` fail until the backend is dropped.
	pub fn fail_delete(&self, key: IdentityKey) {
		self.inner.state.lock().faults.delete_failures.insert(key);
	}

	/// Holds every subsequent mutation until the returned gate releases it.
	pub fn hold_mutations(&self) -> MutationGate {
		let gate = MutationGate::new();
		self.inner.state.lock().faults.mutation_gate = Some(gate.clone());
		gate
	}

	/// Stops emitting watch events for successful mutations.
	pub fn suppress_confirmations(&self, suppress: bool) {
		self.inner.state.lock().faults.suppress_confirmations = suppress;
	}

	/// Ends every open watch stream on `context` from the backend side, as a
	/// dropped server connection would. Returns how many were closed.
	pub fn close_watches(&self, context: impl Into<ContextId>) -> usize {
		let context = context.into();
		let mut state = self.inner.state.lock();
		let before = state.watches.len();
		state.watches.retain(|_, slot| slot.scope.context != context);
		let closed = before - state.watches.len();
		tracing::debug!(context = %context, closed, "memory.watch.close");
		closed
	}

	/// Number of watches that have been opened and not yet released.
	pub fn active_watches(&self) -> usize {
		self.inner.state.lock().watches.len()
	}

	pub fn list_calls(&self) -> usize {
		self.inner.state.lock().list_calls
	}

	pub fn subscribe_calls(&self) -> usize {
		self.inner.state.lock().subscribe_calls
	}

	async fn pass_gate(&self) {
		let gate = self.inner.state.lock().faults.mutation_gate.clone();
		if let Some(gate) = gate {
			gate.pass().await;
		}
	}
}

#[async_trait]
impl<T: Resource> ResourceBackend<T> for MemoryBackend<T> {
	async fn list(&self, scope: &Scope) -> Result<Vec<T>, BackendError> {
		let delay = {
			let mut state = self.inner.state.lock();
			state.list_calls += 1;
			state.faults.list_delays.get(&scope.context).copied()
		};
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}

		let mut state = self.inner.state.lock();
		if let Some(error) = state.faults.list_failures.pop_front() {
			return Err(error);
		}
		Ok(state.objects_in(scope))
	}

	async fn subscribe(&self, scope: &Scope) -> Result<Subscription<T>, BackendError> {
		let id = {
			let mut state = self.inner.state.lock();
			state.subscribe_calls += 1;
			if let Some(error) = state.faults.subscribe_failure.clone() {
				return Err(error);
			}
			let id = state.next_watch;
			state.next_watch += 1;
			id
		};

		let (tx, rx) = mpsc::unbounded();
		self.inner.state.lock().watches.insert(id, WatchSlot { scope: scope.clone(), tx });
		tracing::debug!(watch = id, scope = %scope, "memory.watch.open");

		let inner = Arc::downgrade(&self.inner);
		let release = WatchRelease::new(move || {
			if let Some(inner) = inner.upgrade()
				&& inner.state.lock().watches.remove(&id).is_some()
			{
				tracing::debug!(watch = id, "memory.watch.release");
			}
		});
		Ok(Subscription::new(rx.boxed(), release))
	}

	async fn create(&self, scope: &Scope, object: T) -> Result<T, BackendError> {
		self.pass_gate().await;
		let mut state = self.inner.state.lock();
		if let Some(error) = state.faults.mutation_failures.pop_front() {
			return Err(error);
		}

		let key = object.identity_key();
		let store = state.stores.entry(scope.context.clone()).or_default();
		if store.contains_key(&key) {
			return Err(BackendError::AlreadyExists(key));
		}
		store.insert(key, object.clone());

		if !state.faults.suppress_confirmations {
			state.publish(&scope.context, WatchEvent::Added(object.clone()));
		}
		Ok(object)
	}

	async fn update(&self, scope: &Scope, object: T) -> Result<T, BackendError> {
		self.pass_gate().await;
		let mut state = self.inner.state.lock();
		if let Some(error) = state.faults.mutation_failures.pop_front() {
			return Err(error);
		}

		let key = object.identity_key();
		let Some(slot) = state.stores.get_mut(&scope.context).and_then(|store| store.get_mut(&key)) else {
			return Err(BackendError::NotFound(key));
		};
		*slot = object.clone();

		if !state.faults.suppress_confirmations {
			state.publish(&scope.context, WatchEvent::Modified(object.clone()));
		}
		Ok(object)
	}

	async fn delete(&self, scope: &Scope, keys: &[IdentityKey]) -> Vec<Result<(), BackendError>> {
		self.pass_gate().await;
		let mut state = self.inner.state.lock();
		let mut results = Vec::with_capacity(keys.len());
		for key in keys {
			if state.faults.delete_failures.contains(key) {
				results.push(Err(BackendError::Rejected(format!("delete of {key} refused"))));
				continue;
			}
			let removed = state.stores.get_mut(&scope.context).and_then(|store| store.remove(key));
			match removed {
				Some(object) => {
					if !state.faults.suppress_confirmations {
						state.publish(&scope.context, WatchEvent::Deleted(object));
					}
					results.push(Ok(()));
				}
				None => results.push(Err(BackendError::NotFound(key.clone()))),
			}
		}
		results
	}
}
