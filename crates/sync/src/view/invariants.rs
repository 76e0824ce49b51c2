use std::sync::Arc;
use std::time::Duration;

use clusterview_memory::MemoryBackend;
use clusterview_model::{BackendError, DynamicObject, IdentityKey, Scope, WatchEvent};
use tokio::time::{sleep, timeout};

use super::ResourceView;
use crate::config::{AttachMode, ViewOptions};
use crate::error::MutationError;
use crate::lifecycle::Phase;

async fn wait_until<F>(name: &str, mut condition: F)
where
	F: FnMut() -> bool,
{
	timeout(Duration::from_secs(2), async move {
		loop {
			if condition() {
				return;
			}
			sleep(Duration::from_millis(10)).await;
		}
	})
	.await
	.unwrap_or_else(|_| panic!("timed out waiting for {name}"));
}

fn pod(name: &str) -> DynamicObject {
	DynamicObject::namespaced("default", name)
}

fn key(name: &str) -> IdentityKey {
	IdentityKey::namespaced("default", name)
}

fn view_with(backend: &MemoryBackend<DynamicObject>, options: ViewOptions) -> ResourceView<DynamicObject> {
	ResourceView::new(Arc::new(backend.clone()), options).expect("valid options")
}

fn has(view: &ResourceView<DynamicObject>, name: &str) -> bool {
	view.items().iter().any(|item| item.key == key(name))
}

/// Must discard a snapshot that resolves after its scope was replaced.
///
/// - Enforced in: `ViewActor::on_snapshot`
/// - Failure symptom: Objects from the previous context appear in the new one.
#[cfg_attr(test, tokio::test)]
pub(crate) async fn test_stale_snapshot_is_discarded() {
	let backend = MemoryBackend::new();
	backend.seed("slow", [pod("from-slow")]);
	backend.seed("fast", [pod("from-fast")]);
	backend.set_list_delay("slow", Duration::from_millis(100));
	let view = view_with(&backend, ViewOptions::default());

	view.set_context("slow");
	view.set_context("fast");
	wait_until("fast live", || view.phase() == Phase::Live).await;
	let generation = view.generation();

	sleep(Duration::from_millis(200)).await;
	assert_eq!(view.generation(), generation);
	assert!(has(&view, "from-fast"));
	assert!(!has(&view, "from-slow"));
	assert_eq!(view.snapshot().total, 1);
}

/// Must release the previous watch when the scope changes.
///
/// - Enforced in: `ViewActor::begin`, `ViewActor::on_feed`
/// - Failure symptom: One leaked backend watch per context or namespace switch.
#[cfg_attr(test, tokio::test)]
pub(crate) async fn test_scope_switch_releases_watch() {
	let backend = MemoryBackend::<DynamicObject>::new();
	let view = view_with(&backend, ViewOptions::default().with_attach(AttachMode::Concurrent));

	for context in ["a", "b", "c", "a", "b"] {
		view.set_context(context);
	}
	wait_until("final scope watching", || {
		view.phase() == Phase::Live && view.is_watching() && view.snapshot().scope == Some(Scope::all("b"))
	})
	.await;
	sleep(Duration::from_millis(50)).await;
	assert_eq!(backend.active_watches(), 1);
}

/// Must apply the snapshot before events buffered while it loaded.
///
/// - Enforced in: `ViewActor::on_snapshot`
/// - Failure symptom: A late snapshot overwrites newer feed state.
#[cfg_attr(test, tokio::test)]
pub(crate) async fn test_buffered_events_follow_snapshot() {
	let backend = MemoryBackend::new();
	backend.seed("prod", [pod("a"), pod("b")]);
	backend.set_list_delay("prod", Duration::from_millis(150));
	let view = view_with(&backend, ViewOptions::default().with_attach(AttachMode::Concurrent));

	view.set_context("prod");
	wait_until("attached while loading", || view.is_watching()).await;
	assert_eq!(view.phase(), Phase::Loading);

	backend.emit("prod", WatchEvent::Added(pod("c")));
	backend.emit("prod", WatchEvent::Deleted(pod("b")));

	wait_until("live", || view.phase() == Phase::Live).await;
	assert!(has(&view, "a"));
	assert!(!has(&view, "b"));
	assert!(has(&view, "c"));
}

/// Must see every change committed after the snapshot read.
///
/// - Enforced in: `ViewActor::begin`, `ViewActor::on_feed` (the fetch waits for the attach)
/// - Failure symptom: An object created while the view loads never appears, and a
///   create confirmed in that window stays pending forever.
#[cfg_attr(test, tokio::test)]
pub(crate) async fn test_changes_during_load_are_seen() {
	let backend = MemoryBackend::new();
	backend.seed("prod", [pod("a")]);
	backend.set_list_delay("prod", Duration::from_millis(100));
	let view = view_with(&backend, ViewOptions::default());

	view.set_context("prod");
	wait_until("attached while loading", || view.is_watching()).await;
	backend.upsert("prod", pod("b"));
	backend.remove("prod", &key("a"));

	wait_until("live", || view.phase() == Phase::Live).await;
	assert!(has(&view, "b"));
	assert!(!has(&view, "a"));
	assert_eq!(view.snapshot().total, 1);
}

/// Must roll back only the pending entry a failed create introduced.
///
/// - Enforced in: `PendingCreates::rollback`, `ViewActor::on_created`
/// - Failure symptom: A confirmed object disappears when its original create times out or fails.
#[cfg_attr(test, tokio::test)]
pub(crate) async fn test_rollback_spares_confirmed_entry() {
	let backend = MemoryBackend::new();
	let view = Arc::new(view_with(&backend, ViewOptions::default()));
	view.set_context("prod");
	wait_until("live", || view.phase() == Phase::Live && view.is_watching()).await;

	let gate = backend.hold_mutations();
	backend.fail_next_mutation(BackendError::Unavailable("timeout".into()));
	let create = tokio::spawn({
		let view = Arc::clone(&view);
		async move { view.create(pod("x")).await }
	});
	wait_until("pending visible", || view.items().iter().any(|item| item.pending)).await;

	backend.emit("prod", WatchEvent::Added(pod("x")));
	wait_until("confirmed", || view.items().iter().any(|item| !item.pending)).await;

	gate.release_one();
	let result = create.await.expect("joined");
	assert!(matches!(result, Err(MutationError::Backend { .. })));
	assert!(has(&view, "x"));
}

/// Must remove a rejected create from the projection before answering.
///
/// - Enforced in: `ViewActor::on_created`
/// - Failure symptom: Caller sees the error while the phantom row is still listed.
#[cfg_attr(test, tokio::test)]
pub(crate) async fn test_rejected_create_is_gone_on_reply() {
	let backend = MemoryBackend::new();
	let view = Arc::new(view_with(&backend, ViewOptions::default()));
	view.set_context("prod");
	wait_until("live", || view.phase() == Phase::Live).await;

	let gate = backend.hold_mutations();
	backend.fail_next_mutation(BackendError::Rejected("quota exceeded".into()));
	let create = tokio::spawn({
		let view = Arc::clone(&view);
		async move { view.create(pod("x")).await }
	});
	wait_until("pending visible", || has(&view, "x")).await;

	gate.release_one();
	let result = create.await.expect("joined");
	assert!(result.is_err());
	assert!(!has(&view, "x"));
}

/// Must drop selected keys whose objects leave the collection.
///
/// - Enforced in: `ViewActor::apply_event`, `Selection::prune`
/// - Failure symptom: Bulk delete targets objects that no longer exist.
#[cfg_attr(test, tokio::test)]
pub(crate) async fn test_selection_follows_collection() {
	let backend = MemoryBackend::new();
	backend.seed("prod", [pod("a"), pod("b")]);
	let view = view_with(&backend, ViewOptions::default());
	view.set_context("prod");
	wait_until("live", || view.phase() == Phase::Live && view.is_watching()).await;

	view.toggle_all_visible(true);
	wait_until("selected", || view.selection().len() == 2).await;

	backend.remove("prod", &key("a"));
	wait_until("pruned", || view.selection() == vec![key("b")]).await;
	assert!(!has(&view, "a"));
}

/// Must clear collection and selection on every scope activation.
///
/// - Enforced in: `ViewActor::reset_scope_state`
/// - Failure symptom: Entries or selections migrate across contexts.
#[cfg_attr(test, tokio::test)]
pub(crate) async fn test_activation_starts_from_clean_slate() {
	let backend = MemoryBackend::new();
	backend.seed("one", [pod("a")]);
	backend.seed("two", [pod("b")]);
	backend.set_list_delay("two", Duration::from_millis(100));
	let view = view_with(&backend, ViewOptions::default());

	view.set_context("one");
	wait_until("one live", || view.phase() == Phase::Live).await;
	view.toggle_one(key("a"));
	wait_until("selected", || !view.selection().is_empty()).await;

	view.set_context("two");
	wait_until("two loading", || view.phase() == Phase::Loading).await;
	let snapshot = view.snapshot();
	assert!(snapshot.items.is_empty());
	assert!(snapshot.selection.is_empty());
	assert!(snapshot.loading);
}
