mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clusterview_memory::MemoryBackend;
use clusterview_model::{BackendError, DynamicObject, IdentityKey, NamespaceSelector, ResourceBackend, Scope, Subscription};
use clusterview_sync::{AttachMode, MutationError, Phase, ResourceView, SortSpec, ViewEvent, ViewOptions};
use common::{init_tracing, key, keys, pod, view, wait_until};
use pretty_assertions::assert_eq;
use tokio::time::sleep;

#[tokio::test]
async fn late_snapshot_for_previous_scope_is_ignored() {
	let backend = MemoryBackend::new();
	backend.seed("s1", [pod("default", "old")]);
	backend.seed("s2", [pod("default", "new")]);
	backend.set_list_delay("s1", Duration::from_millis(80));
	let view = view(&backend, ViewOptions::default());

	view.set_scope(Scope::all("s1"));
	view.set_scope(Scope::all("s2"));
	wait_until("s2 live", || view.phase() == Phase::Live).await;
	sleep(Duration::from_millis(150)).await;

	assert_eq!(keys(&view), vec!["default/new"]);
	assert_eq!(view.snapshot().scope, Some(Scope::all("s2")));
}

#[tokio::test]
async fn optimistic_create_appears_before_backend_answers() {
	let backend = MemoryBackend::new();
	let view = view(&backend, ViewOptions::default());
	view.set_scope(Scope::all("prod"));
	wait_until("live", || view.phase() == Phase::Live && view.is_watching()).await;

	let gate = backend.hold_mutations();
	let create = tokio::spawn({
		let view = Arc::clone(&view);
		async move { view.create(pod("default", "x")).await }
	});

	wait_until("pending row", || view.items().iter().any(|item| item.pending)).await;
	assert!(backend.objects("prod").is_empty());

	gate.release_one();
	assert!(create.await.expect("joined").is_ok());
	wait_until("confirmed row", || view.items().iter().all(|item| !item.pending)).await;
	assert_eq!(keys(&view), vec!["default/x"]);
}

#[tokio::test]
async fn rejected_create_rolls_back_and_notifies() {
	let backend = MemoryBackend::new();
	let view = view(&backend, ViewOptions::default());
	let mut events = view.subscribe();
	view.set_scope(Scope::all("prod"));
	wait_until("live", || view.phase() == Phase::Live).await;

	backend.fail_next_mutation(BackendError::Rejected("quota exceeded".into()));
	let error = view.create(pod("default", "x")).await.expect_err("rejected");
	assert_eq!(
		error,
		MutationError::Backend {
			key: key("default", "x"),
			source: BackendError::Rejected("quota exceeded".into()),
		}
	);
	assert!(view.items().is_empty());

	let failure = loop {
		match events.recv().await.expect("event") {
			event @ ViewEvent::MutationFailed { .. } => break event,
			_ => continue,
		}
	};
	assert!(matches!(failure, ViewEvent::MutationFailed { message, .. } if message.contains("quota exceeded")));
}

#[tokio::test]
async fn unconfirmed_create_stays_pending() {
	let backend = MemoryBackend::new();
	backend.seed("prod", [pod("default", "a")]);
	backend.suppress_confirmations(true);
	let view = view(&backend, ViewOptions::default());
	view.set_scope(Scope::all("prod"));
	wait_until("live", || view.phase() == Phase::Live).await;

	view.create(pod("default", "x")).await.expect("create");
	assert!(view.items().iter().any(|item| item.key == key("default", "x") && item.pending));
}

#[tokio::test]
async fn deleted_object_leaves_selection() {
	let backend = MemoryBackend::new();
	backend.seed("prod", [pod("default", "a"), pod("default", "b")]);
	let view = view(&backend, ViewOptions::default());
	view.set_scope(Scope::all("prod"));
	wait_until("live", || view.phase() == Phase::Live && view.is_watching()).await;

	view.toggle_all_visible(true);
	wait_until("all selected", || view.selection().len() == 2).await;

	backend.remove("prod", &key("default", "a"));
	wait_until("pruned", || view.selection() == vec![key("default", "b")]).await;
	assert_eq!(keys(&view), vec!["default/b"]);
}

#[tokio::test]
async fn concurrent_attach_matches_sequential_result() {
	for attach in [AttachMode::AfterSnapshot, AttachMode::Concurrent, AttachMode::BeforeSnapshot] {
		let backend = MemoryBackend::new();
		backend.seed("prod", [pod("default", "b"), pod("default", "a")]);
		let view = view(&backend, ViewOptions::default().with_attach(attach));
		view.set_scope(Scope::all("prod"));
		wait_until("watching", || view.phase() == Phase::Live && view.is_watching()).await;

		backend.upsert("prod", pod("default", "c"));
		wait_until("c applied", || view.items().len() == 3).await;
		assert_eq!(keys(&view), vec!["default/a", "default/b", "default/c"], "{attach:?}");
		assert_eq!(backend.active_watches(), 1);
	}
}

#[tokio::test]
async fn selector_change_swaps_the_watch() {
	let backend = MemoryBackend::new();
	backend.seed("prod", [pod("default", "a")]);
	let view = view(&backend, ViewOptions::default());
	view.set_scope(Scope::new("prod", NamespaceSelector::only(["default"])));
	wait_until("watching", || view.is_watching()).await;

	view.set_sort(SortSpec::descending("name"));
	view.set_namespace_selector(NamespaceSelector::All);
	wait_until("restarted", || {
		view.snapshot().scope == Some(Scope::all("prod")) && view.is_watching()
	})
	.await;
	assert_eq!(backend.active_watches(), 1);
	assert_eq!(keys(&view), vec!["default/a"]);
}

#[tokio::test]
async fn options_load_from_toml() {
	let options = ViewOptions::from_toml_str(
		r#"
snapshot_timeout_ms = 40
search_fields = ["labels.app"]

[sort]
field = "age"
direction = "desc"
"#,
	)
	.expect("options");

	let backend = MemoryBackend::new();
	backend.seed(
		"prod",
		[
			pod("default", "one").with_label("app", "web"),
			pod("default", "two").with_label("app", "db"),
		],
	);
	let view = view(&backend, options);
	view.set_scope(Scope::all("prod"));
	wait_until("live", || view.phase() == Phase::Live).await;

	view.set_query("web");
	wait_until("label search", || keys(&view) == vec!["default/one"]).await;

	backend.set_list_delay("slow", Duration::from_secs(5));
	view.set_context("slow");
	wait_until("timeout", || view.error().is_some_and(|error| error.is_timeout())).await;
}

/// Commits one more object every time a watch is opened, before the watch exists.
struct ChangesDuringSubscribe {
	inner: MemoryBackend<DynamicObject>,
}

#[async_trait]
impl ResourceBackend<DynamicObject> for ChangesDuringSubscribe {
	async fn list(&self, scope: &Scope) -> Result<Vec<DynamicObject>, BackendError> {
		self.inner.list(scope).await
	}

	async fn subscribe(&self, scope: &Scope) -> Result<Subscription<DynamicObject>, BackendError> {
		self.inner.upsert(scope.context.clone(), pod("default", "late"));
		self.inner.subscribe(scope).await
	}

	async fn create(&self, scope: &Scope, object: DynamicObject) -> Result<DynamicObject, BackendError> {
		self.inner.create(scope, object).await
	}

	async fn update(&self, scope: &Scope, object: DynamicObject) -> Result<DynamicObject, BackendError> {
		self.inner.update(scope, object).await
	}

	async fn delete(&self, scope: &Scope, keys: &[IdentityKey]) -> Vec<Result<(), BackendError>> {
		self.inner.delete(scope, keys).await
	}
}

#[tokio::test]
async fn change_committed_while_attaching_is_not_lost() {
	init_tracing();
	let inner = MemoryBackend::new();
	inner.seed("prod", [pod("default", "a")]);
	let backend = Arc::new(ChangesDuringSubscribe { inner: inner.clone() });
	let view = ResourceView::new(backend, ViewOptions::default()).expect("valid options");

	view.set_scope(Scope::all("prod"));
	wait_until("live and watching", || view.phase() == Phase::Live && view.is_watching()).await;
	assert_eq!(inner.objects("prod").len(), 2);
	assert_eq!(keys(&view), vec!["default/a", "default/late"]);
}
