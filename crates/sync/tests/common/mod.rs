use std::sync::Arc;
use std::time::Duration;

use clusterview_memory::MemoryBackend;
use clusterview_model::{DynamicObject, IdentityKey};
use clusterview_sync::{ResourceView, ViewOptions};
use tokio::time::{sleep, timeout};

pub async fn wait_until<F>(name: &str, mut condition: F)
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

/// Routes `tracing` output through the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

pub fn pod(namespace: &str, name: &str) -> DynamicObject {
	DynamicObject::namespaced(namespace, name)
}

pub fn key(namespace: &str, name: &str) -> IdentityKey {
	IdentityKey::namespaced(namespace, name)
}

pub fn view(backend: &MemoryBackend<DynamicObject>, options: ViewOptions) -> Arc<ResourceView<DynamicObject>> {
	init_tracing();
	Arc::new(ResourceView::new(Arc::new(backend.clone()), options).expect("valid options"))
}

pub fn keys(view: &ResourceView<DynamicObject>) -> Vec<String> {
	view.items().iter().map(|item| item.key.to_string()).collect()
}
