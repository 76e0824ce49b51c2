use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use clusterview_model::{BackendError, ContextId, IdentityKey};
use tokio::sync::Semaphore;

/// Injected failures and delays, consumed by the backend operations.
#[derive(Default)]
pub(crate) struct Faults {
	pub list_failures: VecDeque<BackendError>,
	pub list_delays: HashMap<ContextId, Duration>,
	pub subscribe_failure: Option<BackendError>,
	pub mutation_failures: VecDeque<BackendError>,
	pub delete_failures: HashSet<IdentityKey>,
	pub mutation_gate: Option<MutationGate>,
	pub suppress_confirmations: bool,
}

/// Holds create/update/delete calls until released.
///
/// Each [`MutationGate::release_one`] lets one waiting (or future) mutation
/// through; [`MutationGate::open`] lets everything through for good.
#[derive(Debug, Clone)]
pub struct MutationGate {
	permits: Arc<Semaphore>,
}

impl MutationGate {
	pub(crate) fn new() -> Self {
		Self {
			permits: Arc::new(Semaphore::new(0)),
		}
	}

	pub fn release_one(&self) {
		self.permits.add_permits(1);
	}

	pub fn open(&self) {
		self.permits.close();
	}

	pub(crate) async fn pass(&self) {
		// A closed semaphore means the gate is open.
		if let Ok(permit) = self.permits.acquire().await {
			permit.forget();
		}
	}
}
