use std::time::{Duration, Instant};

use clusterview_model::{Resource, ResourceBackend, Scope};

use crate::error::ViewError;

/// Fetches the full snapshot for `scope`, bounded by `deadline`.
///
/// Exceeding the deadline is [`ViewError::Timeout`]; a backend rejection is
/// [`ViewError::Fetch`] carrying the backend's message.
pub async fn load_snapshot<T: Resource>(backend: &dyn ResourceBackend<T>, scope: &Scope, deadline: Duration) -> Result<Vec<T>, ViewError> {
	let started = Instant::now();
	match tokio::time::timeout(deadline, backend.list(scope)).await {
		Ok(Ok(objects)) => {
			tracing::debug!(
				scope = %scope,
				count = objects.len(),
				elapsed_ms = started.elapsed().as_millis() as u64,
				"view.snapshot.loaded"
			);
			Ok(objects)
		}
		Ok(Err(error)) => {
			tracing::warn!(scope = %scope, error = %error, "view.snapshot.failed");
			Err(ViewError::Fetch { message: error.to_string() })
		}
		Err(_) => {
			tracing::warn!(scope = %scope, deadline_ms = deadline.as_millis() as u64, "view.snapshot.timeout");
			Err(ViewError::Timeout { after: deadline })
		}
	}
}
