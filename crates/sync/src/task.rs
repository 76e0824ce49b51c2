use std::future::Future;

use tokio::task::JoinHandle;

/// Classes of tasks a view spawns, used for trace output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TaskClass {
	/// The actor loop itself.
	View,
	/// One snapshot fetch.
	Snapshot,
	/// Change feed attach and forwarding.
	Watch,
	/// A create, update, or delete call.
	Mutation,
}

impl TaskClass {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::View => "view",
			Self::Snapshot => "snapshot",
			Self::Watch => "watch",
			Self::Mutation => "mutation",
		}
	}
}

/// Spawns a view task on the current tokio runtime.
///
/// # Panics
///
/// Panics when called outside a tokio runtime.
pub(crate) fn spawn<F>(class: TaskClass, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(task_class = class.as_str(), "view.spawn");
	tokio::spawn(fut)
}
