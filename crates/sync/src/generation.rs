use tokio_util::sync::CancellationToken;

/// Monotonic scope generation counter owned by the view actor.
///
/// Generation 0 is never handed out, so a default-initialised tag is always stale.
#[derive(Debug, Default)]
pub(crate) struct GenerationClock {
	current: u64,
}

impl GenerationClock {
	/// Returns the next generation ID.
	pub fn advance(&mut self) -> u64 {
		self.current = self.current.wrapping_add(1).max(1);
		self.current
	}
}

/// Generation-scoped cancellation token for the tasks of one scope activation.
#[derive(Debug, Clone)]
pub(crate) struct ScopeToken {
	generation: u64,
	cancel: CancellationToken,
}

impl ScopeToken {
	pub fn new(generation: u64) -> Self {
		Self {
			generation,
			cancel: CancellationToken::new(),
		}
	}

	pub const fn generation(&self) -> u64 {
		self.generation
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Future resolving when cancellation is requested.
	pub async fn cancelled(&self) {
		self.cancel.cancelled().await;
	}
}
