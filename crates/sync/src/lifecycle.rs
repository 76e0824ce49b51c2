use clusterview_model::Scope;

use crate::generation::{GenerationClock, ScopeToken};

/// Scope lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
	/// No scope selected.
	#[default]
	Idle,
	/// Snapshot fetch in flight.
	Loading,
	/// Snapshot applied; change feed attached or attaching.
	Live,
	/// Snapshot failed or timed out. Recoverable by retry.
	Error,
}

impl Phase {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Idle => "idle",
			Self::Loading => "loading",
			Self::Live => "live",
			Self::Error => "error",
		}
	}

	/// Whether the phase has a scope that accepts mutations.
	pub const fn is_active(self) -> bool {
		matches!(self, Self::Loading | Self::Live)
	}
}

/// A freshly started scope activation.
#[derive(Debug, Clone)]
pub(crate) struct Activation {
	pub scope: Scope,
	pub token: ScopeToken,
}

impl Activation {
	pub fn generation(&self) -> u64 {
		self.token.generation()
	}
}

/// `Idle -> Loading -> Live`, with `Loading -> Error` and `Error -> Loading` on retry.
///
/// Every activation gets a new generation and cancels the previous token, so
/// results tagged with an older generation are recognisably stale.
#[derive(Debug, Default)]
pub(crate) struct ScopeLifecycle {
	clock: GenerationClock,
	generation: u64,
	scope: Option<Scope>,
	phase: Phase,
	token: Option<ScopeToken>,
}

impl ScopeLifecycle {
	/// Starts loading `scope`. Returns `None` when `scope` is already active.
	pub fn activate(&mut self, scope: Scope) -> Option<Activation> {
		if self.phase != Phase::Idle && self.scope.as_ref() == Some(&scope) {
			return None;
		}
		Some(self.restart(scope))
	}

	/// Restarts the current scope from `Loading`. Only valid in `Error`.
	pub fn retry(&mut self) -> Option<Activation> {
		if self.phase != Phase::Error {
			return None;
		}
		let scope = self.scope.clone()?;
		Some(self.restart(scope))
	}

	fn restart(&mut self, scope: Scope) -> Activation {
		self.cancel_token();
		self.generation = self.clock.advance();
		let token = ScopeToken::new(self.generation);
		self.token = Some(token.clone());
		self.scope = Some(scope.clone());
		self.phase = Phase::Loading;
		Activation { scope, token }
	}

	/// Returns to `Idle`. Returns false when already idle.
	pub fn deactivate(&mut self) -> bool {
		if self.phase == Phase::Idle {
			return false;
		}
		self.cancel_token();
		self.generation = self.clock.advance();
		self.scope = None;
		self.phase = Phase::Idle;
		true
	}

	pub fn snapshot_applied(&mut self, generation: u64) -> bool {
		if generation != self.generation || self.phase != Phase::Loading {
			return false;
		}
		self.phase = Phase::Live;
		true
	}

	pub fn snapshot_failed(&mut self, generation: u64) -> bool {
		if generation != self.generation || self.phase != Phase::Loading {
			return false;
		}
		self.cancel_token();
		self.phase = Phase::Error;
		true
	}

	/// True when `generation` belongs to the running activation.
	pub fn is_current(&self, generation: u64) -> bool {
		generation == self.generation && self.phase.is_active()
	}

	pub fn phase(&self) -> Phase {
		self.phase
	}

	pub fn scope(&self) -> Option<&Scope> {
		self.scope.as_ref()
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn token(&self) -> Option<&ScopeToken> {
		self.token.as_ref()
	}

	fn cancel_token(&mut self) {
		if let Some(token) = self.token.take() {
			token.cancel();
		}
	}
}
