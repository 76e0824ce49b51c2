//! In-process [`ResourceBackend`](clusterview_model::ResourceBackend).
//!
//! Keeps one keyed store per cluster context and fans watch events out to
//! every open subscription whose scope admits them. Intended for tests and
//! offline embedding; the fault knobs make list latency, list/subscribe
//! failures, and held or rejected mutations reproducible.

mod backend;
mod faults;

pub use backend::MemoryBackend;
pub use faults::MutationGate;
