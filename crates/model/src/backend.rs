//! Contract consumed from the cluster-facing backend.
//!
//! The backend owns transport, authentication, and kind schemas. Views only
//! call the operations below and never assume anything about how they are
//! carried out.

use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::{IdentityKey, Scope, WatchEvent};

/// Errors reported by a [`ResourceBackend`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
	/// The backend refused the request.
	#[error("{0}")]
	Rejected(String),
	/// Create target already exists.
	#[error("{0} already exists")]
	AlreadyExists(IdentityKey),
	/// Update/delete target does not exist.
	#[error("{0} not found")]
	NotFound(IdentityKey),
	/// The backend could not be reached.
	#[error("backend unavailable: {0}")]
	Unavailable(String),
}

/// Release hook for a backend-side watch.
///
/// Runs at most once, either through [`WatchRelease::release`] or on drop.
pub struct WatchRelease(Option<Box<dyn FnOnce() + Send>>);

impl WatchRelease {
	pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
		Self(Some(Box::new(release)))
	}

	/// A release hook with nothing to release.
	pub fn noop() -> Self {
		Self(None)
	}

	pub fn release(mut self) {
		self.run();
	}

	fn run(&mut self) {
		if let Some(release) = self.0.take() {
			release();
		}
	}
}

impl Drop for WatchRelease {
	fn drop(&mut self) {
		self.run();
	}
}

impl fmt::Debug for WatchRelease {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WatchRelease").field("armed", &self.0.is_some()).finish()
	}
}

/// An attached change feed for one scope.
///
/// Dropping the subscription releases the backend watch.
pub struct Subscription<T> {
	events: BoxStream<'static, WatchEvent<T>>,
	release: WatchRelease,
}

impl<T> Subscription<T> {
	pub fn new(events: BoxStream<'static, WatchEvent<T>>, release: WatchRelease) -> Self {
		Self { events, release }
	}

	/// Splits into the event stream and the release guard so they can be owned
	/// by different tasks.
	pub fn into_parts(self) -> (BoxStream<'static, WatchEvent<T>>, WatchRelease) {
		(self.events, self.release)
	}

	pub fn unsubscribe(self) {
		self.release.release();
	}
}

impl<T> fmt::Debug for Subscription<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Subscription").field("release", &self.release).finish_non_exhaustive()
	}
}

/// List/watch/mutate operations for one resource kind.
#[async_trait]
pub trait ResourceBackend<T>: Send + Sync {
	/// Full snapshot of the objects visible in `scope`.
	async fn list(&self, scope: &Scope) -> Result<Vec<T>, BackendError>;

	/// Attaches an incremental feed for `scope`.
	async fn subscribe(&self, scope: &Scope) -> Result<Subscription<T>, BackendError>;

	async fn create(&self, scope: &Scope, object: T) -> Result<T, BackendError>;

	async fn update(&self, scope: &Scope, object: T) -> Result<T, BackendError>;

	/// Deletes `keys`, returning one result per key in the same order.
	async fn delete(&self, scope: &Scope, keys: &[IdentityKey]) -> Vec<Result<(), BackendError>>;
}
