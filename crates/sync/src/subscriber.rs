use std::sync::Arc;

use clusterview_model::{BackendError, Resource, ResourceBackend, Scope, WatchEvent, WatchRelease};
use futures::StreamExt;

use crate::generation::ScopeToken;

/// Messages a feed task reports to the view actor.
#[derive(Debug)]
pub(crate) enum FeedMsg<T> {
	/// Subscription established. Dropping the release tears the watch down.
	Attached { release: WatchRelease },
	/// `subscribe` failed.
	Failed { error: BackendError },
	Event(WatchEvent<T>),
	/// The backend ended the stream.
	Closed,
}

/// Receives feed messages. Returns false once the actor is gone.
pub(crate) type FeedSink<T> = Arc<dyn Fn(FeedMsg<T>) -> bool + Send + Sync>;

/// Attaches to the change feed for `scope` and forwards its events until
/// `token` is cancelled, the stream ends, or the sink closes.
///
/// A subscription that completes after cancellation is released immediately.
pub(crate) async fn run_feed<T: Resource>(backend: Arc<dyn ResourceBackend<T>>, scope: Scope, token: ScopeToken, sink: FeedSink<T>) {
	let generation = token.generation();
	let subscription = tokio::select! {
		biased;
		_ = token.cancelled() => return,
		result = backend.subscribe(&scope) => result,
	};

	let subscription = match subscription {
		Ok(subscription) => subscription,
		Err(error) => {
			sink(FeedMsg::Failed { error });
			return;
		}
	};

	let (mut events, release) = subscription.into_parts();
	if token.is_cancelled() {
		tracing::debug!(generation, scope = %scope, "view.watch.abandoned");
		release.release();
		return;
	}
	if !sink(FeedMsg::Attached { release }) {
		return;
	}

	loop {
		tokio::select! {
			biased;
			_ = token.cancelled() => return,
			next = events.next() => match next {
				Some(event) => {
					tracing::trace!(generation, kind = event.kind().as_str(), "view.watch.event");
					if !sink(FeedMsg::Event(event)) {
						return;
					}
				}
				None => {
					sink(FeedMsg::Closed);
					return;
				}
			},
		}
	}
}
