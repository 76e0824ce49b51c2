//! Live resource view actor.
//!
//! # Purpose
//!
//! * Owns the canonical collection, selection, and scope lifecycle of one view.
//! * Seeds the collection from a snapshot, then folds change feed events into it.
//! * Publishes a filtered/sorted projection plus status for presentation code.
//! * Overlays optimistic creates and rolls them back on rejection.
//!
//! # Mental model
//!
//! * [`ResourceView`] is a command handle over a generation-scoped actor:
//!   * each scope activation (context switch, selector change, retry) bumps the generation.
//!   * every spawned task tags its result with the generation that started it.
//!   * results from an older generation are dropped by the actor; watches they carry are released.
//! * Backend calls never run on the actor. Snapshot fetches, feed attach/forwarding,
//!   and mutations run as tasks and report back through one event queue.
//! * Consumers read [`ViewSnapshot`]s; they never see the collection directly.
//!
//! # Key types
//!
//! | Type | Meaning | Constraints | Constructed / mutated in |
//! |---|---|---|---|
//! | [`ResourceView`] | Handle + published snapshot | Must only enqueue commands | `handle.rs` |
//! | `ViewActor` | Authoritative state machine | Must generation-filter task results | `actor.rs` |
//! | `ViewCmd` | Handle command protocol | Replies travel on oneshot channels | `actor.rs` |
//! | `TaskEvt` | Task result protocol | Must carry the originating generation | `actor.rs` |
//! | [`ViewSnapshot`] | Observable state | Replaced wholesale on every flush | `ViewActor::flush` |
//! | [`ViewEvent`] | Push notifications | Lossy broadcast; snapshot is the source of truth | `ViewActor::flush`, `report_failure` |
//! | [`DeleteReport`] | Bulk delete outcome | One entry per selected key | `ViewActor::on_deleted` |
//!
//! # Invariants
//!
//! * Must discard snapshot and feed results whose generation is not current.
//! * Must release the previous watch before requesting anything for a new scope.
//! * Must apply a snapshot before any feed event buffered while it loaded.
//! * Must see every change committed after the snapshot read (default attach mode).
//! * Must reset collection, selection, and pending creates on every activation.
//! * Must roll back only the pending entry a failed create introduced.
//! * Must drop selected keys whose objects leave the collection.
//! * Must publish the snapshot before answering a mutation.
//!
//! # Data flow
//!
//! 1. Caller invokes `set_scope`/`set_context`/`set_namespace_selector`.
//! 2. Actor bumps the generation, releases the old watch, clears state, and spawns the feed.
//! 3. Feed attaches; the fetch starts once it has (by default), so no change falls between them.
//!    Events arriving before the snapshot are buffered.
//! 4. Fetch result arrives: applied wholesale if current, then the buffer is replayed.
//! 5. Each event is folded into the collection; the projection is recomputed; the snapshot is published.
//!
//! # Lifecycle
//!
//! * Create with [`ResourceView::new`] inside a tokio runtime.
//! * Activate a scope; poll `snapshot()`/`take_changed()` or listen on `subscribe()`.
//! * `retry()` after a fetch error; `clear_scope()` to go idle.
//! * `shutdown()` (or dropping the handle) releases the watch and stops the actor.
//!
//! # Concurrency & ordering
//!
//! * The actor processes commands and task results sequentially; no state is shared
//!   except the published snapshot behind a `RwLock`.
//! * Handle commands are preferred over task results when both are ready.
//! * Events from one feed are applied in delivery order.
//!
//! # Failure modes & recovery
//!
//! * Fetch failure or timeout: phase `Error`, watch released, `retry()` restarts from `Loading`.
//! * Feed error, attach failure, or stream end: `warning` is set, last reconciled state stays.
//! * Mutation rejection: pending entry rolled back, `MutationFailed` broadcast, caller gets the error.
//! * Handle dropped: actor tears down; late task results are dropped with their channel.

mod actor;
mod handle;
mod types;

pub use handle::ResourceView;
pub use types::{DeleteReport, ViewEvent, ViewSnapshot};

#[cfg(test)]
mod invariants;
