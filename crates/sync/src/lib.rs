//! Live resource view synchronization.
//!
//! Keeps an identity-keyed collection of cluster objects consistent with a
//! backend: a scoped snapshot seeds it, an incremental change feed keeps it
//! current, and optimistic creates are overlaid until the feed confirms them.
//! Presentation code drives a [`ResourceView`] and reads [`ViewSnapshot`]s.

pub mod collection;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod loader;
pub mod optimistic;
pub mod projector;
pub mod selection;
mod generation;
mod subscriber;
mod task;
mod view;

pub use collection::{Change, Collection, Entry, reconcile};
pub use config::{AttachMode, ConfigError, ViewOptions};
pub use error::{MutationError, ViewError};
pub use lifecycle::Phase;
pub use loader::load_snapshot;
pub use optimistic::{PendingCreates, PendingTicket};
pub use projector::{ProjectionSpec, SortDirection, SortSpec, ViewItem, compare_values, natural_cmp, project};
pub use selection::Selection;
pub use view::{DeleteReport, ResourceView, ViewEvent, ViewSnapshot};
