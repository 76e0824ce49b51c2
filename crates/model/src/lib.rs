//! Shared vocabulary for live cluster resource views: scopes, identity keys,
//! the resource capability traits, watch events, and the backend contract.

/// Backend contract: list, subscribe, and mutate.
pub mod backend;
/// Incremental change events.
pub mod event;
/// Identity keys.
pub mod key;
/// Generic attribute-bag object.
pub mod object;
/// Identity, age, and field extraction capabilities.
pub mod resource;
/// Cluster context and namespace selection.
pub mod scope;

pub use backend::{BackendError, ResourceBackend, Subscription, WatchRelease};
pub use event::{WatchEvent, WatchEventKind};
pub use key::IdentityKey;
pub use object::{DynamicObject, ObjectMeta};
pub use resource::{FieldAccess, FieldValue, Identifiable, Resource, meta_field};
pub use scope::{ContextId, NamespaceSelector, NamespaceSet, Scope};
