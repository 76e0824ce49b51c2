//! Canonical identity-keyed collection and the reconciliation fold.
//!
//! Snapshot and watch events are folded into a [`Collection`] with last-writer-wins
//! semantics per [`IdentityKey`]: `Added`/`Modified` upsert, `Deleted` removes,
//! `Error` is not a state change. Re-applying an event leaves the collection
//! unchanged, and events for distinct keys commute.

use std::collections::HashMap;
use std::collections::hash_map::Entry as MapEntry;
use std::sync::Arc;

use clusterview_model::{IdentityKey, Identifiable, WatchEvent};

/// One stored object.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<T> {
	pub object: Arc<T>,
	/// Locally created and not yet confirmed by the feed.
	pub pending: bool,
}

/// Effect of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
	Inserted,
	Replaced,
	Removed,
	Unchanged,
}

/// Identity-keyed store of the objects in the active scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<T> {
	entries: HashMap<IdentityKey, Entry<T>>,
}

impl<T> Default for Collection<T> {
	fn default() -> Self {
		Self { entries: HashMap::new() }
	}
}

impl<T: Identifiable> Collection<T> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds a collection from a snapshot. Later duplicates win.
	pub fn from_snapshot(objects: impl IntoIterator<Item = T>) -> Self {
		let mut collection = Self::new();
		collection.replace_all(objects);
		collection
	}

	/// Replaces every entry with the snapshot contents.
	pub fn replace_all(&mut self, objects: impl IntoIterator<Item = T>) {
		self.entries.clear();
		for object in objects {
			self.entries.insert(
				object.identity_key(),
				Entry {
					object: Arc::new(object),
					pending: false,
				},
			);
		}
	}

	pub fn apply(&mut self, event: WatchEvent<T>) -> Change {
		match event {
			WatchEvent::Added(object) | WatchEvent::Modified(object) => {
				let entry = Entry {
					object: Arc::new(object),
					pending: false,
				};
				match self.entries.insert(entry.object.identity_key(), entry) {
					Some(_) => Change::Replaced,
					None => Change::Inserted,
				}
			}
			WatchEvent::Deleted(object) => match self.entries.remove(&object.identity_key()) {
				Some(_) => Change::Removed,
				None => Change::Unchanged,
			},
			WatchEvent::Error(_) => Change::Unchanged,
		}
	}

	/// Inserts a speculative entry, refusing when the key is already present.
	pub fn insert_pending(&mut self, object: T) -> Result<IdentityKey, IdentityKey> {
		let key = object.identity_key();
		match self.entries.entry(key.clone()) {
			MapEntry::Occupied(_) => Err(key),
			MapEntry::Vacant(slot) => {
				slot.insert(Entry {
					object: Arc::new(object),
					pending: true,
				});
				Ok(key)
			}
		}
	}

	/// Removes `key` only while it is still a pending entry.
	pub fn remove_pending(&mut self, key: &IdentityKey) -> bool {
		if self.is_pending(key) {
			self.entries.remove(key);
			return true;
		}
		false
	}

	pub fn is_pending(&self, key: &IdentityKey) -> bool {
		self.entries.get(key).is_some_and(|entry| entry.pending)
	}
}

impl<T> Collection<T> {
	pub fn get(&self, key: &IdentityKey) -> Option<&Entry<T>> {
		self.entries.get(key)
	}

	pub fn contains(&self, key: &IdentityKey) -> bool {
		self.entries.contains_key(key)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn clear(&mut self) {
		self.entries.clear();
	}

	pub fn iter(&self) -> impl Iterator<Item = (&IdentityKey, &Entry<T>)> {
		self.entries.iter()
	}

	pub fn keys(&self) -> impl Iterator<Item = &IdentityKey> {
		self.entries.keys()
	}
}

/// Folds `events` into `collection` in order.
pub fn reconcile<T: Identifiable>(mut collection: Collection<T>, events: impl IntoIterator<Item = WatchEvent<T>>) -> Collection<T> {
	for event in events {
		collection.apply(event);
	}
	collection
}

#[cfg(test)]
mod tests;
