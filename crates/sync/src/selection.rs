use std::collections::BTreeSet;

use clusterview_model::IdentityKey;

use crate::collection::Collection;

/// Keys the user has checked.
///
/// Every key must name an object still present in the canonical collection;
/// [`Selection::prune`] restores that after each collection change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
	keys: BTreeSet<IdentityKey>,
}

impl Selection {
	/// Flips `key`. Keys absent from `collection` can be unselected but never selected.
	pub fn toggle_one<T>(&mut self, key: &IdentityKey, collection: &Collection<T>) -> bool {
		if self.keys.remove(key) {
			return true;
		}
		collection.contains(key) && self.keys.insert(key.clone())
	}

	/// Selects or unselects every key in `visible`, the current projection.
	pub fn toggle_all_visible<'a>(&mut self, checked: bool, visible: impl IntoIterator<Item = &'a IdentityKey>) -> bool {
		let mut changed = false;
		for key in visible {
			changed |= if checked { self.keys.insert(key.clone()) } else { self.keys.remove(key) };
		}
		changed
	}

	pub fn clear(&mut self) -> bool {
		let changed = !self.keys.is_empty();
		self.keys.clear();
		changed
	}

	/// Drops keys no longer present in `collection`.
	pub fn prune<T>(&mut self, collection: &Collection<T>) -> bool {
		let before = self.keys.len();
		self.keys.retain(|key| collection.contains(key));
		self.keys.len() != before
	}

	pub fn remove_all<'a>(&mut self, keys: impl IntoIterator<Item = &'a IdentityKey>) -> bool {
		keys.into_iter().fold(false, |changed, key| self.keys.remove(key) | changed)
	}

	pub fn contains(&self, key: &IdentityKey) -> bool {
		self.keys.contains(key)
	}

	pub fn len(&self) -> usize {
		self.keys.len()
	}

	pub fn is_empty(&self) -> bool {
		self.keys.is_empty()
	}

	/// Selected keys in key order.
	pub fn to_vec(&self) -> Vec<IdentityKey> {
		self.keys.iter().cloned().collect()
	}
}
