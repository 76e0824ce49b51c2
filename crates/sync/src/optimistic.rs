//! Optimistic create bookkeeping.
//!
//! A pending entry is an ordinary collection member flagged `pending`. The
//! tracker remembers which create introduced it so that a failed create only
//! rolls back its own entry, never one that an authoritative event or a later
//! create has since replaced.

use std::collections::HashMap;

use clusterview_model::{IdentityKey, Identifiable};

use crate::collection::Collection;
use crate::error::MutationError;

/// Handle for one in-flight optimistic create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTicket {
	pub key: IdentityKey,
	id: u64,
}

#[derive(Debug)]
struct Tracked<T> {
	id: u64,
	object: T,
}

#[derive(Debug)]
pub struct PendingCreates<T> {
	next_id: u64,
	tracked: HashMap<IdentityKey, Tracked<T>>,
}

impl<T> Default for PendingCreates<T> {
	fn default() -> Self {
		Self {
			next_id: 0,
			tracked: HashMap::new(),
		}
	}
}

impl<T: Identifiable + Clone> PendingCreates<T> {
	/// Inserts `object` as a pending entry.
	///
	/// Fails with [`MutationError::Conflict`] when the key is already present,
	/// pending or not; the backend is never asked in that case.
	pub fn begin(&mut self, collection: &mut Collection<T>, object: T) -> Result<PendingTicket, MutationError> {
		let key = collection
			.insert_pending(object.clone())
			.map_err(|key| MutationError::Conflict { key })?;
		self.next_id += 1;
		let id = self.next_id;
		self.tracked.insert(key.clone(), Tracked { id, object });
		Ok(PendingTicket { key, id })
	}

	/// Removes the entry introduced by `ticket` if it is still pending.
	pub fn rollback(&mut self, collection: &mut Collection<T>, ticket: &PendingTicket) -> bool {
		if self.tracked.get(&ticket.key).is_none_or(|tracked| tracked.id != ticket.id) {
			return false;
		}
		self.tracked.remove(&ticket.key);
		collection.remove_pending(&ticket.key)
	}

	/// Forgets `key` once the collection no longer holds a pending entry for it.
	pub fn observe(&mut self, collection: &Collection<T>, key: &IdentityKey) {
		if self.tracked.contains_key(key) && !collection.is_pending(key) {
			self.tracked.remove(key);
		}
	}

	/// Re-inserts tracked entries after a wholesale snapshot replacement.
	///
	/// Keys the snapshot already contains are authoritative and stop being tracked.
	pub fn reapply(&mut self, collection: &mut Collection<T>) {
		self.tracked
			.retain(|_, tracked| collection.insert_pending(tracked.object.clone()).is_ok());
	}

	pub fn clear(&mut self) {
		self.tracked.clear();
	}

	pub fn len(&self) -> usize {
		self.tracked.len()
	}

	pub fn is_empty(&self) -> bool {
		self.tracked.is_empty()
	}
}
