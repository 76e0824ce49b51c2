use clusterview_model::{DynamicObject, IdentityKey, WatchEvent};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::{Change, Collection, reconcile};

fn pod(name: &str) -> DynamicObject {
	DynamicObject::namespaced("default", name)
}

fn key(name: &str) -> IdentityKey {
	IdentityKey::namespaced("default", name)
}

fn sorted_keys(collection: &Collection<DynamicObject>) -> Vec<IdentityKey> {
	let mut keys: Vec<_> = collection.keys().cloned().collect();
	keys.sort();
	keys
}

#[test]
fn modify_then_delete_scenario() {
	let mut collection = Collection::from_snapshot([pod("a"), pod("b")]);

	let ready = pod("a").with_path("status.phase", "Ready");
	assert_eq!(collection.apply(WatchEvent::Modified(ready.clone())), Change::Replaced);
	assert_eq!(sorted_keys(&collection), vec![key("a"), key("b")]);
	assert_eq!(*collection.get(&key("a")).expect("a").object, ready);

	assert_eq!(collection.apply(WatchEvent::Deleted(pod("b"))), Change::Removed);
	assert_eq!(sorted_keys(&collection), vec![key("a")]);
}

#[test]
fn added_is_idempotent() {
	let once = reconcile(Collection::new(), [WatchEvent::Added(pod("a"))]);
	let twice = reconcile(once.clone(), [WatchEvent::Added(pod("a"))]);
	assert_eq!(once, twice);
}

#[test]
fn modified_for_absent_key_inserts() {
	let mut collection = Collection::new();
	assert_eq!(collection.apply(WatchEvent::Modified(pod("late"))), Change::Inserted);
	assert!(collection.contains(&key("late")));
}

#[test]
fn delete_of_absent_key_and_error_sentinel_are_noops() {
	let mut collection = Collection::from_snapshot([pod("a")]);
	let before = collection.clone();
	assert_eq!(collection.apply(WatchEvent::Deleted(pod("ghost"))), Change::Unchanged);
	assert_eq!(collection.apply(WatchEvent::Error("gone".into())), Change::Unchanged);
	assert_eq!(collection, before);
}

#[test]
fn snapshot_replaces_wholesale() {
	let mut collection = Collection::from_snapshot([pod("a"), pod("b")]);
	collection.replace_all([pod("c")]);
	assert_eq!(sorted_keys(&collection), vec![key("c")]);
}

#[test]
fn authoritative_event_supersedes_pending_entry() {
	let mut collection = Collection::new();
	assert_eq!(collection.insert_pending(pod("x")), Ok(key("x")));
	assert!(collection.is_pending(&key("x")));
	assert_eq!(collection.insert_pending(pod("x")), Err(key("x")));

	collection.apply(WatchEvent::Added(pod("x")));
	assert!(!collection.is_pending(&key("x")));
	assert!(!collection.remove_pending(&key("x")));
	assert!(collection.contains(&key("x")));
}

fn arb_event() -> impl Strategy<Value = WatchEvent<DynamicObject>> {
	let object = (prop::sample::select(vec!["a", "b", "c"]), 0u8..4)
		.prop_map(|(name, version)| pod(name).with_path("spec.version", u64::from(version)));
	prop_oneof![
		object.clone().prop_map(WatchEvent::Added),
		object.clone().prop_map(WatchEvent::Modified),
		object.prop_map(WatchEvent::Deleted),
	]
}

proptest! {
	/// The final state of a key depends only on that key's events, not on how
	/// they interleave with other keys' events.
	#[test]
	fn prop_keys_reconcile_independently(events in prop::collection::vec(arb_event(), 0..40)) {
		let folded = reconcile(Collection::new(), events.clone());

		for name in ["a", "b", "c"] {
			let own: Vec<_> = events
				.iter()
				.filter(|event| event.key() == Some(key(name)))
				.cloned()
				.collect();
			let isolated = reconcile(Collection::new(), own);
			prop_assert_eq!(folded.get(&key(name)), isolated.get(&key(name)));
		}
	}

	#[test]
	fn prop_reapplying_last_event_is_stable(events in prop::collection::vec(arb_event(), 1..20)) {
		let folded = reconcile(Collection::new(), events.clone());
		let last = events.last().cloned().into_iter();
		prop_assert_eq!(reconcile(folded.clone(), last), folded);
	}
}
