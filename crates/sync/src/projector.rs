//! Filter/sort projection of the canonical collection.
//!
//! [`project`] is a pure derivation: namespace filter, then case-folded
//! substring filter over the configured search fields, then a stable sort by
//! one field with identity-key tie breaking. Nothing here holds state; the view
//! re-runs it whenever the collection, selector, query, or sort changes.

use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;
use std::sync::Arc;

use clusterview_model::{FieldValue, IdentityKey, NamespaceSelector, Resource};
use serde::{Deserialize, Serialize};

use crate::collection::Collection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
	#[default]
	Asc,
	Desc,
}

impl SortDirection {
	pub fn reversed(self) -> Self {
		match self {
			Self::Asc => Self::Desc,
			Self::Desc => Self::Asc,
		}
	}
}

/// Sort key and direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
	pub field: String,
	#[serde(default)]
	pub direction: SortDirection,
}

impl Default for SortSpec {
	fn default() -> Self {
		Self::ascending("name")
	}
}

impl SortSpec {
	pub fn ascending(field: impl Into<String>) -> Self {
		Self {
			field: field.into(),
			direction: SortDirection::Asc,
		}
	}

	pub fn descending(field: impl Into<String>) -> Self {
		Self {
			field: field.into(),
			direction: SortDirection::Desc,
		}
	}
}

/// Inputs of one projection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectionSpec {
	pub namespaces: NamespaceSelector,
	pub query: String,
	pub search_fields: Vec<String>,
	pub sort: SortSpec,
}

/// One row of the projection.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewItem<T> {
	pub key: IdentityKey,
	pub object: Arc<T>,
	pub pending: bool,
}

/// Derives the ordered, filtered rows of `collection`.
pub fn project<T: Resource>(collection: &Collection<T>, spec: &ProjectionSpec) -> Vec<ViewItem<T>> {
	let query = spec.query.trim().to_lowercase();

	let mut rows: Vec<(Option<FieldValue>, ViewItem<T>)> = collection
		.iter()
		.filter(|(key, _)| spec.namespaces.admits(key.namespace()))
		.filter(|(_, entry)| query.is_empty() || matches_query(entry.object.as_ref(), &spec.search_fields, &query))
		.map(|(key, entry)| {
			let value = entry.object.field(&spec.sort.field);
			let item = ViewItem {
				key: key.clone(),
				object: Arc::clone(&entry.object),
				pending: entry.pending,
			};
			(value, item)
		})
		.collect();

	rows.sort_by(|(lhs_value, lhs), (rhs_value, rhs)| {
		let primary = compare_values(lhs_value.as_ref(), rhs_value.as_ref());
		let primary = match spec.sort.direction {
			SortDirection::Asc => primary,
			SortDirection::Desc => primary.reverse(),
		};
		primary.then_with(|| lhs.key.cmp(&rhs.key))
	});

	rows.into_iter().map(|(_, item)| item).collect()
}

/// `query` must already be case-folded.
fn matches_query<T: Resource>(object: &T, fields: &[String], query: &str) -> bool {
	fields.iter().any(|field| {
		object
			.field(field)
			.is_some_and(|value| value.search_text().to_lowercase().contains(query))
	})
}

/// Orders extracted values. Missing values sort first; mixed kinds order by kind.
pub fn compare_values(lhs: Option<&FieldValue>, rhs: Option<&FieldValue>) -> Ordering {
	match (lhs, rhs) {
		(None, None) => Ordering::Equal,
		(None, Some(_)) => Ordering::Less,
		(Some(_), None) => Ordering::Greater,
		(Some(lhs), Some(rhs)) => match (lhs, rhs) {
			(FieldValue::Text(a), FieldValue::Text(b)) => natural_cmp(a, b),
			(FieldValue::Number(a), FieldValue::Number(b)) => a.total_cmp(b),
			(FieldValue::Time(a), FieldValue::Time(b)) => a.cmp(b),
			(FieldValue::Flag(a), FieldValue::Flag(b)) => a.cmp(b),
			_ => kind_rank(lhs).cmp(&kind_rank(rhs)),
		},
	}
}

fn kind_rank(value: &FieldValue) -> u8 {
	match value {
		FieldValue::Flag(_) => 0,
		FieldValue::Number(_) => 1,
		FieldValue::Time(_) => 2,
		FieldValue::Text(_) => 3,
	}
}

/// Case-insensitive comparison that orders embedded digit runs numerically
/// (`pod-2` < `pod-10`). Fully equal folds fall back to byte order.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
	let mut lhs = a.chars().peekable();
	let mut rhs = b.chars().peekable();
	loop {
		match (lhs.peek().copied(), rhs.peek().copied()) {
			(None, None) => return a.cmp(b),
			(None, Some(_)) => return Ordering::Less,
			(Some(_), None) => return Ordering::Greater,
			(Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
				let ord = cmp_digit_runs(&take_digits(&mut lhs), &take_digits(&mut rhs));
				if ord != Ordering::Equal {
					return ord;
				}
			}
			(Some(x), Some(y)) => {
				let ord = x.to_lowercase().cmp(y.to_lowercase());
				if ord != Ordering::Equal {
					return ord;
				}
				lhs.next();
				rhs.next();
			}
		}
	}
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
	let mut run = String::new();
	while let Some(digit) = chars.next_if(char::is_ascii_digit) {
		run.push(digit);
	}
	run
}

fn cmp_digit_runs(a: &str, b: &str) -> Ordering {
	let a_trimmed = a.trim_start_matches('0');
	let b_trimmed = b.trim_start_matches('0');
	a_trimmed
		.len()
		.cmp(&b_trimmed.len())
		.then_with(|| a_trimmed.cmp(b_trimmed))
		.then_with(|| a.len().cmp(&b.len()))
}
