use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Identifier of an operator-selected cluster context.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(Arc<str>);

impl ContextId {
	pub fn new(id: impl Into<Arc<str>>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ContextId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for ContextId {
	fn from(id: &str) -> Self {
		Self::new(id)
	}
}

impl From<String> for ContextId {
	fn from(id: String) -> Self {
		Self::new(id)
	}
}

/// Non-empty set of namespace names.
///
/// Only built through [`NamespaceSelector::only`] or deserialization, both of
/// which refuse an empty set.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "BTreeSet<String>")]
pub struct NamespaceSet(BTreeSet<String>);

impl NamespaceSet {
	pub fn contains(&self, namespace: &str) -> bool {
		self.0.contains(namespace)
	}

	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}
}

impl TryFrom<BTreeSet<String>> for NamespaceSet {
	type Error = String;

	fn try_from(names: BTreeSet<String>) -> Result<Self, Self::Error> {
		let names: BTreeSet<String> = names.into_iter().filter(|name| !name.trim().is_empty()).collect();
		if names.is_empty() {
			return Err("explicit namespace selection must name at least one namespace".to_string());
		}
		Ok(Self(names))
	}
}

/// Namespace half of a [`Scope`].
///
/// `Only` always holds at least one name; [`NamespaceSelector::only`] collapses
/// an empty set into [`NamespaceSelector::All`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NamespaceSelector {
	/// Every namespace in the context.
	#[default]
	All,
	/// An explicit set of namespace names.
	Only(NamespaceSet),
}

impl NamespaceSelector {
	/// Builds an explicit selector. Blank names are ignored.
	pub fn only<I, S>(names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let names: BTreeSet<String> = names.into_iter().map(Into::into).collect();
		NamespaceSet::try_from(names).map_or(Self::All, Self::Only)
	}

	pub fn is_all(&self) -> bool {
		matches!(self, Self::All)
	}

	/// Returns true when an object in `namespace` belongs to this selection.
	///
	/// Cluster-scoped objects (no namespace) are always admitted.
	pub fn admits(&self, namespace: Option<&str>) -> bool {
		match (self, namespace) {
			(Self::All, _) | (_, None) => true,
			(Self::Only(names), Some(namespace)) => names.contains(namespace),
		}
	}

	/// Iterates the explicit names; empty for [`NamespaceSelector::All`].
	pub fn names(&self) -> impl Iterator<Item = &str> {
		let names = match self {
			Self::All => None,
			Self::Only(names) => Some(names.iter()),
		};
		names.into_iter().flatten()
	}
}

impl fmt::Display for NamespaceSelector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::All => f.write_str("*"),
			Self::Only(names) => {
				for (idx, name) in names.iter().enumerate() {
					if idx > 0 {
						f.write_str(",")?;
					}
					f.write_str(name)?;
				}
				Ok(())
			}
		}
	}
}

/// The `(context, namespaces)` pair bounding one snapshot + subscription pairing.
///
/// Equality decides whether in-flight work for a view can be reused or must be
/// torn down and restarted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
	pub context: ContextId,
	#[serde(default)]
	pub namespaces: NamespaceSelector,
}

impl Scope {
	pub fn new(context: impl Into<ContextId>, namespaces: NamespaceSelector) -> Self {
		Self {
			context: context.into(),
			namespaces,
		}
	}

	/// Scope over every namespace of `context`.
	pub fn all(context: impl Into<ContextId>) -> Self {
		Self::new(context, NamespaceSelector::All)
	}

	/// Returns a copy with a different namespace selection.
	pub fn with_namespaces(&self, namespaces: NamespaceSelector) -> Self {
		Self {
			context: self.context.clone(),
			namespaces,
		}
	}

	/// Returns a copy bound to a different context.
	pub fn with_context(&self, context: impl Into<ContextId>) -> Self {
		Self {
			context: context.into(),
			namespaces: self.namespaces.clone(),
		}
	}
}

impl fmt::Display for Scope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}[{}]", self.context, self.namespaces)
	}
}
