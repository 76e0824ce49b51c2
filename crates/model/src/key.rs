use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Unique identity of a resource object within a scope.
///
/// Namespace-scoped kinds key by `(namespace, name)`, cluster-scoped kinds by
/// `name` alone. Ordering puts cluster-scoped keys first, then sorts by
/// namespace and name, which gives projections a deterministic tie-break.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdentityKey {
	namespace: Option<Arc<str>>,
	name: Arc<str>,
}

impl IdentityKey {
	pub fn new(namespace: Option<&str>, name: &str) -> Self {
		Self {
			namespace: namespace.map(Arc::from),
			name: Arc::from(name),
		}
	}

	pub fn namespaced(namespace: &str, name: &str) -> Self {
		Self::new(Some(namespace), name)
	}

	pub fn cluster(name: &str) -> Self {
		Self::new(None, name)
	}

	pub fn namespace(&self) -> Option<&str> {
		self.namespace.as_deref()
	}

	pub fn name(&self) -> &str {
		&self.name
	}
}

impl fmt::Display for IdentityKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.namespace {
			Some(namespace) => write!(f, "{namespace}/{}", self.name),
			None => f.write_str(&self.name),
		}
	}
}
