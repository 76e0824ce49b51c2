use crate::{IdentityKey, Identifiable};

/// Discriminant of a [`WatchEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEventKind {
	Added,
	Modified,
	Deleted,
	Error,
}

impl WatchEventKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Added => "added",
			Self::Modified => "modified",
			Self::Deleted => "deleted",
			Self::Error => "error",
		}
	}
}

/// One incremental change from a backend feed.
///
/// Object-bearing events always carry the full current object.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<T> {
	Added(T),
	Modified(T),
	Deleted(T),
	/// Feed-level error. Never mutates a collection.
	Error(String),
}

impl<T> WatchEvent<T> {
	pub fn kind(&self) -> WatchEventKind {
		match self {
			Self::Added(_) => WatchEventKind::Added,
			Self::Modified(_) => WatchEventKind::Modified,
			Self::Deleted(_) => WatchEventKind::Deleted,
			Self::Error(_) => WatchEventKind::Error,
		}
	}

	pub fn object(&self) -> Option<&T> {
		match self {
			Self::Added(object) | Self::Modified(object) | Self::Deleted(object) => Some(object),
			Self::Error(_) => None,
		}
	}
}

impl<T: Identifiable> WatchEvent<T> {
	/// Identity of the carried object, if any.
	pub fn key(&self) -> Option<IdentityKey> {
		self.object().map(Identifiable::identity_key)
	}
}
