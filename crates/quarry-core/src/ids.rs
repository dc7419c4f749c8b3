//! Typed entity identifiers.
//!
//! Storage deals in raw `i64` ids scoped by an entity kind. Domain code uses
//! one newtype per entity so a `MissionId` can never be handed to a lookup
//! that expects a `CharactorId`.

use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Identifier newtype bound to a storage keyspace.
pub trait EntityId: Copy + Eq + Ord + Hash + Debug + Display + Send + Sync + 'static {
    /// Storage keyspace of the entity this id refers to.
    const KIND: &'static str;

    /// Wraps a raw storage id.
    fn from_raw(raw: i64) -> Self;

    /// Returns the raw storage id.
    fn raw(self) -> i64;
}

/// Declares an `i64` id newtype implementing [`EntityId`].
///
/// The newtype serializes transparently, so ids stored inside attribute
/// blobs are plain JSON numbers.
#[macro_export]
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident => $kind:literal) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $crate::ids::EntityId for $name {
            const KIND: &'static str = $kind;

            fn from_raw(raw: i64) -> Self {
                Self(raw)
            }

            fn raw(self) -> i64 {
                self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}
