//! Entity abstraction.
//!
//! An entity is a typed wrapper around a [`Record`]: id, version, creation
//! time, explicit key columns and the attribute store. Typed attribute
//! accessors are generated with [`attribute_schema!`](crate::attribute_schema).

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::attributes::{AttributeMap, AttributeStore};
use crate::error::DomainError;
use crate::ids::EntityId;
use crate::repository::{KeyValue, RowKeys, StoredRow};

/// Row-level state shared by every entity.
#[derive(Debug, Clone)]
pub struct Record {
    id: i64,
    version: i64,
    created_at: DateTime<Utc>,
    keys: RowKeys,
    attributes: AttributeStore,
}

impl Record {
    /// Creates the record of an entity that has not been stored yet.
    #[must_use]
    pub fn new(id: i64, keys: RowKeys, defaults: AttributeMap, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            version: 0,
            created_at,
            keys,
            attributes: AttributeStore::fresh(defaults),
        }
    }

    /// Materializes a stored row.
    #[must_use]
    pub fn from_row(row: StoredRow, defaults: AttributeMap) -> Self {
        Self {
            id: row.id,
            version: row.version,
            created_at: row.created_at,
            keys: row.keys,
            attributes: AttributeStore::materialize(defaults, row.attributes),
        }
    }

    /// Reconciles the attribute store and returns the row to write.
    pub fn to_row(&mut self) -> StoredRow {
        StoredRow {
            id: self.id,
            version: self.version,
            keys: self.keys.clone(),
            attributes: self.attributes.reconcile(),
            created_at: self.created_at,
        }
    }

    /// Records the version returned by a successful save.
    pub fn mark_saved(&mut self, version: i64) {
        self.version = version;
    }

    /// Raw identifier.
    #[must_use]
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Version of the last load or save (0 = never stored).
    #[must_use]
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Explicit key columns.
    #[must_use]
    pub fn keys(&self) -> &RowKeys {
        &self.keys
    }

    /// Reads an id-valued key column.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CorruptState` if the key is missing or not an id.
    pub fn key_id(&self, name: &str) -> Result<i64, DomainError> {
        self.keys
            .get(name)
            .and_then(KeyValue::as_id)
            .ok_or_else(|| {
                DomainError::CorruptState(format!("row {} has no id key `{name}`", self.id))
            })
    }

    /// Reads a text-valued key column.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CorruptState` if the key is missing or not text.
    pub fn key_text(&self, name: &str) -> Result<&str, DomainError> {
        self.keys
            .get(name)
            .and_then(KeyValue::as_text)
            .ok_or_else(|| {
                DomainError::CorruptState(format!("row {} has no text key `{name}`", self.id))
            })
    }

    /// The attribute store.
    #[must_use]
    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    /// The attribute store, mutably.
    pub fn attributes_mut(&mut self) -> &mut AttributeStore {
        &mut self.attributes
    }
}

/// Trait for persisted entities.
pub trait Entity: Sized + Send + Sync {
    /// Typed identifier.
    type Id: EntityId;

    /// Storage keyspace name.
    const KIND: &'static str = <Self::Id as EntityId>::KIND;

    /// Defaults backfilled into blobs that lack a declared field.
    fn attribute_defaults() -> AttributeMap;

    /// Wraps a loaded or freshly created record.
    fn from_record(record: Record) -> Self;

    /// The underlying record.
    fn record(&self) -> &Record;

    /// The underlying record, mutably.
    fn record_mut(&mut self) -> &mut Record;

    /// Checks structural invariants before a save.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvariantViolation` (or a read error) when the
    /// entity must not be persisted as is.
    fn validate(&self) -> Result<(), DomainError> {
        Ok(())
    }

    /// Typed identifier of this entity.
    fn id(&self) -> Self::Id {
        Self::Id::from_raw(self.record().id())
    }

    /// Plain JSON projection: every dynamic field, `id`, and each named key
    /// column (or `created_at`) in `extra`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CorruptState` for a corrupt blob and
    /// `DomainError::UnknownAttribute` for an unknown extra name.
    fn to_projection(&self, extra: &[&str]) -> Result<Value, DomainError> {
        let record = self.record();
        let mut projection = record.attributes().snapshot()?;
        projection.insert("id".to_owned(), Value::from(record.id()));
        for name in extra {
            let value = if *name == "created_at" {
                Value::from(record.created_at().to_rfc3339())
            } else {
                record
                    .keys()
                    .get(*name)
                    .map(KeyValue::to_json)
                    .ok_or_else(|| DomainError::UnknownAttribute((*name).to_owned()))?
            };
            projection.insert((*name).to_owned(), value);
        }
        Ok(Value::Object(projection))
    }
}

/// Generates the defaults table and typed accessors of an entity.
///
/// Each field is declared as `name: Type = default => [vis] fn setter`. The
/// getter is always public and returns `Result<Type, DomainError>`; the
/// setter buffers a write with the given visibility.
///
/// ```ignore
/// attribute_schema! {
///     Bounty {
///         coin: i64 = 0 => pub fn set_coin,
///         poster: Option<CharactorId> = None => pub fn set_poster,
///     }
/// }
/// ```
#[macro_export]
macro_rules! attribute_schema {
    (
        $entity:ty {
            $(
                $(#[$meta:meta])*
                $field:ident : $ty:ty = $default:expr => $setter_vis:vis fn $setter:ident
            ),* $(,)?
        }
    ) => {
        impl $entity {
            /// Defaults for every declared attribute.
            #[must_use]
            pub fn schema_defaults() -> $crate::attributes::AttributeMap {
                let mut defaults = $crate::attributes::AttributeMap::new();
                $(
                    let default: $ty = $default;
                    defaults.insert(
                        stringify!($field).to_owned(),
                        $crate::attributes::to_attribute_value(&default),
                    );
                )*
                defaults
            }

            $(
                $(#[$meta])*
                ///
                /// # Errors
                ///
                /// Returns `DomainError::CorruptState` if the stored value
                /// cannot be decoded.
                pub fn $field(&self) -> ::std::result::Result<$ty, $crate::error::DomainError> {
                    $crate::entity::Entity::record(self)
                        .attributes()
                        .read(stringify!($field))
                }

                #[doc = concat!("Buffers a write of `", stringify!($field), "`.")]
                #[allow(dead_code)]
                $setter_vis fn $setter(&mut self, value: $ty) {
                    $crate::entity::Entity::record_mut(self)
                        .attributes_mut()
                        .write(stringify!($field), &value);
                }
            )*
        }
    };
}
