//! Lazy JSON-backed attribute bag.
//!
//! Each entity row carries an opaque text column holding a JSON object. The
//! store parses it on load, serves typed reads from the parsed mapping (with
//! a per-type defaults table backfilling fields older blobs lack), buffers
//! writes, and reconciles everything into a fresh blob when the entity is
//! saved.
//!
//! Reconciliation order is defaults, then stored fields, then in-memory
//! writes, so explicit writes always win and newly declared defaults are
//! retrofitted without clobbering live data.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::DomainError;

/// A JSON object keyed by field name.
pub type AttributeMap = Map<String, Value>;

/// Raw blob of an entity that has never been stored.
pub const EMPTY_BLOB: &str = "{}";

/// Converts a value to its attribute representation.
///
/// # Panics
///
/// Panics if `value`'s `Serialize` impl fails, which derived impls and the
/// std collection impls with string keys never do.
#[must_use]
pub fn to_attribute_value<T: Serialize + ?Sized>(value: &T) -> Value {
    // Serialization of derived Serialize types to Value is infallible.
    serde_json::to_value(value).expect("attribute serialization is infallible")
}

/// Parses a raw blob into an attribute mapping, `None` if it is not a JSON
/// object.
fn parse_blob(raw: &str) -> Option<AttributeMap> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Some(map),
        Ok(other) => {
            warn!(kind = json_kind(&other), "attribute blob is not a JSON object");
            None
        }
        Err(e) => {
            warn!(error = %e, "attribute blob is not valid JSON");
            None
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Materialized view over one entity's attribute blob.
#[derive(Debug, Clone)]
pub struct AttributeStore {
    /// Per-type defaults used to backfill absent fields.
    defaults: AttributeMap,
    /// Blob as it was last loaded or written by this store.
    loaded_raw: String,
    /// Blob as it currently sits in the row; differs from `loaded_raw` only
    /// after an out-of-band edit.
    raw: String,
    /// Parsed blob. `None` when the stored blob is corrupt.
    fields: Option<AttributeMap>,
    /// Writes made since the last load or save.
    writes: AttributeMap,
}

impl AttributeStore {
    /// Creates the store for an entity that has never been stored. All reads
    /// fall through to `defaults`.
    #[must_use]
    pub fn fresh(defaults: AttributeMap) -> Self {
        Self {
            defaults,
            loaded_raw: EMPTY_BLOB.to_owned(),
            raw: EMPTY_BLOB.to_owned(),
            fields: Some(AttributeMap::new()),
            writes: AttributeMap::new(),
        }
    }

    /// Materializes a stored blob. A corrupt blob is logged and leaves the
    /// mapping unset; reads of unwritten fields then fail until the next
    /// save repairs it.
    #[must_use]
    pub fn materialize(defaults: AttributeMap, raw: String) -> Self {
        let fields = parse_blob(&raw);
        if fields.is_none() {
            warn!("corrupt attribute blob; reads will fail until the entity is saved");
        }
        Self {
            defaults,
            loaded_raw: raw.clone(),
            raw,
            fields,
            writes: AttributeMap::new(),
        }
    }

    /// Replaces the defaults table. Fields already stored keep their values.
    pub fn declare_defaults(&mut self, defaults: AttributeMap) {
        self.defaults = defaults;
    }

    /// Returns the defaults table.
    #[must_use]
    pub fn defaults(&self) -> &AttributeMap {
        &self.defaults
    }

    /// Returns the raw blob currently held for the row.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns whether the stored blob failed to parse.
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        self.fields.is_none()
    }

    /// Returns whether there are writes not yet reconciled.
    #[must_use]
    pub fn has_pending_writes(&self) -> bool {
        !self.writes.is_empty()
    }

    /// Replaces the raw blob without going through the store, the way an
    /// administrator editing the column directly would.
    pub fn overwrite_raw(&mut self, raw: impl Into<String>) {
        self.raw = raw.into();
    }

    /// Returns the JSON value of `field`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CorruptState` if the field was not written and
    /// the stored blob is corrupt, or `DomainError::UnknownAttribute` if the
    /// field is neither written, stored nor declared.
    pub fn read_value(&self, field: &str) -> Result<&Value, DomainError> {
        if let Some(value) = self.writes.get(field) {
            return Ok(value);
        }
        let fields = self.fields.as_ref().ok_or_else(|| {
            DomainError::CorruptState(format!("cannot read `{field}`: attribute blob is corrupt"))
        })?;
        fields
            .get(field)
            .or_else(|| self.defaults.get(field))
            .ok_or_else(|| DomainError::UnknownAttribute(field.to_owned()))
    }

    /// Reads `field` as `T`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::read_value`], or
    /// `DomainError::CorruptState` if the value does not decode as `T`.
    pub fn read<T: DeserializeOwned>(&self, field: &str) -> Result<T, DomainError> {
        let value = self.read_value(field)?;
        serde_json::from_value(value.clone()).map_err(|e| {
            DomainError::CorruptState(format!("attribute `{field}` has an unexpected shape: {e}"))
        })
    }

    /// Buffers a write of `field`. Nothing is persisted until save.
    pub fn write<T: Serialize + ?Sized>(&mut self, field: &str, value: &T) {
        self.writes.insert(field.to_owned(), to_attribute_value(value));
    }

    /// Buffers several writes at once.
    pub fn write_all<I, K>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        for (field, value) in pairs {
            self.writes.insert(field.into(), value);
        }
    }

    /// Returns the merged mapping (defaults, stored fields, writes) without
    /// reconciling.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CorruptState` if the stored blob is corrupt.
    pub fn snapshot(&self) -> Result<AttributeMap, DomainError> {
        let fields = self.fields.as_ref().ok_or_else(|| {
            DomainError::CorruptState("attribute blob is corrupt".to_owned())
        })?;
        let mut merged = self.defaults.clone();
        merged.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged.extend(self.writes.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(merged)
    }

    /// Reconciles stored and in-memory state and returns the blob to
    /// persist.
    ///
    /// If the raw blob was changed out of band since load, a parsable blob
    /// replaces the materialized mapping; an unparsable one is ignored and
    /// the in-memory state wins. The result is defaults overlaid with the
    /// mapping overlaid with pending writes. Afterwards the store behaves as
    /// if the result had just been loaded.
    pub fn reconcile(&mut self) -> String {
        if self.raw != self.loaded_raw {
            warn!("attribute blob changed outside the store since load");
            match parse_blob(&self.raw) {
                Some(stored) => {
                    debug!("stored blob replaces materialized attributes");
                    self.fields = Some(stored);
                }
                None => {
                    warn!("out-of-band blob is unparsable; keeping in-memory attributes");
                }
            }
        }

        let mut merged = self.defaults.clone();
        if let Some(fields) = self.fields.take() {
            merged.extend(fields);
        }
        merged.extend(std::mem::take(&mut self.writes));

        let raw = Value::Object(merged.clone()).to_string();
        self.raw.clone_from(&raw);
        self.loaded_raw.clone_from(&raw);
        self.fields = Some(merged);
        raw
    }
}
