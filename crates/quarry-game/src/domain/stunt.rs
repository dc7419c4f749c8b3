//! The `MissionStunt` catalog entry.

use chrono::{DateTime, Utc};
use quarry_core::attribute_schema;
use quarry_core::attributes::AttributeMap;
use quarry_core::entity::{Entity, Record};
use quarry_core::error::DomainError;
use quarry_core::persistence;
use quarry_core::repository::RowKeys;
use serde::Deserialize;

use crate::domain::ids::StuntId;

/// Something a prey can be photographed doing.
#[derive(Debug)]
pub struct MissionStunt {
    record: Record,
}

attribute_schema! {
    MissionStunt {
        /// Description, e.g. "eating a banana".
        text: String = String::new() => fn set_text,
    }
}

/// One entry of a YAML stunt catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct StuntEntry {
    /// Stunt description.
    pub text: String,
}

/// Parses a YAML catalog of the form `- text: ...`.
///
/// # Errors
///
/// Returns `DomainError::Validation` for malformed YAML or a blank entry.
pub fn parse_catalog(yaml: &str) -> Result<Vec<StuntEntry>, DomainError> {
    let entries: Vec<StuntEntry> = serde_yaml::from_str(yaml)
        .map_err(|e| DomainError::Validation(format!("invalid stunt catalog: {e}")))?;
    if let Some(position) = entries.iter().position(|e| e.text.trim().is_empty()) {
        return Err(DomainError::Validation(format!(
            "stunt catalog entry {position} has no text"
        )));
    }
    Ok(entries)
}

impl MissionStunt {
    /// Builds an unsaved catalog entry.
    #[must_use]
    pub fn new(id: StuntId, text: &str, created_at: DateTime<Utc>) -> Self {
        let record = persistence::new_record::<Self>(id, RowKeys::new(), created_at);
        let mut stunt = Self::from_record(record);
        stunt.set_text(text.trim().to_owned());
        stunt
    }
}

impl Entity for MissionStunt {
    type Id = StuntId;

    fn attribute_defaults() -> AttributeMap {
        Self::schema_defaults()
    }

    fn from_record(record: Record) -> Self {
        Self { record }
    }

    fn record(&self) -> &Record {
        &self.record
    }

    fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }
}
