//! The `Player` entity: a person who can play many games.

use chrono::{DateTime, TimeDelta, Utc};
use quarry_core::attribute_schema;
use quarry_core::attributes::AttributeMap;
use quarry_core::entity::{Entity, Record};
use quarry_core::error::DomainError;
use quarry_core::guard::{deny, ensure};
use quarry_core::persistence;
use quarry_core::repository::{KeyValue, RowKeys};
use sha2::{Digest, Sha256};

use crate::domain::ids::PlayerId;

/// Key column holding the unique player name.
pub const UNIQUE_NAME_KEY: &str = "unique_name";

/// A registered player.
#[derive(Debug)]
pub struct Player {
    record: Record,
}

attribute_schema! {
    Player {
        /// SHA-256 hex digest of the last issued auth token.
        last_auth_token: Option<String> = None => fn set_last_auth_token,
        /// When the last auth token was issued.
        last_auth_token_time: Option<DateTime<Utc>> = None => fn set_last_auth_token_time,
    }
}

fn digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

impl Player {
    /// Builds an unsaved player.
    #[must_use]
    pub fn new(id: PlayerId, unique_name: &str, created_at: DateTime<Utc>) -> Self {
        let mut keys = RowKeys::new();
        keys.insert(UNIQUE_NAME_KEY.to_owned(), KeyValue::Text(unique_name.to_owned()));
        Self::from_record(persistence::new_record::<Self>(id, keys, created_at))
    }

    /// The unique player name.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CorruptState` if the key column is missing.
    pub fn unique_name(&self) -> Result<&str, DomainError> {
        self.record.key_text(UNIQUE_NAME_KEY)
    }

    /// Checks whether `unique_name` can be registered.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Denied` for a blank or taken name.
    pub fn register_allowed(unique_name: &str, taken: bool) -> Result<(), DomainError> {
        ensure(!unique_name.trim().is_empty(), "register", "name must not be blank")?;
        ensure(!taken, "register", "name is already taken")
    }

    /// Remembers a freshly issued auth token. Only its digest is stored.
    pub fn issue_auth_token(&mut self, token: &str, now: DateTime<Utc>) {
        self.set_last_auth_token(Some(digest(token)));
        self.set_last_auth_token_time(Some(now));
    }

    /// Checks whether `token` is the last issued token and still valid.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Denied` for an unknown or expired token.
    pub fn authorize_allowed(
        &self,
        token: &str,
        now: DateTime<Utc>,
        ttl: TimeDelta,
    ) -> Result<(), DomainError> {
        let (Some(stored), Some(issued_at)) =
            (self.last_auth_token()?, self.last_auth_token_time()?)
        else {
            return Err(deny("authorize", "no token issued"));
        };
        ensure(stored == digest(token), "authorize", "token does not match")?;
        ensure(now - issued_at < ttl, "authorize", "token has expired")
    }
}

impl Entity for Player {
    type Id = PlayerId;

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
