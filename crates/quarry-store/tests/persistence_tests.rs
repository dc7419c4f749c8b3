//! Integration tests for the typed persistence helpers, run against the
//! in-memory store.

use chrono::{TimeZone, Utc};
use quarry_core::attribute_schema;
use quarry_core::attributes::AttributeMap;
use quarry_core::entity::{Entity, Record};
use quarry_core::error::DomainError;
use quarry_core::persistence;
use quarry_core::repository::{EntityRepository, Filter, KeyValue, RowKeys, StoredRow};
use quarry_store::memory::InMemoryEntityRepository;
use quarry_test_support::init_test_tracing;
use serde_json::json;

quarry_core::entity_id!(
    /// Identifies a test lantern.
    LanternId => "lantern"
);

#[derive(Debug)]
struct Lantern {
    record: Record,
}

attribute_schema! {
    Lantern {
        /// Lamp oil left.
        oil: i64 = 10 => fn set_oil,
        /// Lit or not.
        lit: bool = false => pub fn set_lit,
    }
}

impl Lantern {
    fn burn(&mut self, amount: i64) -> Result<(), DomainError> {
        let oil = self.oil()?;
        self.set_oil(oil - amount);
        Ok(())
    }
}

impl Entity for Lantern {
    type Id = LanternId;

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

    fn validate(&self) -> Result<(), DomainError> {
        if self.oil()? < 0 {
            return Err(DomainError::InvariantViolation("oil below zero".into()));
        }
        Ok(())
    }
}

async fn create_lantern(repo: &InMemoryEntityRepository, shelf: i64) -> Lantern {
    let id = persistence::allocate_id::<Lantern>(repo).await.unwrap();
    let mut keys = RowKeys::new();
    keys.insert("shelf_id".to_owned(), KeyValue::Id(shelf));
    let created_at = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
    let record = persistence::new_record::<Lantern>(id, keys, created_at);
    let mut lantern = Lantern::from_record(record);
    persistence::save(repo, &mut lantern).await.unwrap();
    lantern
}

#[tokio::test]
async fn test_saved_entity_reloads_with_written_fields() {
    // Arrange
    init_test_tracing();
    let repo = InMemoryEntityRepository::new();
    let mut lantern = create_lantern(&repo, 1).await;

    // Act
    lantern.set_lit(true);
    lantern.burn(3).unwrap();
    persistence::save(&repo, &mut lantern).await.unwrap();
    let reloaded: Lantern = persistence::load(&repo, lantern.id()).await.unwrap();

    // Assert
    assert_eq!(reloaded.record().version(), 2);
    assert!(reloaded.lit().unwrap());
    assert_eq!(reloaded.oil().unwrap(), 7);
}

#[tokio::test]
async fn test_save_rejects_entity_breaking_its_invariants() {
    let repo = InMemoryEntityRepository::new();
    let mut lantern = create_lantern(&repo, 1).await;

    lantern.burn(11).unwrap();
    let result = persistence::save(&repo, &mut lantern).await;

    assert!(matches!(result, Err(DomainError::InvariantViolation(_))));
}

#[tokio::test]
async fn test_second_writer_from_same_version_conflicts() {
    // Arrange
    let repo = InMemoryEntityRepository::new();
    let lantern = create_lantern(&repo, 1).await;
    let mut first: Lantern = persistence::load(&repo, lantern.id()).await.unwrap();
    let mut second: Lantern = persistence::load(&repo, lantern.id()).await.unwrap();

    // Act
    first.set_lit(true);
    persistence::save(&repo, &mut first).await.unwrap();
    second.burn(1).unwrap();
    let result = persistence::save(&repo, &mut second).await;

    // Assert
    assert!(matches!(result, Err(DomainError::ConcurrencyConflict { .. })));
}

#[tokio::test]
async fn test_modify_applies_change_and_persists() {
    let repo = InMemoryEntityRepository::new();
    let lantern = create_lantern(&repo, 1).await;

    let updated: Lantern = persistence::modify(&repo, lantern.id(), 3, |l: &mut Lantern| l.burn(4))
        .await
        .unwrap();

    assert_eq!(updated.oil().unwrap(), 6);
    let reloaded: Lantern = persistence::load(&repo, lantern.id()).await.unwrap();
    assert_eq!(reloaded.oil().unwrap(), 6);
}

#[tokio::test]
async fn test_load_of_missing_entity_is_not_found() {
    let repo = InMemoryEntityRepository::new();

    let result = persistence::load::<Lantern>(&repo, LanternId(77)).await;

    assert!(matches!(
        result,
        Err(DomainError::EntityNotFound { kind: "lantern", id: 77 })
    ));
}

#[tokio::test]
async fn test_find_all_filters_by_foreign_key() {
    let repo = InMemoryEntityRepository::new();
    let a = create_lantern(&repo, 1).await;
    let _other_shelf = create_lantern(&repo, 2).await;
    let b = create_lantern(&repo, 1).await;

    let found: Vec<Lantern> = persistence::find_all(&repo, &Filter::by_id("shelf_id", 1))
        .await
        .unwrap();

    let ids: Vec<LanternId> = found.iter().map(Entity::id).collect();
    assert_eq!(ids, vec![a.id(), b.id()]);
}

#[tokio::test]
async fn test_old_blob_gains_new_defaults_on_load_and_save() {
    // Arrange: a row written before `lit` was declared.
    let repo = InMemoryEntityRepository::new();
    repo.put_raw(
        "lantern",
        StoredRow {
            id: 50,
            version: 4,
            keys: RowKeys::new(),
            attributes: r#"{"oil":2}"#.to_owned(),
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
        },
    )
    .unwrap();

    // Act
    let mut lantern: Lantern = persistence::load(&repo, LanternId(50)).await.unwrap();
    let lit = lantern.lit().unwrap();
    persistence::save(&repo, &mut lantern).await.unwrap();

    // Assert
    assert!(!lit);
    let stored = repo.load("lantern", 50).await.unwrap().unwrap();
    let blob: serde_json::Value = serde_json::from_str(&stored.attributes).unwrap();
    assert_eq!(blob, json!({ "oil": 2, "lit": false }));
    assert_eq!(stored.version, 5);
}

#[tokio::test]
async fn test_projection_includes_id_keys_and_dynamic_fields() {
    let repo = InMemoryEntityRepository::new();
    let lantern = create_lantern(&repo, 3).await;

    let projection = lantern.to_projection(&["shelf_id"]).unwrap();

    assert_eq!(
        projection,
        json!({ "id": lantern.id().0, "shelf_id": 3, "oil": 10, "lit": false })
    );
    assert!(matches!(
        lantern.to_projection(&["colour"]),
        Err(DomainError::UnknownAttribute(_))
    ));
}
