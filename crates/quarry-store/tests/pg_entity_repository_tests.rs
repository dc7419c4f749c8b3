//! Integration tests for `PgEntityRepository`.
//!
//! These need a PostgreSQL server reachable through `DATABASE_URL`; run
//! them with `cargo test -- --ignored`.

use chrono::{TimeZone, Utc};
use quarry_core::error::DomainError;
use quarry_core::repository::{EntityRepository, Filter, KeyValue, RowKeys, StoredRow};
use quarry_store::postgres::PgEntityRepository;
use sqlx::PgPool;

/// Helper to build a `StoredRow` with sensible defaults.
fn make_row(id: i64, game_id: i64) -> StoredRow {
    let mut keys = RowKeys::new();
    keys.insert("game_id".to_owned(), KeyValue::Id(game_id));
    keys.insert("name".to_owned(), KeyValue::Text(format!("row-{id}")));
    StoredRow {
        id,
        version: 0,
        keys,
        attributes: r#"{"coin":100}"#.to_owned(),
        created_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
    }
}

// --- load ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn test_load_returns_none_for_nonexistent_row(pool: PgPool) {
    let repo = PgEntityRepository::new(pool);

    let row = repo.load("charactor", 123).await.unwrap();

    assert!(row.is_none());
}

// --- save + load round-trip ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn test_insert_and_load_single_row(pool: PgPool) {
    let repo = PgEntityRepository::new(pool);
    let id = repo.next_id("charactor").await.unwrap();
    let row = make_row(id, 1);

    let version = repo.save("charactor", &row, 0).await.unwrap();

    assert_eq!(version, 1);
    let loaded = repo.load("charactor", id).await.unwrap().unwrap();
    assert_eq!(loaded.id, id);
    assert_eq!(loaded.version, 1);
    assert_eq!(loaded.keys, row.keys);
    assert_eq!(loaded.attributes, row.attributes);
    assert_eq!(loaded.created_at, row.created_at);
}

// --- concurrency ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn test_concurrency_conflict_on_stale_version(pool: PgPool) {
    let repo = PgEntityRepository::new(pool);
    let row = make_row(1, 1);
    repo.save("charactor", &row, 0).await.unwrap();
    repo.save("charactor", &row, 1).await.unwrap();

    let result = repo.save("charactor", &row, 1).await;

    match result {
        Err(DomainError::ConcurrencyConflict {
            expected, actual, ..
        }) => {
            assert_eq!(expected, 1);
            assert_eq!(actual, 2);
        }
        other => panic!("expected ConcurrencyConflict, got {other:?}"),
    }
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn test_update_of_missing_row_is_not_found(pool: PgPool) {
    let repo = PgEntityRepository::new(pool);

    let result = repo.save("charactor", &make_row(5, 1), 2).await;

    assert!(matches!(result, Err(DomainError::EntityNotFound { .. })));
}

// --- query ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn test_query_by_id_and_text_keys(pool: PgPool) {
    let repo = PgEntityRepository::new(pool);
    repo.save("charactor", &make_row(3, 1), 0).await.unwrap();
    repo.save("charactor", &make_row(1, 1), 0).await.unwrap();
    repo.save("charactor", &make_row(2, 2), 0).await.unwrap();

    let in_game = repo
        .query("charactor", &Filter::by_id("game_id", 1))
        .await
        .unwrap();
    let named = repo
        .query("charactor", &Filter::by_text("name", "row-2"))
        .await
        .unwrap();
    let all = repo.query("charactor", &Filter::All).await.unwrap();

    assert_eq!(in_game, vec![1, 3]);
    assert_eq!(named, vec![2]);
    assert_eq!(all, vec![1, 2, 3]);
}

// --- schema ---

#[sqlx::test(migrations = false)]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn test_ensure_schema_creates_table_and_is_idempotent(pool: PgPool) {
    let repo = PgEntityRepository::new(pool);

    repo.ensure_schema().await.unwrap();
    repo.ensure_schema().await.unwrap();

    let id = repo.next_id("game").await.unwrap();
    assert_eq!(repo.save("game", &make_row(id, 1), 0).await.unwrap(), 1);
}
