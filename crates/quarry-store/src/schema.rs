//! Entity store database schema.

/// SQL to create the entities table and its id sequence.
pub const CREATE_ENTITIES_TABLE: &str = r"
CREATE SEQUENCE IF NOT EXISTS entity_ids;

CREATE TABLE IF NOT EXISTS entities (
    kind        VARCHAR(64) NOT NULL,
    id          BIGINT NOT NULL,
    version     BIGINT NOT NULL,
    keys        JSONB NOT NULL DEFAULT '{}'::jsonb,
    attributes  TEXT NOT NULL DEFAULT '{}',
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (kind, id)
);

CREATE INDEX IF NOT EXISTS idx_entities_keys
    ON entities USING GIN (keys);
";
