//! Canonical SQLite schema for the route store.
//!
//! - `cities` holds one row per network node; coordinates are nullable
//! - `routes` holds every transport link, including synthetic ones written
//!   by the connectivity service; parallel rows between the same pair are
//!   allowed
//! - `store_meta` tracks schema version and the last write for diagnostics

/// Migration v1: cities, routes, and store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS cities (
    city_id TEXT PRIMARY KEY CHECK (length(trim(city_id)) > 0),
    latitude REAL CHECK (latitude IS NULL OR (latitude BETWEEN -90.0 AND 90.0)),
    longitude REAL CHECK (longitude IS NULL OR (longitude BETWEEN -180.0 AND 180.0)),
    created_at_us INTEGER NOT NULL,
    CHECK ((latitude IS NULL) = (longitude IS NULL))
);

CREATE TABLE IF NOT EXISTS routes (
    route_id INTEGER PRIMARY KEY AUTOINCREMENT,
    from_city_id TEXT NOT NULL REFERENCES cities(city_id) ON DELETE CASCADE,
    to_city_id TEXT NOT NULL REFERENCES cities(city_id) ON DELETE CASCADE,
    weight REAL NOT NULL CHECK (weight >= 0.0),
    transport TEXT NOT NULL CHECK (length(trim(transport)) > 0),
    created_at_us INTEGER NOT NULL,
    CHECK (from_city_id <> to_city_id)
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    last_write_at_us INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO store_meta (
    id,
    schema_version,
    last_write_at_us
) VALUES (1, 1, 0);
";

/// Migration v2: read-path indexes for endpoint lookups.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_routes_from
    ON routes(from_city_id, to_city_id);

CREATE INDEX IF NOT EXISTS idx_routes_to
    ON routes(to_city_id, from_city_id);

CREATE INDEX IF NOT EXISTS idx_routes_transport
    ON routes(transport);
";
