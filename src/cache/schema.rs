//! Database schema for the page cache

/// SQL schema for the cache database
pub const SCHEMA_SQL: &str = r#"
-- One row per normalized URL; replaced wholesale on every write
CREATE TABLE IF NOT EXISTS page_cache (
    url TEXT PRIMARY KEY,
    body TEXT NOT NULL,
    status_code INTEGER NOT NULL,
    content_type TEXT,
    load_time_ms INTEGER NOT NULL,
    fetched_at INTEGER NOT NULL,
    content_hash TEXT NOT NULL,
    metrics TEXT,
    -- URL the body was served from after redirects; NULL means same as url
    final_url TEXT
);

CREATE INDEX IF NOT EXISTS idx_page_cache_fetched_at ON page_cache(fetched_at);
"#;

/// Initializes the cache schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    add_final_url_column(conn)?;
    Ok(())
}

/// Upgrades cache files created before `final_url` was stored
fn add_final_url_column(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    let has_column: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM pragma_table_info('page_cache') WHERE name = 'final_url'",
        [],
        |row| row.get(0),
    )?;
    if !has_column {
        conn.execute_batch("ALTER TABLE page_cache ADD COLUMN final_url TEXT;")?;
    }
    Ok(())
}
