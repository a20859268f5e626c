/// Structural validation tests for the PostgreSQL migration file.
///
/// These check that the required tables, columns, and constraints are
/// present by inspecting the SQL text directly, without needing a live
/// database. Full migration execution is covered by the testcontainer-backed
/// tests in `scenarios.rs` and `http_surface.rs`.
const MIGRATION_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/migrations/0001_init.sql");

fn read_migration() -> String {
    std::fs::read_to_string(MIGRATION_PATH)
        .expect("migration file should exist at services/gateway/migrations/0001_init.sql")
}

#[test]
fn migration_file_exists_and_is_nonempty() {
    let sql = read_migration();
    assert!(!sql.trim().is_empty());
}

#[test]
fn contains_rooms_table() {
    let sql = read_migration();
    assert!(sql.contains("CREATE TABLE rooms"));
}

#[test]
fn contains_sessions_table() {
    let sql = read_migration();
    assert!(sql.contains("CREATE TABLE sessions"));
}

#[test]
fn contains_messages_table() {
    let sql = read_migration();
    assert!(sql.contains("CREATE TABLE messages"));
}

#[test]
fn rooms_has_unique_room_code() {
    let sql = read_migration();
    assert!(sql.contains("room_code TEXT NOT NULL UNIQUE"));
}

#[test]
fn rooms_has_sport_tag() {
    let sql = read_migration();
    assert!(sql.contains("sport_tag TEXT NOT NULL"));
}

#[test]
fn sessions_references_rooms() {
    let sql = read_migration();
    assert!(sql.contains("REFERENCES rooms(id) ON DELETE CASCADE"));
}

#[test]
fn sessions_unique_per_room_and_nickname() {
    let sql = read_migration();
    assert!(sql.contains("UNIQUE (room_id, nickname)"));
}

#[test]
fn sessions_has_game_time_and_elapsed_columns() {
    let sql = read_migration();
    for column in ["game_time_period", "game_time_minutes", "game_time_seconds", "elapsed_seconds"] {
        assert!(sql.contains(column), "sessions must have {column} column");
    }
}

#[test]
fn sessions_has_active_last_seen_index() {
    let sql = read_migration();
    assert!(sql.contains("sessions_active_last_seen_idx"));
}

#[test]
fn messages_references_rooms_and_sessions() {
    let sql = read_migration();
    assert!(sql.contains("REFERENCES rooms(id) ON DELETE CASCADE"));
    assert!(sql.contains("REFERENCES sessions(id) ON DELETE SET NULL"));
}

#[test]
fn messages_has_room_timestamp_index() {
    let sql = read_migration();
    assert!(sql.contains("messages_room_id_timestamp_idx"));
}

#[test]
fn all_three_tables_defined() {
    let sql = read_migration();
    for table in ["rooms", "sessions", "messages"] {
        assert!(sql.contains(&format!("CREATE TABLE {table}")), "migration must define {table} table");
    }
}
