//! SQL used by the settings store.

/// Name written into an empty `settings` table on first start.
pub const DEFAULT_NAME: &str = "Student";

/// Key for the transaction-scoped advisory lock taken while initializing,
/// so replicas starting together insert the default row only once.
pub const INIT_LOCK_KEY: i64 = 0x5345_5454_494e_4753;

/// Serializes initialization across replicas until the transaction ends.
pub const INIT_LOCK: &str = "SELECT pg_advisory_xact_lock($1)";

/// Settings table DDL.
pub const CREATE_SETTINGS: &str = r#"
CREATE TABLE IF NOT EXISTS settings (
    id SERIAL PRIMARY KEY,
    name VARCHAR(255) NOT NULL
)
"#;

/// Number of rows in the settings table.
pub const COUNT_SETTINGS: &str = "SELECT COUNT(*) FROM settings";

/// Insert one settings row with the given name.
pub const INSERT_SETTING: &str = "INSERT INTO settings (name) VALUES ($1)";

/// The first settings row by id.
pub const SELECT_SETTING: &str = "SELECT id, name FROM settings ORDER BY id LIMIT 1";

/// Trivial round trip used by the health check.
pub const PING: &str = "SELECT 1";
