/// Database primary key. Every table uses PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// UTC timestamp, the only flavor stored or compared anywhere.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
