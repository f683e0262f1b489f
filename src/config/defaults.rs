pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: i64 = 3000;
pub const DEFAULT_RUST_LOG: &str = "info,pos_auth=info,tower_http=info,sea_orm=warn,sqlx=warn";
pub const DEFAULT_DB_MAX_CONNECTIONS: i64 = 10;
pub const DEFAULT_DB_MIN_IDLE: i64 = 2;
pub const DEFAULT_DB_SYNC_SCHEMA: bool = true;
pub const DEFAULT_ACCESS_TTL_SECS: i64 = 15 * 60;
pub const DEFAULT_REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60;
pub const DEFAULT_LEEWAY_SECS: i64 = 5;
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60 * 60;
/// Upper bound for any configured lifetime: ten years.
pub const MAX_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;
