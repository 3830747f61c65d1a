use compact_str::CompactString;
use thiserror::Error;

/// Why a snapshot was left out of a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SnapshotError {
    #[error("snapshot has no bus id")]
    MissingId,
    #[error("bus {id} has non-positive capacity {capacity}")]
    InvalidCapacity { id: CompactString, capacity: i32 },
    #[error("bus {id} reported a non-finite coordinate")]
    InvalidLocation { id: CompactString },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FleetError {
    #[error("bus {0} not found")]
    BusNotFound(CompactString),
    #[error("driver {0} not found")]
    DriverNotFound(CompactString),
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("fleet data is mirrored from a remote feed and cannot be edited here")]
    ReadOnly,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("malformed ADMIN_CREDENTIALS entry {0:?}, expected user:password")]
    MalformedCredential(String),
    #[error("SUPABASE_URL and SUPABASE_KEY must be set together")]
    PartialSupabase,
    #[error("reading .env: {0}")]
    EnvFile(#[source] dotenvy::Error),
}
