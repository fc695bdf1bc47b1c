use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Errors raised by the telemetry listener itself.
///
/// Malformed packets are not represented here: they are answered on the wire
/// and skipped, never surfaced as an error to the caller.
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("failed to bind telemetry listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("telemetry listener stopped accepting: {0}")]
    Accept(#[source] std::io::Error),
}

/// Errors from the upstream reference/history provider.
///
/// These stay inside the upstream layer; callers above it see empty data, not
/// transport failures.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned status {status} for {endpoint}")]
    Status { endpoint: String, status: u16 },

    #[error("failed to decode upstream body for {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid date '{input}': expected YYYY-MM-DD")]
    InvalidDate { input: String },
}

pub type Result<T> = std::result::Result<T, Error>;
