use thiserror::Error;

/// Failure of a single call against `kubectl` or `gcloud`.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}: {stderr}")]
    CommandFailed { program: String, status: String, stderr: String },

    #[error("Unexpected {what} returned by the fleet or control plane: {detail}")]
    Malformed { what: String, detail: String },

    #[error("Failed to parse structured output: {0}")]
    Json(#[from] serde_json::Error),
}

impl GatewayError {
    /// Whether retrying the same call may succeed.
    ///
    /// A non-zero exit or a spawn failure is treated as transient. Output that
    /// cannot be understood is a broken discovery and is never retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Spawn { .. } | GatewayError::CommandFailed { .. })
    }

    pub fn malformed(what: impl Into<String>, detail: impl Into<String>) -> Self {
        GatewayError::Malformed { what: what.into(), detail: detail.into() }
    }
}

/// Unrecoverable failure of a cycling run. Every variant terminates the process with a non-zero exit.
#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse configuration JSON: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("'{operation}' failed after {attempts} attempts: {last}")]
    RetriesExhausted { operation: String, attempts: u32, last: GatewayError },

    #[error("'{operation}' failed permanently: {source}")]
    Gateway {
        operation: String,
        #[source]
        source: GatewayError,
    },

    #[error("Instance group '{group}' reported an unusable target size: {detail}")]
    InvalidTargetSize { group: String, detail: String },

    #[error("Zone distribution {distribution} is not balanced across {required} zones")]
    ZoneImbalance { distribution: String, required: usize },

    #[error("Unrecognized created-by reference '{0}'")]
    UnrecognizedCreatedBy(String),

    #[error("No {role} nodes carry retirement tag '{tag}'")]
    EmptyBatch { role: String, tag: String },

    #[error("Node '{node}' has no {attribute}")]
    MissingNodeAttribute { node: String, attribute: &'static str },

    #[error("Timed out after {waited_secs}s waiting for {condition}")]
    ConvergenceTimeout { condition: String, waited_secs: u64 },

    #[error("Forced pod deletion on node '{node}' failed: {reason}")]
    ForceEvictionFailed { node: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_process_failures_are_transient() {
        let failed = GatewayError::CommandFailed { program: "kubectl".into(), status: "exit status: 1".into(), stderr: "boom".into() };
        assert!(failed.is_transient());
        assert!(!GatewayError::malformed("targetSize", "\"abc\"").is_transient());
    }
}
