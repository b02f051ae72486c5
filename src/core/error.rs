use thiserror::Error;

/// Every failure the tracing engine can surface.
///
/// Variants split into integration errors (wiring defects the host must
/// fix) and operational errors (collector or transport trouble the host
/// may log and move past); see [`SpanlineError::is_integration_error`].
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum SpanlineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported statement representation: {0}")]
    UnsupportedStatement(String),

    #[error("Span lifecycle violation: {0}")]
    Lifecycle(String),

    #[error("Invalid span data: {0}")]
    InvalidSpan(String),

    #[error("Reporter error: {0}")]
    Report(String),

    #[error("Collector rejected spans: HTTP {status}")]
    CollectorRejected { status: u16 },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for spanline operations
pub type Result<T> = std::result::Result<T, SpanlineError>;

impl SpanlineError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new lifecycle error
    pub fn lifecycle<S: Into<String>>(msg: S) -> Self {
        Self::Lifecycle(msg.into())
    }

    /// Creates a new reporter error
    pub fn report<S: Into<String>>(msg: S) -> Self {
        Self::Report(msg.into())
    }

    /// Creates a new unsupported-statement error
    pub fn unsupported_statement<S: Into<String>>(msg: S) -> Self {
        Self::UnsupportedStatement(msg.into())
    }

    /// Returns true if this error indicates a wiring defect that should
    /// surface immediately rather than be swallowed by best-effort tracing.
    pub fn is_integration_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::UnsupportedStatement(_) | Self::Lifecycle(_)
        )
    }

    /// Returns the error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::ConfigParse(_) => "config",
            Self::UnsupportedStatement(_) => "statement",
            Self::Lifecycle(_) | Self::InvalidSpan(_) => "lifecycle",
            Self::Report(_) | Self::CollectorRejected { .. } | Self::Transport(_) => "transport",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
        }
    }
}
