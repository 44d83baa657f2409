use thiserror::Error;

#[derive(Debug, Error)]
pub enum BwbError {
    #[error("phase not found: {0}")]
    PhaseNotFound(String),

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("section '{section}' not found in {document}")]
    SectionNotFound { section: String, document: String },

    #[error("field '{field}' missing or not a number in {document}")]
    InvalidField { field: String, document: String },

    #[error("invalid phase number '{0}': expected digits with an optional .N suffix")]
    InvalidPhaseNumber(String),

    #[error("invalid metadata key '{0}': must be alphanumeric with '-' or '_'")]
    InvalidKey(String),

    #[error("invalid JSON for {what}: {reason}")]
    InvalidPayload { what: String, reason: String },

    #[error("unknown schema '{name}' (available: {available})")]
    UnknownSchema { name: String, available: String },

    #[error("invalid value {value} for config key '{key}'")]
    InvalidConfigValue { key: String, value: String },

    #[error("unknown agent '{0}'")]
    UnknownAgent(String),

    #[error("missing required argument: {0}")]
    MissingArgument(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BwbError>;
