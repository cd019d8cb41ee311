use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("Payload is frozen, field with key {key} cannot be added to it")]
    PayloadFrozen { key: String },

    #[error("Key {key} is already set on this payload")]
    FieldAlreadyDefined { key: String },

    #[error("Cannot read source {path} for fingerprinting: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FingerprintError>;
