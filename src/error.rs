use thiserror::Error as ThisError;

pub type OpaqueError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("invalid network {input:?}: {reason}")]
    InvalidNetwork { input: String, reason: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("probe mechanism unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Opaque(#[from] OpaqueError),
}
pub type Result<T> = std::result::Result<T, Error>;
