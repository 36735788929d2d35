use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Failures acquiring or analysing local/remote media.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("stream has no audio track: {0}")]
    NoAudioTrack(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("constraints unsatisfiable: {0}")]
    ConstraintsUnsatisfiable(String),

    #[error("device error: {0}")]
    DeviceError(String),
}

/// Failures raised by the peer-to-peer media transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("negotiation error: {0}")]
    Negotiation(String),

    #[error("statistics error: {0}")]
    Stats(String),

    #[error("transport closed")]
    Closed,

    #[error("reconnect budget exhausted after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },
}

/// Failures raised by the shared presence datastore.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("write rejected: {0}")]
    Rejected(String),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("datastore unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum HuddleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
