use thiserror::Error;

/// Errors raised while building or controlling the receive chain.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid source, shape or rate combination found while building.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unknown option '{0}'")]
    UnknownOption(String),

    #[error("option '{option}' does not accept '{value}'")]
    InvalidOptionValue { option: String, value: String },

    #[error("frequency {0} Hz is not supported")]
    UnsupportedFrequency(i64),

    #[error("gain {0} is out of range")]
    UnsupportedGain(i32),

    #[error("receiver has already been built")]
    AlreadyBuilt,

    #[error("receiver has not been built")]
    NotBuilt,

    #[error("processor is already running")]
    Running,

    #[error("device error: {0}")]
    Device(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Wav(#[from] hound::Error),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
