use packed_struct::PackingError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid chip `{0}`, expected one of 0-3, a-d or A-D")]
    InvalidChip(String),

    #[error("invalid chip select `{0}`, expected a four bit mask like 0b0101 or 0xf")]
    InvalidChipSelect(String),

    #[error("invalid channel `{0}`, expected a chip letter followed by a lane number 1-4")]
    InvalidChannel(String),

    #[error("unknown test pattern `{0}`")]
    InvalidPattern(String),

    /// The register transport failed. Whatever multi-step protocol was running has been abandoned
    /// part way through, so the hardware is in an unknown state until it is calibrated again.
    #[error("register transport failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("couldn't pack register word: {0}")]
    Packing(#[from] PackingError),
}

impl Error {
    pub(crate) fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport(Box::new(err))
    }
}
