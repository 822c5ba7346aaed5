//! Domain error types.

/// Top-level error type for evotrader.
#[derive(Debug, thiserror::Error)]
pub enum EvotraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("population is empty: {reason}")]
    EmptyPopulation { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EvotraderError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        EvotraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&EvotraderError> for std::process::ExitCode {
    fn from(err: &EvotraderError) -> Self {
        let code: u8 = match err {
            EvotraderError::Io(_) => 1,
            EvotraderError::ConfigParse { .. }
            | EvotraderError::ConfigMissing { .. }
            | EvotraderError::ConfigInvalid { .. } => 2,
            EvotraderError::Data { .. } | EvotraderError::InsufficientData { .. } => 3,
            EvotraderError::EmptyPopulation { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
