use popclock_shared::{LookupError, SupportedCountry, TrackError};

/// Failures a country data source can report.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    #[error("data source unavailable: {0}")]
    Unavailable(String),

    #[error("no usable population data for {0}")]
    InsufficientData(String),
}

impl SourceError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn insufficient(country: impl Into<String>) -> Self {
        Self::InsufficientData(country.into())
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        Self::Unavailable(e.to_string())
    }
}

pub type ClockResult<T> = Result<T, ClockError>;

/// Every failure here is recoverable: the caller shows a message and the
/// clock's state is unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClockError {
    #[error("\"{input}\" is not a recognized country")]
    NotFound {
        input: String,
        suggestions: Vec<SupportedCountry>,
    },

    #[error("{0} is already in the list")]
    AlreadyTracked(SupportedCountry),

    #[error("data source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("no usable population data for {0}")]
    InsufficientData(String),
}

impl ClockError {
    /// "Did you mean" candidates; empty for every other kind.
    pub fn suggestions(&self) -> &[SupportedCountry] {
        match self {
            Self::NotFound { suggestions, .. } => suggestions,
            _ => &[],
        }
    }
}

impl From<LookupError> for ClockError {
    fn from(e: LookupError) -> Self {
        match e {
            LookupError::NotFound { input, suggestions } => Self::NotFound { input, suggestions },
        }
    }
}

impl From<TrackError> for ClockError {
    fn from(e: TrackError) -> Self {
        match e {
            TrackError::AlreadyTracked(country) => Self::AlreadyTracked(country),
        }
    }
}

impl From<SourceError> for ClockError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::Unavailable(msg) => Self::SourceUnavailable(msg),
            SourceError::InsufficientData(country) => Self::InsufficientData(country),
        }
    }
}
