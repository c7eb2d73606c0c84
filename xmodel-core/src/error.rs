/// Error types surfaced by model loading
use thiserror::Error;

/// Why a model could not be produced for a source locator.
///
/// Cloneable so a single failed load can be handed to every caller that was
/// waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("couldn't load \"{locator}\": unknown object format {extension:?}")]
    UnknownFormat {
        locator: String,
        extension: Option<String>,
    },
    #[error("failed to fetch \"{locator}\": {reason}")]
    Fetch { locator: String, reason: String },
    #[error("failed to parse \"{locator}\": {reason}")]
    Parse { locator: String, reason: String },
    #[error("\"{0}\" contains no geometry")]
    EmptyModel(String),
}

impl LoadError {
    pub fn fetch(locator: &str, reason: impl ToString) -> Self {
        Self::Fetch {
            locator: locator.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(locator: &str, reason: impl ToString) -> Self {
        Self::Parse {
            locator: locator.to_string(),
            reason: reason.to_string(),
        }
    }

    /// The locator the failed request was made for.
    pub fn locator(&self) -> &str {
        match self {
            Self::UnknownFormat { locator, .. }
            | Self::Fetch { locator, .. }
            | Self::Parse { locator, .. } => locator,
            Self::EmptyModel(locator) => locator,
        }
    }
}

pub type LoadResult<T> = Result<T, LoadError>;

/// A model file that could not be decoded
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("file too small to be a valid STL")]
    TooSmall,
    #[error("unexpected end of file")]
    UnexpectedEof,
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("line {line}: index {index} is out of range")]
    IndexOutOfRange { line: usize, index: i64 },
}
