use cfgldr_parser::ParseError;
use cfgldr_verify::VerificationError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Anything that can go wrong while loading a configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration or schema document could not be parsed
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The configuration does not satisfy the schema
    #[error(transparent)]
    Verification(#[from] VerificationError),
}

impl Error {
    pub fn is_verification(&self) -> bool {
        matches!(self, Error::Verification(_))
    }

    pub fn as_parse(&self) -> Option<&ParseError> {
        match self {
            Error::Parse(e) => Some(e),
            Error::Verification(_) => None,
        }
    }

    pub fn as_verification(&self) -> Option<&VerificationError> {
        match self {
            Error::Verification(e) => Some(e),
            Error::Parse(_) => None,
        }
    }
}
