use crate::loader::LoadError;
use crate::spec::SpecError;
use crate::toolchain::ListingError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LocateError {
    #[error(transparent)]
    InvalidSpec(#[from] SpecError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Listing(#[from] ListingError),

    #[error("failed to find any exported {kind} in {package} for {pattern}")]
    NoMatch {
        kind: &'static str,
        package: String,
        pattern: String,
    },

    #[error("locating {kind}: failed to lookup: {package}")]
    Lookup { kind: &'static str, package: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("{}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<LocateError>),
}

impl LocateError {
    /// Collapses a list of errors: none is `Ok`, one is itself.
    pub fn from_many(mut errors: Vec<LocateError>) -> Result<(), LocateError> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(LocateError::Multiple(errors)),
        }
    }
}
