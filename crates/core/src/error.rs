use thiserror::Error;

/// Failures that abort a run before any file is touched.
#[derive(Debug, Error)]
pub enum RenamerError {
    #[error("invalid replace format: {0}, expected: old=new")]
    InvalidReplace(String),
    #[error("failed to compile {option} regex: {pattern}")]
    InvalidPattern {
        option: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("detect resolution is set, but {0} is not installed. Please install it to use this feature")]
    ProbeUnavailable(String),
    #[error("created date format is empty")]
    EmptyDateLayout,
}
