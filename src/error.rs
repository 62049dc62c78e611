use std::{
    error::Error,
    fmt::{Display, Formatter},
};

/// Convenient result type for the whole crate.
pub type OaeLotsResult<T> = Result<T, Box<dyn Error + Send + Sync + 'static>>;

/**
 * A required input file, sheet, or column is missing.
 *
 * This is raised before any processing starts, so a run that fails with this error has done no
 * work and written no output.
 */
#[derive(Debug, Clone)]
pub struct InputError {
    pub msg: String,
}

impl InputError {
    pub fn new<S: Into<String>>(msg: S) -> Self {
        InputError { msg: msg.into() }
    }
}

impl Display for InputError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "incomplete input: {}", self.msg)
    }
}

impl Error for InputError {}

/**
 * An unexpected failure inside the analysis pipeline.
 *
 * Anything that isn't anticipated data noise (bad grades, unmatched keys, unreachable routes)
 * falls in this bucket. The run is aborted and no partial output is written.
 */
#[derive(Debug, Clone)]
pub struct PipelineError {
    pub msg: String,
}

impl PipelineError {
    pub fn new<S: Into<String>>(msg: S) -> Self {
        PipelineError { msg: msg.into() }
    }
}

impl Display for PipelineError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.msg)
    }
}

impl Error for PipelineError {}
