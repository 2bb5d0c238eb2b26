use thiserror::Error;

/// Failures the pipeline recovers from by showing less instead of halting.
///
/// Every variant is reported to the user as a warning while the rest of the
/// page keeps rendering; handlers substitute an empty collection where needed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to load dataset '{label}': {reason}")]
    Load { label: String, reason: String },

    #[error("dataset '{label}' has no valid fire perimeters")]
    EmptyResult { label: String },

    #[error("no '{attribute}' attribute in the loaded dataset")]
    MissingAttribute { attribute: String },
}
