use thiserror::Error;

/// Errors raised while building a vocabulary or normalizing annotations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    /// An object refers to a class name absent from the vocabulary.
    #[error("object {object} has class '{name}' which is not in the class vocabulary")]
    UnknownClass { object: usize, name: String },
    /// A bounding box coordinate is not numeric, or the box extent is inverted.
    #[error("object {object} has a malformed bounding box: {reason}")]
    MalformedAnnotation { object: usize, reason: String },
    /// The vocabulary lists a class name twice.
    #[error("class '{name}' appears more than once in the class vocabulary")]
    DuplicateClass { name: String },
}
