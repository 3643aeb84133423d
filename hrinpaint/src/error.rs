use thiserror::Error;

/// The error type for `hrinpaint-burn` operations.
///
/// Numeric instability in the attention similarity and attention rows without any
/// eligible key are ruled out by construction, so they have no variant here. What
/// remains is configuration and shape validation, which fails before any tensor
/// computation starts.
#[derive(Error, Debug)]
pub enum InpaintError {
    /// Error for when an invalid model configuration is provided.
    #[error("Invalid model configuration: {reason}")]
    InvalidConfiguration {
        /// The reason why the configuration is invalid.
        reason: String,
    },

    /// Error for when input tensors disagree in rank, batch, channels or spatial size.
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// The expected tensor shape.
        expected: String,
        /// The actual tensor shape.
        actual: String,
    },

    /// Error for when a dimension is not a multiple of a required factor.
    #[error("{what} of size {size} is not divisible by {factor}")]
    IndivisibleShape {
        /// Which dimension failed the check.
        what: String,
        /// The offending size.
        size: usize,
        /// The factor it must be divisible by.
        factor: usize,
    },
}

/// A specialized `Result` type for `hrinpaint-burn` operations.
pub type InpaintResult<T> = Result<T, InpaintError>;

/// Returns `IndivisibleShape` unless `size` is a non-zero multiple of `factor`.
pub(crate) fn ensure_divisible(what: &str, size: usize, factor: usize) -> InpaintResult<()> {
    if factor == 0 || size == 0 || size % factor != 0 {
        tracing::warn!(what, size, factor, "dimension is not divisible");
        return Err(InpaintError::IndivisibleShape {
            what: what.to_string(),
            size,
            factor,
        });
    }
    Ok(())
}
