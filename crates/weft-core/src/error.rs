//! Error types for weft.
//!
//! Every failure in weft is a configuration-time failure: it is raised while
//! middleware is being registered or while the pipeline is being composed,
//! never while a request is being served. Callers are expected to abort
//! startup when they see one.

use thiserror::Error;

/// Result type alias using [`PipelineError`].
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors raised while registering middleware or composing a pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Malformed registration input, such as an absent or non-unary
    /// conversion function.
    #[error("invalid argument `{argument}`: {reason}")]
    InvalidArgument {
        /// Name of the offending argument.
        argument: &'static str,
        /// Why the argument was rejected.
        reason: String,
    },

    /// An absent middleware object was passed to registration.
    #[error("middleware must not be absent")]
    MissingMiddleware,

    /// The middleware object matches none of the supported authoring patterns.
    #[error("unsupported middleware shape: `{type_name}` is not a callable, initializable, generator, or constructible middleware")]
    UnsupportedMiddlewareShape {
        /// Runtime type name of the rejected object.
        type_name: String,
    },

    /// A constructible middleware type has no constructor for the supplied
    /// extra arguments.
    #[error("no constructor on `{type_name}` takes the next stage plus {extra_args} extra argument(s)")]
    NoMatchingConstructor {
        /// The constructible type.
        type_name: String,
        /// Number of extra arguments that were supplied.
        extra_args: usize,
    },

    /// Neither one-hop nor two-hop conversion could produce the target shape.
    #[error("no conversion exists from `{source_type}` to `{target}`")]
    NoConversionPath {
        /// Runtime type of the value being converted.
        source_type: String,
        /// The requested shape.
        target: String,
    },

    /// An operation was invoked with arguments it cannot extract.
    #[error("operation `{operation}` cannot accept the {received} supplied argument(s)")]
    ArgumentMismatch {
        /// Name of the operation.
        operation: String,
        /// Number of arguments that were supplied.
        received: usize,
    },
}

impl PipelineError {
    /// Create an invalid argument error.
    pub fn invalid_argument(argument: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument,
            reason: reason.into(),
        }
    }

    /// Create an unsupported middleware shape error.
    pub fn unsupported_shape(type_name: impl Into<String>) -> Self {
        Self::UnsupportedMiddlewareShape {
            type_name: type_name.into(),
        }
    }

    /// Create a missing constructor error.
    pub fn no_matching_constructor(type_name: impl Into<String>, extra_args: usize) -> Self {
        Self::NoMatchingConstructor {
            type_name: type_name.into(),
            extra_args,
        }
    }

    /// Create a conversion failure error.
    pub fn no_conversion_path(source_type: impl Into<String>, target: impl Into<String>) -> Self {
        Self::NoConversionPath {
            source_type: source_type.into(),
            target: target.into(),
        }
    }

    /// Create an argument mismatch error.
    pub fn argument_mismatch(operation: impl Into<String>, received: usize) -> Self {
        Self::ArgumentMismatch {
            operation: operation.into(),
            received,
        }
    }
}
