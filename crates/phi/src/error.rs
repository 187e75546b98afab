//! Error types for route registration.

use thiserror::Error;

/// Errors produced while parsing a routing pattern or grafting it onto
/// the routing tree.
///
/// Registration errors are misconfigurations: the [`Mux`](crate::Mux)
/// façade surfaces them as panics prefixed with `phi: ` so they fail the
/// program at startup rather than at request time.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The pattern does not start with `/`.
    #[error("routing pattern must begin with '/' in '{0}'")]
    PatternMissingLeadingSlash(String),

    /// A segment mixes literal bytes with `{`/`}`, or a brace is unbalanced.
    #[error("malformed parameter segment in '{0}'")]
    MalformedParam(String),

    /// A parameter name is empty or contains invalid characters.
    #[error("invalid parameter name '{name}' in '{pattern}'")]
    InvalidParamName { name: String, pattern: String },

    /// The same parameter name appears twice in one pattern.
    #[error("duplicate parameter name '{name}' in '{pattern}'")]
    DuplicateParamName { name: String, pattern: String },

    /// A `*` appears somewhere other than alone as the final segment.
    #[error("wildcard '*' must be the final segment in '{0}'")]
    WildcardNotLast(String),

    /// Two patterns place differently named parameters at the same
    /// position in the tree.
    #[error("parameter name conflict: '{new}' does not match existing '{existing}' at '{pattern}'")]
    ParamNameConflict {
        existing: String,
        new: String,
        pattern: String,
    },
}

/// Result type alias for registration operations.
pub type Result<T> = std::result::Result<T, RouterError>;
