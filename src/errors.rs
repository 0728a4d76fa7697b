use thiserror::Error; // Import the `Error` derive macro from the `thiserror` crate

use crate::constraints::Constraints;

// Errors raised while parsing or evaluating an XPath expression
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    // The expression is not valid XPath, with the offending input and a reason
    #[error("invalid xpath `{expression}`: {reason}")]
    Syntax { expression: String, reason: String },

    // A function call names something the registry does not know
    #[error("unknown xpath function `{0}()`")]
    UnknownFunction(String),

    // A known function was called with the wrong number of arguments
    #[error("xpath function `{name}()` takes {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },

    // The expression evaluates to something other than a set of nodes
    #[error("xpath `{0}` does not select nodes")]
    NotANodeSet(String),
}

/// A verdict that did not have the expected polarity.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct Mismatch {
    pub expression: String,
    pub constraints: Constraints,
    pub message: String,
}

// Everything an assertion (or an inspection block) can fail with
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssertError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Mismatch(#[from] Mismatch),

    // No subject was passed and the document source had nothing to offer
    #[error("no current document to match against")]
    NoCurrentDocument,

    // Free-form failure raised from inside an inspection block
    #[error("{0}")]
    Failed(String),
}

impl AssertError {
    pub fn failed(message: impl Into<String>) -> Self {
        AssertError::Failed(message.into())
    }

    /// True when this is an ordinary verdict mismatch rather than a broken query.
    pub fn is_mismatch(&self) -> bool {
        matches!(self, AssertError::Mismatch(_))
    }
}

// Type alias for results that use `QueryError` as the error type
pub type Result<T> = std::result::Result<T, QueryError>;
