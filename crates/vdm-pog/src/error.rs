//! Error types for obligation generation

use thiserror::Error;
use vdm_core::env::ResolveError;
use vdm_core::span::Span;

/// Result type for generation
pub type PogResult<T> = Result<T, PogError>;

/// Errors that abort obligation generation
///
/// Soundness gaps are not errors: those obligations are still emitted and
/// marked unchecked. These variants cover malformed input trees only.
#[derive(Debug, Error)]
pub enum PogError {
    /// Tree shape the type checker should have rejected
    #[error("internal error at {span}: {message}")]
    Structural { message: String, span: Span },

    /// Module environment could not be built
    #[error("name resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    /// Generation was cancelled between definitions
    #[error("generation cancelled")]
    Cancelled,
}

impl PogError {
    pub fn structural(message: impl Into<String>, span: Span) -> Self {
        PogError::Structural {
            message: message.into(),
            span,
        }
    }

    /// Get the span associated with this error, if any
    pub fn span(&self) -> Option<Span> {
        match self {
            PogError::Structural { span, .. } => Some(*span),
            PogError::Resolve(e) => Some(e.span()),
            PogError::Cancelled => None,
        }
    }
}
