//! Error taxonomy and evaluation unwinding signals.
//!
//! [`CliError`] covers every genuine failure the engine can report.  Control
//! flow that is *not* an error (loop `break`/`continue`, tab-completion
//! candidates) travels in [`Unwind`], which sits in the error position of
//! evaluation results so that `?` unwinds it to the construct that handles it.

use std::fmt;

use thiserror::Error;

use crate::script::complete::Completions;

// ── Location ──────────────────────────────────────────────────────────────────

/// Source position of the statement that failed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    pub file: Option<String>,
    pub line: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{file}:{}", self.line),
            None => write!(f, "line {}", self.line),
        }
    }
}

// ── CliError ──────────────────────────────────────────────────────────────────

/// A failure raised while tokenizing, binding or evaluating a command line.
#[derive(Debug, Clone, Error)]
pub enum CliError {
    /// Malformed token stream: unterminated string or expression, stray punctuation.
    #[error("Syntax error: {0}")]
    Syntax(String),
    /// A token does not match the expected argument type.
    #[error("{0}")]
    Type(String),
    /// Missing, duplicate, surplus or mutually exclusive arguments.
    #[error("{0}")]
    Argument(String),
    /// A programmatic value outside the domain of its type.
    #[error("{0}")]
    Value(String),
    /// A name that resolves to no command, object or method.
    #[error("Unknown command '{0}'")]
    UnknownCommand(String),
    /// A name or registration that resolves to more than one meaning.
    #[error("{0}")]
    Ambiguous(String),
    /// Misuse of the language: `break` outside a loop, waits outside a branch.
    #[error("{0}")]
    Usage(String),
    /// Script-branch cancellation.  Never caught by `try` blocks.
    #[error("Interrupted")]
    Interrupted,
    /// Failure raised by a command implementation or by the host.
    #[error("{message}")]
    Runtime {
        message: String,
        traceback: Vec<String>,
    },
    #[error("{0}")]
    Io(String),
    /// Any of the above, tagged with the statement location.
    #[error("{loc}: {source}")]
    At {
        loc: Location,
        #[source]
        source: Box<CliError>,
    },
}

impl CliError {
    /// Shorthand for a host/command failure without a traceback.
    pub fn runtime(message: impl Into<String>) -> Self {
        CliError::Runtime { message: message.into(), traceback: Vec::new() }
    }

    /// The error without any location wrapper.
    pub fn inner(&self) -> &CliError {
        match self {
            CliError::At { source, .. } => source.inner(),
            other => other,
        }
    }

    /// Location of the failing statement, if one was attached.
    pub fn location(&self) -> Option<&Location> {
        match self {
            CliError::At { loc, .. } => Some(loc),
            _ => None,
        }
    }

    /// Attach a location unless one is already present.
    pub fn at(self, loc: Location) -> Self {
        match self {
            located @ CliError::At { .. } => located,
            CliError::Interrupted => CliError::Interrupted,
            other => CliError::At { loc, source: Box::new(other) },
        }
    }

    /// `true` for the quiet script-branch interruption.
    pub fn is_quiet(&self) -> bool {
        matches!(self.inner(), CliError::Interrupted)
    }

    /// `true` for the type-mismatch signal that polymorphic resolution retries on.
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self.inner(), CliError::Type(_))
    }

    /// Message text without the location prefix.
    pub fn message(&self) -> String {
        self.inner().to_string()
    }

    /// Traceback frames of a runtime failure (innermost last).
    pub fn traceback(&self) -> &[String] {
        match self.inner() {
            CliError::Runtime { traceback, .. } => traceback,
            _ => &[],
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e.to_string())
    }
}

// ── Unwind ────────────────────────────────────────────────────────────────────

/// Everything that can unwind an evaluation, errors and non-error signals alike.
#[derive(Debug)]
pub enum Unwind {
    Break,
    Continue,
    /// Tab completion reached the completion marker.
    Complete(Completions),
    Error(CliError),
}

impl From<CliError> for Unwind {
    fn from(e: CliError) -> Self {
        Unwind::Error(e)
    }
}

impl Unwind {
    /// Collapse into a [`CliError`] at a boundary where signals are not expected.
    pub fn into_error(self) -> CliError {
        match self {
            Unwind::Error(e) => e,
            Unwind::Break => CliError::Usage("'break' used outside of a loop".to_owned()),
            Unwind::Continue => CliError::Usage("'continue' used outside of a loop".to_owned()),
            Unwind::Complete(_) => CliError::Usage("unexpected completion request".to_owned()),
        }
    }
}

/// Result type of every evaluation step.
pub type EvalResult<T> = Result<T, Unwind>;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_is_attached_once() {
        let loc = Location { file: Some("a.simics".into()), line: 3 };
        let e = CliError::Syntax("bad".into()).at(loc.clone());
        let e = e.at(Location { file: None, line: 9 });
        assert_eq!(e.location(), Some(&loc));
        assert_eq!(e.to_string(), "a.simics:3: Syntax error: bad");
        assert_eq!(e.message(), "Syntax error: bad");
    }

    #[test]
    fn interruption_stays_quiet() {
        let e = CliError::Interrupted.at(Location::default());
        assert!(e.is_quiet());
        assert!(e.location().is_none());
    }

    #[test]
    fn type_mismatch_detected_through_location() {
        let e = CliError::Type("expected integer".into()).at(Location::default());
        assert!(e.is_type_mismatch());
    }

    #[test]
    fn loop_signals_become_usage_errors() {
        assert!(matches!(Unwind::Break.into_error(), CliError::Usage(_)));
        assert!(matches!(Unwind::Continue.into_error(), CliError::Usage(_)));
    }
}
