//! Error types for the QGraphic front-end and interpreter.
//!
//! Two layers, mirroring the split between evaluator-internal errors and
//! the public API:
//!
//! - [`RunError`] is threaded through every statement and expression
//!   evaluator as the `Err` side of [`RunResult`]. Besides real failures it
//!   carries the stepping driver's cancellation signal, which unwinds the
//!   whole run without being observable by user code.
//! - [`Exception`] is what the public entry points return: an error kind,
//!   a message and the source position it was raised at.

use std::fmt;

use strum::{Display, EnumString, IntoStaticStr};

/// Result type alias for operations that can produce a runtime error.
pub(crate) type RunResult<T> = Result<T, RunError>;

/// The closed set of error kinds the implementation can surface.
///
/// Uses strum derives so the kind formats as its variant name exactly
/// (`InvalidFrameFormat` -> "InvalidFrameFormat").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum ExcKind {
    /// Unexpected character while tokenizing; carries line and column.
    LexError,
    /// Unexpected token or grammar mismatch; carries the offending line.
    ParseError,
    /// Any runtime failure: undefined name, type or arity mismatch, invalid
    /// assignment or pointer target, index out of range, and friends.
    RuntimeError,
    /// `.qgc` data with a bad magic header or a non-64x32 pixel grid.
    InvalidFrameFormat,
    /// Raw RGB565 frame whose length is not exactly 4096 bytes.
    InvalidRawFrameSize,
}

/// A failure escaping one of the public entry points.
///
/// Formats on one line as `Kind: message (line L, column C)` with the
/// position parts present when known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception {
    kind: ExcKind,
    message: String,
    line: Option<u32>,
    column: Option<u32>,
}

impl Exception {
    pub(crate) fn new(kind: ExcKind, message: impl Into<String>, line: Option<u32>, column: Option<u32>) -> Self {
        Self {
            kind,
            message: message.into(),
            line,
            column,
        }
    }

    /// A lex error at an exact line and column.
    pub(crate) fn lex(message: impl Into<String>, line: u32, column: u32) -> Self {
        Self::new(ExcKind::LexError, message, Some(line), Some(column))
    }

    /// A parse error tagged with the offending token's line.
    pub(crate) fn parse(message: impl Into<String>, line: u32) -> Self {
        Self::new(ExcKind::ParseError, message, Some(line), None)
    }

    /// A runtime error with no useful source position.
    pub(crate) fn runtime(message: impl Into<String>) -> Self {
        Self::new(ExcKind::RuntimeError, message, None, None)
    }

    /// An invalid `.qgc` payload.
    pub(crate) fn frame_format(message: impl Into<String>) -> Self {
        Self::new(ExcKind::InvalidFrameFormat, message, None, None)
    }

    /// A raw frame buffer of the wrong size.
    pub(crate) fn raw_frame_size(message: impl Into<String>) -> Self {
        Self::new(ExcKind::InvalidRawFrameSize, message, None, None)
    }

    #[must_use]
    pub fn kind(&self) -> ExcKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 1-based source line, when the error has one.
    #[must_use]
    pub fn line(&self) -> Option<u32> {
        self.line
    }

    /// 1-based source column; only lex errors carry one.
    #[must_use]
    pub fn column(&self) -> Option<u32> {
        self.column
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(line) = self.line {
            write!(f, " (line {line}")?;
            if let Some(column) = self.column {
                write!(f, ", column {column}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl std::error::Error for Exception {}

/// Evaluator-internal error, converted to [`Exception`] at the boundary.
///
/// `Stopped` is not an error in the user-visible sense: it is raised when a
/// [`StepTracer`](crate::step::StepTracer) answers
/// [`StepControl::Stop`](crate::step::StepControl) and unwinds every active
/// statement and call. User code cannot intercept it.
#[derive(Debug)]
pub(crate) enum RunError {
    Exc(Box<Exception>),
    Stopped,
}

impl RunError {
    /// A runtime error at the given source line.
    pub fn runtime(message: impl Into<String>, line: u32) -> Self {
        Self::Exc(Box::new(Exception::new(ExcKind::RuntimeError, message, Some(line), None)))
    }

    /// Wraps an exception from a collaborator (codec, publish handler),
    /// attaching `line` when the exception has no position of its own.
    pub fn at_line(exception: Exception, line: u32) -> Self {
        let mut exception = exception;
        if exception.line.is_none() {
            exception.line = Some(line);
        }
        Self::Exc(Box::new(exception))
    }
}

impl From<RunError> for Exception {
    fn from(err: RunError) -> Self {
        match err {
            RunError::Exc(exception) => *exception,
            // Stopped is handled by the Runner before conversion; mapping it
            // to a RuntimeError keeps the conversion total.
            RunError::Stopped => Self::runtime("execution stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_position() {
        let exc = Exception::lex("unexpected character '@'", 3, 7);
        assert_eq!(exc.to_string(), "LexError: unexpected character '@' (line 3, column 7)");
        let exc = Exception::parse("Expected '}'", 12);
        assert_eq!(exc.to_string(), "ParseError: Expected '}' (line 12)");
        let exc = Exception::frame_format("missing QGC1 magic");
        assert_eq!(exc.to_string(), "InvalidFrameFormat: missing QGC1 magic");
    }

    #[test]
    fn at_line_keeps_an_existing_position() {
        let inner = Exception::parse("bad", 4);
        let RunError::Exc(exc) = RunError::at_line(inner, 9) else {
            panic!("expected an exception");
        };
        assert_eq!(exc.line(), Some(4));
    }
}
