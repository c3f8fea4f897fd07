//! Error kinds and annotated-message formatting (`spec.md` §7).

use std::fmt;

use strum::{Display as StrumDisplay, EnumString};

use crate::ast::CodeLoc;

pub(crate) type EvalResult<T> = Result<T, SlipError>;

/// The broad error family a host distinguishes on (`spec.md` §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, EnumString)]
pub(crate) enum ErrorKind {
    ParseError,
    PathNotFound,
    TypeError,
    RuntimeError,
    IsADirectoryError,
    CancellationError,
}

/// One frame of the evaluator's call stack, recorded for error annotation.
#[derive(Debug, Clone)]
pub(crate) struct Frame {
    pub name: String,
    pub callee: String,
    pub loc: Option<CodeLoc>,
}

/// A SLIP runtime error, carrying enough context to render an
/// `ouros`-style annotated message: kind, message, source location, and the
/// frame chain active when it was raised.
#[derive(Debug, Clone)]
pub(crate) struct SlipError {
    pub kind: ErrorKind,
    pub message: String,
    pub loc: Option<CodeLoc>,
    pub frames: Vec<Frame>,
}

impl SlipError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            loc: None,
            frames: Vec::new(),
        }
    }

    pub fn path_not_found(key: &str) -> Self {
        Self::new(ErrorKind::PathNotFound, format!("path not found: {key}"))
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RuntimeError, message)
    }

    pub fn is_a_directory(path: &str) -> Self {
        Self::new(ErrorKind::IsADirectoryError, format!("is a directory: {path}"))
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::CancellationError, "task cancelled")
    }

    pub fn ambiguous_method_call(name: &str) -> Self {
        Self::new(ErrorKind::TypeError, format!("ambiguous-method-call: {name}"))
    }

    pub fn no_matching_method(name: &str) -> Self {
        Self::new(ErrorKind::TypeError, format!("no-matching-method: {name}"))
    }

    #[must_use]
    pub fn with_loc(mut self, loc: Option<CodeLoc>) -> Self {
        if self.loc.is_none() {
            self.loc = loc;
        }
        self
    }

    /// Pushes a stack frame onto the error as it unwinds through a call.
    #[must_use]
    pub fn with_frame(mut self, frame: Frame) -> Self {
        self.frames.push(frame);
        self
    }

    /// Renders the host-facing `stderr`/`outcome` message: source line,
    /// caret pointer, and frame chain (`spec.md` §7).
    pub fn formatted(&self) -> String {
        let mut out = format!("{}: {}", self.kind, self.message);
        if let Some(loc) = &self.loc {
            out.push_str(&format!("\n  at line {}, col {}: {}", loc.line, loc.col, loc.text));
            out.push('\n');
            out.push_str(&" ".repeat(4 + loc.col as usize));
            out.push('^');
        }
        for frame in &self.frames {
            out.push_str(&format!("\n  in {} (called as {})", frame.name, frame.callee));
        }
        out
    }
}

impl fmt::Display for SlipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

impl std::error::Error for SlipError {}
