//! Error types shared by every stage of the pipeline
//!
//!     Every error carries a kind, a message, and (once known) the template name and line
//!     number. That triple is the stable contract callers format for display. Errors raised
//!     deep inside the runtime usually don't know where they happened; the statement that
//!     was executing attaches its location on the way out (see [`Error::with_location`]).
//!
//!     Parse and compile errors are never recovered internally: they abort compilation and
//!     nothing is cached for the failed template.

use std::fmt;

/// The error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed token or grammar: unterminated block, unexpected tag, delimiter mismatch.
    SyntaxError,
    /// Structurally valid but semantically invalid source (duplicate block, unknown filter).
    AssertionError,
    /// Deferred use of a missing value.
    UndefinedError,
    /// Raised while rendering from user-triggered conditions.
    RuntimeError,
    /// A loader could not resolve a template name.
    TemplateNotFound,
    /// An operator or method was applied to unsupported operand types.
    InvalidOperation,
    /// A host value could not be converted into a template value.
    BadSerialization,
    /// Settings could not be loaded or deserialized.
    Config,
}

impl ErrorKind {
    pub fn description(self) -> &'static str {
        match self {
            ErrorKind::SyntaxError => "syntax error",
            ErrorKind::AssertionError => "assertion error",
            ErrorKind::UndefinedError => "undefined value",
            ErrorKind::RuntimeError => "runtime error",
            ErrorKind::TemplateNotFound => "template not found",
            ErrorKind::InvalidOperation => "invalid operation",
            ErrorKind::BadSerialization => "bad serialization",
            ErrorKind::Config => "configuration error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Where an error happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub name: Option<String>,
    pub line: Option<usize>,
    /// The extension tag whose hook failed, if any.
    pub tag: Option<String>,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, self.line) {
            (Some(name), Some(line)) => write!(f, " (in {}:{})", name, line),
            (Some(name), None) => write!(f, " (in {})", name),
            (None, Some(line)) => write!(f, " (line {})", line),
            (None, None) => Ok(()),
        }?;
        match &self.tag {
            Some(tag) => write!(f, " [tag '{}']", tag),
            None => Ok(()),
        }
    }
}

/// The error type returned by every fallible operation in this crate.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}{location}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    location: Location,
    source_context: Option<String>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
            location: Location::default(),
            source_context: None,
        }
    }

    pub fn syntax(message: impl Into<String>, line: usize) -> Self {
        Error::new(ErrorKind::SyntaxError, message).with_line(line)
    }

    pub fn assertion(message: impl Into<String>, line: usize) -> Self {
        Error::new(ErrorKind::AssertionError, message).with_line(line)
    }

    pub fn undefined(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::UndefinedError, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::RuntimeError, message)
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidOperation, message)
    }

    pub fn not_found(name: &str) -> Self {
        Error::new(
            ErrorKind::TemplateNotFound,
            format!("template {:?} does not exist", name),
        )
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn name(&self) -> Option<&str> {
        self.location.name.as_deref()
    }

    pub fn line(&self) -> Option<usize> {
        self.location.line
    }

    pub fn tag(&self) -> Option<&str> {
        self.location.tag.as_deref()
    }

    /// Numbered excerpt of the source around the failing line, if it was captured.
    pub fn source_context(&self) -> Option<&str> {
        self.source_context.as_deref()
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.location.line = Some(line);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.location.name = Some(name.into());
        self
    }

    /// Attribute the error to an extension tag, unless an inner hook already claimed it.
    pub fn with_tag(mut self, tag: &str) -> Self {
        if self.location.tag.is_none() {
            self.location.tag = Some(tag.to_string());
        }
        self
    }

    /// Fill in the location fields that are still missing. Inner frames win.
    pub fn with_location(mut self, name: Option<&str>, line: usize) -> Self {
        if self.location.line.is_none() {
            self.location.line = Some(line);
        }
        if self.location.name.is_none() {
            self.location.name = name.map(str::to_string);
        }
        self
    }

    /// Attach a numbered excerpt of `source` around the error line.
    pub fn with_source(mut self, source: &str) -> Self {
        if self.source_context.is_none() {
            if let Some(line) = self.location.line {
                self.source_context = Some(format_source_context(source, line));
            }
        }
        self
    }
}

/// Format source code context around an error location
///
/// Shows 2 lines before the error, the error line with >> marker, and 2 lines after.
/// `line` is 1-indexed, as carried by tokens.
pub fn format_source_context(source: &str, line: usize) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let error_line = line.saturating_sub(1);

    let start_line = error_line.saturating_sub(2);
    let end_line = (error_line + 3).min(lines.len());

    let mut context = String::new();
    for (line_num, text) in lines.iter().enumerate().take(end_line).skip(start_line) {
        let marker = if line_num == error_line { ">>" } else { "  " };
        context.push_str(&format!("{} {:3} | {}\n", marker, line_num + 1, text));
    }
    context
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::new(ErrorKind::Config, err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(ErrorKind::BadSerialization, err.to_string())
    }
}
