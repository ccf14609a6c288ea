//! Position-tagged diagnostics collected across a compilation run.
//!
//! Every phase writes into one [`Diagnostics`] sink. Warnings never affect
//! the outcome; any error or fatal message makes the run unsuccessful, but
//! collection continues so that a single run surfaces as many problems as
//! possible.

use std::fmt;

use serde::Serialize;
use smol_str::SmolStr;

/// A point in an input file.
///
/// Lines count from 1 and columns from 1. A line of 0 means the position
/// names only the file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Position {
    /// Name of the input file.
    pub fname: SmolStr,
    /// Line number.
    pub line: usize,
    /// Column number.
    pub column: usize,
}

impl Position {
    /// Create a new position.
    pub fn new(fname: impl Into<SmolStr>, line: usize, column: usize) -> Self {
        Self {
            fname: fname.into(),
            line,
            column,
        }
    }

    /// A position naming only a file.
    pub fn file(fname: impl Into<SmolStr>) -> Self {
        Self::new(fname, 0, 0)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.fname)
        } else {
            write!(f, "{}:{}:{}", self.fname, self.line, self.column)
        }
    }
}

/// Message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Does not affect the outcome.
    Warning,
    /// Invalidates the model; collection continues.
    Error,
    /// Resource or I/O failure; the current phase stops.
    Fatal,
}

impl Severity {
    /// The word used when printing a message.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operating-system error attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemError {
    /// Raw OS error number, when the platform supplied one.
    pub code: Option<i32>,
    /// Human-readable description.
    pub description: String,
}

impl From<&std::io::Error> for SystemError {
    fn from(err: &std::io::Error) -> Self {
        Self {
            code: err.raw_os_error(),
            description: err.to_string(),
        }
    }
}

/// One diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    /// Severity of the message.
    pub severity: Severity,
    /// Where the problem was found, if anywhere in particular.
    pub position: Option<Position>,
    /// Message text.
    pub text: String,
    /// System error, for I/O and allocation failures.
    pub system: Option<SystemError>,
}

impl Message {
    /// Create a message without a system error.
    pub fn new(severity: Severity, position: Option<Position>, text: impl Into<String>) -> Self {
        Self {
            severity,
            position,
            text: text.into(),
            system: None,
        }
    }

    /// Whether this message makes the run unsuccessful.
    pub fn is_error(&self) -> bool {
        self.severity >= Severity::Error
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(pos) = &self.position {
            write!(f, "{pos}: ")?;
        }
        write!(f, "{}", self.severity)?;
        if !self.text.is_empty() {
            write!(f, ": {}", self.text)?;
        }
        if let Some(sys) = &self.system {
            write!(f, ": {}", sys.description)?;
        }
        Ok(())
    }
}

impl std::error::Error for Message {}

impl miette::Diagnostic for Message {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match self.severity {
            Severity::Warning => "tabula::schema::warning",
            Severity::Error => "tabula::schema::error",
            Severity::Fatal => "tabula::schema::fatal",
        };
        Some(Box::new(code))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(match self.severity {
            Severity::Warning => miette::Severity::Warning,
            Severity::Error | Severity::Fatal => miette::Severity::Error,
        })
    }
}

/// Ordered message sink shared by every phase of a run.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    messages: Vec<Message>,
}

impl Diagnostics {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message, mirroring it to the tracing subscriber.
    pub fn push(&mut self, msg: Message) {
        match msg.severity {
            Severity::Warning => tracing::warn!(target: "tabula::diag", "{msg}"),
            Severity::Error | Severity::Fatal => tracing::error!(target: "tabula::diag", "{msg}"),
        }
        self.messages.push(msg);
    }

    /// Record a warning.
    pub fn warn(&mut self, pos: &Position, text: impl Into<String>) {
        self.push(Message::new(Severity::Warning, Some(pos.clone()), text));
    }

    /// Record an error.
    pub fn error(&mut self, pos: &Position, text: impl Into<String>) {
        self.push(Message::new(Severity::Error, Some(pos.clone()), text));
    }

    /// Record an error that has no position.
    pub fn error_global(&mut self, text: impl Into<String>) {
        self.push(Message::new(Severity::Error, None, text));
    }

    /// Record a fatal I/O failure.
    pub fn fatal_io(&mut self, pos: Option<Position>, err: &std::io::Error) {
        let mut msg = Message::new(Severity::Fatal, pos, "");
        msg.system = Some(err.into());
        self.push(msg);
    }

    /// All messages in the order they were recorded.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Iterate over all messages.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Iterate over errors and fatals only.
    pub fn errors(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.is_error())
    }

    /// Iterate over warnings only.
    pub fn warnings(&self) -> impl Iterator<Item = &Message> {
        self.messages
            .iter()
            .filter(|m| m.severity == Severity::Warning)
    }

    /// Number of errors and fatals.
    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    /// Number of warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Whether any error or fatal has been recorded.
    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(Message::is_error)
    }

    /// Whether a fatal has been recorded.
    pub fn has_fatal(&self) -> bool {
        self.messages.iter().any(|m| m.severity == Severity::Fatal)
    }

    /// Turn every warning into an error.
    pub fn promote_warnings(&mut self) {
        for msg in &mut self.messages {
            if msg.severity == Severity::Warning {
                msg.severity = Severity::Error;
            }
        }
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Consume the sink, returning its messages.
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}
