//! Error types for the outer compilation API.
//!
//! Problems inside a schema are [`Message`](crate::diag::Message)s in the
//! diagnostics sink. [`SchemaError`] is what the fallible entry points return.

// These warnings are false positives - the fields are used by derive macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

use crate::diag::Message;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors returned by the compiler and configuration entry points.
#[derive(Error, Debug, Diagnostic)]
pub enum SchemaError {
    /// Error reading a file.
    #[error("failed to read file: {path}")]
    #[diagnostic(code(tabula::schema::io_error))]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    #[diagnostic(code(tabula::schema::config_error))]
    ConfigError { message: String },

    /// TOML parsing error.
    #[error("failed to parse TOML")]
    #[diagnostic(code(tabula::schema::toml_error))]
    TomlError {
        #[source]
        source: toml::de::Error,
    },

    /// No role with the requested name.
    #[error("role not found: {name}")]
    #[diagnostic(code(tabula::schema::unknown_role))]
    UnknownRole { name: String },

    /// Compilation recorded one or more errors.
    #[error("schema compilation failed with {count} error(s)")]
    #[diagnostic(code(tabula::schema::compile_failed))]
    CompileFailed {
        count: usize,
        #[related]
        errors: Vec<Message>,
    },
}

impl SchemaError {
    /// Create an I/O error for a path.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a compilation failure from the error messages of a run.
    pub fn compile_failed(errors: Vec<Message>) -> Self {
        Self::CompileFailed {
            count: errors.len(),
            errors,
        }
    }

    /// The messages carried by a compilation failure.
    pub fn messages(&self) -> &[Message] {
        match self {
            Self::CompileFailed { errors, .. } => errors,
            _ => &[],
        }
    }
}
