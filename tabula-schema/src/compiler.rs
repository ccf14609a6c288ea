//! The one-call compilation pipeline.
//!
//! A [`Compiler`] collects any number of inputs and then runs the phases
//! in order: link, recursion check, alias assignment, validation. Each
//! phase only runs if the ones before it recorded no error.
//!
//! ```rust
//! use tabula_schema::Compiler;
//!
//! let mut compiler = Compiler::new();
//! compiler.parse_str("db.ort", "struct user { field id int rowid; };");
//! let model = compiler.finish().unwrap();
//! assert_eq!(model.structs[0].name, "user");
//! ```

use std::path::Path;

use tracing::{info, warn};

use crate::config::CompilerConfig;
use crate::diag::{Diagnostics, Message, Position};
use crate::error::{SchemaError, SchemaResult};
use crate::model::Model;
use crate::parser::ParseContext;
use crate::{alias, linker, validator};

/// Compiles one or more schema inputs into a [`Model`].
#[derive(Debug, Default)]
pub struct Compiler {
    cx: ParseContext,
    warnings_as_errors: bool,
}

/// Everything a finished compilation produced, successful or not.
#[derive(Debug)]
pub struct Compilation {
    /// The model, complete only if `ok` is set.
    pub model: Model,
    /// Every message recorded by every phase.
    pub diag: Diagnostics,
    /// Whether no error was recorded.
    pub ok: bool,
}

impl Compilation {
    /// The model, or every error message wrapped in
    /// [`SchemaError::CompileFailed`].
    pub fn into_result(self) -> SchemaResult<Model> {
        if self.ok {
            Ok(self.model)
        } else {
            let errors = self
                .diag
                .into_messages()
                .into_iter()
                .filter(Message::is_error)
                .collect();
            Err(SchemaError::compile_failed(errors))
        }
    }
}

impl Compiler {
    /// Create a compiler with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compiler from the `[compiler]` table of a configuration.
    pub fn with_config(config: &CompilerConfig) -> Self {
        Self {
            cx: ParseContext::new().with_reserved(&config.compiler.extra_reserved),
            warnings_as_errors: config.compiler.warnings_as_errors,
        }
    }

    /// Treat warnings as errors when finishing.
    pub fn warnings_as_errors(mut self, yes: bool) -> Self {
        self.warnings_as_errors = yes;
        self
    }

    /// Parse one input held in memory.
    ///
    /// Returns `false` if the input recorded any error. After an input
    /// stops on a lexical error, later inputs are skipped and return `false`.
    pub fn parse_str(&mut self, fname: &str, src: &str) -> bool {
        if self.cx.has_lexical_error() {
            warn!(fname, "skipped input after lexical error");
            return false;
        }
        let clean = self.cx.parse(fname, src);
        info!(fname, clean, structs = self.cx.model.structs.len(), "parsed schema");
        clean
    }

    /// Read and parse one file.
    ///
    /// An unreadable file is recorded as a fatal message and also returned
    /// as [`SchemaError::IoError`].
    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> SchemaResult<bool> {
        let path = path.as_ref();
        let fname = path.display().to_string();
        match std::fs::read_to_string(path) {
            Ok(src) => Ok(self.parse_str(&fname, &src)),
            Err(e) => {
                self.cx.diag.fatal_io(Some(Position::file(fname.as_str())), &e);
                Err(SchemaError::io(fname, e))
            }
        }
    }

    /// Messages recorded so far.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.cx.diag
    }

    /// Run the remaining phases and keep everything they produced.
    pub fn compile(self) -> Compilation {
        let ParseContext {
            mut model,
            queue,
            mut diag,
            ..
        } = self.cx;

        let ok = !diag.has_errors() && run_phases(&mut model, &queue, &mut diag);
        if self.warnings_as_errors {
            diag.promote_warnings();
        }
        let ok = ok && !diag.has_errors();

        info!(
            ok,
            errors = diag.error_count(),
            warnings = diag.warning_count(),
            "compilation finished"
        );
        Compilation { model, diag, ok }
    }

    /// Run the remaining phases and return the linked, validated model.
    pub fn finish(self) -> SchemaResult<Model> {
        self.compile().into_result()
    }
}

fn run_phases(
    model: &mut Model,
    queue: &crate::resolve::ResolveQueue,
    diag: &mut Diagnostics,
) -> bool {
    if model.structs.is_empty() {
        diag.error_global("no structures in configuration");
        return false;
    }
    if !linker::link(model, queue, diag) {
        return false;
    }
    info!(
        structs = model.structs.len(),
        enums = model.enums.len(),
        bitfields = model.bitfields.len(),
        roles = model.roles.len(),
        "linked model"
    );
    validator::check_recursion(model, diag)
        && alias::assign(model, diag)
        && validator::validate(model, diag)
}
