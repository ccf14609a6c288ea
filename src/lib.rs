//! # Tabula
//!
//! A schema compiler for relational data models.
//!
//! A tabula schema declares structs with typed fields, foreign references
//! between them, the queries, updates and deletes allowed on each struct,
//! and which roles may run them. Compiling one or more `.ort` files yields
//! a linked, validated [`Model`] that code generators consume.
//!
//! ## Quick Start
//!
//! ```rust
//! use tabula::prelude::*;
//!
//! let mut compiler = Compiler::new();
//! compiler.parse_str("blog.ort", r#"
//!     struct author {
//!         field id int rowid;
//!         field name text;
//!     };
//!     struct post {
//!         field id int rowid;
//!         field aid:author.id int;
//!         field author struct aid;
//!         list author.name: name byauthor;
//!     };
//! "#);
//!
//! let model = compiler.finish()?;
//! // Referenced structs come first.
//! let order: Vec<_> = model.ordered_structs().iter().map(|&s| model[s].name.clone()).collect();
//! assert_eq!(order, ["author", "post"]);
//! # Ok::<(), tabula::SchemaError>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Lexer, parser, linker and validator.
pub mod schema {
    pub use tabula_schema::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::schema::{
        Compilation, Compiler, CompilerConfig, Diagnostics, Message, Model, SchemaError,
        SchemaDiff, SchemaResult, audit, diff, write_model,
    };
}

// Re-export key types at the crate root
pub use schema::{Compiler, CompilerConfig, Model, SchemaError, SchemaResult};
