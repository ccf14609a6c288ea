//! # tabula-schema
//!
//! Front end of the tabula schema compiler.
//!
//! This crate provides:
//! - A lexer and recursive-descent parser for `.ort` schema files
//! - A linker resolving every by-name reference in ordered batches
//! - Join alias assignment and post-link validation
//! - A canonical printer and a per-role access audit of a linked model
//! - Change records between two linked models
//! - Configuration parsing for `tabula.toml`
//!
//! ## Example
//!
//! ```rust
//! use tabula_schema::Compiler;
//!
//! let mut compiler = Compiler::new();
//! compiler.parse_str("db.ort", r#"
//!     struct company {
//!         field id int rowid;
//!         field name text;
//!     };
//!     struct user {
//!         field id int rowid;
//!         field cid:company.id int;
//!         field company struct cid;
//!         search company.name: name bycompany;
//!     };
//! "#);
//!
//! let model = compiler.finish()?;
//! let user = model.find_struct("user").unwrap();
//! assert_eq!(model[user].alias("company"), Some("_a"));
//! # Ok::<(), tabula_schema::SchemaError>(())
//! ```

pub mod alias;
pub mod audit;
pub mod compiler;
pub mod config;
pub mod diag;
pub mod diff;
pub mod error;
pub mod lexer;
pub mod linker;
pub mod logging;
pub mod model;
pub mod parser;
pub mod resolve;
pub mod validator;
pub mod writer;

pub use audit::{AuditReport, audit};
pub use compiler::{Compilation, Compiler};
pub use config::CompilerConfig;
pub use diag::{Diagnostics, Message, Position, Severity};
pub use diff::{Change, SchemaDiff, diff};
pub use error::{SchemaError, SchemaResult};
pub use model::Model;
pub use parser::ParseContext;
pub use writer::write_model;
