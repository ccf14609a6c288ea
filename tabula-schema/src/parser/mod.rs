//! Recursive-descent parser for `.ort` schema files.
//!
//! The parser fills a [`ParseContext`] shared across every input of one
//! compilation. Names that refer to other entities are never looked up
//! here: each gets a [`Link::Pending`](crate::model::Link::Pending) slot
//! and a [`Resolve`](crate::resolve::Resolve) item in the context's queue.
//!
//! Errors are recorded in the context's [`Diagnostics`] and parsing
//! resumes at the next clause, so one run reports as much as it can.
//! Lexical errors stop the current input.

mod bitfield;
mod enm;
mod field;
mod roles;
mod strct;

use smallvec::SmallVec;
use smol_str::SmolStr;
use tracing::{debug, trace};

use crate::diag::{Diagnostics, Position};
use crate::lexer::{Lexer, Token};
use crate::model::{FieldPath, Label, Model};
use crate::resolve::ResolveQueue;

/// Identifiers that collide with keywords of C or SQLite.
pub const RESERVED: &[&str] = &[
    // C
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "enum",
    "extern", "float", "goto", "long", "register", "short", "signed", "static", "struct",
    "typedef", "union", "unsigned", "void", "volatile",
    // SQLite
    "abort", "action", "add", "after", "all", "alter", "analyze", "and", "as", "asc", "attach",
    "autoincrement", "before", "begin", "between", "by", "cascade", "case", "cast", "check",
    "collate", "column", "commit", "conflict", "constraint", "create", "cross", "current_date",
    "current_time", "current_timestamp", "database", "default", "deferrable", "deferred",
    "delete", "desc", "detach", "distinct", "drop", "each", "else", "end", "escape", "except",
    "exclusive", "exists", "explain", "fail", "for", "foreign", "from", "full", "glob", "group",
    "having", "if", "ignore", "immediate", "in", "index", "indexed", "initially", "inner",
    "insert", "instead", "intersect", "into", "is", "isnull", "join", "key", "left", "like",
    "limit", "match", "natural", "not", "notnull", "null", "of", "offset", "on", "or", "order",
    "outer", "plan", "pragma", "primary", "query", "raise", "recursive", "references", "regexp",
    "reindex", "release", "rename", "replace", "restrict", "right", "rollback", "row",
    "savepoint", "select", "set", "table", "temp", "temporary", "then", "to", "transaction",
    "trigger", "union", "unique", "update", "using", "vacuum", "values", "view", "virtual",
    "when", "where", "with", "without",
];

/// State shared by every input of one compilation.
///
/// Holds the growing model, the deferred lookups and the diagnostics.
/// Dropping it discards the whole compilation.
#[derive(Debug, Default)]
pub struct ParseContext {
    /// Model under construction.
    pub model: Model,
    /// Deferred lookups for the linker.
    pub queue: ResolveQueue,
    /// Messages recorded so far.
    pub diag: Diagnostics,
    extra_reserved: Vec<SmolStr>,
    lexical_error: bool,
}

impl ParseContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve additional identifiers, compared ignoring case.
    pub fn with_reserved<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extra_reserved
            .extend(words.into_iter().map(|w| SmolStr::new(w.as_ref())));
        self
    }

    /// Whether `name` is a reserved identifier.
    pub fn is_reserved(&self, name: &str) -> bool {
        RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
            || self
                .extra_reserved
                .iter()
                .any(|r| r.eq_ignore_ascii_case(name))
    }

    /// Whether an earlier input stopped on a lexical error.
    pub fn has_lexical_error(&self) -> bool {
        self.lexical_error
    }

    /// Parse one input into the context.
    ///
    /// Returns `false` if the input recorded any error. Once an input has
    /// stopped on a lexical error, later inputs are not read.
    pub fn parse(&mut self, fname: &str, src: &str) -> bool {
        if self.lexical_error {
            debug!(fname, "skipped input after lexical error");
            return false;
        }
        let before = self.diag.error_count();
        self.model.fnames.push(SmolStr::new(fname));
        Parser::new(self, fname, src).document();
        let clean = self.diag.error_count() == before;
        debug!(fname, clean, "parsed input");
        clean
    }
}

/// Why a sub-parser gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stop {
    /// Error recorded; skip to the end of the clause and continue.
    Skip,
    /// End of input or lexical error; stop parsing this input.
    Halt,
}

pub(crate) type PResult<T> = Result<T, Stop>;

/// Parser over one input, writing into a [`ParseContext`].
pub struct Parser<'src, 'cx> {
    lexer: Lexer<'src>,
    tok: Token,
    pos: Position,
    cx: &'cx mut ParseContext,
}

impl<'src, 'cx> Parser<'src, 'cx> {
    /// Create a parser over `src`, positioned before the first token.
    pub fn new(cx: &'cx mut ParseContext, fname: &str, src: &'src str) -> Self {
        let lexer = Lexer::new(fname, src);
        let pos = lexer.position();
        Self {
            lexer,
            tok: Token::Eof,
            pos,
            cx,
        }
    }

    // ==================== Tokens ====================

    /// Read the next token.
    fn bump(&mut self) {
        let (tok, pos) = self.lexer.next_token(&mut self.cx.diag);
        if tok == Token::Error {
            self.cx.lexical_error = true;
        }
        self.tok = tok;
        self.pos = pos;
    }

    /// Current token as a lowercased keyword.
    fn keyword(&self) -> Option<String> {
        self.tok.ident().map(str::to_ascii_lowercase)
    }

    fn is_kw(&self, kw: &str) -> bool {
        self.tok.is_keyword(kw)
    }

    /// Current identifier, lowercased.
    fn lower_ident(&self) -> Option<SmolStr> {
        self.tok.ident().map(|s| SmolStr::new(s.to_ascii_lowercase()))
    }

    /// Current identifier or an error.
    fn expect_ident(&mut self, text: &str) -> PResult<SmolStr> {
        match self.lower_ident() {
            Some(name) => Ok(name),
            None => Err(self.fail(text)),
        }
    }

    /// Consume a semicolon or fail with `text`.
    fn expect_semi(&mut self) -> PResult<()> {
        if self.tok != Token::Semicolon {
            return Err(self.fail("expected semicolon"));
        }
        self.bump();
        Ok(())
    }

    // ==================== Diagnostics ====================

    /// Record an error at the current token and decide how to continue.
    ///
    /// After a lexical error nothing is recorded, since the lexer already
    /// reported it.
    fn fail(&mut self, text: impl Into<String>) -> Stop {
        match self.tok {
            Token::Error => Stop::Halt,
            Token::Eof => {
                self.cx.diag.error(&self.pos, text);
                Stop::Halt
            }
            _ => {
                self.cx.diag.error(&self.pos, text);
                Stop::Skip
            }
        }
    }

    /// Record an error at `pos` without affecting control flow.
    fn error_at(&mut self, pos: &Position, text: impl Into<String>) {
        self.cx.diag.error(pos, text);
    }

    /// Record a warning at the current token.
    fn warn(&mut self, text: impl Into<String>) {
        self.cx.diag.warn(&self.pos, text);
    }

    /// Skip the rest of a failed clause.
    ///
    /// Stops after a `;` outside any nested braces, or before a `}` that
    /// closes the enclosing block.
    fn recover(&mut self) -> PResult<()> {
        let mut depth = 0usize;
        loop {
            match self.tok {
                Token::Eof | Token::Error => return Err(Stop::Halt),
                Token::LBrace => depth += 1,
                Token::RBrace if depth == 0 => return Ok(()),
                Token::RBrace => depth -= 1,
                Token::Semicolon if depth == 0 => {
                    self.bump();
                    return Ok(());
                }
                _ => {}
            }
            self.bump();
        }
    }

    /// Run a clause parser and recover from its failure.
    fn clause(&mut self, result: PResult<()>) -> PResult<()> {
        match result {
            Ok(()) => Ok(()),
            Err(Stop::Skip) => self.recover(),
            Err(Stop::Halt) => Err(Stop::Halt),
        }
    }

    // ==================== Shared Clauses ====================

    /// Reject reserved identifiers.
    fn check_reserved(&mut self, name: &str) -> bool {
        if self.cx.is_reserved(name) {
            self.cx.diag.error(&self.pos, "reserved identifier");
            return false;
        }
        true
    }

    /// Reject a name already used by a struct, enum or bitfield.
    fn check_toplevel_dupe(&mut self, name: &str) -> bool {
        let model = &self.cx.model;
        let prior = model
            .find_enum(name)
            .map(|e| ("enum", model[e].pos.clone()))
            .or_else(|| {
                model
                    .find_bitfield(name)
                    .map(|b| ("bitfield", model[b].pos.clone()))
            })
            .or_else(|| {
                model
                    .find_struct(name)
                    .map(|s| ("struct", model[s].pos.clone()))
            });
        match prior {
            Some((kind, pos)) => {
                let text = format!("duplicates {kind} name: {pos}");
                self.cx.diag.error(&self.pos, text);
                false
            }
            None => true,
        }
    }

    /// `comment "text"`, with the current token on `comment`.
    fn comment(&mut self, doc: &mut Option<String>) -> PResult<()> {
        self.bump();
        let Token::Literal(text) = self.tok.clone() else {
            return Err(self.fail("expected quoted string"));
        };
        if doc.is_some() {
            return Err(self.fail("duplicate comment"));
        }
        *doc = Some(text);
        self.bump();
        Ok(())
    }

    /// `jslabel[.lang] "text"`, with the current token on `jslabel`.
    fn label(&mut self, labels: &mut Vec<Label>) -> PResult<()> {
        self.bump();
        let mut lang = 0;
        if self.tok == Token::Period {
            self.bump();
            let Some(code) = self.lower_ident() else {
                return Err(self.fail("expected language"));
            };
            let langs = &mut self.cx.model.langs;
            lang = match langs.iter().position(|l| *l == code) {
                Some(i) => i,
                None => {
                    langs.push(code);
                    langs.len() - 1
                }
            };
            self.bump();
        }

        let Token::Literal(text) = self.tok.clone() else {
            return Err(self.fail("expected quoted string"));
        };
        if text.is_empty() {
            return Err(self.fail("label must be non-empty"));
        }
        if labels.iter().any(|l| l.lang == lang) {
            return Err(self.fail("duplicate label"));
        }
        labels.push(Label {
            text,
            lang,
            pos: self.pos.clone(),
        });
        self.bump();
        Ok(())
    }

    /// A dotted path `a.b.c`, with the current token on its first name.
    ///
    /// Leaves the token after the last component current.
    fn field_path(&mut self, missing: &str) -> PResult<FieldPath> {
        let pos = self.pos.clone();
        let first = self.expect_ident(missing)?;
        let mut components: SmallVec<[SmolStr; 4]> = SmallVec::new();
        components.push(first);
        self.bump();
        while self.tok == Token::Period {
            self.bump();
            components.push(self.expect_ident("expected field identifier")?);
            self.bump();
        }
        trace!(path = %components.join("."), "parsed field path");
        Ok(FieldPath::new(pos, components))
    }

    // ==================== Top Level ====================

    /// Parse every top-level construct until end of input.
    pub fn document(&mut self) {
        self.bump();
        loop {
            let result = match self.keyword().as_deref() {
                _ if self.tok.is_stop() => return,
                Some("roles") => self.roles_block(),
                Some("struct") => self.structure(),
                Some("enum") => self.enumeration(),
                Some("bits" | "bitfield") => self.bitfield(),
                Some(_) => Err(self.fail("unknown top-level type")),
                None => Err(self.fail("expected top-level type")),
            };
            let resumed = match result {
                Err(Stop::Skip) => self.recover().and_then(|()| {
                    // A stray closing brace cannot end anything here.
                    if self.tok == Token::RBrace {
                        self.bump();
                    }
                    Ok(())
                }),
                other => other,
            };
            if resumed.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Parse `src` into a fresh context.
    pub(crate) fn parse(src: &str) -> ParseContext {
        let mut cx = ParseContext::new();
        cx.parse("test.ort", src);
        cx
    }

    /// Error texts recorded while parsing `src`.
    pub(crate) fn errors(src: &str) -> Vec<String> {
        parse(src).diag.errors().map(|m| m.text.clone()).collect()
    }

    /// Warning texts recorded while parsing `src`.
    pub(crate) fn warnings(src: &str) -> Vec<String> {
        parse(src).diag.warnings().map(|m| m.text.clone()).collect()
    }

    // ==================== Top Level Tests ====================

    #[test]
    fn test_empty_input_is_clean() {
        let cx = parse("# nothing here\n");
        assert!(cx.diag.is_empty());
        assert_eq!(cx.model.fnames, vec![SmolStr::new("test.ort")]);
    }

    #[test]
    fn test_unknown_top_level() {
        assert_eq!(errors("table foo {};"), vec!["unknown top-level type"]);
        assert_eq!(errors("; struct"), vec!["expected top-level type", "expected struct name"]);
    }

    #[test]
    fn test_recovery_continues_with_next_construct() {
        let cx = parse(
            "widget x { a; b; };\n\
             struct user { field id int rowid; };",
        );
        assert_eq!(cx.diag.error_count(), 1);
        assert_eq!(cx.model.structs.len(), 1);
        assert_eq!(cx.model.structs[0].name, "user");
    }

    #[test]
    fn test_lexical_error_halts() {
        let cx = parse("struct user { field id int @; };\nstruct other { field id int; };");
        assert_eq!(cx.diag.error_count(), 1);
        assert_eq!(cx.diag.messages()[0].text, "unknown input token");
        assert_eq!(cx.model.structs.len(), 1);
    }

    #[test]
    fn test_inputs_after_lexical_error_are_skipped() {
        let mut cx = ParseContext::new();
        assert!(!cx.parse("a.ort", "struct a { field id int rowid @; };"));
        assert!(cx.has_lexical_error());
        assert!(!cx.parse("b.ort", "struct b { field id int rowid; };"));

        assert_eq!(cx.diag.error_count(), 1);
        assert_eq!(cx.model.fnames, vec![SmolStr::new("a.ort")]);
        assert_eq!(cx.model.structs.len(), 1);
    }

    #[test]
    fn test_syntax_error_does_not_skip_later_inputs() {
        let mut cx = ParseContext::new();
        assert!(!cx.parse("a.ort", "widget x;"));
        assert!(!cx.has_lexical_error());
        assert!(cx.parse("b.ort", "struct b { field id int rowid; };"));
        assert_eq!(cx.model.structs.len(), 1);
    }

    #[test]
    fn test_reserved_identifiers() {
        let mut cx = ParseContext::new().with_reserved(["widget"]);
        assert!(cx.is_reserved("SELECT"));
        assert!(cx.is_reserved("Widget"));
        assert!(!cx.is_reserved("user"));

        cx.parse("r.ort", "struct widget { field id int; };");
        assert_eq!(cx.diag.messages()[0].text, "reserved identifier");
    }

    #[test]
    fn test_duplicate_top_level_names() {
        let errs = errors(
            "enum kind { item a; };\n\
             struct Kind { field id int; };",
        );
        assert_eq!(errs, vec!["duplicates enum name: test.ort:1:6"]);
    }

    #[test]
    fn test_error_position_is_token_start() {
        let cx = parse("struct user\n  [");
        let msg = &cx.diag.messages()[0];
        assert_eq!(msg.text, "unknown input token");
        let pos = msg.position.as_ref().map(|p| (p.line, p.column));
        assert_eq!(pos, Some((2, 3)));
    }

    // ==================== Label Tests ====================

    #[test]
    fn test_labels_record_languages() {
        let cx = parse(
            "enum e {\n\
               item a jslabel \"A\" jslabel.DE \"Ah\" jslabel.fr \"Ä\";\n\
               item b jslabel.de \"Be\";\n\
             };",
        );
        assert!(cx.diag.is_empty());
        assert_eq!(
            cx.model.langs,
            vec![SmolStr::new(""), SmolStr::new("de"), SmolStr::new("fr")]
        );
        let langs: Vec<_> = cx.model.enums[0].items[0]
            .labels
            .iter()
            .map(|l| l.lang)
            .collect();
        assert_eq!(langs, vec![0, 1, 2]);
        assert_eq!(cx.model.enums[0].items[1].labels[0].lang, 1);
    }

    #[test]
    fn test_label_errors() {
        assert_eq!(
            errors("enum e { item a jslabel \"\"; };"),
            vec!["label must be non-empty"]
        );
        assert_eq!(
            errors("enum e { item a jslabel \"x\" jslabel \"y\"; };"),
            vec!["duplicate label"]
        );
        assert_eq!(
            errors("enum e { item a jslabel. \"x\"; };"),
            vec!["expected language"]
        );
    }
}
