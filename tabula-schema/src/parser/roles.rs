//! The role tree: `roles { role NAME [comment "..."] [{ ... }]; };`

use super::{PResult, Parser, Stop};
use crate::lexer::Token;
use crate::model::RoleId;

/// Roles every role-based schema has, which may not be declared.
const BUILTIN_ROLES: [&str; 3] = ["none", "default", "all"];

impl Parser<'_, '_> {
    /// `roles { ... };`
    ///
    /// Declared roles descend from the built-in `all`.
    pub(super) fn roles_block(&mut self) -> PResult<()> {
        if self.cx.model.has_roles() {
            return Err(self.fail("roles already specified"));
        }
        let pos = self.pos.clone();
        let mut all = None;
        for name in BUILTIN_ROLES {
            all = Some(self.cx.model.add_role(name, None, pos.clone()));
        }

        self.bump();
        if self.tok != Token::LBrace {
            return Err(self.fail("expected left brace"));
        }
        self.role_list(all)?;
        self.expect_semi()
    }

    /// Roles up to and including the closing brace, with the current token
    /// on the opening one.
    fn role_list(&mut self, parent: Option<RoleId>) -> PResult<()> {
        self.bump();
        loop {
            match self.tok {
                Token::RBrace => break,
                _ if self.tok.is_stop() => return Err(self.fail("expected right brace")),
                _ => {
                    let result = self.role(parent);
                    self.clause(result)?;
                }
            }
        }
        self.bump();
        Ok(())
    }

    fn role(&mut self, parent: Option<RoleId>) -> PResult<()> {
        if !self.is_kw("role") {
            return Err(self.fail("expected \"role\""));
        }
        self.bump();
        let name = self.expect_ident("expected role name")?;
        if BUILTIN_ROLES.contains(&name.as_str()) {
            return Err(self.fail("reserved role name"));
        }
        if self.cx.model.find_role(&name).is_some() {
            return Err(self.fail("duplicate role name"));
        }
        if !self.check_reserved(&name) {
            return Err(Stop::Skip);
        }
        let rid = self.cx.model.add_role(name, parent, self.pos.clone());

        self.bump();
        if self.tok.ident().is_some() {
            if !self.is_kw("comment") {
                return Err(self.fail("expected comment"));
            }
            let mut doc = self.cx.model[rid].doc.take();
            let result = self.comment(&mut doc);
            self.cx.model[rid].doc = doc;
            result?;
        }
        if self.tok == Token::LBrace {
            self.role_list(Some(rid))?;
        }
        self.expect_semi()
    }
}
