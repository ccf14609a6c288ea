//! Struct bodies: queries, updates, deletes, uniques, inserts and grants.

use smol_str::SmolStr;

use super::{PResult, Parser, Stop};
use crate::diag::Position;
use crate::lexer::Token;
use crate::model::{
    AggrKind, Aggregate, Constraint, Distinct, FieldPath, Insert, Link, Modification, Modifier,
    Operator, OrderDir, OrderTerm, RoleMap, RoleMapKind, RoleRef, Search, SearchKind, SearchTerm,
    Struct, StructId, Unique, UniqueField, Update, UpdateKind,
};
use crate::resolve::{PathSlot, Resolve};

impl Parser<'_, '_> {
    /// `struct NAME { ... };`
    pub(super) fn structure(&mut self) -> PResult<()> {
        self.bump();
        let name = self.expect_ident("expected struct name")?;
        if !self.check_reserved(&name) || !self.check_toplevel_dupe(&name) {
            return Err(Stop::Skip);
        }
        let sid = self
            .cx
            .model
            .add_struct(Struct::new(name, self.pos.clone()));

        self.bump();
        if self.tok != Token::LBrace {
            return Err(self.fail("expected left brace"));
        }
        self.bump();

        loop {
            let result = match self.keyword().as_deref() {
                _ if self.tok == Token::RBrace => break,
                _ if self.tok.is_stop() => return Err(self.fail("expected right brace")),
                Some("comment") => self.struct_comment(sid),
                Some("search") => self.search(sid, SearchKind::Search),
                Some("count") => self.search(sid, SearchKind::Count),
                Some("list") => self.search(sid, SearchKind::List),
                Some("iterate") => self.search(sid, SearchKind::Iterate),
                Some("update") => self.update(sid, UpdateKind::Modify),
                Some("delete") => self.update(sid, UpdateKind::Delete),
                Some("insert") => self.insert(sid),
                Some("unique") => self.unique(sid),
                Some("roles") => self.grants(sid),
                Some("field") => self.field(sid),
                Some(_) => {
                    let word = self.tok.ident().unwrap_or_default().to_string();
                    Err(self.fail(format!("unknown statement type: {word}")))
                }
                None => Err(self.fail("expected statement type")),
            };
            self.clause(result)?;
        }
        self.bump();

        if self.cx.model[sid].fields.is_empty() {
            let pos = self.cx.model[sid].pos.clone();
            self.error_at(&pos, "no fields in struct");
        }
        self.expand_update_all(sid);
        self.expect_semi()
    }

    fn struct_comment(&mut self, sid: StructId) -> PResult<()> {
        let mut doc = self.cx.model[sid].doc.take();
        let result = self.comment(&mut doc);
        self.cx.model[sid].doc = doc;
        result?;
        self.expect_semi()
    }

    fn insert(&mut self, sid: StructId) -> PResult<()> {
        if self.cx.model[sid].insert.is_some() {
            return Err(self.fail("insert already defined"));
        }
        self.cx.model[sid].insert = Some(Insert {
            pos: self.pos.clone(),
            rolemap: None,
        });
        self.bump();
        self.expect_semi()
    }

    /// Updates with no listed fields modify every plain column.
    fn expand_update_all(&mut self, sid: StructId) {
        let model = &mut self.cx.model;
        let columns: Vec<_> = model[sid]
            .fields
            .iter()
            .copied()
            .filter(|&f| !model[f].rowid && !model[f].is_struct())
            .map(|f| (f, model[f].name.clone()))
            .collect();
        for uid in model[sid].updates.clone() {
            let up = &mut model[uid];
            if !up.modifiers.is_empty() {
                continue;
            }
            up.all = true;
            let pos = up.pos.clone();
            up.modifiers = columns
                .iter()
                .map(|(f, name)| Modification {
                    pos: pos.clone(),
                    name: name.clone(),
                    field: Link::Resolved(*f),
                    modifier: Modifier::Set,
                })
                .collect();
        }
    }

    // ==================== Queries ====================

    fn search(&mut self, sid: StructId, kind: SearchKind) -> PResult<()> {
        let mut srch = Search::new(sid, kind, self.pos.clone());
        let result = self.search_body(sid, &mut srch);

        let local = srch.distinct.as_ref().is_none_or(|d| d.path.components.is_empty());
        if local {
            match kind {
                SearchKind::List => self.cx.model[sid].has_queue = true,
                SearchKind::Iterate => self.cx.model[sid].has_iterator = true,
                _ => {}
            }
        }

        let id = self.cx.model.add_search(srch);
        let srch = &self.cx.model[id];
        let mut paths: Vec<(PathSlot, &FieldPath)> = Vec::new();
        paths.extend(srch.terms.iter().enumerate().map(|(i, t)| (PathSlot::Term(i), &t.path)));
        paths.extend(srch.order.iter().enumerate().map(|(i, o)| (PathSlot::Order(i), &o.path)));
        paths.extend(srch.aggregate.iter().map(|a| (PathSlot::Aggregate, &a.path)));
        paths.extend(srch.group.iter().map(|g| (PathSlot::Group, g)));
        paths.extend(
            srch.distinct
                .iter()
                .filter(|d| !d.path.components.is_empty())
                .map(|d| (PathSlot::Distinct, &d.path)),
        );
        let items: Vec<_> = paths
            .into_iter()
            .map(|(slot, p)| Resolve::Path {
                search: id,
                slot,
                names: p.components.clone(),
            })
            .collect();
        for item in items {
            self.cx.queue.push(item);
        }
        result
    }

    fn search_body(&mut self, sid: StructId, srch: &mut Search) -> PResult<()> {
        self.bump();
        if self.tok.ident().is_some() {
            loop {
                let path = self.field_path("expected field identifier")?;
                let mut op = Operator::Eq;
                if let Some(word) = self.keyword() {
                    op = Operator::from_keyword(&word).ok_or_else(|| self.fail("unknown operator"))?;
                    self.bump();
                }
                srch.terms.push(SearchTerm { path, op });
                match self.tok {
                    Token::Comma => self.bump(),
                    Token::Semicolon | Token::Colon => break,
                    _ => return Err(self.fail("expected field separator")),
                }
            }
        } else if !matches!(self.tok, Token::Semicolon | Token::Colon) {
            return Err(self.fail("expected field identifier"));
        }

        if self.tok == Token::Colon {
            self.search_params(sid, srch)?;
        }
        self.expect_semi()
    }

    /// Parameters after the `:` of a query, up to the closing `;`.
    fn search_params(&mut self, sid: StructId, srch: &mut Search) -> PResult<()> {
        self.bump();
        while self.tok != Token::Semicolon {
            match self.keyword().as_deref() {
                Some("name") => {
                    self.bump();
                    let name = self.expect_ident("expected query name")?;
                    let model = &self.cx.model;
                    let taken = model[sid]
                        .searches
                        .iter()
                        .any(|&s| model[s].name.as_deref() == Some(name.as_str()));
                    if taken {
                        let pos = self.pos.clone();
                        self.error_at(&pos, "duplicate query name");
                    }
                    if srch.name.is_some() {
                        self.warn("redeclaring name");
                    }
                    srch.name = Some(name);
                    self.bump();
                }
                Some("comment") => self.comment(&mut srch.doc)?,
                Some("limit") => self.limit(srch)?,
                Some(word @ ("minrow" | "maxrow")) => {
                    let kind = if word == "minrow" { AggrKind::MinRow } else { AggrKind::MaxRow };
                    if srch.aggregate.is_some() {
                        return Err(self.fail("redeclaring aggregate term"));
                    }
                    self.bump();
                    let path = self.field_path("expected aggregate identifier")?;
                    srch.aggregate = Some(Aggregate { path, kind });
                }
                Some("order") => {
                    self.bump();
                    loop {
                        let path = self.field_path("expected order identifier")?;
                        let dir = match self.keyword().as_deref().and_then(OrderDir::from_keyword) {
                            Some(dir) => {
                                self.bump();
                                dir
                            }
                            None => OrderDir::Asc,
                        };
                        srch.order.push(OrderTerm { path, dir });
                        if self.tok != Token::Comma {
                            break;
                        }
                        self.bump();
                    }
                }
                Some("grouprow") => {
                    if srch.group.is_some() {
                        return Err(self.fail("duplicate grouprow identifier"));
                    }
                    self.bump();
                    srch.group = Some(self.field_path("expected grouprow identifier")?);
                }
                Some("distinct") => {
                    if srch.distinct.is_some() {
                        return Err(self.fail("redeclaring distinct"));
                    }
                    self.bump();
                    srch.distinct = Some(if self.tok == Token::Period {
                        let path = FieldPath::new(self.pos.clone(), Default::default());
                        self.bump();
                        Distinct {
                            path,
                            target: Link::Resolved(sid),
                        }
                    } else {
                        Distinct {
                            path: self.field_path("expected distinct field")?,
                            target: Link::Pending,
                        }
                    });
                }
                Some(_) => return Err(self.fail("unknown search parameter")),
                None => return Err(self.fail("expected query parameter name")),
            }
        }

        match (&srch.group, &srch.aggregate) {
            (Some(group), None) => {
                let pos = group.pos.clone();
                self.error_at(&pos, "group without a constraint");
            }
            (None, Some(aggr)) => {
                let pos = aggr.path.pos.clone();
                self.error_at(&pos, "constraint without a group");
            }
            _ => {}
        }
        Ok(())
    }

    /// `limit N [, OFFSET]`
    fn limit(&mut self, srch: &mut Search) -> PResult<()> {
        self.bump();
        let Token::Integer(limit) = self.tok else {
            return Err(self.fail("expected limit value"));
        };
        if limit < 0 {
            return Err(self.fail("expected limit >=0"));
        }
        if srch.limit != 0 {
            self.warn("redeclaring limit");
        }
        srch.limit = limit;
        self.bump();
        if self.tok != Token::Comma {
            return Ok(());
        }

        self.bump();
        let Token::Integer(offset) = self.tok else {
            return Err(self.fail("expected offset value"));
        };
        if offset < 0 {
            return Err(self.fail("expected offset >=0"));
        }
        if srch.offset != 0 {
            self.warn("redeclaring offset");
        }
        srch.offset = offset;
        self.bump();
        Ok(())
    }

    // ==================== Updates ====================

    fn update(&mut self, sid: StructId, kind: UpdateKind) -> PResult<()> {
        let mut up = Update::new(sid, kind, self.pos.clone());
        let result = self.update_body(&mut up);
        let id = self.cx.model.add_update(up);

        let up = &self.cx.model[id];
        let items: Vec<_> = up
            .modifiers
            .iter()
            .enumerate()
            .map(|(index, m)| Resolve::Modifier {
                update: id,
                index,
                name: m.name.clone(),
            })
            .chain(up.constraints.iter().enumerate().map(|(index, c)| {
                Resolve::Constraint {
                    update: id,
                    index,
                    name: c.name.clone(),
                }
            }))
            .collect();
        for item in items {
            self.cx.queue.push(item);
        }
        result
    }

    fn update_body(&mut self, up: &mut Update) -> PResult<()> {
        self.bump();

        if up.kind == UpdateKind::Modify {
            match self.tok {
                Token::Colon => self.bump(),
                Token::Semicolon => return self.expect_semi(),
                _ => loop {
                    let pos = self.pos.clone();
                    let name = self.expect_ident("expected field to modify")?;
                    self.bump();
                    let mut modifier = Modifier::Set;
                    if let Some(word) = self.keyword() {
                        modifier = Modifier::from_keyword(&word).ok_or_else(|| self.fail("bad modifier"))?;
                        self.bump();
                    }
                    up.modifiers.push(Modification {
                        pos,
                        name,
                        field: Link::Pending,
                        modifier,
                    });
                    match self.tok {
                        Token::Comma => self.bump(),
                        Token::Colon => {
                            self.bump();
                            break;
                        }
                        Token::Semicolon => return self.expect_semi(),
                        _ => return Err(self.fail("expected separator")),
                    }
                },
            }
        }

        match self.tok {
            Token::Colon => {}
            Token::Semicolon => return self.expect_semi(),
            _ => loop {
                let pos = self.pos.clone();
                let name = self.expect_ident("expected constraint field")?;
                self.bump();
                let mut op = Operator::Eq;
                if let Some(word) = self.keyword() {
                    op = Operator::from_keyword(&word).ok_or_else(|| self.fail("unknown operator"))?;
                    self.bump();
                }
                up.constraints.push(Constraint {
                    pos,
                    name,
                    field: Link::Pending,
                    op,
                });
                match self.tok {
                    Token::Comma => self.bump(),
                    Token::Colon => break,
                    Token::Semicolon => return self.expect_semi(),
                    _ => return Err(self.fail("expected fields separator")),
                }
            },
        }

        self.bump();
        loop {
            match self.keyword().as_deref() {
                _ if self.tok == Token::Semicolon => return self.expect_semi(),
                Some("name") => {
                    self.bump();
                    up.name = Some(self.expect_ident("expected term name")?);
                    self.bump();
                }
                Some("comment") => self.comment(&mut up.doc)?,
                Some(_) => {
                    let word = self.tok.ident().unwrap_or_default().to_string();
                    return Err(self.fail(format!("unknown term: {word}")));
                }
                None => return Err(self.fail("expected terms")),
            }
        }
    }

    // ==================== Constraints ====================

    /// `unique a, b [, c ...];`
    fn unique(&mut self, sid: StructId) -> PResult<()> {
        let mut uq = Unique {
            parent: sid,
            pos: self.pos.clone(),
            fields: Vec::new(),
        };
        self.bump();
        loop {
            let pos = self.pos.clone();
            let name = self.expect_ident("expected unique field")?;
            uq.fields.push(UniqueField {
                pos,
                name,
                field: Link::Pending,
            });
            self.bump();
            match self.tok {
                Token::Comma => self.bump(),
                Token::Semicolon => break,
                _ => return Err(self.fail("expected semicolon or comma")),
            }
        }
        if uq.fields.len() < 2 {
            return Err(self.fail("at least two fields required for unique constraint"));
        }

        let names: Vec<SmolStr> = uq.fields.iter().map(|f| f.name.clone()).collect();
        let id = self.cx.model.add_unique(uq);
        for (index, name) in names.into_iter().enumerate() {
            self.cx.queue.push(Resolve::Unique {
                unique: id,
                index,
                name,
            });
        }
        self.expect_semi()
    }

    // ==================== Grants ====================

    /// `roles a, b { op [name]; ... };`
    fn grants(&mut self, sid: StructId) -> PResult<()> {
        self.bump();
        let mut roles = Vec::new();
        loop {
            let name = self.expect_ident("expected role name")?;
            if name == "none" {
                return Err(self.fail("cannot assign \"none\" role"));
            }
            roles.push((name, self.pos.clone()));
            self.bump();
            match self.tok {
                Token::Comma => self.bump(),
                Token::LBrace => break,
                _ => return Err(self.fail("expected comma")),
            }
        }
        self.bump();

        while self.tok != Token::RBrace {
            let result = self.grant(sid, &roles);
            self.clause(result)?;
        }
        self.bump();
        self.expect_semi()
    }

    fn grant(&mut self, sid: StructId, roles: &[(SmolStr, Position)]) -> PResult<()> {
        let word = self.expect_ident("expected role constraint type")?;
        let kind = RoleMapKind::from_keyword(&word)
            .ok_or_else(|| self.fail("unknown role constraint type"))?;
        self.bump();

        let mut name = None;
        if let Some(n) = self.lower_ident() {
            if matches!(kind, RoleMapKind::Insert | RoleMapKind::All) {
                return Err(self.fail("unexpected role constraint name"));
            }
            name = Some(n);
            self.bump();
        } else if !matches!(kind, RoleMapKind::Insert | RoleMapKind::NoExport | RoleMapKind::All) {
            return Err(self.fail("expected role constraint name"));
        }
        self.expect_semi()?;

        self.assign_roles(sid, kind, name, roles);
        Ok(())
    }

    /// Add roles to the grant for `(kind, name)`, creating it on first use.
    fn assign_roles(
        &mut self,
        sid: StructId,
        kind: RoleMapKind,
        name: Option<SmolStr>,
        roles: &[(SmolStr, Position)],
    ) {
        let model = &mut self.cx.model;
        let existing = model[sid]
            .rolemaps
            .iter()
            .copied()
            .find(|&r| model[r].kind == kind && model[r].name == name);
        let rm = match existing {
            Some(rm) => rm,
            None => {
                let pos = roles.first().map(|(_, p)| p.clone()).unwrap_or_default();
                let rm = model.add_rolemap(RoleMap::new(sid, kind, name, pos));
                model[sid].rolemaps.push(rm);
                self.cx.queue.push(Resolve::RoleMap { rolemap: rm });
                rm
            }
        };

        for (name, pos) in roles {
            let refs = &mut self.cx.model[rm].roles;
            refs.push(RoleRef {
                pos: pos.clone(),
                name: name.clone(),
                role: Link::Pending,
            });
            let index = refs.len() - 1;
            self.cx.queue.push(Resolve::Role {
                rolemap: rm,
                index,
                name: name.clone(),
            });
        }
    }
}
