//! Bitfields: `bits NAME { item NAME INDEX ...; };`

use super::{PResult, Parser, Stop};
use crate::lexer::Token;
use crate::model::{BitItem, Bitfield, BitfieldId};

impl Parser<'_, '_> {
    /// `bits NAME { ... };` or `bitfield NAME { ... };`
    pub(super) fn bitfield(&mut self) -> PResult<()> {
        self.bump();
        let name = self.expect_ident("expected bitfield name")?;
        if !self.check_toplevel_dupe(&name) || !self.check_reserved(&name) {
            return Err(Stop::Skip);
        }
        let bid = self
            .cx
            .model
            .add_bitfield(Bitfield::new(name, self.pos.clone()));

        self.bump();
        if self.tok != Token::LBrace {
            return Err(self.fail("expected left brace"));
        }
        self.bump();

        loop {
            let result = match self.keyword().as_deref() {
                _ if self.tok == Token::RBrace => break,
                _ if self.tok.is_stop() => return Err(self.fail("expected right brace")),
                Some("comment") => {
                    let mut doc = self.cx.model[bid].doc.take();
                    let result = self.comment(&mut doc);
                    self.cx.model[bid].doc = doc;
                    result.and_then(|()| self.expect_semi())
                }
                Some(kw @ ("isunset" | "unset")) => {
                    if kw == "unset" {
                        self.warn("\"unset\" is deprecated: use \"isunset\"");
                    }
                    let mut labels = std::mem::take(&mut self.cx.model[bid].unset_labels);
                    let result = self.label_list(&mut labels);
                    self.cx.model[bid].unset_labels = labels;
                    result
                }
                Some("isnull") => {
                    let mut labels = std::mem::take(&mut self.cx.model[bid].null_labels);
                    let result = self.label_list(&mut labels);
                    self.cx.model[bid].null_labels = labels;
                    result
                }
                Some("item") => self.bit_item(bid),
                Some(_) => Err(self.fail("unknown bitfield data type")),
                None => Err(self.fail("expected bitfield data type")),
            };
            self.clause(result)?;
        }
        self.bump();

        if self.cx.model[bid].items.is_empty() {
            let pos = self.cx.model[bid].pos.clone();
            self.error_at(&pos, "no items in bitfield");
        }
        self.expect_semi()
    }

    /// `item NAME INDEX [comment "..."] [jslabel "..."]* ;`
    fn bit_item(&mut self, bid: BitfieldId) -> PResult<()> {
        self.bump();
        let name = self.expect_ident("expected item name")?;
        if !self.check_reserved(&name) {
            return Err(Stop::Skip);
        }
        let taken = self.cx.model[bid]
            .items
            .iter()
            .any(|i| i.name.eq_ignore_ascii_case(&name));
        if taken {
            return Err(self.fail("duplicate item name"));
        }
        let pos = self.pos.clone();

        self.bump();
        let Token::Integer(index) = self.tok else {
            return Err(self.fail("expected item value"));
        };
        if !(0..64).contains(&index) {
            return Err(self.fail("bit index out of range"));
        }
        if self.cx.model[bid].items.iter().any(|i| i.index == index) {
            return Err(self.fail("duplicate item value"));
        }

        let mut item = BitItem {
            name,
            pos,
            doc: None,
            index,
            labels: Vec::new(),
        };
        self.bump();
        let result = self.bit_item_attrs(&mut item);
        self.cx.model[bid].items.push(item);
        result
    }

    fn bit_item_attrs(&mut self, item: &mut BitItem) -> PResult<()> {
        while self.tok != Token::Semicolon {
            match self.keyword().as_deref() {
                Some("comment") => self.comment(&mut item.doc)?,
                Some("jslabel") => self.label(&mut item.labels)?,
                _ => return Err(self.fail("unknown item data type")),
            }
        }
        self.bump();
        Ok(())
    }
}
