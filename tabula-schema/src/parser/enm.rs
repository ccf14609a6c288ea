//! Enumerations: `enum NAME { item NAME [VALUE] ...; };`

use super::{PResult, Parser, Stop};
use crate::lexer::Token;
use crate::model::{Enum, EnumId, EnumItem, Label};

impl Parser<'_, '_> {
    /// `enum NAME { ... };`
    pub(super) fn enumeration(&mut self) -> PResult<()> {
        self.bump();
        let name = self.expect_ident("expected enum name")?;
        if !self.check_toplevel_dupe(&name) || !self.check_reserved(&name) {
            return Err(Stop::Skip);
        }
        let eid = self.cx.model.add_enum(Enum::new(name, self.pos.clone()));

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
                    let mut doc = self.cx.model[eid].doc.take();
                    let result = self.comment(&mut doc);
                    self.cx.model[eid].doc = doc;
                    result.and_then(|()| self.expect_semi())
                }
                Some("isnull") => {
                    let mut labels = std::mem::take(&mut self.cx.model[eid].null_labels);
                    let result = self.label_list(&mut labels);
                    self.cx.model[eid].null_labels = labels;
                    result
                }
                Some("item") => self.enum_item(eid),
                Some(_) => Err(self.fail("unknown enum attribute")),
                None => Err(self.fail("expected enum attribute")),
            };
            self.clause(result)?;
        }
        self.bump();

        self.assign_enum_values(eid);
        if self.cx.model[eid].items.is_empty() {
            let pos = self.cx.model[eid].pos.clone();
            self.error_at(&pos, "no items in enum");
        }
        self.expect_semi()
    }

    /// `jslabel ... ;` after a keyword such as `isnull`.
    pub(super) fn label_list(&mut self, labels: &mut Vec<Label>) -> PResult<()> {
        self.bump();
        while self.tok != Token::Semicolon {
            if !self.is_kw("jslabel") {
                return Err(self.fail("expected \"jslabel\""));
            }
            self.label(labels)?;
        }
        self.bump();
        Ok(())
    }

    /// `item NAME [VALUE] [comment "..."] [jslabel "..."]* ;`
    fn enum_item(&mut self, eid: EnumId) -> PResult<()> {
        self.bump();
        let name = self.expect_ident("expected enum item name")?;
        if !self.check_reserved(&name) {
            return Err(Stop::Skip);
        }
        if name == "format" {
            return Err(self.fail("cannot use reserved name"));
        }
        if self.cx.model[eid].item_index(&name).is_some() {
            return Err(self.fail("duplicate enum item name"));
        }

        let mut item = EnumItem {
            name,
            pos: self.pos.clone(),
            doc: None,
            value: 0,
            auto: true,
            labels: Vec::new(),
        };
        self.bump();
        let result = self.enum_item_body(eid, &mut item);
        // Kept even when an attribute fails, so later items see its name.
        self.cx.model[eid].items.push(item);
        result
    }

    fn enum_item_body(&mut self, eid: EnumId, item: &mut EnumItem) -> PResult<()> {
        if let Token::Integer(value) = self.tok {
            if value == i64::MAX || value == i64::MIN {
                return Err(self.fail("enum item value too big or small"));
            }
            let taken = self.cx.model[eid]
                .items
                .iter()
                .any(|i| !i.auto && i.value == value);
            if taken {
                return Err(self.fail("duplicate enum item value"));
            }
            item.value = value;
            item.auto = false;
            self.bump();
        }

        while self.tok != Token::Semicolon {
            match self.keyword().as_deref() {
                Some("comment") => self.comment(&mut item.doc)?,
                Some("jslabel") => self.label(&mut item.labels)?,
                _ => return Err(self.fail("unknown enum item attribute")),
            }
        }
        self.bump();
        Ok(())
    }

    /// Number the items without an explicit value.
    ///
    /// Counting starts one past the greatest explicit value, or at zero
    /// when there is none or it is negative.
    fn assign_enum_values(&mut self, eid: EnumId) {
        let items = &self.cx.model[eid].items;
        if !items.iter().any(|i| i.auto) {
            return;
        }
        let mut next = match items.iter().filter(|i| !i.auto).map(|i| i.value).max() {
            Some(max) if max >= 0 => max + 1,
            _ => 0,
        };

        let pos = self.cx.model[eid].pos.clone();
        for i in 0..self.cx.model[eid].items.len() {
            if !self.cx.model[eid].items[i].auto {
                continue;
            }
            if next == i64::MAX {
                self.error_at(&pos, "integer overflow when assigning dynamic enum value");
                return;
            }
            self.cx.model[eid].items[i].value = next;
            next += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{errors, parse};
    use pretty_assertions::assert_eq;

    fn values(src: &str) -> Vec<(String, i64, bool)> {
        let cx = parse(src);
        assert!(cx.diag.is_empty(), "{:?}", cx.diag.messages());
        cx.model.enums[0]
            .items
            .iter()
            .map(|i| (i.name.to_string(), i.value, i.auto))
            .collect()
    }

    #[test]
    fn test_enum_items_and_docs() {
        let cx = parse(
            "enum Status {\n\
               comment \"Account state.\";\n\
               item Active 1 comment \"In use.\" jslabel \"Active\";\n\
               item closed 2;\n\
               isnull jslabel \"Unknown\" jslabel.de \"Unbekannt\";\n\
             };",
        );
        assert!(cx.diag.is_empty(), "{:?}", cx.diag.messages());
        let e = &cx.model.enums[0];
        assert_eq!(e.name, "status");
        assert_eq!(e.doc.as_deref(), Some("Account state."));
        assert_eq!(e.items[0].name, "active");
        assert_eq!(e.items[0].doc.as_deref(), Some("In use."));
        assert_eq!(e.items[0].labels[0].text, "Active");
        assert_eq!(e.null_labels.len(), 2);
        assert_eq!(e.item_index("CLOSED"), Some(1));
    }

    // ==================== Value Assignment Tests ====================

    #[test]
    fn test_auto_values_follow_greatest_explicit() {
        assert_eq!(
            values("enum e { item a; item b 10; item c; item d 3; };"),
            vec![
                ("a".to_string(), 11, true),
                ("b".to_string(), 10, false),
                ("c".to_string(), 12, true),
                ("d".to_string(), 3, false),
            ]
        );
    }

    #[test]
    fn test_auto_values_start_at_zero() {
        assert_eq!(
            values("enum e { item a -4; item b; item c; };"),
            vec![
                ("a".to_string(), -4, false),
                ("b".to_string(), 0, true),
                ("c".to_string(), 1, true),
            ]
        );
    }

    #[test]
    fn test_auto_value_overflow() {
        assert_eq!(
            errors("enum e { item a 9223372036854775806; item b; };"),
            vec!["integer overflow when assigning dynamic enum value"]
        );
        assert_eq!(
            errors("enum e { item a 9223372036854775807; };"),
            vec!["enum item value too big or small"]
        );
    }

    // ==================== Error Tests ====================

    #[test]
    fn test_item_errors() {
        assert_eq!(
            errors("enum e { item a 1; item b 1; };"),
            vec!["duplicate enum item value"]
        );
        assert_eq!(
            errors("enum e { item a; item A; };"),
            vec!["duplicate enum item name"]
        );
        assert_eq!(
            errors("enum e { item a; item format; };"),
            vec!["cannot use reserved name"]
        );
        assert_eq!(
            errors("enum e { item a; item select; };"),
            vec!["reserved identifier"]
        );
        assert_eq!(
            errors("enum e { item a wobble; };"),
            vec!["unknown enum item attribute"]
        );
    }

    #[test]
    fn test_enum_errors() {
        assert_eq!(errors("enum e { };"), vec!["no items in enum"]);
        assert_eq!(
            errors("enum e { item a; value b; };"),
            vec!["unknown enum attribute"]
        );
        assert_eq!(
            errors("enum e { isnull \"x\"; item a; };"),
            vec!["expected \"jslabel\""]
        );
        assert_eq!(errors("enum e item a;"), vec!["expected left brace"]);
    }

    #[test]
    fn test_error_in_item_keeps_following_items() {
        let cx = parse("enum e { item a 1 wobble; item b; };");
        assert_eq!(cx.diag.error_count(), 1);
        let names: Vec<_> = cx.model.enums[0].items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(cx.model.enums[0].items[1].value, 2);
    }
}
