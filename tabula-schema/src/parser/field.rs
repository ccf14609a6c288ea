//! Field declarations: `field NAME [:STRUCT.FIELD] [TYPE] [TYPEINFO...];`

use chrono::NaiveDate;

use super::{PResult, Parser, Stop};
use crate::lexer::Token;
use crate::model::{
    DefaultValue, Field, FieldId, FieldType, Limit, LimitOp, LimitValue, Link, Reference,
    StructId, UpdateAction,
};
use crate::resolve::Resolve;

impl Parser<'_, '_> {
    pub(super) fn field(&mut self, sid: StructId) -> PResult<()> {
        self.bump();
        let name = self.expect_ident("expected field name")?;
        if !self.check_reserved(&name) {
            return Err(Stop::Skip);
        }
        let prior = self
            .cx
            .model
            .find_field(sid, &name)
            .map(|f| self.cx.model[f].pos.clone());
        if let Some(pos) = prior {
            return Err(self.fail(format!("duplicate field name: {pos}")));
        }

        let fid = self
            .cx
            .model
            .add_field(Field::new(name, sid, self.pos.clone()));
        self.bump();
        if self.tok == Token::Semicolon {
            self.bump();
            return Ok(());
        }

        if self.tok == Token::Colon {
            self.foreign_key(fid)?;
            if self.tok == Token::Semicolon {
                self.bump();
                return Ok(());
            }
        }

        let Some(word) = self.keyword() else {
            return Err(self.fail("expected field type"));
        };
        let ty = FieldType::from_keyword(&word).ok_or_else(|| self.fail("unknown field type"))?;
        self.cx.model[fid].ty = ty;
        self.bump();

        match ty {
            FieldType::Enum => {
                let name = self.expect_ident("expected enum name")?;
                self.cx.model[fid].enm = Some(Link::Pending);
                self.cx.queue.push(Resolve::Enum { field: fid, name });
                self.bump();
            }
            FieldType::Bitfield => {
                let name = self.expect_ident("expected bitfield name")?;
                self.cx.model[fid].bitf = Some(Link::Pending);
                self.cx.queue.push(Resolve::Bitfield { field: fid, name });
                self.bump();
            }
            FieldType::Struct => {
                if self.cx.model[fid].reference.is_some() {
                    return Err(self.fail("reference cannot be a struct"));
                }
                let source = self.expect_ident("expected struct source field")?;
                self.cx.model[fid].reference = Some(Reference::nested());
                self.cx.queue.push(Resolve::StructField { field: fid, source });
                self.bump();
            }
            FieldType::Blob => self.cx.model[sid].has_blob = true,
            _ => {}
        }

        while self.tok != Token::Semicolon {
            self.field_info(sid, fid)?;
        }

        let f = &self.cx.model[fid];
        let defaults = f.actup == UpdateAction::Default || f.actdel == UpdateAction::Default;
        let nullifies = f.actup == UpdateAction::Nullify || f.actdel == UpdateAction::Nullify;
        let (nullable, has_default) = (f.nullable, f.has_default());
        if defaults && !nullable && !has_default {
            return Err(self.fail("default action without default value or null"));
        }
        if nullifies && !nullable {
            return Err(self.fail("nullify action without allowing for null"));
        }
        self.bump();
        Ok(())
    }

    /// `:STRUCT.FIELD`, with the current token on the colon.
    fn foreign_key(&mut self, fid: FieldId) -> PResult<()> {
        self.cx.model[fid].reference = Some(Reference::foreign(fid));
        self.bump();
        let strct = self.expect_ident("expected target struct")?;
        self.bump();
        if self.tok != Token::Period {
            return Err(self.fail("expected period"));
        }
        self.bump();
        let target = self.expect_ident("expected target field")?;
        self.cx.queue.push(Resolve::ForeignKey {
            field: fid,
            strct,
            target,
        });
        self.bump();
        Ok(())
    }

    /// One typeinfo attribute.
    fn field_info(&mut self, sid: StructId, fid: FieldId) -> PResult<()> {
        let Some(word) = self.keyword() else {
            return Err(self.fail("unknown field info token"));
        };
        let ty = self.cx.model[fid].ty;
        match word.as_str() {
            "rowid" => {
                let f = &self.cx.model[fid];
                let failure = if self.cx.model[sid].rowid.is_some() {
                    Some("multiple rowids")
                } else if ty != FieldType::Int {
                    Some("rowid for non-int type")
                } else if f.reference.is_some() {
                    Some("rowid on reference")
                } else if f.nullable {
                    Some("rowid can't be null")
                } else {
                    None
                };
                if let Some(text) = failure {
                    return Err(self.fail(text));
                }
                if self.cx.model[fid].unique {
                    self.warn("unique is redundant");
                    self.cx.model[fid].unique = false;
                }
                self.cx.model[fid].rowid = true;
                self.cx.model[sid].rowid = Some(fid);
            }
            "noexport" => {
                if ty == FieldType::Password {
                    self.warn("noexport is redundant");
                }
                self.cx.model[fid].noexport = true;
            }
            "unique" => {
                if ty == FieldType::Struct {
                    return Err(self.fail("unique on struct"));
                }
                if self.cx.model[fid].rowid {
                    self.warn("unique is redundant");
                } else {
                    self.cx.model[fid].unique = true;
                }
            }
            "null" => {
                if self.cx.model[fid].rowid {
                    return Err(self.fail("rowid can't be null"));
                }
                if ty == FieldType::Struct {
                    return Err(self.fail("struct types can't be null"));
                }
                self.cx.model[fid].nullable = true;
            }
            "comment" => {
                let mut doc = self.cx.model[fid].doc.take();
                let result = self.comment(&mut doc);
                self.cx.model[fid].doc = doc;
                return result;
            }
            "limit" => return self.limit_bound(fid, ty),
            "actup" | "actdel" => {
                let f = &self.cx.model[fid];
                if f.reference.is_none() || f.is_struct() {
                    return Err(self.fail("action on non-reference"));
                }
                self.bump();
                let Some(action) = self.keyword() else {
                    return Err(self.fail("expected action"));
                };
                let action = UpdateAction::from_keyword(&action)
                    .ok_or_else(|| self.fail("unknown action"))?;
                if word == "actup" {
                    self.cx.model[fid].actup = action;
                } else {
                    self.cx.model[fid].actdel = action;
                }
            }
            "default" => return self.default_value(fid, ty),
            _ => return Err(self.fail("unknown field info token")),
        }
        self.bump();
        Ok(())
    }

    /// `limit OP VALUE`
    fn limit_bound(&mut self, fid: FieldId, ty: FieldType) -> PResult<()> {
        match ty {
            FieldType::Struct => return Err(self.fail("no validation on structs")),
            FieldType::Enum => return Err(self.fail("no validation on enums")),
            _ => {}
        }
        self.bump();
        let Some(word) = self.keyword() else {
            return Err(self.fail("expected constraint type"));
        };
        let op = LimitOp::from_keyword(&word).ok_or_else(|| self.fail("unknown constraint type"))?;
        self.bump();

        let value = match (self.tok.clone(), ty) {
            (Token::Integer(v), t) if t.is_integer_valued() => LimitValue::Integer(v),
            (_, t) if t.is_integer_valued() => return Err(self.fail("expected integer")),
            (Token::Integer(v), FieldType::Real) => LimitValue::Decimal(v as f64),
            (Token::Decimal(v), FieldType::Real) => LimitValue::Decimal(v),
            (_, FieldType::Real) => return Err(self.fail("expected decimal or integer")),
            (Token::Integer(v), _) if v >= 0 => LimitValue::Length(v as u64),
            _ => return Err(self.fail("expected length")),
        };
        let limit = Limit { op, value };
        if self.cx.model[fid].limits.contains(&limit) {
            return Err(self.fail("duplicate validation"));
        }
        self.cx.model[fid].limits.push(limit);
        self.bump();
        Ok(())
    }

    /// `default VALUE`, interpreted by field type.
    fn default_value(&mut self, fid: FieldId, ty: FieldType) -> PResult<()> {
        self.bump();
        let value = match ty {
            FieldType::Date => DefaultValue::Integer(self.date()?),
            FieldType::Bit | FieldType::Bitfield | FieldType::Epoch | FieldType::Int => {
                match self.tok {
                    Token::Integer(v) => DefaultValue::Integer(v),
                    _ => return Err(self.fail("expected integer")),
                }
            }
            FieldType::Real => match self.tok {
                Token::Integer(v) => DefaultValue::Decimal(v as f64),
                Token::Decimal(v) => DefaultValue::Decimal(v),
                _ => return Err(self.fail("expected real or integer")),
            },
            FieldType::Text | FieldType::Email => match self.tok.clone() {
                Token::Literal(s) => DefaultValue::Text(s),
                _ => return Err(self.fail("expected literal")),
            },
            FieldType::Enum => {
                let name = self.expect_ident("expected identifier")?;
                self.cx.queue.push(Resolve::DefaultItem {
                    field: fid,
                    name: name.clone(),
                });
                DefaultValue::Item {
                    name,
                    index: Link::Pending,
                }
            }
            _ => return Err(self.fail("defaults not available for type")),
        };
        self.cx.model[fid].default = Some(value);
        self.bump();
        Ok(())
    }

    /// `YYYY-MM-DD` as seconds since the epoch at UTC midnight.
    ///
    /// The lexer reads the month and day as negative integers. Leaves the
    /// day token current.
    fn date(&mut self) -> PResult<i64> {
        let Token::Integer(year) = self.tok else {
            return Err(self.fail("expected year (integer)"));
        };
        let Ok(year) = i32::try_from(year) else {
            return Err(self.fail("invalid year"));
        };
        self.bump();
        let Token::Integer(month) = self.tok else {
            return Err(self.fail("expected month (integer)"));
        };
        let Some(month) = month.checked_neg().and_then(|m| u32::try_from(m).ok()) else {
            return Err(self.fail("invalid month"));
        };
        self.bump();
        let Token::Integer(day) = self.tok else {
            return Err(self.fail("expected day (integer)"));
        };
        let Some(day) = day.checked_neg().and_then(|d| u32::try_from(d).ok()) else {
            return Err(self.fail("invalid day"));
        };

        match NaiveDate::from_ymd_opt(year, month, day).and_then(|d| d.and_hms_opt(0, 0, 0)) {
            Some(dt) => Ok(dt.and_utc().timestamp()),
            None => Err(self.fail("invalid date")),
        }
    }
}
