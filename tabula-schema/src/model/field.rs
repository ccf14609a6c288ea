//! Field definitions.

use serde::Serialize;
use smol_str::SmolStr;

use super::types::{FieldType, LimitOp, UpdateAction};
use super::{BitfieldId, EnumId, FieldId, Link, RoleMapId, StructId};
use crate::diag::Position;

/// A column of a struct.
#[derive(Debug, Clone, Serialize)]
pub struct Field {
    /// Lowercased field name.
    pub name: SmolStr,
    /// Owning struct.
    pub parent: StructId,
    /// Where the field was declared.
    pub pos: Position,
    /// Documentation from `comment`.
    pub doc: Option<String>,
    /// Type tag.
    #[serde(rename = "type")]
    pub ty: FieldType,
    /// Foreign-key or nested-struct reference.
    pub reference: Option<Reference>,
    /// Enumeration for `enum` fields.
    pub enm: Option<Link<EnumId>>,
    /// Bitfield for `bits` fields.
    pub bitf: Option<Link<BitfieldId>>,
    /// Validation bounds from `limit`.
    pub limits: Vec<Limit>,
    /// Default value.
    pub default: Option<DefaultValue>,
    /// Action when the referenced row is updated.
    pub actup: UpdateAction,
    /// Action when the referenced row is deleted.
    pub actdel: UpdateAction,
    /// Roles for which this field is not exported.
    pub rolemap: Option<RoleMapId>,
    /// Row identifier.
    pub rowid: bool,
    /// Unique column.
    pub unique: bool,
    /// May be null.
    pub nullable: bool,
    /// Never exported.
    pub noexport: bool,
}

impl Field {
    /// Create an integer field with no attributes.
    pub fn new(name: impl Into<SmolStr>, parent: StructId, pos: Position) -> Self {
        Self {
            name: name.into(),
            parent,
            pos,
            doc: None,
            ty: FieldType::Int,
            reference: None,
            enm: None,
            bitf: None,
            limits: Vec::new(),
            default: None,
            actup: UpdateAction::None,
            actdel: UpdateAction::None,
            rolemap: None,
            rowid: false,
            unique: false,
            nullable: false,
            noexport: false,
        }
    }

    /// Whether a default value was given.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Whether this is a nested-struct field.
    pub fn is_struct(&self) -> bool {
        self.ty == FieldType::Struct
    }

    /// Whether this field is a foreign key into another struct.
    pub fn is_foreign_key(&self) -> bool {
        self.reference.is_some() && !self.is_struct()
    }

    /// Resolved target of the reference, if any.
    pub fn target(&self) -> Option<FieldId> {
        self.reference.as_ref().and_then(|r| r.target.get())
    }

    /// Resolved source of the reference, if any.
    pub fn source(&self) -> Option<FieldId> {
        self.reference.as_ref().and_then(|r| r.source.get())
    }
}

/// A link from a field to a field in another struct.
///
/// A foreign key `field cid:company.id` has itself as source and
/// `company.id` as target. A nested struct `field company struct cid` has
/// the local foreign key `cid` as source and adopts its target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    /// Field holding the foreign key.
    pub source: Link<FieldId>,
    /// Row identifier or unique field referenced.
    pub target: Link<FieldId>,
}

impl Reference {
    /// A foreign-key reference whose source is known.
    pub fn foreign(source: FieldId) -> Self {
        Self {
            source: Link::Resolved(source),
            target: Link::Pending,
        }
    }

    /// A nested-struct reference still waiting on its source.
    pub fn nested() -> Self {
        Self {
            source: Link::Pending,
            target: Link::Pending,
        }
    }
}

/// Value of a `limit` bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitValue {
    /// Integer value bound.
    Integer(i64),
    /// Real value bound.
    Decimal(f64),
    /// Length bound for text and blobs.
    Length(u64),
}

/// A validation bound on a field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Limit {
    /// Comparison.
    pub op: LimitOp,
    /// Bound.
    pub value: LimitValue,
}

/// Default value of a field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultValue {
    /// Integer-valued types; dates are stored as a UTC epoch.
    Integer(i64),
    /// Real values.
    Decimal(f64),
    /// Text and e-mail.
    Text(String),
    /// Enumeration item, by index into the enum's items.
    Item {
        /// Item name as written.
        name: SmolStr,
        /// Item index once linked.
        index: Link<usize>,
    },
}
