//! Enumerations, bitfields and their labels.

use serde::Serialize;
use smol_str::SmolStr;

use crate::diag::Position;

/// A display label for one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    /// Label text.
    pub text: String,
    /// Index into [`Model::langs`](super::Model::langs); 0 is the default.
    pub lang: usize,
    /// Where the label was written.
    pub pos: Position,
}

/// An enumeration.
#[derive(Debug, Clone, Serialize)]
pub struct Enum {
    /// Lowercased name.
    pub name: SmolStr,
    /// Where it was declared.
    pub pos: Position,
    /// Documentation.
    pub doc: Option<String>,
    /// Items in declaration order.
    pub items: Vec<EnumItem>,
    /// Labels shown for a null value.
    pub null_labels: Vec<Label>,
}

impl Enum {
    /// Create an empty enumeration.
    pub fn new(name: impl Into<SmolStr>, pos: Position) -> Self {
        Self {
            name: name.into(),
            pos,
            doc: None,
            items: Vec::new(),
            null_labels: Vec::new(),
        }
    }

    /// Index of the item with the given name, ignoring case.
    pub fn item_index(&self, name: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|i| i.name.eq_ignore_ascii_case(name))
    }
}

/// An enumeration item.
#[derive(Debug, Clone, Serialize)]
pub struct EnumItem {
    /// Lowercased name.
    pub name: SmolStr,
    /// Where it was declared.
    pub pos: Position,
    /// Documentation.
    pub doc: Option<String>,
    /// Value, explicit or assigned.
    pub value: i64,
    /// The value was assigned automatically.
    pub auto: bool,
    /// Display labels.
    pub labels: Vec<Label>,
}

/// A set of named bits.
#[derive(Debug, Clone, Serialize)]
pub struct Bitfield {
    /// Lowercased name.
    pub name: SmolStr,
    /// Where it was declared.
    pub pos: Position,
    /// Documentation.
    pub doc: Option<String>,
    /// Items in declaration order.
    pub items: Vec<BitItem>,
    /// Labels shown when no bit is set.
    pub unset_labels: Vec<Label>,
    /// Labels shown for a null value.
    pub null_labels: Vec<Label>,
}

impl Bitfield {
    /// Create an empty bitfield.
    pub fn new(name: impl Into<SmolStr>, pos: Position) -> Self {
        Self {
            name: name.into(),
            pos,
            doc: None,
            items: Vec::new(),
            unset_labels: Vec::new(),
            null_labels: Vec::new(),
        }
    }
}

/// A named bit.
#[derive(Debug, Clone, Serialize)]
pub struct BitItem {
    /// Lowercased name.
    pub name: SmolStr,
    /// Where it was declared.
    pub pos: Position,
    /// Documentation.
    pub doc: Option<String>,
    /// Bit index in `0..64`.
    pub index: i64,
    /// Display labels.
    pub labels: Vec<Label>,
}
