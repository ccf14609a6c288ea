//! Deferred name lookups recorded at parse time.
//!
//! The parser never looks up another entity by name. It leaves a
//! [`Link::Pending`](crate::model::Link::Pending) slot in the model and
//! appends a [`Resolve`] naming what to find and which slot to fill. The
//! linker drains the queue once every input has been parsed, so forward
//! references and references into later files resolve like any other.

use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::model::{FieldId, RoleMapId, SearchId, UniqueId, UpdateId};

/// Which dotted path of a query a [`Resolve::Path`] fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSlot {
    /// Search term by index.
    Term(usize),
    /// Ordering term by index.
    Order(usize),
    /// The `minrow`/`maxrow` aggregate.
    Aggregate,
    /// The `grouprow` term.
    Group,
    /// The `distinct` projection.
    Distinct,
}

/// Resolution batches, drained in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Batch {
    /// Lookups needing only the parsed graph: foreign keys, enums,
    /// bitfields, roles, update fields and unique fields.
    Direct,
    /// Lookups that dereference a direct result: nested-struct sources,
    /// enum default items and role grants.
    Dependent,
    /// Dotted paths through nested structs, and spreading `all` grants.
    Paths,
}

/// A deferred lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolve {
    /// `field x:strct.target`.
    ForeignKey {
        field: FieldId,
        strct: SmolStr,
        target: SmolStr,
    },
    /// `field x struct source`.
    StructField { field: FieldId, source: SmolStr },
    /// `field x enum name`.
    Enum { field: FieldId, name: SmolStr },
    /// `field x bits name`.
    Bitfield { field: FieldId, name: SmolStr },
    /// `default item` on an enum field.
    DefaultItem { field: FieldId, name: SmolStr },
    /// Role named in a grant.
    Role {
        rolemap: RoleMapId,
        index: usize,
        name: SmolStr,
    },
    /// Operation named by a grant.
    RoleMap { rolemap: RoleMapId },
    /// Field named in a unique constraint.
    Unique {
        unique: UniqueId,
        index: usize,
        name: SmolStr,
    },
    /// Constraint field of an update or delete.
    Constraint {
        update: UpdateId,
        index: usize,
        name: SmolStr,
    },
    /// Modified field of an update.
    Modifier {
        update: UpdateId,
        index: usize,
        name: SmolStr,
    },
    /// Dotted path in a query.
    Path {
        search: SearchId,
        slot: PathSlot,
        names: SmallVec<[SmolStr; 4]>,
    },
}

impl Resolve {
    /// The batch this item belongs to.
    pub fn batch(&self) -> Batch {
        match self {
            Self::ForeignKey { .. }
            | Self::Enum { .. }
            | Self::Bitfield { .. }
            | Self::Role { .. }
            | Self::Unique { .. }
            | Self::Constraint { .. }
            | Self::Modifier { .. } => Batch::Direct,
            Self::StructField { .. } | Self::DefaultItem { .. } | Self::RoleMap { .. } => {
                Batch::Dependent
            }
            Self::Path { .. } => Batch::Paths,
        }
    }
}

/// Ordered, append-only list of deferred lookups.
#[derive(Debug, Default, Clone)]
pub struct ResolveQueue {
    items: Vec<Resolve>,
}

impl ResolveQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item.
    pub fn push(&mut self, item: Resolve) {
        self.items.push(item);
    }

    /// Items in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Resolve> {
        self.items.iter()
    }

    /// Items of one batch, in insertion order.
    pub fn batch(&self, batch: Batch) -> impl Iterator<Item = &Resolve> {
        self.items.iter().filter(move |r| r.batch() == batch)
    }

    /// Grants queued for operation lookup.
    pub fn rolemaps(&self) -> impl Iterator<Item = RoleMapId> + '_ {
        self.items.iter().filter_map(|r| match r {
            Resolve::RoleMap { rolemap } => Some(*rolemap),
            _ => None,
        })
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Remove every item, consuming them.
    pub fn take(&mut self) -> Vec<Resolve> {
        std::mem::take(&mut self.items)
    }
}
