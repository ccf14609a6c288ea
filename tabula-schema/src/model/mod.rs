//! The schema model.
//!
//! Every node lives in an arena on [`Model`] and is addressed by a typed
//! index. Cross-references are indices wrapped in [`Link`], which is
//! [`Link::Pending`] from parse time until the linker fills it in.

mod enums;
mod field;
mod strct;
mod types;

use std::ops::{Index, IndexMut};

use serde::Serialize;
use smol_str::SmolStr;

pub use enums::{BitItem, Bitfield, Enum, EnumItem, Label};
pub use field::{DefaultValue, Field, Limit, LimitValue, Reference};
pub use strct::{
    Aggregate, Constraint, Distinct, FieldPath, Insert, Modification, OrderTerm, RoleMap, RoleRef,
    Search, SearchTerm, Struct, Unique, UniqueField, Update,
};
pub use types::{
    AggrKind, FieldType, LimitOp, Modifier, Operator, OrderDir, RoleMapKind, SearchKind,
    UpdateAction, UpdateKind,
};

use crate::diag::Position;

macro_rules! arena_id {
    ($($(#[$meta:meta])* $name:ident;)+) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
            #[serde(transparent)]
            pub struct $name(u32);

            impl $name {
                /// Create an id from an arena index.
                pub fn new(index: usize) -> Self {
                    Self(index as u32)
                }

                /// The arena index.
                pub fn index(self) -> usize {
                    self.0 as usize
                }
            }
        )+
    };
}

arena_id! {
    /// Index of a [`Struct`].
    StructId;
    /// Index of a [`Field`].
    FieldId;
    /// Index of a [`Search`].
    SearchId;
    /// Index of an [`Update`].
    UpdateId;
    /// Index of a [`Unique`].
    UniqueId;
    /// Index of a [`RoleMap`].
    RoleMapId;
    /// Index of an [`Enum`].
    EnumId;
    /// Index of a [`Bitfield`].
    BitfieldId;
    /// Index of a [`Role`].
    RoleId;
}

/// A cross-reference filled in by the linker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "state", content = "value")]
pub enum Link<T> {
    /// Named at parse time, not yet looked up.
    Pending,
    /// Looked up.
    Resolved(T),
}

impl<T> Link<T> {
    /// Whether the link has been resolved.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// Borrow the resolved value.
    pub fn as_ref(&self) -> Option<&T> {
        match self {
            Self::Resolved(v) => Some(v),
            Self::Pending => None,
        }
    }
}

impl<T: Copy> Link<T> {
    /// The resolved value.
    pub fn get(&self) -> Option<T> {
        self.as_ref().copied()
    }
}

/// A node in the role tree.
#[derive(Debug, Clone, Serialize)]
pub struct Role {
    /// Lowercased name.
    pub name: SmolStr,
    /// Where it was declared.
    pub pos: Position,
    /// Documentation.
    pub doc: Option<String>,
    /// Parent role.
    pub parent: Option<RoleId>,
    /// Child roles in declaration order.
    pub children: Vec<RoleId>,
}

/// The complete schema, populated across one or more input files.
#[derive(Debug, Clone, Serialize)]
pub struct Model {
    /// Structs in declaration order.
    pub structs: Vec<Struct>,
    /// Field arena.
    pub fields: Vec<Field>,
    /// Query arena.
    pub searches: Vec<Search>,
    /// Update and delete arena.
    pub updates: Vec<Update>,
    /// Unique constraint arena.
    pub uniques: Vec<Unique>,
    /// Role grant arena.
    pub rolemaps: Vec<RoleMap>,
    /// Enumerations in declaration order.
    pub enums: Vec<Enum>,
    /// Bitfields in declaration order.
    pub bitfields: Vec<Bitfield>,
    /// Every role, in declaration order.
    pub roles: Vec<Role>,
    /// Roles without a parent: `none`, `default` and `all`.
    pub root_roles: Vec<RoleId>,
    /// Structs by ascending height, filled in by validation.
    pub order: Vec<StructId>,
    /// Label languages; index 0 is the default language.
    pub langs: Vec<SmolStr>,
    /// Input file names in the order they were parsed.
    pub fnames: Vec<SmolStr>,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    /// Create an empty model.
    pub fn new() -> Self {
        Self {
            structs: Vec::new(),
            fields: Vec::new(),
            searches: Vec::new(),
            updates: Vec::new(),
            uniques: Vec::new(),
            rolemaps: Vec::new(),
            enums: Vec::new(),
            bitfields: Vec::new(),
            roles: Vec::new(),
            root_roles: Vec::new(),
            order: Vec::new(),
            langs: vec![SmolStr::default()],
            fnames: Vec::new(),
        }
    }

    // ==================== Allocation ====================

    /// Add a struct.
    pub fn add_struct(&mut self, s: Struct) -> StructId {
        self.structs.push(s);
        StructId::new(self.structs.len() - 1)
    }

    /// Add a field and append it to its struct.
    pub fn add_field(&mut self, f: Field) -> FieldId {
        let parent = f.parent;
        self.fields.push(f);
        let id = FieldId::new(self.fields.len() - 1);
        self[parent].fields.push(id);
        id
    }

    /// Add a query and append it to its struct.
    pub fn add_search(&mut self, s: Search) -> SearchId {
        let parent = s.parent;
        self.searches.push(s);
        let id = SearchId::new(self.searches.len() - 1);
        self[parent].searches.push(id);
        id
    }

    /// Add an update or delete and append it to its struct.
    pub fn add_update(&mut self, u: Update) -> UpdateId {
        let parent = u.parent;
        let kind = u.kind;
        self.updates.push(u);
        let id = UpdateId::new(self.updates.len() - 1);
        match kind {
            UpdateKind::Modify => self[parent].updates.push(id),
            UpdateKind::Delete => self[parent].deletes.push(id),
        }
        id
    }

    /// Add a unique constraint and append it to its struct.
    pub fn add_unique(&mut self, u: Unique) -> UniqueId {
        let parent = u.parent;
        self.uniques.push(u);
        let id = UniqueId::new(self.uniques.len() - 1);
        self[parent].uniques.push(id);
        id
    }

    /// Add a role grant without attaching it anywhere.
    pub fn add_rolemap(&mut self, r: RoleMap) -> RoleMapId {
        self.rolemaps.push(r);
        RoleMapId::new(self.rolemaps.len() - 1)
    }

    /// Add an enumeration.
    pub fn add_enum(&mut self, e: Enum) -> EnumId {
        self.enums.push(e);
        EnumId::new(self.enums.len() - 1)
    }

    /// Add a bitfield.
    pub fn add_bitfield(&mut self, b: Bitfield) -> BitfieldId {
        self.bitfields.push(b);
        BitfieldId::new(self.bitfields.len() - 1)
    }

    /// Add a role under an optional parent.
    pub fn add_role(
        &mut self,
        name: impl Into<SmolStr>,
        parent: Option<RoleId>,
        pos: Position,
    ) -> RoleId {
        self.roles.push(Role {
            name: name.into(),
            pos,
            doc: None,
            parent,
            children: Vec::new(),
        });
        let id = RoleId::new(self.roles.len() - 1);
        match parent {
            Some(p) => self[p].children.push(id),
            None => self.root_roles.push(id),
        }
        id
    }

    // ==================== Lookup ====================

    /// Iterate over struct ids in declaration order.
    pub fn struct_ids(&self) -> impl Iterator<Item = StructId> + use<> {
        (0..self.structs.len()).map(StructId::new)
    }

    /// Iterate over search ids.
    pub fn search_ids(&self) -> impl Iterator<Item = SearchId> + use<> {
        (0..self.searches.len()).map(SearchId::new)
    }

    /// Iterate over update and delete ids.
    pub fn update_ids(&self) -> impl Iterator<Item = UpdateId> + use<> {
        (0..self.updates.len()).map(UpdateId::new)
    }

    /// Iterate over role ids.
    pub fn role_ids(&self) -> impl Iterator<Item = RoleId> + use<> {
        (0..self.roles.len()).map(RoleId::new)
    }

    /// Structs in dependency order once validated, else declaration order.
    pub fn ordered_structs(&self) -> Vec<StructId> {
        if self.order.len() == self.structs.len() {
            self.order.clone()
        } else {
            self.struct_ids().collect()
        }
    }

    /// Find a struct by name, ignoring case.
    pub fn find_struct(&self, name: &str) -> Option<StructId> {
        self.structs
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
            .map(StructId::new)
    }

    /// Find an enumeration by name, ignoring case.
    pub fn find_enum(&self, name: &str) -> Option<EnumId> {
        self.enums
            .iter()
            .position(|e| e.name.eq_ignore_ascii_case(name))
            .map(EnumId::new)
    }

    /// Find a bitfield by name, ignoring case.
    pub fn find_bitfield(&self, name: &str) -> Option<BitfieldId> {
        self.bitfields
            .iter()
            .position(|b| b.name.eq_ignore_ascii_case(name))
            .map(BitfieldId::new)
    }

    /// Find a role anywhere in the tree, ignoring case.
    pub fn find_role(&self, name: &str) -> Option<RoleId> {
        self.roles
            .iter()
            .position(|r| r.name.eq_ignore_ascii_case(name))
            .map(RoleId::new)
    }

    /// Find a field of a struct by name, ignoring case.
    pub fn find_field(&self, strct: StructId, name: &str) -> Option<FieldId> {
        self[strct]
            .fields
            .iter()
            .copied()
            .find(|&f| self[f].name.eq_ignore_ascii_case(name))
    }

    /// Whether a `roles` block has been declared.
    pub fn has_roles(&self) -> bool {
        !self.roles.is_empty()
    }

    /// Struct holding the target of a nested-struct field.
    pub fn nested_struct(&self, field: FieldId) -> Option<StructId> {
        let f = &self[field];
        if !f.is_struct() {
            return None;
        }
        f.target().map(|t| self[t].parent)
    }

    /// Whether `ancestor` is `role` or one of its ancestors.
    pub fn role_descends_from(&self, role: RoleId, ancestor: RoleId) -> bool {
        let mut cur = Some(role);
        while let Some(r) = cur {
            if r == ancestor {
                return true;
            }
            cur = self[r].parent;
        }
        false
    }

    /// Name of a field qualified by its struct.
    pub fn qualified_name(&self, field: FieldId) -> String {
        let f = &self[field];
        format!("{}.{}", self[f.parent].name, f.name)
    }

    /// Serialize the model as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

macro_rules! arena_index {
    ($($id:ident => $field:ident: $ty:ty;)+) => {
        $(
            impl Index<$id> for Model {
                type Output = $ty;

                fn index(&self, id: $id) -> &$ty {
                    &self.$field[id.index()]
                }
            }

            impl IndexMut<$id> for Model {
                fn index_mut(&mut self, id: $id) -> &mut $ty {
                    &mut self.$field[id.index()]
                }
            }
        )+
    };
}

arena_index! {
    StructId => structs: Struct;
    FieldId => fields: Field;
    SearchId => searches: Search;
    UpdateId => updates: Update;
    UniqueId => uniques: Unique;
    RoleMapId => rolemaps: RoleMap;
    EnumId => enums: Enum;
    BitfieldId => bitfields: Bitfield;
    RoleId => roles: Role;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> Position {
        Position::new("test.ort", 1, 1)
    }

    #[test]
    fn test_new_model_has_default_language() {
        let model = Model::new();
        assert_eq!(model.langs.len(), 1);
        assert!(model.langs[0].is_empty());
        assert!(!model.has_roles());
    }

    #[test]
    fn test_add_field_appends_to_struct() {
        let mut model = Model::new();
        let s = model.add_struct(Struct::new("user", pos()));
        let a = model.add_field(Field::new("id", s, pos()));
        let b = model.add_field(Field::new("name", s, pos()));

        assert_eq!(model[s].fields, vec![a, b]);
        assert_eq!(model.find_field(s, "NAME"), Some(b));
        assert_eq!(model.qualified_name(b), "user.name");
    }

    #[test]
    fn test_add_update_splits_by_kind() {
        let mut model = Model::new();
        let s = model.add_struct(Struct::new("user", pos()));
        let u = model.add_update(Update::new(s, UpdateKind::Modify, pos()));
        let d = model.add_update(Update::new(s, UpdateKind::Delete, pos()));

        assert_eq!(model[s].updates, vec![u]);
        assert_eq!(model[s].deletes, vec![d]);
    }

    #[test]
    fn test_role_tree() {
        let mut model = Model::new();
        let all = model.add_role("all", None, pos());
        let admin = model.add_role("admin", Some(all), pos());
        let sub = model.add_role("sub", Some(admin), pos());

        assert_eq!(model.root_roles, vec![all]);
        assert_eq!(model[admin].children, vec![sub]);
        assert!(model.role_descends_from(sub, all));
        assert!(!model.role_descends_from(all, sub));
        assert_eq!(model.find_role("ADMIN"), Some(admin));
    }

    #[test]
    fn test_link_accessors() {
        let pending: Link<FieldId> = Link::Pending;
        assert!(!pending.is_resolved());
        assert_eq!(pending.get(), None);

        let resolved = Link::Resolved(FieldId::new(2));
        assert_eq!(resolved.get(), Some(FieldId::new(2)));
    }
}
