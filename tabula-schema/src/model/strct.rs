//! Structs and the operations declared inside them.

use indexmap::IndexMap;
use serde::Serialize;
use smallvec::SmallVec;
use smol_str::SmolStr;

use super::types::{AggrKind, Modifier, Operator, OrderDir, RoleMapKind, SearchKind, UpdateKind};
use super::{FieldId, Link, RoleId, RoleMapId, SearchId, StructId, UniqueId, UpdateId};
use crate::diag::Position;

/// A table.
#[derive(Debug, Clone, Serialize)]
pub struct Struct {
    /// Lowercased struct name.
    pub name: SmolStr,
    /// Where the struct was declared.
    pub pos: Position,
    /// Documentation from `comment`.
    pub doc: Option<String>,
    /// Fields in declaration order.
    pub fields: Vec<FieldId>,
    /// Queries in declaration order.
    pub searches: Vec<SearchId>,
    /// Modifying updates.
    pub updates: Vec<UpdateId>,
    /// Deletes.
    pub deletes: Vec<UpdateId>,
    /// Composite unique constraints.
    pub uniques: Vec<UniqueId>,
    /// Role grants as written in the struct body.
    pub rolemaps: Vec<RoleMapId>,
    /// Insert marker.
    pub insert: Option<Insert>,
    /// Row identifier field.
    pub rowid: Option<FieldId>,
    /// Dotted path to alias, filled in by alias assignment.
    pub aliases: IndexMap<String, SmolStr>,
    /// Some list query returns rows of this struct.
    pub has_queue: bool,
    /// Some iterate query returns rows of this struct.
    pub has_iterator: bool,
    /// Contains a blob field.
    pub has_blob: bool,
    /// Reaches a nullable foreign key through nested structs.
    pub has_nullrefs: bool,
    /// Maximum nesting depth below this struct.
    pub height: usize,
}

impl Struct {
    /// Create an empty struct.
    pub fn new(name: impl Into<SmolStr>, pos: Position) -> Self {
        Self {
            name: name.into(),
            pos,
            doc: None,
            fields: Vec::new(),
            searches: Vec::new(),
            updates: Vec::new(),
            deletes: Vec::new(),
            uniques: Vec::new(),
            rolemaps: Vec::new(),
            insert: None,
            rowid: None,
            aliases: IndexMap::new(),
            has_queue: false,
            has_iterator: false,
            has_blob: false,
            has_nullrefs: false,
            height: 0,
        }
    }

    /// Alias registered for a dotted path.
    pub fn alias(&self, path: &str) -> Option<&str> {
        self.aliases.get(path).map(SmolStr::as_str)
    }
}

/// Insert marker.
#[derive(Debug, Clone, Serialize)]
pub struct Insert {
    /// Where the marker was declared.
    pub pos: Position,
    /// Roles allowed to insert.
    pub rolemap: Option<RoleMapId>,
}

/// A dotted chain of field names, such as `user.company.name`.
#[derive(Debug, Clone, Serialize)]
pub struct FieldPath {
    /// Where the path was written.
    pub pos: Position,
    /// Lowercased components as written.
    pub components: SmallVec<[SmolStr; 4]>,
    /// One field per component once linked.
    pub chain: Link<SmallVec<[FieldId; 4]>>,
    /// Alias of the struct holding the last field, for nested paths.
    pub alias: Option<SmolStr>,
}

impl FieldPath {
    /// Create an unresolved path.
    pub fn new(pos: Position, components: SmallVec<[SmolStr; 4]>) -> Self {
        Self {
            pos,
            components,
            chain: Link::Pending,
            alias: None,
        }
    }

    /// Components joined with `.`.
    pub fn fname(&self) -> String {
        self.components.join(".")
    }

    /// Components joined with `_`, usable as an identifier.
    pub fn uname(&self) -> String {
        self.components.join("_")
    }

    /// Path to the struct holding the last component, if nested.
    pub fn prefix(&self) -> Option<String> {
        match self.components.len() {
            0 | 1 => None,
            n => Some(self.components[..n - 1].join(".")),
        }
    }

    /// Last resolved field.
    pub fn terminal(&self) -> Option<FieldId> {
        self.chain.as_ref().and_then(|c| c.last().copied())
    }
}

/// A search term: `path [operator]`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchTerm {
    /// Field searched on.
    pub path: FieldPath,
    /// Comparison, `eq` when omitted.
    pub op: Operator,
}

/// An ordering term: `path [asc|desc]`.
#[derive(Debug, Clone, Serialize)]
pub struct OrderTerm {
    /// Field ordered by.
    pub path: FieldPath,
    /// Direction, ascending when omitted.
    pub dir: OrderDir,
}

/// `minrow` or `maxrow` aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct Aggregate {
    /// Field aggregated over.
    pub path: FieldPath,
    /// Which extreme.
    pub kind: AggrKind,
}

/// `distinct` projection.
#[derive(Debug, Clone, Serialize)]
pub struct Distinct {
    /// Path to the projected struct; empty for `.`.
    pub path: FieldPath,
    /// Projected struct.
    pub target: Link<StructId>,
}

/// A query.
#[derive(Debug, Clone, Serialize)]
pub struct Search {
    /// Owning struct.
    pub parent: StructId,
    /// Where the query was declared.
    pub pos: Position,
    /// Query kind.
    pub kind: SearchKind,
    /// Explicit name.
    pub name: Option<SmolStr>,
    /// Documentation.
    pub doc: Option<String>,
    /// Search terms.
    pub terms: Vec<SearchTerm>,
    /// Ordering terms.
    pub order: Vec<OrderTerm>,
    /// Aggregate, paired with `group`.
    pub aggregate: Option<Aggregate>,
    /// Group, paired with `aggregate`.
    pub group: Option<FieldPath>,
    /// Distinct projection.
    pub distinct: Option<Distinct>,
    /// Row limit; zero for none.
    pub limit: i64,
    /// Row offset.
    pub offset: i64,
    /// Roles allowed to run the query.
    pub rolemap: Option<RoleMapId>,
    /// Terms determine at most one row.
    pub is_unique: bool,
}

impl Search {
    /// Create an empty query.
    pub fn new(parent: StructId, kind: SearchKind, pos: Position) -> Self {
        Self {
            parent,
            pos,
            kind,
            name: None,
            doc: None,
            terms: Vec::new(),
            order: Vec::new(),
            aggregate: None,
            group: None,
            distinct: None,
            limit: 0,
            offset: 0,
            rolemap: None,
            is_unique: false,
        }
    }

    /// Every dotted path in the query.
    pub fn paths(&self) -> impl Iterator<Item = &FieldPath> {
        self.terms
            .iter()
            .map(|t| &t.path)
            .chain(self.order.iter().map(|o| &o.path))
            .chain(self.aggregate.iter().map(|a| &a.path))
            .chain(self.group.iter())
    }
}

/// A modified field in an update.
#[derive(Debug, Clone, Serialize)]
pub struct Modification {
    /// Where the field was named.
    pub pos: Position,
    /// Field name as written.
    pub name: SmolStr,
    /// Field once linked.
    pub field: Link<FieldId>,
    /// How the field changes.
    pub modifier: Modifier,
}

/// A constraint field in an update or delete.
#[derive(Debug, Clone, Serialize)]
pub struct Constraint {
    /// Where the field was named.
    pub pos: Position,
    /// Field name as written.
    pub name: SmolStr,
    /// Field once linked.
    pub field: Link<FieldId>,
    /// Comparison.
    pub op: Operator,
}

/// An update or delete.
#[derive(Debug, Clone, Serialize)]
pub struct Update {
    /// Owning struct.
    pub parent: StructId,
    /// Where it was declared.
    pub pos: Position,
    /// Modify or delete.
    pub kind: UpdateKind,
    /// Explicit name.
    pub name: Option<SmolStr>,
    /// Documentation.
    pub doc: Option<String>,
    /// Modified fields.
    pub modifiers: Vec<Modification>,
    /// Constraint fields.
    pub constraints: Vec<Constraint>,
    /// Modifiers were expanded from an empty list.
    pub all: bool,
    /// Roles allowed to run it.
    pub rolemap: Option<RoleMapId>,
}

impl Update {
    /// Create an empty update.
    pub fn new(parent: StructId, kind: UpdateKind, pos: Position) -> Self {
        Self {
            parent,
            pos,
            kind,
            name: None,
            doc: None,
            modifiers: Vec::new(),
            constraints: Vec::new(),
            all: false,
            rolemap: None,
        }
    }
}

/// A field in a composite unique constraint.
#[derive(Debug, Clone, Serialize)]
pub struct UniqueField {
    /// Where the field was named.
    pub pos: Position,
    /// Field name as written.
    pub name: SmolStr,
    /// Field once linked.
    pub field: Link<FieldId>,
}

/// Composite unique constraint.
#[derive(Debug, Clone, Serialize)]
pub struct Unique {
    /// Owning struct.
    pub parent: StructId,
    /// Where it was declared.
    pub pos: Position,
    /// At least two fields.
    pub fields: Vec<UniqueField>,
}

/// A role named in a grant.
#[derive(Debug, Clone, Serialize)]
pub struct RoleRef {
    /// Where the role was named.
    pub pos: Position,
    /// Role name as written.
    pub name: SmolStr,
    /// Role once linked.
    pub role: Link<RoleId>,
}

/// The set of roles granted one operation.
#[derive(Debug, Clone, Serialize)]
pub struct RoleMap {
    /// Owning struct.
    pub parent: StructId,
    /// Where the grant was first written.
    pub pos: Position,
    /// Operation kind.
    pub kind: RoleMapKind,
    /// Operation name, for named operations and single-field `noexport`.
    pub name: Option<SmolStr>,
    /// Granted roles.
    pub roles: Vec<RoleRef>,
}

impl RoleMap {
    /// Create an empty grant.
    pub fn new(parent: StructId, kind: RoleMapKind, name: Option<SmolStr>, pos: Position) -> Self {
        Self {
            parent,
            pos,
            kind,
            name,
            roles: Vec::new(),
        }
    }

    /// Resolved roles in the grant.
    pub fn resolved_roles(&self) -> impl Iterator<Item = RoleId> + '_ {
        self.roles.iter().filter_map(|r| r.role.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn path(components: &[&str]) -> FieldPath {
        FieldPath::new(
            Position::default(),
            components.iter().map(|c| SmolStr::new(c)).collect(),
        )
    }

    #[test]
    fn test_path_names() {
        let p = path(&["user", "company", "name"]);
        assert_eq!(p.fname(), "user.company.name");
        assert_eq!(p.uname(), "user_company_name");
        assert_eq!(p.prefix().as_deref(), Some("user.company"));
    }

    #[test]
    fn test_path_single_component_has_no_prefix() {
        let p = path(&["name"]);
        assert_eq!(p.prefix(), None);
        assert_eq!(p.terminal(), None);
    }

    #[test]
    fn test_path_terminal() {
        let mut p = path(&["a", "b"]);
        p.chain = Link::Resolved(smallvec![FieldId::new(3), FieldId::new(7)]);
        assert_eq!(p.terminal(), Some(FieldId::new(7)));
    }

    #[test]
    fn test_search_paths_cover_every_clause() {
        let mut s = Search::new(StructId::new(0), SearchKind::List, Position::default());
        s.terms.push(SearchTerm {
            path: path(&["a"]),
            op: Operator::Eq,
        });
        s.order.push(OrderTerm {
            path: path(&["b"]),
            dir: OrderDir::Desc,
        });
        s.aggregate = Some(Aggregate {
            path: path(&["c"]),
            kind: AggrKind::MaxRow,
        });
        s.group = Some(path(&["d"]));

        let names: Vec<_> = s.paths().map(FieldPath::fname).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }
}
