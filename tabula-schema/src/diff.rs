//! Differences between two linked models.
//!
//! Entities are matched by name, ignoring case. Enumerations come first,
//! then bitfields, roles and structs. Within each kind the newer model is
//! walked in order, followed by whatever the older model had that the newer
//! one lacks. A new struct, enumeration or bitfield is reported once; its
//! contents are not listed.

use std::fmt;

use serde::Serialize;
use smol_str::SmolStr;
use tracing::debug;

use crate::audit::{search_name, update_name};
use crate::model::{
    BitItem, Bitfield, Enum, EnumItem, Field, FieldType, Model, StructId, UpdateAction,
};

/// The actions of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Actions {
    /// Action when the referenced row is updated.
    pub update: UpdateAction,
    /// Action when the referenced row is deleted.
    pub delete: UpdateAction,
}

/// One difference between two models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum Change {
    AddEnum { name: SmolStr },
    DelEnum { name: SmolStr },
    ModEnumComment { name: SmolStr },
    AddEnumItem { enm: SmolStr, item: SmolStr },
    DelEnumItem { enm: SmolStr, item: SmolStr },
    ModEnumItemValue { enm: SmolStr, item: SmolStr, from: i64, into: i64 },
    ModEnumItemComment { enm: SmolStr, item: SmolStr },

    AddBitfield { name: SmolStr },
    DelBitfield { name: SmolStr },
    ModBitfieldComment { name: SmolStr },
    AddBitItem { bitf: SmolStr, item: SmolStr },
    DelBitItem { bitf: SmolStr, item: SmolStr },
    ModBitItemValue { bitf: SmolStr, item: SmolStr, from: i64, into: i64 },
    ModBitItemComment { bitf: SmolStr, item: SmolStr },

    AddRole { name: SmolStr },
    DelRole { name: SmolStr },
    /// The role moved under another parent.
    ModRoleParent { name: SmolStr, from: Option<SmolStr>, into: Option<SmolStr> },

    AddStruct { name: SmolStr },
    DelStruct { name: SmolStr },
    ModStructComment { name: SmolStr },
    AddField { strct: SmolStr, field: SmolStr },
    DelField { strct: SmolStr, field: SmolStr },
    ModFieldType { strct: SmolStr, field: SmolStr, from: FieldType, into: FieldType },
    ModFieldActions { strct: SmolStr, field: SmolStr, from: Actions, into: Actions },
    ModFieldFlags {
        strct: SmolStr,
        field: SmolStr,
        from: Vec<&'static str>,
        into: Vec<&'static str>,
    },
    /// Both versions are enumerations, but not the same one.
    ModFieldEnum { strct: SmolStr, field: SmolStr, from: SmolStr, into: SmolStr },
    /// Both versions are bitfields, but not the same one.
    ModFieldBitfield { strct: SmolStr, field: SmolStr, from: SmolStr, into: SmolStr },
    /// The reference appeared, vanished or points elsewhere.
    ModFieldReference {
        strct: SmolStr,
        field: SmolStr,
        from: Option<String>,
        into: Option<String>,
    },
    ModFieldComment { strct: SmolStr, field: SmolStr },
    AddUnique { strct: SmolStr, fields: Vec<SmolStr> },
    DelUnique { strct: SmolStr, fields: Vec<SmolStr> },
    AddInsert { strct: SmolStr },
    DelInsert { strct: SmolStr },
    /// A query, update or delete, keyed by its function name.
    AddQuery { strct: SmolStr, function: String },
    DelQuery { strct: SmolStr, function: String },
    ModQueryComment { strct: SmolStr, function: String },
}

/// Whether a change adds, removes or modifies something.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

impl Change {
    /// Whether this change adds, removes or modifies something.
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::AddEnum { .. }
            | Self::AddEnumItem { .. }
            | Self::AddBitfield { .. }
            | Self::AddBitItem { .. }
            | Self::AddRole { .. }
            | Self::AddStruct { .. }
            | Self::AddField { .. }
            | Self::AddUnique { .. }
            | Self::AddInsert { .. }
            | Self::AddQuery { .. } => ChangeKind::Added,
            Self::DelEnum { .. }
            | Self::DelEnumItem { .. }
            | Self::DelBitfield { .. }
            | Self::DelBitItem { .. }
            | Self::DelRole { .. }
            | Self::DelStruct { .. }
            | Self::DelField { .. }
            | Self::DelUnique { .. }
            | Self::DelInsert { .. }
            | Self::DelQuery { .. } => ChangeKind::Removed,
            _ => ChangeKind::Modified,
        }
    }
}

fn opt(name: &Option<SmolStr>) -> &str {
    name.as_deref().unwrap_or("(none)")
}

fn reference(r: &Option<String>) -> &str {
    r.as_deref().unwrap_or("(none)")
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddEnum { name } => write!(f, "added enum {name}"),
            Self::DelEnum { name } => write!(f, "removed enum {name}"),
            Self::ModEnumComment { name } => write!(f, "changed comment of enum {name}"),
            Self::AddEnumItem { enm, item } => write!(f, "added item {enm}.{item}"),
            Self::DelEnumItem { enm, item } => write!(f, "removed item {enm}.{item}"),
            Self::ModEnumItemValue { enm, item, from, into } => {
                write!(f, "changed value of item {enm}.{item}: {from} -> {into}")
            }
            Self::ModEnumItemComment { enm, item } => {
                write!(f, "changed comment of item {enm}.{item}")
            }
            Self::AddBitfield { name } => write!(f, "added bitfield {name}"),
            Self::DelBitfield { name } => write!(f, "removed bitfield {name}"),
            Self::ModBitfieldComment { name } => write!(f, "changed comment of bitfield {name}"),
            Self::AddBitItem { bitf, item } => write!(f, "added item {bitf}.{item}"),
            Self::DelBitItem { bitf, item } => write!(f, "removed item {bitf}.{item}"),
            Self::ModBitItemValue { bitf, item, from, into } => {
                write!(f, "changed index of item {bitf}.{item}: {from} -> {into}")
            }
            Self::ModBitItemComment { bitf, item } => {
                write!(f, "changed comment of item {bitf}.{item}")
            }
            Self::AddRole { name } => write!(f, "added role {name}"),
            Self::DelRole { name } => write!(f, "removed role {name}"),
            Self::ModRoleParent { name, from, into } => {
                write!(f, "moved role {name}: {} -> {}", opt(from), opt(into))
            }
            Self::AddStruct { name } => write!(f, "added struct {name}"),
            Self::DelStruct { name } => write!(f, "removed struct {name}"),
            Self::ModStructComment { name } => write!(f, "changed comment of struct {name}"),
            Self::AddField { strct, field } => write!(f, "added field {strct}.{field}"),
            Self::DelField { strct, field } => write!(f, "removed field {strct}.{field}"),
            Self::ModFieldType { strct, field, from, into } => {
                write!(f, "changed type of field {strct}.{field}: {from} -> {into}")
            }
            Self::ModFieldActions { strct, field, from, into } => write!(
                f,
                "changed actions of field {strct}.{field}: {}/{} -> {}/{}",
                from.update, from.delete, into.update, into.delete
            ),
            Self::ModFieldFlags { strct, field, from, into } => write!(
                f,
                "changed flags of field {strct}.{field}: [{}] -> [{}]",
                from.join(" "),
                into.join(" ")
            ),
            Self::ModFieldEnum { strct, field, from, into } => {
                write!(f, "changed enum of field {strct}.{field}: {from} -> {into}")
            }
            Self::ModFieldBitfield { strct, field, from, into } => {
                write!(f, "changed bitfield of field {strct}.{field}: {from} -> {into}")
            }
            Self::ModFieldReference { strct, field, from, into } => write!(
                f,
                "changed reference of field {strct}.{field}: {} -> {}",
                reference(from),
                reference(into)
            ),
            Self::ModFieldComment { strct, field } => {
                write!(f, "changed comment of field {strct}.{field}")
            }
            Self::AddUnique { strct, fields } => {
                write!(f, "added unique {strct}({})", fields.join(", "))
            }
            Self::DelUnique { strct, fields } => {
                write!(f, "removed unique {strct}({})", fields.join(", "))
            }
            Self::AddInsert { strct } => write!(f, "added insert on {strct}"),
            Self::DelInsert { strct } => write!(f, "removed insert on {strct}"),
            Self::AddQuery { function, .. } => write!(f, "added function {function}"),
            Self::DelQuery { function, .. } => write!(f, "removed function {function}"),
            Self::ModQueryComment { function, .. } => {
                write!(f, "changed comment of function {function}")
            }
        }
    }
}

/// All differences between an older and a newer model.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaDiff {
    /// Changes in report order.
    pub changes: Vec<Change>,
}

impl SchemaDiff {
    /// Check if there are any differences.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changes of one kind.
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind() == kind).count()
    }

    /// Get a human-readable summary of the diff.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "No changes".to_string();
        }
        format!(
            "{} added, {} removed, {} modified",
            self.count(ChangeKind::Added),
            self.count(ChangeKind::Removed),
            self.count(ChangeKind::Modified)
        )
    }
}

impl fmt::Display for SchemaDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for change in &self.changes {
            writeln!(f, "{change}")?;
        }
        Ok(())
    }
}

/// Compare `from` against `into`, both fully linked.
pub fn diff(from: &Model, into: &Model) -> SchemaDiff {
    let mut out = Vec::new();
    diff_enums(from, into, &mut out);
    diff_bitfields(from, into, &mut out);
    diff_roles(from, into, &mut out);
    diff_structs(from, into, &mut out);
    debug!(target: "tabula::diff", changes = out.len(), "compared models");
    SchemaDiff { changes: out }
}

// ==================== Enumerations ====================

fn diff_enums(from: &Model, into: &Model, out: &mut Vec<Change>) {
    for enm in &into.enums {
        match from.find_enum(&enm.name) {
            None => out.push(Change::AddEnum { name: enm.name.clone() }),
            Some(old) => diff_enum(&from[old], enm, out),
        }
    }
    for enm in &from.enums {
        if into.find_enum(&enm.name).is_none() {
            out.push(Change::DelEnum { name: enm.name.clone() });
        }
    }
}

fn diff_enum(from: &Enum, into: &Enum, out: &mut Vec<Change>) {
    let enm = &into.name;
    for item in &into.items {
        let Some(old) = from.item_index(&item.name).map(|i| &from.items[i]) else {
            out.push(Change::AddEnumItem { enm: enm.clone(), item: item.name.clone() });
            continue;
        };
        diff_enum_item(enm, old, item, out);
    }
    for item in &from.items {
        if into.item_index(&item.name).is_none() {
            out.push(Change::DelEnumItem { enm: enm.clone(), item: item.name.clone() });
        }
    }
    if from.doc != into.doc {
        out.push(Change::ModEnumComment { name: enm.clone() });
    }
}

fn diff_enum_item(enm: &SmolStr, from: &EnumItem, into: &EnumItem, out: &mut Vec<Change>) {
    if from.value != into.value {
        out.push(Change::ModEnumItemValue {
            enm: enm.clone(),
            item: into.name.clone(),
            from: from.value,
            into: into.value,
        });
    }
    if from.doc != into.doc {
        out.push(Change::ModEnumItemComment { enm: enm.clone(), item: into.name.clone() });
    }
}

// ==================== Bitfields ====================

fn bit_item<'a>(bitf: &'a Bitfield, name: &str) -> Option<&'a BitItem> {
    bitf.items.iter().find(|i| i.name.eq_ignore_ascii_case(name))
}

fn diff_bitfields(from: &Model, into: &Model, out: &mut Vec<Change>) {
    for bitf in &into.bitfields {
        match from.find_bitfield(&bitf.name) {
            None => out.push(Change::AddBitfield { name: bitf.name.clone() }),
            Some(old) => diff_bitfield(&from[old], bitf, out),
        }
    }
    for bitf in &from.bitfields {
        if into.find_bitfield(&bitf.name).is_none() {
            out.push(Change::DelBitfield { name: bitf.name.clone() });
        }
    }
}

fn diff_bitfield(from: &Bitfield, into: &Bitfield, out: &mut Vec<Change>) {
    let bitf = &into.name;
    for item in &into.items {
        let Some(old) = bit_item(from, &item.name) else {
            out.push(Change::AddBitItem { bitf: bitf.clone(), item: item.name.clone() });
            continue;
        };
        if old.index != item.index {
            out.push(Change::ModBitItemValue {
                bitf: bitf.clone(),
                item: item.name.clone(),
                from: old.index,
                into: item.index,
            });
        }
        if old.doc != item.doc {
            out.push(Change::ModBitItemComment { bitf: bitf.clone(), item: item.name.clone() });
        }
    }
    for item in &from.items {
        if bit_item(into, &item.name).is_none() {
            out.push(Change::DelBitItem { bitf: bitf.clone(), item: item.name.clone() });
        }
    }
    if from.doc != into.doc {
        out.push(Change::ModBitfieldComment { name: bitf.clone() });
    }
}

// ==================== Roles ====================

fn diff_roles(from: &Model, into: &Model, out: &mut Vec<Change>) {
    for rid in into.role_ids() {
        let role = &into[rid];
        let Some(old) = from.find_role(&role.name) else {
            out.push(Change::AddRole { name: role.name.clone() });
            continue;
        };
        let was = from[old].parent.map(|p| from[p].name.clone());
        let now = role.parent.map(|p| into[p].name.clone());
        let same = match (&was, &now) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            (a, b) => a == b,
        };
        if !same {
            out.push(Change::ModRoleParent { name: role.name.clone(), from: was, into: now });
        }
    }
    for rid in from.role_ids() {
        let role = &from[rid];
        if into.find_role(&role.name).is_none() {
            out.push(Change::DelRole { name: role.name.clone() });
        }
    }
}

// ==================== Structs ====================

fn diff_structs(from: &Model, into: &Model, out: &mut Vec<Change>) {
    for sid in into.struct_ids() {
        match from.find_struct(&into[sid].name) {
            None => out.push(Change::AddStruct { name: into[sid].name.clone() }),
            Some(old) => diff_struct(from, old, into, sid, out),
        }
    }
    for sid in from.struct_ids() {
        if into.find_struct(&from[sid].name).is_none() {
            out.push(Change::DelStruct { name: from[sid].name.clone() });
        }
    }
}

fn diff_struct(from: &Model, fsid: StructId, into: &Model, isid: StructId, out: &mut Vec<Change>) {
    let strct = into[isid].name.clone();

    for &fid in &into[isid].fields {
        let field = &into[fid];
        match from.find_field(fsid, &field.name) {
            None => out.push(Change::AddField { strct: strct.clone(), field: field.name.clone() }),
            Some(old) => diff_field(&strct, from, &from[old], into, field, out),
        }
    }
    for &fid in &from[fsid].fields {
        if into.find_field(isid, &from[fid].name).is_none() {
            out.push(Change::DelField { strct: strct.clone(), field: from[fid].name.clone() });
        }
    }

    let was = uniques(from, fsid);
    let now = uniques(into, isid);
    for fields in now.iter().filter(|u| !was.contains(u)) {
        out.push(Change::AddUnique { strct: strct.clone(), fields: fields.clone() });
    }
    for fields in was.iter().filter(|u| !now.contains(u)) {
        out.push(Change::DelUnique { strct: strct.clone(), fields: fields.clone() });
    }

    match (from[fsid].insert.is_some(), into[isid].insert.is_some()) {
        (false, true) => out.push(Change::AddInsert { strct: strct.clone() }),
        (true, false) => out.push(Change::DelInsert { strct: strct.clone() }),
        _ => {}
    }

    let was = functions(from, fsid);
    let now = functions(into, isid);
    for (function, doc) in &now {
        match was.iter().find(|(f, _)| f == function) {
            None => out.push(Change::AddQuery { strct: strct.clone(), function: function.clone() }),
            Some((_, old)) if old != doc => out.push(Change::ModQueryComment {
                strct: strct.clone(),
                function: function.clone(),
            }),
            Some(_) => {}
        }
    }
    for (function, _) in &was {
        if !now.iter().any(|(f, _)| f == function) {
            out.push(Change::DelQuery { strct: strct.clone(), function: function.clone() });
        }
    }

    if from[fsid].doc != into[isid].doc {
        out.push(Change::ModStructComment { name: strct });
    }
}

/// Unique constraints of a struct as sorted field names.
fn uniques(model: &Model, sid: StructId) -> Vec<Vec<SmolStr>> {
    model[sid]
        .uniques
        .iter()
        .map(|&u| {
            let mut names: Vec<SmolStr> = model[u]
                .fields
                .iter()
                .map(|f| SmolStr::new(f.name.to_ascii_lowercase()))
                .collect();
            names.sort();
            names
        })
        .collect()
}

/// Function names and comments of every query, update and delete of a
/// struct.
fn functions(model: &Model, sid: StructId) -> Vec<(String, Option<&str>)> {
    let searches = model
        .search_ids()
        .filter(|&q| model[q].parent == sid)
        .map(|q| (search_name(model, &model[q]), model[q].doc.as_deref()));
    let updates = model
        .update_ids()
        .filter(|&u| model[u].parent == sid)
        .map(|u| (update_name(model, &model[u]), model[u].doc.as_deref()));
    searches.chain(updates).collect()
}

fn flags(field: &Field) -> Vec<&'static str> {
    [
        (field.rowid, "rowid"),
        (field.unique, "unique"),
        (field.nullable, "null"),
        (field.noexport, "noexport"),
    ]
    .into_iter()
    .filter_map(|(set, name)| set.then_some(name))
    .collect()
}

/// Both names, when both exist and differ.
fn renamed(was: Option<&SmolStr>, now: Option<&SmolStr>) -> Option<(SmolStr, SmolStr)> {
    match (was, now) {
        (Some(a), Some(b)) if !a.eq_ignore_ascii_case(b) => Some((a.clone(), b.clone())),
        _ => None,
    }
}

/// `source:target` of a reference, both qualified by struct.
fn reference_of(model: &Model, field: &Field) -> Option<String> {
    let r = field.reference.as_ref()?;
    let source = r.source.get().map(|s| model.qualified_name(s))?;
    let target = r.target.get().map(|t| model.qualified_name(t))?;
    Some(format!("{source}:{target}"))
}

fn diff_field(
    strct: &SmolStr,
    from_model: &Model,
    from: &Field,
    into_model: &Model,
    into: &Field,
    out: &mut Vec<Change>,
) {
    let field = &into.name;

    if from.ty != into.ty {
        out.push(Change::ModFieldType {
            strct: strct.clone(),
            field: field.clone(),
            from: from.ty,
            into: into.ty,
        });
    }

    let was = Actions { update: from.actup, delete: from.actdel };
    let now = Actions { update: into.actup, delete: into.actdel };
    if was != now {
        out.push(Change::ModFieldActions {
            strct: strct.clone(),
            field: field.clone(),
            from: was,
            into: now,
        });
    }

    let (was, now) = (flags(from), flags(into));
    if was != now {
        out.push(Change::ModFieldFlags {
            strct: strct.clone(),
            field: field.clone(),
            from: was,
            into: now,
        });
    }

    let was = from.bitf.as_ref().and_then(|b| b.get()).map(|b| &from_model[b].name);
    let now = into.bitf.as_ref().and_then(|b| b.get()).map(|b| &into_model[b].name);
    if let Some((from, into)) = renamed(was, now) {
        out.push(Change::ModFieldBitfield {
            strct: strct.clone(),
            field: field.clone(),
            from,
            into,
        });
    }

    let was = from.enm.as_ref().and_then(|e| e.get()).map(|e| &from_model[e].name);
    let now = into.enm.as_ref().and_then(|e| e.get()).map(|e| &into_model[e].name);
    if let Some((from, into)) = renamed(was, now) {
        out.push(Change::ModFieldEnum {
            strct: strct.clone(),
            field: field.clone(),
            from,
            into,
        });
    }

    let was = reference_of(from_model, from);
    let now = reference_of(into_model, into);
    let same = match (&was, &now) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        (a, b) => a == b,
    };
    if !same {
        out.push(Change::ModFieldReference {
            strct: strct.clone(),
            field: field.clone(),
            from: was,
            into: now,
        });
    }

    if from.doc != into.doc {
        out.push(Change::ModFieldComment { strct: strct.clone(), field: field.clone() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Compiler;
    use pretty_assertions::assert_eq;

    fn compiled(src: &str) -> Model {
        let mut compiler = Compiler::new();
        compiler.parse_str("diff.ort", src);
        compiler.finish().unwrap()
    }

    fn changes(from: &str, into: &str) -> Vec<String> {
        diff(&compiled(from), &compiled(into))
            .changes
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    const BASE: &str = "\
        struct company { field id int rowid; field name text; };\n\
        struct user {\n\
          field id int rowid;\n\
          field cid:company.id int;\n\
          field company struct cid;\n\
          field nick text;\n\
          search id: name byid;\n\
        };";

    // ==================== Identity Tests ====================

    #[test]
    fn test_same_model_has_no_changes() {
        let d = diff(&compiled(BASE), &compiled(BASE));
        assert!(d.is_empty());
        assert_eq!(d.summary(), "No changes");
    }

    #[test]
    fn test_names_match_ignoring_case() {
        let from = "struct Company { field ID int rowid; };";
        let into = "struct company { field id int rowid; };";
        assert!(diff(&compiled(from), &compiled(into)).is_empty());
    }

    // ==================== Struct Tests ====================

    #[test]
    fn test_structs_added_and_removed() {
        let from = "struct a { field id int rowid; };\nstruct b { field id int rowid; };";
        let into = "struct a { field id int rowid; };\nstruct c { field id int rowid; };";
        assert_eq!(changes(from, into), vec!["added struct c", "removed struct b"]);
    }

    #[test]
    fn test_struct_comment() {
        let from = "struct a { field id int rowid; };";
        let into = "struct a { field id int rowid; comment \"Rows.\"; };";
        assert_eq!(changes(from, into), vec!["changed comment of struct a"]);
    }

    #[test]
    fn test_uniques_and_insert() {
        let from = "struct a { field id int rowid; field x int; field y int; unique x, y; };";
        let into = "struct a { field id int rowid; field x int; field y int; unique y, id; insert; };";
        assert_eq!(
            changes(from, into),
            vec!["added unique a(id, y)", "removed unique a(x, y)", "added insert on a"]
        );
    }

    #[test]
    fn test_reordered_unique_is_unchanged() {
        let from = "struct a { field id int rowid; field x int; field y int; unique x, y; };";
        let into = "struct a { field id int rowid; field x int; field y int; unique y, x; };";
        assert_eq!(changes(from, into), Vec::<String>::new());
    }

    // ==================== Field Tests ====================

    #[test]
    fn test_fields_added_and_removed() {
        let into = BASE.replace("field nick text;", "field email email;");
        assert_eq!(
            changes(BASE, &into),
            vec!["added field user.email", "removed field user.nick"]
        );
    }

    #[test]
    fn test_field_type_flags_and_comment() {
        let into = BASE.replace(
            "field nick text;",
            "field nick int null comment \"Display name.\";",
        );
        assert_eq!(
            changes(BASE, &into),
            vec![
                "changed type of field user.nick: text -> int",
                "changed flags of field user.nick: [] -> [null]",
                "changed comment of field user.nick",
            ]
        );
    }

    #[test]
    fn test_field_actions() {
        let into = BASE.replace("field cid:company.id int;", "field cid:company.id int actdel cascade;");
        assert_eq!(
            changes(BASE, &into),
            vec!["changed actions of field user.cid: none/none -> none/cascade"]
        );
    }

    #[test]
    fn test_field_reference() {
        let from = "struct a { field id int rowid; field code int unique; };\n\
                    struct b { field id int rowid; field aid:a.id int; };";
        let into = "struct a { field id int rowid; field code int unique; };\n\
                    struct b { field id int rowid; field aid:a.code int; };";
        let d = diff(&compiled(from), &compiled(into));
        assert_eq!(
            d.changes,
            vec![Change::ModFieldReference {
                strct: "b".into(),
                field: "aid".into(),
                from: Some("b.aid:a.id".to_string()),
                into: Some("b.aid:a.code".to_string()),
            }]
        );
    }

    #[test]
    fn test_field_enum_and_bitfield() {
        let from = "enum e1 { item x; }; enum e2 { item y; };\n\
                    bits b1 { item r 0; }; bits b2 { item w 1; };\n\
                    struct a { field id int rowid; field state enum e1; field perms bits b1; };";
        let into = "enum e1 { item x; }; enum e2 { item y; };\n\
                    bits b1 { item r 0; }; bits b2 { item w 1; };\n\
                    struct a { field id int rowid; field state enum e2; field perms bits b2; };";
        assert_eq!(
            changes(from, into),
            vec![
                "changed bitfield of field a.perms: b1 -> b2",
                "changed enum of field a.state: e1 -> e2",
            ]
        );
    }

    // ==================== Query Tests ====================

    #[test]
    fn test_queries_added_and_removed() {
        let into = BASE.replace(
            "search id: name byid;",
            "list name; update name: id; delete id;",
        );
        assert_eq!(
            changes(BASE, &into),
            vec![
                "added function user_list_by_name",
                "added function user_update_name_by_id",
                "added function user_delete_by_id",
                "removed function user_get_byid",
            ]
        );
    }

    #[test]
    fn test_query_comment() {
        let into = BASE.replace("search id: name byid;", "search id: name byid comment \"By id.\";");
        let d = diff(&compiled(BASE), &compiled(&into));
        assert_eq!(
            d.changes,
            vec![Change::ModQueryComment {
                strct: "user".into(),
                function: "user_get_byid".to_string(),
            }]
        );
    }

    // ==================== Enumeration Tests ====================

    #[test]
    fn test_enum_changes() {
        let from = "enum state { item open 1; item shut 2; item gone 3; };\n\
                    enum old { item a; };\n\
                    struct a { field id int rowid; };";
        let into = "enum state { item open 1; item shut 5 comment \"Closed.\"; item new 6; comment \"State.\"; };\n\
                    enum fresh { item a; };\n\
                    struct a { field id int rowid; };";
        assert_eq!(
            changes(from, into),
            vec![
                "changed value of item state.shut: 2 -> 5",
                "changed comment of item state.shut",
                "added item state.new",
                "removed item state.gone",
                "changed comment of enum state",
                "added enum fresh",
                "removed enum old",
            ]
        );
    }

    // ==================== Bitfield Tests ====================

    #[test]
    fn test_bitfield_changes() {
        let from = "bits perms { item read 0; item write 1; item exec 2; };\n\
                    struct a { field id int rowid; };";
        let into = "bits perms { item read 0 comment \"May read.\"; item write 3; item admin 4; };\n\
                    bits flags { item lit 0; };\n\
                    struct a { field id int rowid; };";
        assert_eq!(
            changes(from, into),
            vec![
                "changed comment of item perms.read",
                "changed index of item perms.write: 1 -> 3",
                "added item perms.admin",
                "removed item perms.exec",
                "added bitfield flags",
            ]
        );
    }

    // ==================== Role Tests ====================

    #[test]
    fn test_role_changes() {
        let from = "roles { role user { role admin; }; role guest; };\n\
                    struct a { field id int rowid; };";
        let into = "roles { role user; role admin; role staff; };\n\
                    struct a { field id int rowid; };";
        assert_eq!(
            changes(from, into),
            vec![
                "moved role admin: user -> all",
                "added role staff",
                "removed role guest",
            ]
        );
    }

    // ==================== Report Tests ====================

    #[test]
    fn test_summary_and_serialization() {
        let from = "struct a { field id int rowid; field x int; };";
        let into = "struct a { field id int rowid; field x real; field y int; };\nstruct b { field id int rowid; };";
        let d = diff(&compiled(from), &compiled(into));
        assert_eq!(d.summary(), "2 added, 0 removed, 1 modified");

        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["changes"][0]["change"], "mod_field_type");
        assert_eq!(json["changes"][0]["from"], "int");
        assert_eq!(json["changes"][0]["into"], "real");
        assert_eq!(json["changes"][2]["change"], "add_struct");
    }
}
