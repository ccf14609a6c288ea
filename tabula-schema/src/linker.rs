//! Resolution of deferred lookups.
//!
//! The linker drains a [`ResolveQueue`] one [`Batch`] at a time. A batch
//! only runs if every earlier batch succeeded, since its items dereference
//! what earlier batches filled in: a nested struct adopts the target of a
//! foreign key, and a dotted path walks through nested structs.

use smallvec::SmallVec;
use smol_str::SmolStr;
use tracing::{debug, trace};

use crate::diag::{Diagnostics, Position};
use crate::model::{
    DefaultValue, FieldId, FieldPath, FieldType, Link, Model, Modifier, Operator, RoleMapId,
    RoleMapKind, RoleRef, Search, SearchId, SearchKind, UniqueId, UpdateId,
};
use crate::resolve::{Batch, PathSlot, Resolve, ResolveQueue};

/// Resolve every queued lookup against `model`.
///
/// Returns `false` if any lookup failed; each failure records one or more
/// errors in `diag`.
pub fn link(model: &mut Model, queue: &ResolveQueue, diag: &mut Diagnostics) -> bool {
    Linker { model, diag }.run(queue)
}

struct Linker<'a> {
    model: &'a mut Model,
    diag: &'a mut Diagnostics,
}

impl Linker<'_> {
    fn run(&mut self, queue: &ResolveQueue) -> bool {
        for batch in [Batch::Direct, Batch::Dependent, Batch::Paths] {
            let mut failed = 0usize;
            for item in queue.batch(batch) {
                trace!(?item, "resolving");
                if !self.resolve(item) {
                    failed += 1;
                }
            }
            debug!(?batch, failed, "resolve batch done");
            if failed > 0 {
                return false;
            }
        }

        // `all` grants cover every operation once operations have grants.
        for rm in queue.rolemaps() {
            if self.model[rm].kind == RoleMapKind::All {
                self.spread_all_grant(rm);
            }
        }
        true
    }

    fn error(&mut self, pos: &Position, text: impl Into<String>) {
        self.diag.error(pos, text);
    }

    fn resolve(&mut self, item: &Resolve) -> bool {
        match item {
            Resolve::ForeignKey {
                field,
                strct,
                target,
            } => self.foreign_key(*field, strct, target),
            Resolve::StructField { field, source } => self.struct_field(*field, source),
            Resolve::Enum { field, name } => self.enumeration(*field, name),
            Resolve::Bitfield { field, name } => self.bitfield(*field, name),
            Resolve::DefaultItem { field, name } => self.default_item(*field, name),
            Resolve::Role {
                rolemap,
                index,
                name,
            } => self.role(*rolemap, *index, name),
            Resolve::RoleMap { rolemap } => self.rolemap(*rolemap),
            Resolve::Unique {
                unique,
                index,
                name,
            } => self.unique(*unique, *index, name),
            Resolve::Constraint {
                update,
                index,
                name,
            } => self.constraint(*update, *index, name),
            Resolve::Modifier {
                update,
                index,
                name,
            } => self.modifier(*update, *index, name),
            Resolve::Path {
                search,
                slot,
                names,
            } => self.path(*search, *slot, names),
        }
    }

    // ==================== Fields ====================

    fn foreign_key(&mut self, fid: FieldId, strct: &str, target: &str) -> bool {
        let pos = self.model[fid].pos.clone();
        let Some(tid) = self
            .model
            .find_struct(strct)
            .and_then(|s| self.model.find_field(s, target))
        else {
            self.error(&pos, "unknown reference target");
            return false;
        };

        let mut ok = true;
        if self.model[fid].ty != self.model[tid].ty {
            self.error(&pos, "source and target reference type mismatch");
            ok = false;
        }
        if !self.model[tid].rowid && !self.model[tid].unique {
            self.error(&pos, "target reference not a rowid or unique");
            ok = false;
        }
        if let Some(r) = self.model[fid].reference.as_mut() {
            r.target = Link::Resolved(tid);
        }
        ok
    }

    fn struct_field(&mut self, fid: FieldId, source: &str) -> bool {
        let pos = self.model[fid].pos.clone();
        let sid = self.model[fid].parent;
        let mut ok = true;

        let src = self.model.find_field(sid, source);
        let target = match src {
            Some(s) if self.model[s].is_foreign_key() => self.model[s].target(),
            Some(_) => {
                self.error(&pos, "struct source is not a reference");
                ok = false;
                None
            }
            None => {
                self.error(&pos, "unknown struct source");
                ok = false;
                None
            }
        };
        if target.is_none() {
            self.error(&pos, "struct source's reference was not resolved");
            ok = false;
        }

        if let Some(r) = self.model[fid].reference.as_mut() {
            if let Some(s) = src {
                r.source = Link::Resolved(s);
            }
            if let Some(t) = target {
                r.target = Link::Resolved(t);
            }
        }
        ok
    }

    fn enumeration(&mut self, fid: FieldId, name: &str) -> bool {
        match self.model.find_enum(name) {
            Some(eid) => {
                self.model[fid].enm = Some(Link::Resolved(eid));
                true
            }
            None => {
                let pos = self.model[fid].pos.clone();
                self.error(&pos, "unknown enum type");
                false
            }
        }
    }

    fn bitfield(&mut self, fid: FieldId, name: &str) -> bool {
        match self.model.find_bitfield(name) {
            Some(bid) => {
                self.model[fid].bitf = Some(Link::Resolved(bid));
                true
            }
            None => {
                let pos = self.model[fid].pos.clone();
                self.error(&pos, "unknown bitfield type");
                false
            }
        }
    }

    fn default_item(&mut self, fid: FieldId, name: &str) -> bool {
        let found = self.model[fid]
            .enm
            .as_ref()
            .and_then(Link::get)
            .and_then(|eid| self.model[eid].item_index(name));
        let Some(i) = found else {
            let pos = self.model[fid].pos.clone();
            self.error(&pos, "unknown enumeration item");
            return false;
        };
        if let Some(DefaultValue::Item { index, .. }) = self.model[fid].default.as_mut() {
            *index = Link::Resolved(i);
        }
        true
    }

    // ==================== Roles ====================

    fn role(&mut self, rm: RoleMapId, index: usize, name: &str) -> bool {
        let found = self.model.find_role(name);
        let rref = &mut self.model[rm].roles[index];
        match found {
            Some(rid) => {
                rref.role = Link::Resolved(rid);
                true
            }
            None => {
                let pos = rref.pos.clone();
                self.error(&pos, "unknown role");
                false
            }
        }
    }

    /// Attach a grant to the operation it names.
    fn rolemap(&mut self, rm: RoleMapId) -> bool {
        let sid = self.model[rm].parent;
        let kind = self.model[rm].kind;
        let name = self.model[rm].name.clone();
        let spos = self.model[sid].pos.clone();

        match kind {
            RoleMapKind::All => true,
            RoleMapKind::Insert => match self.model[sid].insert.as_mut() {
                Some(ins) => {
                    ins.rolemap = Some(rm);
                    true
                }
                None => {
                    self.error(&spos, "insert operation not specified");
                    false
                }
            },
            RoleMapKind::Update | RoleMapKind::Delete => {
                let list = if kind == RoleMapKind::Update {
                    &self.model[sid].updates
                } else {
                    &self.model[sid].deletes
                };
                let found = list.iter().copied().find(|&u| {
                    self.model[u]
                        .name
                        .as_ref()
                        .zip(name.as_ref())
                        .is_some_and(|(a, b)| a.eq_ignore_ascii_case(b))
                });
                match found {
                    Some(uid) => {
                        self.model[uid].rolemap = Some(rm);
                        true
                    }
                    None => {
                        let text = format!("{kind} operation not found: {}", display(&name));
                        self.error(&spos, text);
                        false
                    }
                }
            }
            RoleMapKind::Count | RoleMapKind::Iterate | RoleMapKind::List | RoleMapKind::Search => {
                let want = kind.search_kind();
                let found = self.model[sid].searches.iter().copied().find(|&s| {
                    let srch = &self.model[s];
                    Some(srch.kind) == want
                        && srch
                            .name
                            .as_ref()
                            .zip(name.as_ref())
                            .is_some_and(|(a, b)| a.eq_ignore_ascii_case(b))
                });
                match found {
                    Some(s) => {
                        self.model[s].rolemap = Some(rm);
                        true
                    }
                    None => {
                        let text = format!("{kind} operation not found: {}", display(&name));
                        self.error(&spos, text);
                        false
                    }
                }
            }
            RoleMapKind::NoExport => {
                let fields: Vec<FieldId> = match &name {
                    None => self.model[sid].fields.clone(),
                    Some(n) => match self.model.find_field(sid, n) {
                        Some(f) => vec![f],
                        None => {
                            self.error(&spos, format!("field not found: {n}"));
                            return false;
                        }
                    },
                };
                for fid in fields {
                    match self.model[fid].rolemap {
                        None => self.model[fid].rolemap = Some(rm),
                        Some(dst) if dst != rm => self.cover(dst, rm),
                        Some(_) => {}
                    }
                }
                true
            }
        }
    }

    /// Copy the `all` grant into every operation of its struct.
    fn spread_all_grant(&mut self, all: RoleMapId) {
        let sid = self.model[all].parent;
        let s = &self.model[sid];
        let updates: Vec<UpdateId> = s.deletes.iter().chain(s.updates.iter()).copied().collect();
        let searches: Vec<SearchId> = s.searches.clone();

        for uid in updates {
            match self.model[uid].rolemap {
                None => self.model[uid].rolemap = Some(all),
                Some(dst) => self.cover(dst, all),
            }
        }
        for id in searches {
            match self.model[id].rolemap {
                None => self.model[id].rolemap = Some(all),
                Some(dst) => self.cover(dst, all),
            }
        }
        match self.model[sid].insert.as_ref().map(|i| i.rolemap) {
            Some(None) => {
                if let Some(ins) = self.model[sid].insert.as_mut() {
                    ins.rolemap = Some(all);
                }
            }
            Some(Some(dst)) => self.cover(dst, all),
            None => {}
        }
    }

    /// Add to `dst` every role of `src` it lacks.
    fn cover(&mut self, dst: RoleMapId, src: RoleMapId) {
        if dst == src {
            return;
        }
        let missing: Vec<RoleRef> = self.model[src]
            .roles
            .iter()
            .filter(|r| {
                r.role.is_resolved() && !self.model[dst].roles.iter().any(|d| d.role == r.role)
            })
            .cloned()
            .collect();
        self.model[dst].roles.extend(missing);
    }

    // ==================== Struct Members ====================

    fn unique(&mut self, uid: UniqueId, index: usize, name: &str) -> bool {
        let sid = self.model[uid].parent;
        let pos = self.model[uid].fields[index].pos.clone();
        let Some(fid) = self.model.find_field(sid, name) else {
            self.error(&pos, "unknown field");
            return false;
        };
        let fname = self.model[fid].name.clone();
        if self.model[fid].is_struct() {
            self.error(&pos, format!("unique field may not be a struct: {fname}"));
            return false;
        }
        let dupe = self.model[uid]
            .fields
            .iter()
            .any(|f| f.field == Link::Resolved(fid));
        if dupe {
            self.error(&pos, format!("duplicate field: {fname}"));
            return false;
        }
        self.model[uid].fields[index].field = Link::Resolved(fid);
        true
    }

    fn constraint(&mut self, uid: UpdateId, index: usize, name: &str) -> bool {
        let sid = self.model[uid].parent;
        let pos = self.model[uid].constraints[index].pos.clone();
        let op = self.model[uid].constraints[index].op;
        let Some(fid) = self.model.find_field(sid, name) else {
            self.error(&pos, "constraint field not found");
            return false;
        };
        self.model[uid].constraints[index].field = Link::Resolved(fid);

        let f = &self.model[fid];
        let (ty, nullable) = (f.ty, f.nullable);
        let mut ok = true;
        if ty == FieldType::Struct {
            self.error(&pos, "constraint field may not be a struct");
            ok = false;
        }
        if ty == FieldType::Password
            && !op.is_unary()
            && !matches!(op, Operator::StrEq | Operator::StrNeq)
        {
            self.error(&pos, "constraint field may not be a password in hashing mode");
            ok = false;
        }
        if op.is_unary() && !nullable {
            self.diag
                .warn(&pos, "notnull or isnull operator on field that's never null");
        }
        if op == Operator::Like && !ty.is_text_like() {
            self.error(&pos, "LIKE operator on non-textual field.");
            ok = false;
        }
        ok
    }

    fn modifier(&mut self, uid: UpdateId, index: usize, name: &str) -> bool {
        let sid = self.model[uid].parent;
        let pos = self.model[uid].modifiers[index].pos.clone();
        let modifier = self.model[uid].modifiers[index].modifier;
        let Some(fid) = self.model.find_field(sid, name) else {
            self.error(&pos, "modifier field not found");
            return false;
        };
        self.model[uid].modifiers[index].field = Link::Resolved(fid);

        let ty = self.model[fid].ty;
        if ty == FieldType::Struct {
            self.error(&pos, "modifier field may not be a struct");
            return false;
        }
        match modifier {
            Modifier::Concat if !ty.is_concatenable() => {
                self.error(&pos, "concatenate modification on non-textual and non-binary field");
                false
            }
            Modifier::Inc | Modifier::Dec if !ty.is_numeric() => {
                self.error(&pos, "increment or decrement modification on non-numeric field");
                false
            }
            _ => true,
        }
    }

    // ==================== Paths ====================

    /// Walk a dotted path from the query's struct through nested structs.
    fn path(&mut self, id: SearchId, slot: PathSlot, names: &[SmolStr]) -> bool {
        let Some(pos) = path_slot(&self.model[id], slot).map(|p| p.pos.clone()) else {
            return false;
        };
        let mut strct = self.model[id].parent;
        let mut chain: SmallVec<[FieldId; 4]> = SmallVec::new();

        for (i, name) in names.iter().enumerate() {
            let Some(fid) = self.model.find_field(strct, name) else {
                self.error(&pos, format!("field not found: {name}"));
                return false;
            };
            chain.push(fid);
            if i + 1 == names.len() {
                break;
            }
            let f = &self.model[fid];
            if !f.is_struct() {
                let text = format!("non-terminal field must be a struct: {}", f.name);
                self.error(&pos, text);
                return false;
            }
            if f.source().is_some_and(|s| self.model[s].nullable) {
                let text = format!("non-terminal field cannot be null: {}", f.name);
                self.error(&pos, text);
                return false;
            }
            match self.model.nested_struct(fid) {
                Some(next) => strct = next,
                None => return false,
            }
        }

        let Some(&terminal) = chain.last() else {
            return false;
        };
        let f = &self.model[terminal];
        let failure = match slot {
            PathSlot::Term(_) | PathSlot::Order(_) if f.is_struct() => {
                Some(format!("terminal field cannot be a struct: {}", f.name))
            }
            PathSlot::Aggregate | PathSlot::Group
                if f.is_struct() || f.nullable || f.ty == FieldType::Password =>
            {
                Some(format!(
                    "terminal field cannot be null, a struct, or a password: {}",
                    f.name
                ))
            }
            PathSlot::Distinct if !f.is_struct() => {
                Some(format!("terminal field must be a struct: {}", f.name))
            }
            PathSlot::Distinct if f.source().is_some_and(|s| self.model[s].nullable) => {
                Some(format!("terminal field cannot be null: {}", f.name))
            }
            _ => None,
        };
        if let Some(text) = failure {
            self.error(&pos, text);
            return false;
        }

        if slot == PathSlot::Distinct {
            let Some(target) = self.model.nested_struct(terminal) else {
                return false;
            };
            match self.model[id].kind {
                SearchKind::List => self.model[target].has_queue = true,
                SearchKind::Iterate => self.model[target].has_iterator = true,
                _ => {}
            }
            if let Some(d) = self.model[id].distinct.as_mut() {
                d.target = Link::Resolved(target);
            }
        }

        if let Some(p) = path_slot_mut(&mut self.model[id], slot) {
            p.chain = Link::Resolved(chain);
        }
        true
    }
}

fn display(name: &Option<SmolStr>) -> &str {
    name.as_deref().unwrap_or("")
}

fn path_slot(s: &Search, slot: PathSlot) -> Option<&FieldPath> {
    match slot {
        PathSlot::Term(i) => s.terms.get(i).map(|t| &t.path),
        PathSlot::Order(i) => s.order.get(i).map(|o| &o.path),
        PathSlot::Aggregate => s.aggregate.as_ref().map(|a| &a.path),
        PathSlot::Group => s.group.as_ref(),
        PathSlot::Distinct => s.distinct.as_ref().map(|d| &d.path),
    }
}

fn path_slot_mut(s: &mut Search, slot: PathSlot) -> Option<&mut FieldPath> {
    match slot {
        PathSlot::Term(i) => s.terms.get_mut(i).map(|t| &mut t.path),
        PathSlot::Order(i) => s.order.get_mut(i).map(|o| &mut o.path),
        PathSlot::Aggregate => s.aggregate.as_mut().map(|a| &mut a.path),
        PathSlot::Group => s.group.as_mut(),
        PathSlot::Distinct => s.distinct.as_mut().map(|d| &mut d.path),
    }
}
