//! Checks that need a fully linked model.
//!
//! [`check_recursion`] runs before aliases are assigned, since alias
//! assignment walks nested structs. [`validate`] runs last: it rejects
//! duplicate constraints and grants, checks every query against the types
//! of its terms, then orders structs by height and marks those that reach
//! a nullable foreign key.
//!
//! Each group of checks only runs if the groups before it passed.

use tracing::debug;

use crate::diag::Diagnostics;
use crate::model::{
    FieldType, Model, Operator, RoleMapId, SearchId, SearchKind, StructId, UniqueId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    Open,
    Done,
}

/// Reject structs that nest themselves, directly or through other structs.
///
/// Records one "contains recursive references" error per cycle, at the
/// struct the cycle returns to. The walk abandons a struct at its first
/// back edge, so further nested fields closing the same cycle stay quiet.
pub fn check_recursion(model: &Model, diag: &mut Diagnostics) -> bool {
    let mut state = vec![Visit::New; model.structs.len()];
    let mut cycles = 0;
    for sid in model.struct_ids() {
        if state[sid.index()] == Visit::New && visit(model, sid, &mut state, diag) {
            cycles += 1;
        }
    }
    cycles == 0
}

/// Depth-first walk from `sid`; returns whether a cycle was reported.
fn visit(model: &Model, sid: StructId, state: &mut [Visit], diag: &mut Diagnostics) -> bool {
    state[sid.index()] = Visit::Open;
    let mut found = false;
    for &fid in &model[sid].fields {
        let Some(target) = model.nested_struct(fid) else {
            continue;
        };
        found = match state[target.index()] {
            Visit::Open => {
                diag.error(&model[target].pos, "contains recursive references");
                true
            }
            Visit::New => visit(model, target, state, diag),
            Visit::Done => false,
        };
        if found {
            break;
        }
    }
    state[sid.index()] = Visit::Done;
    found
}

/// Run the post-link checks, then compute heights, the struct order and
/// the nullable-reference flags.
pub fn validate(model: &mut Model, diag: &mut Diagnostics) -> bool {
    let before = diag.error_count();

    for sid in model.struct_ids() {
        check_uniques(model, sid, diag);
    }
    if diag.error_count() > before {
        return false;
    }
    for sid in model.struct_ids() {
        normalize_uniques(model, sid);
    }

    for rm in (0..model.rolemaps.len()).map(RoleMapId::new) {
        check_duplicate_roles(model, rm, diag);
    }
    if diag.error_count() > before {
        return false;
    }
    for rm in (0..model.rolemaps.len()).map(RoleMapId::new) {
        check_overlapping_roles(model, rm, diag);
    }
    if diag.error_count() > before {
        return false;
    }

    if model.has_roles() {
        for sid in model.struct_ids() {
            check_role_ops(model, sid, diag);
        }
    }

    for id in model.search_ids() {
        check_aggregate(model, id, diag);
    }
    if diag.error_count() > before {
        return false;
    }
    for id in model.search_ids() {
        check_search(model, id, diag);
    }
    if diag.error_count() > before {
        return false;
    }

    order_by_height(model);
    mark_nullrefs(model);
    true
}

// ==================== Uniqueness ====================

/// A unique constraint repeating the field set of an earlier one is an
/// error, reported once at the later constraint.
fn check_uniques(model: &Model, sid: StructId, diag: &mut Diagnostics) {
    let uniques = &model[sid].uniques;
    for (i, &u) in uniques.iter().enumerate() {
        let earlier = uniques[..i].iter().find(|&&e| same_fields(model, u, e));
        if let Some(&e) = earlier {
            let text = format!("duplicate unique statements: {}", model[e].pos);
            diag.error(&model[u].pos, text);
        }
    }
}

fn same_fields(model: &Model, a: UniqueId, b: UniqueId) -> bool {
    let (a, b) = (&model[a].fields, &model[b].fields);
    a.len() == b.len()
        && a.iter().all(|f| b.iter().any(|g| f.field.get() == g.field.get()))
}

fn normalize_uniques(model: &mut Model, sid: StructId) {
    for u in model[sid].uniques.clone() {
        model[u].fields.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

// ==================== Role Grants ====================

fn check_duplicate_roles(model: &Model, rm: RoleMapId, diag: &mut Diagnostics) {
    let roles = &model[rm].roles;
    for (i, r) in roles.iter().enumerate() {
        if roles[..i].iter().any(|e| e.role.is_resolved() && e.role == r.role) {
            diag.error(&r.pos, "duplicate operation role");
        }
    }
}

/// Granting an operation to a role and to one of its descendants is an
/// error, since the ancestor already covers the descendant.
fn check_overlapping_roles(model: &Model, rm: RoleMapId, diag: &mut Diagnostics) {
    let roles = &model[rm].roles;
    for rs in roles {
        let Some(ancestor) = rs.role.get() else {
            continue;
        };
        for rrs in roles {
            let Some(role) = rrs.role.get() else {
                continue;
            };
            if role != ancestor && model.role_descends_from(role, ancestor) {
                let text = format!(
                    "overlapping role: {}, {}",
                    model[role].name, model[ancestor].name
                );
                diag.error(&rs.pos, text);
            }
        }
    }
}

fn check_role_ops(model: &Model, sid: StructId, diag: &mut Diagnostics) {
    let s = &model[sid];
    for &id in &s.searches {
        if model[id].rolemap.is_none() {
            diag.warn(&model[id].pos, "role not assigned to query function");
        }
    }
    for &id in &s.deletes {
        if model[id].rolemap.is_none() {
            diag.warn(&model[id].pos, "role not assigned to delete function");
        }
    }
    for &id in &s.updates {
        if model[id].rolemap.is_none() {
            diag.warn(&model[id].pos, "role not assigned to update function");
        }
    }
    if let Some(ins) = s.insert.as_ref().filter(|i| i.rolemap.is_none()) {
        diag.warn(&ins.pos, "role not assigned to insert function");
    }
}

// ==================== Queries ====================

fn check_aggregate(model: &Model, id: SearchId, diag: &mut Diagnostics) {
    let srch = &model[id];
    let (Some(aggr), Some(group)) = (&srch.aggregate, &srch.group) else {
        return;
    };
    let (Some(a), Some(g)) = (aggr.path.terminal(), group.terminal()) else {
        return;
    };
    if a == g {
        diag.error(&group.pos, "same column for group and constraint");
    }
    if model[a].parent != model[g].parent {
        diag.error(&group.pos, "structure for group and constraint must be the same");
    }
}

fn check_search(model: &Model, id: SearchId, diag: &mut Diagnostics) {
    let srch = &model[id];
    let terms: Vec<_> = srch
        .terms
        .iter()
        .filter_map(|t| t.path.terminal().map(|f| (t, &model[f])))
        .collect();

    // Counting goes through SQL, which cannot compare hashes.
    if srch.kind == SearchKind::Count {
        for (t, f) in &terms {
            let string_op = matches!(t.op, Operator::StrEq | Operator::StrNeq);
            if f.ty == FieldType::Password && !t.op.is_unary() && !string_op {
                diag.error(
                    &t.path.pos,
                    "passwords for count only accept unary and string operators",
                );
            }
        }
    }

    if srch.kind == SearchKind::Search && srch.terms.is_empty() && srch.limit != 1 {
        diag.warn(
            &srch.pos,
            "single-result search without parameters and without a limit of one",
        );
    }
    if srch.kind != SearchKind::Search && srch.is_unique {
        diag.warn(&srch.pos, "multiple-result search on a unique field");
    }
    if srch.kind == SearchKind::Search && !srch.is_unique && srch.limit != 1 {
        diag.warn(
            &srch.pos,
            "single-result search on a non-unique field without a limit of one",
        );
    }

    for (t, f) in &terms {
        if t.op.is_unary() && !f.nullable {
            diag.warn(&t.path.pos, "null operator on non-null field");
        }
    }
    for (t, f) in &terms {
        if matches!(t.op, Operator::And | Operator::Or) && !f.ty.is_bitwise() {
            diag.error(
                &t.path.pos,
                "bit operations only available on bit, bitfield, and integer types",
            );
        }
    }
    for (t, f) in &terms {
        if f.ty == FieldType::Password && !t.op.allowed_on_password() {
            diag.error(
                &t.path.pos,
                "passwords only accept unary or equality operators",
            );
        }
    }
    for (t, f) in &terms {
        if t.op == Operator::Like && !f.ty.is_text_like() {
            diag.error(&t.path.pos, "LIKE operator on non-textual field.");
        }
    }

    if srch.distinct.is_some() {
        for (t, f) in &terms {
            let string_op = matches!(t.op, Operator::StrEq | Operator::StrNeq);
            if f.ty == FieldType::Password && !t.op.is_unary() && !string_op {
                diag.error(
                    &t.path.pos,
                    "password queries not allowed when searching on distinct subsets",
                );
            }
        }
    }
}

// ==================== Ordering ====================

/// Set every struct's height and sort [`Model::order`] by ascending
/// height, keeping declaration order among equals.
fn order_by_height(model: &mut Model) {
    let mut memo = vec![None; model.structs.len()];
    for sid in model.struct_ids() {
        let h = height(model, sid, &mut memo);
        model[sid].height = h;
    }

    let mut order: Vec<StructId> = model.struct_ids().collect();
    order.sort_by_key(|&sid| model[sid].height);
    debug!(
        order = ?order.iter().map(|&s| model[s].name.as_str()).collect::<Vec<_>>(),
        "ordered structs"
    );
    model.order = order;
}

/// One more than the tallest struct nested in `sid`; zero for none.
fn height(model: &Model, sid: StructId, memo: &mut [Option<usize>]) -> usize {
    if let Some(h) = memo[sid.index()] {
        return h;
    }
    let mut h = 0;
    for &fid in &model[sid].fields {
        if let Some(target) = model.nested_struct(fid) {
            h = h.max(height(model, target, memo) + 1);
        }
    }
    memo[sid.index()] = Some(h);
    h
}

fn mark_nullrefs(model: &mut Model) {
    let mut memo = vec![None; model.structs.len()];
    for sid in model.struct_ids() {
        let reaches = reaches_null(model, sid, &mut memo);
        model[sid].has_nullrefs = reaches;
    }
}

/// Whether `sid` nests, at any depth, a struct through a nullable key.
fn reaches_null(model: &Model, sid: StructId, memo: &mut [Option<bool>]) -> bool {
    if let Some(r) = memo[sid.index()] {
        return r;
    }
    let mut reaches = false;
    for &fid in &model[sid].fields {
        let Some(target) = model.nested_struct(fid) else {
            continue;
        };
        let nullable = model[fid].source().is_some_and(|s| model[s].nullable);
        if nullable || reaches_null(model, target, memo) {
            reaches = true;
            break;
        }
    }
    memo[sid.index()] = Some(reaches);
    reaches
}
