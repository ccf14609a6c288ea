//! Canonical DSL output for a linked model.
//!
//! The output parses back into an equivalent model: roles come first, then
//! enums, bitfields and structs in model order. Enum items with assigned
//! values keep their value in a trailing `# value N` comment, so reading
//! the output back assigns the same values again.

use chrono::DateTime;

use crate::model::{
    Bitfield, DefaultValue, Enum, Field, FieldType, Label, LimitValue, Model, Modifier, Operator,
    OrderDir, RoleId, RoleMap, RoleMapKind, Search, Struct, Update, UpdateAction, UpdateKind,
};

const INDENT: &str = "    ";

/// Print `model` as schema source.
pub fn write_model(model: &Model) -> String {
    let mut output = String::new();

    if model.has_roles() {
        write_roles(&mut output, model);
    }
    for enm in &model.enums {
        write_enum(&mut output, model, enm);
    }
    for bitf in &model.bitfields {
        write_bitfield(&mut output, model, bitf);
    }
    for sid in model.ordered_structs() {
        write_struct(&mut output, model, &model[sid]);
    }
    output
}

fn comment(output: &mut String, doc: &Option<String>) {
    if let Some(doc) = doc {
        output.push_str(&format!(" comment \"{doc}\""));
    }
}

/// A block's own `comment "...";` clause.
fn doc_clause(output: &mut String, doc: &Option<String>) {
    if let Some(doc) = doc {
        output.push_str(&format!("{INDENT}comment \"{doc}\";\n"));
    }
}

fn labels(output: &mut String, model: &Model, labels: &[Label]) {
    for label in labels {
        output.push_str(" jslabel");
        if label.lang > 0 {
            if let Some(lang) = model.langs.get(label.lang) {
                output.push_str(&format!(".{lang}"));
            }
        }
        output.push_str(&format!(" \"{}\"", label.text));
    }
}

// ==================== Roles ====================

fn write_roles(output: &mut String, model: &Model) {
    output.push_str("roles {\n");
    if let Some(all) = model.find_role("all") {
        for &child in &model[all].children {
            write_role(output, model, child, 1);
        }
    }
    output.push_str("};\n\n");
}

fn write_role(output: &mut String, model: &Model, rid: RoleId, depth: usize) {
    let role = &model[rid];
    output.push_str(&INDENT.repeat(depth));
    output.push_str(&format!("role {}", role.name));
    comment(output, &role.doc);
    if !role.children.is_empty() {
        output.push_str(" {\n");
        for &child in &role.children {
            write_role(output, model, child, depth + 1);
        }
        output.push_str(&INDENT.repeat(depth));
        output.push('}');
    }
    output.push_str(";\n");
}

// ==================== Enums and Bitfields ====================

fn write_enum(output: &mut String, model: &Model, enm: &Enum) {
    output.push_str(&format!("enum {} {{\n", enm.name));
    for item in &enm.items {
        output.push_str(&format!("{INDENT}item {}", item.name));
        if !item.auto {
            output.push_str(&format!(" {}", item.value));
        }
        labels(output, model, &item.labels);
        comment(output, &item.doc);
        output.push(';');
        if item.auto {
            output.push_str(&format!(" # value {}", item.value));
        }
        output.push('\n');
    }
    if !enm.null_labels.is_empty() {
        output.push_str(&format!("{INDENT}isnull"));
        labels(output, model, &enm.null_labels);
        output.push_str(";\n");
    }
    doc_clause(output, &enm.doc);
    output.push_str("};\n\n");
}

fn write_bitfield(output: &mut String, model: &Model, bitf: &Bitfield) {
    output.push_str(&format!("bitfield {} {{\n", bitf.name));
    for item in &bitf.items {
        output.push_str(&format!("{INDENT}item {} {}", item.name, item.index));
        labels(output, model, &item.labels);
        comment(output, &item.doc);
        output.push_str(";\n");
    }
    for (word, set) in [("isunset", &bitf.unset_labels), ("isnull", &bitf.null_labels)] {
        if !set.is_empty() {
            output.push_str(&format!("{INDENT}{word}"));
            labels(output, model, set);
            output.push_str(";\n");
        }
    }
    doc_clause(output, &bitf.doc);
    output.push_str("};\n\n");
}

// ==================== Structs ====================

fn write_struct(output: &mut String, model: &Model, strct: &Struct) {
    output.push_str(&format!("struct {} {{\n", strct.name));
    for &fid in &strct.fields {
        write_field(output, model, &model[fid]);
    }
    for &id in &strct.searches {
        write_search(output, &model[id]);
    }
    for &id in strct.updates.iter().chain(&strct.deletes) {
        write_update(output, &model[id]);
    }
    if strct.insert.is_some() {
        output.push_str(&format!("{INDENT}insert;\n"));
    }
    for &id in &strct.uniques {
        let names: Vec<_> = model[id].fields.iter().map(|f| f.name.as_str()).collect();
        output.push_str(&format!("{INDENT}unique {};\n", names.join(", ")));
    }
    for &id in &strct.rolemaps {
        write_grant(output, model, &model[id]);
    }
    doc_clause(output, &strct.doc);
    output.push_str("};\n\n");
}

fn write_field(output: &mut String, model: &Model, field: &Field) {
    output.push_str(&format!("{INDENT}field {}", field.name));

    if field.ty != FieldType::Struct {
        if let Some(target) = field.target() {
            let t = &model[target];
            output.push_str(&format!(":{}.{}", model[t.parent].name, t.name));
        }
    }
    output.push_str(&format!(" {}", field.ty.as_str()));
    match field.ty {
        FieldType::Struct => {
            if let Some(source) = field.source() {
                output.push_str(&format!(" {}", model[source].name));
            }
        }
        FieldType::Enum => {
            if let Some(e) = field.enm.as_ref().and_then(|e| e.get()) {
                output.push_str(&format!(" {}", model[e].name));
            }
        }
        FieldType::Bitfield => {
            if let Some(b) = field.bitf.as_ref().and_then(|b| b.get()) {
                output.push_str(&format!(" {}", model[b].name));
            }
        }
        _ => {}
    }

    for (set, word) in [
        (field.rowid, "rowid"),
        (field.unique, "unique"),
        (field.nullable, "null"),
        (field.noexport, "noexport"),
    ] {
        if set {
            output.push_str(&format!(" {word}"));
        }
    }

    if let Some(default) = &field.default {
        output.push_str(&format!(" default {}", default_value(field.ty, default)));
    }
    for limit in &field.limits {
        let value = match limit.value {
            LimitValue::Integer(v) => v.to_string(),
            LimitValue::Decimal(v) => v.to_string(),
            LimitValue::Length(v) => v.to_string(),
        };
        output.push_str(&format!(" limit {} {value}", limit.op.as_str()));
    }
    for (word, action) in [("actdel", field.actdel), ("actup", field.actup)] {
        if action != UpdateAction::None {
            output.push_str(&format!(" {word} {}", action.as_str()));
        }
    }
    comment(output, &field.doc);
    output.push_str(";\n");
}

fn default_value(ty: FieldType, value: &DefaultValue) -> String {
    match value {
        DefaultValue::Integer(v) if ty == FieldType::Date => DateTime::from_timestamp(*v, 0)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| v.to_string()),
        DefaultValue::Integer(v) => v.to_string(),
        DefaultValue::Decimal(v) => v.to_string(),
        DefaultValue::Text(s) => format!("\"{s}\""),
        DefaultValue::Item { name, .. } => name.to_string(),
    }
}

/// Starts the parameter list of a query or update with `:` on first use.
struct Params<'a> {
    output: &'a mut String,
    open: bool,
}

impl Params<'_> {
    fn push(&mut self, text: &str) {
        if !self.open {
            self.output.push(':');
            self.open = true;
        }
        self.output.push_str(text);
    }
}

fn write_search(output: &mut String, srch: &Search) {
    output.push_str(&format!("{INDENT}{}", srch.kind.as_str()));
    let terms: Vec<_> = srch
        .terms
        .iter()
        .map(|t| match t.op {
            Operator::Eq => t.path.fname(),
            op => format!("{} {}", t.path.fname(), op.as_str()),
        })
        .collect();
    if !terms.is_empty() {
        output.push_str(&format!(" {}", terms.join(", ")));
    }

    let mut params = Params {
        output: &mut *output,
        open: false,
    };
    if let Some(name) = &srch.name {
        params.push(&format!(" name {name}"));
    }
    if !srch.order.is_empty() {
        let order: Vec<_> = srch
            .order
            .iter()
            .map(|o| match o.dir {
                OrderDir::Asc => o.path.fname(),
                OrderDir::Desc => format!("{} desc", o.path.fname()),
            })
            .collect();
        params.push(&format!(" order {}", order.join(", ")));
    }
    if srch.limit != 0 || srch.offset != 0 {
        let mut limit = format!(" limit {}", srch.limit);
        if srch.offset != 0 {
            limit.push_str(&format!(", {}", srch.offset));
        }
        params.push(&limit);
    }
    if let Some(aggr) = &srch.aggregate {
        params.push(&format!(" {} {}", aggr.kind.as_str(), aggr.path.fname()));
    }
    if let Some(group) = &srch.group {
        params.push(&format!(" grouprow {}", group.fname()));
    }
    if let Some(distinct) = &srch.distinct {
        let path = if distinct.path.components.is_empty() {
            ".".to_string()
        } else {
            distinct.path.fname()
        };
        params.push(&format!(" distinct {path}"));
    }
    if let Some(doc) = &srch.doc {
        params.push(&format!(" comment \"{doc}\""));
    }
    output.push_str(";\n");
}

fn write_update(output: &mut String, up: &Update) {
    output.push_str(&format!("{INDENT}{}", up.kind.as_str()));

    if up.kind == UpdateKind::Modify && !up.all {
        let mods: Vec<_> = up
            .modifiers
            .iter()
            .map(|m| match m.modifier {
                Modifier::Set => m.name.to_string(),
                other => format!("{} {}", m.name, other.as_str()),
            })
            .collect();
        output.push_str(&format!(" {}", mods.join(", ")));
    }

    let trailing = up.name.is_some() || up.doc.is_some();
    if up.constraints.is_empty() && !trailing {
        output.push_str(";\n");
        return;
    }
    if up.kind == UpdateKind::Modify {
        output.push(':');
    }
    let cons: Vec<_> = up
        .constraints
        .iter()
        .map(|c| match c.op {
            Operator::Eq => c.name.to_string(),
            op => format!("{} {}", c.name, op.as_str()),
        })
        .collect();
    if !cons.is_empty() {
        output.push_str(&format!(" {}", cons.join(", ")));
    }
    if trailing {
        output.push(':');
        if let Some(name) = &up.name {
            output.push_str(&format!(" name {name}"));
        }
        comment(output, &up.doc);
    }
    output.push_str(";\n");
}

fn write_grant(output: &mut String, model: &Model, rm: &RoleMap) {
    let roles: Vec<_> = rm
        .roles
        .iter()
        .map(|r| match r.role.get() {
            Some(role) => model[role].name.to_string(),
            None => r.name.to_string(),
        })
        .collect();
    output.push_str(&format!(
        "{INDENT}roles {} {{ {}",
        roles.join(", "),
        rm.kind.as_str()
    ));
    if !matches!(rm.kind, RoleMapKind::All | RoleMapKind::Insert) {
        if let Some(name) = &rm.name {
            output.push_str(&format!(" {name}"));
        }
    }
    output.push_str("; };\n");
}
