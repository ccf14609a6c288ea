//! What one role may do with a linked model.
//!
//! A role may use an operation granted to it or to any of its ancestors.
//! Every query the role may run makes its struct readable, along with each
//! struct nested below it through fields the role may see. The report
//! records every such access path.

use serde::Serialize;
use smol_str::SmolStr;

use crate::error::{SchemaError, SchemaResult};
use crate::model::{
    FieldId, FieldType, Model, Operator, RoleId, RoleMapId, Search, SearchKind, StructId,
    Update, UpdateKind,
};

/// Access report for one role.
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    /// The audited role.
    pub role: SmolStr,
    /// One entry per struct, in model order.
    pub structs: Vec<StructAudit>,
}

/// What the role may do with one struct.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StructAudit {
    /// Struct name.
    pub name: SmolStr,
    /// Fields and whether the role sees them; empty if the role cannot
    /// read the struct at all.
    pub data: Vec<FieldAccess>,
    /// Queries through which rows of the struct are read.
    pub access_from: Vec<AccessPath>,
    /// Insert operation, if allowed.
    pub insert: Option<String>,
    /// Allowed updates.
    pub updates: Vec<String>,
    /// Allowed deletes.
    pub deletes: Vec<String>,
    /// Allowed single-row searches.
    pub searches: Vec<String>,
    /// Allowed list queries.
    pub lists: Vec<String>,
    /// Allowed iterate queries.
    pub iterates: Vec<String>,
}

/// A field and whether it is exported to the role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldAccess {
    /// Field name.
    pub field: SmolStr,
    /// Whether the role sees the field's value.
    pub export: bool,
}

/// A query and the nested fields it follows to reach a struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessPath {
    /// Name of the query.
    pub function: String,
    /// Nested fields from the query's struct; empty for the struct itself.
    pub path: Vec<SmolStr>,
}

/// Build the access report for the role called `role`.
pub fn audit(model: &Model, role: &str) -> SchemaResult<AuditReport> {
    let rid = model
        .find_role(role)
        .ok_or_else(|| SchemaError::UnknownRole {
            name: role.to_string(),
        })?;
    Ok(Auditor { model, role: rid }.report())
}

struct Auditor<'a> {
    model: &'a Model,
    role: RoleId,
}

impl Auditor<'_> {
    fn report(&self) -> AuditReport {
        let order = self.model.ordered_structs();
        let mut structs: Vec<StructAudit> = order
            .iter()
            .map(|&sid| self.operations(sid))
            .collect();

        let mut stack = Vec::new();
        for &sid in &order {
            for &id in &self.model[sid].searches {
                if self.allowed(self.model[id].rolemap) {
                    let function = search_name(self.model, &self.model[id]);
                    self.mark(&order, &mut structs, &function, sid, &mut stack);
                }
            }
        }

        for (audit, &sid) in structs.iter_mut().zip(&order) {
            if !audit.access_from.is_empty() {
                audit.data = self.model[sid]
                    .fields
                    .iter()
                    .map(|&fid| FieldAccess {
                        field: self.model[fid].name.clone(),
                        export: self.exported(fid),
                    })
                    .collect();
            }
        }

        AuditReport {
            role: self.model[self.role].name.clone(),
            structs,
        }
    }

    /// Whether a grant covers the role, directly or through an ancestor.
    fn allowed(&self, rolemap: Option<RoleMapId>) -> bool {
        rolemap.is_some_and(|rm| {
            self.model[rm]
                .resolved_roles()
                .any(|granted| self.model.role_descends_from(self.role, granted))
        })
    }

    fn exported(&self, fid: FieldId) -> bool {
        let f = &self.model[fid];
        !f.noexport && f.ty != FieldType::Password && !self.allowed(f.rolemap)
    }

    fn operations(&self, sid: StructId) -> StructAudit {
        let model = self.model;
        let s = &model[sid];
        let mut audit = StructAudit {
            name: s.name.clone(),
            ..Default::default()
        };

        if let Some(ins) = &s.insert {
            if self.allowed(ins.rolemap) {
                audit.insert = Some(format!("{}_insert", s.name));
            }
        }
        for &id in &s.updates {
            if self.allowed(model[id].rolemap) {
                audit.updates.push(update_name(model, &model[id]));
            }
        }
        for &id in &s.deletes {
            if self.allowed(model[id].rolemap) {
                audit.deletes.push(update_name(model, &model[id]));
            }
        }
        for &id in &s.searches {
            let srch = &model[id];
            if !self.allowed(srch.rolemap) {
                continue;
            }
            let list = match srch.kind {
                SearchKind::Search => &mut audit.searches,
                SearchKind::List => &mut audit.lists,
                SearchKind::Iterate => &mut audit.iterates,
                SearchKind::Count => continue,
            };
            list.push(search_name(model, srch));
        }
        audit
    }

    /// Record that `function` reads `sid` through `stack`, then follow the
    /// nested fields the role may see.
    fn mark(
        &self,
        order: &[StructId],
        structs: &mut [StructAudit],
        function: &str,
        sid: StructId,
        stack: &mut Vec<SmolStr>,
    ) {
        if let Some(i) = order.iter().position(|&s| s == sid) {
            structs[i].access_from.push(AccessPath {
                function: function.to_string(),
                path: stack.clone(),
            });
        }
        for &fid in &self.model[sid].fields {
            let Some(target) = self.model.nested_struct(fid) else {
                continue;
            };
            if self.allowed(self.model[fid].rolemap) {
                continue;
            }
            stack.push(self.model[fid].name.clone());
            self.mark(order, structs, function, target, stack);
            stack.pop();
        }
    }
}

fn term(name: &str, op: Operator) -> String {
    match op {
        Operator::Eq => name.to_string(),
        op => format!("{name}_{op}"),
    }
}

/// Function name of a query: `user_get_byid`, `user_list_by_name_like`.
pub fn search_name(model: &Model, srch: &Search) -> String {
    let kind = match srch.kind {
        SearchKind::Search => "get",
        other => other.as_str(),
    };
    let strct = &model[srch.parent].name;
    if let Some(name) = &srch.name {
        return format!("{strct}_{kind}_{name}");
    }
    if srch.terms.is_empty() {
        return format!("{strct}_{kind}");
    }
    let terms: Vec<_> = srch.terms.iter().map(|t| term(&t.path.uname(), t.op)).collect();
    format!("{strct}_{kind}_by_{}", terms.join("_"))
}

/// Function name of an update or delete: `user_update_name_by_id`.
pub fn update_name(model: &Model, up: &Update) -> String {
    let strct = &model[up.parent].name;
    let kind = up.kind.as_str();
    if let Some(name) = &up.name {
        return format!("{strct}_{kind}_{name}");
    }
    let mut out = format!("{strct}_{kind}");
    if up.kind == UpdateKind::Modify && !up.all {
        for m in &up.modifiers {
            out.push('_');
            out.push_str(&m.name);
        }
    }
    if !up.constraints.is_empty() {
        let cons: Vec<_> = up.constraints.iter().map(|c| term(&c.name, c.op)).collect();
        out.push_str(&format!("_by_{}", cons.join("_")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linker::link;
    use crate::parser::ParseContext;
    use crate::{alias, validator};
    use pretty_assertions::assert_eq;

    fn compiled(src: &str) -> Model {
        let mut cx = ParseContext::new();
        assert!(cx.parse("audit.ort", src), "{:?}", cx.diag.messages());
        assert!(link(&mut cx.model, &cx.queue, &mut cx.diag), "{:?}", cx.diag.messages());
        assert!(validator::check_recursion(&cx.model, &mut cx.diag));
        assert!(alias::assign(&mut cx.model, &mut cx.diag));
        assert!(validator::validate(&mut cx.model, &mut cx.diag), "{:?}", cx.diag.messages());
        cx.model
    }

    const SCHEMA: &str = "\
        roles { role user { role admin; }; role guest; };\n\
        struct company {\n\
          field id int rowid; field name text; field secret text noexport;\n\
          list: name companies;\n\
          roles user { list companies; };\n\
        };\n\
        struct user {\n\
          field id int rowid; field pass password; field email email unique;\n\
          field cid:company.id int; field company struct cid;\n\
          search id: name byid;\n\
          iterate email: name byemail limit 1;\n\
          update email: id: name setmail;\n\
          delete id: name purge;\n\
          insert;\n\
          roles user { search byid; };\n\
          roles admin { update setmail; iterate byemail; insert; noexport email; };\n\
          roles guest { delete purge; };\n\
        };";

    fn find<'r>(report: &'r AuditReport, name: &str) -> &'r StructAudit {
        report.structs.iter().find(|s| s.name == name).unwrap()
    }

    #[test]
    fn test_unknown_role() {
        let model = compiled(SCHEMA);
        let err = audit(&model, "nobody").unwrap_err();
        assert_eq!(err.to_string(), "role not found: nobody");
    }

    #[test]
    fn test_operations_follow_ancestors() {
        let model = compiled(SCHEMA);
        let report = audit(&model, "admin").unwrap();
        let user = find(&report, "user");
        assert_eq!(user.searches, vec!["user_get_byid"]);
        assert_eq!(user.iterates, vec!["user_iterate_byemail"]);
        assert_eq!(user.insert.as_deref(), Some("user_insert"));
        assert!(user.deletes.is_empty());

        let report = audit(&model, "user").unwrap();
        let user = find(&report, "user");
        assert_eq!(user.searches, vec!["user_get_byid"]);
        assert!(user.iterates.is_empty());
        assert_eq!(user.insert, None);
    }

    #[test]
    fn test_access_paths() {
        let model = compiled(SCHEMA);
        let report = audit(&model, "user").unwrap();
        let company = find(&report, "company");
        assert_eq!(
            company.access_from,
            vec![
                AccessPath {
                    function: "company_list_companies".to_string(),
                    path: vec![],
                },
                AccessPath {
                    function: "user_get_byid".to_string(),
                    path: vec![SmolStr::new("company")],
                },
            ]
        );
        let data: Vec<_> = company.data.iter().map(|f| (f.field.as_str(), f.export)).collect();
        assert_eq!(data, vec![("id", true), ("name", true), ("secret", false)]);
    }

    #[test]
    fn test_grant_hides_fields() {
        let model = compiled(SCHEMA);
        let export = |role: &str| -> Vec<(String, bool)> {
            let report = audit(&model, role).unwrap();
            find(&report, "user")
                .data
                .iter()
                .map(|f| (f.field.to_string(), f.export))
                .collect()
        };
        let admin = export("admin");
        assert!(admin.contains(&("email".to_string(), false)));
        assert!(admin.contains(&("pass".to_string(), false)));
        assert!(export("user").contains(&("email".to_string(), true)));
    }

    #[test]
    fn test_unreachable_struct_has_no_data() {
        let model = compiled(SCHEMA);
        let report = audit(&model, "guest").unwrap();
        let user = find(&report, "user");
        assert!(user.data.is_empty());
        assert!(user.access_from.is_empty());
        assert_eq!(user.deletes, vec!["user_delete_purge"]);
    }

    #[test]
    fn test_function_names() {
        let model = compiled(
            "struct a {\n\
               field id int rowid; field name text;\n\
               list name like, id; count; update name: id neq; update: id; delete: name wipe;\n\
             };",
        );
        let names: Vec<_> = model.searches.iter().map(|s| search_name(&model, s)).collect();
        assert_eq!(names, vec!["a_list_by_name_like_id", "a_count"]);
        let names: Vec<_> = model.updates.iter().map(|u| update_name(&model, u)).collect();
        assert_eq!(names, vec!["a_update_name_by_id_neq", "a_update_by_id", "a_delete_wipe"]);
    }

    #[test]
    fn test_report_serializes() {
        let model = compiled(SCHEMA);
        let report = audit(&model, "admin").unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["role"], "admin");
        assert_eq!(json["structs"][1]["name"], "user");
        assert_eq!(json["structs"][1]["insert"], "user_insert");
    }
}
