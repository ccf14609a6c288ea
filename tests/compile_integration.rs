//! Integration tests for compiling schemas end to end.
//!
//! These tests drive the public `Compiler` over whole inputs and check the
//! linked model and the recorded diagnostics.

use pretty_assertions::assert_eq;
use tabula::prelude::*;
use tabula::schema::model::FieldType;

fn compile(inputs: &[(&str, &str)]) -> Compilation {
    let mut compiler = Compiler::new();
    for (fname, src) in inputs {
        compiler.parse_str(fname, src);
    }
    compiler.compile()
}

fn error_texts(comp: &Compilation) -> Vec<String> {
    comp.diag.errors().map(|m| m.text.clone()).collect()
}

const COMPANY_USER: &str = "\
struct company { field name text; field id int rowid; };
struct user { field cid:company.id int; field company struct cid; field name text; };
";

/// Test the basic foreign reference and alias scenario
#[test]
fn test_company_user_links() {
    let comp = compile(&[("db.ort", COMPANY_USER)]);
    assert!(comp.ok, "{:?}", comp.diag.messages());
    assert_eq!(comp.diag.error_count(), 0);

    let m = &comp.model;
    let company = m.find_struct("company").unwrap();
    let user = m.find_struct("user").unwrap();

    let cid = m.find_field(user, "cid").unwrap();
    let target = m[cid].target().unwrap();
    assert_eq!(m.qualified_name(target), "company.id");

    let nested = m.find_field(user, "company").unwrap();
    assert_eq!(m[nested].ty, FieldType::Struct);
    assert_eq!(m.nested_struct(nested), Some(company));

    let aliases: Vec<_> = m[user].aliases.keys().cloned().collect();
    assert_eq!(aliases, vec!["company".to_string()]);
    assert_eq!(m[user].alias("company"), Some("_a"));
}

/// Test that counts and field flags match the declarations
#[test]
fn test_declarations_are_preserved() {
    let src = "\
        enum state { item active; item banned 5; };\n\
        bits perms { item read 0; item write 1; };\n\
        struct acct {\n\
          field id int rowid;\n\
          field email email unique;\n\
          field nick text null noexport;\n\
          field state enum state;\n\
          field perms bits perms;\n\
        };";
    let comp = compile(&[("decl.ort", src)]);
    assert!(comp.ok, "{:?}", comp.diag.messages());

    let m = &comp.model;
    assert_eq!((m.structs.len(), m.enums.len(), m.bitfields.len()), (1, 1, 1));

    let acct = m.find_struct("acct").unwrap();
    let flags: Vec<_> = m[acct]
        .fields
        .iter()
        .map(|&f| (m[f].name.as_str(), m[f].ty, m[f].rowid, m[f].unique, m[f].nullable, m[f].noexport))
        .collect();
    assert_eq!(
        flags,
        vec![
            ("id", FieldType::Int, true, false, false, false),
            ("email", FieldType::Email, false, true, false, false),
            ("nick", FieldType::Text, false, false, true, true),
            ("state", FieldType::Enum, false, false, false, false),
            ("perms", FieldType::Bitfield, false, false, false, false),
        ]
    );
}

// ==================== Forward Reference Tests ====================

/// Test a reference to a struct declared later in the same input
#[test]
fn test_forward_reference_in_one_input() {
    let src = "\
        struct user { field cid:company.id int; field company struct cid; field name text; };\n\
        struct company { field name text; field id int rowid; };";
    let comp = compile(&[("fwd.ort", src)]);
    assert!(comp.ok, "{:?}", comp.diag.messages());
}

/// Test a reference to a struct declared in a later input
#[test]
fn test_forward_reference_across_inputs() {
    let comp = compile(&[
        ("user.ort", "struct user { field id int rowid; field cid:company.id int; };"),
        ("company.ort", "struct company { field id int rowid; };"),
    ]);
    assert!(comp.ok, "{:?}", comp.diag.messages());
    assert_eq!(comp.model.fnames, vec!["user.ort", "company.ort"]);
}

/// Test an unknown reference target
#[test]
fn test_unresolved_reference() {
    let comp = compile(&[("bad.ort", "struct user { field id int rowid; field cid:company.id int; };")]);
    assert!(!comp.ok);
    assert_eq!(comp.diag.error_count(), 1);
}

// ==================== Recursion Tests ====================

/// Test a struct nesting itself
#[test]
fn test_direct_recursion_rejected() {
    let src = "struct a { field id int rowid; field x:a.id int; field a struct x; };";
    let comp = compile(&[("self.ort", src)]);
    assert!(!comp.ok);
    assert_eq!(error_texts(&comp), vec!["contains recursive references"]);
}

/// Test a cycle through an intermediate struct
#[test]
fn test_indirect_recursion_rejected() {
    let src = "\
        struct a { field id int rowid; field bid:b.id int; field b struct bid; };\n\
        struct b { field id int rowid; field cid:c.id int; field c struct cid; };\n\
        struct c { field id int rowid; field aid:a.id int; field a struct aid; };";
    let comp = compile(&[("cycle.ort", src)]);
    assert!(!comp.ok);
    assert_eq!(error_texts(&comp), vec!["contains recursive references"]);
    // Aliases are never assigned to a recursive graph.
    assert!(comp.model.structs.iter().all(|s| s.aliases.is_empty()));
}

// ==================== Alias Tests ====================

/// Test distinct dotted paths to one target get distinct aliases
#[test]
fn test_distinct_paths_get_distinct_aliases() {
    let src = "\
        struct user { field id int rowid; field name text; };\n\
        struct msg {\n\
          field id int rowid;\n\
          field sid:user.id int; field sender struct sid;\n\
          field rid:user.id int; field recipient struct rid;\n\
          field cid:user.id int; field copy struct cid;\n\
          list sender.name, recipient.name: name pair;\n\
        };";
    let first = compile(&[("msg.ort", src)]);
    let second = compile(&[("msg.ort", src)]);
    assert!(first.ok, "{:?}", first.diag.messages());

    let m = &first.model;
    let msg = m.find_struct("msg").unwrap();
    let table: Vec<_> = m[msg].aliases.iter().map(|(k, v)| (k.clone(), v.to_string())).collect();
    assert_eq!(
        table,
        vec![
            ("sender".to_string(), "_a".to_string()),
            ("recipient".to_string(), "_b".to_string()),
            ("copy".to_string(), "_c".to_string()),
        ]
    );

    let again = second.model.find_struct("msg").unwrap();
    assert_eq!(m[msg].aliases, second.model[again].aliases);

    let terms: Vec<_> = m.searches[0].terms.iter().map(|t| t.path.alias.as_deref()).collect();
    assert_eq!(terms, vec![Some("_a"), Some("_b")]);
}

// ==================== Ordering Tests ====================

/// Test that referenced structs sort below the structs nesting them
#[test]
fn test_height_ordering() {
    let src = "\
        struct post { field id int rowid; field uid:user.id int; field author struct uid; };\n\
        struct tag { field id int rowid; };\n\
        struct user { field id int rowid; field cid:company.id int; field company struct cid; };\n\
        struct company { field id int rowid; };";
    let comp = compile(&[("h.ort", src)]);
    assert!(comp.ok, "{:?}", comp.diag.messages());

    let m = &comp.model;
    for &fid in m.structs.iter().flat_map(|s| &s.fields) {
        if let Some(target) = m.nested_struct(fid) {
            assert!(m[target].height < m[m[fid].parent].height);
        }
    }
    let names: Vec<_> = m.ordered_structs().iter().map(|&s| m[s].name.to_string()).collect();
    assert_eq!(names, vec!["tag", "company", "user", "post"]);
}

// ==================== Validation Tests ====================

/// Test that like on an integer field is rejected
#[test]
fn test_like_on_integer_rejected() {
    let src = "struct user { field id int rowid; field age int; list age like; };";
    let comp = compile(&[("like.ort", src)]);
    assert!(!comp.ok);
    assert_eq!(error_texts(&comp), vec!["LIKE operator on non-textual field."]);
}

/// Test that identical unique sets are reported once
#[test]
fn test_duplicate_unique_rejected() {
    let src = "\
        struct user {\n\
          field id int rowid; field a int; field b int;\n\
          unique a, b;\n\
          unique b, a;\n\
        };";
    let comp = compile(&[("u.ort", src)]);
    assert!(!comp.ok);
    let errors: Vec<_> = comp.diag.errors().map(|m| m.to_string()).collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("u.ort:4:"), "{errors:?}");
    assert!(errors[0].contains("duplicate unique statements: u.ort:3:"), "{errors:?}");
}

const ROLES: &str = "roles { role user { role admin; }; role guest; };\n";

fn with_grant(roles: &str) -> String {
    format!(
        "{ROLES}struct item {{\n\
           field id int rowid;\n\
           search id: name byid;\n\
           roles {roles} {{ search byid; }};\n\
         }};"
    )
}

/// Test granting one operation twice to the same role
#[test]
fn test_duplicate_grant_rejected() {
    let comp = compile(&[("g.ort", &with_grant("guest, guest"))]);
    assert_eq!(error_texts(&comp), vec!["duplicate operation role"]);
}

/// Test granting one operation to a role and its ancestor
#[test]
fn test_overlapping_grant_rejected() {
    let comp = compile(&[("g.ort", &with_grant("admin, user"))]);
    assert_eq!(error_texts(&comp), vec!["overlapping role: admin, user"]);
}

/// Test granting one operation to unrelated roles
#[test]
fn test_unrelated_grants_accepted() {
    let comp = compile(&[("g.ort", &with_grant("admin, guest"))]);
    assert!(comp.ok, "{:?}", comp.diag.messages());
    assert_eq!(comp.diag.error_count(), 0);
}

/// Test that errors from several clauses all surface in one run
#[test]
fn test_errors_accumulate() {
    let src = "\
        struct user {\n\
          field id int rowid;\n\
          field a blah;\n\
          field b int limit zz 3;\n\
          field c text;\n\
        };";
    let comp = compile(&[("many.ort", src)]);
    assert!(!comp.ok);
    assert!(comp.diag.error_count() >= 2, "{:?}", comp.diag.messages());
    // Parsing resumed after both bad fields.
    let user = comp.model.find_struct("user").unwrap();
    assert!(comp.model.find_field(user, "c").is_some());
}

/// Test the failure result carries every error
#[test]
fn test_compile_failed_result() {
    let mut compiler = Compiler::new();
    compiler.parse_str("like.ort", "struct user { field id int rowid; field age int; list age like; };");
    let err = compiler.finish().unwrap_err();
    match &err {
        SchemaError::CompileFailed { count, errors } => {
            assert_eq!(*count, 1);
            assert_eq!(errors[0].to_string(), "like.ort:1:55: error: LIKE operator on non-textual field.");
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ==================== Output Tests ====================

/// Test that a written model compiles back to the same text
#[test]
fn test_written_model_recompiles() {
    let src = format!("{ROLES}{COMPANY_USER}");
    let comp = compile(&[("db.ort", &src)]);
    assert!(comp.ok, "{:?}", comp.diag.messages());

    let text = write_model(&comp.model);
    let again = compile(&[("db.ort", &text)]);
    assert!(again.ok, "{text}\n{:?}", again.diag.messages());
    assert_eq!(write_model(&again.model), text);
}

/// Test the per-role audit over a compiled model
#[test]
fn test_audit_report() {
    let src = format!(
        "{ROLES}\
         struct item {{\n\
           field id int rowid;\n\
           field secret text noexport;\n\
           search id: name byid;\n\
           roles user {{ search byid; }};\n\
         }};"
    );
    let comp = compile(&[("a.ort", &src)]);
    assert!(comp.ok, "{:?}", comp.diag.messages());

    let report = audit(&comp.model, "admin").unwrap();
    let item = &report.structs[0];
    assert_eq!(item.searches, vec!["item_get_byid".to_string()]);
    let exported: Vec<_> = item.data.iter().map(|f| (f.field.as_str(), f.export)).collect();
    assert_eq!(exported, vec![("id", true), ("secret", false)]);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["role"], "admin");

    assert!(matches!(
        audit(&comp.model, "nobody"),
        Err(SchemaError::UnknownRole { .. })
    ));
}

/// Test the model serializes for generators
#[test]
fn test_model_json() {
    let comp = compile(&[("db.ort", COMPANY_USER)]);
    let json: serde_json::Value = serde_json::from_str(&comp.model.to_json().unwrap()).unwrap();
    assert_eq!(json["structs"].as_array().unwrap().len(), 2);
}

// ==================== Diff Tests ====================

/// Test a schema change across inputs split over several files
#[test]
fn test_diff_between_versions() {
    let from = compile(&[("db.ort", COMPANY_USER)]);
    let into = compile(&[
        ("company.ort", "struct company { field name text unique; field id int rowid; };"),
        (
            "user.ort",
            "struct user { field cid:company.id int; field company struct cid; \
             field email email; search email: name byemail; };",
        ),
    ]);
    assert!(from.ok && into.ok, "{:?}", into.diag.messages());

    let d = diff(&from.model, &into.model);
    let lines: Vec<_> = d.changes.iter().map(ToString::to_string).collect();
    assert_eq!(
        lines,
        vec![
            "changed flags of field company.name: [] -> [unique]",
            "added field user.email",
            "removed field user.name",
            "added function user_get_byemail",
        ]
    );
    assert_eq!(d.summary(), "2 added, 1 removed, 1 modified");
    assert!(diff(&into.model, &into.model).is_empty());
}
