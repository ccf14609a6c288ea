//! Join aliases for nested structs.
//!
//! A query may join the same struct more than once through different
//! nested fields, so every nested path reachable from a struct gets its
//! own short alias: `_a` through `_z`, then `_ba`, `_bb` and so on.
//! Dotted query terms then carry the alias of the struct holding their
//! last field.

use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::debug;

use crate::diag::{Diagnostics, Position};
use crate::model::{Model, Operator, SearchId, StructId};

/// Largest number of aliases one struct can hold.
pub const MAX_ALIASES: usize = 26 * 26 * 26;

/// The alias for the `n`th nested path of a struct.
pub fn alias_name(n: usize) -> SmolStr {
    let letter = |i: usize| char::from(b'a' + (i % 26) as u8);
    let mut s = String::from("_");
    if n >= 26 * 26 {
        s.push(letter(n / 26 / 26));
    }
    if n >= 26 {
        s.push(letter(n / 26));
    }
    s.push(letter(n));
    SmolStr::new(s)
}

/// Assign aliases to every struct, then to every query term.
///
/// Expects a linked model without recursive structs. Returns `false` if a
/// struct has more than [`MAX_ALIASES`] nested paths.
pub fn assign(model: &mut Model, diag: &mut Diagnostics) -> bool {
    for sid in model.struct_ids() {
        let mut aliases = IndexMap::new();
        let mut stack = vec![sid];
        if let Err(pos) = walk(model, sid, None, &mut stack, &mut aliases) {
            diag.error(&pos, "too many aliases");
            return false;
        }
        debug!(strct = %model[sid].name, count = aliases.len(), "assigned aliases");
        model[sid].aliases = aliases;
    }

    for id in model.search_ids() {
        model[id].is_unique = is_unique(model, id);
        let sid = model[id].parent;
        let aliases = model[sid].aliases.clone();
        let srch = &mut model[id];
        let paths = srch
            .terms
            .iter_mut()
            .map(|t| &mut t.path)
            .chain(srch.order.iter_mut().map(|o| &mut o.path))
            .chain(srch.aggregate.iter_mut().map(|a| &mut a.path))
            .chain(srch.group.iter_mut());
        for path in paths {
            path.alias = path.prefix().and_then(|p| aliases.get(&p).cloned());
        }
    }
    true
}

/// Pre-order walk of the nested fields of `sid`.
fn walk(
    model: &Model,
    sid: StructId,
    prefix: Option<&str>,
    stack: &mut Vec<StructId>,
    out: &mut IndexMap<String, SmolStr>,
) -> Result<(), Position> {
    for &fid in &model[sid].fields {
        let Some(target) = model.nested_struct(fid) else {
            continue;
        };
        if stack.contains(&target) {
            continue;
        }
        let f = &model[fid];
        if out.len() >= MAX_ALIASES {
            return Err(f.pos.clone());
        }
        let name = match prefix {
            Some(p) => format!("{p}.{}", f.name),
            None => f.name.to_string(),
        };
        out.insert(name.clone(), alias_name(out.len()));

        stack.push(target);
        walk(model, target, Some(&name), stack, out)?;
        stack.pop();
    }
    Ok(())
}

/// Whether the terms of a query pin down at most one row.
///
/// That holds when a direct field that is a row identifier or unique is
/// compared for equality, or when every field of one composite unique
/// constraint is.
fn is_unique(model: &Model, id: SearchId) -> bool {
    let srch = &model[id];
    let equal: Vec<_> = srch
        .terms
        .iter()
        .filter(|t| t.op == Operator::Eq && t.path.components.len() == 1)
        .filter_map(|t| t.path.terminal())
        .collect();

    if equal
        .iter()
        .any(|&f| model[f].rowid || model[f].unique)
    {
        return true;
    }
    model[srch.parent].uniques.iter().any(|&u| {
        model[u]
            .fields
            .iter()
            .all(|uf| uf.field.get().is_some_and(|f| equal.contains(&f)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linker::link;
    use crate::parser::ParseContext;
    use pretty_assertions::assert_eq;

    fn assigned(src: &str) -> ParseContext {
        let mut cx = ParseContext::new();
        assert!(cx.parse("alias.ort", src), "{:?}", cx.diag.messages());
        assert!(link(&mut cx.model, &cx.queue, &mut cx.diag));
        assert!(assign(&mut cx.model, &mut cx.diag));
        cx
    }

    fn aliases(cx: &ParseContext, strct: &str) -> Vec<(String, String)> {
        let sid = cx.model.find_struct(strct).unwrap();
        cx.model[sid]
            .aliases
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }

    const GRAPH: &str = "\
        struct company { field id int rowid; field name text; };\n\
        struct user {\n\
          field id int rowid; field cid:company.id int; field company struct cid;\n\
          field name text unique;\n\
        };\n\
        struct session {\n\
          field id int rowid;\n\
          field uid:user.id int; field user struct uid;\n\
          field oid:user.id int; field owner struct oid;\n\
          search user.company.name, owner.name: name bynames;\n\
          search id: name byid;\n\
          list uid, oid: name bypair;\n\
          unique uid, oid;\n\
        };";

    #[test]
    fn test_alias_names() {
        assert_eq!(alias_name(0), "_a");
        assert_eq!(alias_name(25), "_z");
        assert_eq!(alias_name(26), "_ba");
        assert_eq!(alias_name(27), "_bb");
        assert_eq!(alias_name(26 * 26), "_baa");
        assert_eq!(alias_name(MAX_ALIASES - 1), "_zzz");
    }

    #[test]
    fn test_single_nested_struct() {
        let cx = assigned(GRAPH);
        assert_eq!(
            aliases(&cx, "user"),
            vec![("company".to_string(), "_a".to_string())]
        );
        assert!(aliases(&cx, "company").is_empty());
    }

    #[test]
    fn test_repeated_target_gets_distinct_aliases() {
        let cx = assigned(GRAPH);
        assert_eq!(
            aliases(&cx, "session"),
            vec![
                ("user".to_string(), "_a".to_string()),
                ("user.company".to_string(), "_b".to_string()),
                ("owner".to_string(), "_c".to_string()),
                ("owner.company".to_string(), "_d".to_string()),
            ]
        );
    }

    #[test]
    fn test_assignment_is_deterministic() {
        let a = assigned(GRAPH);
        let b = assigned(GRAPH);
        assert_eq!(aliases(&a, "session"), aliases(&b, "session"));
    }

    #[test]
    fn test_terms_carry_prefix_alias() {
        let cx = assigned(GRAPH);
        let s = &cx.model.searches[0];
        assert_eq!(s.terms[0].path.alias.as_deref(), Some("_b"));
        assert_eq!(s.terms[1].path.alias.as_deref(), Some("_c"));
        assert_eq!(cx.model.searches[1].terms[0].path.alias, None);
    }

    #[test]
    fn test_unique_searches() {
        let cx = assigned(GRAPH);
        let flags: Vec<_> = cx.model.searches.iter().map(|s| s.is_unique).collect();
        // bynames, byid, bypair
        assert_eq!(flags, vec![false, true, true]);
    }
}
