//! Structured fuzzing for the tabula schema compiler.
//!
//! This target generates semi-valid schemas using the `arbitrary` crate so
//! that inputs reach the linker and validator. Whenever a schema compiles,
//! its printed form must compile back to the same text.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_schema_structured
//! ```

#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use tabula_schema::{Compiler, write_model};

/// A generated field type.
#[derive(Debug, Arbitrary)]
enum FuzzFieldType {
    Int,
    Real,
    Text,
    Email,
    Date,
    Epoch,
    Password,
    Blob,
    /// Foreign key into the `n`th struct, with a nested field over it.
    Foreign(u8),
}

/// A generated field flag.
#[derive(Debug, Arbitrary)]
enum FuzzFlag {
    None,
    Unique,
    Null,
    NoExport,
    LimitGe(i16),
}

impl FuzzFlag {
    fn to_string(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::Unique => " unique".to_string(),
            Self::Null => " null".to_string(),
            Self::NoExport => " noexport".to_string(),
            Self::LimitGe(v) => format!(" limit ge {v}"),
        }
    }
}

/// A generated field.
#[derive(Debug, Arbitrary)]
struct FuzzField {
    field_type: FuzzFieldType,
    flag: FuzzFlag,
}

/// A generated query operator.
#[derive(Debug, Arbitrary)]
enum FuzzOperator {
    Eq,
    Like,
    Isnull,
    Ge,
    And,
}

impl FuzzOperator {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "",
            Self::Like => " like",
            Self::Isnull => " isnull",
            Self::Ge => " ge",
            Self::And => " and",
        }
    }
}

/// A generated query over field indices.
#[derive(Debug, Arbitrary)]
struct FuzzSearch {
    list: bool,
    terms: Vec<(u8, FuzzOperator)>,
    limit: Option<u8>,
}

/// A generated struct.
#[derive(Debug, Arbitrary)]
struct FuzzStruct {
    fields: Vec<FuzzField>,
    searches: Vec<FuzzSearch>,
    unique: Option<(u8, u8)>,
}

/// A generated schema.
#[derive(Debug, Arbitrary)]
struct FuzzSchema {
    structs: Vec<FuzzStruct>,
}

impl FuzzSchema {
    fn to_string(&self) -> String {
        let count = self.structs.len().max(1);
        let mut out = String::new();

        for (i, s) in self.structs.iter().enumerate() {
            out.push_str(&format!("struct s{i} {{\n    field id int rowid;\n"));
            let mut names = vec!["id".to_string()];

            for (j, f) in s.fields.iter().enumerate().take(16) {
                let mut name = format!("f{j}");
                let ty = match f.field_type {
                    FuzzFieldType::Int => "int".to_string(),
                    FuzzFieldType::Real => "real".to_string(),
                    FuzzFieldType::Text => "text".to_string(),
                    FuzzFieldType::Email => "email".to_string(),
                    FuzzFieldType::Date => "date".to_string(),
                    FuzzFieldType::Epoch => "epoch".to_string(),
                    FuzzFieldType::Password => "password".to_string(),
                    FuzzFieldType::Blob => "blob".to_string(),
                    FuzzFieldType::Foreign(n) => {
                        let target = usize::from(n) % count;
                        out.push_str(&format!("    field {name}:s{target}.id int;\n"));
                        let ty = format!("struct {name}");
                        name = format!("n{j}");
                        ty
                    }
                };
                out.push_str(&format!("    field {name} {ty}{};\n", f.flag.to_string()));
                names.push(name);
            }

            for (k, q) in s.searches.iter().enumerate().take(8) {
                let terms: Vec<_> = q
                    .terms
                    .iter()
                    .take(4)
                    .map(|(idx, op)| format!("{}{}", names[usize::from(*idx) % names.len()], op.as_str()))
                    .collect();
                let kind = if q.list { "list" } else { "search" };
                out.push_str(&format!("    {kind} {}: name q{k}", terms.join(", ")));
                if let Some(limit) = q.limit {
                    out.push_str(&format!(" limit {}", u32::from(limit) + 1));
                }
                out.push_str(";\n");
            }

            if let Some((a, b)) = s.unique {
                let a = &names[usize::from(a) % names.len()];
                let b = &names[usize::from(b) % names.len()];
                out.push_str(&format!("    unique {a}, {b};\n"));
            }
            out.push_str("};\n");
        }
        out
    }
}

fuzz_target!(|data: &[u8]| {
    let mut unstructured = Unstructured::new(data);

    if let Ok(schema) = FuzzSchema::arbitrary(&mut unstructured) {
        let mut compiler = Compiler::new();
        compiler.parse_str("fuzz.ort", &schema.to_string());

        let comp = compiler.compile();
        if !comp.ok {
            return;
        }

        let text = write_model(&comp.model);
        let mut again = Compiler::new();
        again.parse_str("fuzz.ort", &text);
        let model = again.finish().expect("printed schema must compile");
        assert_eq!(write_model(&model), text);
    }
});
