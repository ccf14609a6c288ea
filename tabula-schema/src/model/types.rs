//! Keyword enumerations shared across the model.

use std::fmt;

use serde::Serialize;

/// Declare a keyword enum with `as_str`, case-insensitive `from_keyword`
/// and a `Display` impl. Additional spellings follow the canonical one.
macro_rules! keyword_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => $kw:literal $(| $alt:literal)*
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $(
                $(#[$vmeta])*
                $variant,
            )+
        }

        impl $name {
            /// Every variant in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The canonical keyword.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $kw,)+
                }
            }

            /// Look up a keyword, ignoring case.
            pub fn from_keyword(s: &str) -> Option<Self> {
                $(
                    if s.eq_ignore_ascii_case($kw) $(|| s.eq_ignore_ascii_case($alt))* {
                        return Some(Self::$variant);
                    }
                )+
                None
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

keyword_enum! {
    /// Field type tag.
    pub enum FieldType {
        /// A bit index.
        Bit => "bit",
        /// Calendar date, stored as an epoch.
        Date => "date",
        /// UNIX timestamp.
        Epoch => "epoch",
        /// Native integer.
        Int => "int" | "integer",
        /// Native real value.
        Real => "real" | "double",
        /// Binary blob.
        Blob => "blob",
        /// Text.
        Text => "text" | "txt",
        /// Hashed password.
        Password => "password" | "passwd",
        /// E-mail address.
        Email => "email",
        /// Nested struct reached through a foreign key.
        Struct => "struct",
        /// Enumeration.
        Enum => "enum",
        /// Bit-set.
        Bitfield => "bits" | "bitfield",
    }
}

impl FieldType {
    /// Text-like types accepted by `like` and `concat`.
    pub fn is_text_like(&self) -> bool {
        matches!(self, Self::Text | Self::Email)
    }

    /// Types accepted by `concat`.
    pub fn is_concatenable(&self) -> bool {
        matches!(self, Self::Blob | Self::Text | Self::Email)
    }

    /// Types accepted by `inc` and `dec`.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Bit
                | Self::Bitfield
                | Self::Date
                | Self::Enum
                | Self::Epoch
                | Self::Int
                | Self::Real
        )
    }

    /// Types accepted by the bitwise `and` and `or` operators.
    pub fn is_bitwise(&self) -> bool {
        matches!(self, Self::Bit | Self::Bitfield | Self::Int)
    }

    /// Types whose limits and defaults are integers.
    pub fn is_integer_valued(&self) -> bool {
        matches!(
            self,
            Self::Bit | Self::Bitfield | Self::Date | Self::Epoch | Self::Int
        )
    }

    /// Types whose limits are lengths.
    pub fn is_length_valued(&self) -> bool {
        matches!(
            self,
            Self::Blob | Self::Email | Self::Text | Self::Password
        )
    }
}

keyword_enum! {
    /// Comparison operator in search terms and update constraints.
    pub enum Operator {
        /// Equality.
        Eq => "eq",
        /// Greater than or equal.
        Ge => "ge",
        /// Greater than.
        Gt => "gt",
        /// Less than or equal.
        Le => "le",
        /// Less than.
        Lt => "lt",
        /// Inequality.
        Neq => "neq",
        /// Pattern match.
        Like => "like",
        /// Bitwise and.
        And => "and",
        /// Bitwise or.
        Or => "or",
        /// String equality.
        StrEq => "streq",
        /// String inequality.
        StrNeq => "strneq",
        /// Null test.
        IsNull => "isnull",
        /// Non-null test.
        NotNull => "notnull",
    }
}

impl Operator {
    /// Whether the operator takes no argument.
    pub fn is_unary(&self) -> bool {
        matches!(self, Self::IsNull | Self::NotNull)
    }

    /// Operators permitted on password fields in searches.
    pub fn allowed_on_password(&self) -> bool {
        self.is_unary() || matches!(self, Self::Eq | Self::Neq | Self::StrEq | Self::StrNeq)
    }
}

keyword_enum! {
    /// How an update changes a field.
    pub enum Modifier {
        /// Append to the current value.
        Concat => "concat",
        /// Decrement.
        Dec => "dec",
        /// Increment.
        Inc => "inc",
        /// Set directly.
        Set => "set",
        /// Set, hashing passwords.
        StrSet => "strset",
    }
}

keyword_enum! {
    /// Comparison in a `limit` validation bound.
    pub enum LimitOp {
        /// Greater than or equal.
        Ge => "ge",
        /// Less than or equal.
        Le => "le",
        /// Greater than.
        Gt => "gt",
        /// Less than.
        Lt => "lt",
        /// Equal.
        Eq => "eq",
    }
}

keyword_enum! {
    /// Foreign-key action on update or delete.
    pub enum UpdateAction {
        /// No action.
        None => "none",
        /// Restrict.
        Restrict => "restrict",
        /// Set to null.
        Nullify => "nullify",
        /// Cascade.
        Cascade => "cascade",
        /// Set to the default value.
        Default => "default",
    }
}

impl Default for UpdateAction {
    fn default() -> Self {
        Self::None
    }
}

keyword_enum! {
    /// Query kind.
    pub enum SearchKind {
        /// Number of matching rows.
        Count => "count",
        /// A single row.
        Search => "search",
        /// All rows as a list.
        List => "list",
        /// All rows through a callback.
        Iterate => "iterate",
    }
}

impl SearchKind {
    /// Whether the query can return more than one row.
    pub fn is_multiple(&self) -> bool {
        matches!(self, Self::List | Self::Iterate)
    }
}

keyword_enum! {
    /// Sort direction for `order`.
    pub enum OrderDir {
        /// Ascending.
        Asc => "asc",
        /// Descending.
        Desc => "desc",
    }
}

keyword_enum! {
    /// Aggregate row selection.
    pub enum AggrKind {
        /// Row with the greatest value.
        MaxRow => "maxrow",
        /// Row with the smallest value.
        MinRow => "minrow",
    }
}

keyword_enum! {
    /// Update statement kind.
    pub enum UpdateKind {
        /// Modify columns.
        Modify => "update",
        /// Delete rows.
        Delete => "delete",
    }
}

keyword_enum! {
    /// Operation kind named by a role grant.
    pub enum RoleMapKind {
        /// Every operation.
        All => "all",
        /// A count query.
        Count => "count",
        /// A delete.
        Delete => "delete",
        /// The insert.
        Insert => "insert",
        /// An iterate query.
        Iterate => "iterate",
        /// A list query.
        List => "list",
        /// A single-row search.
        Search => "search",
        /// An update.
        Update => "update",
        /// Hide a field from export.
        NoExport => "noexport",
    }
}

impl RoleMapKind {
    /// The search kind a grant of this kind names, if any.
    pub fn search_kind(&self) -> Option<SearchKind> {
        match self {
            Self::Count => Some(SearchKind::Count),
            Self::Iterate => Some(SearchKind::Iterate),
            Self::List => Some(SearchKind::List),
            Self::Search => Some(SearchKind::Search),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_aliases() {
        assert_eq!(FieldType::from_keyword("INTEGER"), Some(FieldType::Int));
        assert_eq!(FieldType::from_keyword("double"), Some(FieldType::Real));
        assert_eq!(FieldType::from_keyword("passwd"), Some(FieldType::Password));
        assert_eq!(FieldType::from_keyword("txt"), Some(FieldType::Text));
        assert_eq!(FieldType::from_keyword("bitfield"), Some(FieldType::Bitfield));
        assert_eq!(FieldType::from_keyword("varchar"), None);
    }

    #[test]
    fn test_field_type_canonical_keyword() {
        assert_eq!(FieldType::Bitfield.as_str(), "bits");
        assert_eq!(FieldType::Real.to_string(), "real");
    }

    #[test]
    fn test_field_type_classes() {
        assert!(FieldType::Email.is_text_like());
        assert!(!FieldType::Password.is_text_like());
        assert!(FieldType::Blob.is_concatenable());
        assert!(FieldType::Date.is_numeric());
        assert!(!FieldType::Real.is_bitwise());
        assert!(FieldType::Password.is_length_valued());
    }

    #[test]
    fn test_operator_arity() {
        assert!(Operator::IsNull.is_unary());
        assert!(!Operator::Like.is_unary());
        assert!(Operator::StrNeq.allowed_on_password());
        assert!(!Operator::Like.allowed_on_password());
    }

    #[test]
    fn test_rolemap_search_kind() {
        assert_eq!(RoleMapKind::List.search_kind(), Some(SearchKind::List));
        assert_eq!(RoleMapKind::Update.search_kind(), None);
    }
}
