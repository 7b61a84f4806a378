//! Static types of the typed tree
//!
//! The type checker attaches a [`Type`] to every expression. Obligation
//! generation only needs to ask one question of these types: is the type of a
//! value *provably* a subtype of the type of the slot it flows into, without a
//! run-time check? See [`is_subtype`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// A field of a record type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldType {
    pub name: String,
    pub ty: Type,
}

/// VDM types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    Bool,
    Nat1,
    Nat,
    Int,
    Rat,
    Real,
    Char,
    Token,
    /// `<QUOTE>`
    Quote(String),
    /// Type of statements and operations without a result
    Void,
    /// Type of `nil`
    Nil,
    Set(Box<Type>),
    Set1(Box<Type>),
    Seq(Box<Type>),
    Seq1(Box<Type>),
    Map {
        from: Box<Type>,
        to: Box<Type>,
        injective: bool,
    },
    Product(Vec<Type>),
    Union(Vec<Type>),
    Optional(Box<Type>),
    Function {
        params: Vec<Type>,
        result: Box<Type>,
        partial: bool,
    },
    Operation {
        params: Vec<Type>,
        result: Box<Type>,
    },
    Record {
        name: String,
        fields: Vec<FieldType>,
    },
    /// A named type, optionally constrained by an invariant `inv_<name>`
    Named {
        name: String,
        ty: Box<Type>,
        has_inv: bool,
    },
    /// Type checker could not determine a type
    Unknown,
}

impl Type {
    pub fn set_of(ty: Type) -> Self {
        Type::Set(Box::new(ty))
    }

    pub fn seq_of(ty: Type) -> Self {
        Type::Seq(Box::new(ty))
    }

    pub fn map_of(from: Type, to: Type) -> Self {
        Type::Map {
            from: Box::new(from),
            to: Box::new(to),
            injective: false,
        }
    }

    pub fn named(name: impl Into<String>, ty: Type, has_inv: bool) -> Self {
        Type::Named {
            name: name.into(),
            ty: Box::new(ty),
            has_inv,
        }
    }

    /// Strip named-type wrappers
    pub fn resolved(&self) -> &Type {
        match self {
            Type::Named { ty, .. } => ty.resolved(),
            other => other,
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self.resolved(), Type::Map { .. })
    }

    pub fn is_seq(&self) -> bool {
        matches!(self.resolved(), Type::Seq(_) | Type::Seq1(_))
    }

    pub fn is_set(&self) -> bool {
        matches!(self.resolved(), Type::Set(_) | Type::Set1(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self.resolved(), Type::Function { .. })
    }

    /// Fields of a (possibly named) record type
    pub fn record_fields(&self) -> Option<&[FieldType]> {
        match self.resolved() {
            Type::Record { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Name of the invariant function guarding this type, if any
    pub fn invariant_name(&self) -> Option<String> {
        match self {
            Type::Named {
                name,
                has_inv: true,
                ..
            } => Some(format!("inv_{}", name)),
            _ => None,
        }
    }
}

/// Rank of numeric basic types: a lower rank is a subtype of every higher one
fn numeric_rank(ty: &Type) -> Option<u8> {
    match ty {
        Type::Nat1 => Some(0),
        Type::Nat => Some(1),
        Type::Int => Some(2),
        Type::Rat => Some(3),
        Type::Real => Some(4),
        _ => None,
    }
}

/// Is every value of `actual` provably a value of `expected`?
///
/// This is a conservative check: `false` means a run-time check (and so a
/// subtype obligation) is needed, not that the types are incompatible.
pub fn is_subtype(actual: &Type, expected: &Type) -> bool {
    if actual == expected {
        return true;
    }

    match (actual, expected) {
        (Type::Unknown, _) | (_, Type::Unknown) => true,

        // A union is a subtype if every member is
        (Type::Union(members), _) => members.iter().all(|m| is_subtype(m, expected)),

        // Invariant-constrained named types: only identical names are provable
        (_, Type::Named { has_inv: true, .. }) => false,
        (_, Type::Named { ty, .. }) => is_subtype(actual, ty),
        (Type::Named { ty, .. }, _) => is_subtype(ty, expected),

        (_, Type::Union(members)) => members.iter().any(|m| is_subtype(actual, m)),
        (Type::Nil, Type::Optional(_)) => true,
        (Type::Optional(a), Type::Optional(e)) => is_subtype(a, e),
        (_, Type::Optional(e)) => is_subtype(actual, e),

        (a, e) if numeric_rank(a).is_some() && numeric_rank(e).is_some() => {
            numeric_rank(a) <= numeric_rank(e)
        }

        (Type::Set(a) | Type::Set1(a), Type::Set(e)) => is_subtype(a, e),
        (Type::Set1(a), Type::Set1(e)) => is_subtype(a, e),
        (Type::Seq(a) | Type::Seq1(a), Type::Seq(e)) => is_subtype(a, e),
        (Type::Seq1(a), Type::Seq1(e)) => is_subtype(a, e),
        (
            Type::Map {
                from: af,
                to: at,
                injective: ai,
            },
            Type::Map {
                from: ef,
                to: et,
                injective: ei,
            },
        ) => (*ai || !*ei) && is_subtype(af, ef) && is_subtype(at, et),
        (Type::Product(a), Type::Product(e)) => {
            a.len() == e.len() && a.iter().zip(e).all(|(x, y)| is_subtype(x, y))
        }
        (Type::Record { name: an, .. }, Type::Record { name: en, .. }) => an == en,
        (
            Type::Function {
                params: ap,
                result: ar,
                partial: apart,
            },
            Type::Function {
                params: ep,
                result: er,
                partial: epart,
            },
        ) => {
            (!*apart || *epart)
                && ap.len() == ep.len()
                && ap.iter().zip(ep).all(|(x, y)| is_subtype(y, x))
                && is_subtype(ar, er)
        }
        _ => false,
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::pretty::pretty_type(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_widening() {
        assert!(is_subtype(&Type::Nat1, &Type::Int));
        assert!(is_subtype(&Type::Nat, &Type::Real));
        assert!(!is_subtype(&Type::Int, &Type::Nat));
        assert!(!is_subtype(&Type::Real, &Type::Nat1));
    }

    #[test]
    fn test_invariant_types_need_checks() {
        let even = Type::named("Even", Type::Nat, true);
        assert!(!is_subtype(&Type::Nat, &even));
        assert!(is_subtype(&even, &Type::Nat));
        assert!(is_subtype(&even, &even));
        let alias = Type::named("Count", Type::Nat, false);
        assert!(is_subtype(&Type::Nat1, &alias));
    }

    #[test]
    fn test_unions_and_optionals() {
        let u = Type::Union(vec![Type::Nat, Type::Char]);
        assert!(is_subtype(&Type::Char, &u));
        assert!(!is_subtype(&u, &Type::Nat));
        assert!(is_subtype(&Type::Nil, &Type::Optional(Box::new(Type::Nat))));
        assert!(is_subtype(&Type::Nat1, &Type::Optional(Box::new(Type::Nat))));
    }

    #[test]
    fn test_collections() {
        assert!(is_subtype(
            &Type::Seq1(Box::new(Type::Nat)),
            &Type::seq_of(Type::Int)
        ));
        assert!(!is_subtype(
            &Type::seq_of(Type::Nat),
            &Type::Seq1(Box::new(Type::Nat))
        ));
        assert!(!is_subtype(
            &Type::map_of(Type::Nat, Type::Nat),
            &Type::Map {
                from: Box::new(Type::Nat),
                to: Box::new(Type::Nat),
                injective: true
            }
        ));
    }
}
