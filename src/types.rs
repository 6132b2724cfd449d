//! The `Type` tagged variant and its pure queries.
//!
//! `Type` carries no side effects of its own; the scope-rebinding variant
//! of coercion (the analyzer's side-effecting coercion rule) lives in `sema.rs`, which
//! calls `Type::coerces` here and then, on success, mutates the
//! environment itself.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    Bool,
    Void,
    /// The partial type of an untyped integer literal. Must never reach
    /// the emitter .
    Integer,
    Pointer(Box<Type>),
    Array(Box<Type>, usize),
}

impl Type {
    /// True if `self` is `Integer`, or transitively contains one.
    pub fn is_partial(&self) -> bool {
        match self {
            Type::Integer => true,
            Type::Pointer(child) | Type::Array(child, _) => child.is_partial(),
            _ => false,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Type::I8
                | Type::U8
                | Type::I16
                | Type::U16
                | Type::I32
                | Type::U32
                | Type::I64
                | Type::U64
                | Type::Integer
        )
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Type::Pointer(child) if **child == Type::U8)
    }

    /// Explicit cast legality: identity is always accepted; otherwise
    /// only integer-to-integer (any sized kind, or the partial `Integer`)
    /// is accepted.
    pub fn casts_from(&self, from: &Type) -> bool {
        if self == from {
            return true;
        }
        self.is_integer() && from.is_integer()
    }

    /// Implicit coercion at an assignment-like site. Pure: callers that
    /// need the side-effecting scope rebind apply it
    /// themselves after this returns `true` — see `sema::coerce`.
    pub fn coerces_from(&self, from: &Type) -> bool {
        match self {
            Type::I8
            | Type::U8
            | Type::I16
            | Type::U16
            | Type::I32
            | Type::U32
            | Type::I64
            | Type::U64
            | Type::Integer => *from == Type::Integer || from == self,

            Type::Array(to_child, to_count) => match from {
                Type::Array(from_child, from_count) if to_count == from_count => {
                    to_child.coerces_from(from_child)
                }
                _ => false,
            },

            Type::Pointer(to_child) => match from {
                Type::Pointer(from_child) => to_child.coerces_from(from_child),
                _ => false,
            },

            _ => self == from,
        }
    }

    /// Canonical FL-syntax rendering, used in diagnostics: `(@ U8)`,
    /// `(Array I32 4)`.
    pub fn as_string(&self) -> String {
        match self {
            Type::I8 => "I8".to_string(),
            Type::U8 => "U8".to_string(),
            Type::I16 => "I16".to_string(),
            Type::U16 => "U16".to_string(),
            Type::I32 => "I32".to_string(),
            Type::U32 => "U32".to_string(),
            Type::I64 => "I64".to_string(),
            Type::U64 => "U64".to_string(),
            Type::Bool => "Bool".to_string(),
            Type::Void => "Void".to_string(),
            Type::Integer => "{Integer}".to_string(),
            Type::Pointer(child) => format!("(@ {})", child.as_string()),
            Type::Array(child, count) => format!("(Array {} {})", child.as_string(), count),
        }
    }

    /// Deterministic, reversible name used for synthesized C definitions:
    /// `_Array_I32_4`, `_Pointer_U8`, `_I32`.
    pub fn mangle(&self) -> String {
        match self {
            Type::Array(child, count) => format!("_Array{}_{}", child.mangle(), count),
            Type::Pointer(child) => format!("_Pointer{}", child.mangle()),
            other => format!("_{}", other.scalar_mangle()),
        }
    }

    fn scalar_mangle(&self) -> &'static str {
        match self {
            Type::I8 => "I8",
            Type::U8 => "U8",
            Type::I16 => "I16",
            Type::U16 => "U16",
            Type::I32 => "I32",
            Type::U32 => "U32",
            Type::I64 => "I64",
            Type::U64 => "U64",
            Type::Bool => "Bool",
            Type::Void => "Void",
            Type::Integer => "Integer",
            Type::Pointer(_) | Type::Array(_, _) => unreachable!("compound types mangle above"),
        }
    }

    /// The C spelling used by the emitter. Compound array types spell out
    /// to their synthesized struct name, which must already exist in the
    /// prelude by the time this is called.
    pub fn type_c(&self) -> String {
        match self {
            Type::U8 => "unsigned char".to_string(),
            Type::I8 => "signed char".to_string(),
            Type::U16 => "unsigned short".to_string(),
            Type::I16 => "short".to_string(),
            Type::U32 => "unsigned int".to_string(),
            Type::I32 => "int".to_string(),
            Type::U64 => "unsigned long long".to_string(),
            Type::I64 => "long long".to_string(),
            Type::Bool => "int".to_string(),
            Type::Void => "void".to_string(),
            Type::Integer => {
                unreachable!("partial Integer type must be resolved before emission")
            }
            Type::Pointer(child) => format!("{}*", child.type_c()),
            Type::Array(..) => self.mangle(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ptr(t: Type) -> Type {
        Type::Pointer(Box::new(t))
    }

    fn arr(t: Type, n: usize) -> Type {
        Type::Array(Box::new(t), n)
    }

    #[test]
    fn partial_integer_is_partial_everywhere_it_nests() {
        assert!(Type::Integer.is_partial());
        assert!(ptr(Type::Integer).is_partial());
        assert!(arr(Type::Integer, 4).is_partial());
        assert!(!Type::I64.is_partial());
    }

    #[test]
    fn integer_destinations_accept_partial_or_exact_match() {
        assert!(Type::I32.coerces_from(&Type::Integer));
        assert!(Type::I32.coerces_from(&Type::I32));
        assert!(!Type::I32.coerces_from(&Type::U8));
        assert!(!Type::U8.coerces_from(&Type::I32));
    }

    #[test]
    fn pointer_and_array_coercion_recurse_on_child() {
        assert!(ptr(Type::I32).coerces_from(&ptr(Type::Integer)));
        assert!(!ptr(Type::I32).coerces_from(&ptr(Type::U8)));
        assert!(arr(Type::I32, 4).coerces_from(&arr(Type::Integer, 4)));
        assert!(!arr(Type::I32, 4).coerces_from(&arr(Type::I32, 5)));
    }

    #[test]
    fn casts_accept_identity_and_any_integer_pair() {
        assert!(Type::Bool.casts_from(&Type::Bool));
        assert!(Type::U8.casts_from(&Type::I64));
        assert!(!Type::Bool.casts_from(&Type::I64));
    }

    #[test]
    fn mangle_is_deterministic_and_reversible_in_shape() {
        assert_eq!(arr(Type::I32, 4).mangle(), "_Array_I32_4");
        assert_eq!(ptr(Type::U8).mangle(), "_Pointer_U8");
        assert_eq!(Type::I32.mangle(), "_I32");
    }

    #[test]
    fn diagnostic_rendering_matches_fl_syntax() {
        assert_eq!(ptr(Type::U8).as_string(), "(@ U8)");
        assert_eq!(arr(Type::I32, 4).as_string(), "(Array I32 4)");
    }
}
