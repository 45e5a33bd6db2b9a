//! The type lattice
//!
//! A [`Type`] is a finite set of primitive type tags, represented as a
//! 16-bit set. The lattice is ordered by subset inclusion:
//! - `none()` (NoType) is the empty set and the bottom element,
//! - `any()` is the full set and the top element,
//! - `union` and `intersect` are the lattice join and meet.
//!
//! The `number` tag is decomposed into three refinement bits (`int32`,
//! `uint32` and `double`), so `int32` and `uint32` are genuine subsets of
//! `number` and all subset reasoning falls out of plain bit arithmetic.

use std::fmt;

const EMPTY: u16 = 1 << 0;
const UNDEFINED: u16 = 1 << 1;
const NULL: u16 = 1 << 2;
const BOOLEAN: u16 = 1 << 3;
const STRING: u16 = 1 << 4;
const SYMBOL: u16 = 1 << 5;
const BIGINT: u16 = 1 << 6;
const INT32: u16 = 1 << 7;
const UINT32: u16 = 1 << 8;
const DOUBLE: u16 = 1 << 9;
const OBJECT: u16 = 1 << 10;
const ARRAY: u16 = 1 << 11;
const REGEXP: u16 = 1 << 12;
const ARGUMENTS: u16 = 1 << 13;
const CLOSURE: u16 = 1 << 14;
const ENVIRONMENT: u16 = 1 << 15;

const NUMBER: u16 = INT32 | UINT32 | DOUBLE;
const ANY: u16 = u16::MAX;

/// Tags whose implicit conversion to string/number cannot run user code.
/// Everything object-like (which may carry `toString`/`valueOf`) is excluded.
const PRIMITIVE: u16 = EMPTY | UNDEFINED | NULL | BOOLEAN | STRING | SYMBOL | BIGINT | NUMBER;

/// A conservative static type: a set of runtime type tags.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Type {
    bits: u16,
}

impl Type {
    /// The empty set. Used both as the lattice bottom and as the
    /// "not yet inferred" marker on values without an annotation.
    pub const fn none() -> Type {
        Type { bits: 0 }
    }

    /// The universe of all tags.
    pub const fn any() -> Type {
        Type { bits: ANY }
    }

    /// The TDZ sentinel tag ("empty"), distinct from [`Type::none`].
    pub const fn empty() -> Type {
        Type { bits: EMPTY }
    }

    pub const fn undefined() -> Type {
        Type { bits: UNDEFINED }
    }

    pub const fn null() -> Type {
        Type { bits: NULL }
    }

    pub const fn boolean() -> Type {
        Type { bits: BOOLEAN }
    }

    pub const fn string() -> Type {
        Type { bits: STRING }
    }

    pub const fn symbol() -> Type {
        Type { bits: SYMBOL }
    }

    pub const fn bigint() -> Type {
        Type { bits: BIGINT }
    }

    /// The full `number` tag: the union of its refinements.
    pub const fn number() -> Type {
        Type { bits: NUMBER }
    }

    /// Numbers known to fit in a signed 32-bit integer.
    pub const fn int32() -> Type {
        Type { bits: INT32 }
    }

    /// Numbers known to fit in an unsigned 32-bit integer.
    pub const fn uint32() -> Type {
        Type { bits: UINT32 }
    }

    pub const fn object() -> Type {
        Type { bits: OBJECT }
    }

    pub const fn array() -> Type {
        Type { bits: ARRAY }
    }

    pub const fn regexp() -> Type {
        Type { bits: REGEXP }
    }

    pub const fn arguments() -> Type {
        Type { bits: ARGUMENTS }
    }

    pub const fn closure() -> Type {
        Type { bits: CLOSURE }
    }

    pub const fn environment() -> Type {
        Type { bits: ENVIRONMENT }
    }

    /// Reconstruct a type from a raw tag set, masking out undefined bits.
    pub const fn from_bits_truncate(bits: u16) -> Type {
        Type { bits: bits & ANY }
    }

    pub const fn bits(self) -> u16 {
        self.bits
    }

    /// Lattice join.
    pub const fn union(self, other: Type) -> Type {
        Type {
            bits: self.bits | other.bits,
        }
    }

    /// Lattice meet.
    pub const fn intersect(self, other: Type) -> Type {
        Type {
            bits: self.bits & other.bits,
        }
    }

    pub const fn is_subset_of(self, other: Type) -> bool {
        self.bits & !other.bits == 0
    }

    pub const fn is_no_type(self) -> bool {
        self.bits == 0
    }

    pub const fn is_any_type(self) -> bool {
        self.bits == ANY
    }

    /// The value is a number and nothing else (including the `int32` and
    /// `uint32` refinements).
    pub const fn is_number_type(self) -> bool {
        self.bits != 0 && self.is_subset_of(Type::number())
    }

    /// The value is a bigint and nothing else.
    pub const fn is_bigint_type(self) -> bool {
        self.bits == BIGINT
    }

    /// The value is a string and nothing else.
    pub const fn is_string_type(self) -> bool {
        self.bits == STRING
    }

    pub const fn can_be_bigint(self) -> bool {
        self.bits & BIGINT != 0
    }

    pub const fn can_be_string(self) -> bool {
        self.bits & STRING != 0
    }

    /// True when converting a value of this type to a string or number
    /// cannot run user code: no object-like tag is present.
    pub const fn is_side_effect_free(self) -> bool {
        self.bits & !PRIMITIVE == 0
    }
}

const TAG_NAMES: &[(u16, &str)] = &[
    (EMPTY, "empty"),
    (UNDEFINED, "undefined"),
    (NULL, "null"),
    (BOOLEAN, "boolean"),
    (STRING, "string"),
    (SYMBOL, "symbol"),
    (BIGINT, "bigint"),
    (INT32, "int32"),
    (UINT32, "uint32"),
    (DOUBLE, "double"),
    (OBJECT, "object"),
    (ARRAY, "array"),
    (REGEXP, "regexp"),
    (ARGUMENTS, "arguments"),
    (CLOSURE, "closure"),
    (ENVIRONMENT, "environment"),
];

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_no_type() {
            return write!(f, "notype");
        }
        if self.is_any_type() {
            return write!(f, "any");
        }

        let mut bits = self.bits;
        let mut first = true;

        // Collapse the three refinements into "number" when all are present.
        if bits & NUMBER == NUMBER {
            write!(f, "number")?;
            bits &= !NUMBER;
            first = false;
        }

        for &(mask, name) in TAG_NAMES {
            if bits & mask != 0 {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self)
    }
}
