// Licensed under the Apache-2.0 license

//! In-memory representation of a parsed register database.
//!
//! The [`Database`] struct is the aggregate root. Enums, bitsets, domains and
//! spectypes live in flat arenas on the database and are cross-referenced by
//! index; this keeps the schema tree free of shared ownership while still
//! letting a resolved type point at a globally defined enum or bitset.
//!
//! ## Architecture Overview
//!
//! ```text
//! Database
//! ├── enums:     Vec<Enum>       # referenced by EnumIdx
//! ├── bitsets:   Vec<Bitset>     # referenced by BitsetIdx
//! ├── domains:   Vec<Domain>     # address spaces, each a tree of Elements
//! ├── groups:    Vec<Group>      # reusable element lists, spliced on use
//! ├── spectypes: Vec<SpecType>   # named reusable type definitions
//! ├── files:     HashSet<String> # import-loop suppression
//! └── errors:    bool            # sticky recoverable-problem flag
//! ```
//!
//! A database goes through two phases: mutable accumulation during parsing,
//! then a single [`Database::prepare`] pass that resolves type references,
//! narrows variant sets and computes full names. After `prepare` the structure
//! is read-only and safe to share across concurrent decode queries.

use std::collections::{BTreeSet, HashSet};

/// Index into [`Database::enums`].
pub type EnumIdx = usize;

/// Index into [`Database::bitsets`].
pub type BitsetIdx = usize;

/// Index into [`Database::spectypes`].
pub type SpecTypeIdx = usize;

//=============================================================================
// Database - aggregate root
//=============================================================================

/// The root container for a loaded register database.
#[derive(Clone, Debug, Default)]
pub struct Database {
    pub copyright: Copyright,
    pub enums: Vec<Enum>,
    pub bitsets: Vec<Bitset>,
    pub domains: Vec<Domain>,
    pub groups: Vec<Group>,
    pub spectypes: Vec<SpecType>,
    /// File reference names already loaded; repeated imports are skipped.
    pub files: HashSet<String>,
    /// Sticky flag: set once any recoverable load problem was reported,
    /// never cleared. Loading continues regardless.
    pub errors: bool,
    pub(crate) prepared: bool,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_enum(&self, name: &str) -> Option<EnumIdx> {
        self.enums.iter().position(|e| e.name.as_deref() == Some(name))
    }

    pub fn find_bitset(&self, name: &str) -> Option<BitsetIdx> {
        self.bitsets.iter().position(|b| b.name.as_deref() == Some(name))
    }

    pub fn find_domain(&self, name: &str) -> Option<usize> {
        self.domains.iter().position(|d| d.name == name)
    }

    pub fn find_spectype(&self, name: &str) -> Option<SpecTypeIdx> {
        self.spectypes.iter().position(|s| s.name == name)
    }

    /// Report a recoverable load problem: log it and set the sticky flag.
    pub(crate) fn report(&mut self, msg: String) {
        log::warn!("{}", msg);
        self.errors = true;
    }
}

//=============================================================================
// Authorship metadata
//=============================================================================

#[derive(Clone, Debug)]
pub struct Author {
    pub name: Option<String>,
    pub email: Option<String>,
    pub contributions: Option<String>,
    pub nicknames: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct Copyright {
    /// Earliest year seen across all `<copyright>` declarations.
    pub firstyear: Option<u32>,
    pub license: Option<String>,
    pub authors: Vec<Author>,
}

//=============================================================================
// Variant conditioning
//=============================================================================

/// One variant axis: a controlling enum and the permitted value indices.
#[derive(Clone, Debug)]
pub struct Varset {
    pub venum: EnumIdx,
    pub variants: BTreeSet<usize>,
}

/// Per-element conditional-inclusion metadata.
///
/// The three `*_str` fields hold the raw attributes; `prepare` resolves them
/// against the database, inheriting from the enclosing scope and narrowing
/// (never widening) the permitted variant sets. An element whose permitted
/// set narrows to empty is marked `dead` and becomes functionally invisible.
#[derive(Clone, Debug, Default)]
pub struct Varinfo {
    pub prefix_str: Option<String>,
    pub varset_str: Option<String>,
    pub variants_str: Option<String>,
    pub dead: bool,
    pub prefenum: Option<EnumIdx>,
    pub prefix: Option<String>,
    pub varsets: Vec<Varset>,
}

impl Varinfo {
    pub fn new(
        prefix_str: Option<String>,
        varset_str: Option<String>,
        variants_str: Option<String>,
    ) -> Self {
        Varinfo {
            prefix_str,
            varset_str,
            variants_str,
            ..Default::default()
        }
    }

    /// An unprepared copy carrying only the raw attribute strings, for
    /// re-stamping at a new use site. Copies never share narrowing state
    /// with the original.
    pub(crate) fn raw_copy(&self) -> Self {
        Varinfo::new(
            self.prefix_str.clone(),
            self.varset_str.clone(),
            self.variants_str.clone(),
        )
    }
}

//=============================================================================
// Enums and values
//=============================================================================

/// An ordered set of mutually exclusive named integer values.
#[derive(Clone, Debug)]
pub struct Enum {
    /// None for anonymous inline enums materialized at a use site.
    pub name: Option<String>,
    /// Bare enums do not prefix their values with the enum name.
    pub bare: bool,
    /// Inline enums are copied per use site rather than shared.
    pub inline: bool,
    pub varinfo: Varinfo,
    pub vals: Vec<Value>,
    pub fullname: Option<String>,
    pub(crate) prepared: bool,
    pub file: String,
}

/// A single named value. `value` may be None for decoration-only names.
#[derive(Clone, Debug)]
pub struct Value {
    pub name: String,
    pub value: Option<u64>,
    pub varinfo: Varinfo,
    pub fullname: Option<String>,
    pub file: String,
}

impl Value {
    pub(crate) fn raw_copy(&self, file: &str) -> Self {
        Value {
            name: self.name.clone(),
            value: self.value,
            varinfo: self.varinfo.raw_copy(),
            fullname: None,
            file: file.to_string(),
        }
    }
}

//=============================================================================
// Bitsets and bitfields
//=============================================================================

/// A collection of independently present bit flags/fields.
#[derive(Clone, Debug)]
pub struct Bitset {
    pub name: Option<String>,
    pub bare: bool,
    pub inline: bool,
    pub varinfo: Varinfo,
    pub bitfields: Vec<Bitfield>,
    pub fullname: Option<String>,
    pub(crate) prepared: bool,
    pub file: String,
}

/// A named inclusive bit range `[low, high]` with its own interpretation.
#[derive(Clone, Debug)]
pub struct Bitfield {
    pub name: String,
    pub low: u32,
    pub high: u32,
    pub mask: u64,
    pub width: u32,
    pub varinfo: Varinfo,
    pub typeinfo: TypeInfo,
    pub fullname: Option<String>,
    pub file: String,
}

impl Bitfield {
    /// Mask covering bits `low..=high`.
    pub fn mask_for(low: u32, high: u32) -> u64 {
        (((1u128 << (high + 1)) - (1u128 << low)) & u128::from(u64::MAX)) as u64
    }

    pub(crate) fn raw_copy(&self, file: &str) -> Self {
        Bitfield {
            name: self.name.clone(),
            low: self.low,
            high: self.high,
            mask: self.mask,
            width: self.width,
            varinfo: self.varinfo.raw_copy(),
            typeinfo: self.typeinfo.raw_copy(file),
            fullname: None,
            file: file.to_string(),
        }
    }
}

//=============================================================================
// Type information
//=============================================================================

/// A raw, unresolved type reference as parsed from the document.
#[derive(Clone, Debug, Default)]
pub struct RawType {
    pub name: Option<String>,
    pub bitfields: Vec<Bitfield>,
    pub vals: Vec<Value>,
    pub shr: u32,
    pub add: i64,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub align: Option<u64>,
    pub radix: u32,
}

impl RawType {
    pub(crate) fn raw_copy(&self, file: &str) -> Self {
        RawType {
            name: self.name.clone(),
            bitfields: self.bitfields.iter().map(|b| b.raw_copy(file)).collect(),
            vals: self.vals.iter().map(|v| v.raw_copy(file)).collect(),
            ..*self
        }
    }
}

/// How a register's or bitfield's extracted value is interpreted.
///
/// The variant set is closed by design: one decode arm per tag.
#[derive(Clone, Debug)]
pub enum TypeInfo {
    /// Not yet resolved; replaced during [`Database::prepare`].
    Raw(RawType),
    /// A globally defined, shared enum.
    Enum(EnumIdx),
    /// A per-use-site copy of an inline or embedded enum.
    InlineEnum(Box<Enum>),
    /// A globally defined, shared bitset.
    Bitset(BitsetIdx),
    /// A per-use-site copy of an inline or embedded bitset.
    InlineBitset(Box<Bitset>),
    /// A named reusable type definition, decoded transparently.
    SpecType(SpecTypeIdx),
    Hex {
        shr: u32,
        add: i64,
        min: Option<i64>,
        max: Option<i64>,
        align: Option<u64>,
    },
    Int {
        shr: u32,
        add: i64,
        min: Option<i64>,
        max: Option<i64>,
        align: Option<u64>,
        signed: bool,
    },
    Boolean,
    Float,
    Fixed {
        min: Option<i64>,
        max: Option<i64>,
        radix: u32,
        signed: bool,
    },
}

impl TypeInfo {
    pub(crate) fn raw_copy(&self, file: &str) -> Self {
        match self {
            TypeInfo::Raw(raw) => TypeInfo::Raw(raw.raw_copy(file)),
            other => other.clone(),
        }
    }
}

/// A named, globally reusable type definition.
#[derive(Clone, Debug)]
pub struct SpecType {
    pub name: String,
    pub typeinfo: TypeInfo,
    /// Nominal width used when resolving the type outside any field.
    pub width: u32,
    pub file: String,
}

//=============================================================================
// Domains and their elements
//=============================================================================

/// Register access mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    #[default]
    ReadWrite,
}

/// A named address space containing registers, stripes and arrays.
#[derive(Clone, Debug)]
pub struct Domain {
    pub name: String,
    /// Bare domains do not prefix child full-names with their own name.
    pub bare: bool,
    /// Bit width of one addressable unit.
    pub width: u32,
    pub size: Option<u64>,
    pub varinfo: Varinfo,
    pub elems: Vec<Element>,
    pub fullname: Option<String>,
    pub file: String,
}

/// A schema leaf bound to one (possibly repeated) address.
#[derive(Clone, Debug)]
pub struct Register {
    pub name: String,
    /// Width in bits: 8, 16, 32 or 64.
    pub width: u32,
    pub access: Access,
    pub offset: u64,
    /// Repeat count; 0 means unbounded.
    pub length: u64,
    pub stride: Option<u64>,
    pub varinfo: Varinfo,
    pub typeinfo: TypeInfo,
    pub fullname: Option<String>,
    pub file: String,
}

impl Register {
    pub(crate) fn raw_copy(&self, file: &str) -> Self {
        Register {
            name: self.name.clone(),
            width: self.width,
            access: self.access,
            offset: self.offset,
            length: self.length,
            stride: self.stride,
            varinfo: self.varinfo.raw_copy(),
            typeinfo: self.typeinfo.raw_copy(file),
            fullname: None,
            file: file.to_string(),
        }
    }
}

/// A repeated or grouped sub-range of child elements.
///
/// With `full` set (an `<array>`), the stride is mandatory and an address is
/// assigned to exactly one slot. Without it (a `<stripe>`), ascending repeat
/// indices are probed and the first whose children match wins, which models
/// loosely-packed overlapping layouts. Anonymous stripes splice their
/// children transparently into the parent.
#[derive(Clone, Debug)]
pub struct Stripe {
    pub name: Option<String>,
    pub offset: u64,
    /// Repeat count; 0 means unbounded.
    pub length: u64,
    pub stride: Option<u64>,
    pub full: bool,
    pub elems: Vec<Element>,
    pub varinfo: Varinfo,
    pub fullname: Option<String>,
    pub file: String,
}

impl Stripe {
    pub(crate) fn raw_copy(&self, file: &str) -> Self {
        Stripe {
            name: self.name.clone(),
            offset: self.offset,
            length: self.length,
            stride: self.stride,
            full: self.full,
            elems: self.elems.iter().map(|e| e.raw_copy(file)).collect(),
            varinfo: self.varinfo.raw_copy(),
            fullname: None,
            file: file.to_string(),
        }
    }
}

/// A reference to a named [`Group`], resolved at prepare time by splicing a
/// deep copy of the group's elements in as an anonymous unit stripe.
#[derive(Clone, Debug)]
pub struct UseGroup {
    pub name: String,
    pub file: String,
}

/// A child of a domain, stripe or group.
#[derive(Clone, Debug)]
pub enum Element {
    Reg(Register),
    Stripe(Stripe),
    UseGroup(UseGroup),
}

impl Element {
    pub(crate) fn raw_copy(&self, file: &str) -> Self {
        match self {
            Element::Reg(r) => Element::Reg(r.raw_copy(file)),
            Element::Stripe(s) => Element::Stripe(s.raw_copy(file)),
            Element::UseGroup(u) => Element::UseGroup(UseGroup {
                name: u.name.clone(),
                file: file.to_string(),
            }),
        }
    }
}

/// A named, reusable element list. Same-named definitions append.
#[derive(Clone, Debug)]
pub struct Group {
    pub name: String,
    pub elems: Vec<Element>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitfield_mask() {
        assert_eq!(Bitfield::mask_for(0, 0), 0x1);
        assert_eq!(Bitfield::mask_for(1, 4), 0x1e);
        assert_eq!(Bitfield::mask_for(4, 7), 0xf0);
        assert_eq!(Bitfield::mask_for(0, 63), u64::MAX);
        assert_eq!(Bitfield::mask_for(63, 63), 1 << 63);
    }

    #[test]
    fn test_raw_copy_resets_varinfo() {
        let mut vi = Varinfo::new(None, Some("chipset".into()), Some("NV10".into()));
        vi.dead = true;
        vi.prefix = Some("NV10".into());
        let copy = vi.raw_copy();
        assert!(!copy.dead);
        assert!(copy.prefix.is_none());
        assert!(copy.varsets.is_empty());
        assert_eq!(copy.varset_str.as_deref(), Some("chipset"));
    }
}
