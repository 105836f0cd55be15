// Licensed under the Apache-2.0 license

//! Second-phase database resolution.
//!
//! Parsing leaves the database in a raw state: type references are unresolved
//! strings, variant attributes are unprocessed, group uses are placeholders
//! and no full names exist. [`Database::prepare`] runs one pass over the whole
//! tree that resolves all of it in place.
//!
//! Resolution needs to look up enums, bitsets, groups and spectypes while the
//! very same arenas are being rewritten. A [`Resolver`] snapshot of the raw
//! database is taken up front; all name lookups and all material copied to a
//! new use site (inline enum values, group bodies) come from the snapshot,
//! never from the half-rewritten arenas.

use std::mem;

use crate::schema::{
    Bitfield, Bitset, Database, Domain, Element, Enum, EnumIdx, Group, Register, Stripe, TypeInfo,
    Varinfo, Varset,
};
use crate::util::catstr;

/// Read-only view of the database as it stood before resolution began.
struct Resolver {
    enums: Vec<Enum>,
    bitsets: Vec<Bitset>,
    groups: Vec<Group>,
    spectype_names: Vec<String>,
}

impl Resolver {
    fn snapshot(db: &Database) -> Self {
        Resolver {
            enums: db.enums.clone(),
            bitsets: db.bitsets.clone(),
            groups: db.groups.clone(),
            spectype_names: db.spectypes.iter().map(|s| s.name.clone()).collect(),
        }
    }

    fn find_enum(&self, name: &str) -> Option<usize> {
        self.enums.iter().position(|e| e.name.as_deref() == Some(name))
    }

    fn find_bitset(&self, name: &str) -> Option<usize> {
        self.bitsets.iter().position(|b| b.name.as_deref() == Some(name))
    }

    fn find_spectype(&self, name: &str) -> Option<usize> {
        self.spectype_names.iter().position(|n| n == name)
    }

    fn enum_val_name(&self, eidx: EnumIdx, vidx: usize) -> Option<String> {
        self.enums
            .get(eidx)
            .and_then(|e| e.vals.get(vidx))
            .map(|v| v.name.clone())
    }

    /// Index of the named value within an enum, reporting a load error when
    /// the name is unknown.
    fn find_vidx(&self, db: &mut Database, eidx: EnumIdx, name: &str) -> Option<usize> {
        let en = self.enums.get(eidx)?;
        match en.vals.iter().position(|v| v.name == name) {
            Some(i) => Some(i),
            None => {
                db.report(format!(
                    "Cannot find variant {} in enum {}!",
                    name,
                    en.name.as_deref().unwrap_or("<anonymous>")
                ));
                None
            }
        }
    }
}

impl Database {
    /// Resolve the whole database in place. Must run exactly once, after all
    /// files have been loaded; repeated calls are no-ops.
    pub fn prepare(&mut self) {
        if self.prepared {
            return;
        }
        self.prepared = true;
        let rs = Resolver::snapshot(self);

        let mut enums = mem::take(&mut self.enums);
        for en in &mut enums {
            if !en.inline {
                prep_enum(en, self, &rs);
            }
        }
        self.enums = enums;

        let mut bitsets = mem::take(&mut self.bitsets);
        for bs in &mut bitsets {
            if !bs.inline {
                prep_bitset(bs, self, &rs);
            }
        }
        self.bitsets = bitsets;

        let mut domains = mem::take(&mut self.domains);
        for dom in &mut domains {
            prep_domain(dom, self, &rs);
        }
        self.domains = domains;

        let mut spectypes = mem::take(&mut self.spectypes);
        for st in &mut spectypes {
            let raw = mem::replace(&mut st.typeinfo, TypeInfo::Boolean);
            st.typeinfo = resolve_type(
                raw,
                self,
                &rs,
                Some(&st.name),
                &Varinfo::default(),
                st.width,
                &st.name.clone(),
                &st.file.clone(),
            );
        }
        self.spectypes = spectypes;
    }
}

/// Resolve a varinfo against the snapshot, inheriting from `parent` and
/// narrowing (never widening) the permitted variant sets.
fn prep_varinfo(
    vi: &mut Varinfo,
    db: &mut Database,
    rs: &Resolver,
    what: &str,
    parent: Option<&Varinfo>,
) {
    if let Some(p) = parent {
        vi.prefenum = p.prefenum;
    }

    if let Some(pstr) = vi.prefix_str.clone() {
        if pstr == "none" {
            vi.prefenum = None;
        } else {
            vi.prefenum = rs.find_enum(&pstr);
        }
    }

    if let Some(p) = parent {
        vi.varsets.extend(p.varsets.iter().cloned());
    }

    // The prefix enum doubles as the default varset for variant narrowing.
    let mut varset = vi.prefenum;
    if varset.is_none() && vi.varset_str.is_none() {
        if let Some(p) = parent {
            vi.varset_str = p.varset_str.clone();
        }
    }
    if let Some(vstr) = &vi.varset_str {
        varset = rs.find_enum(vstr);
    }

    if let Some(varstr) = vi.variants_str.clone() {
        let venum = match varset {
            Some(v) => v,
            None => {
                db.report(format!("{}: tried to use variants without active varset!", what));
                return;
            }
        };
        let nvars = rs.enums.get(venum).map(|e| e.vals.len()).unwrap_or(0);

        let pos = match vi.varsets.iter().position(|vs| vs.venum == venum) {
            Some(p) => p,
            None => {
                vi.varsets.push(Varset {
                    venum,
                    variants: (0..nvars).collect(),
                });
                vi.varsets.len() - 1
            }
        };

        let mut curvars = std::collections::BTreeSet::new();
        for subvar in varstr.split(' ') {
            let range = if let Some((first, second)) = subvar.split_once(':') {
                // Half-open: the end variant itself is excluded.
                let idx1 = if first.is_empty() {
                    Some(0)
                } else {
                    rs.find_vidx(db, venum, first)
                };
                let idx2 = if second.is_empty() {
                    Some(nvars)
                } else {
                    rs.find_vidx(db, venum, second)
                };
                idx1.zip(idx2)
            } else if let Some((first, second)) = subvar.split_once('-') {
                let idx1 = if first.is_empty() {
                    Some(0)
                } else {
                    rs.find_vidx(db, venum, first)
                };
                let idx2 = if second.is_empty() {
                    Some(nvars)
                } else {
                    rs.find_vidx(db, venum, second).map(|i| i + 1)
                };
                idx1.zip(idx2)
            } else {
                rs.find_vidx(db, venum, subvar).map(|i| (i, i + 1))
            };
            if let Some((lo, hi)) = range {
                curvars.extend(lo..hi);
            }
        }

        vi.varsets[pos].variants = &vi.varsets[pos].variants & &curvars;
        if vi.varsets[pos].variants.is_empty() {
            vi.dead = true;
            return;
        }
    }

    if let Some(pe) = vi.prefenum {
        vi.prefix = vi
            .varsets
            .iter()
            .find(|vs| vs.venum == pe)
            .and_then(|vs| vs.variants.iter().next().copied())
            .and_then(|i| rs.enum_val_name(pe, i))
            .or_else(|| rs.enum_val_name(pe, 0));
    }
}

fn prep_enum(en: &mut Enum, db: &mut Database, rs: &Resolver) {
    let what = en.name.clone().unwrap_or_default();
    prep_varinfo(&mut en.varinfo, db, rs, &what, None);
    let prefix = if en.bare { None } else { en.name.as_deref() };
    for val in &mut en.vals {
        prep_value(val, db, rs, prefix, &en.varinfo);
    }
    en.fullname = Some(catstr(en.varinfo.prefix.as_deref(), &what));
    en.prepared = true;
}

fn prep_value(
    val: &mut crate::schema::Value,
    db: &mut Database,
    rs: &Resolver,
    prefix: Option<&str>,
    parvi: &Varinfo,
) {
    let fullname = catstr(prefix, &val.name);
    prep_varinfo(&mut val.varinfo, db, rs, &fullname, Some(parvi));
    if val.varinfo.dead {
        val.fullname = Some(fullname);
        return;
    }
    val.fullname = Some(catstr(val.varinfo.prefix.as_deref(), &fullname));
}

fn prep_bitset(bs: &mut Bitset, db: &mut Database, rs: &Resolver) {
    let what = bs.name.clone().unwrap_or_default();
    prep_varinfo(&mut bs.varinfo, db, rs, &what, None);
    let prefix = if bs.bare { None } else { bs.name.as_deref() };
    for bf in &mut bs.bitfields {
        prep_bitfield(bf, db, rs, prefix, &bs.varinfo);
    }
    bs.fullname = Some(catstr(bs.varinfo.prefix.as_deref(), &what));
    bs.prepared = true;
}

fn prep_bitfield(
    bf: &mut Bitfield,
    db: &mut Database,
    rs: &Resolver,
    prefix: Option<&str>,
    parvi: &Varinfo,
) {
    let fullname = catstr(prefix, &bf.name);
    prep_varinfo(&mut bf.varinfo, db, rs, &fullname, Some(parvi));
    if bf.varinfo.dead {
        bf.fullname = Some(fullname);
        return;
    }
    let raw = mem::replace(&mut bf.typeinfo, TypeInfo::Boolean);
    bf.typeinfo = resolve_type(
        raw,
        db,
        rs,
        Some(&fullname),
        &bf.varinfo,
        bf.width,
        &fullname,
        &bf.file.clone(),
    );
    bf.fullname = Some(catstr(bf.varinfo.prefix.as_deref(), &fullname));
}

fn prep_domain(dom: &mut Domain, db: &mut Database, rs: &Resolver) {
    let what = dom.name.clone();
    prep_varinfo(&mut dom.varinfo, db, rs, &what, None);
    let prefix = if dom.bare { None } else { Some(what.as_str()) };
    let width = dom.width;
    for elem in &mut dom.elems {
        prep_element(elem, db, rs, prefix, &dom.varinfo, width);
    }
    dom.fullname = Some(catstr(dom.varinfo.prefix.as_deref(), &what));
}

fn prep_element(
    elem: &mut Element,
    db: &mut Database,
    rs: &Resolver,
    prefix: Option<&str>,
    parvi: &Varinfo,
    width: u32,
) {
    if let Element::UseGroup(ug) = elem {
        // A group use is rewritten into an anonymous unit stripe carrying a
        // fresh copy of the group body, then resolved like any other stripe.
        let elems = match rs.groups.iter().find(|g| g.name == ug.name) {
            Some(g) => g.elems.iter().map(|e| e.raw_copy(&ug.file)).collect(),
            None => {
                db.report(format!("group {} not found!", ug.name));
                Vec::new()
            }
        };
        *elem = Element::Stripe(Stripe {
            name: None,
            offset: 0,
            length: 1,
            stride: None,
            full: false,
            elems,
            varinfo: Varinfo::default(),
            fullname: None,
            file: ug.file.clone(),
        });
    }

    match elem {
        Element::Reg(reg) => prep_register(reg, db, rs, prefix, parvi, width),
        Element::Stripe(stripe) => prep_stripe(stripe, db, rs, prefix, parvi, width),
        Element::UseGroup(_) => unreachable!("use-group rewritten above"),
    }
}

fn prep_register(
    reg: &mut Register,
    db: &mut Database,
    rs: &Resolver,
    prefix: Option<&str>,
    parvi: &Varinfo,
    width: u32,
) {
    let fullname = catstr(prefix, &reg.name);
    prep_varinfo(&mut reg.varinfo, db, rs, &fullname, Some(parvi));
    if reg.varinfo.dead {
        reg.fullname = Some(fullname);
        return;
    }
    if reg.length != 1 && reg.stride.is_none() {
        // Default stride is the register's own footprint in domain units.
        reg.stride = Some(u64::from(reg.width / width));
    }
    let raw = mem::replace(&mut reg.typeinfo, TypeInfo::Boolean);
    reg.typeinfo = resolve_type(
        raw,
        db,
        rs,
        Some(&fullname),
        &reg.varinfo,
        reg.width,
        &fullname,
        &reg.file.clone(),
    );
    reg.fullname = Some(catstr(reg.varinfo.prefix.as_deref(), &fullname));
}

fn prep_stripe(
    stripe: &mut Stripe,
    db: &mut Database,
    rs: &Resolver,
    prefix: Option<&str>,
    parvi: &Varinfo,
    width: u32,
) {
    let fullname = stripe.name.as_deref().map(|n| catstr(prefix, n));
    let what = fullname.clone().or_else(|| prefix.map(str::to_string));
    prep_varinfo(
        &mut stripe.varinfo,
        db,
        rs,
        what.as_deref().unwrap_or(""),
        Some(parvi),
    );
    if stripe.varinfo.dead {
        stripe.fullname = fullname;
        return;
    }
    if stripe.length != 1 && stripe.stride.is_none() {
        db.report(format!(
            "{} has non-1 length, but no stride!",
            fullname.as_deref().unwrap_or("<anonymous stripe>")
        ));
    }
    let parname = if stripe.name.is_some() {
        fullname.clone()
    } else {
        prefix.map(str::to_string)
    };
    let parvi = stripe.varinfo.clone();
    for elem in &mut stripe.elems {
        prep_element(elem, db, rs, parname.as_deref(), &parvi, width);
    }
    stripe.fullname = if stripe.name.is_some() {
        fullname.map(|f| catstr(stripe.varinfo.prefix.as_deref(), &f))
    } else {
        None
    };
}

/// Resolve a raw type reference into its final interpretation.
///
/// Inline enums and bitsets (whether referenced by name or embedded directly)
/// are copied and resolved at the use site so each copy narrows its variants
/// under the referring element's scope.
#[allow(clippy::too_many_arguments)]
fn resolve_type(
    ti: TypeInfo,
    db: &mut Database,
    rs: &Resolver,
    prefix: Option<&str>,
    vi: &Varinfo,
    width: u32,
    what: &str,
    file: &str,
) -> TypeInfo {
    let mut raw = match ti {
        TypeInfo::Raw(raw) => raw,
        other => return other,
    };

    if let Some(name) = raw.name.clone() {
        if let Some(ei) = rs.find_enum(&name) {
            if rs.enums[ei].inline {
                let mut vals: Vec<_> = rs.enums[ei]
                    .vals
                    .iter()
                    .map(|v| v.raw_copy(file))
                    .collect();
                for val in &mut vals {
                    prep_value(val, db, rs, prefix, vi);
                }
                return TypeInfo::InlineEnum(Box::new(anon_enum(vals, file)));
            }
            return TypeInfo::Enum(ei);
        }
        if let Some(bi) = rs.find_bitset(&name) {
            if rs.bitsets[bi].inline {
                let mut bitfields: Vec<_> = rs.bitsets[bi]
                    .bitfields
                    .iter()
                    .map(|b| b.raw_copy(file))
                    .collect();
                for bf in &mut bitfields {
                    prep_bitfield(bf, db, rs, prefix, vi);
                }
                return TypeInfo::InlineBitset(Box::new(anon_bitset(bitfields, file)));
            }
            return TypeInfo::Bitset(bi);
        }
        if let Some(si) = rs.find_spectype(&name) {
            return TypeInfo::SpecType(si);
        }
        return match name.as_str() {
            "hex" => TypeInfo::Hex {
                shr: raw.shr,
                add: raw.add,
                min: raw.min,
                max: raw.max,
                align: raw.align,
            },
            "uint" | "int" => TypeInfo::Int {
                shr: raw.shr,
                add: raw.add,
                min: raw.min,
                max: raw.max,
                align: raw.align,
                signed: name == "int",
            },
            "boolean" => TypeInfo::Boolean,
            "float" => TypeInfo::Float,
            "fixed" | "ufixed" => TypeInfo::Fixed {
                min: raw.min,
                max: raw.max,
                radix: raw.radix,
                signed: name == "fixed",
            },
            _ => {
                db.report(format!("{}: unknown type {}", what, name));
                TypeInfo::Hex {
                    shr: raw.shr,
                    add: raw.add,
                    min: raw.min,
                    max: raw.max,
                    align: None,
                }
            }
        };
    }

    if !raw.bitfields.is_empty() {
        for bf in &mut raw.bitfields {
            prep_bitfield(bf, db, rs, prefix, vi);
        }
        return TypeInfo::InlineBitset(Box::new(anon_bitset(raw.bitfields, file)));
    }
    if !raw.vals.is_empty() {
        for val in &mut raw.vals {
            prep_value(val, db, rs, prefix, vi);
        }
        return TypeInfo::InlineEnum(Box::new(anon_enum(raw.vals, file)));
    }
    if width == 1 {
        return TypeInfo::Boolean;
    }
    TypeInfo::Hex {
        shr: raw.shr,
        add: raw.add,
        min: raw.min,
        max: raw.max,
        align: raw.align,
    }
}

fn anon_enum(vals: Vec<crate::schema::Value>, file: &str) -> Enum {
    Enum {
        name: None,
        bare: false,
        inline: true,
        varinfo: Varinfo::default(),
        vals,
        fullname: None,
        prepared: true,
        file: file.to_string(),
    }
}

fn anon_bitset(bitfields: Vec<Bitfield>, file: &str) -> Bitset {
    Bitset {
        name: None,
        bare: false,
        inline: true,
        varinfo: Varinfo::default(),
        bitfields,
        fullname: None,
        prepared: true,
        file: file.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Access, RawType, Value};

    fn value(name: &str, v: u64) -> Value {
        Value {
            name: name.to_string(),
            value: Some(v),
            varinfo: Varinfo::default(),
            fullname: None,
            file: "test.xml".to_string(),
        }
    }

    fn chipset_enum() -> Enum {
        Enum {
            name: Some("chipset".to_string()),
            bare: true,
            inline: false,
            varinfo: Varinfo::default(),
            vals: vec![value("NV10", 0x10), value("NV20", 0x20), value("NV30", 0x30)],
            fullname: None,
            prepared: false,
            file: "test.xml".to_string(),
        }
    }

    fn reg32(name: &str, offset: u64, varinfo: Varinfo) -> Register {
        Register {
            name: name.to_string(),
            width: 32,
            access: Access::ReadWrite,
            offset,
            length: 1,
            stride: None,
            varinfo,
            typeinfo: TypeInfo::Raw(RawType::default()),
            fullname: None,
            file: "test.xml".to_string(),
        }
    }

    fn domain_with(elems: Vec<Element>) -> Domain {
        Domain {
            name: "MMIO".to_string(),
            bare: false,
            width: 8,
            size: None,
            varinfo: Varinfo::default(),
            elems,
            fullname: None,
            file: "test.xml".to_string(),
        }
    }

    #[test]
    fn test_variant_narrowing_marks_dead() {
        let mut db = Database::new();
        db.enums.push(chipset_enum());
        let vi = Varinfo::new(None, Some("chipset".into()), Some("NV20".into()));
        let mut reg = reg32("SCRATCH", 0x100, vi);
        reg.varinfo.varsets.push(Varset {
            venum: 0,
            variants: [0].into_iter().collect(),
        });
        db.domains.push(domain_with(vec![Element::Reg(reg)]));
        db.prepare();
        let Element::Reg(reg) = &db.domains[0].elems[0] else {
            panic!("expected register");
        };
        // NV20 does not intersect the inherited {NV10} set.
        assert!(reg.varinfo.dead);
        assert!(!db.errors);
    }

    #[test]
    fn test_variant_ranges() {
        let mut db = Database::new();
        db.enums.push(chipset_enum());
        let vi = Varinfo::new(None, Some("chipset".into()), Some("NV10-NV20".into()));
        db.domains.push(domain_with(vec![Element::Reg(reg32("A", 0, vi))]));
        db.prepare();
        let Element::Reg(reg) = &db.domains[0].elems[0] else {
            panic!("expected register");
        };
        let vars: Vec<usize> = reg.varinfo.varsets[0].variants.iter().copied().collect();
        // Dash ranges include the right endpoint.
        assert_eq!(vars, vec![0, 1]);
    }

    #[test]
    fn test_variant_exclusive_range() {
        let mut db = Database::new();
        db.enums.push(chipset_enum());
        let vi = Varinfo::new(None, Some("chipset".into()), Some("NV10:NV30".into()));
        db.domains.push(domain_with(vec![Element::Reg(reg32("A", 0, vi))]));
        db.prepare();
        let Element::Reg(reg) = &db.domains[0].elems[0] else {
            panic!("expected register");
        };
        let vars: Vec<usize> = reg.varinfo.varsets[0].variants.iter().copied().collect();
        assert_eq!(vars, vec![0, 1]);
    }

    #[test]
    fn test_variants_without_varset_reported() {
        let mut db = Database::new();
        let vi = Varinfo::new(None, None, Some("NV10".into()));
        db.domains.push(domain_with(vec![Element::Reg(reg32("A", 0, vi))]));
        db.prepare();
        assert!(db.errors);
    }

    #[test]
    fn test_prefix_from_prefenum() {
        let mut db = Database::new();
        db.enums.push(chipset_enum());
        let mut dom = domain_with(vec![Element::Reg(reg32("A", 0, Varinfo::default()))]);
        dom.varinfo = Varinfo::new(Some("chipset".into()), None, Some("NV20-".into()));
        db.domains.push(dom);
        db.prepare();
        // Lowest surviving variant names the prefix.
        assert_eq!(db.domains[0].varinfo.prefix.as_deref(), Some("NV20"));
        assert_eq!(db.domains[0].fullname.as_deref(), Some("NV20_MMIO"));
    }

    #[test]
    fn test_implicit_register_stride() {
        let mut db = Database::new();
        let mut reg = reg32("FIFO", 0x1000, Varinfo::default());
        reg.length = 4;
        db.domains.push(domain_with(vec![Element::Reg(reg)]));
        db.prepare();
        let Element::Reg(reg) = &db.domains[0].elems[0] else {
            panic!("expected register");
        };
        // 32-bit register in an 8-bit-unit domain.
        assert_eq!(reg.stride, Some(4));
        assert_eq!(reg.fullname.as_deref(), Some("MMIO_FIFO"));
    }

    #[test]
    fn test_width_one_register_defaults_to_boolean() {
        let mut db = Database::new();
        let mut reg = reg32("EN", 0, Varinfo::default());
        reg.width = 1;
        db.domains.push(domain_with(vec![Element::Reg(reg)]));
        db.prepare();
        let Element::Reg(reg) = &db.domains[0].elems[0] else {
            panic!("expected register");
        };
        assert!(matches!(reg.typeinfo, TypeInfo::Boolean));
    }

    #[test]
    fn test_named_enum_type_resolves_to_index() {
        let mut db = Database::new();
        db.enums.push(chipset_enum());
        let mut reg = reg32("SEL", 0, Varinfo::default());
        reg.typeinfo = TypeInfo::Raw(RawType {
            name: Some("chipset".to_string()),
            ..Default::default()
        });
        db.domains.push(domain_with(vec![Element::Reg(reg)]));
        db.prepare();
        let Element::Reg(reg) = &db.domains[0].elems[0] else {
            panic!("expected register");
        };
        assert!(matches!(reg.typeinfo, TypeInfo::Enum(0)));
    }

    #[test]
    fn test_inline_enum_copied_per_use() {
        let mut db = Database::new();
        let mut en = chipset_enum();
        en.inline = true;
        db.enums.push(en);
        let mut reg = reg32("SEL", 0, Varinfo::default());
        reg.typeinfo = TypeInfo::Raw(RawType {
            name: Some("chipset".to_string()),
            ..Default::default()
        });
        db.domains.push(domain_with(vec![Element::Reg(reg)]));
        db.prepare();
        let Element::Reg(reg) = &db.domains[0].elems[0] else {
            panic!("expected register");
        };
        let TypeInfo::InlineEnum(copy) = &reg.typeinfo else {
            panic!("expected inline copy");
        };
        // Copies take the use site's scope for value full names.
        assert_eq!(copy.vals[0].fullname.as_deref(), Some("MMIO_SEL_NV10"));
    }

    #[test]
    fn test_unknown_type_falls_back_to_hex() {
        let mut db = Database::new();
        let mut reg = reg32("X", 0, Varinfo::default());
        reg.typeinfo = TypeInfo::Raw(RawType {
            name: Some("no_such_type".to_string()),
            ..Default::default()
        });
        db.domains.push(domain_with(vec![Element::Reg(reg)]));
        db.prepare();
        assert!(db.errors);
        let Element::Reg(reg) = &db.domains[0].elems[0] else {
            panic!("expected register");
        };
        assert!(matches!(reg.typeinfo, TypeInfo::Hex { .. }));
    }

    #[test]
    fn test_use_group_splices_anonymous_stripe() {
        let mut db = Database::new();
        db.groups.push(Group {
            name: "common".to_string(),
            elems: vec![Element::Reg(reg32("CTRL", 0x4, Varinfo::default()))],
        });
        db.domains.push(domain_with(vec![Element::UseGroup(
            crate::schema::UseGroup {
                name: "common".to_string(),
                file: "test.xml".to_string(),
            },
        )]));
        db.prepare();
        let Element::Stripe(stripe) = &db.domains[0].elems[0] else {
            panic!("expected spliced stripe");
        };
        assert!(stripe.name.is_none());
        assert_eq!(stripe.offset, 0);
        assert_eq!(stripe.length, 1);
        let Element::Reg(reg) = &stripe.elems[0] else {
            panic!("expected register inside splice");
        };
        assert_eq!(reg.fullname.as_deref(), Some("MMIO_CTRL"));
    }

    #[test]
    fn test_missing_group_reported() {
        let mut db = Database::new();
        db.domains.push(domain_with(vec![Element::UseGroup(
            crate::schema::UseGroup {
                name: "nope".to_string(),
                file: "test.xml".to_string(),
            },
        )]));
        db.prepare();
        assert!(db.errors);
        let Element::Stripe(stripe) = &db.domains[0].elems[0] else {
            panic!("expected spliced stripe");
        };
        assert!(stripe.elems.is_empty());
    }

    #[test]
    fn test_prepare_is_idempotent() {
        let mut db = Database::new();
        db.enums.push(chipset_enum());
        db.prepare();
        let fullname = db.enums[0].fullname.clone();
        db.prepare();
        assert_eq!(db.enums[0].fullname, fullname);
    }
}
