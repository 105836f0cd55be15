// Licensed under the Apache-2.0 license

//! Address and value decoding against a prepared database.
//!
//! A [`Context`] pairs a read-only [`Database`] with a set of active chip
//! variant selections and a [`ColorScheme`]. Decoding walks the element tree
//! recursively: registers and array slots consume address indices, anonymous
//! stripes are transparent, and whatever range the schema does not account
//! for is rendered as error-colored raw hex instead of failing.

use anyhow::{anyhow, Result};

use crate::colors::{Chan, ColorScheme};
use crate::fp;
use crate::schema::{
    Bitset, Database, Domain, Element, Enum, EnumIdx, TypeInfo, Varinfo,
};

/// Result of an address lookup: the rendered name plus, when the address
/// landed on the start of a typed register, how to interpret its value.
pub struct AddrInfo<'a> {
    pub name: String,
    pub typeinfo: Option<&'a TypeInfo>,
    pub width: Option<u32>,
}

/// A decoding session: database, variant selections, coloring.
pub struct Context<'a> {
    db: &'a Database,
    colors: &'a ColorScheme,
    vars: Vec<(EnumIdx, usize)>,
}

impl<'a> Context<'a> {
    pub fn new(db: &'a Database, colors: &'a ColorScheme) -> Self {
        Context {
            db,
            colors,
            vars: Vec::new(),
        }
    }

    /// Select a variant: `varset` names an enum, `variant` one of its values.
    /// Selections accumulate, one per variant axis.
    pub fn add_variant(&mut self, varset: &str, variant: &str) -> Result<()> {
        let eidx = self
            .db
            .find_enum(varset)
            .ok_or_else(|| anyhow!("Enum {} doesn't exist in database!", varset))?;
        let vidx = self.db.enums[eidx]
            .vals
            .iter()
            .position(|v| v.name == variant)
            .ok_or_else(|| anyhow!("Variant {} doesn't exist in enum {}!", variant, varset))?;
        self.vars.push((eidx, vidx));
        Ok(())
    }

    /// Whether an element is visible under the current variant selections.
    ///
    /// An axis with no selection is accepted with a warning rather than
    /// rejected, so an unconfigured context still decodes everything.
    fn var_match(&self, vi: &Varinfo) -> bool {
        if vi.dead {
            return false;
        }
        for vs in &vi.varsets {
            match self.vars.iter().find(|(eidx, _)| *eidx == vs.venum) {
                Some((_, vidx)) => {
                    if !vs.variants.contains(vidx) {
                        return false;
                    }
                }
                None => {
                    let name = self
                        .db
                        .enums
                        .get(vs.venum)
                        .and_then(|e| e.name.as_deref())
                        .unwrap_or("<anonymous>");
                    log::warn!("I don't know which {} variant to use!", name);
                }
            }
        }
        true
    }

    fn enum_of<'t>(&'t self, ti: &'t TypeInfo) -> Option<&'t Enum> {
        match ti {
            TypeInfo::Enum(i) => self.db.enums.get(*i),
            TypeInfo::InlineEnum(en) => Some(en),
            _ => None,
        }
    }

    fn bitset_of<'t>(&'t self, ti: &'t TypeInfo) -> Option<&'t Bitset> {
        match ti {
            TypeInfo::Bitset(i) => self.db.bitsets.get(*i),
            TypeInfo::InlineBitset(bs) => Some(bs),
            _ => None,
        }
    }

    /// Render a raw value of `width` bits according to `ti`.
    pub fn decode_val(&self, ti: &TypeInfo, value: u64, width: u32) -> String {
        if let Some(en) = self.enum_of(ti) {
            for val in &en.vals {
                if self.var_match(&val.varinfo) && val.value == Some(value) {
                    return self.colors.paint(Chan::Val, &val.name);
                }
            }
        } else if let Some(bs) = self.bitset_of(ti) {
            return self.decode_bitset(bs, value);
        } else {
            match ti {
                TypeInfo::SpecType(i) => {
                    if let Some(st) = self.db.spectypes.get(*i) {
                        return self.decode_val(&st.typeinfo, value, width);
                    }
                }
                TypeInfo::Int { shr, add, signed, .. } => {
                    let mut v = value as i128;
                    if *signed && width > 0 && (value >> (width - 1)) & 1 == 1 {
                        v |= -1i128 << width;
                    }
                    let v = (v << shr) + i128::from(*add);
                    return self.colors.paint(Chan::Num, &v.to_string());
                }
                TypeInfo::Hex { shr, add, .. } => {
                    let v = value.wrapping_shl(*shr).wrapping_add(*add as u64);
                    return self.colors.paint(Chan::Num, &format!("{:#x}", v));
                }
                TypeInfo::Boolean => {
                    if value == 0 {
                        return self.colors.paint(Chan::Eval, "FALSE");
                    } else if value == 1 {
                        return self.colors.paint(Chan::Eval, "TRUE");
                    }
                }
                TypeInfo::Fixed { radix, signed, .. } => {
                    let mut v = value as i128;
                    if *signed && width > 0 && (value >> (width - 1)) & 1 == 1 {
                        v |= -1i128 << width;
                    }
                    let scaled = v as f64 / (1u64 << (*radix).min(63)) as f64;
                    return self.colors.paint(Chan::Num, &format!("{:?}", scaled));
                }
                TypeInfo::Float => match width {
                    64 => {
                        return self
                            .colors
                            .paint(Chan::Num, &format!("{:?}", fp::float64(value)));
                    }
                    32 => {
                        return self
                            .colors
                            .paint(Chan::Num, &format!("{:?}", fp::float32(value as u32)));
                    }
                    16 => {
                        return self
                            .colors
                            .paint(Chan::Num, &format!("{:?}", fp::float16(value as u16)));
                    }
                    _ => {}
                },
                _ => {}
            }
        }
        // Unmatched enum values, out-of-range booleans, odd float widths.
        self.colors.paint(Chan::Err, &format!("{:#x}", value))
    }

    fn decode_bitset(&self, bs: &Bitset, value: u64) -> String {
        let mut mask = 0u64;
        let mut res: Vec<String> = Vec::new();
        for bf in &bs.bitfields {
            if !self.var_match(&bf.varinfo) {
                continue;
            }
            let sval = (value & bf.mask) >> bf.low;
            mask |= bf.mask;
            if matches!(bf.typeinfo, TypeInfo::Boolean) {
                if sval == 0 {
                    continue;
                } else if sval == 1 {
                    res.push(self.colors.paint(Chan::Mod, &bf.name));
                    continue;
                }
            }
            let subval = self.decode_val(&bf.typeinfo, sval, bf.width);
            res.push(format!(
                "{} = {}",
                self.colors.paint(Chan::Rname, &bf.name),
                subval
            ));
        }
        if value & !mask != 0 {
            res.push(
                self.colors
                    .paint(Chan::Err, &format!("{:#x}", value & !mask)),
            );
        }
        if res.is_empty() {
            res.push(self.colors.paint(Chan::Num, "0"));
        }
        format!("{{ {} }}", res.join(" | "))
    }

    /// Look up an address inside a domain. Always renders something; an
    /// address no element claims comes back as error-colored hex with no
    /// type information.
    pub fn decode_addr(&self, domain: &'a Domain, addr: u64, _write: bool) -> AddrInfo<'a> {
        match self.try_match(&domain.elems, addr, domain.width, &[]) {
            Some(info) => info,
            None => AddrInfo {
                name: self.colors.paint(Chan::Err, &format!("{:#x}", addr)),
                typeinfo: None,
                width: None,
            },
        }
    }

    fn indexed_name(&self, name: &str, indices: &[u64]) -> String {
        let mut out = self.colors.paint(Chan::Rname, name);
        for idx in indices {
            out += &format!("[{}]", self.colors.paint(Chan::Num, &format!("{:#x}", idx)));
        }
        out
    }

    fn try_match(
        &self,
        elems: &'a [Element],
        addr: u64,
        dwidth: u32,
        indices: &[u64],
    ) -> Option<AddrInfo<'a>> {
        for elem in elems {
            match elem {
                Element::Reg(reg) => {
                    if !self.var_match(&reg.varinfo) || addr < reg.offset {
                        continue;
                    }
                    let (idx, offset) = match reg.stride {
                        Some(stride) if stride != 0 => {
                            ((addr - reg.offset) / stride, (addr - reg.offset) % stride)
                        }
                        _ => (0, addr - reg.offset),
                    };
                    if offset >= u64::from(reg.width / dwidth) {
                        continue;
                    }
                    if reg.length != 0 && idx >= reg.length {
                        continue;
                    }
                    let mut eindices = indices.to_vec();
                    if matches!(reg.stride, Some(s) if s != 0) {
                        eindices.push(idx);
                    }
                    let mut name = self.indexed_name(&reg.name, &eindices);
                    if offset != 0 {
                        name += &format!(
                            "+ {}",
                            self.colors.paint(Chan::Err, &format!("{:#x}", offset))
                        );
                    }
                    return Some(AddrInfo {
                        name,
                        typeinfo: Some(&reg.typeinfo),
                        width: Some(reg.width),
                    });
                }
                Element::Stripe(stripe) if !stripe.full => {
                    if !self.var_match(&stripe.varinfo) {
                        continue;
                    }
                    let stride = stripe.stride.unwrap_or(0);
                    // Probe ascending repeat indices; overlapping layouts are
                    // legal, the first repeat whose children claim the
                    // address wins.
                    let probes = match stripe.stride {
                        Some(s) if s != 0 => {
                            if addr < stripe.offset {
                                0
                            } else {
                                let m = (addr - stripe.offset) / s + 1;
                                if stripe.length != 0 {
                                    m.min(stripe.length)
                                } else {
                                    m
                                }
                            }
                        }
                        _ => 1,
                    };
                    for idx in 0..probes {
                        let base = stripe.offset + stride * idx;
                        if addr < base {
                            break;
                        }
                        let offset = addr - base;
                        let mut eindices = indices.to_vec();
                        if stripe.length != 1 {
                            eindices.push(idx);
                        }
                        let sub: &[u64] = if stripe.name.is_some() { &[] } else { &eindices };
                        let Some(res) = self.try_match(&stripe.elems, offset, dwidth, sub)
                        else {
                            continue;
                        };
                        let Some(name) = &stripe.name else {
                            return Some(res);
                        };
                        return Some(AddrInfo {
                            name: format!("{}.{}", self.indexed_name(name, &eindices), res.name),
                            ..res
                        });
                    }
                }
                Element::Stripe(stripe) => {
                    if !self.var_match(&stripe.varinfo) || addr < stripe.offset {
                        continue;
                    }
                    // Arrays must carry a stride; a zero one is undecodable.
                    let Some(stride) = stripe.stride.filter(|&s| s != 0) else {
                        continue;
                    };
                    let idx = (addr - stripe.offset) / stride;
                    let offset = (addr - stripe.offset) % stride;
                    if stripe.length != 0 && idx >= stripe.length {
                        continue;
                    }
                    let mut eindices = indices.to_vec();
                    if stripe.length != 1 {
                        eindices.push(idx);
                    }
                    let name =
                        self.indexed_name(stripe.name.as_deref().unwrap_or(""), &eindices);
                    return Some(
                        match self.try_match(&stripe.elems, offset, dwidth, &[]) {
                            Some(res) => AddrInfo {
                                name: format!("{}.{}", name, res.name),
                                ..res
                            },
                            None => AddrInfo {
                                name: format!(
                                    "{}+ {}",
                                    name,
                                    self.colors.paint(Chan::Err, &format!("{:#x}", offset))
                                ),
                                typeinfo: None,
                                width: None,
                            },
                        },
                    );
                }
                // Rewritten away during prepare.
                Element::UseGroup(_) => continue,
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colors::{NULL, TERM};
    use crate::parse::parse_document;

    const DB: &str = r#"<?xml version="1.0"?>
<database xmlns="http://nouveau.freedesktop.org/">
  <enum name="chipset" bare="yes">
    <value name="NV10" value="0x10"/>
    <value name="NV20" value="0x20"/>
    <value name="NV30" value="0x30"/>
  </enum>
  <enum name="mode">
    <value name="LINEAR" value="0"/>
    <value name="TILED" value="1"/>
  </enum>
  <bitset name="control">
    <bitfield name="ENABLE" pos="0"/>
    <bitfield name="MODE" high="2" low="1" type="mode"/>
    <bitfield name="COUNT" high="7" low="4" type="uint"/>
  </bitset>
  <domain name="MMIO">
    <reg32 name="CTRL" offset="0x0" type="control"/>
    <reg32 name="SCRATCH" offset="0x100" length="4"/>
    <reg32 name="OLD" offset="0x200" varset="chipset" variants="NV10-NV20"/>
    <reg32 name="NEW" offset="0x200" varset="chipset" variants="NV30-"/>
    <stripe name="HEAD" offset="0x1000" length="2" stride="0x800">
      <reg32 name="CFG" offset="0x0"/>
      <reg32 name="STAT" offset="0x4" type="float"/>
    </stripe>
    <array name="UNIT" offset="0x4000" length="4" stride="0x100">
      <reg32 name="CTL" offset="0x0"/>
    </array>
    <stripe offset="0x8000">
      <reg32 name="SPLICED" offset="0x0"/>
    </stripe>
  </domain>
</database>
"#;

    fn load() -> Database {
        let mut db = Database::new();
        parse_document(&mut db, "test.xml", DB).unwrap();
        db.prepare();
        assert!(!db.errors);
        db
    }

    fn decode<'a>(db: &'a Database, ctx: &Context<'a>, addr: u64) -> String {
        let dom = &db.domains[db.find_domain("MMIO").unwrap()];
        ctx.decode_addr(dom, addr, false).name
    }

    #[test]
    fn test_decode_plain_register() {
        let db = load();
        let ctx = Context::new(&db, &NULL);
        assert_eq!(decode(&db, &ctx, 0x0), "CTRL");
    }

    #[test]
    fn test_decode_register_array_index() {
        let db = load();
        let ctx = Context::new(&db, &NULL);
        assert_eq!(decode(&db, &ctx, 0x104), "SCRATCH[0x1]");
        assert_eq!(decode(&db, &ctx, 0x10c), "SCRATCH[0x3]");
        // Past the declared length.
        assert_eq!(decode(&db, &ctx, 0x110), "0x110");
    }

    #[test]
    fn test_decode_misaligned_register() {
        let db = load();
        let ctx = Context::new(&db, &NULL);
        assert_eq!(decode(&db, &ctx, 0x106), "SCRATCH[0x1]+ 0x2");
    }

    #[test]
    fn test_variant_selects_register() {
        let db = load();
        let mut ctx = Context::new(&db, &NULL);
        ctx.add_variant("chipset", "NV10").unwrap();
        assert_eq!(decode(&db, &ctx, 0x200), "OLD");

        let mut ctx = Context::new(&db, &NULL);
        ctx.add_variant("chipset", "NV30").unwrap();
        assert_eq!(decode(&db, &ctx, 0x200), "NEW");
    }

    #[test]
    fn test_unselected_variant_takes_first() {
        let db = load();
        let ctx = Context::new(&db, &NULL);
        assert_eq!(decode(&db, &ctx, 0x200), "OLD");
    }

    #[test]
    fn test_add_variant_unknown() {
        let db = load();
        let mut ctx = Context::new(&db, &NULL);
        assert!(ctx.add_variant("nope", "NV10").is_err());
        assert!(ctx.add_variant("chipset", "NV99").is_err());
    }

    #[test]
    fn test_decode_stripe() {
        let db = load();
        let ctx = Context::new(&db, &NULL);
        assert_eq!(decode(&db, &ctx, 0x1000), "HEAD[0x0].CFG");
        assert_eq!(decode(&db, &ctx, 0x1804), "HEAD[0x1].STAT");
    }

    #[test]
    fn test_decode_array_residual() {
        let db = load();
        let ctx = Context::new(&db, &NULL);
        assert_eq!(decode(&db, &ctx, 0x4200), "UNIT[0x2].CTL");
        // Inside the slot but past its children.
        assert_eq!(decode(&db, &ctx, 0x4208), "UNIT[0x2]+ 0x8");
    }

    #[test]
    fn test_anonymous_stripe_is_transparent() {
        let db = load();
        let ctx = Context::new(&db, &NULL);
        assert_eq!(decode(&db, &ctx, 0x8000), "SPLICED");
    }

    #[test]
    fn test_unknown_address() {
        let db = load();
        let ctx = Context::new(&db, &NULL);
        assert_eq!(decode(&db, &ctx, 0xdead00), "0xdead00");
        let ctx = Context::new(&db, &TERM);
        assert_eq!(
            decode(&db, &ctx, 0xdead00),
            "\x1b[0;1;31m0xdead00\x1b[0m"
        );
    }

    #[test]
    fn test_decode_bitset_value() {
        let db = load();
        let ctx = Context::new(&db, &NULL);
        let dom = &db.domains[db.find_domain("MMIO").unwrap()];
        let info = ctx.decode_addr(dom, 0x0, false);
        let ti = info.typeinfo.unwrap();
        assert_eq!(
            ctx.decode_val(ti, 0x53, 32),
            "{ ENABLE | MODE = TILED | COUNT = 5 }"
        );
        // Clear booleans are omitted; other fields always render.
        assert_eq!(ctx.decode_val(ti, 0x0, 32), "{ MODE = LINEAR | COUNT = 0 }");
        // Bits no field covers come back as residual error hex.
        assert_eq!(
            ctx.decode_val(ti, 0x100, 32),
            "{ MODE = LINEAR | COUNT = 0 | 0x100 }"
        );
    }

    #[test]
    fn test_decode_bitset_all_clear() {
        let db = load();
        let ctx = Context::new(&db, &NULL);
        let flags = TypeInfo::InlineBitset(Box::new(crate::schema::Bitset {
            name: None,
            bare: false,
            inline: true,
            varinfo: Varinfo::default(),
            bitfields: vec![crate::schema::Bitfield {
                name: "EN".to_string(),
                low: 0,
                high: 0,
                mask: 0x1,
                width: 1,
                varinfo: Varinfo::default(),
                typeinfo: TypeInfo::Boolean,
                fullname: None,
                file: "test.xml".to_string(),
            }],
            fullname: None,
            prepared: true,
            file: "test.xml".to_string(),
        }));
        assert_eq!(ctx.decode_val(&flags, 0, 32), "{ 0 }");
        assert_eq!(ctx.decode_val(&flags, 1, 32), "{ EN }");
    }

    #[test]
    fn test_decode_float_value() {
        let db = load();
        let ctx = Context::new(&db, &NULL);
        let dom = &db.domains[db.find_domain("MMIO").unwrap()];
        let info = ctx.decode_addr(dom, 0x1004, false);
        let ti = info.typeinfo.unwrap();
        assert_eq!(ctx.decode_val(ti, 0x3f800000, 32), "1.0");
    }

    #[test]
    fn test_decode_primitive_values() {
        let db = load();
        let ctx = Context::new(&db, &NULL);
        let int = TypeInfo::Int {
            shr: 0,
            add: 0,
            min: None,
            max: None,
            align: None,
            signed: true,
        };
        assert_eq!(ctx.decode_val(&int, 0xffff, 16), "-1");
        assert_eq!(ctx.decode_val(&int, 0x7fff, 16), "32767");

        let hex = TypeInfo::Hex {
            shr: 4,
            add: 0,
            min: None,
            max: None,
            align: None,
        };
        assert_eq!(ctx.decode_val(&hex, 0x2, 32), "0x20");

        assert_eq!(ctx.decode_val(&TypeInfo::Boolean, 0, 1), "FALSE");
        assert_eq!(ctx.decode_val(&TypeInfo::Boolean, 1, 1), "TRUE");
        assert_eq!(ctx.decode_val(&TypeInfo::Boolean, 2, 1), "0x2");

        let fixed = TypeInfo::Fixed {
            min: None,
            max: None,
            radix: 4,
            signed: false,
        };
        assert_eq!(ctx.decode_val(&fixed, 0x18, 8), "1.5");
    }

    #[test]
    fn test_decode_enum_value_miss() {
        let db = load();
        let ctx = Context::new(&db, &NULL);
        let ti = TypeInfo::Enum(db.find_enum("mode").unwrap());
        assert_eq!(ctx.decode_val(&ti, 1, 32), "TILED");
        assert_eq!(ctx.decode_val(&ti, 7, 32), "0x7");
    }
}
