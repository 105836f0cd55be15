// Licensed under the Apache-2.0 license

//! XML database loading.
//!
//! Files are located through a colon-separated search path (the `RNN_PATH`
//! environment variable, falling back to [`DEFAULT_PATH`]) and may pull in
//! further files with `<import>`. Each file is loaded at most once per
//! database, keyed by the name it was first referenced with.
//!
//! Loading is deliberately forgiving: malformed constructs are reported
//! through the database's sticky error flag and skipped, and the rest of the
//! file is still used. The one fatal condition is two files declaring
//! different license texts, which would make every generated artifact
//! legally ambiguous.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use roxmltree::Node;

use crate::schema::{
    Access, Author, Bitfield, Bitset, Database, Domain, Element, Enum, Group, RawType, Register,
    SpecType, Stripe, TypeInfo, UseGroup, Value, Varinfo,
};
use crate::util::{parse_int, parse_uint};

/// Schema namespace. Tags in this namespace or in none at all are accepted.
const NS: &str = "http://nouveau.freedesktop.org/";

/// Search path used when `RNN_PATH` is not set.
pub const DEFAULT_PATH: &str = "rnndb:/usr/local/share/rnndb";

/// The active database search path.
pub fn database_path() -> String {
    std::env::var("RNN_PATH").unwrap_or_else(|_| DEFAULT_PATH.to_string())
}

fn find_in_paths(name: &str, paths: &str) -> Option<PathBuf> {
    paths
        .split(':')
        .filter(|p| !p.is_empty())
        .map(|p| Path::new(p).join(name))
        .find(|p| p.is_file())
}

/// Load `fname` (and everything it imports) into `db`.
///
/// Missing or malformed files are recoverable: they are reported and the
/// database keeps whatever loaded so far. The only `Err` is a conflicting
/// license declaration.
pub fn parse_file(db: &mut Database, fname: &str) -> Result<()> {
    if db.files.contains(fname) {
        return Ok(());
    }

    let Some(fullname) = find_in_paths(fname, &database_path()) else {
        db.report(format!(
            "{}: couldn't find database file. Please set the env var RNN_PATH.",
            fname
        ));
        return Ok(());
    };

    db.files.insert(fname.to_string());
    let text = match fs::read_to_string(&fullname) {
        Ok(text) => text,
        Err(err) => {
            db.report(format!("{}: {}", fullname.display(), err));
            return Ok(());
        }
    };
    parse_document(db, fname, &text)
}

/// Parse one XML document held in memory, attributing diagnostics to `file`.
pub fn parse_document(db: &mut Database, file: &str, xml: &str) -> Result<()> {
    db.files.insert(file.to_string());
    let doc = match roxmltree::Document::parse(xml) {
        Ok(doc) => doc,
        Err(err) => {
            db.report(format!("{}: {}", file, err));
            return Ok(());
        }
    };
    let root = doc.root_element();
    if tag(root) != Some("database") {
        db.report(format!(
            "{}: wrong top-level tag <{}>",
            file,
            root.tag_name().name()
        ));
        return Ok(());
    }
    for child in root.children().filter(Node::is_element) {
        if !parse_top(db, file, child)? && !is_doc(child) {
            db.report(format!(
                "{}: wrong tag in database: <{}>",
                file,
                child.tag_name().name()
            ));
        }
    }
    Ok(())
}

/// Local tag name, if the node is in the accepted namespace.
fn tag<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    let tn = node.tag_name();
    match tn.namespace() {
        None | Some(NS) => Some(tn.name()),
        Some(_) => None,
    }
}

fn is_doc(node: Node) -> bool {
    matches!(tag(node), Some("doc") | Some("brief"))
}

/// Handle a container-level tag that is legal anywhere. Returns whether the
/// node was consumed.
fn parse_top(db: &mut Database, file: &str, node: Node) -> Result<bool> {
    match tag(node) {
        Some("enum") => parse_enum(db, file, node)?,
        Some("bitset") => parse_bitset(db, file, node)?,
        Some("group") => parse_group(db, file, node)?,
        Some("domain") => parse_domain(db, file, node)?,
        Some("spectype") => parse_spectype(db, file, node)?,
        Some("import") => parse_import(db, file, node)?,
        Some("copyright") => parse_copyright(db, file, node)?,
        _ => return Ok(false),
    }
    Ok(true)
}

//=============================================================================
// Attribute helpers
//=============================================================================

fn check_attrs(db: &mut Database, file: &str, node: Node, known: &[&str]) {
    for attr in node.attributes() {
        if !known.contains(&attr.name()) {
            db.report(format!(
                "{}: wrong attribute \"{}\" for {}",
                file,
                attr.name(),
                node.tag_name().name()
            ));
        }
    }
}

fn attr_u64(db: &mut Database, file: &str, node: Node, name: &str) -> Option<u64> {
    let raw = node.attribute(name)?;
    match parse_uint(raw) {
        Some(v) => Some(v),
        None => {
            db.report(format!(
                "{}: invalid number \"{}\" for attribute \"{}\"",
                file, raw, name
            ));
            None
        }
    }
}

fn attr_u32(db: &mut Database, file: &str, node: Node, name: &str) -> Option<u32> {
    let v = attr_u64(db, file, node, name)?;
    match u32::try_from(v) {
        Ok(v) => Some(v),
        Err(_) => {
            db.report(format!(
                "{}: attribute \"{}\" value {} out of range",
                file, name, v
            ));
            None
        }
    }
}

fn attr_i64(db: &mut Database, file: &str, node: Node, name: &str) -> Option<i64> {
    let raw = node.attribute(name)?;
    match parse_int(raw) {
        Some(v) => Some(v),
        None => {
            db.report(format!(
                "{}: invalid number \"{}\" for attribute \"{}\"",
                file, raw, name
            ));
            None
        }
    }
}

fn attr_bool(db: &mut Database, file: &str, node: Node, name: &str) -> bool {
    match node.attribute(name) {
        None | Some("no") | Some("0") => false,
        Some("yes") | Some("1") => true,
        Some(other) => {
            db.report(format!(
                "{}: invalid boolean \"{}\" for attribute \"{}\"",
                file, other, name
            ));
            false
        }
    }
}

fn attr_string(node: Node, name: &str) -> Option<String> {
    node.attribute(name).map(str::to_string)
}

fn varinfo_attrs(node: Node) -> Varinfo {
    Varinfo::new(
        attr_string(node, "prefix"),
        attr_string(node, "varset"),
        attr_string(node, "variants"),
    )
}

/// Common numeric interpretation attributes for typed fields.
fn rawtype_attrs(db: &mut Database, file: &str, node: Node) -> RawType {
    RawType {
        name: attr_string(node, "type"),
        bitfields: Vec::new(),
        vals: Vec::new(),
        shr: match attr_u32(db, file, node, "shr") {
            Some(shr) if shr > 63 => {
                db.report(format!("{}: shr {} out of range", file, shr));
                0
            }
            Some(shr) => shr,
            None => 0,
        },
        add: attr_i64(db, file, node, "add").unwrap_or(0),
        min: attr_i64(db, file, node, "min"),
        max: attr_i64(db, file, node, "max"),
        align: attr_u64(db, file, node, "align"),
        radix: attr_u32(db, file, node, "radix").unwrap_or(0),
    }
}

const TYPE_ATTRS: &[&str] = &["type", "shr", "add", "min", "max", "align", "radix"];

fn with_type_attrs<'a>(known: &[&'a str]) -> Vec<&'a str> {
    let mut all = known.to_vec();
    all.extend_from_slice(TYPE_ATTRS);
    all
}

//=============================================================================
// Leaf parsers
//=============================================================================

fn parse_value(db: &mut Database, file: &str, node: Node) -> Result<Option<Value>> {
    check_attrs(db, file, node, &["name", "value", "varset", "variants"]);
    let name = attr_string(node, "name");
    let value = attr_u64(db, file, node, "value");
    for child in node.children().filter(Node::is_element) {
        if !parse_top(db, file, child)? && !is_doc(child) {
            db.report(format!(
                "{}: wrong tag in value: <{}>",
                file,
                child.tag_name().name()
            ));
        }
    }
    let Some(name) = name else {
        db.report(format!("{}: nameless value", file));
        return Ok(None);
    };
    Ok(Some(Value {
        name,
        value,
        varinfo: Varinfo::new(None, attr_string(node, "varset"), attr_string(node, "variants")),
        fullname: None,
        file: file.to_string(),
    }))
}

fn parse_bitfield(db: &mut Database, file: &str, node: Node) -> Result<Option<Bitfield>> {
    check_attrs(
        db,
        file,
        node,
        &with_type_attrs(&["name", "high", "low", "pos", "varset", "variants"]),
    );
    let name = attr_string(node, "name");
    let pos = attr_u32(db, file, node, "pos");
    let high = attr_u32(db, file, node, "high");
    let low = attr_u32(db, file, node, "low");

    let mut raw = rawtype_attrs(db, file, node);
    for child in node.children().filter(Node::is_element) {
        match tag(child) {
            Some("value") => {
                if let Some(val) = parse_value(db, file, child)? {
                    raw.vals.push(val);
                }
            }
            Some("bitfield") => {
                if let Some(bf) = parse_bitfield(db, file, child)? {
                    raw.bitfields.push(bf);
                }
            }
            _ => {
                if !parse_top(db, file, child)? && !is_doc(child) {
                    db.report(format!(
                        "{}: wrong tag in bitfield: <{}>",
                        file,
                        child.tag_name().name()
                    ));
                }
            }
        }
    }

    let (low, high) = match (pos, high, low) {
        (Some(pos), None, None) => (pos, pos),
        (None, Some(high), Some(low)) => (low, high),
        _ => {
            db.report(format!(
                "{}: bitfield {} has invalid placement attr",
                file,
                name.as_deref().unwrap_or("<nameless>")
            ));
            return Ok(None);
        }
    };
    let Some(name) = name else {
        db.report(format!("{}: nameless bitfield", file));
        return Ok(None);
    };
    if high < low || high > 63 {
        db.report(format!("{}: bitfield has wrong placement", file));
        return Ok(None);
    }
    Ok(Some(Bitfield {
        name,
        low,
        high,
        mask: Bitfield::mask_for(low, high),
        width: high - low + 1,
        varinfo: Varinfo::new(None, attr_string(node, "varset"), attr_string(node, "variants")),
        typeinfo: TypeInfo::Raw(raw),
        fullname: None,
        file: file.to_string(),
    }))
}

//=============================================================================
// Domain element parsers
//=============================================================================

/// Parse one child of a domain, stripe or group body. Returns `None` for
/// non-element tags (handled or reported in place).
fn parse_elem(db: &mut Database, file: &str, node: Node) -> Result<Option<Element>> {
    match tag(node) {
        Some("reg8") => Ok(parse_reg(db, file, node, 8)?.map(Element::Reg)),
        Some("reg16") => Ok(parse_reg(db, file, node, 16)?.map(Element::Reg)),
        Some("reg32") => Ok(parse_reg(db, file, node, 32)?.map(Element::Reg)),
        Some("reg64") => Ok(parse_reg(db, file, node, 64)?.map(Element::Reg)),
        Some("stripe") => Ok(parse_stripe(db, file, node, false)?.map(Element::Stripe)),
        Some("array") => Ok(parse_stripe(db, file, node, true)?.map(Element::Stripe)),
        Some("use-group") => Ok(parse_usegroup(db, file, node).map(Element::UseGroup)),
        _ => {
            if !parse_top(db, file, node)? && !is_doc(node) {
                db.report(format!(
                    "{}: wrong tag: <{}>",
                    file,
                    node.tag_name().name()
                ));
            }
            Ok(None)
        }
    }
}

fn parse_reg(db: &mut Database, file: &str, node: Node, width: u32) -> Result<Option<Register>> {
    check_attrs(
        db,
        file,
        node,
        &with_type_attrs(&[
            "name", "offset", "length", "stride", "varset", "variants", "access",
        ]),
    );
    let name = attr_string(node, "name");
    let offset = attr_u64(db, file, node, "offset");
    let length = attr_u64(db, file, node, "length").unwrap_or(1);
    let stride = attr_u64(db, file, node, "stride");
    let access = match node.attribute("access") {
        None | Some("rw") => Access::ReadWrite,
        Some("r") => Access::Read,
        Some("w") => Access::Write,
        Some(other) => {
            db.report(format!(
                "{}: wrong access type \"{}\" for register",
                file, other
            ));
            Access::ReadWrite
        }
    };

    let mut raw = rawtype_attrs(db, file, node);
    for child in node.children().filter(Node::is_element) {
        match tag(child) {
            Some("value") => {
                if let Some(val) = parse_value(db, file, child)? {
                    raw.vals.push(val);
                }
            }
            Some("bitfield") => {
                if let Some(bf) = parse_bitfield(db, file, child)? {
                    raw.bitfields.push(bf);
                }
            }
            _ => {
                if !parse_top(db, file, child)? && !is_doc(child) {
                    db.report(format!(
                        "{}: wrong tag in reg: <{}>",
                        file,
                        child.tag_name().name()
                    ));
                }
            }
        }
    }

    let Some(name) = name else {
        db.report(format!("{}: nameless register", file));
        return Ok(None);
    };
    let Some(offset) = offset else {
        db.report(format!("{}: register {} without offset", file, name));
        return Ok(None);
    };
    Ok(Some(Register {
        name,
        width,
        access,
        offset,
        length,
        stride,
        varinfo: Varinfo::new(None, attr_string(node, "varset"), attr_string(node, "variants")),
        typeinfo: TypeInfo::Raw(raw),
        fullname: None,
        file: file.to_string(),
    }))
}

fn parse_stripe(db: &mut Database, file: &str, node: Node, full: bool) -> Result<Option<Stripe>> {
    check_attrs(
        db,
        file,
        node,
        &["name", "offset", "length", "stride", "prefix", "varset", "variants"],
    );
    let name = attr_string(node, "name");
    let offset = attr_u64(db, file, node, "offset").unwrap_or(0);
    let length = attr_u64(db, file, node, "length").unwrap_or(1);
    let stride = attr_u64(db, file, node, "stride");

    let mut elems = Vec::new();
    for child in node.children().filter(Node::is_element) {
        if let Some(elem) = parse_elem(db, file, child)? {
            elems.push(elem);
        }
    }

    // An array addresses every slot unconditionally, so a missing stride
    // leaves it undecodable.
    if full && stride.is_none() {
        db.report(format!(
            "{}: array {} has no stride",
            file,
            name.as_deref().unwrap_or("<nameless>")
        ));
        return Ok(None);
    }
    Ok(Some(Stripe {
        name,
        offset,
        length,
        stride,
        full,
        elems,
        varinfo: varinfo_attrs(node),
        fullname: None,
        file: file.to_string(),
    }))
}

fn parse_usegroup(db: &mut Database, file: &str, node: Node) -> Option<UseGroup> {
    check_attrs(db, file, node, &["name"]);
    let Some(name) = attr_string(node, "name") else {
        db.report(format!("{}: nameless use-group", file));
        return None;
    };
    Some(UseGroup {
        name,
        file: file.to_string(),
    })
}

//=============================================================================
// Top-level containers
//=============================================================================

fn parse_enum(db: &mut Database, file: &str, node: Node) -> Result<()> {
    check_attrs(
        db,
        file,
        node,
        &["name", "bare", "inline", "prefix", "varset", "variants"],
    );
    let bare = attr_bool(db, file, node, "bare");
    let inline = attr_bool(db, file, node, "inline");
    let varinfo = varinfo_attrs(node);
    let Some(name) = attr_string(node, "name") else {
        db.report(format!("{}: nameless enum", file));
        return Ok(());
    };

    let idx = match db.find_enum(&name) {
        Some(idx) => {
            let en = &db.enums[idx];
            if en.varinfo.prefix_str != varinfo.prefix_str
                || en.varinfo.varset_str != varinfo.varset_str
                || en.varinfo.variants_str != varinfo.variants_str
                || en.inline != inline
                || en.bare != bare
            {
                db.report(format!("{}: merge fail for enum {}", file, name));
            }
            idx
        }
        None => {
            db.enums.push(Enum {
                name: Some(name),
                bare,
                inline,
                varinfo,
                vals: Vec::new(),
                fullname: None,
                prepared: false,
                file: file.to_string(),
            });
            db.enums.len() - 1
        }
    };

    let mut vals = Vec::new();
    for child in node.children().filter(Node::is_element) {
        match tag(child) {
            Some("value") => {
                if let Some(val) = parse_value(db, file, child)? {
                    vals.push(val);
                }
            }
            _ => {
                if !parse_top(db, file, child)? && !is_doc(child) {
                    db.report(format!(
                        "{}: wrong tag in enum: <{}>",
                        file,
                        child.tag_name().name()
                    ));
                }
            }
        }
    }
    db.enums[idx].vals.extend(vals);
    Ok(())
}

fn parse_bitset(db: &mut Database, file: &str, node: Node) -> Result<()> {
    check_attrs(
        db,
        file,
        node,
        &["name", "bare", "inline", "prefix", "varset", "variants"],
    );
    let bare = attr_bool(db, file, node, "bare");
    let inline = attr_bool(db, file, node, "inline");
    let varinfo = varinfo_attrs(node);
    let Some(name) = attr_string(node, "name") else {
        db.report(format!("{}: nameless bitset", file));
        return Ok(());
    };

    let idx = match db.find_bitset(&name) {
        Some(idx) => {
            let bs = &db.bitsets[idx];
            if bs.varinfo.prefix_str != varinfo.prefix_str
                || bs.varinfo.varset_str != varinfo.varset_str
                || bs.varinfo.variants_str != varinfo.variants_str
                || bs.inline != inline
                || bs.bare != bare
            {
                db.report(format!("{}: merge fail for bitset {}", file, name));
            }
            idx
        }
        None => {
            db.bitsets.push(Bitset {
                name: Some(name),
                bare,
                inline,
                varinfo,
                bitfields: Vec::new(),
                fullname: None,
                prepared: false,
                file: file.to_string(),
            });
            db.bitsets.len() - 1
        }
    };

    let mut bitfields = Vec::new();
    for child in node.children().filter(Node::is_element) {
        match tag(child) {
            Some("bitfield") => {
                if let Some(bf) = parse_bitfield(db, file, child)? {
                    bitfields.push(bf);
                }
            }
            _ => {
                if !parse_top(db, file, child)? && !is_doc(child) {
                    db.report(format!(
                        "{}: wrong tag in bitset: <{}>",
                        file,
                        child.tag_name().name()
                    ));
                }
            }
        }
    }
    db.bitsets[idx].bitfields.extend(bitfields);
    Ok(())
}

fn parse_group(db: &mut Database, file: &str, node: Node) -> Result<()> {
    check_attrs(db, file, node, &["name"]);
    let Some(name) = attr_string(node, "name") else {
        db.report(format!("{}: nameless group", file));
        return Ok(());
    };

    let mut elems = Vec::new();
    for child in node.children().filter(Node::is_element) {
        if let Some(elem) = parse_elem(db, file, child)? {
            elems.push(elem);
        }
    }

    match db.groups.iter_mut().find(|g| g.name == name) {
        Some(group) => group.elems.extend(elems),
        None => db.groups.push(Group { name, elems }),
    }
    Ok(())
}

fn parse_domain(db: &mut Database, file: &str, node: Node) -> Result<()> {
    check_attrs(
        db,
        file,
        node,
        &["name", "bare", "size", "width", "prefix", "varset", "variants"],
    );
    let bare = attr_bool(db, file, node, "bare");
    let size = attr_u64(db, file, node, "size").filter(|&s| s != 0);
    let width = match attr_u32(db, file, node, "width") {
        Some(w) if w == 0 || w > 64 => {
            db.report(format!("{}: bad domain width {}", file, w));
            8
        }
        Some(w) => w,
        None => 8,
    };
    let varinfo = varinfo_attrs(node);
    let Some(name) = attr_string(node, "name") else {
        db.report(format!("{}: nameless domain", file));
        return Ok(());
    };

    let idx = match db.find_domain(&name) {
        Some(idx) => {
            let dom = &db.domains[idx];
            let size_conflict = matches!((size, dom.size), (Some(a), Some(b)) if a != b);
            if dom.varinfo.prefix_str != varinfo.prefix_str
                || dom.varinfo.varset_str != varinfo.varset_str
                || dom.varinfo.variants_str != varinfo.variants_str
                || dom.width != width
                || dom.bare != bare
                || size_conflict
            {
                db.report(format!("{}: merge fail for domain {}", file, name));
            }
            if size.is_some() {
                db.domains[idx].size = size;
            }
            idx
        }
        None => {
            db.domains.push(Domain {
                name,
                bare,
                width,
                size,
                varinfo,
                elems: Vec::new(),
                fullname: None,
                file: file.to_string(),
            });
            db.domains.len() - 1
        }
    };

    let mut elems = Vec::new();
    for child in node.children().filter(Node::is_element) {
        if let Some(elem) = parse_elem(db, file, child)? {
            elems.push(elem);
        }
    }
    db.domains[idx].elems.extend(elems);
    Ok(())
}

fn parse_spectype(db: &mut Database, file: &str, node: Node) -> Result<()> {
    check_attrs(db, file, node, &with_type_attrs(&["name"]));
    let name = attr_string(node, "name");

    let mut raw = rawtype_attrs(db, file, node);
    for child in node.children().filter(Node::is_element) {
        match tag(child) {
            Some("value") => {
                if let Some(val) = parse_value(db, file, child)? {
                    raw.vals.push(val);
                }
            }
            Some("bitfield") => {
                if let Some(bf) = parse_bitfield(db, file, child)? {
                    raw.bitfields.push(bf);
                }
            }
            _ => {
                if !parse_top(db, file, child)? && !is_doc(child) {
                    db.report(format!(
                        "{}: wrong tag in spectype: <{}>",
                        file,
                        child.tag_name().name()
                    ));
                }
            }
        }
    }

    let Some(name) = name else {
        db.report(format!("{}: nameless spectype", file));
        return Ok(());
    };
    if db.find_spectype(&name).is_some() {
        db.report(format!("{}: duplicated spectype name {}", file, name));
        return Ok(());
    }
    db.spectypes.push(SpecType {
        name,
        typeinfo: TypeInfo::Raw(raw),
        width: 32,
        file: file.to_string(),
    });
    Ok(())
}

fn parse_author(db: &mut Database, file: &str, node: Node) -> Author {
    check_attrs(db, file, node, &["name", "email"]);
    let mut nicknames = Vec::new();
    for child in node.children().filter(Node::is_element) {
        if tag(child) == Some("nick") {
            check_attrs(db, file, child, &["name"]);
            match attr_string(child, "name") {
                Some(nick) => nicknames.push(nick),
                None => db.report(format!(
                    "{}: missing \"name\" attribute for nick",
                    file
                )),
            }
        } else {
            db.report(format!(
                "{}: wrong tag in author: <{}>",
                file,
                child.tag_name().name()
            ));
        }
    }
    Author {
        name: attr_string(node, "name"),
        email: attr_string(node, "email"),
        contributions: node
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string),
        nicknames,
    }
}

fn parse_copyright(db: &mut Database, file: &str, node: Node) -> Result<()> {
    check_attrs(db, file, node, &["year"]);
    if let Some(year) = attr_u32(db, file, node, "year") {
        if db.copyright.firstyear.map_or(true, |fy| year < fy) {
            db.copyright.firstyear = Some(year);
        }
    }

    for child in node.children().filter(Node::is_element) {
        match tag(child) {
            Some("license") => {
                let text = child.text().map(str::trim).unwrap_or("").to_string();
                match &db.copyright.license {
                    Some(existing) if *existing != text => {
                        bail!("fatal error: multiple different licenses specified!");
                    }
                    _ => db.copyright.license = Some(text),
                }
            }
            Some("author") => {
                let author = parse_author(db, file, child);
                db.copyright.authors.push(author);
            }
            _ => {
                db.report(format!(
                    "{}: wrong tag in copyright: <{}>",
                    file,
                    child.tag_name().name()
                ));
            }
        }
    }
    Ok(())
}

fn parse_import(db: &mut Database, file: &str, node: Node) -> Result<()> {
    check_attrs(db, file, node, &["file"]);
    match attr_string(node, "file") {
        Some(subfile) => parse_file(db, &subfile),
        None => {
            db.report(format!(
                "{}: missing \"file\" attribute for import",
                file
            ));
            Ok(())
        }
    }
}
