// Licensed under the Apache-2.0 license

//! Register database model and decoder for rnndb-style XML descriptions.
//!
//! This crate parses the XML register-description format used to document
//! reverse-engineered GPU MMIO spaces into a typed schema (domains, registers,
//! stripes and arrays, bitfields, enums, bitsets, variant conditioning), and
//! decodes raw addresses and values against that schema into human-readable
//! text.
//!
//! ## Usage
//!
//! ```no_run
//! use rnndb::{colors, decode::Context, parse, schema::Database};
//!
//! let mut db = Database::new();
//! parse::parse_file(&mut db, "root.xml").unwrap();
//! db.prepare();
//!
//! let mut ctx = Context::new(&db, &colors::TERM);
//! ctx.add_variant("chipset", "NV50").unwrap();
//!
//! let dom = &db.domains[db.find_domain("NV_MMIO").unwrap()];
//! let info = ctx.decode_addr(dom, 0x1400, false);
//! println!("{}", info.name);
//! ```
//!
//! ## Module Organization
//!
//! - [`schema`]: In-memory representation of a parsed database
//! - [`parse`]: XML loader with search-path and import resolution
//! - [`decode`]: Address/value decoder driven by active chip variants
//! - [`fp`]: Raw bit pattern to IEEE-754 float conversions
//! - [`colors`]: ANSI coloring policy applied to decoder output
//! - [`util`]: Name concatenation and permissive integer parsing
//!
//! Loading is deliberately permissive: malformed or unknown constructs are
//! reported through [`log::warn!`] and set the sticky [`Database::errors`]
//! flag, but never abort the load. The only fatal load-time condition is
//! conflicting license text across `<copyright>` declarations.

pub mod colors;
pub mod decode;
pub mod fp;
pub mod parse;
pub mod schema;
pub mod util;

mod prep;

// Re-export the main public API.
pub use colors::{Chan, ColorScheme, NULL, TERM};
pub use decode::{AddrInfo, Context};
pub use parse::{database_path, parse_document, parse_file, DEFAULT_PATH};
pub use schema::{Database, TypeInfo};
