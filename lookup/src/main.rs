// Licensed under the Apache-2.0 license

//! Command-line register database lookup.
//!
//! Loads an XML database (searched through `RNN_PATH`), decodes the given
//! address against a domain and, when a value is supplied, renders the value
//! through the matched register's type. `-e`/`-b` decode the address operand
//! directly as an enum value or bitset word instead.

use anyhow::{bail, Result};
use clap::{ArgAction, ArgGroup, Parser};
use log::LevelFilter;
use simple_logger::SimpleLogger;

use rnndb::{parse_file, Context, Database, TypeInfo, NULL, TERM};

fn num(s: &str) -> Result<u64, String> {
    rnndb::util::parse_uint(s).ok_or_else(|| format!("invalid number: {}", s))
}

#[derive(Parser, Debug)]
#[command(
    name = "rnndb-lookup",
    author,
    version,
    about = "Register database lookup",
    group(ArgGroup::new("select").args(["domain", "enum_name", "bitset"]))
)]
struct Cli {
    /// Database file to load
    #[arg(short, long, default_value = "root.xml")]
    file: String,

    /// Chipset variant, shorthand for `-v chipset <CHIPSET>`
    #[arg(short = 'a', long)]
    chipset: Option<String>,

    /// Disable colored output
    #[arg(short = 'c', long)]
    nocolor: bool,

    /// Domain to look the address up in
    #[arg(short, long, default_value = "NV_MMIO")]
    domain: String,

    /// Decode the address operand as a value of this enum
    #[arg(short = 'e', long = "enum")]
    enum_name: Option<String>,

    /// Decode the address operand as a word of this bitset
    #[arg(short = 'b', long)]
    bitset: Option<String>,

    /// Look the address up as a write rather than a read
    #[arg(short, long)]
    write: bool,

    /// Select a variant of a variant axis (repeatable)
    #[arg(
        short = 'v',
        long = "variant",
        num_args = 2,
        value_names = ["VARSET", "VARIANT"],
        action = ArgAction::Append
    )]
    variant: Vec<String>,

    /// Address (or raw value, with -e/-b) to look up
    #[arg(value_parser = num)]
    address: u64,

    /// Value to decode through the matched register's type
    #[arg(value_parser = num)]
    value: Option<u64>,
}

fn main() -> Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Warn)
        .env()
        .init()?;
    let cli = Cli::parse();

    let mut db = Database::new();
    parse_file(&mut db, &cli.file)?;
    db.prepare();

    let colors = if cli.nocolor { &NULL } else { &TERM };
    let mut ctx = Context::new(&db, colors);
    if let Some(chipset) = &cli.chipset {
        ctx.add_variant("chipset", chipset)?;
    }
    for pair in cli.variant.chunks_exact(2) {
        ctx.add_variant(&pair[0], &pair[1])?;
    }

    if let Some(name) = &cli.enum_name {
        let Some(idx) = db.find_enum(name) else {
            bail!("Not an enum: '{}'", name);
        };
        println!("{}", ctx.decode_val(&TypeInfo::Enum(idx), cli.address, 0));
    } else if let Some(name) = &cli.bitset {
        let Some(idx) = db.find_bitset(name) else {
            bail!("Not a bitset: '{}'", name);
        };
        println!("{}", ctx.decode_val(&TypeInfo::Bitset(idx), cli.address, 0));
    } else {
        let Some(idx) = db.find_domain(&cli.domain) else {
            bail!("Not a domain: '{}'", cli.domain);
        };
        let info = ctx.decode_addr(&db.domains[idx], cli.address, cli.write);
        match (info.typeinfo, cli.value, info.width) {
            (Some(ti), Some(value), Some(width)) => {
                println!("{} => {}", info.name, ctx.decode_val(ti, value, width));
            }
            _ => println!("{}", info.name),
        }
    }
    Ok(())
}
