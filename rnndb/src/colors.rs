// Licensed under the Apache-2.0 license

//! Coloring policy for decoder output.
//!
//! Each rendered fragment is tagged with a [`Chan`] naming its role; a
//! [`ColorScheme`] maps channels to ANSI escape pairs. Coloring is purely a
//! presentation side channel and has no effect on matching or decoding.

/// Output channel of a rendered text fragment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Chan {
    /// Register / field names.
    Rname = 0,
    /// Boolean flags shown bare inside a bitset.
    Mod = 1,
    /// Numbers.
    Num = 2,
    /// Evaluated literals (TRUE/FALSE).
    Eval = 3,
    /// Fallback hex for anything the schema does not account for.
    Err = 4,
    /// Enum value names.
    Val = 5,
}

type Pair = Option<(&'static str, &'static str)>;

/// A channel-to-escape-pair mapping; unmapped channels render undecorated.
pub struct ColorScheme {
    pairs: [Pair; 6],
}

impl ColorScheme {
    /// Wrap `text` in the escapes configured for `chan`, if any.
    pub fn paint(&self, chan: Chan, text: &str) -> String {
        match self.pairs[chan as usize] {
            None => text.to_string(),
            Some((start, end)) => format!("{}{}{}", start, text, end),
        }
    }
}

const RESET: &str = "\x1b[0m";

/// No decoration at all.
pub const NULL: ColorScheme = ColorScheme { pairs: [None; 6] };

/// ANSI terminal colors.
pub const TERM: ColorScheme = ColorScheme {
    pairs: [
        Some(("\x1b[0;32m", RESET)), // rname
        Some(("\x1b[0;36m", RESET)), // mod
        Some(("\x1b[0;33m", RESET)), // num
        Some(("\x1b[0;35m", RESET)), // eval
        Some(("\x1b[0;1;31m", RESET)), // err
        None,                        // val
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_scheme_is_plain() {
        assert_eq!(NULL.paint(Chan::Err, "0xdead"), "0xdead");
    }

    #[test]
    fn test_term_scheme_wraps() {
        assert_eq!(TERM.paint(Chan::Num, "42"), "\x1b[0;33m42\x1b[0m");
        // Enum value names are deliberately unmapped.
        assert_eq!(TERM.paint(Chan::Val, "ON"), "ON");
    }
}
