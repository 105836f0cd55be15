// Licensed under the Apache-2.0 license

//! Name concatenation and permissive integer parsing.

/// Join an optional prefix and a name with `_`.
pub fn catstr(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        None => name.to_string(),
        Some(p) => format!("{}_{}", p, name),
    }
}

/// Parse an unsigned integer in any of the bases the database format uses:
/// decimal, `0x` hexadecimal, `0o` octal or `0b` binary.
pub fn parse_uint(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if let Some(oct) = s.strip_prefix("0o").or_else(|| s.strip_prefix("0O")) {
        u64::from_str_radix(oct, 8).ok()
    } else if let Some(bin) = s.strip_prefix("0b").or_else(|| s.strip_prefix("0B")) {
        u64::from_str_radix(bin, 2).ok()
    } else {
        s.parse().ok()
    }
}

/// Signed counterpart of [`parse_uint`]; accepts an optional leading sign.
pub fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Some(rest) = s.strip_prefix('-') {
        parse_uint(rest).and_then(|v| i64::try_from(v).ok()).map(|v| -v)
    } else {
        let rest = s.strip_prefix('+').unwrap_or(s);
        parse_uint(rest).and_then(|v| i64::try_from(v).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catstr() {
        assert_eq!(catstr(None, "REG"), "REG");
        assert_eq!(catstr(Some("NV50"), "REG"), "NV50_REG");
    }

    #[test]
    fn test_parse_uint_bases() {
        assert_eq!(parse_uint("42"), Some(42));
        assert_eq!(parse_uint("0x2a"), Some(42));
        assert_eq!(parse_uint("0X2A"), Some(42));
        assert_eq!(parse_uint("0o52"), Some(42));
        assert_eq!(parse_uint("0b101010"), Some(42));
        assert_eq!(parse_uint("0"), Some(0));
        assert_eq!(parse_uint("bogus"), None);
        assert_eq!(parse_uint(""), None);
    }

    #[test]
    fn test_parse_int_sign() {
        assert_eq!(parse_int("-4"), Some(-4));
        assert_eq!(parse_int("+4"), Some(4));
        assert_eq!(parse_int("-0x10"), Some(-16));
    }
}
