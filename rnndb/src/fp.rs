// Licensed under the Apache-2.0 license

//! Raw bit pattern to IEEE-754 floating point conversions.
//!
//! All three conversions are total: any bit pattern, including NaN and
//! infinity encodings, is a legal input.

/// Reinterpret a 32-bit pattern as an IEEE-754 binary32 value.
pub fn float32(bits: u32) -> f32 {
    f32::from_bits(bits)
}

/// Reinterpret a 64-bit pattern as an IEEE-754 binary64 value.
pub fn float64(bits: u64) -> f64 {
    f64::from_bits(bits)
}

/// Promote a 16-bit IEEE-754 binary16 pattern to binary32.
///
/// See <https://en.wikipedia.org/wiki/Half-precision_floating-point_format>.
pub fn float16(bits: u16) -> f32 {
    f32::from_bits(float16_bits(bits))
}

fn float16_bits(val: u16) -> u32 {
    let val = u32::from(val);
    let sign = (val & 0x8000) << 16;
    let mut frac = val & 0x3ff;
    let mut expn = ((val >> 10) & 0x1f) as i32;

    if expn == 0 {
        if frac == 0 {
            // +/- zero
            return sign;
        }
        // Subnormal: renormalize until the leading fraction bit sits at the
        // implicit-one position, compensating in the exponent.
        let shift = 11 - (32 - frac.leading_zeros()) as i32;
        frac = (frac << shift) & 0x3ff;
        expn = 1 - shift;
    } else if expn == 0x1f {
        // Inf/NaN: widen the fraction field unchanged.
        return sign | 0x7f80_0000 | (frac << 13);
    }

    sign | (((expn + 127 - 15) as u32) << 23) | (frac << 13)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float16_basics() {
        assert_eq!(float16(0x3c00), 1.0);
        assert_eq!(float16(0x0000), 0.0);
        assert_eq!(float16(0xc000), -2.0);
        assert_eq!(float16(0x7c00), f32::INFINITY);
        assert_eq!(float16(0xfc00), f32::NEG_INFINITY);
        assert!(float16(0x7e00).is_nan());
    }

    #[test]
    fn test_float16_signed_zero() {
        let neg_zero = float16(0x8000);
        assert_eq!(neg_zero, 0.0);
        assert!(neg_zero.is_sign_negative());
    }

    #[test]
    fn test_float16_subnormal() {
        // Smallest positive subnormal: 2^-24.
        assert_eq!(float16(0x0001), 2.0f32.powi(-24));
        // Largest subnormal: (1023/1024) * 2^-14.
        assert_eq!(float16(0x03ff), 1023.0 / 1024.0 * 2.0f32.powi(-14));
    }

    #[test]
    fn test_float32_pi() {
        assert_eq!(float32(0x4049_0fdb), std::f32::consts::PI);
    }

    #[test]
    fn test_float64() {
        assert_eq!(float64(0x3ff0_0000_0000_0000), 1.0);
        assert_eq!(float64(0x7ff0_0000_0000_0000), f64::INFINITY);
        assert!(float64(0x7ff8_0000_0000_0000).is_nan());
    }
}
