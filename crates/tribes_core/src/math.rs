//! Fixed-point math utilities.
//!
//! Ratios that drive gameplay decisions (combat loss ratios, AI scoring)
//! are expressed in fixed-point so that the same inputs always compare the
//! same way, independent of floating-point rounding.

use fixed::types::I32F32;

/// Fixed-point number type for simulation ratios.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// √3 in fixed-point, used by the hex pixel projection.
pub const SQRT_3: Fixed = Fixed::from_bits(7_439_101_574);

/// √3 / 3 in fixed-point, used by the inverse hex pixel projection.
pub const SQRT_3_OVER_3: Fixed = Fixed::from_bits(2_479_700_525);

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// `numerator / denominator` as a fixed-point ratio.
///
/// Computed in 128-bit integer space so that large combat powers cannot
/// overflow. A zero denominator yields [`Fixed::MAX`] unless the numerator is
/// also zero, in which case the ratio is zero.
#[must_use]
pub fn ratio(numerator: u64, denominator: u64) -> Fixed {
    if denominator == 0 {
        return if numerator == 0 { Fixed::ZERO } else { Fixed::MAX };
    }
    let bits = (u128::from(numerator) << 32) / u128::from(denominator);
    Fixed::from_bits(i64::try_from(bits).unwrap_or(i64::MAX))
}

/// `value * numerator / denominator`, rounded half up.
///
/// Returns zero when the denominator is zero.
#[must_use]
pub fn mul_div_round(value: u64, numerator: u64, denominator: u64) -> u64 {
    if denominator == 0 {
        return 0;
    }
    let scaled = u128::from(value) * u128::from(numerator) * 2 + u128::from(denominator);
    let rounded = scaled / (u128::from(denominator) * 2);
    u64::try_from(rounded).unwrap_or(u64::MAX)
}

/// FNV-1a 64-bit offset basis.
pub const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a hash.
///
/// Stable across runs and platforms; used for seed strings and snapshot hashes.
#[must_use]
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    fnv1a_64_extend(FNV_OFFSET_BASIS, bytes)
}

/// Continue an FNV-1a hash with more bytes.
#[must_use]
pub fn fnv1a_64_extend(hash: u64, bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(hash, |h, &byte| (h ^ u64::from(byte)).wrapping_mul(FNV_PRIME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_basic() {
        assert_eq!(ratio(1, 4), Fixed::from_num(0.25));
        assert_eq!(ratio(3, 4), Fixed::from_num(0.75));
        assert_eq!(ratio(6, 3), Fixed::from_num(2));
    }

    #[test]
    fn test_ratio_zero_denominator() {
        assert_eq!(ratio(0, 0), Fixed::ZERO);
        assert_eq!(ratio(5, 0), Fixed::MAX);
    }

    #[test]
    fn test_ratio_large_values() {
        let r = ratio(u64::MAX / 2, u64::MAX);
        assert!(r > Fixed::from_num(0.49) && r < Fixed::from_num(0.51));
    }

    #[test]
    fn test_mul_div_round_half_up() {
        assert_eq!(mul_div_round(10, 1, 4), 3); // 2.5 -> 3
        assert_eq!(mul_div_round(10, 3, 4), 8); // 7.5 -> 8
        assert_eq!(mul_div_round(9, 1, 4), 2); // 2.25 -> 2
        assert_eq!(mul_div_round(9, 0, 0), 0);
    }

    #[test]
    fn test_fnv1a_known_vectors() {
        assert_eq!(fnv1a_64(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a_64(b"a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn test_fnv1a_streaming_matches_one_shot() {
        let streamed = fnv1a_64_extend(fnv1a_64(b"hello "), b"world");
        assert_eq!(streamed, fnv1a_64(b"hello world"));
    }

    #[test]
    fn test_sqrt3_constants() {
        let product = SQRT_3 * SQRT_3;
        assert!((product - Fixed::from_num(3)).abs() < Fixed::from_num(0.0001));
        let third = SQRT_3_OVER_3 * Fixed::from_num(3);
        assert!((third - SQRT_3).abs() < Fixed::from_num(0.0001));
    }
}
