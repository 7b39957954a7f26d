//! Conversion between metres (the unit callers speak) and integer millimetres
//! (the unit the enumerator and the ILP model work in).
//!
//! Keeping every length integral inside the engine means "does this fit" is an
//! exact comparison, never a float tolerance question.

/// Millimetres per metre.
pub const MM_PER_M: f64 = 1000.0;

/// Converts metres to whole millimetres, rounding half up.
///
/// Inputs are expected to be validated (finite, non-negative) before they reach
/// the engine; out-of-range values saturate at the bounds of `u32`.
pub fn to_mm(length_m: f64) -> u32 {
    (length_m * MM_PER_M + 0.5).floor() as u32
}

/// Converts millimetres back to metres without rounding.
pub fn to_m(length_mm: u32) -> f64 {
    length_mm as f64 / MM_PER_M
}

/// Same as [`to_m`] for the wider totals produced when summing many bars.
pub fn to_m_u64(length_mm: u64) -> f64 {
    length_mm as f64 / MM_PER_M
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rounds_to_nearest_mm() {
        assert_eq!(to_mm(2.095), 2095);
        assert_eq!(to_mm(1.695), 1695);
        assert_eq!(to_mm(12.0), 12000);
        assert_eq!(to_mm(0.0004), 0);
        assert_eq!(to_mm(0.0006), 1);
        assert_eq!(to_mm(10.5), 10500);
    }

    #[test]
    fn test_back_to_metres() {
        assert_eq!(to_m(2095), 2.095);
        assert_eq!(to_m(0), 0.0);
        assert_eq!(to_m_u64(57_000), 57.0);
    }

    proptest! {
        #[test]
        fn round_trip_within_half_mm(length_m in 0.0f64..100.0) {
            let back = to_m(to_mm(length_m));
            prop_assert!((back - length_m).abs() <= 0.0005 + 1e-12);
        }
    }
}
