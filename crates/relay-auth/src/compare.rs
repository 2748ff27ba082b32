//! Constant-time comparison.

use subtle::ConstantTimeEq;

/// Compares two byte strings without branching on the position of the
/// first difference. Slices of different length compare unequal.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
