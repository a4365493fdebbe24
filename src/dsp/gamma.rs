//! Reflection/transmission coefficient computation from DDC accumulators
//! (spec.md §4.2).

use meas_kernel::Complex;

use super::ddc::DdcAccumulators;
use crate::R;

/// Division guard threshold for `|Ref|^2` (spec.md §4.2, §4.6).
pub const EPS: R = eps_value();

#[cfg(all(feature = "float32", not(feature = "float64"), not(feature = "fixed-point")))]
const fn eps_value() -> R {
    1e-9
}

#[cfg(all(feature = "float64", not(feature = "fixed-point")))]
const fn eps_value() -> R {
    1e-9
}

#[cfg(feature = "fixed-point")]
const fn eps_value() -> R {
    // Q16.16 has ~1.5e-5 resolution; 1e-9 underflows to zero, which would
    // make the guard always trip. Use the smallest representable step.
    R::from_bits(1)
}

/// `Gamma = Sample / Reference`, computed from accumulated I/Q sums.
///
/// Returns `(0, 0)` when `|Reference|^2 < EPS`, matching the calibration
/// node's division guard (spec.md §4.6) rather than dividing by a value
/// indistinguishable from the accumulator's noise floor.
pub fn gamma(acc: &DdcAccumulators) -> Complex<R> {
    let sample = Complex::new(acc_to_r(acc.acc_i), acc_to_r(acc.acc_q));
    let reference = Complex::new(acc_to_r(acc.ref_i), acc_to_r(acc.ref_q));
    sample.checked_div(reference, EPS)
}

fn acc_to_r(acc: i64) -> R {
    R::from_f32(acc as f32)
}

/// Compensate electrical delay `tau_s` at frequency `freq_hz` by
/// multiplying `gamma` by `exp(-j*2*pi*freq_hz*tau_s)`, in place.
pub fn rotate_for_delay(gamma: Complex<R>, freq_hz: R, tau_s: R) -> Complex<R> {
    let angle = -(R::TWO_PI * freq_hz * tau_s);
    gamma.rotate(angle)
}

#[cfg(test)]
mod rotate_tests {
    use super::*;
    use meas_kernel::Scalar;

    #[test]
    fn zero_delay_is_identity() {
        let g = Complex::new(R::from_f32(0.5), R::from_f32(-0.25));
        let rotated = rotate_for_delay(g, R::from_f32(1e9), R::ZERO);
        assert!((rotated.re - g.re).fabs() < R::from_f32(1e-4));
        assert!((rotated.im - g.im).fabs() < R::from_f32(1e-4));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meas_kernel::Scalar;

    #[test]
    fn unity_gamma_when_sample_equals_reference() {
        let acc = DdcAccumulators {
            acc_i: 1000,
            acc_q: 0,
            ref_i: 1000,
            ref_q: 0,
        };
        let g = gamma(&acc);
        assert!((g.re - R::ONE).fabs() < R::from_f32(1e-3));
        assert!(g.im.fabs() < R::from_f32(1e-3));
    }

    #[test]
    fn near_zero_reference_guards_to_zero() {
        let acc = DdcAccumulators {
            acc_i: 1000,
            acc_q: 0,
            ref_i: 0,
            ref_q: 0,
        };
        let g = gamma(&acc);
        assert_eq!(g.re, R::ZERO);
        assert_eq!(g.im, R::ZERO);
    }
}
