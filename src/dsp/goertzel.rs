//! Single-bin DFT via the Goertzel recurrence, used when only one
//! frequency component is of interest (spec.md §4.2).

use meas_kernel::{Complex, Scalar};

use crate::R;

/// Magnitude (and, via [`goertzel_complex`], phase) of `samples` at
/// `target_hz` given a sample rate of `fs_hz`, using the second-order
/// Goertzel recurrence rather than a full FFT.
pub fn goertzel_magnitude(samples: &[R], target_hz: R, fs_hz: R) -> R {
    goertzel_complex(samples, target_hz, fs_hz).magnitude()
}

/// Full complex Goertzel result; `argument()` on the result gives phase.
pub fn goertzel_complex(samples: &[R], target_hz: R, fs_hz: R) -> Complex<R> {
    let n = R::from_f32(samples.len() as f32);
    let k = libm::roundf((target_hz * n / fs_hz).to_f32());
    let omega = R::TWO_PI * R::from_f32(k) / n;
    let (sin_omega, cos_omega) = omega.sincos();
    let coeff = R::from_f32(2.0) * cos_omega;

    let mut s_prev = R::ZERO;
    let mut s_prev2 = R::ZERO;
    for &sample in samples {
        let s = sample + coeff * s_prev - s_prev2;
        s_prev2 = s_prev;
        s_prev = s;
    }

    let re = s_prev - s_prev2 * cos_omega;
    let im = s_prev2 * sin_omega;
    Complex::new(re, im)
}
