//! Windowing functions applied in place before an FFT (spec.md §4.2, §8).

use meas_kernel::Scalar;

use crate::R;

/// Window shape; endpoint values are exact per spec.md §8 (`w[0] ==
/// w[N-1] == 0` for Hann/Blackman, `0.08` for Hamming).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Rect,
    Hann,
    Hamming,
    Blackman,
}

/// Multiply `buf[i]` by `w(i, buf.len())` in place.
pub fn apply_window(buf: &mut [R], kind: WindowKind) {
    let n = buf.len();
    if n < 2 || kind == WindowKind::Rect {
        return;
    }
    for (i, sample) in buf.iter_mut().enumerate() {
        *sample = *sample * window_value(kind, i, n);
    }
}

fn window_value(kind: WindowKind, i: usize, n: usize) -> R {
    let n_minus_1 = R::from_f32((n - 1) as f32);
    let phase = R::from_f32(i as f32) / n_minus_1;
    let two_pi_phase = phase * R::TWO_PI;
    let (_, cos1) = two_pi_phase.sincos();

    match kind {
        WindowKind::Rect => R::ONE,
        WindowKind::Hann => {
            let half = R::from_f32(0.5);
            half * (R::ONE - cos1)
        }
        WindowKind::Hamming => {
            let a0 = R::from_f32(0.54);
            let a1 = R::from_f32(0.46);
            a0 - a1 * cos1
        }
        WindowKind::Blackman => {
            let (_, cos2) = (two_pi_phase + two_pi_phase).sincos();
            let a0 = R::from_f32(0.42);
            let a1 = R::from_f32(0.5);
            let a2 = R::from_f32(0.08);
            a0 - a1 * cos1 + a2 * cos2
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hann_endpoints_are_exactly_zero() {
        let mut buf = [R::ONE; 8];
        apply_window(&mut buf, WindowKind::Hann);
        assert!(buf[0].fabs() < R::from_f32(1e-5));
        assert!(buf[7].fabs() < R::from_f32(1e-5));
    }

    #[test]
    fn blackman_endpoints_are_exactly_zero() {
        let mut buf = [R::ONE; 8];
        apply_window(&mut buf, WindowKind::Blackman);
        assert!(buf[0].fabs() < R::from_f32(1e-5));
        assert!(buf[7].fabs() < R::from_f32(1e-5));
    }

    #[test]
    fn hamming_endpoints_are_0_08() {
        let mut buf = [R::ONE; 8];
        apply_window(&mut buf, WindowKind::Hamming);
        assert!((buf[0] - R::from_f32(0.08)).fabs() < R::from_f32(1e-5));
        assert!((buf[7] - R::from_f32(0.08)).fabs() < R::from_f32(1e-5));
    }

    #[test]
    fn rect_is_identity() {
        let mut buf = [R::from_f32(3.0); 4];
        apply_window(&mut buf, WindowKind::Rect);
        assert_eq!(buf, [R::from_f32(3.0); 4]);
    }
}
