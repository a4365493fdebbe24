//! Power-of-two Cooley-Tukey FFT: in-place bit-reversal permutation
//! followed by decimation-in-time butterflies (spec.md §4.2, §8).

use meas_kernel::{Complex, Scalar};

use crate::types::Status;
use crate::R;

/// A prepared context for a fixed transform length and direction.
///
/// `twiddles` holds `length / 2` precomputed roots of unity
/// `exp(-j*2*pi*k/length)` (forward) or their conjugates (inverse); `exec`
/// steps through them rather than calling `sincos` per butterfly.
pub struct FftContext<const MAX_LEN: usize> {
    length: usize,
    inverse: bool,
    twiddles: [Complex<R>; MAX_LEN],
}

impl<const MAX_LEN: usize> FftContext<MAX_LEN> {
    /// `length` must be a power of two and `<= MAX_LEN`; otherwise returns
    /// `Status::Error` and leaves `self` unspecified-but-safe (all-zero).
    pub fn init(length: usize, inverse: bool) -> Result<Self, Status> {
        if length == 0 || length > MAX_LEN || !length.is_power_of_two() {
            return Err(Status::Error);
        }
        let mut twiddles = [Complex::zero(); MAX_LEN];
        let sign = if inverse { R::ONE } else { -R::ONE };
        let half = length / 2;
        for (k, slot) in twiddles.iter_mut().take(half.max(1)).enumerate() {
            let angle = sign * R::TWO_PI * R::from_f32(k as f32) / R::from_f32(length as f32);
            let (s, c) = angle.sincos();
            *slot = Complex::new(c, s);
        }
        Ok(Self {
            length,
            inverse,
            twiddles,
        })
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Compute the forward or inverse DFT of `input` into `output`, which
    /// must be disjoint from `input` and the same length. To transform a
    /// buffer in place (the "inputs and outputs may alias" case spec.md
    /// describes), call [`FftContext::exec_in_place`] on a single buffer
    /// instead — Rust's aliasing rules don't allow a shared and an
    /// exclusive borrow of the same memory to coexist, so the alias case
    /// is expressed as "don't copy", not as two overlapping references.
    pub fn exec(&self, input: &[Complex<R>], output: &mut [Complex<R>]) -> Status {
        if input.len() != self.length || output.len() != self.length {
            return Status::Error;
        }
        output.copy_from_slice(input);
        self.exec_in_place(output)
    }

    /// Transform `buf` in place: bit-reversal permutation followed by
    /// decimation-in-time butterflies.
    pub fn exec_in_place(&self, output: &mut [Complex<R>]) -> Status {
        if output.len() != self.length {
            return Status::Error;
        }

        bit_reverse_permute(output);

        let n = self.length;
        let mut size = 2;
        while size <= n {
            let half = size / 2;
            let stride = n / size;
            for block_start in (0..n).step_by(size) {
                for k in 0..half {
                    let twiddle = self.twiddles[k * stride];
                    let even_idx = block_start + k;
                    let odd_idx = even_idx + half;
                    let odd = output[odd_idx] * twiddle;
                    let even = output[even_idx];
                    output[even_idx] = even + odd;
                    output[odd_idx] = even - odd;
                }
            }
            size *= 2;
        }

        if self.inverse {
            let scale = R::ONE / R::from_f32(n as f32);
            for sample in output.iter_mut() {
                *sample = *sample * scale;
            }
        }

        Status::Ok
    }
}

fn bit_reverse_permute(buf: &mut [Complex<R>]) {
    let n = buf.len();
    let bits = n.trailing_zeros();
    for i in 0..n {
        let j = i.reverse_bits() >> (usize::BITS - bits);
        if j > i {
            buf.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meas_kernel::Complex;

    fn round_trip<const N: usize>(input: [Complex<R>; N]) -> [Complex<R>; N] {
        let fwd: FftContext<N> = FftContext::init(N, false).unwrap();
        let inv: FftContext<N> = FftContext::init(N, true).unwrap();
        let mut freq = input;
        fwd.exec(&input, &mut freq);
        let mut back = freq;
        inv.exec(&freq, &mut back);
        back
    }

    #[test]
    fn rejects_non_power_of_two_length() {
        let ctx: Result<FftContext<16>, Status> = FftContext::init(6, false);
        assert!(ctx.is_err());
    }

    #[test]
    fn impulse_yields_flat_spectrum() {
        let mut input = [Complex::zero(); 8];
        input[0] = Complex::new(R::ONE, R::ZERO);
        let ctx: FftContext<8> = FftContext::init(8, false).unwrap();
        let mut output = [Complex::zero(); 8];
        ctx.exec(&input, &mut output).is_ok();
        for bin in output.iter() {
            assert!((bin.re - R::ONE).fabs() < R::from_f32(1e-3));
            assert!(bin.im.fabs() < R::from_f32(1e-3));
        }
    }

    #[test]
    fn dc_input_concentrates_in_bin_zero() {
        let input = [Complex::new(R::ONE, R::ZERO); 8];
        let ctx: FftContext<8> = FftContext::init(8, false).unwrap();
        let mut output = [Complex::zero(); 8];
        ctx.exec(&input, &mut output).is_ok();
        assert!((output[0].re - R::from_f32(8.0)).fabs() < R::from_f32(1e-3));
        for bin in output.iter().skip(1) {
            assert!(bin.magnitude().fabs() < R::from_f32(1e-3));
        }
    }

    #[test]
    fn forward_then_inverse_recovers_input() {
        let mut input = [Complex::zero(); 8];
        for (i, slot) in input.iter_mut().enumerate() {
            *slot = Complex::new(R::from_f32((i as f32) * 0.1 - 0.35), R::ZERO);
        }
        let back = round_trip(input);
        for (a, b) in input.iter().zip(back.iter()) {
            assert!((a.re - b.re).fabs() < R::from_f32(1e-3));
            assert!((a.im - b.im).fabs() < R::from_f32(1e-3));
        }
    }

    #[test]
    fn exec_in_place_matches_exec() {
        let mut buf = [Complex::zero(); 4];
        buf[0] = Complex::new(R::ONE, R::ZERO);
        let ctx: FftContext<4> = FftContext::init(4, false).unwrap();

        let mut via_exec = [Complex::zero(); 4];
        ctx.exec(&buf, &mut via_exec);
        ctx.exec_in_place(&mut buf);

        for (a, b) in buf.iter().zip(via_exec.iter()) {
            assert!((a.re - b.re).fabs() < R::from_f32(1e-6));
            assert!((a.im - b.im).fabs() < R::from_f32(1e-6));
        }
    }
}
