//! Boxcar decimation: average non-overlapping windows of `factor` samples
//! (spec.md §4.2).

use meas_kernel::Scalar;

use crate::types::Status;
use crate::R;

/// Average `input` in non-overlapping windows of `factor` samples into
/// `output`. Output length is `input.len() / factor` (integer division);
/// trailing samples that don't fill a whole window are dropped. Returns
/// `Status::Error` (without writing to `output`) if `factor == 0` or
/// `output` is smaller than the required length.
pub fn decimate(input: &[R], factor: usize, output: &mut [R]) -> Result<usize, Status> {
    if factor == 0 {
        return Err(Status::Error);
    }
    let out_len = input.len() / factor;
    if output.len() < out_len {
        return Err(Status::Error);
    }
    let inv_factor = R::ONE / R::from_f32(factor as f32);
    for (i, window) in input.chunks_exact(factor).take(out_len).enumerate() {
        let mut sum = R::ZERO;
        for &s in window {
            sum = sum + s;
        }
        output[i] = sum * inv_factor;
    }
    Ok(out_len)
}
