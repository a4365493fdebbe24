//! Digital down-conversion: mixing a packed (reference, sample) stream
//! against the shared sine/cosine table (spec.md §3, §4.2).

use super::{cosine_lookup, sine_table, SINE_TABLE_LEN};
use crate::types::Status;

/// `{acc_i, acc_q, ref_i, ref_q}` — sums of `sample*cos`, `sample*sin`,
/// `ref*cos`, `ref*sin` across a block (spec.md §3).
///
/// This is both the accumulator `mix_down` writes into and the "DDC-accum
/// struct" the node catalog lists as the DDC node's output: the SParam
/// node reads it directly rather than through a generic slice.
#[derive(Debug, Clone, Copy, Default)]
pub struct DdcAccumulators {
    pub acc_i: i64,
    pub acc_q: i64,
    pub ref_i: i64,
    pub ref_q: i64,
}

impl DdcAccumulators {
    pub const fn zero() -> Self {
        Self {
            acc_i: 0,
            acc_q: 0,
            ref_i: 0,
            ref_q: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::zero();
    }
}

/// Mix `input` (interleaved `(reference, sample)` i16 pairs) against one
/// cycle of the shared sine table, accumulating into `acc`.
///
/// `phase_index` is the table index corresponding to the first pair in
/// `input`; it advances by `phase_step` per pair and wraps modulo the
/// table length, letting a caller mix a local-oscillator frequency that
/// isn't an exact submultiple of the sample rate across successive calls
/// without losing phase continuity. `Status::Error` on an odd-length
/// input (not a whole number of pairs), leaving `acc` untouched.
pub fn mix_down(
    input: &[i16],
    acc: &mut DdcAccumulators,
    phase_index: &mut usize,
    phase_step: usize,
) -> Status {
    if input.len() % 2 != 0 {
        return Status::Error;
    }
    let table = sine_table();
    for pair in input.chunks_exact(2) {
        let reference = pair[0] as i64;
        let sample = pair[1] as i64;
        let sin = table[*phase_index] as i64;
        let cos = cosine_lookup(table, *phase_index) as i64;

        acc.acc_i = acc.acc_i.saturating_add(sample.saturating_mul(cos));
        acc.acc_q = acc.acc_q.saturating_add(sample.saturating_mul(sin));
        acc.ref_i = acc.ref_i.saturating_add(reference.saturating_mul(cos));
        acc.ref_q = acc.ref_q.saturating_add(reference.saturating_mul(sin));

        *phase_index = (*phase_index + phase_step) % SINE_TABLE_LEN;
    }
    Status::Ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_odd_length_input_without_mutating_acc() {
        let mut acc = DdcAccumulators::zero();
        let mut idx = 0;
        let status = mix_down(&[1, 2, 3], &mut acc, &mut idx, 1);
        assert_eq!(status, Status::Error);
        assert_eq!(acc.acc_i, 0);
    }

    #[test]
    fn mixing_a_dc_pair_against_a_full_cycle_nets_near_zero() {
        let mut acc = DdcAccumulators::zero();
        let mut idx = 0;
        let pairs: heapless::Vec<i16, { super::SINE_TABLE_LEN * 2 }> =
            (0..super::SINE_TABLE_LEN)
                .flat_map(|_| [1000i16, 1000i16])
                .collect();
        mix_down(&pairs, &mut acc, &mut idx, 1);
        assert!(acc.acc_i.unsigned_abs() < 1_000_000);
        assert!(acc.acc_q.unsigned_abs() < 1_000_000);
    }
}
