//! Signal-processing primitives the pipeline nodes compose (spec.md §4.2).
//!
//! Every function here is a free function operating on caller-provided
//! buffers: no primitive owns storage, allocates, or can fail for reasons
//! other than a structurally invalid argument (wrong length, non-power-of-
//! two FFT size), in which case it returns [`Status::Error`] without
//! touching its output.

pub mod ddc;
pub mod dds;
pub mod decimate;
pub mod fft;
pub mod gamma;
pub mod goertzel;
pub mod rbw;
pub mod window;

use core::sync::atomic::{AtomicBool, Ordering};

use dds::Waveform;

/// Number of entries in the shared sine table (spec.md §4.2).
pub const SINE_TABLE_LEN: usize = 1024;

static SINE_TABLE_INIT: AtomicBool = AtomicBool::new(false);
static mut SINE_TABLE: [i16; SINE_TABLE_LEN] = [0; SINE_TABLE_LEN];

/// Returns the shared 1024-entry sine table, one cycle of a unity-frequency
/// sine wave generated by the [`dds`] module. Built exactly once, lazily,
/// on first use; every [`ddc::mix_down`] call and every `Sine`/other
/// waveform DDS call reads (or, for the table itself, wrote) through this
/// same buffer.
pub fn sine_table() -> &'static [i16; SINE_TABLE_LEN] {
    if !SINE_TABLE_INIT.load(Ordering::Acquire) {
        // SAFETY: guarded by a one-shot flag; the only writer is this
        // branch, which at most one caller can enter before the flag is
        // observed true by everyone else. This mirrors the lazy LUT
        // pattern in `meas_kernel::scalar::fast_f32::sine_lut`.
        unsafe {
            let mut acc = dds::PhaseAccumulator::new(1, SINE_TABLE_LEN as u32);
            let table = &mut *core::ptr::addr_of_mut!(SINE_TABLE);
            for sample in table.iter_mut() {
                *sample = acc.next_sample(Waveform::Sine);
            }
        }
        SINE_TABLE_INIT.store(true, Ordering::Release);
    }
    unsafe { &*core::ptr::addr_of!(SINE_TABLE) }
}

/// Cosine lookup as the phase-shifted sine table: `cos(x) == sin(x + N/4)`.
pub fn cosine_lookup(table: &[i16; SINE_TABLE_LEN], index: usize) -> i16 {
    table[(index + SINE_TABLE_LEN / 4) % SINE_TABLE_LEN]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_table_starts_at_zero_and_peaks_at_quarter() {
        let table = sine_table();
        assert_eq!(table[0], 0);
        assert!(table[SINE_TABLE_LEN / 4] > i16::MAX - 4);
    }

    #[test]
    fn cosine_lookup_matches_quarter_cycle_shift() {
        let table = sine_table();
        assert_eq!(cosine_lookup(table, 0), table[SINE_TABLE_LEN / 4]);
    }
}
