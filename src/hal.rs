//! Abstract hardware boundary traits (spec.md §6) — concrete structs plus
//! trait abstractions at the HAL boundary only, per spec.md §9 Design
//! Notes ("the core does not actually need reference counting... replace
//! the object-with-vtable pattern with concrete structs plus trait
//! abstractions only at the HAL boundary"). Mirrors the teacher's
//! `ad9959::Interface` / `pounder::attenuators::AttenuatorInterface`
//! pattern: one trait per physical concern, a plain associated `Error`,
//! no dynamic dispatch.

use crate::types::Status;
use crate::R;

/// Frequency/power source driving a channel's stimulus.
pub trait Synthesizer {
    fn set_frequency(&mut self, hz: R) -> Status;
    fn set_power(&mut self, dbm: R) -> Status;
    fn enable_output(&mut self, enabled: bool) -> Status;
}

/// ADC/receive path. `start` arms a DMA transfer into `buffer` and
/// returns immediately; completion is observed by the caller through the
/// platform's `data_ready` flag or DMA-complete interrupt, never by
/// polling here (spec.md §9: "the data path must never disable
/// interrupts").
pub trait Receiver {
    fn configure(&mut self, sample_rate: R, decimation: i32) -> Status;

    /// # Safety
    /// `buffer` must remain valid and exclusively owned by the receiver's
    /// DMA engine for at least `size` elements until `stop` is called or
    /// the transfer completes.
    unsafe fn start(&mut self, buffer: *mut (), size: usize) -> Status;
    fn stop(&mut self) -> Status;
}

/// Input/output path switching (e.g. reflect vs. through, attenuator
/// pad selection).
pub trait FrontEndSwitch {
    fn set_path(&mut self, path_id: i32) -> Status;
}

/// A byte-oriented link to a host or companion controller.
pub trait Link {
    fn send(&mut self, data: &[u8]) -> Result<usize, Status>;
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Status>;
    fn is_connected(&self) -> bool;
    fn flush(&mut self) -> Status;
}

/// A block device for calibration/configuration persistence.
pub trait Storage {
    fn read(&mut self, sector: u32, buf: &mut [u8], count: usize) -> Status;
    fn write(&mut self, sector: u32, buf: &[u8], count: usize) -> Status;
    fn get_capacity(&self) -> u32;
    fn is_ready(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSynth {
        frequency: R,
        power: R,
        enabled: bool,
    }

    impl Synthesizer for FakeSynth {
        fn set_frequency(&mut self, hz: R) -> Status {
            self.frequency = hz;
            Status::Ok
        }
        fn set_power(&mut self, dbm: R) -> Status {
            self.power = dbm;
            Status::Ok
        }
        fn enable_output(&mut self, enabled: bool) -> Status {
            self.enabled = enabled;
            Status::Ok
        }
    }

    #[test]
    fn a_synthesizer_impl_can_be_driven_through_the_trait() {
        use meas_kernel::Scalar;
        let mut synth = FakeSynth {
            frequency: R::ZERO,
            power: R::ZERO,
            enabled: false,
        };
        let dyn_synth: &mut dyn Synthesizer = &mut synth;
        assert_eq!(dyn_synth.set_frequency(R::from_f32(1_000_000.0)), Status::Ok);
        assert_eq!(dyn_synth.enable_output(true), Status::Ok);
        assert!(synth.enabled);
    }

    struct FakeStorage {
        capacity: u32,
        ready: bool,
    }

    impl Storage for FakeStorage {
        fn read(&mut self, _sector: u32, _buf: &mut [u8], _count: usize) -> Status {
            Status::Ok
        }
        fn write(&mut self, _sector: u32, _buf: &[u8], _count: usize) -> Status {
            Status::Ok
        }
        fn get_capacity(&self) -> u32 {
            self.capacity
        }
        fn is_ready(&self) -> bool {
            self.ready
        }
    }

    #[test]
    fn storage_reports_capacity_and_readiness() {
        let storage = FakeStorage {
            capacity: 4096,
            ready: true,
        };
        assert_eq!(storage.get_capacity(), 4096);
        assert!(storage.is_ready());
    }
}
