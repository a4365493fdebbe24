//! Measurement execution core for bare-metal RF instrument firmware.
//!
//! This crate is the hardware-agnostic heart of a VNA/spectrum-analyzer
//! instrument: a zero-allocation DSP pipeline, an event-driven FSM per
//! measurement channel, a publisher/subscriber event bus bridging ISR and
//! main-loop contexts, and SOLT vector error correction. It consumes an
//! abstract hardware interface ([`hal`]) and never touches a concrete
//! peripheral, filesystem, or UI layer — those are composed by the
//! application that links this crate in.
//!
//! Nothing here allocates. Every long-running operation is driven by a
//! non-blocking `tick()` call from [`channel`], advanced once per
//! superloop iteration by [`runtime`].
#![cfg_attr(not(test), no_std)]

pub mod block;
pub mod calibration;
pub mod chain;
pub mod channel;
pub mod dsp;
pub mod event;
pub mod hal;
pub mod node;
pub mod runtime;
pub mod types;

pub use meas_kernel::{is_close, Complex, Scalar};
pub use types::{Status, Variant};

/// The scalar type `R` selected at build time; re-exported from
/// `meas-kernel` so downstream code never names the kernel crate directly.
pub use meas_kernel::R;

/// Upper bound on sweep/trace/FFT length shared by every fixed-capacity
/// array in the core: the VNA's `MAX_POINTS` (spec.md §4.5) and the SA's
/// default FFT length (spec.md §4.5) are both 1024, so a single constant
/// sizes traces, FFT contexts, calibration tables, and node scratch
/// buffers throughout.
pub const MAX_POINTS: usize = 1024;
