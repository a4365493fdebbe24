//! Portable numeric kernel for `meas-core`.
//!
//! This crate is the leaf of the measurement execution core's dependency
//! graph (see the core crate's module overview): it exposes the scalar
//! primitives — roots, transcendentals, complex magnitude/argument,
//! interpolation and basic statistics — that every DSP primitive and
//! processing node builds on. Exactly one scalar representation is picked at
//! build time via the `float32` / `float64` / `fixed-point` features; the
//! kernel never exposes which internal path (LUT/Newton vs. libm) served a
//! given call, only the accuracy contract documented per function.
//!
//! Nothing in this crate allocates and nothing in this crate fails: every
//! function returns a deterministic, documented sentinel on degenerate
//! input (denormals, division by zero) rather than an `Option`/`Result`.
#![cfg_attr(not(test), no_std)]

mod complex;
mod interp;
mod scalar;
mod stats;

pub use complex::Complex;
pub use interp::{cosine_interp, linear_extrap, linear_interp, parabolic_interp};
pub use scalar::Scalar;
pub use stats::{ExponentialMovingAverage, SimpleMovingAverage, WelfordStats};

#[cfg(feature = "fixed-point")]
pub use fixed::types::I16F16;

/// The scalar type `R` selected at build time.
///
/// Exactly one of `float32` / `float64` / `fixed-point` must be active;
/// `float32` is the crate default. Downstream crates should always refer to
/// `meas_kernel::R`, never hard-code a concrete type, so that switching the
/// build-time representation does not ripple through call sites.
#[cfg(all(feature = "float32", not(feature = "float64"), not(feature = "fixed-point")))]
pub type R = f32;

#[cfg(all(feature = "float64", not(feature = "fixed-point")))]
pub type R = f64;

#[cfg(feature = "fixed-point")]
pub type R = fixed::types::I16F16;

/// Returns true if `a` and `b` differ by no more than `eps`.
pub fn is_close<S: Scalar>(a: S, b: S, eps: S) -> bool {
    (a - b).fabs() <= eps
}
