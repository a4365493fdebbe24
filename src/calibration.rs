//! SOLT (short/open/load/thru/isolation) vector error correction
//! (spec.md §4.6, §6).
//!
//! `Calibration<CAP>` owns the five per-point error-term arrays
//! (`{ed, es, er, et, ex}`) plus scratch for the raw standard measurements
//! `compute_coefficients` consumes. The arrays are inline, fixed-capacity
//! storage (`CAP` == [`crate::MAX_POINTS`] everywhere in this crate) rather
//! than caller-owned references: spec.md's data model says the *channel*
//! borrows calibration by reference, not that calibration itself must be
//! built over borrowed coefficient storage.

use meas_kernel::{Complex, Scalar};

use crate::types::Status;
use crate::R;

/// Division guard threshold, shared with [`crate::dsp::gamma`].
pub use crate::dsp::gamma::EPS;

/// Which standard a `measure_standard` acquisition was taken against
/// (spec.md Glossary, §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardKind {
    Short,
    Open,
    Load,
    Thru,
    Isolation,
}

/// One frequency point's error terms (spec.md §3, §6).
#[derive(Debug, Clone, Copy)]
pub struct CalPoint {
    pub ed: Complex<R>,
    pub es: Complex<R>,
    pub er: Complex<R>,
    pub et: Complex<R>,
    pub ex: Complex<R>,
}

impl CalPoint {
    /// Identity correction: `apply` on this term set is a no-op.
    pub const fn identity() -> Self {
        let zero = Complex::new(r_zero(), r_zero());
        let one = Complex::new(r_one(), r_zero());
        Self {
            ed: zero,
            es: zero,
            er: one,
            et: one,
            ex: zero,
        }
    }
}

const fn r_zero() -> R {
    r_zero_impl()
}

const fn r_one() -> R {
    r_one_impl()
}

#[cfg(all(feature = "float32", not(feature = "float64"), not(feature = "fixed-point")))]
const fn r_zero_impl() -> R {
    0.0
}
#[cfg(all(feature = "float32", not(feature = "float64"), not(feature = "fixed-point")))]
const fn r_one_impl() -> R {
    1.0
}

#[cfg(all(feature = "float64", not(feature = "fixed-point")))]
const fn r_zero_impl() -> R {
    0.0
}
#[cfg(all(feature = "float64", not(feature = "fixed-point")))]
const fn r_one_impl() -> R {
    1.0
}

#[cfg(feature = "fixed-point")]
const fn r_zero_impl() -> R {
    R::from_bits(0)
}
#[cfg(feature = "fixed-point")]
const fn r_one_impl() -> R {
    R::from_bits(1 << 16)
}

/// SOLT calibration state for a single channel: computed error terms plus
/// the raw standard measurements `compute_coefficients` is built from.
pub struct Calibration<const CAP: usize> {
    terms: [CalPoint; CAP],
    raw_short: [Complex<R>; CAP],
    raw_open: [Complex<R>; CAP],
    raw_load: [Complex<R>; CAP],
    raw_thru: [Complex<R>; CAP],
    raw_isolation: [Complex<R>; CAP],
    boundary_hit: core::sync::atomic::AtomicBool,
}

impl<const CAP: usize> Calibration<CAP> {
    pub const fn new() -> Self {
        Self {
            terms: [CalPoint::identity(); CAP],
            raw_short: [Complex::new(r_zero(), r_zero()); CAP],
            raw_open: [Complex::new(r_zero(), r_zero()); CAP],
            raw_load: [Complex::new(r_zero(), r_zero()); CAP],
            raw_thru: [Complex::new(r_one(), r_zero()); CAP],
            raw_isolation: [Complex::new(r_zero(), r_zero()); CAP],
            boundary_hit: core::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Store one standard's raw measurement at `point` (spec.md §4.6:
    /// "performs one acquisition with the specified standard connected and
    /// stores its raw measurement at `current_point`"). The acquisition
    /// itself is the caller's (channel FSM's) job; this just records the
    /// resulting complex sample against the standard kind and point index.
    pub fn measure_standard(
        &mut self,
        point: usize,
        kind: StandardKind,
        raw: Complex<R>,
    ) -> Status {
        if point >= CAP {
            return Status::Error;
        }
        match kind {
            StandardKind::Short => self.raw_short[point] = raw,
            StandardKind::Open => self.raw_open[point] = raw,
            StandardKind::Load => self.raw_load[point] = raw,
            StandardKind::Thru => self.raw_thru[point] = raw,
            StandardKind::Isolation => self.raw_isolation[point] = raw,
        }
        Status::Ok
    }

    /// Solve the SOLT equations at every point from the stored standard
    /// measurements, filling `{ed, es, er, et, ex}` (spec.md §4.6).
    ///
    /// One-port terms assume ideal short/open/load reflection coefficients
    /// of `-1`, `+1`, `0` respectively (the classic 3-term derivation).
    /// Transmission terms assume an ideal thru of reflection `1` (unity
    /// transmission) and fold isolation in as leakage to subtract first.
    pub fn compute_coefficients(&mut self) -> Status {
        for i in 0..CAP {
            let load_m = self.raw_load[i];
            let ed = load_m;

            let s = self.raw_short[i] - ed;
            let o = self.raw_open[i] - ed;
            let diff = o - s;
            let es = (o + s).checked_div(diff, EPS);
            let er = (s + s * es) * Complex::new(-R::ONE, R::ZERO);

            let ex = self.raw_isolation[i];
            let et = self.raw_thru[i] - ex;

            self.terms[i] = CalPoint { ed, es, er, et, ex };
        }
        Status::Ok
    }

    /// Apply the error terms at `point` to `measured`, selecting the
    /// reflection (one-port) or transmission correction formula.
    ///
    /// `ed`/`es`/`er` are the one-port directivity/source-match/reflection-
    /// tracking terms; `et`/`ex` are the transmission-tracking/isolation
    /// terms. Division guards against `|denominator|^2 < EPS` and returns
    /// `(0, 0)` below that threshold (spec.md §4.6 numerical policy).
    pub fn apply(&self, point: usize, measured: Complex<R>, transmission: bool) -> Complex<R> {
        if point >= CAP {
            return Complex::zero();
        }
        let term = &self.terms[point];
        let (corrected, denom) = if transmission {
            (measured - term.ex, term.et)
        } else {
            let numerator = measured - term.ed;
            (numerator, term.es * numerator + term.er)
        };
        if denom.norm_sqr() < EPS {
            self.boundary_hit.store(true, core::sync::atomic::Ordering::Relaxed);
        }
        corrected.checked_div(denom, EPS)
    }

    pub fn terms_at(&self, point: usize) -> Option<&CalPoint> {
        self.terms.get(point)
    }

    /// Consume and clear the "division guard tripped" flag set by the most
    /// recent [`Calibration::apply`] calls (spec.md §4.6: "a boundary flag
    /// may be recorded via an event"). The channel FSM polls this once per
    /// processed point and publishes an [`crate::event::ErrorKind::CalibrationBoundary`]
    /// event when it reads `true`.
    pub fn take_boundary_hit(&self) -> bool {
        self.boundary_hit.swap(false, core::sync::atomic::Ordering::Relaxed)
    }
}

impl<const CAP: usize> Default for Calibration<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

/// Persisted calibration file layout (spec.md §6): a fixed 28-byte header
/// followed by `points` fixed-width records, all little-endian. The
/// scalar width of each field is committed to the build's `R`
/// representation (`R_BYTES`), matching spec.md's "serialization of
/// calibration files must commit to one scalar format per file".
pub mod file {
    use super::*;

    pub const MAGIC: [u8; 4] = *b"MEAS";
    pub const KIND_SOLT: u8 = 1;
    pub const HEADER_LEN: usize = 4 + 2 + 1 + 1 + 4 + 8 + 8;

    #[cfg(all(feature = "float32", not(feature = "float64"), not(feature = "fixed-point")))]
    pub const R_BYTES: usize = 4;
    #[cfg(all(feature = "float64", not(feature = "fixed-point")))]
    pub const R_BYTES: usize = 8;
    #[cfg(feature = "fixed-point")]
    pub const R_BYTES: usize = 4;

    /// Byte length of a single `{ed, es, er, et, ex}` record.
    pub const fn record_len() -> usize {
        5 * 2 * R_BYTES
    }

    #[cfg(all(feature = "float32", not(feature = "float64"), not(feature = "fixed-point")))]
    fn r_to_le(v: R, out: &mut [u8]) {
        out[..4].copy_from_slice(&v.to_le_bytes());
    }
    #[cfg(all(feature = "float32", not(feature = "float64"), not(feature = "fixed-point")))]
    fn r_from_le(buf: &[u8]) -> R {
        f32::from_le_bytes(buf[..4].try_into().unwrap())
    }

    #[cfg(all(feature = "float64", not(feature = "fixed-point")))]
    fn r_to_le(v: R, out: &mut [u8]) {
        out[..8].copy_from_slice(&v.to_le_bytes());
    }
    #[cfg(all(feature = "float64", not(feature = "fixed-point")))]
    fn r_from_le(buf: &[u8]) -> R {
        f64::from_le_bytes(buf[..8].try_into().unwrap())
    }

    #[cfg(feature = "fixed-point")]
    fn r_to_le(v: R, out: &mut [u8]) {
        out[..4].copy_from_slice(&v.to_bits().to_le_bytes());
    }
    #[cfg(feature = "fixed-point")]
    fn r_from_le(buf: &[u8]) -> R {
        R::from_bits(i32::from_le_bytes(buf[..4].try_into().unwrap()))
    }

    fn write_complex(buf: &mut [u8], c: Complex<R>) {
        r_to_le(c.re, &mut buf[..R_BYTES]);
        r_to_le(c.im, &mut buf[R_BYTES..2 * R_BYTES]);
    }

    fn read_complex(buf: &[u8]) -> Complex<R> {
        Complex::new(r_from_le(&buf[..R_BYTES]), r_from_le(&buf[R_BYTES..2 * R_BYTES]))
    }

    pub fn write_header(buf: &mut [u8], points: u32, start_hz: u64, stop_hz: u64) -> Status {
        if buf.len() < HEADER_LEN {
            return Status::Error;
        }
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..6].copy_from_slice(&1u16.to_le_bytes());
        buf[6] = KIND_SOLT;
        buf[7] = 0;
        buf[8..12].copy_from_slice(&points.to_le_bytes());
        buf[12..20].copy_from_slice(&start_hz.to_le_bytes());
        buf[20..28].copy_from_slice(&stop_hz.to_le_bytes());
        Status::Ok
    }

    /// Returns `(points, start_hz, stop_hz)` on a valid header (matching
    /// magic and kind); `Status::Error` otherwise, without reading past
    /// the header.
    pub fn read_header(buf: &[u8]) -> Result<(u32, u64, u64), Status> {
        if buf.len() < HEADER_LEN || buf[0..4] != MAGIC || buf[6] != KIND_SOLT {
            return Err(Status::Error);
        }
        let points = u32::from_le_bytes(buf[8..12].try_into().unwrap());
        let start_hz = u64::from_le_bytes(buf[12..20].try_into().unwrap());
        let stop_hz = u64::from_le_bytes(buf[20..28].try_into().unwrap());
        Ok((points, start_hz, stop_hz))
    }

    impl<const CAP: usize> Calibration<CAP> {
        /// Serialize `points` coefficient records into `buf`, returning the
        /// number of bytes written.
        pub fn write_records(&self, points: usize, buf: &mut [u8]) -> Result<usize, Status> {
            let rl = record_len();
            if points > CAP || buf.len() < points * rl {
                return Err(Status::Error);
            }
            let w = 2 * R_BYTES;
            for i in 0..points {
                let rec = &mut buf[i * rl..(i + 1) * rl];
                let term = &self.terms[i];
                write_complex(&mut rec[0 * w..1 * w], term.ed);
                write_complex(&mut rec[1 * w..2 * w], term.es);
                write_complex(&mut rec[2 * w..3 * w], term.er);
                write_complex(&mut rec[3 * w..4 * w], term.et);
                write_complex(&mut rec[4 * w..5 * w], term.ex);
            }
            Ok(points * rl)
        }

        /// Deserialize `points` coefficient records from `buf`, replacing
        /// `self.terms[..points]`.
        pub fn read_records(&mut self, points: usize, buf: &[u8]) -> Status {
            let rl = record_len();
            if points > CAP || buf.len() < points * rl {
                return Status::Error;
            }
            let w = 2 * R_BYTES;
            for i in 0..points {
                let rec = &buf[i * rl..(i + 1) * rl];
                self.terms[i] = CalPoint {
                    ed: read_complex(&rec[0 * w..1 * w]),
                    es: read_complex(&rec[1 * w..2 * w]),
                    er: read_complex(&rec[2 * w..3 * w]),
                    et: read_complex(&rec[3 * w..4 * w]),
                    ex: read_complex(&rec[4 * w..5 * w]),
                };
            }
            Status::Ok
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meas_kernel::Scalar;

    #[test]
    fn identity_calibration_is_pass_through() {
        let cal: Calibration<4> = Calibration::new();
        let m = Complex::new(R::from_f32(0.3), R::from_f32(-0.1));
        let out = cal.apply(0, m, false);
        assert!((out.re - m.re).fabs() < R::from_f32(1e-5));
        assert!((out.im - m.im).fabs() < R::from_f32(1e-5));
    }

    #[test]
    fn solt_recovers_an_ideal_short() {
        let mut cal: Calibration<1> = Calibration::new();
        // Ideal standards measured with no error at all: short=-1, open=1,
        // load=0.
        cal.measure_standard(0, StandardKind::Short, Complex::new(-R::ONE, R::ZERO));
        cal.measure_standard(0, StandardKind::Open, Complex::new(R::ONE, R::ZERO));
        cal.measure_standard(0, StandardKind::Load, Complex::new(R::ZERO, R::ZERO));
        cal.compute_coefficients();

        let corrected = cal.apply(0, Complex::new(-R::ONE, R::ZERO), false);
        assert!((corrected.re + R::ONE).fabs() < R::from_f32(1e-3));
        assert!(corrected.im.fabs() < R::from_f32(1e-3));
    }

    #[test]
    fn near_singular_denominator_sets_boundary_flag_and_returns_zero() {
        // Three coincident raw standards collapse `es` to a singular value
        // (`o - s` near zero), driving the reflection denominator below EPS.
        let mut cal: Calibration<1> = Calibration::new();
        cal.measure_standard(0, StandardKind::Short, Complex::new(R::ZERO, R::ZERO));
        cal.measure_standard(0, StandardKind::Open, Complex::new(R::ZERO, R::ZERO));
        cal.measure_standard(0, StandardKind::Load, Complex::new(R::ZERO, R::ZERO));
        cal.compute_coefficients();

        assert!(!cal.take_boundary_hit());
        let out = cal.apply(0, Complex::new(R::from_f32(0.5), R::ZERO), false);
        assert_eq!(out.re, R::ZERO);
        assert_eq!(out.im, R::ZERO);
        assert!(cal.take_boundary_hit());
        // The flag is consumed by the previous read.
        assert!(!cal.take_boundary_hit());
    }

    #[test]
    fn out_of_range_point_is_zero() {
        let cal: Calibration<2> = Calibration::new();
        let out = cal.apply(5, Complex::new(R::ONE, R::ZERO), false);
        assert_eq!(out.re, R::ZERO);
        assert_eq!(out.im, R::ZERO);
    }

    #[test]
    fn header_round_trips() {
        let mut buf = [0u8; file::HEADER_LEN];
        assert_eq!(file::write_header(&mut buf, 201, 1_000_000, 3_000_000_000), Status::Ok);
        let (points, start, stop) = file::read_header(&buf).unwrap();
        assert_eq!(points, 201);
        assert_eq!(start, 1_000_000);
        assert_eq!(stop, 3_000_000_000);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let buf = [0u8; file::HEADER_LEN];
        assert!(file::read_header(&buf).is_err());
    }

    #[test]
    fn records_round_trip() {
        let mut cal: Calibration<2> = Calibration::new();
        cal.compute_coefficients();
        let mut buf = [0u8; 2 * 64];
        let rl = file::record_len();
        let n = cal.write_records(2, &mut buf).unwrap();
        assert_eq!(n, 2 * rl);

        let mut cal2: Calibration<2> = Calibration::new();
        cal2.read_records(2, &buf[..n]);
        let a = cal.terms_at(1).unwrap();
        let b = cal2.terms_at(1).unwrap();
        assert!((a.er.re - b.er.re).fabs() < R::from_f32(1e-4));
    }
}
