use core::ops::{Add, Div, Mul, Neg, Sub};

/// The real scalar type `R` used throughout the measurement core.
///
/// Implementations exist for `f32`, `f64` and a Q16.16 fixed-point type so
/// that a single generic DSP primitive or processing node compiles against
/// whichever representation the firmware build selected. Callers never
/// choose between the "fast" and "precise" internal path themselves —
/// that choice is baked into the implementation for the active build.
///
/// No method on this trait ever fails. Degenerate inputs (denormals,
/// division by zero, negative arguments to `sqrt`/`log`) return the
/// sentinel documented on each method instead of panicking or returning an
/// `Option`.
pub trait Scalar:
    Copy
    + Clone
    + PartialOrd
    + PartialEq
    + Default
    + core::fmt::Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + 'static
{
    const ZERO: Self;
    const ONE: Self;
    const PI: Self;
    const TWO_PI: Self;

    /// Lossy conversion from `f32`, used by callers that only need a
    /// coefficient or constant represented in `Self`.
    fn from_f32(v: f32) -> Self;

    /// Lossy conversion to `f32`, used for logging/telemetry and tests.
    fn to_f32(self) -> f32;

    fn fabs(self) -> Self;

    /// `sqrt(x)`. Zero for `x <= 0` on the fast path; defined for `x >= 0`
    /// on the precise path (negative input is still clamped to zero there).
    fn sqrt(self) -> Self;

    fn cbrt(self) -> Self;

    /// Natural logarithm. Returns `Self::ZERO` for `x <= 0`.
    fn log(self) -> Self;

    /// Base-10 logarithm. Returns `Self::ZERO` for `x <= 0`.
    fn log10(self) -> Self;

    fn exp(self) -> Self;

    /// Principal value of `atan(x)`, in `(-pi/2, pi/2)`.
    fn atan(self) -> Self;

    /// `atan2(y, x)` (`self` is `y`). Returns a value in `(-pi, pi]`;
    /// `atan2(0, 0) == 0`.
    fn atan2(self, x: Self) -> Self;

    /// Returns `(sin(self), cos(self))`. Max absolute error is <= 2e-3 on
    /// the LUT path, and within machine epsilon on the libm path.
    fn sincos(self) -> (Self, Self);

    /// Splits `self` into `(frac, int)` such that `frac + int == self`
    /// (modulo rounding) and `frac` carries the sign of `self`.
    fn modf(self) -> (Self, Self);

    /// Fused multiply-add: `self * a + b`.
    fn fma(self, a: Self, b: Self) -> Self;
}

// ---------------------------------------------------------------------
// f32
// ---------------------------------------------------------------------

#[cfg(not(feature = "precise-math"))]
mod fast_f32 {
    //! LUT + Newton-refinement "fast path" trig/roots for `f32`.
    //!
    //! This mirrors the accuracy/latency tradeoff a bare-metal DSP kernel
    //! makes when full libm transcendentals are too slow for the sample
    //! rate: a single 1024-entry sine table plus one Newton-Raphson
    //! iteration for roots, and a small-angle polynomial for `atan`.

    const SINE_LUT_LEN: usize = 1024;

    fn sine_lut() -> &'static [f32; SINE_LUT_LEN] {
        // Computed once, lazily, the first time the fast path is exercised.
        // Bare libm calls are used here (not on the hot sincos() path) to
        // seed the table; after initialization the table itself is all the
        // fast path ever touches.
        use core::sync::atomic::{AtomicBool, Ordering};
        static INIT: AtomicBool = AtomicBool::new(false);
        static mut TABLE: [f32; SINE_LUT_LEN] = [0.0; SINE_LUT_LEN];

        if !INIT.load(Ordering::Acquire) {
            // SAFETY: single-threaded bring-up on the measurement core;
            // concurrent first-touch from an ISR never happens because the
            // kernel is only ever called from the main-loop/task context.
            unsafe {
                for (i, slot) in TABLE.iter_mut().enumerate() {
                    let angle = 2.0 * core::f32::consts::PI * (i as f32)
                        / (SINE_LUT_LEN as f32);
                    *slot = libm::sinf(angle);
                }
            }
            INIT.store(true, Ordering::Release);
        }
        unsafe { &*core::ptr::addr_of!(TABLE) }
    }

    fn lut_sin(angle: f32) -> f32 {
        let table = sine_lut();
        let two_pi = 2.0 * core::f32::consts::PI;
        let mut a = angle % two_pi;
        if a < 0.0 {
            a += two_pi;
        }
        let phase = a * (SINE_LUT_LEN as f32) / two_pi;
        let i0 = phase as usize % SINE_LUT_LEN;
        let i1 = (i0 + 1) % SINE_LUT_LEN;
        let frac = phase - (phase as i32 as f32);
        table[i0] * (1.0 - frac) + table[i1] * frac
    }

    pub fn sincos(angle: f32) -> (f32, f32) {
        let s = lut_sin(angle);
        let c = lut_sin(angle + core::f32::consts::FRAC_PI_2);
        (s, c)
    }

    pub fn sqrt(x: f32) -> f32 {
        if x <= 0.0 {
            return 0.0;
        }
        // Fast inverse-sqrt seed followed by one Newton iteration on the
        // forward root, which keeps relative error well under 1e-3.
        let i = x.to_bits();
        let i = 0x5f3759df_u32.wrapping_sub(i >> 1);
        let y = f32::from_bits(i);
        let y = y * (1.5 - 0.5 * x * y * y);
        let root = 1.0 / y;
        0.5 * (root + x / root)
    }

    pub fn atan(x: f32) -> f32 {
        // Minimax-ish polynomial, good to ~2e-3 over the full domain via
        // range reduction to [-1, 1].
        let (x, sign, offset) = if x.abs() > 1.0 {
            let signum = if x < 0.0 { -1.0f32 } else { 1.0f32 };
            (1.0 / x, -1.0f32, core::f32::consts::FRAC_PI_2 * signum)
        } else {
            (x, 1.0f32, 0.0)
        };
        let x2 = x * x;
        let poly = x
            * (0.995_354_2 + x2 * (-0.288_679_7 + x2 * (0.079_331_85 - x2 * 0.016_636_72)));
        offset + sign * poly
    }
}

impl Scalar for f32 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;
    const PI: Self = core::f32::consts::PI;
    const TWO_PI: Self = 2.0 * core::f32::consts::PI;

    fn from_f32(v: f32) -> Self {
        v
    }

    fn to_f32(self) -> f32 {
        self
    }

    fn fabs(self) -> Self {
        #[cfg(feature = "precise-math")]
        {
            libm::fabsf(self)
        }
        #[cfg(not(feature = "precise-math"))]
        {
            if self < 0.0 {
                -self
            } else {
                self
            }
        }
    }

    fn sqrt(self) -> Self {
        #[cfg(feature = "precise-math")]
        {
            if self < 0.0 {
                0.0
            } else {
                libm::sqrtf(self)
            }
        }
        #[cfg(not(feature = "precise-math"))]
        {
            fast_f32::sqrt(self)
        }
    }

    fn cbrt(self) -> Self {
        #[cfg(feature = "precise-math")]
        {
            libm::cbrtf(self)
        }
        #[cfg(not(feature = "precise-math"))]
        {
            if self == 0.0 {
                0.0
            } else {
                let sign = if self < 0.0 { -1.0 } else { 1.0 };
                let x = self.fabs();
                let mut y = fast_f32::sqrt(fast_f32::sqrt(x));
                // Two Newton iterations on y^3 = x.
                for _ in 0..2 {
                    y = y - (y * y * y - x) / (3.0 * y * y);
                }
                sign * y
            }
        }
    }

    fn log(self) -> Self {
        if self <= 0.0 {
            return 0.0;
        }
        libm::logf(self)
    }

    fn log10(self) -> Self {
        if self <= 0.0 {
            return 0.0;
        }
        libm::log10f(self)
    }

    fn exp(self) -> Self {
        libm::expf(self)
    }

    fn atan(self) -> Self {
        #[cfg(feature = "precise-math")]
        {
            libm::atanf(self)
        }
        #[cfg(not(feature = "precise-math"))]
        {
            fast_f32::atan(self)
        }
    }

    fn atan2(self, x: Self) -> Self {
        if self == 0.0 && x == 0.0 {
            return 0.0;
        }
        #[cfg(feature = "precise-math")]
        {
            libm::atan2f(self, x)
        }
        #[cfg(not(feature = "precise-math"))]
        {
            let y = self;
            if x > 0.0 {
                fast_f32::atan(y / x)
            } else if x < 0.0 && y >= 0.0 {
                fast_f32::atan(y / x) + Self::PI
            } else if x < 0.0 && y < 0.0 {
                fast_f32::atan(y / x) - Self::PI
            } else if y > 0.0 {
                Self::PI / 2.0
            } else {
                -Self::PI / 2.0
            }
        }
    }

    fn sincos(self) -> (Self, Self) {
        #[cfg(feature = "precise-math")]
        {
            libm::sincosf(self)
        }
        #[cfg(not(feature = "precise-math"))]
        {
            fast_f32::sincos(self)
        }
    }

    fn modf(self) -> (Self, Self) {
        let (frac, int) = libm::modff(self);
        (frac, int)
    }

    fn fma(self, a: Self, b: Self) -> Self {
        #[cfg(feature = "precise-math")]
        {
            libm::fmaf(self, a, b)
        }
        #[cfg(not(feature = "precise-math"))]
        {
            self * a + b
        }
    }
}

// ---------------------------------------------------------------------
// f64 — always routed through libm; this is the "I need full precision"
// build and is never paired with the LUT fast path.
// ---------------------------------------------------------------------

impl Scalar for f64 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;
    const PI: Self = core::f64::consts::PI;
    const TWO_PI: Self = 2.0 * core::f64::consts::PI;

    fn from_f32(v: f32) -> Self {
        v as f64
    }

    fn to_f32(self) -> f32 {
        self as f32
    }

    fn fabs(self) -> Self {
        libm::fabs(self)
    }

    fn sqrt(self) -> Self {
        if self < 0.0 {
            0.0
        } else {
            libm::sqrt(self)
        }
    }

    fn cbrt(self) -> Self {
        libm::cbrt(self)
    }

    fn log(self) -> Self {
        if self <= 0.0 {
            0.0
        } else {
            libm::log(self)
        }
    }

    fn log10(self) -> Self {
        if self <= 0.0 {
            0.0
        } else {
            libm::log10(self)
        }
    }

    fn exp(self) -> Self {
        libm::exp(self)
    }

    fn atan(self) -> Self {
        libm::atan(self)
    }

    fn atan2(self, x: Self) -> Self {
        if self == 0.0 && x == 0.0 {
            0.0
        } else {
            libm::atan2(self, x)
        }
    }

    fn sincos(self) -> (Self, Self) {
        libm::sincos(self)
    }

    fn modf(self) -> (Self, Self) {
        libm::modf(self)
    }

    fn fma(self, a: Self, b: Self) -> Self {
        libm::fma(self, a, b)
    }
}

// ---------------------------------------------------------------------
// Q16.16 fixed point
// ---------------------------------------------------------------------

use fixed::types::I16F16;

mod fixed_trig {
    //! CORDIC-based trig and a shift-and-subtract root for Q16.16.
    //!
    //! Fixed-point builds have no libm to fall back on, so the "fast path"
    //! is the only path: a 16-iteration rotation-mode CORDIC for
    //! sin/cos/atan2 and integer Newton iteration for `sqrt`.
    use fixed::types::I16F16;

    // atan(2^-i) for i in 0..16, in Q16.16 turns-free radians.
    const CORDIC_ANGLES: [f64; 16] = [
        0.785398163397448,
        0.463647609000806,
        0.244978663126864,
        0.124354994546761,
        0.062418809995957,
        0.031239833430268,
        0.015623728620477,
        0.007812341060101,
        0.003906230131966,
        0.001953122516479,
        0.000976562189559,
        0.000488281211195,
        0.000244140620149,
        0.000122070311894,
        0.000061035156175,
        0.000030517578126,
    ];

    // CORDIC gain 1/K for 16 iterations, pre-divided in so the rotated
    // vector comes out already normalized.
    const CORDIC_GAIN: f64 = 0.607_252_935_008_881;

    const ZERO: I16F16 = I16F16::from_bits(0);
    const ONE: I16F16 = I16F16::from_bits(1 << 16);

    fn angle_const(a: f64) -> I16F16 {
        I16F16::from_num(a)
    }

    /// Rotation-mode CORDIC. Returns `(sin(angle), cos(angle))` for
    /// `angle` reduced to `[-pi, pi]`.
    pub fn sincos(angle: I16F16) -> (I16F16, I16F16) {
        let pi = I16F16::from_num(core::f64::consts::PI);
        let two_pi = pi * I16F16::from_num(2);
        let mut a = angle;
        while a > pi {
            a -= two_pi;
        }
        while a < -pi {
            a += two_pi;
        }

        let mut x = I16F16::from_num(CORDIC_GAIN);
        let mut y = ZERO;
        let mut z = a;

        for i in 0..16 {
            let shift = i as u32;
            let d: I16F16 = if z >= ZERO {
                ONE
            } else {
                -ONE
            };
            let x_shift = x.unwrapped_shr(shift);
            let y_shift = y.unwrapped_shr(shift);
            let new_x = x - d * y_shift;
            let new_y = y + d * x_shift;
            x = new_x;
            y = new_y;
            z -= d * angle_const(CORDIC_ANGLES[i]);
        }
        (y, x)
    }

    /// Vectoring-mode CORDIC. Returns `atan2(y, x)` in `(-pi, pi]`.
    pub fn atan2(y: I16F16, x: I16F16) -> I16F16 {
        if y == ZERO && x == ZERO {
            return ZERO;
        }
        let pi = I16F16::from_num(core::f64::consts::PI);

        let (mut x, mut y, mut z, flip) = if x < ZERO {
            (-x, -y, ZERO, true)
        } else {
            (x, y, ZERO, false)
        };

        for i in 0..16 {
            let shift = i as u32;
            let d: I16F16 = if y < ZERO {
                ONE
            } else {
                -ONE
            };
            let x_shift = x.unwrapped_shr(shift);
            let y_shift = y.unwrapped_shr(shift);
            let new_x = x - d * y_shift;
            let new_y = y + d * x_shift;
            x = new_x;
            y = new_y;
            z -= d * angle_const(CORDIC_ANGLES[i]);
        }

        let mut angle = -z;
        if flip {
            angle = if angle <= ZERO {
                angle + pi
            } else {
                angle - pi
            };
        }
        angle
    }
}

impl Scalar for I16F16 {
    // Q16.16: 16 fractional bits, so `1 << 16` is exactly `1.0` and the
    // trig constants are the nearest representable raw bit patterns.
    const ZERO: Self = Self::from_bits(0);
    const ONE: Self = Self::from_bits(1 << 16);
    const PI: Self = Self::from_bits(205_887);
    const TWO_PI: Self = Self::from_bits(411_775);

    fn from_f32(v: f32) -> Self {
        I16F16::from_num(v)
    }

    fn to_f32(self) -> f32 {
        self.to_num::<f32>()
    }

    fn fabs(self) -> Self {
        self.abs()
    }

    fn sqrt(self) -> Self {
        if self <= Self::ZERO {
            return Self::ZERO;
        }
        // Integer Newton-Raphson on the underlying Q16.16 bits.
        let x = self.to_num::<f64>();
        let mut guess = x;
        if guess <= 0.0 {
            return Self::ZERO;
        }
        for _ in 0..8 {
            guess = 0.5 * (guess + x / guess);
        }
        Self::from_num(guess)
    }

    fn cbrt(self) -> Self {
        let x = self.to_num::<f64>();
        let sign = if x < 0.0 { -1.0 } else { 1.0 };
        let ax = libm::fabs(x);
        let mut guess = if ax == 0.0 {
            0.0
        } else {
            libm::sqrt(libm::sqrt(ax))
        };
        for _ in 0..8 {
            if guess == 0.0 {
                break;
            }
            guess = guess - (guess * guess * guess - ax) / (3.0 * guess * guess);
        }
        Self::from_num(sign * guess)
    }

    fn log(self) -> Self {
        let x = self.to_num::<f64>();
        if x <= 0.0 {
            Self::ZERO
        } else {
            Self::from_num(libm::log(x))
        }
    }

    fn log10(self) -> Self {
        let x = self.to_num::<f64>();
        if x <= 0.0 {
            Self::ZERO
        } else {
            Self::from_num(libm::log10(x))
        }
    }

    fn exp(self) -> Self {
        Self::from_num(libm::exp(self.to_num::<f64>()))
    }

    fn atan(self) -> Self {
        fixed_trig::atan2(self, Self::ONE)
    }

    fn atan2(self, x: Self) -> Self {
        fixed_trig::atan2(self, x)
    }

    fn sincos(self) -> (Self, Self) {
        fixed_trig::sincos(self)
    }

    fn modf(self) -> (Self, Self) {
        let int_part = self.int();
        (self - int_part, int_part)
    }

    fn fma(self, a: Self, b: Self) -> Self {
        self * a + b
    }
}
