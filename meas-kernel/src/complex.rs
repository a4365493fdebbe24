use core::ops::{Add, Div, Mul, Sub};

use crate::Scalar;

/// A complex number `(re, im)` over the scalar type `R`.
///
/// Arithmetic is always by-component; magnitude and argument route through
/// [`Scalar::sqrt`] and [`Scalar::atan2`] so they inherit whichever
/// accuracy/latency tradeoff the build's scalar type makes.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Complex<S: Scalar> {
    pub re: S,
    pub im: S,
}

impl<S: Scalar> Complex<S> {
    pub const fn new(re: S, im: S) -> Self {
        Self { re, im }
    }

    pub fn zero() -> Self {
        Self {
            re: S::ZERO,
            im: S::ZERO,
        }
    }

    /// `sqrt(re^2 + im^2)`.
    pub fn magnitude(self) -> S {
        (self.re * self.re + self.im * self.im).sqrt()
    }

    /// `atan2(im, re)`, in `(-pi, pi]`.
    pub fn argument(self) -> S {
        self.im.atan2(self.re)
    }

    /// `|self|^2`, avoiding the `sqrt` in [`Complex::magnitude`].
    pub fn norm_sqr(self) -> S {
        self.re * self.re + self.im * self.im
    }

    pub fn conj(self) -> Self {
        Self::new(self.re, -self.im)
    }

    /// Complex division guarded against a near-zero divisor.
    ///
    /// Returns `(0, 0)` when `rhs.norm_sqr() < eps` rather than dividing by
    /// a value indistinguishable from zero.
    pub fn checked_div(self, rhs: Self, eps: S) -> Self {
        let denom = rhs.norm_sqr();
        if denom < eps {
            return Self::zero();
        }
        let re = (self.re * rhs.re + self.im * rhs.im) / denom;
        let im = (self.im * rhs.re - self.re * rhs.im) / denom;
        Self::new(re, im)
    }

    /// Rotate `self` by `angle` radians (multiply by `exp(j*angle)`).
    pub fn rotate(self, angle: S) -> Self {
        let (s, c) = angle.sincos();
        Self::new(self.re * c - self.im * s, self.re * s + self.im * c)
    }
}

impl<S: Scalar> Add for Complex<S> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl<S: Scalar> Sub for Complex<S> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl<S: Scalar> Mul for Complex<S> {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.re * rhs.re - self.im * rhs.im,
            self.re * rhs.im + self.im * rhs.re,
        )
    }
}

impl<S: Scalar> Mul<S> for Complex<S> {
    type Output = Self;
    fn mul(self, rhs: S) -> Self {
        Self::new(self.re * rhs, self.im * rhs)
    }
}

impl<S: Scalar> Div<S> for Complex<S> {
    type Output = Self;
    fn div(self, rhs: S) -> Self {
        Self::new(self.re / rhs, self.im / rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnitude_of_unit_vectors() {
        let c = Complex::new(3.0f32, 4.0f32);
        assert!((c.magnitude() - 5.0).abs() < 1e-4);
    }

    #[test]
    fn division_guards_small_denominator() {
        let a = Complex::new(1.0f32, 0.0f32);
        let tiny = Complex::new(1e-6f32, 0.0f32);
        let result = a.checked_div(tiny, 1e-9);
        assert_eq!(result, Complex::zero());
    }

    #[test]
    fn rotate_by_zero_is_identity() {
        let c = Complex::new(1.0f32, 2.0f32);
        let r = c.rotate(0.0);
        assert!((r.re - c.re).abs() < 1e-4);
        assert!((r.im - c.im).abs() < 1e-4);
    }
}
