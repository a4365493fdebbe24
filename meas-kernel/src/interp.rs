use crate::Scalar;

/// Linear interpolation between `(x0, y0)` and `(x1, y1)` at `x`.
pub fn linear_interp<S: Scalar>(x0: S, y0: S, x1: S, y1: S, x: S) -> S {
    let dx = x1 - x0;
    if dx == S::ZERO {
        return y0;
    }
    let t = (x - x0) / dx;
    y0 + (y1 - y0) * t
}

/// Linear extrapolation beyond `(x0, y0)`-`(x1, y1)` using the same slope.
pub fn linear_extrap<S: Scalar>(x0: S, y0: S, x1: S, y1: S, x: S) -> S {
    linear_interp(x0, y0, x1, y1, x)
}

/// Parabolic (three-point Lagrange) interpolation through
/// `(x0, y0), (x1, y1), (x2, y2)` evaluated at `x`.
pub fn parabolic_interp<S: Scalar>(
    x0: S,
    y0: S,
    x1: S,
    y1: S,
    x2: S,
    y2: S,
    x: S,
) -> S {
    let l0_num = (x - x1) * (x - x2);
    let l0_den = (x0 - x1) * (x0 - x2);
    let l1_num = (x - x0) * (x - x2);
    let l1_den = (x1 - x0) * (x1 - x2);
    let l2_num = (x - x0) * (x - x1);
    let l2_den = (x2 - x0) * (x2 - x1);

    let l0 = if l0_den == S::ZERO { S::ZERO } else { l0_num / l0_den };
    let l1 = if l1_den == S::ZERO { S::ZERO } else { l1_num / l1_den };
    let l2 = if l2_den == S::ZERO { S::ZERO } else { l2_num / l2_den };

    y0 * l0 + y1 * l1 + y2 * l2
}

/// Raised-cosine interpolation between `(x0, y0)` and `(x1, y1)` at `x`,
/// i.e. linear interpolation with an `S`-curve easing applied to `t`.
pub fn cosine_interp<S: Scalar>(x0: S, y0: S, x1: S, y1: S, x: S) -> S {
    let dx = x1 - x0;
    if dx == S::ZERO {
        return y0;
    }
    let t = (x - x0) / dx;
    let (_, cos_pi_t) = (t * S::PI).sincos();
    let eased = (S::ONE - cos_pi_t) / S::from_f32(2.0);
    y0 + (y1 - y0) * eased
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_matches_endpoints() {
        assert!((linear_interp(0.0f32, 0.0, 1.0, 10.0, 0.0) - 0.0).abs() < 1e-6);
        assert!((linear_interp(0.0f32, 0.0, 1.0, 10.0, 1.0) - 10.0).abs() < 1e-6);
        assert!((linear_interp(0.0f32, 0.0, 1.0, 10.0, 0.5) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn parabolic_recovers_a_known_quadratic() {
        // y = x^2 through (0,0), (1,1), (2,4); evaluate at x=1.5 -> 2.25
        let y = parabolic_interp(0.0f32, 0.0, 1.0, 1.0, 2.0, 4.0, 1.5);
        assert!((y - 2.25).abs() < 1e-3);
    }

    #[test]
    fn cosine_matches_endpoints() {
        let y0 = cosine_interp(0.0f32, 0.0, 1.0, 10.0, 0.0);
        let y1 = cosine_interp(0.0f32, 0.0, 1.0, 10.0, 1.0);
        assert!((y0 - 0.0).abs() < 1e-2);
        assert!((y1 - 10.0).abs() < 1e-2);
    }
}
