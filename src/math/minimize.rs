//! Derivative-free minimizers used for point projection onto curves and
//! surfaces that have no closed-form inverse.

const GOLDEN: f64 = 0.618_033_988_749_895;

/// Minimizes `f` over `[lo, hi]`: a uniform scan with `samples` points
/// brackets the best sample, then golden-section search refines it.
///
/// Non-finite function values are treated as `+inf`.
pub fn minimize_1d<F>(f: F, lo: f64, hi: f64, samples: usize) -> f64
where
    F: Fn(f64) -> f64,
{
    let eval = |t: f64| {
        let value = f(t);
        if value.is_finite() {
            value
        } else {
            f64::INFINITY
        }
    };
    let samples = samples.max(3);
    #[allow(clippy::cast_precision_loss)]
    let step = (hi - lo) / (samples - 1) as f64;
    let mut best = 0;
    let mut best_value = f64::INFINITY;
    for i in 0..samples {
        #[allow(clippy::cast_precision_loss)]
        let value = eval(lo + step * i as f64);
        if value < best_value {
            best_value = value;
            best = i;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let mut a = (lo + step * best.saturating_sub(1) as f64).max(lo);
    #[allow(clippy::cast_precision_loss)]
    let mut b = (lo + step * (best + 1) as f64).min(hi);
    let mut c = b - GOLDEN * (b - a);
    let mut d = a + GOLDEN * (b - a);
    let mut fc = eval(c);
    let mut fd = eval(d);
    for _ in 0..80 {
        if (b - a).abs() < 1e-13 * (1.0 + a.abs()) {
            break;
        }
        if fc < fd {
            b = d;
            d = c;
            fd = fc;
            c = b - GOLDEN * (b - a);
            fc = eval(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + GOLDEN * (b - a);
            fd = eval(d);
        }
    }
    let t = 0.5 * (a + b);
    #[allow(clippy::cast_precision_loss)]
    let sampled = lo + step * best as f64;
    if eval(t) <= best_value {
        t
    } else {
        sampled
    }
}

/// Minimizes `f` over the box `[u_lo, u_hi] x [v_lo, v_hi]`: a grid scan
/// picks a start point, then a compass search with shrinking steps refines
/// it inside the box.
pub fn minimize_2d<F>(f: F, u_range: (f64, f64), v_range: (f64, f64), samples: usize) -> (f64, f64)
where
    F: Fn(f64, f64) -> f64,
{
    let eval = |u: f64, v: f64| {
        let value = f(u, v);
        if value.is_finite() {
            value
        } else {
            f64::INFINITY
        }
    };
    let (u_lo, u_hi) = u_range;
    let (v_lo, v_hi) = v_range;
    let samples = samples.max(3);
    #[allow(clippy::cast_precision_loss)]
    let du = (u_hi - u_lo) / (samples - 1) as f64;
    #[allow(clippy::cast_precision_loss)]
    let dv = (v_hi - v_lo) / (samples - 1) as f64;

    let mut best = (u_lo, v_lo);
    let mut best_value = f64::INFINITY;
    for i in 0..samples {
        for j in 0..samples {
            #[allow(clippy::cast_precision_loss)]
            let (u, v) = (u_lo + du * i as f64, v_lo + dv * j as f64);
            let value = eval(u, v);
            if value < best_value {
                best_value = value;
                best = (u, v);
            }
        }
    }

    let (mut step_u, mut step_v) = (du, dv);
    let tolerance = 1e-13 * (1.0 + (u_hi - u_lo).abs() + (v_hi - v_lo).abs());
    for _ in 0..200 {
        if step_u.abs() + step_v.abs() < tolerance {
            break;
        }
        let mut improved = false;
        for (su, sv) in [
            (1.0, 0.0),
            (-1.0, 0.0),
            (0.0, 1.0),
            (0.0, -1.0),
            (1.0, 1.0),
            (-1.0, -1.0),
            (1.0, -1.0),
            (-1.0, 1.0),
        ] {
            let u = (best.0 + su * step_u).clamp(u_lo, u_hi);
            let v = (best.1 + sv * step_v).clamp(v_lo, v_hi);
            let value = eval(u, v);
            if value < best_value {
                best_value = value;
                best = (u, v);
                improved = true;
            }
        }
        if !improved {
            step_u *= 0.5;
            step_v *= 0.5;
        }
    }
    best
}
