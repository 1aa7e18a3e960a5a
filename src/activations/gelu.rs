use ndarray::Array1;

/// `sqrt(2 / pi)`
const SQRT_2_OVER_PI: f32 = 0.797_884_6;
const CUBIC: f32 = 0.044_715;

/// GELU (Gaussian Error Linear Unit) in its tanh approximation:
/// `0.5 * x * (1 + tanh(sqrt(2/pi) * (x + 0.044715 * x^3)))`
pub struct Gelu;

impl Gelu {
    fn tanh_term(x: f32) -> f32 {
        (SQRT_2_OVER_PI * (x + CUBIC * x * x * x)).tanh()
    }

    pub fn evaluate(x: f32) -> f32 {
        0.5 * x * (1.0 + Gelu::tanh_term(x))
    }

    pub fn derivative_at(x: f32) -> f32 {
        let t = Gelu::tanh_term(x);
        let d_inner = SQRT_2_OVER_PI * (1.0 + 3.0 * CUBIC * x * x);
        0.5 * (1.0 + t) + 0.5 * x * (1.0 - t * t) * d_inner
    }

    /// Channel-wise GELU in place
    pub fn apply(channels: &mut Array1<f32>) {
        channels.mapv_inplace(Gelu::evaluate);
    }

    pub fn derivative(channels: &Array1<f32>) -> Array1<f32> {
        channels.mapv(Gelu::derivative_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivative_matches_finite_difference() {
        let h = 1e-3;
        for &x in &[-2.0f32, -0.5, 0.0, 0.7, 1.8] {
            let numeric = (Gelu::evaluate(x + h) - Gelu::evaluate(x - h)) / (2.0 * h);
            assert!((Gelu::derivative_at(x) - numeric).abs() < 1e-2, "x = {}", x);
        }
    }
}
