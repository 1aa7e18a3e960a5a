use log::warn;

use crate::value::NeuronValue;

/// Types of numerical issues
#[derive(Debug, Clone, PartialEq)]
pub enum NumericalIssue {
    NaN { count: usize },
    Infinity { count: usize },
    Overflow { count: usize },
}

/// Count NaN, infinite and near-overflow values.
///
/// A multi-channel value counts once when any of its channels is affected.
pub fn check_values<'a, V, I>(values: I) -> Vec<NumericalIssue>
where
    V: NeuronValue,
    I: IntoIterator<Item = &'a V>,
{
    let mut nan_count = 0;
    let mut inf_count = 0;
    let mut overflow_count = 0;

    for value in values {
        let norm = value.norm();
        if norm.is_nan() {
            nan_count += 1;
        } else if !value.is_finite() {
            inf_count += 1;
        } else if norm > 1e38 {
            overflow_count += 1;
        }
    }

    let mut issues = Vec::new();
    if nan_count > 0 {
        warn!("found {} NaN values", nan_count);
        issues.push(NumericalIssue::NaN { count: nan_count });
    }
    if inf_count > 0 {
        warn!("found {} infinite values", inf_count);
        issues.push(NumericalIssue::Infinity { count: inf_count });
    }
    if overflow_count > 0 {
        warn!("found {} values at overflow risk", overflow_count);
        issues.push(NumericalIssue::Overflow { count: overflow_count });
    }
    issues
}

/// Replace NaN values with `nan_replacement` and clamp infinities to `±inf_replacement`
pub fn sanitize(values: &mut [f32], nan_replacement: f32, inf_replacement: f32) {
    for x in values.iter_mut() {
        if x.is_nan() {
            *x = nan_replacement;
        } else if x.is_infinite() {
            *x = if x.is_sign_positive() { inf_replacement } else { -inf_replacement };
        }
    }
}
