//! Code health index over CK class metrics.
//!
//! For each class, `wmc`, `dit`, `cbo` and `lcom*` are inverted as
//! `1 / (x + 1)` and averaged together with `noc`, `rfc` and `loc`. A release
//! scores the mean over its classes. Missing values are left out of both
//! means.

use crate::tools::ck::{CK_METRICS, CkClass};

/// Metrics inverted before averaging.
pub const INVERTED_METRICS: [&str; 4] = ["wmc", "dit", "cbo", "lcom*"];

/// Health score of one class, or `None` if it has no values at all.
pub fn class_health(class: &CkClass) -> Option<f64> {
    let adjusted: Vec<f64> = CK_METRICS
        .iter()
        .zip(class.values)
        .filter_map(|((metric, _), value)| {
            let value = value?;
            Some(if INVERTED_METRICS.contains(metric) {
                1.0 / (value + 1.0)
            } else {
                value
            })
        })
        .collect();
    mean(&adjusted)
}

/// Mean health over the classes of a release.
pub fn release_health(classes: &[CkClass]) -> Option<f64> {
    let scores: Vec<f64> = classes.iter().filter_map(class_health).collect();
    mean(&scores)
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(values: [Option<f64>; 7]) -> CkClass {
        CkClass {
            class: None,
            values,
        }
    }

    #[test]
    fn inverts_complexity_metrics() {
        // wmc dit noc cbo lcom* rfc loc
        let c = class([
            Some(3.0),
            Some(0.0),
            Some(2.0),
            Some(1.0),
            Some(0.0),
            Some(4.0),
            Some(10.0),
        ]);
        // 0.25 + 1 + 2 + 0.5 + 1 + 4 + 10 = 18.75
        let expected = 18.75 / 7.0;
        assert!((class_health(&c).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn missing_values_are_skipped() {
        let c = class([Some(1.0), None, None, None, None, None, Some(3.0)]);
        // (0.5 + 3) / 2
        assert!((class_health(&c).unwrap() - 1.75).abs() < 1e-12);
        assert!(class_health(&class([None; 7])).is_none());
    }

    #[test]
    fn release_mean_over_classes() {
        let a = class([Some(0.0), Some(0.0), Some(0.0), Some(0.0), Some(0.0), Some(0.0), Some(0.0)]);
        let b = class([None, None, None, None, None, None, Some(8.0)]);
        // a: 4/7, b: 8
        let expected = (4.0 / 7.0 + 8.0) / 2.0;
        assert!((release_health(&[a, b]).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn empty_release_has_no_score() {
        assert!(release_health(&[]).is_none());
    }
}
