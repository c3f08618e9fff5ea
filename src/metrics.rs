//! Heuristic leaf health metrics.
//!
//! These numbers are placeholders derived from detector confidences plus random
//! jitter. They are not measurements of chlorophyll, nitrogen or moisture and
//! must not be presented as such. The jitter source is injected so callers can
//! seed it for reproducible output.

use serde::Serialize;

use crate::detection::DetectionSet;

const DISEASE_KEYWORDS: [&str; 3] = ["disease", "blight", "spot"];
const LEAF_KEYWORD: &str = "leaf";
/// Disease probability reported when nothing disease-like was detected
pub const BASELINE_DISEASE_PROBABILITY: f64 = 5.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HealthMetrics {
    pub chlorophyll: Option<f64>,
    pub nitrogen: Option<f64>,
    pub moisture: Option<f64>,
    pub health: Option<f64>,
    pub disease_probability: Option<f64>,
}

impl HealthMetrics {
    pub fn is_unset(&self) -> bool {
        *self == Self::default()
    }
}

fn clamp_percent(v: f64) -> f64 {
    v.clamp(0.0, 100.0)
}

/// Uniform sample in [low, high)
fn jitter(rng: &mut fastrand::Rng, low: f64, high: f64) -> f64 {
    low + rng.f64() * (high - low)
}

/// Derive illustrative metrics from a detection set.
///
/// A missing or empty set leaves every metric unset.
pub fn estimate(detections: Option<&DetectionSet>, rng: &mut fastrand::Rng) -> HealthMetrics {
    let Some(detections) = detections.filter(|set| !set.is_empty()) else {
        return HealthMetrics::default();
    };

    let disease_confidences: Vec<f64> = detections
        .iter()
        .filter(|d| DISEASE_KEYWORDS.iter().any(|k| d.label_contains(k)))
        .map(|d| d.confidence as f64)
        .collect();

    let disease_probability = if disease_confidences.is_empty() {
        BASELINE_DISEASE_PROBABILITY
    } else {
        disease_confidences.iter().sum::<f64>() / disease_confidences.len() as f64 * 100.0
    };

    let mut metrics = HealthMetrics {
        disease_probability: Some(disease_probability),
        health: Some(clamp_percent(100.0 - disease_probability - jitter(rng, 0.0, 10.0))),
        ..HealthMetrics::default()
    };

    if let Some(leaf) = detections.iter().find(|d| d.label_contains(LEAF_KEYWORD)) {
        let c = leaf.confidence as f64;
        metrics.chlorophyll = Some(clamp_percent(70.0 + c * 20.0 + jitter(rng, -5.0, 5.0)));
        metrics.nitrogen = Some(clamp_percent(65.0 + c * 25.0 + jitter(rng, -5.0, 5.0)));
        metrics.moisture = Some(clamp_percent(60.0 + c * 20.0 + jitter(rng, -7.5, 7.5)));
    }

    metrics
}

const GRADE_GREEN: &str = "#22c55e";
const GRADE_LIME: &str = "#84cc16";
const GRADE_YELLOW: &str = "#eab308";
const GRADE_ORANGE: &str = "#f97316";
const GRADE_RED: &str = "#ef4444";

/// Display color for an overall health score; higher is greener
pub fn health_grade_color(value: f64) -> &'static str {
    if value >= 80.0 {
        GRADE_GREEN
    } else if value >= 60.0 {
        GRADE_LIME
    } else if value >= 40.0 {
        GRADE_YELLOW
    } else if value >= 20.0 {
        GRADE_ORANGE
    } else {
        GRADE_RED
    }
}

/// Display color for a disease probability; higher is redder
pub fn disease_grade_color(value: f64) -> &'static str {
    if value >= 80.0 {
        GRADE_RED
    } else if value >= 60.0 {
        GRADE_ORANGE
    } else if value >= 40.0 {
        GRADE_YELLOW
    } else if value >= 20.0 {
        GRADE_LIME
    } else {
        GRADE_GREEN
    }
}

/// One decimal place with a percent sign, `?%` when unset
pub fn format_metric(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}%", v),
        None => "?%".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Detection;

    fn set(items: &[(&str, f32)]) -> DetectionSet {
        DetectionSet::new(
            items
                .iter()
                .map(|(label, conf)| Detection::new(*label, *conf, 10.0, 10.0, 4.0, 4.0))
                .collect(),
        )
    }

    fn in_range(v: Option<f64>) -> bool {
        v.map(|v| (0.0..=100.0).contains(&v)).unwrap_or(false)
    }

    #[test]
    fn test_missing_or_empty_leaves_metrics_unset() {
        let mut rng = fastrand::Rng::with_seed(1);
        assert!(estimate(None, &mut rng).is_unset());
        assert!(estimate(Some(&DetectionSet::default()), &mut rng).is_unset());
    }

    #[test]
    fn test_disease_probability_is_mean_of_matches() {
        let mut rng = fastrand::Rng::with_seed(7);
        let metrics = estimate(Some(&set(&[("Early Blight", 0.8), ("leaf spot", 0.4), ("stem", 0.99)])), &mut rng);
        let p = metrics.disease_probability.unwrap();
        assert!((p - 60.0).abs() < 1e-4, "got {}", p);
        let health = metrics.health.unwrap();
        assert!(health <= 40.0 && health > 30.0, "got {}", health);
    }

    #[test]
    fn test_baseline_without_disease() {
        let mut rng = fastrand::Rng::with_seed(3);
        let metrics = estimate(Some(&set(&[("stem", 0.9)])), &mut rng);
        assert_eq!(metrics.disease_probability, Some(BASELINE_DISEASE_PROBABILITY));
        assert!(in_range(metrics.health));
        assert!(metrics.health.unwrap() > 85.0);
        assert_eq!(metrics.chlorophyll, None);
        assert_eq!(metrics.nitrogen, None);
        assert_eq!(metrics.moisture, None);
    }

    #[test]
    fn test_leaf_metrics_bounds() {
        for seed in 0..200 {
            let mut rng = fastrand::Rng::with_seed(seed);
            let metrics = estimate(Some(&set(&[("Healthy Leaf", 1.0)])), &mut rng);
            assert!(in_range(metrics.health));
            assert!(in_range(metrics.chlorophyll));
            assert!(in_range(metrics.nitrogen));
            assert!(in_range(metrics.moisture));

            let chlorophyll = metrics.chlorophyll.unwrap();
            assert!((85.0..95.0).contains(&chlorophyll));
            // 65 + 25 + up to 5 is clamped at 100
            let nitrogen = metrics.nitrogen.unwrap();
            assert!((85.0..=100.0).contains(&nitrogen));
            let moisture = metrics.moisture.unwrap();
            assert!((72.5..87.5).contains(&moisture));
        }
    }

    #[test]
    fn test_seeded_jitter_is_reproducible() {
        let detections = set(&[("leaf", 0.6), ("spot", 0.3)]);
        let a = estimate(Some(&detections), &mut fastrand::Rng::with_seed(42));
        let b = estimate(Some(&detections), &mut fastrand::Rng::with_seed(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_grade_colors() {
        assert_eq!(health_grade_color(95.0), "#22c55e");
        assert_eq!(health_grade_color(60.0), "#84cc16");
        assert_eq!(health_grade_color(10.0), "#ef4444");
        assert_eq!(disease_grade_color(95.0), "#ef4444");
        assert_eq!(disease_grade_color(45.0), "#eab308");
        assert_eq!(disease_grade_color(5.0), "#22c55e");
    }

    #[test]
    fn test_format_metric() {
        assert_eq!(format_metric(Some(87.26)), "87.3%");
        assert_eq!(format_metric(Some(0.0)), "0.0%");
        assert_eq!(format_metric(None), "?%");
    }
}
