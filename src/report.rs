//! Printable summary and JSON report of one analysis
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{LeafError, LeafResult};
use crate::metrics::{self, HealthMetrics};
use crate::overlay::to_hex_color;
use crate::session::AnalysisOutcome;

#[derive(Debug, Serialize)]
pub struct DetectionSummary {
    pub class: String,
    pub confidence_percent: i32,
    pub color: String,
    /// x, y, width, height of the drawn outline
    pub bbox: [i32; 4],
}

#[derive(Debug, Serialize)]
pub struct MetricsReport {
    #[serde(flatten)]
    pub values: HealthMetrics,
    pub health_color: Option<&'static str>,
    pub disease_color: Option<&'static str>,
    /// Always true: the values come from a heuristic, not a measurement
    pub heuristic: bool,
}

#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub image: PathBuf,
    pub visualization: Option<PathBuf>,
    pub detections: Vec<DetectionSummary>,
    pub metrics: MetricsReport,
    pub warnings: Vec<String>,
    pub raw: serde_json::Value,
}

impl AnalysisReport {
    pub fn new(image: &Path, visualization: Option<&Path>, outcome: &AnalysisOutcome) -> Self {
        let detections = outcome
            .visualization
            .boxes
            .iter()
            .zip(outcome.response.detections.iter())
            .map(|(drawn, detection)| DetectionSummary {
                class: detection.class_label.clone(),
                confidence_percent: detection.confidence_percent(),
                color: to_hex_color(drawn.color),
                bbox: [
                    drawn.outline.x,
                    drawn.outline.y,
                    drawn.outline.width as i32,
                    drawn.outline.height as i32,
                ],
            })
            .collect();

        let values = outcome.metrics;
        Self {
            image: image.to_path_buf(),
            visualization: visualization.map(Path::to_path_buf),
            detections,
            metrics: MetricsReport {
                values,
                health_color: values.health.map(metrics::health_grade_color),
                disease_color: values.disease_probability.map(metrics::disease_grade_color),
                heuristic: true,
            },
            warnings: outcome.response.warnings.clone(),
            raw: outcome.response.raw.clone(),
        }
    }

    pub fn to_json(&self) -> LeafResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub async fn save(&self, path: &Path) -> LeafResult<()> {
        let json = self.to_json()?;
        tokio::fs::write(path, json).await.map_err(|source| LeafError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Human-readable summary for the terminal
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        if self.detections.is_empty() {
            lines.push("No objects detected in the image.".to_string());
        } else {
            lines.push(format!("Detected {} object(s):", self.detections.len()));
            for d in &self.detections {
                lines.push(format!("  - {} (Confidence: {}%)", d.class, d.confidence_percent));
            }
        }

        let m = &self.metrics.values;
        lines.push(String::new());
        lines.push("Leaf analysis metrics (heuristic estimates):".to_string());
        lines.push(format!("  Overall Health:      {}", metrics::format_metric(m.health)));
        lines.push(format!("  Disease Probability: {}", metrics::format_metric(m.disease_probability)));
        lines.push(format!("  Chlorophyll Content: {}", metrics::format_metric(m.chlorophyll)));
        lines.push(format!("  Nitrogen Level:      {}", metrics::format_metric(m.nitrogen)));
        lines.push(format!("  Moisture Content:    {}", metrics::format_metric(m.moisture)));

        if let Some(path) = &self.visualization {
            lines.push(String::new());
            lines.push(format!("Visualization written to {}", path.display()));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::DetectionResponse;
    use crate::overlay::OverlayStyle;
    use crate::render::render_visualization;
    use image::RgbaImage;

    fn outcome(body: &str) -> AnalysisOutcome {
        let response = body.parse::<DetectionResponse>().unwrap();
        let visualization = render_visualization(&RgbaImage::new(50, 50), &response.detections, &OverlayStyle::default());
        let metrics = metrics::estimate(Some(&response.detections), &mut fastrand::Rng::with_seed(5));
        AnalysisOutcome { response, visualization, metrics }
    }

    #[test]
    fn test_report_lists_detections_with_colors() {
        let outcome = outcome(
            r#"{"predictions": [
                {"class": "EarlyBlight", "confidence": 0.66, "x": 25, "y": 30, "width": 10, "height": 8}
            ]}"#,
        );
        let report = AnalysisReport::new(Path::new("leaf.jpg"), Some(Path::new("leaf_analysis.png")), &outcome);

        assert_eq!(report.detections.len(), 1);
        assert_eq!(report.detections[0].color, "#FF5500");
        assert_eq!(report.detections[0].bbox, [20, 26, 10, 8]);
        assert_eq!(report.metrics.disease_color, Some("#f97316"));

        let summary = report.summary();
        assert!(summary.contains("Detected 1 object(s):"));
        assert!(summary.contains("EarlyBlight (Confidence: 66%)"));
        assert!(summary.contains("Disease Probability: 66.0%"));
        assert!(summary.contains("Chlorophyll Content: ?%"));

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["metrics"]["heuristic"], true);
        assert_eq!(json["metrics"]["chlorophyll"], serde_json::Value::Null);
        assert_eq!(json["raw"]["predictions"][0]["class"], "EarlyBlight");
    }

    #[test]
    fn test_empty_report() {
        let outcome = outcome(r#"{"predictions": []}"#);
        let report = AnalysisReport::new(Path::new("leaf.jpg"), None, &outcome);
        let summary = report.summary();
        assert!(summary.contains("No objects detected in the image."));
        assert!(summary.contains("Overall Health:      ?%"));
        assert!(report.metrics.health_color.is_none());
    }
}
