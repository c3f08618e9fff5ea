//! Detection data model and backend response parser
//!
//! The detector answers `POST /detect` with a body shaped like
//! `{"predictions": [{"class", "confidence", "x", "y", "width", "height"}, ...]}`
//! where `x`/`y` are the box center in pixels. Any other fields are ignored.
use std::path::Path;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use log::warn;

/// Largest absolute center or size accepted from the backend, in pixels
pub const MAX_COORDINATE: f32 = 1.0e8;

/// One prediction exactly as the backend sends it
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawPrediction {
    pub class: String,
    pub confidence: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Labeled, confidence-scored box in pixel units, center-anchored
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub class_label: String,
    pub confidence: f32,
    pub center_x: f32,
    pub center_y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Detection {
    pub fn new(class_label: impl Into<String>, confidence: f32, center_x: f32, center_y: f32, width: f32, height: f32) -> Self {
        Self {
            class_label: class_label.into(),
            confidence,
            center_x,
            center_y,
            width,
            height,
        }
    }

    pub fn bbox(&self) -> BoundingBox {
        BoundingBox {
            x: self.center_x - self.width / 2.0,
            y: self.center_y - self.height / 2.0,
            width: self.width,
            height: self.height,
        }
    }

    /// Confidence as a rounded integer percentage
    pub fn confidence_percent(&self) -> i32 {
        (self.confidence * 100.0).round() as i32
    }

    /// Case-insensitive substring match on the class label
    pub fn label_contains(&self, keyword: &str) -> bool {
        self.class_label.to_lowercase().contains(&keyword.to_lowercase())
    }
}

impl From<RawPrediction> for Detection {
    fn from(p: RawPrediction) -> Self {
        Detection::new(p.class, p.confidence, p.x, p.y, p.width, p.height)
    }
}

/// Detections in backend response order; later entries draw on top
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DetectionSet {
    pub detections: Vec<Detection>,
}

impl DetectionSet {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }
}

impl<'a> IntoIterator for &'a DetectionSet {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.detections.iter()
    }
}

/// Parsed `/detect` response, with the raw JSON kept for reports
#[derive(Debug, Clone)]
pub struct DetectionResponse {
    pub detections: DetectionSet,
    pub raw: serde_json::Value,
    /// Entries that were present but could not be used
    pub warnings: Vec<String>,
}

impl DetectionResponse {
    /// Parse a response from a JSON file on disk
    pub async fn from_file(path: &Path) -> Result<Self, String> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read detections file {}: {}", path.display(), e))?;

        content.parse()
    }

    /// Extract predictions from an already-parsed body.
    ///
    /// A missing or non-array `predictions` field yields an empty set.
    /// Entries that do not deserialize or carry unusable geometry are skipped
    /// and reported in `warnings`.
    pub fn from_value(raw: serde_json::Value) -> Self {
        let mut warnings = Vec::new();
        let mut detections = Vec::new();

        match raw.get("predictions") {
            Some(serde_json::Value::Array(entries)) => {
                for (index, entry) in entries.iter().enumerate() {
                    match serde_json::from_value::<RawPrediction>(entry.clone()) {
                        Ok(prediction) => {
                            if let Some(reason) = invalid_reason(&prediction) {
                                warnings.push(format!("Skipping prediction {}: {}", index, reason));
                                continue;
                            }
                            detections.push(Detection::from(prediction));
                        }
                        Err(e) => {
                            warnings.push(format!("Skipping prediction {}: {}", index, e));
                        }
                    }
                }
            }
            Some(serde_json::Value::Null) | None => {}
            Some(other) => {
                warnings.push(format!("Ignoring non-array predictions field: {}", other));
            }
        }

        for warning in &warnings {
            warn!("{}", warning);
        }

        Self {
            detections: DetectionSet::new(detections),
            raw,
            warnings,
        }
    }
}

/// Parse a response body. Fails only if the body is not JSON at all.
impl FromStr for DetectionResponse {
    type Err = String;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let raw: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| format!("Failed to parse detection JSON: {}", e))?;

        Ok(Self::from_value(raw))
    }
}

fn invalid_reason(p: &RawPrediction) -> Option<String> {
    let values = [p.confidence, p.x, p.y, p.width, p.height];
    if values.iter().any(|v| !v.is_finite()) {
        return Some("non-finite value".to_string());
    }
    if p.width < 0.0 || p.height < 0.0 {
        return Some(format!("negative size {}x{}", p.width, p.height));
    }
    if [p.x, p.y, p.width, p.height].iter().any(|v| v.abs() > MAX_COORDINATE) {
        return Some(format!(
            "geometry out of range (center {}, {} size {}x{})",
            p.x, p.y, p.width, p.height
        ));
    }
    None
}
