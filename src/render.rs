//! Visualization pipeline: thermal recolor first, then the detection overlay.
//!
//! Runs synchronously once the source image is decoded. Both stages are timed
//! and logged at debug level.

use image::RgbaImage;
use log::info;

use crate::detection::DetectionSet;
use crate::overlay::{self, DrawnBox, OverlayStyle};
use crate::thermal;
use crate::utils::timing::{ScopedTimer, TimingStats};

/// Rendered output and the geometry drawn onto it
#[derive(Debug, Clone)]
pub struct Visualization {
    pub image: RgbaImage,
    pub boxes: Vec<DrawnBox>,
}

pub fn render_visualization(source: &RgbaImage, detections: &DetectionSet, style: &OverlayStyle) -> Visualization {
    let mut thermal_stats = TimingStats::new("Thermal recolor");
    let mut overlay_stats = TimingStats::new("Detection overlay");

    let mut image = {
        let _timer = ScopedTimer::new(&mut thermal_stats);
        thermal::apply_thermal(source)
    };

    let boxes = {
        let _timer = ScopedTimer::new(&mut overlay_stats);
        overlay::render_overlay(&mut image, detections, style)
    };

    info!(
        "Rendered {}x{} visualization with {} boxes in {:.2}ms",
        image.width(),
        image.height(),
        boxes.len(),
        thermal_stats.average_ms() + overlay_stats.average_ms()
    );

    Visualization { image, boxes }
}
