//! Detection overlay rendering
//!
//! Draws an outlined box and a filled label tab for every detection, in
//! response order, straight onto an RGBA buffer. Later detections overwrite
//! earlier ones. Boxes and tabs are opaque; only glyph edges are antialiased.
use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use log::{debug, error};
use once_cell::sync::Lazy;

use crate::detection::{Detection, DetectionSet, MAX_COORDINATE};

pub const DEFAULT_STROKE_WIDTH: u32 = 3;
pub const MAX_STROKE_WIDTH: u32 = 64;
pub const DEFAULT_LABEL_HEIGHT: u32 = 25;
pub const DEFAULT_LABEL_PADDING: u32 = 5;
pub const DEFAULT_TEXT_BASELINE_OFFSET: u32 = 7;
/// Label font size in pixels
pub const DEFAULT_FONT_SIZE: f32 = 16.0;
pub const DEFAULT_FALLBACK_COLOR: Rgba<u8> = Rgba([0x00, 0x88, 0xFF, 0xFF]);
pub const LABEL_TEXT_COLOR: Rgba<u8> = Rgba([0xFF, 0xFF, 0xFF, 0xFF]);

static LABEL_FONT: Lazy<Option<FontArc>> = Lazy::new(|| {
    match FontArc::try_from_slice(include_bytes!("../assets/fonts/DejaVuSans.ttf")) {
        Ok(font) => Some(font),
        Err(e) => {
            error!("Failed to load embedded label font, labels will have no text: {}", e);
            None
        }
    }
});

pub fn label_font() -> Option<&'static FontArc> {
    LABEL_FONT.as_ref()
}

/// Keyword to color rule; a label matches if it contains the keyword, ignoring case
#[derive(Debug, Clone, PartialEq)]
pub struct ClassColorRule {
    pub keyword: String,
    pub color: Rgba<u8>,
}

impl ClassColorRule {
    pub fn new(keyword: &str, color: Rgba<u8>) -> Self {
        Self {
            keyword: keyword.to_lowercase(),
            color,
        }
    }
}

/// Built-in rules, checked top to bottom
pub fn default_class_rules() -> Vec<ClassColorRule> {
    vec![
        ClassColorRule::new("leaf", Rgba([0x00, 0xFF, 0x00, 0xFF])),
        ClassColorRule::new("disease", Rgba([0xFF, 0x00, 0x00, 0xFF])),
        ClassColorRule::new("healthy", Rgba([0x00, 0xAA, 0x00, 0xFF])),
        ClassColorRule::new("blight", Rgba([0xFF, 0x55, 0x00, 0xFF])),
        ClassColorRule::new("spot", Rgba([0xFF, 0xAA, 0x00, 0xFF])),
    ]
}

/// Parse `#RRGGBB` or `RRGGBB` into an opaque color
pub fn parse_hex_color(s: &str) -> Option<Rgba<u8>> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Rgba([channel(0)?, channel(2)?, channel(4)?, 0xFF]))
}

pub fn to_hex_color(color: Rgba<u8>) -> String {
    format!("#{:02X}{:02X}{:02X}", color.0[0], color.0[1], color.0[2])
}

#[derive(Debug, Clone)]
pub struct OverlayStyle {
    pub rules: Vec<ClassColorRule>,
    pub fallback_color: Rgba<u8>,
    pub stroke_width: u32,
    pub label_height: u32,
    pub label_padding: u32,
    /// Distance from the box top up to the text baseline
    pub text_baseline_offset: u32,
    pub font_size: f32,
    pub text_color: Rgba<u8>,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            rules: default_class_rules(),
            fallback_color: DEFAULT_FALLBACK_COLOR,
            stroke_width: DEFAULT_STROKE_WIDTH,
            label_height: DEFAULT_LABEL_HEIGHT,
            label_padding: DEFAULT_LABEL_PADDING,
            text_baseline_offset: DEFAULT_TEXT_BASELINE_OFFSET,
            font_size: DEFAULT_FONT_SIZE,
            text_color: LABEL_TEXT_COLOR,
        }
    }
}

/// First rule whose keyword occurs in `label` wins
pub fn class_color(label: &str, rules: &[ClassColorRule], fallback: Rgba<u8>) -> Rgba<u8> {
    let lower = label.to_lowercase();
    rules
        .iter()
        .find(|rule| lower.contains(&rule.keyword))
        .map(|rule| rule.color)
        .unwrap_or(fallback)
}

pub fn label_text(detection: &Detection) -> String {
    format!("{} ({}%)", detection.class_label, detection.confidence_percent())
}

/// Integer pixel rectangle; may extend past the image edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    fn intersects(&self, img: &RgbaImage) -> bool {
        let (x, y) = (self.x as i64, self.y as i64);
        x < img.width() as i64
            && y < img.height() as i64
            && x + self.width as i64 > 0
            && y + self.height as i64 > 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelLayout {
    pub text: String,
    pub background: PixelRect,
    /// Top of the text line as imageproc places it (baseline minus ascent)
    pub text_origin: (i32, i32),
}

/// What was drawn for one detection
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnBox {
    pub class_label: String,
    pub color: Rgba<u8>,
    pub outline: PixelRect,
    pub label: LabelLayout,
}

fn clamp_coordinate(v: f32) -> f32 {
    if v.is_finite() {
        v.clamp(-MAX_COORDINATE, MAX_COORDINATE)
    } else {
        0.0
    }
}

/// Snap a detection's box to the pixel grid, never thinner than one pixel.
/// Values beyond `MAX_COORDINATE` are clamped so later offsets cannot overflow.
pub fn box_rect(detection: &Detection) -> PixelRect {
    let bbox = detection.bbox();
    PixelRect {
        x: clamp_coordinate(bbox.x).round() as i32,
        y: clamp_coordinate(bbox.y).round() as i32,
        width: clamp_coordinate(bbox.width).round().max(1.0) as u32,
        height: clamp_coordinate(bbox.height).round().max(1.0) as u32,
    }
}

/// Rendered width of `text` and the font ascent, both in pixels
pub fn measure_text(text: &str, font_size: f32) -> (u32, i32) {
    match label_font() {
        Some(font) => {
            let scale = PxScale::from(font_size);
            let (width, _) = text_size(scale, font, text);
            let ascent = font.as_scaled(scale).ascent().round() as i32;
            (width, ascent)
        }
        None => (0, font_size.round() as i32),
    }
}

/// Place the label tab directly above the box
pub fn layout_label(detection: &Detection, style: &OverlayStyle) -> LabelLayout {
    let outline = box_rect(detection);
    let text = label_text(detection);
    let (text_width, ascent) = measure_text(&text, style.font_size);
    let baseline = outline.y.saturating_sub(style.text_baseline_offset as i32);

    LabelLayout {
        background: PixelRect {
            x: outline.x,
            y: outline.y.saturating_sub(style.label_height as i32),
            width: text_width.saturating_add(style.label_padding.saturating_mul(2)),
            height: style.label_height,
        },
        text_origin: (
            outline.x.saturating_add(style.label_padding as i32),
            baseline.saturating_sub(ascent),
        ),
        text,
    }
}

/// Fill the part of `rect` that overlaps the image
fn fill_clipped(img: &mut RgbaImage, rect: PixelRect, color: Rgba<u8>) {
    if rect.width == 0 || rect.height == 0 || !rect.intersects(img) {
        return;
    }
    draw_filled_rect_mut(img, Rect::at(rect.x, rect.y).of_size(rect.width, rect.height), color);
}

/// Stroke centered on the box edge, `stroke_width` pixels thick.
///
/// Drawn as four clipped strips so far off-canvas boxes cost nothing.
fn draw_outline(img: &mut RgbaImage, outline: PixelRect, stroke_width: u32, color: Rgba<u8>) {
    let stroke = stroke_width.min(MAX_STROKE_WIDTH);
    if stroke == 0 {
        return;
    }
    let half = stroke / 2;
    let outer = PixelRect {
        x: outline.x.saturating_sub(half as i32),
        y: outline.y.saturating_sub(half as i32),
        width: outline.width.saturating_add(2 * half),
        height: outline.height.saturating_add(2 * half),
    };
    let across = stroke.min(outer.width);
    let down = stroke.min(outer.height);

    let top = PixelRect { height: down, ..outer };
    let bottom = PixelRect { y: outer.y.saturating_add((outer.height - down) as i32), height: down, ..outer };
    let left = PixelRect { width: across, ..outer };
    let right = PixelRect { x: outer.x.saturating_add((outer.width - across) as i32), width: across, ..outer };
    for strip in [top, bottom, left, right] {
        fill_clipped(img, strip, color);
    }
}

pub fn draw_detection(img: &mut RgbaImage, detection: &Detection, style: &OverlayStyle) -> DrawnBox {
    let color = class_color(&detection.class_label, &style.rules, style.fallback_color);
    let outline = box_rect(detection);
    draw_outline(img, outline, style.stroke_width, color);

    let label = layout_label(detection, style);
    let bg = label.background;
    if bg.width > 0 && bg.height > 0 && bg.intersects(img) {
        fill_clipped(img, bg, color);
        if let Some(font) = label_font() {
            draw_text_mut(
                img,
                style.text_color,
                label.text_origin.0,
                label.text_origin.1,
                PxScale::from(style.font_size),
                font,
                &label.text,
            );
        }
    }

    DrawnBox {
        class_label: detection.class_label.clone(),
        color,
        outline,
        label,
    }
}

/// Draw every detection in order. An empty set leaves the image untouched.
pub fn render_overlay(img: &mut RgbaImage, detections: &DetectionSet, style: &OverlayStyle) -> Vec<DrawnBox> {
    let drawn: Vec<DrawnBox> = detections
        .iter()
        .map(|detection| draw_detection(img, detection, style))
        .collect();
    debug!("Drew {} detection overlays", drawn.len());
    drawn
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEAF_GREEN: Rgba<u8> = Rgba([0x00, 0xFF, 0x00, 0xFF]);
    const DISEASE_RED: Rgba<u8> = Rgba([0xFF, 0x00, 0x00, 0xFF]);

    #[test]
    fn test_embedded_font_loads() {
        assert!(label_font().is_some());
        let (width, ascent) = measure_text("leaf (88%)", DEFAULT_FONT_SIZE);
        assert!(width > 40 && width < 160, "unexpected width {}", width);
        assert!(ascent > 8 && ascent <= 16, "unexpected ascent {}", ascent);
    }

    #[test]
    fn test_class_color_first_match_wins() {
        let rules = default_class_rules();
        assert_eq!(class_color("EarlyBlight", &rules, DEFAULT_FALLBACK_COLOR), Rgba([0xFF, 0x55, 0x00, 0xFF]));
        assert_eq!(class_color("Leaf Spot", &rules, DEFAULT_FALLBACK_COLOR), LEAF_GREEN);
        assert_eq!(class_color("healthy", &rules, DEFAULT_FALLBACK_COLOR), Rgba([0x00, 0xAA, 0x00, 0xFF]));
        assert_eq!(class_color("DISEASED", &rules, DEFAULT_FALLBACK_COLOR), DISEASE_RED);
        assert_eq!(class_color("stem", &rules, DEFAULT_FALLBACK_COLOR), DEFAULT_FALLBACK_COLOR);
    }

    #[test]
    fn test_custom_rule_order() {
        let rules = vec![
            ClassColorRule::new("Healthy", Rgba([1, 2, 3, 255])),
            ClassColorRule::new("leaf", LEAF_GREEN),
        ];
        assert_eq!(class_color("healthy leaf", &rules, DEFAULT_FALLBACK_COLOR), Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn test_hex_colors() {
        assert_eq!(parse_hex_color("#00AA00"), Some(Rgba([0, 0xAA, 0, 0xFF])));
        assert_eq!(parse_hex_color("ff5500"), Some(Rgba([0xFF, 0x55, 0, 0xFF])));
        assert_eq!(parse_hex_color("#12345"), None);
        assert_eq!(parse_hex_color("#GG0000"), None);
        assert_eq!(to_hex_color(Rgba([0, 0x88, 0xFF, 0xFF])), "#0088FF");
    }

    #[test]
    fn test_label_layout_above_box() {
        let det = Detection::new("leaf", 0.876, 100.0, 100.0, 40.0, 20.0);
        let layout = layout_label(&det, &OverlayStyle::default());
        let (text_width, ascent) = measure_text("leaf (88%)", DEFAULT_FONT_SIZE);

        assert_eq!(layout.text, "leaf (88%)");
        assert_eq!(
            layout.background,
            PixelRect { x: 80, y: 65, width: text_width + 10, height: 25 }
        );
        // Baseline 7px above the box top at y = 90
        assert_eq!(layout.text_origin, (85, 83 - ascent));
    }

    #[test]
    fn test_outline_and_label_are_drawn() {
        let mut img = RgbaImage::new(200, 200);
        let det = Detection::new("disease", 0.5, 70.0, 80.0, 40.0, 40.0);
        let drawn = draw_detection(&mut img, &det, &OverlayStyle::default());

        assert_eq!(drawn.outline, PixelRect { x: 50, y: 60, width: 40, height: 40 });
        // Stroke covers one pixel either side of the edge
        assert_eq!(*img.get_pixel(49, 70), DISEASE_RED);
        assert_eq!(*img.get_pixel(50, 70), DISEASE_RED);
        assert_eq!(*img.get_pixel(51, 70), DISEASE_RED);
        assert_eq!(img.get_pixel(52, 70).0, [0, 0, 0, 0]);
        assert_eq!(img.get_pixel(70, 80).0, [0, 0, 0, 0]);
        // Top-left corner of the label tab, left of the text padding
        assert_eq!(*img.get_pixel(51, 36), DISEASE_RED);
        // Glyphs lighten part of the tab
        let bg = drawn.label.background;
        let text_pixels = img
            .enumerate_pixels()
            .filter(|(x, y, px)| {
                (*x as i32) >= bg.x
                    && (*x as i32) < bg.x + bg.width as i32
                    && (*y as i32) >= bg.y
                    && (*y as i32) < bg.y + bg.height as i32
                    && **px != DISEASE_RED
            })
            .count();
        assert!(text_pixels > 0);
    }

    #[test]
    fn test_later_detection_wins_overlap() {
        let mut img = RgbaImage::new(100, 100);
        let set = DetectionSet::new(vec![
            Detection::new("disease", 0.9, 50.0, 50.0, 30.0, 30.0),
            Detection::new("leaf", 0.9, 50.0, 50.0, 30.0, 30.0),
        ]);
        let drawn = render_overlay(&mut img, &set, &OverlayStyle::default());
        assert_eq!(drawn.len(), 2);

        for x in 35..65 {
            assert_eq!(*img.get_pixel(x, 35), LEAF_GREEN);
            assert_eq!(*img.get_pixel(x, 64), LEAF_GREEN);
        }
        // The second tab is narrower, so only the stroke area is compared
        for y in 34..=66 {
            assert_ne!(*img.get_pixel(34, y), DISEASE_RED);
            assert_ne!(*img.get_pixel(65, y), DISEASE_RED);
        }
    }

    #[test]
    fn test_empty_set_draws_nothing() {
        let mut img = RgbaImage::from_pixel(8, 8, Rgba([9, 9, 9, 255]));
        let before = img.clone();
        let drawn = render_overlay(&mut img, &DetectionSet::default(), &OverlayStyle::default());
        assert!(drawn.is_empty());
        assert_eq!(img, before);
    }

    #[test]
    fn test_box_partly_off_canvas_is_clipped() {
        let mut img = RgbaImage::new(10, 10);
        let det = Detection::new("spot", 0.3, 0.0, 0.0, 6.0, 6.0);
        let drawn = draw_detection(&mut img, &det, &OverlayStyle::default());
        assert_eq!(drawn.outline.x, -3);
        assert_eq!(*img.get_pixel(2, 0), Rgba([0xFF, 0xAA, 0x00, 0xFF]));
    }

    #[test]
    fn test_huge_centers_are_clamped_and_skipped() {
        let style = OverlayStyle::default();
        for det in [
            Detection::new("leaf", 0.5, -3e9, 5.0, 4.0, 4.0),
            Detection::new("leaf", 0.5, 5.0, -3e9, 4.0, 4.0),
            Detection::new("leaf", 0.5, 3e9, 3e9, 4.0, 4.0),
        ] {
            let mut img = RgbaImage::new(10, 10);
            let drawn = draw_detection(&mut img, &det, &style);
            assert!(drawn.outline.x.abs() <= MAX_COORDINATE as i32);
            assert!(drawn.outline.y.abs() <= MAX_COORDINATE as i32);
            assert!(img.pixels().all(|px| px.0 == [0, 0, 0, 0]));
        }
    }

    #[test]
    fn test_huge_size_is_clamped() {
        let mut img = RgbaImage::new(10, 10);
        let det = Detection::new("leaf", 0.5, 5.0, 5.0, 1e12, 4.0);
        let drawn = draw_detection(&mut img, &det, &OverlayStyle::default());
        assert_eq!(drawn.outline.width, MAX_COORDINATE as u32);
        assert_eq!(drawn.outline.x, -(MAX_COORDINATE as i32));

        let det = Detection::new("leaf", 0.5, 5.0, 5.0, f32::MAX, f32::MAX);
        let drawn = draw_detection(&mut img, &det, &OverlayStyle::default());
        assert_eq!(drawn.outline.height, MAX_COORDINATE as u32);
    }
}
