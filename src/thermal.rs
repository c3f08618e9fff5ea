//! Thermal false-color filter.
//!
//! Every pixel is reduced to a luminance value and mapped through a fixed
//! five-band palette, from dark blue through cyan and yellow to red-orange.
//! The mapping looks at one pixel at a time, so the image is processed in
//! parallel with rayon. Alpha passes through untouched.
//!
//! Known quirk: the palette jumps at L = 200. Band 4 ends near (200, 255, 0)
//! and band 5 starts at (255, 255, 0). Existing visualizations depend on
//! this, so it stays.

use image::RgbaImage;
use rayon::prelude::*;

/// Upper (exclusive) luminance bounds of the first four bands
const BAND_LIMITS: [f64; 4] = [50.0, 100.0, 150.0, 200.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermalBand {
    /// L < 50
    Cold,
    /// 50 <= L < 100
    Cool,
    /// 100 <= L < 150
    Mild,
    /// 150 <= L < 200
    Warm,
    /// L >= 200
    Hot,
}

/// Perceptual luminance of an RGB triple
pub fn luminance(r: u8, g: u8, b: u8) -> f64 {
    0.3 * r as f64 + 0.59 * g as f64 + 0.11 * b as f64
}

pub fn band(l: f64) -> ThermalBand {
    if l < BAND_LIMITS[0] {
        ThermalBand::Cold
    } else if l < BAND_LIMITS[1] {
        ThermalBand::Cool
    } else if l < BAND_LIMITS[2] {
        ThermalBand::Mild
    } else if l < BAND_LIMITS[3] {
        ThermalBand::Warm
    } else {
        ThermalBand::Hot
    }
}

/// Store a fractional channel value the way a canvas pixel array does:
/// clamp to [0, 255], round half to even.
fn clamp_channel(v: f64) -> u8 {
    if v.is_nan() {
        return 0;
    }
    v.clamp(0.0, 255.0).round_ties_even() as u8
}

/// Map a luminance value to its palette color
pub fn thermal_color(l: f64) -> [u8; 3] {
    match band(l) {
        ThermalBand::Cold => [0, 0, 128],
        ThermalBand::Cool => [0, clamp_channel(l), 255],
        ThermalBand::Mild => [0, 255, clamp_channel(255.0 - l)],
        ThermalBand::Warm => [clamp_channel(l), 255, 0],
        ThermalBand::Hot => [255, clamp_channel(255.0 - (l - 200.0) * 2.0), 0],
    }
}

pub fn thermal_pixel(px: [u8; 4]) -> [u8; 4] {
    let [r, g, b] = thermal_color(luminance(px[0], px[1], px[2]));
    [r, g, b, px[3]]
}

/// Recolor a whole image. The input is left as is and a new image is returned.
pub fn apply_thermal(source: &RgbaImage) -> RgbaImage {
    let (width, height) = source.dimensions();
    let mut output = RgbaImage::new(width, height);

    let src: &[u8] = source;
    let dst: &mut [u8] = &mut output;
    dst.par_chunks_exact_mut(4)
        .zip(src.par_chunks_exact(4))
        .for_each(|(out_px, in_px)| {
            out_px.copy_from_slice(&thermal_pixel([in_px[0], in_px[1], in_px[2], in_px[3]]));
        });

    output
}
