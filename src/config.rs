use std::time::Duration;
use log::warn;

use crate::overlay::{self, ClassColorRule, OverlayStyle};
use crate::settings::UserSettings;

// Default values for configuration
// These serve as fallback values for settings the user did not specify
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_analysis";
pub const MIN_FONT_SIZE: f32 = 6.0;
pub const MAX_FONT_SIZE: f32 = 96.0;

/// Runtime configuration resolved from user settings and command line overrides
#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub overlay: OverlayStyle,
    pub output_suffix: String,
}

impl Config {
    pub fn from_settings(settings: &UserSettings, backend_override: Option<&str>) -> Self {
        let backend_url = backend_override
            .map(str::to_string)
            .unwrap_or_else(|| settings.backend_url.clone());

        let mut style = OverlayStyle::default();

        if settings.stroke_width == 0 || settings.stroke_width > overlay::MAX_STROKE_WIDTH {
            warn!("stroke_width {} out of range 1..={}, using {}", settings.stroke_width, overlay::MAX_STROKE_WIDTH, overlay::DEFAULT_STROKE_WIDTH);
        } else {
            style.stroke_width = settings.stroke_width;
        }

        if (MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&settings.font_size) {
            style.font_size = settings.font_size;
        } else {
            warn!("font_size {} out of range {}..={}, using {}", settings.font_size, MIN_FONT_SIZE, MAX_FONT_SIZE, overlay::DEFAULT_FONT_SIZE);
        }

        if !settings.class_colors.is_empty() {
            let rules: Vec<ClassColorRule> = settings
                .class_colors
                .iter()
                .filter_map(|rule| match overlay::parse_hex_color(&rule.color) {
                    Some(color) if !rule.keyword.trim().is_empty() => Some(ClassColorRule::new(rule.keyword.trim(), color)),
                    _ => {
                        warn!("Ignoring class color rule '{}' -> '{}'", rule.keyword, rule.color);
                        None
                    }
                })
                .collect();
            if rules.is_empty() {
                warn!("No usable class color rules in settings, keeping built-in rules");
            } else {
                style.rules = rules;
            }
        }

        match overlay::parse_hex_color(&settings.fallback_color) {
            Some(color) => style.fallback_color = color,
            None => warn!("Invalid fallback_color '{}', using {}", settings.fallback_color, overlay::to_hex_color(overlay::DEFAULT_FALLBACK_COLOR)),
        }

        Self {
            backend_url,
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs.max(1)),
            request_timeout: Duration::from_secs(settings.request_timeout_secs.max(1)),
            overlay: style,
            output_suffix: settings.output_suffix.clone(),
        }
    }
}
