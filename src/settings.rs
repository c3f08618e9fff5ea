use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use log::{debug, info, warn, error};

use crate::config::{
    DEFAULT_BACKEND_URL, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_OUTPUT_SUFFIX, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::overlay::{DEFAULT_FONT_SIZE, DEFAULT_STROKE_WIDTH};

/// Custom keyword color; replaces the built-in rule list when any are given
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassColorSetting {
    pub keyword: String,
    /// `#RRGGBB`
    pub color: String,
}

/// User settings read from YAML; every field is optional in the file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Base URL of the detection backend
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Bounding box outline width in pixels
    #[serde(default = "default_stroke_width")]
    pub stroke_width: u32,

    /// Label font size in pixels
    #[serde(default = "default_font_size")]
    pub font_size: f32,

    /// Appended to the input file stem for the default output name
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,

    /// Ordered keyword→color rules, first match wins
    #[serde(default)]
    pub class_colors: Vec<ClassColorSetting>,

    /// Color for labels no rule matches
    #[serde(default = "default_fallback_color")]
    pub fallback_color: String,
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_stroke_width() -> u32 {
    DEFAULT_STROKE_WIDTH
}

fn default_font_size() -> f32 {
    DEFAULT_FONT_SIZE
}

fn default_output_suffix() -> String {
    DEFAULT_OUTPUT_SUFFIX.to_string()
}

fn default_fallback_color() -> String {
    "#0088FF".to_string()
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            stroke_width: default_stroke_width(),
            font_size: default_font_size(),
            output_suffix: default_output_suffix(),
            class_colors: Vec::new(),
            fallback_color: default_fallback_color(),
        }
    }
}

impl UserSettings {
    /// Get the path to the settings file
    /// On macOS: ~/Library/Application Support/LeafScope/settings.yaml
    /// On Linux: ~/.config/LeafScope/settings.yaml
    /// On Windows: C:\Users\<user>\AppData\Roaming\LeafScope\settings.yaml
    pub fn settings_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."));

        config_dir.join("LeafScope").join("settings.yaml")
    }

    /// Load settings from the YAML file
    /// If custom_path is provided, uses that path; otherwise uses the default settings path
    pub fn load(custom_path: Option<&Path>) -> Self {
        let path = match custom_path {
            Some(p) => {
                info!("Using custom settings path: {}", p.display());
                p.to_path_buf()
            }
            None => Self::settings_path(),
        };

        if !path.exists() {
            info!("Settings file not found at {:?}, using defaults", path);
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_yaml(&contents) {
                Ok(settings) => {
                    info!("Loaded settings from {:?}", path);
                    debug!("Settings: backend_url={}, stroke_width={}, font_size={}, class_colors={}",
                        settings.backend_url, settings.stroke_width, settings.font_size, settings.class_colors.len());
                    settings
                }
                Err(e) => {
                    error!("Failed to parse settings file at {:?}: {}", path, e);
                    warn!("Using default settings");
                    Self::default()
                }
            },
            Err(e) => {
                error!("Failed to read settings file at {:?}: {}", path, e);
                warn!("Using default settings");
                Self::default()
            }
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, String> {
        // An empty file deserializes to unit, not a mapping
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str::<UserSettings>(contents).map_err(|e| e.to_string())
    }

    /// Write a commented settings file. Refuses to overwrite unless `force`.
    pub fn save_to(&self, path: &Path, force: bool) -> Result<(), String> {
        if path.exists() && !force {
            return Err(format!("{} already exists (use --force to overwrite)", path.display()));
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create settings directory: {}", e))?;
            }
        }

        fs::write(path, self.to_yaml_with_comments())
            .map_err(|e| format!("Failed to write settings file: {}", e))?;

        info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Generate YAML content with comments for new files
    pub fn to_yaml_with_comments(&self) -> String {
        let class_colors = if self.class_colors.is_empty() {
            "class_colors: []\n# Example:\n# class_colors:\n#   - keyword: \"blight\"\n#     color: \"#FF5500\"\n".to_string()
        } else {
            let mut block = String::from("class_colors:\n");
            for rule in &self.class_colors {
                block.push_str(&format!("  - keyword: \"{}\"\n    color: \"{}\"\n", rule.keyword, rule.color));
            }
            block
        };

        format!(
            r#"# LeafScope User Settings
# This file is loaded automatically on every run.
# Settings specified here override the built-in defaults.

# Base URL of the detection backend (serves /health and /detect)
backend_url: "{}"

# HTTP timeouts in seconds
connect_timeout_secs: {}
request_timeout_secs: {}

# Bounding box outline width in pixels
stroke_width: {}

# Label font size in pixels
font_size: {}

# Default output file is <input stem><output_suffix>.png
output_suffix: "{}"

# Keyword color rules, checked top to bottom; a label matches when it contains
# the keyword (case-insensitive). Leave empty to use the built-in rules:
# leaf, disease, healthy, blight, spot.
{}
# Color for labels that match no rule
fallback_color: "{}"
"#,
            self.backend_url,
            self.connect_timeout_secs,
            self.request_timeout_secs,
            self.stroke_width,
            self.font_size,
            self.output_suffix,
            class_colors,
            self.fallback_color
        )
    }
}
