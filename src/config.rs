//! Viewer configuration.
//!
//! Every field has a default, so a config file only lists what it overrides.
//! Colours are `0xRRGGBB` sRGB values, plain integers in JSON.

use std::path::Path;

use anyhow::Context as _;
use serde::Deserialize;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub clear_colour: u32,
    pub surface_colour: u32,
    pub placeholder_colour: u32,
    pub edge_colour: u32,
    pub marker_colour: u32,
    pub grid_colour: u32,
    pub marker_radius: f32,
    pub xray_opacity: f32,
    pub fov_y_degrees: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub double_click_millis: u64,
    pub double_click_slop_px: f32,
    pub grid_size: f32,
    pub grid_divisions: u32,
    pub annotation_placeholder: String,
    pub edge_threshold_degrees: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            clear_colour: 0x111111,
            surface_colour: 0xdddddd,
            placeholder_colour: 0x00ff00,
            edge_colour: 0x000000,
            marker_colour: 0xff3366,
            grid_colour: 0x333333,
            marker_radius: 0.02,
            xray_opacity: 0.5,
            fov_y_degrees: 60.0,
            z_near: 0.1,
            z_far: 1000.0,
            damping_factor: 0.05,
            rotate_speed: 0.005,
            zoom_speed: 0.95,
            pan_speed: 0.001,
            double_click_millis: 500,
            double_click_slop_px: 4.0,
            grid_size: 10.0,
            grid_divisions: 10,
            annotation_placeholder: "New annotation".to_string(),
            edge_threshold_degrees: 1.0,
        }
    }
}

impl ViewerConfig {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validated()
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading viewer config {}", path.display()))?;
        Self::from_json_str(&json)
    }

    fn validated(self) -> anyhow::Result<Self> {
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.xray_opacity),
            "xray_opacity must be within 0..=1, got {}",
            self.xray_opacity
        );
        anyhow::ensure!(
            self.z_near > 0.0 && self.z_far > self.z_near,
            "clip planes must satisfy 0 < z_near < z_far"
        );
        anyhow::ensure!(
            (0.0..1.0).contains(&self.damping_factor),
            "damping_factor must be within 0..1"
        );
        Ok(self)
    }
}

/// Converts a `0xRRGGBB` sRGB colour to linear RGB for the shaders.
pub fn linear_rgb(hex: u32) -> [f32; 3] {
    let channel = |shift: u32| {
        let c = ((hex >> shift) & 0xff) as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    [channel(16), channel(8), channel(0)]
}
