//! JSON configuration for measurement runs.

use crate::{AnnotationStyle, MarkerSelection, MeasureParams};
use aruco_measure_marker::MarkerDetectorParams;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Marker side length assumed when neither the config nor the caller sets one.
pub const DEFAULT_MARKER_SIZE_M: f64 = 0.10;

/// Annotated image location used when none is configured.
pub const DEFAULT_ANNOTATED_PATH: &str = "static/object_measurements.jpg";

/// File-level configuration. Every field is optional; unset fields fall back
/// to library defaults or command-line values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasureConfig {
    pub marker_size_m: Option<f64>,
    pub min_object_area_px: Option<f64>,
    pub marker_selection: Option<MarkerSelection>,
    pub exclude_markers: Option<bool>,
    pub detector: MarkerDetectorParams,
    pub annotated_path: Option<String>,
    pub font_path: Option<String>,
    pub style: AnnotationStyle,
}

impl MeasureConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Measurement parameters with unset fields filled from defaults.
    pub fn measure_params(&self) -> MeasureParams {
        let mut params = MeasureParams::new(self.marker_size_m.unwrap_or(DEFAULT_MARKER_SIZE_M));
        if let Some(v) = self.min_object_area_px {
            params.min_object_area_px = v;
        }
        if let Some(v) = self.marker_selection {
            params.marker_selection = v;
        }
        if let Some(v) = self.exclude_markers {
            params.exclude_markers = v;
        }
        params.detector = self.detector.clone();
        params
    }

    pub fn annotated_path(&self) -> &str {
        self.annotated_path
            .as_deref()
            .unwrap_or(DEFAULT_ANNOTATED_PATH)
    }
}
