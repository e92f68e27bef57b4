//! Takeoff session configuration
//!
//! The item catalog, scale presets and drawing defaults a session starts
//! with. Configuration can be loaded from a JSON file or built in code.

use crate::annotation::{AnnotationKind, Color};
use crate::measurement::{UNIT_EACH, UNIT_LINEAR_FEET, UNIT_SQUARE_FEET};
use crate::scale::{self, ScalePreset, ScaleRegistry};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Error types for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Scale(#[from] scale::ScaleError),

    #[error("duplicate item id: {0}")]
    DuplicateItem(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// What a takeoff item measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementType {
    Count,
    Linear,
    Area,
}

impl MeasurementType {
    /// Drawing tool used to take off this kind of item
    pub fn tool_kind(self) -> AnnotationKind {
        match self {
            MeasurementType::Count => AnnotationKind::Count,
            MeasurementType::Linear => AnnotationKind::Polyline,
            MeasurementType::Area => AnnotationKind::Polygon,
        }
    }

    pub fn default_unit(self) -> &'static str {
        match self {
            MeasurementType::Count => UNIT_EACH,
            MeasurementType::Linear => UNIT_LINEAR_FEET,
            MeasurementType::Area => UNIT_SQUARE_FEET,
        }
    }

    /// Measurement type produced by an annotation kind
    pub fn for_kind(kind: AnnotationKind) -> Self {
        match kind {
            AnnotationKind::Count => MeasurementType::Count,
            AnnotationKind::Polyline => MeasurementType::Linear,
            AnnotationKind::Polygon => MeasurementType::Area,
        }
    }
}

/// A catalog item that annotations are taken off against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakeoffItemConfig {
    pub id: String,
    pub label: String,
    pub color: Color,
    #[serde(rename = "type")]
    pub measurement: MeasurementType,
}

impl TakeoffItemConfig {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        color: Color,
        measurement: MeasurementType,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            color,
            measurement,
        }
    }
}

/// Configuration for a takeoff session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TakeoffConfig {
    /// Items available for takeoff
    pub items: Vec<TakeoffItemConfig>,
    /// Available scale presets, in display order
    pub scale_presets: Vec<ScalePreset>,
    /// Preset used for pages without an explicit scale
    pub default_scale_id: Option<String>,
    /// Stroke width for committed polylines
    pub default_stroke_width: f64,
    /// Stroke width for committed polygons
    pub polygon_stroke_width: f64,
    /// Fill opacity for committed polygons
    pub default_fill_opacity: f64,
    /// Side of the count marker box, in viewport pixels
    pub marker_size: f64,
    /// Re-arm the same tool after each commit
    pub keep_tool_armed: bool,
}

impl Default for TakeoffConfig {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            scale_presets: scale::default_presets(),
            default_scale_id: Some(scale::DEFAULT_SCALE_ID.to_owned()),
            default_stroke_width: 3.0,
            polygon_stroke_width: 2.0,
            default_fill_opacity: 0.2,
            marker_size: 24.0,
            keep_tool_armed: true,
        }
    }
}

impl TakeoffConfig {
    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        let config: TakeoffConfig = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check item ids are unique and the presets form a valid registry
    pub fn validate(&self) -> ConfigResult<()> {
        for (i, item) in self.items.iter().enumerate() {
            if self.items[..i].iter().any(|other| other.id == item.id) {
                return Err(ConfigError::DuplicateItem(item.id.clone()));
            }
        }
        self.scale_registry()?;
        Ok(())
    }

    /// Build the scale registry described by this configuration
    pub fn scale_registry(&self) -> ConfigResult<ScaleRegistry> {
        Ok(ScaleRegistry::new(
            self.scale_presets.clone(),
            self.default_scale_id.clone(),
        )?)
    }

    pub fn item(&self, id: &str) -> Option<&TakeoffItemConfig> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn with_items(mut self, items: Vec<TakeoffItemConfig>) -> Self {
        self.items = items;
        self
    }
}
