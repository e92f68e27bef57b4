//! Scale presets and per-page scale resolution
//!
//! A scale preset converts PDF points into real-world feet. PDF space is
//! fixed at 72 points per inch, so a drawing at 1" = 20' has
//! `72 / 20 = 3.6` points per foot.

use crate::annotation::Scaled;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// PDF points per inch
pub const POINTS_PER_INCH: f64 = 72.0;

/// Preset id used when a session does not configure one
pub const DEFAULT_SCALE_ID: &str = "1_20";

/// Error types for scale configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScaleError {
    #[error("scale registry needs at least one preset")]
    Empty,

    #[error("unknown scale preset: {0}")]
    UnknownPreset(String),

    #[error("duplicate scale preset id: {0}")]
    DuplicatePreset(String),

    #[error("points per foot must be positive and finite, got {0}")]
    InvalidRatio(f64),

    #[error("calibration points must be distinct and on the same page")]
    InvalidCalibration,

    #[error("unrecognized scale notation: {0:?}")]
    UnrecognizedLabel(String),
}

pub type ScaleResult<T> = Result<T, ScaleError>;

/// A named real-world-to-PDF-points ratio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalePreset {
    pub id: String,
    pub label: String,
    /// PDF points per real-world foot
    pub pixels_per_foot: f64,
}

impl ScalePreset {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        pixels_per_foot: f64,
    ) -> ScaleResult<Self> {
        if !(pixels_per_foot.is_finite() && pixels_per_foot > 0.0) {
            return Err(ScaleError::InvalidRatio(pixels_per_foot));
        }
        Ok(Self {
            id: id.into(),
            label: label.into(),
            pixels_per_foot,
        })
    }

    /// Engineering scale where one drawing inch is `feet` real-world feet
    pub fn feet_per_inch(feet: f64) -> ScaleResult<Self> {
        if !(feet.is_finite() && feet > 0.0) {
            return Err(ScaleError::InvalidRatio(feet));
        }
        Self::new(
            format!("1_{}", trim_number(feet)),
            format!("1\" = {}'", trim_number(feet)),
            POINTS_PER_INCH / feet,
        )
    }

    /// Parse an engineering scale notation like `1" = 20'` or `1"=20'`
    pub fn parse_label(label: &str) -> ScaleResult<Self> {
        let unrecognized = || ScaleError::UnrecognizedLabel(label.to_owned());
        let compact: String = label.chars().filter(|c| !c.is_whitespace()).collect();

        let rest = compact.strip_prefix("1\"=").ok_or_else(unrecognized)?;
        let feet = rest.strip_suffix('\'').ok_or_else(unrecognized)?;
        let feet: f64 = feet.parse().map_err(|_| unrecognized())?;

        Self::feet_per_inch(feet)
    }

    /// Real-world feet represented by one drawing inch
    pub fn feet_per_drawing_inch(&self) -> f64 {
        POINTS_PER_INCH / self.pixels_per_foot
    }
}

fn trim_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Common architectural/engineering presets
pub fn default_presets() -> Vec<ScalePreset> {
    [5.0, 10.0, 20.0, 30.0, 40.0, 50.0, 100.0]
        .into_iter()
        .map(|feet| ScalePreset {
            id: format!("1_{}", feet as i64),
            label: format!("1\" = {}'", feet as i64),
            pixels_per_foot: POINTS_PER_INCH / feet,
        })
        .collect()
}

/// Preset catalog plus the active preset per page
///
/// Resolution is total: a registry always holds at least one preset.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleRegistry {
    presets: Vec<ScalePreset>,
    page_scales: BTreeMap<u32, String>,
    default_id: Option<String>,
}

impl ScaleRegistry {
    /// Create a registry; fails on an empty or duplicate-id preset list
    pub fn new(presets: Vec<ScalePreset>, default_id: Option<String>) -> ScaleResult<Self> {
        if presets.is_empty() {
            return Err(ScaleError::Empty);
        }
        for (i, preset) in presets.iter().enumerate() {
            if presets[..i].iter().any(|p| p.id == preset.id) {
                return Err(ScaleError::DuplicatePreset(preset.id.clone()));
            }
        }

        Ok(Self {
            presets,
            page_scales: BTreeMap::new(),
            default_id,
        })
    }

    pub fn presets(&self) -> &[ScalePreset] {
        &self.presets
    }

    pub fn page_scales(&self) -> &BTreeMap<u32, String> {
        &self.page_scales
    }

    pub fn default_id(&self) -> Option<&str> {
        self.default_id.as_deref()
    }

    pub fn get(&self, id: &str) -> Option<&ScalePreset> {
        self.presets.iter().find(|p| p.id == id)
    }

    /// Active preset for a page
    ///
    /// Looks up the page's entry, then page 1's entry, then the configured
    /// default id. An id that names no preset falls back to the first preset.
    pub fn resolve(&self, page_number: u32) -> &ScalePreset {
        let id = self
            .page_scales
            .get(&page_number)
            .or_else(|| self.page_scales.get(&1))
            .map(String::as_str)
            .or(self.default_id.as_deref());

        match id.and_then(|id| self.get(id)) {
            Some(preset) => preset,
            None => {
                if let Some(id) = id {
                    log::warn!("scale preset {id:?} not registered; using first preset");
                }
                &self.presets[0]
            }
        }
    }

    /// Assign a preset to a page
    pub fn set_page_scale(&mut self, page_number: u32, id: &str) -> ScaleResult<()> {
        if self.get(id).is_none() {
            return Err(ScaleError::UnknownPreset(id.to_owned()));
        }
        log::debug!("page {page_number} scale set to {id}");
        self.page_scales.insert(page_number, id.to_owned());
        Ok(())
    }

    /// Restore raw page scale entries (e.g. from an import), keeping unknown ids
    pub fn load_page_scales(&mut self, page_scales: BTreeMap<u32, String>) {
        self.page_scales = page_scales;
    }

    pub fn clear_page_scale(&mut self, page_number: u32) -> Option<String> {
        self.page_scales.remove(&page_number)
    }

    /// Register a session-specific preset
    pub fn add_custom(&mut self, preset: ScalePreset) -> ScaleResult<()> {
        if !(preset.pixels_per_foot.is_finite() && preset.pixels_per_foot > 0.0) {
            return Err(ScaleError::InvalidRatio(preset.pixels_per_foot));
        }
        if self.get(&preset.id).is_some() {
            return Err(ScaleError::DuplicatePreset(preset.id));
        }
        self.presets.push(preset);
        Ok(())
    }

    /// Two-point calibration: the distance between `p1` and `p2` is `real_feet`
    ///
    /// Registers (or replaces) the `custom_page_<n>` preset and makes it the
    /// page's active scale.
    pub fn calibrate(&mut self, p1: &Scaled, p2: &Scaled, real_feet: f64) -> ScaleResult<&ScalePreset> {
        let points = p1.distance_to(p2);
        if p1.page_number != p2.page_number || points <= 0.0 {
            return Err(ScaleError::InvalidCalibration);
        }
        if !(real_feet.is_finite() && real_feet > 0.0) {
            return Err(ScaleError::InvalidRatio(real_feet));
        }

        let page_number = p1.page_number;
        let id = format!("custom_page_{page_number}");
        let preset = ScalePreset::new(
            id.clone(),
            format!("Calibrated ({} ft)", trim_number(real_feet)),
            points / real_feet,
        )?;

        self.presets.retain(|p| p.id != id);
        self.presets.push(preset);
        self.page_scales.insert(page_number, id.clone());
        log::debug!("page {page_number} calibrated: {points} pt = {real_feet} ft");

        self.get(&id).ok_or(ScaleError::UnknownPreset(id))
    }
}

impl Default for ScaleRegistry {
    fn default() -> Self {
        Self {
            presets: default_presets(),
            page_scales: BTreeMap::new(),
            default_id: Some(DEFAULT_SCALE_ID.to_owned()),
        }
    }
}
