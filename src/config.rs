//! Tunable parameters of the sheet reader.
//!
//! Everything the pipeline reads lives in one immutable [`OmrConfig`] that is
//! passed by reference into [`crate::pipeline::process_image`]. Defaults match
//! the layout of the printed sheet; a TOML file can override any subset.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{OmrError, Result};

/// Number of question rows on the sheet.
pub const NUM_QUESTIONS: usize = 5;
/// Number of option columns (A-E) on the sheet.
pub const NUM_OPTIONS: usize = 5;

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OmrConfig {
    /// Images wider than this are downscaled before detection
    pub target_width: u32,
    /// Sigma of the denoising Gaussian (1.1 matches a 5x5 kernel)
    pub blur_sigma: f32,
    /// Lower bound for both sides of the rectified sheet
    pub min_rectified_side: u32,
    pub boundary: BoundaryConfig,
    pub grid: GridConfig,
}

impl Default for OmrConfig {
    fn default() -> Self {
        Self {
            target_width: 800,
            blur_sigma: 1.1,
            min_rectified_side: 200,
            boundary: BoundaryConfig::default(),
            grid: GridConfig::default(),
        }
    }
}

/// One way of turning the smoothed grayscale image into an edge map.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EdgeStrategy {
    /// Canny directly on the smoothed image
    Canny { low: f32, high: f32 },
    /// Canny on an inverted local-mean binarization
    AdaptiveCanny {
        block_radius: u32,
        offset: i32,
        low: f32,
        high: f32,
    },
    /// Canny on an inverted Otsu binarization
    OtsuCanny { low: f32, high: f32 },
}

/// Ordered search plan for the sheet border.
///
/// The detector walks `strategies`, then `dilation_iterations`, then the
/// largest `max_contours` contours, then `epsilon_fractions`, and stops at the
/// first quadrilateral that passes every check. Reordering these lists
/// changes which quadrilateral is returned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BoundaryConfig {
    pub strategies: Vec<EdgeStrategy>,
    /// Iterations of 3x3 dilation applied to each edge map
    pub dilation_iterations: Vec<u8>,
    pub max_contours: usize,
    /// Minimum contour area as a fraction of the image area
    pub min_area_ratio: f64,
    /// Polygon approximation tolerances as fractions of the perimeter
    pub epsilon_fractions: Vec<f64>,
    /// Minimum shorter/longer ratio of opposite edges
    pub min_side_ratio: f64,
    pub require_convex: bool,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            strategies: vec![
                EdgeStrategy::Canny { low: 50.0, high: 150.0 },
                EdgeStrategy::Canny { low: 30.0, high: 100.0 },
                EdgeStrategy::Canny { low: 75.0, high: 200.0 },
                EdgeStrategy::Canny { low: 20.0, high: 80.0 },
                EdgeStrategy::AdaptiveCanny {
                    block_radius: 5,
                    offset: 2,
                    low: 50.0,
                    high: 150.0,
                },
                EdgeStrategy::OtsuCanny { low: 50.0, high: 150.0 },
            ],
            dilation_iterations: vec![1, 2, 3],
            max_contours: 10,
            min_area_ratio: 0.05,
            epsilon_fractions: vec![0.02, 0.03, 0.04, 0.05],
            min_side_ratio: 0.5,
            require_convex: true,
        }
    }
}

/// Fractional region of the rectified sheet that holds the bubble grid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoiFractions {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Default for RoiFractions {
    fn default() -> Self {
        Self {
            top: 0.24,
            bottom: 0.71,
            left: 0.23,
            right: 0.86,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GridConfig {
    pub roi: RoiFractions,
    /// Fraction of each cell trimmed from every side before counting
    pub cell_margin: f64,
    /// Minimum fill ratio for a cell to count as marked
    pub marking_threshold: f64,
    /// Radius of the local-mean window (radius 5 is an 11x11 block)
    pub block_radius: u32,
    /// Subtracted from the local mean before comparison
    pub threshold_offset: i32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            roi: RoiFractions::default(),
            cell_margin: 0.15,
            marking_threshold: 0.05,
            block_radius: 5,
            threshold_offset: 2,
        }
    }
}

impl OmrConfig {
    /// Load configuration from a TOML file. Missing keys keep their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            OmrError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&contents)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: OmrConfig = toml::from_str(contents)
            .map_err(|e| OmrError::config(format!("failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.target_width == 0 {
            return Err(OmrError::config("target_width must be positive"));
        }
        if !(self.blur_sigma > 0.0) {
            return Err(OmrError::config("blur_sigma must be positive"));
        }
        if self.min_rectified_side == 0 {
            return Err(OmrError::config("min_rectified_side must be positive"));
        }

        let b = &self.boundary;
        if b.strategies.is_empty() || b.dilation_iterations.is_empty() {
            return Err(OmrError::config(
                "boundary search needs at least one strategy and one dilation level",
            ));
        }
        if b.epsilon_fractions.iter().any(|&e| !(e > 0.0)) {
            return Err(OmrError::config("epsilon_fractions must be positive"));
        }
        if !(0.0..=1.0).contains(&b.min_area_ratio) || !(0.0..=1.0).contains(&b.min_side_ratio) {
            return Err(OmrError::config(
                "min_area_ratio and min_side_ratio must lie in [0, 1]",
            ));
        }

        let g = &self.grid;
        let roi = g.roi;
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !(in_unit(roi.top) && in_unit(roi.bottom) && in_unit(roi.left) && in_unit(roi.right))
            || roi.top >= roi.bottom
            || roi.left >= roi.right
        {
            return Err(OmrError::config(format!(
                "ROI fractions must satisfy 0 <= top < bottom <= 1 and \
                 0 <= left < right <= 1, got {:?}",
                roi
            )));
        }
        if !(0.0..0.5).contains(&g.cell_margin) {
            return Err(OmrError::config("cell_margin must lie in [0, 0.5)"));
        }
        if !(0.0..=1.0).contains(&g.marking_threshold) {
            return Err(OmrError::config("marking_threshold must lie in [0, 1]"));
        }

        Ok(())
    }
}
