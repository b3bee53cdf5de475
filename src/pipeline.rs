use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use image::{DynamicImage, ImageReader, RgbImage};

use crate::config::OmrConfig;
use crate::debug::DebugOverlay;
use crate::detection::{find_sheet_corners, BoundaryMatch};
use crate::error::{OmrError, Result};
use crate::geometry::CornerSet;
use crate::grid::{analyze_grid, GridAnalysis};
use crate::preprocess::preprocess;
use crate::result::{fallback_note, OmrResult, SheetDetails};
use crate::transform::{normalize_orientation, rectify};

/// Everything the image stages produced for one sheet
#[derive(Debug, Clone)]
pub struct SheetAnalysis {
    /// Rectified, portrait-oriented sheet
    pub rectified: RgbImage,
    /// Quadrilateral that was rectified, in working-resolution coordinates
    pub corners: CornerSet,
    /// `None` when no border was found and the whole frame was used
    pub boundary: Option<BoundaryMatch>,
    pub rotated: bool,
    pub grid: GridAnalysis,
}

impl SheetAnalysis {
    pub fn used_fallback(&self) -> bool {
        self.boundary.is_none()
    }
}

/// Open and decode an image, sniffing the format from its content.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let read_error = |reason: String| OmrError::ImageRead {
        path: path.to_path_buf(),
        reason,
    };

    ImageReader::open(path)
        .map_err(|e| read_error(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| read_error(e.to_string()))?
        .decode()
        .map_err(|e| read_error(e.to_string()))
}

/// Run preprocessing, border detection, rectification, orientation and grid
/// analysis on a decoded image.
pub fn analyze_image(img: &DynamicImage, config: &OmrConfig) -> Result<SheetAnalysis> {
    if img.width() == 0 || img.height() == 0 {
        return Err(OmrError::processing("image has no pixels"));
    }

    let pre = preprocess(img, config);

    let boundary = find_sheet_corners(&pre.smoothed, &config.boundary);
    let corners = match &boundary {
        Some(found) => found.corners,
        None => {
            log::warn!("No sheet border detected, using the full image");
            CornerSet::from_frame(pre.color.width(), pre.color.height())
        }
    };
    log::debug!("Sheet corners {:?} (area {:.0})", corners.to_array(), corners.area());

    let rectified = rectify(&pre.color, &corners, config.min_rectified_side)?;
    drop(pre);

    let (sheet, rotated) = normalize_orientation(rectified);
    let grid = analyze_grid(&sheet, &config.grid);

    Ok(SheetAnalysis {
        rectified: sheet,
        corners,
        boundary,
        rotated,
        grid,
    })
}

/// Read one answer sheet from disk.
///
/// Never fails: read errors, processing errors and panics inside the image
/// stages all become a `success: false` record. A debug overlay that cannot
/// be written is logged and left out of the record.
pub fn process_image(path: &Path, config: &OmrConfig, debug: Option<&DebugOverlay>) -> OmrResult {
    let img = match load_image(path) {
        Ok(img) => img,
        Err(e) => {
            log::error!("Failed to load {:?}: {:?}", path, e);
            return OmrResult::failure(&e);
        }
    };
    log::debug!("Loaded image: {:?} ({}x{})", path, img.width(), img.height());

    process_decoded(&img, config, debug)
}

/// Same as [`process_image`] for an image that is already in memory.
pub fn process_decoded(
    img: &DynamicImage,
    config: &OmrConfig,
    debug: Option<&DebugOverlay>,
) -> OmrResult {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| analyze_image(img, config)))
        .unwrap_or_else(|payload| Err(OmrError::processing(panic_message(payload))));

    let analysis = match outcome {
        Ok(analysis) => analysis,
        Err(e) => {
            log::error!("{}", e);
            return OmrResult::failure(&e);
        }
    };

    let debug_image = debug.and_then(|overlay| {
        match overlay.write(&analysis.rectified, &analysis.grid) {
            Ok(path) => Some(path.to_path_buf()),
            Err(e) => {
                log::warn!("{}", e);
                None
            }
        }
    });

    let used_fallback = analysis.used_fallback();
    let answers = analysis.grid.answers();
    log::info!(
        "Answers: {}",
        answers.iter().map(|a| a.as_str()).collect::<Vec<_>>().join(" ")
    );

    OmrResult::success(
        answers,
        SheetDetails {
            debug_image,
            used_fallback,
            note: fallback_note(used_fallback).to_string(),
            roi: config.grid.roi,
            questions: analysis.grid.questions,
        },
    )
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unexpected panic during analysis".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::Answer;
    use image::Rgb;

    #[test]
    fn test_borderless_image_falls_back() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(600, 800, Rgb([235, 235, 235])));
        let analysis = analyze_image(&img, &OmrConfig::default()).unwrap();

        assert!(analysis.used_fallback());
        assert!(!analysis.rotated);
        assert_eq!(analysis.rectified.dimensions(), (599, 799));
        assert_eq!(analysis.grid.answers(), vec![Answer::Unmarked; 5]);
    }

    #[test]
    fn test_empty_image_is_processing_error() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        let result = process_decoded(&img, &OmrConfig::default(), None);
        assert!(!result.success);
        assert!(result.answers.is_none());
        assert_eq!(result.error.as_deref(), Some("Processing error: image has no pixels"));
    }

    #[test]
    fn test_panic_payloads() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(7u8)), "unexpected panic during analysis");
    }
}
