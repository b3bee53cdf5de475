//! Debug overlay for auditing a read.
//!
//! Draws the ROI, every cell with its fill ratio, the chosen cells, column
//! headers and an answer summary on top of the rectified sheet. Text needs a
//! TrueType font; without one only the boxes are drawn.

use std::path::{Path, PathBuf};

use ab_glyph::FontVec;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::error::{OmrError, Result};
use crate::grid::{Bounds, GridAnalysis};
use crate::result::{Answer, OPTION_LABELS};

const ROI_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const CELL_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const CHOSEN_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const RATIO_COLOR: Rgb<u8> = Rgb([255, 0, 255]);
const QUESTION_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const HEADER_COLOR: Rgb<u8> = Rgb([128, 128, 128]);

const SYSTEM_FONTS: [&str; 4] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Where and how to render the overlay
pub struct DebugOverlay {
    pub path: PathBuf,
    /// Font for labels; `None` skips all text
    pub font: Option<FontVec>,
    pub font_scale: f32,
}

impl DebugOverlay {
    /// Overlay without labels
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            font: None,
            font_scale: 14.0,
        }
    }

    /// Use the font at `font_path` for labels. A font that cannot be loaded
    /// only costs the labels: the system font lookup takes over.
    pub fn with_font(mut self, font_path: Option<&Path>) -> Self {
        let Some(font_path) = font_path else {
            return self.with_system_font();
        };
        match load_font(font_path) {
            Ok(font) => {
                self.font = Some(font);
                self
            }
            Err(e) => {
                log::warn!("{}, trying system fonts", e);
                self.with_system_font()
            }
        }
    }

    /// Try a few common system font locations; keep going without text if
    /// none can be loaded.
    pub fn with_system_font(mut self) -> Self {
        for path in SYSTEM_FONTS {
            let Ok(data) = std::fs::read(path) else {
                continue;
            };
            if let Ok(font) = FontVec::try_from_vec(data) {
                log::debug!("Loaded overlay font: {}", path);
                self.font = Some(font);
                return self;
            }
        }
        log::debug!("No system font found, overlay labels will be skipped");
        self
    }

    /// Render the overlay onto a copy of `sheet`.
    pub fn render(&self, sheet: &RgbImage, grid: &GridAnalysis) -> RgbImage {
        let mut canvas = sheet.clone();
        let roi = grid.roi_bounds;

        draw_box(&mut canvas, &roi, ROI_COLOR, 3);
        self.label(&mut canvas, "BUBBLE AREA", roi.x1 as i32 + 5, roi.y1 as i32 - 22, ROI_COLOR);
        self.label(&mut canvas, "HEADER (SKIPPED)", 10, 10, HEADER_COLOR);

        for row in &grid.questions {
            for cell in &row.cells {
                let chosen = row.answer.option_index() == Some(cell.option);
                let (color, thickness) = if chosen {
                    (CHOSEN_COLOR, 2)
                } else {
                    (CELL_COLOR, 1)
                };
                draw_box(&mut canvas, &cell.bounds, color, thickness);
                self.label(
                    &mut canvas,
                    &format!("{:.2}", cell.fill_ratio),
                    cell.bounds.x1 as i32 + 4,
                    cell.bounds.y1 as i32 + 3,
                    RATIO_COLOR,
                );
            }

            if let Some(first) = row.cells.first() {
                self.label(
                    &mut canvas,
                    &format!("Q{}={}", row.question + 1, row.answer),
                    5,
                    first.bounds.y1 as i32 + 15,
                    QUESTION_COLOR,
                );
            }
        }

        if let Some(first_row) = grid.questions.first() {
            for (cell, label) in first_row.cells.iter().zip(OPTION_LABELS) {
                let center_x = (cell.bounds.x1 + cell.bounds.x2) as i32 / 2;
                self.label(&mut canvas, label, center_x - 5, roi.y1 as i32 - 40, CELL_COLOR);
            }
        }

        let summary = grid
            .answers()
            .iter()
            .map(Answer::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        let bottom = canvas.height() as i32 - self.font_scale as i32 - 8;
        self.label(&mut canvas, &format!("Answers: {}", summary), 10, bottom, CHOSEN_COLOR);

        canvas
    }

    /// Render and save to `self.path`.
    pub fn write(&self, sheet: &RgbImage, grid: &GridAnalysis) -> Result<&Path> {
        let overlay = self.render(sheet, grid);
        overlay.save(&self.path).map_err(|e| OmrError::DebugWrite {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        log::info!("Saved debug overlay: {:?}", self.path);
        Ok(&self.path)
    }

    fn label(&self, canvas: &mut RgbImage, text: &str, x: i32, y: i32, color: Rgb<u8>) {
        let Some(font) = &self.font else {
            return;
        };
        let x = x.clamp(0, canvas.width().saturating_sub(1) as i32);
        let y = y.clamp(0, canvas.height().saturating_sub(1) as i32);
        draw_text_mut(canvas, color, x, y, self.font_scale, font, text);
    }
}

/// Read and parse a TrueType/OpenType font file.
pub fn load_font(font_path: &Path) -> Result<FontVec> {
    let font_error = |reason: String| OmrError::Font {
        path: font_path.to_path_buf(),
        reason,
    };
    let data = std::fs::read(font_path).map_err(|e| font_error(e.to_string()))?;
    FontVec::try_from_vec(data).map_err(|e| font_error(e.to_string()))
}

/// Hollow rectangle grown inwards by `thickness` pixels
fn draw_box(canvas: &mut RgbImage, bounds: &Bounds, color: Rgb<u8>, thickness: u32) {
    for t in 0..thickness {
        let width = bounds.width().saturating_sub(2 * t);
        let height = bounds.height().saturating_sub(2 * t);
        if width == 0 || height == 0 {
            break;
        }
        let rect = Rect::at((bounds.x1 + t) as i32, (bounds.y1 + t) as i32).of_size(width, height);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;
    use crate::grid::analyze_grid;
    use imageproc::drawing::draw_filled_circle_mut;

    fn marked_sheet() -> RgbImage {
        let mut sheet = RgbImage::from_pixel(500, 1000, Rgb([250, 250, 250]));
        // Question 1, option D (see the grid tests for the cell layout).
        draw_filled_circle_mut(&mut sheet, (115 + 63 * 3 + 31, 240 + 47), 16, Rgb([10, 10, 10]));
        sheet
    }

    #[test]
    fn test_overlay_marks_roi_and_choice() {
        let sheet = marked_sheet();
        let grid = analyze_grid(&sheet, &GridConfig::default());
        let overlay = DebugOverlay::new("unused.png").render(&sheet, &grid);

        assert_eq!(overlay.dimensions(), sheet.dimensions());
        let roi = grid.roi_bounds;
        assert_eq!(*overlay.get_pixel(roi.x1 + 1, roi.y1 + 50), ROI_COLOR);

        let chosen = grid.questions[0].cells[3].bounds;
        assert_eq!(*overlay.get_pixel(chosen.x1 + 1, chosen.y1 + 20), CHOSEN_COLOR);

        let other = grid.questions[4].cells[0].bounds;
        assert_eq!(*overlay.get_pixel(other.x1 + 10, other.y2 - 1), CELL_COLOR);
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let sheet = marked_sheet();
        let grid = analyze_grid(&sheet, &GridConfig::default());
        let overlay = DebugOverlay::new("/nonexistent-dir/for/sure/debug.png");
        assert!(matches!(overlay.write(&sheet, &grid), Err(OmrError::DebugWrite { .. })));
    }

    #[test]
    fn test_missing_font_is_font_error() {
        let err = load_font(Path::new("/no/such/font.ttf")).unwrap_err();
        assert!(matches!(err, OmrError::Font { .. }));
        assert!(err.to_string().starts_with("Could not load font"));
    }

    #[test]
    fn test_unparsable_font_keeps_overlay_usable() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.ttf");
        std::fs::write(&bogus, b"not a font").unwrap();
        assert!(matches!(load_font(&bogus), Err(OmrError::Font { .. })));

        let path = dir.path().join("overlay.png");
        let overlay = DebugOverlay::new(&path).with_font(Some(&bogus));
        let sheet = marked_sheet();
        let grid = analyze_grid(&sheet, &GridConfig::default());
        assert_eq!(overlay.write(&sheet, &grid).unwrap(), path.as_path());
    }
}
