//! Answer grid analysis on the rectified sheet.
//!
//! The bubble grid occupies a fixed fractional region of the sheet. That
//! region is binarized so ink becomes foreground, split into
//! [`NUM_QUESTIONS`] x [`NUM_OPTIONS`] equal cells, and every row picks its
//! most filled cell.

use image::{imageops, DynamicImage, GrayImage, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, open};
use serde::Serialize;

use crate::config::{GridConfig, RoiFractions, NUM_OPTIONS, NUM_QUESTIONS};
use crate::preprocess::adaptive_threshold_inv;
use crate::result::Answer;

/// Axis-aligned box, `x2`/`y2` exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bounds {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl Bounds {
    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    fn offset(&self, dx: u32, dy: u32) -> Self {
        Self {
            x1: self.x1 + dx,
            y1: self.y1 + dy,
            x2: self.x2 + dx,
            y2: self.y2 + dy,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Cell {
    pub question: usize,
    pub option: usize,
    /// Cell box inside the ROI
    pub roi_bounds: Bounds,
    /// Cell box in rectified-sheet coordinates
    pub bounds: Bounds,
    /// Foreground pixels inside the shrunk sampling window
    pub pixel_count: u64,
    pub fill_ratio: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionResult {
    pub question: usize,
    pub answer: Answer,
    pub cells: Vec<Cell>,
    pub max_ratio: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GridAnalysis {
    /// ROI in rectified-sheet coordinates
    pub roi_bounds: Bounds,
    pub questions: Vec<QuestionResult>,
}

impl GridAnalysis {
    pub fn answers(&self) -> Vec<Answer> {
        self.questions.iter().map(|q| q.answer).collect()
    }
}

/// Pixel box of the ROI; fractional bounds are truncated.
pub fn roi_bounds(width: u32, height: u32, roi: &RoiFractions) -> Bounds {
    Bounds {
        x1: (width as f64 * roi.left) as u32,
        y1: (height as f64 * roi.top) as u32,
        x2: (width as f64 * roi.right) as u32,
        y2: (height as f64 * roi.bottom) as u32,
    }
}

/// Inverted adaptive binarization followed by opening and closing with the
/// 3x3 cross, which drops specks and fills pinholes in marks.
pub fn binarize_roi(gray: &GrayImage, config: &GridConfig) -> GrayImage {
    let thresh = adaptive_threshold_inv(gray, config.block_radius, config.threshold_offset);
    let opened = open(&thresh, Norm::L1, 1);
    close(&opened, Norm::L1, 1)
}

/// Crop the ROI from the rectified sheet and score every cell.
pub fn analyze_grid(sheet: &RgbImage, config: &GridConfig) -> GridAnalysis {
    let roi = roi_bounds(sheet.width(), sheet.height(), &config.roi);
    let crop = imageops::crop_imm(sheet, roi.x1, roi.y1, roi.width(), roi.height()).to_image();
    let gray = DynamicImage::ImageRgb8(crop).to_luma8();
    let binary = binarize_roi(&gray, config);

    log::debug!(
        "Grid ROI ({}, {})-({}, {}) on {}x{} sheet",
        roi.x1,
        roi.y1,
        roi.x2,
        roi.y2,
        sheet.width(),
        sheet.height()
    );

    let questions = score_cells(&binary, config)
        .into_iter()
        .enumerate()
        .map(|(question, row)| {
            let cells = row
                .into_iter()
                .map(|cell| Cell {
                    bounds: cell.roi_bounds.offset(roi.x1, roi.y1),
                    ..cell
                })
                .collect();
            decide_row(question, cells, config.marking_threshold)
        })
        .collect();

    GridAnalysis {
        roi_bounds: roi,
        questions,
    }
}

/// Fill ratios of every cell of a binarized ROI, row by row. The returned
/// cells carry ROI-local bounds in both bound fields.
pub fn score_cells(binary: &GrayImage, config: &GridConfig) -> Vec<Vec<Cell>> {
    let cell_width = binary.width() / NUM_OPTIONS as u32;
    let cell_height = binary.height() / NUM_QUESTIONS as u32;
    let margin_x = (cell_width as f64 * config.cell_margin) as u32;
    let margin_y = (cell_height as f64 * config.cell_margin) as u32;

    (0..NUM_QUESTIONS)
        .map(|question| {
            let row_start = question as u32 * cell_height;
            (0..NUM_OPTIONS)
                .map(|option| {
                    let col_start = option as u32 * cell_width;
                    let cell_box = Bounds {
                        x1: col_start,
                        y1: row_start,
                        x2: col_start + cell_width,
                        y2: row_start + cell_height,
                    };
                    let window = Bounds {
                        x1: cell_box.x1 + margin_x,
                        y1: cell_box.y1 + margin_y,
                        x2: cell_box.x2.saturating_sub(margin_x),
                        y2: cell_box.y2.saturating_sub(margin_y),
                    };

                    let pixel_count = count_foreground(binary, &window);
                    let fill_ratio = match window.area() {
                        0 => 0.0,
                        area => pixel_count as f64 / area as f64,
                    };

                    Cell {
                        question,
                        option,
                        roi_bounds: cell_box,
                        bounds: cell_box,
                        pixel_count,
                        fill_ratio,
                    }
                })
                .collect()
        })
        .collect()
}

fn count_foreground(binary: &GrayImage, window: &Bounds) -> u64 {
    let mut count = 0;
    for y in window.y1..window.y2 {
        for x in window.x1..window.x2 {
            if binary.get_pixel(x, y)[0] != 0 {
                count += 1;
            }
        }
    }
    count
}

/// Pick the most filled cell of a row. The leftmost cell wins ties, and the
/// row stays unmarked unless the winner reaches `threshold`.
pub fn decide_row(question: usize, cells: Vec<Cell>, threshold: f64) -> QuestionResult {
    let mut best: Option<&Cell> = None;
    for cell in &cells {
        if best.map_or(true, |b| cell.fill_ratio > b.fill_ratio) {
            best = Some(cell);
        }
    }

    let max_ratio = best.map_or(0.0, |c| c.fill_ratio);
    let answer = match best {
        Some(cell) if cell.fill_ratio >= threshold => {
            Answer::from_option_index(cell.option).unwrap_or(Answer::Unmarked)
        }
        _ => Answer::Unmarked,
    };

    QuestionResult {
        question,
        answer,
        cells,
        max_ratio,
    }
}
