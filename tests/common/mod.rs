#![allow(dead_code)]

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
use imageproc::rect::Rect;

pub const PAPER: Rgb<u8> = Rgb([245, 245, 245]);
pub const INK: Rgb<u8> = Rgb([20, 20, 20]);

/// Layout of a synthetic answer sheet drawn on a larger canvas.
pub struct SheetLayout {
    pub canvas: (u32, u32),
    /// Outer edge of the printed border: left, top, width, height
    pub sheet: (u32, u32, u32, u32),
    pub border: u32,
}

impl SheetLayout {
    /// 800x1000 photo with a 10px border inset by 40px
    pub fn bordered() -> Self {
        Self {
            canvas: (800, 1000),
            sheet: (40, 40, 720, 920),
            border: 10,
        }
    }

    /// The sheet fills the whole frame and has no printed border
    pub fn borderless(width: u32, height: u32) -> Self {
        Self {
            canvas: (width, height),
            sheet: (0, 0, width, height),
            border: 0,
        }
    }

    /// Centre of the bubble for `question`/`option` and a radius that fits it
    pub fn bubble(&self, question: usize, option: usize) -> ((i32, i32), i32) {
        let (left, top, width, height) = self.sheet;
        let (w, h) = (width as f64, height as f64);
        let cell_w = w * 0.63 / 5.0;
        let cell_h = h * 0.47 / 5.0;
        let x = left as f64 + w * 0.23 + cell_w * (option as f64 + 0.5);
        let y = top as f64 + h * 0.24 + cell_h * (question as f64 + 0.5);
        let radius = (cell_w.min(cell_h) * 0.22) as i32;
        ((x.round() as i32, y.round() as i32), radius)
    }

    /// Draw the sheet with the given (question, option) pairs filled in.
    pub fn render(&self, marks: &[(usize, usize)]) -> RgbImage {
        let (cw, ch) = self.canvas;
        let (left, top, width, height) = self.sheet;
        let mut img = RgbImage::from_pixel(cw, ch, PAPER);

        if self.border > 0 {
            let b = self.border;
            draw_filled_rect_mut(
                &mut img,
                Rect::at(left as i32, top as i32).of_size(width, height),
                INK,
            );
            draw_filled_rect_mut(
                &mut img,
                Rect::at((left + b) as i32, (top + b) as i32)
                    .of_size(width - 2 * b, height - 2 * b),
                PAPER,
            );

            // Header block with a name field, above the answer grid.
            let header_w = width / 2;
            let header_y = top + height / 10;
            draw_filled_rect_mut(
                &mut img,
                Rect::at((left + width / 4) as i32, header_y as i32).of_size(header_w, 12),
                INK,
            );
        }

        for &(question, option) in marks {
            let (center, radius) = self.bubble(question, option);
            draw_filled_circle_mut(&mut img, center, radius, INK);
        }

        img
    }
}
