use image::imageops;
use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into_with, Interpolation, Projection};

use crate::error::{OmrError, Result};
use crate::geometry::CornerSet;

/// Size of the rectified sheet: the longer of each pair of opposite edges,
/// truncated, never below `min_side`.
pub fn rectified_size(corners: &CornerSet, min_side: u32) -> (u32, u32) {
    let width = corners.top_width().max(corners.bottom_width()) as u32;
    let height = corners.left_height().max(corners.right_height()) as u32;
    (width.max(min_side), height.max(min_side))
}

/// Map the quadrilateral `corners` of `img` onto an axis-aligned rectangle.
pub fn rectify(img: &RgbImage, corners: &CornerSet, min_side: u32) -> Result<RgbImage> {
    if corners.area() < 1.0 {
        return Err(OmrError::processing(format!("degenerate sheet corners {:?}", corners)));
    }

    let (width, height) = rectified_size(corners, min_side);
    let right = (width - 1) as f32;
    let bottom = (height - 1) as f32;
    let src = corners.to_array().map(|p| (p.x as f32, p.y as f32));
    let dst = [(0.0, 0.0), (right, 0.0), (right, bottom), (0.0, bottom)];

    let projection = Projection::from_control_points(src, dst).ok_or_else(|| {
        OmrError::processing(format!("no perspective transform for corners {:?}", corners))
    })?;

    let image = warp_perspective(img, &projection, width, height);
    log::debug!(
        "Rectified {}x{} -> {}x{}",
        img.width(),
        img.height(),
        width,
        height
    );

    Ok(image)
}

/// Resample `img` through a source -> destination projection with bilinear
/// interpolation. Pixels that land outside the source are black.
pub fn warp_perspective(
    img: &RgbImage,
    projection: &Projection,
    out_width: u32,
    out_height: u32,
) -> RgbImage {
    let inverse = projection.invert();
    let max_x = img.width() as f32 - 1.0;
    let max_y = img.height() as f32 - 1.0;

    let mut output = RgbImage::new(out_width, out_height);
    warp_into_with(
        img,
        |x, y| clamp_to_frame(inverse * (x, y), max_x, max_y),
        Interpolation::Bilinear,
        Rgb([0, 0, 0]),
        &mut output,
    );
    output
}

/// Pull samples within half a pixel of the frame back inside it, so the last
/// row and column still interpolate. Anything further out stays out.
fn clamp_to_frame((x, y): (f32, f32), max_x: f32, max_y: f32) -> (f32, f32) {
    let inside = |v: f32, max: f32| v >= -0.5 && v <= max + 0.5;
    if !(inside(x, max_x) && inside(y, max_y)) {
        return (-1.0, -1.0);
    }
    // Bilinear sampling needs a right/bottom neighbour, so stay just short of the edge.
    let edge = |v: f32, max: f32| v.clamp(0.0, (max - 1e-3).max(0.0));
    (edge(x, max_x), edge(y, max_y))
}

/// Rotate landscape sheets 90 degrees clockwise; portrait and square sheets
/// pass through. Returns the image and whether it was rotated.
pub fn normalize_orientation(img: RgbImage) -> (RgbImage, bool) {
    if img.width() > img.height() {
        log::debug!(
            "Rectified sheet is landscape ({}x{}), rotating clockwise",
            img.width(),
            img.height()
        );
        (imageops::rotate90(&img), true)
    } else {
        (img, false)
    }
}
