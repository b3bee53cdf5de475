use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::contrast::otsu_level;
use imageproc::filter::gaussian_blur_f32;
use imageproc::integral_image::{integral_image, sum_image_pixels};

use crate::config::OmrConfig;

/// Output of the first pipeline stage
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// Colour image at working resolution; rectification samples from it
    pub color: RgbImage,
    /// Smoothed luminance used for border detection
    pub smoothed: GrayImage,
}

/// Downscale to the working width, then build the smoothed luminance map.
pub fn preprocess(img: &DynamicImage, config: &OmrConfig) -> Preprocessed {
    let rgb = img.to_rgb8();
    let color = resize_to_width(&rgb, config.target_width);
    let gray = DynamicImage::ImageRgb8(color.clone()).to_luma8();
    let smoothed = gaussian_blur_f32(&gray, config.blur_sigma);

    log::debug!(
        "Preprocessed {}x{} -> {}x{} (blur sigma {:.2})",
        rgb.width(),
        rgb.height(),
        color.width(),
        color.height(),
        config.blur_sigma
    );

    Preprocessed { color, smoothed }
}

/// Shrink `img` so its width is at most `target_width`, keeping the aspect
/// ratio. Narrower images are returned unchanged.
pub fn resize_to_width(img: &RgbImage, target_width: u32) -> RgbImage {
    let (width, height) = img.dimensions();
    if width <= target_width || width == 0 || height == 0 {
        return img.clone();
    }

    let new_height = ((height as u64 * target_width as u64 / width as u64) as u32).max(1);
    resize_area(img, target_width, new_height)
}

/// Box-filter resampling: every output pixel is the coverage-weighted mean of
/// the source pixels under its footprint.
pub fn resize_area(img: &RgbImage, new_width: u32, new_height: u32) -> RgbImage {
    let (width, height) = img.dimensions();
    let x_taps = area_taps(width, new_width);
    let y_taps = area_taps(height, new_height);

    // Horizontal pass into a float buffer of new_width x height.
    let mut rows = vec![[0.0f32; 3]; (new_width * height) as usize];
    for y in 0..height {
        for (ox, taps) in x_taps.iter().enumerate() {
            let mut acc = [0.0f32; 3];
            for &(sx, w) in taps {
                let px = img.get_pixel(sx, y);
                for c in 0..3 {
                    acc[c] += px[c] as f32 * w;
                }
            }
            rows[(y * new_width) as usize + ox] = acc;
        }
    }

    let mut output = RgbImage::new(new_width, new_height);
    for (oy, taps) in y_taps.iter().enumerate() {
        for ox in 0..new_width {
            let mut acc = [0.0f32; 3];
            for &(sy, w) in taps {
                let px = rows[(sy * new_width + ox) as usize];
                for c in 0..3 {
                    acc[c] += px[c] * w;
                }
            }
            output.put_pixel(
                ox,
                oy as u32,
                Rgb(acc.map(|v| v.round().clamp(0.0, 255.0) as u8)),
            );
        }
    }

    output
}

/// Source indices and normalised weights covering each destination index
fn area_taps(src_len: u32, dst_len: u32) -> Vec<Vec<(u32, f32)>> {
    let scale = src_len as f64 / dst_len as f64;

    (0..dst_len)
        .map(|d| {
            let start = d as f64 * scale;
            let end = ((d + 1) as f64 * scale).min(src_len as f64);

            let mut taps = Vec::new();
            let mut s = start.floor() as u32;
            while (s as f64) < end && s < src_len {
                let covered = end.min(s as f64 + 1.0) - start.max(s as f64);
                if covered > 1e-9 {
                    taps.push((s, covered));
                }
                s += 1;
            }

            let total: f64 = taps.iter().map(|&(_, w)| w).sum();
            taps.into_iter()
                .map(|(s, w)| (s, (w / total) as f32))
                .collect()
        })
        .collect()
}

/// Inverted local-mean binarization.
///
/// A pixel becomes foreground (255) when it is at most the mean of its
/// `(2r+1)^2` neighbourhood minus `offset`; windows are clipped at the image
/// border.
pub fn adaptive_threshold_inv(gray: &GrayImage, block_radius: u32, offset: i32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let integral = integral_image::<_, u64>(gray);

    GrayImage::from_fn(width, height, |x, y| {
        let left = x.saturating_sub(block_radius);
        let top = y.saturating_sub(block_radius);
        let right = (x + block_radius).min(width - 1);
        let bottom = (y + block_radius).min(height - 1);

        let sum = sum_image_pixels(&integral, left, top, right, bottom)[0];
        let count = ((right - left + 1) * (bottom - top + 1)) as f64;
        let local = (sum as f64 / count).round() as i32 - offset;

        if (gray.get_pixel(x, y)[0] as i32) <= local {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Inverted global binarization at the Otsu level
pub fn otsu_threshold_inv(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] > level {
            Luma([0])
        } else {
            Luma([255])
        }
    })
}
