use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::morphology::dilate;
use nalgebra::Point2;

use crate::config::{BoundaryConfig, EdgeStrategy};
use crate::geometry::{approximate_closed_polygon, perimeter, polygon_area, CornerSet};
use crate::preprocess::{adaptive_threshold_inv, otsu_threshold_inv};

/// Where in the search plan the sheet border was found
#[derive(Debug, Clone, Copy)]
pub struct BoundaryMatch {
    pub corners: CornerSet,
    /// Index into `BoundaryConfig::strategies`
    pub strategy_index: usize,
    pub dilation_iterations: u8,
    /// Rank of the contour among the largest ones (0 = largest)
    pub contour_rank: usize,
    pub epsilon_fraction: f64,
}

/// A closed outer contour with its enclosed area
#[derive(Debug, Clone)]
struct OuterContour {
    points: Vec<Point2<f64>>,
    area: f64,
}

/// Build the edge map for one strategy
pub fn edge_map(smoothed: &GrayImage, strategy: &EdgeStrategy) -> GrayImage {
    match *strategy {
        EdgeStrategy::Canny { low, high } => canny(smoothed, low, high),
        EdgeStrategy::AdaptiveCanny {
            block_radius,
            offset,
            low,
            high,
        } => canny(&adaptive_threshold_inv(smoothed, block_radius, offset), low, high),
        EdgeStrategy::OtsuCanny { low, high } => canny(&otsu_threshold_inv(smoothed), low, high),
    }
}

/// Search for the four corners of the sheet border.
///
/// Walks strategies, dilation levels, the largest contours and the
/// approximation tolerances in that order and returns the first
/// quadrilateral that is large, roughly rectangular and convex. `None` means
/// the plan was exhausted; callers fall back to the whole frame.
pub fn find_sheet_corners(smoothed: &GrayImage, config: &BoundaryConfig) -> Option<BoundaryMatch> {
    let (width, height) = smoothed.dimensions();
    let min_area = width as f64 * height as f64 * config.min_area_ratio;

    for (strategy_index, strategy) in config.strategies.iter().enumerate() {
        let edges = edge_map(smoothed, strategy);

        for &iterations in &config.dilation_iterations {
            // k iterations of a 3x3 square equal one dilation of radius k.
            let dilated = if iterations == 0 {
                edges.clone()
            } else {
                dilate(&edges, Norm::LInf, iterations)
            };
            let contours = largest_outer_contours(&dilated, config.max_contours);

            log::debug!(
                "Strategy {} ({:?}), dilation {}: {} candidate contours",
                strategy_index,
                strategy,
                iterations,
                contours.len()
            );

            for (contour_rank, contour) in contours.iter().enumerate() {
                if contour.area < min_area {
                    continue;
                }

                if let Some((corners, epsilon_fraction)) = fit_quadrilateral(contour, config) {
                    log::info!(
                        "Sheet border found: strategy {}, dilation {}, contour {}, epsilon {:.2}",
                        strategy_index,
                        iterations,
                        contour_rank,
                        epsilon_fraction
                    );
                    return Some(BoundaryMatch {
                        corners,
                        strategy_index,
                        dilation_iterations: iterations,
                        contour_rank,
                        epsilon_fraction,
                    });
                }
            }
        }
    }

    None
}

/// Top-level outer contours of the foreground, largest area first
fn largest_outer_contours(binary: &GrayImage, limit: usize) -> Vec<OuterContour> {
    let mut contours: Vec<OuterContour> = find_contours::<i32>(binary)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .map(|c| {
            let points: Vec<Point2<f64>> = c
                .points
                .iter()
                .map(|p| Point2::new(p.x as f64, p.y as f64))
                .collect();
            let area = polygon_area(&points);
            OuterContour { points, area }
        })
        .collect();

    // Stable sort keeps discovery order among equal areas.
    contours.sort_by(|a, b| b.area.total_cmp(&a.area));
    contours.truncate(limit);
    contours
}

/// First tolerance at which the contour simplifies to an acceptable quad
fn fit_quadrilateral(contour: &OuterContour, config: &BoundaryConfig) -> Option<(CornerSet, f64)> {
    let peri = perimeter(&contour.points);

    for &fraction in &config.epsilon_fractions {
        let approx = approximate_closed_polygon(&contour.points, fraction * peri);
        if approx.len() != 4 {
            continue;
        }

        let corners = CornerSet::from_points([approx[0], approx[1], approx[2], approx[3]]);
        if is_acceptable(&corners, config) {
            return Some((corners, fraction));
        }
    }

    None
}

/// Opposite sides of comparable length and, optionally, strictly convex
fn is_acceptable(corners: &CornerSet, config: &BoundaryConfig) -> bool {
    let Some((width_ratio, height_ratio)) = corners.side_ratios() else {
        return false;
    };
    if width_ratio <= config.min_side_ratio || height_ratio <= config.min_side_ratio {
        return false;
    }
    !config.require_convex || corners.is_convex()
}
