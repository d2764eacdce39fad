// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Fit mode and the geometry of a zoomed, panned image inside a frame.

use crate::viewer::Point;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FitMode {
    /// Shrink large images to the frame, keep small ones at native size.
    #[default]
    Normal,
    /// Also enlarge small images to fill the frame.
    Fit,
}

impl FitMode {
    /// Toggle between `Normal` and `Fit`.
    pub fn next(self) -> Self {
        match self {
            FitMode::Normal => FitMode::Fit,
            FitMode::Fit => FitMode::Normal,
        }
    }
}

/// Size of the image at scale 1.0 inside a `max` frame, aspect ratio preserved.
pub fn fit_size(orig: (u32, u32), max: (u32, u32), fit_mode: FitMode) -> (u32, u32) {
    let (orig_w, orig_h) = orig;
    let (max_w, max_h) = max;
    if orig_w == 0 || orig_h == 0 || max_w == 0 || max_h == 0 {
        return (0, 0);
    }

    let fits = orig_w <= max_w && orig_h <= max_h;
    if fit_mode == FitMode::Normal && fits {
        return (orig_w, orig_h);
    }
    let scale_w = max_w as f64 / orig_w as f64;
    let scale_h = max_h as f64 / orig_h as f64;
    let scale = scale_w.min(scale_h);
    (
        (orig_w as f64 * scale).floor().max(1.0) as u32,
        (orig_h as f64 * scale).floor().max(1.0) as u32,
    )
}

/// Integer rectangle in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Which part of the source is visible and where it lands in the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewGeometry {
    pub src: PixelRect,
    pub dst: PixelRect,
}

/// Place the image fitted to `frame`, scaled by `scale` around the frame center and translated
/// by `offset`. Returns `None` when nothing of the image is visible.
pub fn view_geometry(
    orig: (u32, u32),
    frame: (u32, u32),
    fit_mode: FitMode,
    scale: f64,
    offset: Point,
) -> Option<ViewGeometry> {
    let (base_w, base_h) = fit_size(orig, frame, fit_mode);
    if base_w == 0 || base_h == 0 || scale <= 0.0 {
        return None;
    }
    let (frame_w, frame_h) = (frame.0 as f64, frame.1 as f64);
    let disp_w = base_w as f64 * scale;
    let disp_h = base_h as f64 * scale;
    let left = (frame_w - disp_w) / 2.0 + offset.x;
    let top = (frame_h - disp_h) / 2.0 + offset.y;

    // Visible part, in frame coordinates.
    let x0 = left.max(0.0).round();
    let y0 = top.max(0.0).round();
    let x1 = (left + disp_w).min(frame_w).round();
    let y1 = (top + disp_h).min(frame_h).round();
    if x1 - x0 < 1.0 || y1 - y0 < 1.0 {
        return None;
    }

    // Map back to source pixels.
    let per_px_x = orig.0 as f64 / disp_w;
    let per_px_y = orig.1 as f64 / disp_h;
    let sx0 = ((x0 - left) * per_px_x).floor().clamp(0.0, orig.0 as f64 - 1.0);
    let sy0 = ((y0 - top) * per_px_y).floor().clamp(0.0, orig.1 as f64 - 1.0);
    let sx1 = ((x1 - left) * per_px_x).ceil().clamp(sx0 + 1.0, orig.0 as f64);
    let sy1 = ((y1 - top) * per_px_y).ceil().clamp(sy0 + 1.0, orig.1 as f64);

    Some(ViewGeometry {
        src: PixelRect {
            x: sx0 as u32,
            y: sy0 as u32,
            width: (sx1 - sx0) as u32,
            height: (sy1 - sy0) as u32,
        },
        dst: PixelRect {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        },
    })
}
