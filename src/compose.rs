// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Aspect-ratio padding.
//!
//! The source image is drawn at native size, centered on a black canvas that grows along exactly
//! one axis until it matches the target ratio. Nothing is scaled or cropped, and the result is
//! always PNG.
//!
//! Canvas sizes use integer cross-multiplication, so `floor(h * tw / th)` is the truncated
//! real-number width with no floating-point drift.

use image::{DynamicImage, GenericImage, Rgba, RgbaImage};

use crate::error::{Error, Result};
use crate::picture::Picture;
use crate::ratio::AspectRatio;

/// Upper bound for a padded canvas when the caller does not pass one.
pub const DEFAULT_MAX_CANVAS_PIXELS: u64 = 100_000_000;

/// Canvas size and the position of the source inside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PadLayout {
    pub canvas: (u32, u32),
    pub draw: (u32, u32),
}

/// Compute the padded canvas for a `width`x`height` source.
pub fn plan(width: u32, height: u32, target: AspectRatio) -> Result<PadLayout> {
    if width == 0 || height == 0 {
        return Err(Error::Decode(format!("empty image ({width}x{height})")));
    }
    let (iw, ih) = (u64::from(width), u64::from(height));
    let (tw, th) = (u64::from(target.w()), u64::from(target.h()));

    if tw * ih > th * iw {
        // Target is wider: pillarbox.
        let canvas_w = (ih * tw / th).max(iw);
        let canvas_w = u32::try_from(canvas_w).map_err(|_| Error::CanvasUnavailable {
            width: u32::MAX,
            height,
        })?;
        Ok(PadLayout {
            canvas: (canvas_w, height),
            draw: ((canvas_w - width) / 2, 0),
        })
    } else {
        // Target is taller or equal: letterbox (equal ratios land here with no bars).
        let canvas_h = (iw * th / tw).max(ih);
        let canvas_h = u32::try_from(canvas_h).map_err(|_| Error::CanvasUnavailable {
            width,
            height: u32::MAX,
        })?;
        Ok(PadLayout {
            canvas: (width, canvas_h),
            draw: (0, (canvas_h - height) / 2),
        })
    }
}

/// Pad `image` to `target`, re-encoding as PNG.
pub fn pad(image: &Picture, target: AspectRatio) -> Result<Picture> {
    pad_with_limit(image, target, DEFAULT_MAX_CANVAS_PIXELS)
}

/// Like [`pad`], but with the ratio given as a `"W:H"` string.
pub fn pad_str(image: &Picture, ratio: &str) -> Result<Picture> {
    pad(image, ratio.parse()?)
}

pub fn pad_with_limit(image: &Picture, target: AspectRatio, max_pixels: u64) -> Result<Picture> {
    let source = image.decode()?;
    let layout = plan(source.width(), source.height(), target)?;
    tracing::debug!(
        src = ?(source.width(), source.height()),
        ratio = %target,
        canvas = ?layout.canvas,
        draw = ?layout.draw,
        "padding image"
    );

    let mut canvas = acquire_canvas(layout.canvas, max_pixels)?;
    canvas
        .copy_from(&source.to_rgba8(), layout.draw.0, layout.draw.1)
        .map_err(|_| Error::CanvasUnavailable {
            width: layout.canvas.0,
            height: layout.canvas.1,
        })?;

    Picture::encode_png(&DynamicImage::ImageRgba8(canvas))
}

/// Allocate an opaque black canvas, refusing sizes that overflow or exceed `max_pixels`.
fn acquire_canvas(size: (u32, u32), max_pixels: u64) -> Result<RgbaImage> {
    let (w, h) = size;
    let unavailable = Error::CanvasUnavailable {
        width: w,
        height: h,
    };
    let pixels = u64::from(w) * u64::from(h);
    if pixels == 0 || pixels > max_pixels {
        return Err(unavailable);
    }
    let fits_in_memory = pixels
        .checked_mul(4)
        .and_then(|b| usize::try_from(b).ok())
        .is_some();
    if !fits_in_memory {
        return Err(unavailable);
    }
    Ok(RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 255])))
}
