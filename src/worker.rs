// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Image worker thread.
//!
//! This thread performs the expensive work:
//! - decode image from disk (small LRU cache, so compare toggles are instant)
//! - crop and resize the visible part for the current zoom/pan
//! - encode to Kitty Graphics Protocol chunks for transmission
//!
//! Requests are best-effort; newer requests preempt older ones.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use image::imageops::FilterType;
use image::{DynamicImage, GenericImage, Rgba, RgbaImage};

use crate::fit::{FitMode, view_geometry};
use crate::kgp::encode_chunks;
use crate::picture::Picture;
use crate::viewer::Point;

/// Decoded images kept around (result, original, and a couple of neighbours).
const DECODE_CACHE_SIZE: usize = 4;

/// LRU cache of decoded images keyed by path.
struct DecodeCache {
    cache: HashMap<PathBuf, Arc<DynamicImage>>,
    order: VecDeque<PathBuf>,
    capacity: usize,
}

impl DecodeCache {
    fn new(capacity: usize) -> Self {
        Self {
            cache: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn get(&mut self, key: &Path) -> Option<Arc<DynamicImage>> {
        let img = self.cache.get(key)?;
        if !matches!(self.order.back(), Some(k) if k == key) {
            self.order.retain(|k| k != key);
            self.order.push_back(key.to_path_buf());
        }
        Some(Arc::clone(img))
    }

    fn insert(&mut self, key: PathBuf, img: Arc<DynamicImage>) {
        if self.cache.contains_key(&key) {
            self.order.retain(|k| k != &key);
        } else if self.cache.len() >= self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.cache.remove(&oldest);
        }
        self.order.push_back(key.clone());
        self.cache.insert(key, img);
    }
}

#[derive(Clone, Debug)]
pub struct RenderRequest {
    pub path: PathBuf,
    /// Frame size in terminal pixels.
    pub frame: (u32, u32),
    pub fit_mode: FitMode,
    pub scale: f64,
    pub offset: Point,
    pub kgp_id: u32,
    pub is_tmux: bool,
    pub compress_level: Option<u32>,
    pub max_frame_pixels: u64,
    pub resize_filter: FilterType,
    pub epoch: u64,
}

pub struct RenderedFrame {
    pub path: PathBuf,
    /// Size of the transmitted bitmap (may be below the frame size when capped).
    pub bitmap_size: (u32, u32),
    pub original_size: (u32, u32),
    pub encoded_chunks: Arc<Vec<Vec<u8>>>,
    pub epoch: u64,
}

pub enum WorkerResult {
    Rendered(RenderedFrame),
    Failed {
        path: PathBuf,
        error: String,
        epoch: u64,
    },
}

pub struct ImageWorker {
    request_tx: Sender<RenderRequest>,
    result_rx: Receiver<WorkerResult>,
    _handle: JoinHandle<()>,
}

impl ImageWorker {
    pub fn new() -> Self {
        let (request_tx, request_rx) = mpsc::channel::<RenderRequest>();
        let (result_tx, result_rx) = mpsc::channel::<WorkerResult>();

        let handle = thread::spawn(move || {
            Self::worker_loop(request_rx, result_tx);
        });

        Self {
            request_tx,
            result_rx,
            _handle: handle,
        }
    }

    pub fn request(&self, req: RenderRequest) {
        let _ = self.request_tx.send(req);
    }

    pub fn try_recv(&self) -> Option<WorkerResult> {
        self.result_rx.try_recv().ok()
    }

    fn drain_to_latest(
        request_rx: &Receiver<RenderRequest>,
        mut current: RenderRequest,
    ) -> RenderRequest {
        while let Ok(newer) = request_rx.try_recv() {
            current = newer;
        }
        current
    }

    fn worker_loop(request_rx: Receiver<RenderRequest>, result_tx: Sender<WorkerResult>) {
        let mut cache = DecodeCache::new(DECODE_CACHE_SIZE);
        let mut pending: Option<RenderRequest> = None;

        loop {
            let req = if let Some(p) = pending.take() {
                p
            } else {
                match request_rx.recv() {
                    Ok(r) => r,
                    Err(_) => break,
                }
            };
            let req = Self::drain_to_latest(&request_rx, req);
            Self::process_request(&req, &mut cache, &mut pending, &request_rx, &result_tx);
        }
        tracing::debug!("image worker stopped");
    }

    fn process_request(
        req: &RenderRequest,
        cache: &mut DecodeCache,
        pending: &mut Option<RenderRequest>,
        request_rx: &Receiver<RenderRequest>,
        result_tx: &Sender<WorkerResult>,
    ) {
        let decode_start = std::time::Instant::now();
        let decoded = match cache.get(&req.path) {
            Some(img) => img,
            None => match Self::decode_image(&req.path) {
                Ok(img) => {
                    let img = Arc::new(img);
                    cache.insert(req.path.clone(), Arc::clone(&img));
                    img
                }
                Err(error) => {
                    tracing::warn!(path = %req.path.display(), "decode failed: {error}");
                    let _ = result_tx.send(WorkerResult::Failed {
                        path: req.path.clone(),
                        error,
                        epoch: req.epoch,
                    });
                    return;
                }
            },
        };
        let decode_elapsed = decode_start.elapsed();

        // Check for newer request after decode (most expensive step)
        if let Ok(newer) = request_rx.try_recv() {
            *pending = Some(Self::drain_to_latest(request_rx, newer));
            return;
        }

        let render_start = std::time::Instant::now();
        let (bitmap_size, down) = Self::cap_frame(req.frame, req.max_frame_pixels);
        let offset = Point::new(req.offset.x * down, req.offset.y * down);
        let frame = Self::render_frame(
            &decoded,
            bitmap_size,
            req.fit_mode,
            req.scale,
            offset,
            req.resize_filter,
        );
        let render_elapsed = render_start.elapsed();

        if let Ok(newer) = request_rx.try_recv() {
            *pending = Some(Self::drain_to_latest(request_rx, newer));
            return;
        }

        let encode_start = std::time::Instant::now();
        let encoded_chunks = encode_chunks(&frame, req.kgp_id, req.is_tmux, req.compress_level);
        tracing::debug!(
            kgp_id = req.kgp_id,
            path = %req.path.display(),
            scale = req.scale,
            decode = ?decode_elapsed,
            render = ?render_elapsed,
            encode = ?encode_start.elapsed(),
            frame = ?req.frame,
            bitmap = ?bitmap_size,
            "rendered frame"
        );

        let _ = result_tx.send(WorkerResult::Rendered(RenderedFrame {
            path: req.path.clone(),
            bitmap_size,
            original_size: (decoded.width(), decoded.height()),
            encoded_chunks: Arc::new(encoded_chunks),
            epoch: req.epoch,
        }));
    }

    pub fn decode_image(path: &Path) -> Result<DynamicImage, String> {
        Picture::open(path)
            .and_then(|pic| pic.decode())
            .map_err(|e| e.to_string())
    }

    /// Shrink the bitmap so it stays under `max_pixels`; the terminal stretches it back over the
    /// frame's cells. Returns the bitmap size and the applied factor.
    pub fn cap_frame(frame: (u32, u32), max_pixels: u64) -> ((u32, u32), f64) {
        let (w, h) = frame;
        let pixels = u64::from(w).saturating_mul(u64::from(h));
        if pixels <= max_pixels || pixels == 0 {
            return (frame, 1.0);
        }
        let down = (max_pixels as f64 / pixels as f64).sqrt();
        (
            (
                (w as f64 * down).floor().max(1.0) as u32,
                (h as f64 * down).floor().max(1.0) as u32,
            ),
            down,
        )
    }

    /// Draw the visible part of `img` onto a black frame.
    pub fn render_frame(
        img: &DynamicImage,
        frame: (u32, u32),
        fit_mode: FitMode,
        scale: f64,
        offset: Point,
        filter: FilterType,
    ) -> RgbaImage {
        let (frame_w, frame_h) = (frame.0.max(1), frame.1.max(1));
        let mut canvas = RgbaImage::from_pixel(frame_w, frame_h, Rgba([0, 0, 0, 255]));
        let Some(geom) = view_geometry(
            (img.width(), img.height()),
            (frame_w, frame_h),
            fit_mode,
            scale,
            offset,
        ) else {
            return canvas;
        };

        let src = geom.src;
        let dst = geom.dst;
        let visible = img.crop_imm(src.x, src.y, src.width, src.height);
        let resized = if (src.width, src.height) == (dst.width, dst.height) {
            visible.to_rgba8()
        } else {
            visible
                .resize_exact(dst.width, dst.height, filter)
                .to_rgba8()
        };
        if let Err(e) = canvas.copy_from(&resized, dst.x, dst.y) {
            tracing::warn!("frame composite failed: {e}");
        }
        canvas
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, color: [u8; 4]) -> Arc<DynamicImage> {
        Arc::new(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            w,
            h,
            Rgba(color),
        )))
    }

    #[test]
    fn test_decode_cache_lru_eviction() {
        let mut cache = DecodeCache::new(2);
        cache.insert(PathBuf::from("a.png"), solid(1, 1, [0; 4]));
        cache.insert(PathBuf::from("b.png"), solid(1, 1, [0; 4]));
        let _ = cache.get(Path::new("a.png"));
        cache.insert(PathBuf::from("c.png"), solid(1, 1, [0; 4]));

        assert!(cache.get(Path::new("a.png")).is_some());
        assert!(cache.get(Path::new("b.png")).is_none());
        assert!(cache.get(Path::new("c.png")).is_some());
    }

    #[test]
    fn test_decode_cache_update_existing() {
        let mut cache = DecodeCache::new(2);
        cache.insert(PathBuf::from("a.png"), solid(4, 4, [0; 4]));
        cache.insert(PathBuf::from("a.png"), solid(2, 2, [0; 4]));
        assert_eq!(cache.cache.len(), 1);
        assert_eq!(cache.order.len(), 1);
        assert_eq!(cache.get(Path::new("a.png")).unwrap().width(), 2);
    }

    #[test]
    fn test_cap_frame_under_limit() {
        assert_eq!(ImageWorker::cap_frame((800, 600), 1_000_000), ((800, 600), 1.0));
    }

    #[test]
    fn test_cap_frame_over_limit() {
        let ((w, h), down) = ImageWorker::cap_frame((2000, 1000), 500_000);
        assert_eq!((w, h), (1000, 500));
        assert!((down - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_render_frame_letterboxes_at_scale_one() {
        let img = solid(4, 2, [255, 255, 255, 255]);
        let frame = ImageWorker::render_frame(
            &img,
            (8, 8),
            FitMode::Fit,
            1.0,
            Point::ORIGIN,
            FilterType::Nearest,
        );
        assert_eq!(frame.dimensions(), (8, 8));
        assert_eq!(frame.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(frame.get_pixel(4, 4).0, [255, 255, 255, 255]);
        assert_eq!(frame.get_pixel(4, 7).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_render_frame_zoomed_fills_frame() {
        let img = solid(10, 10, [0, 0, 255, 255]);
        let frame = ImageWorker::render_frame(
            &img,
            (10, 10),
            FitMode::Normal,
            3.0,
            Point::new(4.0, -4.0),
            FilterType::Nearest,
        );
        assert!(frame.pixels().all(|p| p.0 == [0, 0, 255, 255]));
    }

    #[test]
    fn test_decode_image_missing_file() {
        let err = ImageWorker::decode_image(Path::new("/nonexistent/photoshoot.png")).unwrap_err();
        assert!(err.contains("decode"));
    }
}
