// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Application state and orchestration.
//!
//! `App` owns:
//! - the result list and the shared original image
//! - the `Viewer` (zoom/pan/compare state) for the current result
//! - the worker thread (decode/crop/resize/encode)
//! - the terminal writer thread (the only stdout writer)
//!
//! Most methods are non-blocking; heavy work is pushed to the worker/writer.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui_image::picker::Picker;

use crate::config::Config;
use crate::fit::FitMode;
use crate::kgp::KgpState;
use crate::picture::Picture;
use crate::sender::{
    StatusIndicator, TerminalWriter, WriterRequest, WriterResult, WriterResultKind,
};
use crate::viewer::{DownloadSuffix, Effect, Point, Viewer, ViewerEvent, download_filename};
use crate::worker::{ImageWorker, RenderRequest, WorkerResult};

/// Everything a rendered frame depends on.
#[derive(Clone, Debug, PartialEq)]
struct ViewKey {
    path: PathBuf,
    frame: (u32, u32),
    fit_mode: FitMode,
    scale: f64,
    offset: Point,
}

/// How long a view that failed to render waits before it is requested again.
const RETRY_DELAY: Duration = Duration::from_secs(1);

struct ReadyFrame {
    key: ViewKey,
    encoded_chunks: Arc<Vec<Vec<u8>>>,
    epoch: u64,
}

pub struct App {
    pub results: Vec<PathBuf>,
    pub current_index: usize,
    pub original: Option<PathBuf>,
    pub viewer: Viewer<PathBuf>,
    pub picker: Picker,
    pub should_quit: bool,
    pub fit_mode: FitMode,
    pub kgp_state: KgpState,
    config: Config,
    worker: ImageWorker,
    writer: TerminalWriter,
    kgp_id: u32,
    render_epoch: u64,
    requested: Option<(ViewKey, Rect)>,
    ready: Option<ReadyFrame>,
    /// View handed to the writer, with the epoch its completion will carry.
    in_flight: Option<(ViewKey, u64)>,
    displayed: Option<ViewKey>,
    failed: Option<(ViewKey, Instant)>,
    notice: Option<String>,
}

pub fn is_tmux_env() -> bool {
    std::env::var_os("TMUX").is_some()
}

fn ensure_tmux_allow_passthrough_on() {
    use std::process::Command;

    if is_tmux_env() {
        let _ = Command::new("tmux")
            .args(["set-option", "-gq", "allow-passthrough", "on"])
            .output();
    }
}

/// Split the terminal into the image frame and the one-row status bar.
fn image_area(terminal_size: Rect) -> Rect {
    let full = Rect::new(0, 0, terminal_size.width, terminal_size.height);
    Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(full)[0]
}

impl App {
    /// Create a new application instance, querying the terminal for its cell size.
    pub fn new(results: Vec<PathBuf>, original: Option<PathBuf>, config: Config) -> Result<Self> {
        ensure_tmux_allow_passthrough_on();
        let picker = Picker::from_query_stdio().unwrap_or_else(|e| {
            tracing::warn!("terminal query failed, assuming 8x16 cells: {e}");
            Picker::from_fontsize((8, 16))
        });
        let app = Self::with_picker(results, original, config, picker)?;

        // Clear any stale terminal-side image cache at startup.
        app.writer.send(WriterRequest::ClearAll {
            area: None,
            is_tmux: is_tmux_env(),
        });
        Ok(app)
    }

    fn with_picker(
        results: Vec<PathBuf>,
        original: Option<PathBuf>,
        config: Config,
        picker: Picker,
    ) -> Result<Self> {
        let Some(first) = results.first().cloned() else {
            anyhow::bail!("No result images to show");
        };
        let viewer = Viewer::open(first, original.clone());
        Ok(App {
            results,
            current_index: 0,
            original,
            viewer,
            picker,
            should_quit: false,
            fit_mode: FitMode::Normal,
            kgp_state: KgpState::default(),
            config,
            worker: ImageWorker::new(),
            writer: TerminalWriter::new(),
            kgp_id: Self::generate_kgp_id(),
            render_epoch: 0,
            requested: None,
            ready: None,
            in_flight: None,
            displayed: None,
            failed: None,
            notice: None,
        })
    }

    /// One image id per process; reusing it makes every transmit overwrite the previous frame.
    fn generate_kgp_id() -> u32 {
        const MUL: u32 = 0x9E3779B1;
        std::process::id().wrapping_mul(MUL).rotate_left(8) | 1
    }

    /// Feed one viewer event and react to its effect.
    pub fn handle(&mut self, event: ViewerEvent) {
        match self.viewer.handle(event) {
            Effect::None | Effect::Redraw => {}
            Effect::Close => self.should_quit = true,
            Effect::Download(suffix) => {
                self.notice = Some(match self.download(suffix) {
                    Ok(path) => {
                        tracing::info!(path = %path.display(), "saved download");
                        format!("saved {}", path.display())
                    }
                    Err(e) => {
                        tracing::error!("download failed: {e:#}");
                        format!("download failed: {e}")
                    }
                });
            }
        }
    }

    /// Translate a terminal cell position into frame pixels.
    pub fn cell_to_point(&self, column: u16, row: u16) -> Point {
        let (cell_w, cell_h) = self.picker.font_size();
        Point::new(
            f64::from(column) * f64::from(cell_w),
            f64::from(row) * f64::from(cell_h),
        )
    }

    /// Write the displayed image as PNG into the download directory.
    fn download(&self, suffix: DownloadSuffix) -> Result<PathBuf> {
        let source = self.viewer.displayed();
        let picture = Picture::open(source)
            .and_then(Picture::into_png)
            .with_context(|| format!("reading {}", source.display()))?;
        let path = self
            .config
            .download_path(&download_filename(Utc::now(), suffix));
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        std::fs::write(&path, picture.bytes())
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    pub fn move_by(&mut self, delta: i32) {
        if delta == 0 || self.results.is_empty() {
            return;
        }
        let len = self.results.len() as i32;
        self.current_index = (self.current_index as i32 + delta).rem_euclid(len) as usize;
        self.show_current();
    }

    fn show_current(&mut self) {
        let Some(path) = self.results.get(self.current_index).cloned() else {
            return;
        };
        self.viewer.show(path, self.original.clone());
        self.notice = None;
    }

    /// Toggle between `Normal` (shrink-only) and `Fit` (allow upscale).
    pub fn toggle_fit_mode(&mut self) {
        self.fit_mode = self.fit_mode.next();
    }

    fn current_key(&self, terminal_size: Rect) -> Option<(ViewKey, Rect)> {
        let area = image_area(terminal_size);
        let (cell_w, cell_h) = self.picker.font_size();
        if cell_w == 0 || cell_h == 0 || area.width == 0 || area.height == 0 {
            return None;
        }
        let frame = (
            u32::from(area.width) * u32::from(cell_w),
            u32::from(area.height) * u32::from(cell_h),
        );
        let state = self.viewer.state();
        let key = ViewKey {
            path: self.viewer.displayed().clone(),
            frame,
            fit_mode: self.fit_mode,
            scale: state.scale,
            offset: state.offset,
        };
        Some((key, area))
    }

    /// Ask the worker for the current view unless it is already shown or on its way.
    pub fn prepare_render_request(&mut self, terminal_size: Rect) {
        let Some((key, area)) = self.current_key(terminal_size) else {
            return;
        };
        if self.displayed.as_ref() == Some(&key)
            || self.in_flight.as_ref().is_some_and(|(k, _)| *k == key)
            || self.requested.as_ref().is_some_and(|(k, _)| *k == key)
        {
            return;
        }
        if let Some((failed, at)) = &self.failed
            && *failed == key
            && at.elapsed() < RETRY_DELAY
        {
            return;
        }

        self.render_epoch = self.render_epoch.saturating_add(1);
        self.worker.request(RenderRequest {
            path: key.path.clone(),
            frame: key.frame,
            fit_mode: key.fit_mode,
            scale: key.scale,
            offset: key.offset,
            kgp_id: self.kgp_id,
            is_tmux: is_tmux_env(),
            compress_level: self.config.compression_level(),
            max_frame_pixels: self.config.max_frame_pixels,
            resize_filter: self.config.resize_filter(),
            epoch: self.render_epoch,
        });
        self.requested = Some((key, area));
    }

    pub fn poll_worker(&mut self) {
        while let Some(result) = self.worker.try_recv() {
            match result {
                WorkerResult::Rendered(frame) => {
                    if frame.epoch != self.render_epoch {
                        continue;
                    }
                    let Some((key, _)) = self.requested.as_ref() else {
                        continue;
                    };
                    if key.path != frame.path {
                        continue;
                    }
                    tracing::debug!(
                        path = %frame.path.display(),
                        original = ?frame.original_size,
                        bitmap = ?frame.bitmap_size,
                        "frame ready"
                    );
                    self.ready = Some(ReadyFrame {
                        key: key.clone(),
                        encoded_chunks: frame.encoded_chunks,
                        epoch: frame.epoch,
                    });
                }
                WorkerResult::Failed { path, error, epoch } => {
                    if epoch == self.render_epoch {
                        // Forget the request so the view is retried after a pause.
                        self.failed = self
                            .requested
                            .take()
                            .map(|(key, _)| (key, Instant::now()));
                        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
                        self.notice = Some(format!(
                            "cannot show {}: {error}",
                            name.unwrap_or_else(|| path.display().to_string())
                        ));
                    }
                }
            }
        }
        self.flush_ready();
    }

    /// Hand the newest rendered frame to the writer once the previous one is fully out.
    fn flush_ready(&mut self) {
        if self.in_flight.is_some() {
            return;
        }
        let Some(ready) = self.ready.take() else {
            return;
        };
        let Some((_, area)) = self.requested.clone() else {
            return;
        };
        self.writer.send(WriterRequest::Frame {
            encoded_chunks: ready.encoded_chunks,
            area,
            kgp_id: self.kgp_id,
            old_area: self.kgp_state.last_area(),
            epoch: ready.epoch,
            is_tmux: is_tmux_env(),
        });
        self.in_flight = Some((ready.key, ready.epoch));
    }

    pub fn poll_writer(&mut self) {
        while let Some(result) = self.writer.try_recv() {
            self.accept_writer_result(result);
        }
        self.flush_ready();
    }

    /// Completions of frames that were cleared or superseded carry an older epoch and are dropped.
    fn accept_writer_result(&mut self, result: WriterResult) {
        let Some((_, epoch)) = &self.in_flight else {
            return;
        };
        if *epoch != result.epoch {
            tracing::debug!(epoch = result.epoch, "dropping stale writer result");
            return;
        }
        let WriterResultKind::FrameDone { kgp_id, area } = result.kind;
        self.kgp_state.set_last(area, kgp_id);
        self.displayed = self.in_flight.take().map(|(key, _)| key);
    }

    pub fn status_indicator(&self, terminal_size: Rect) -> StatusIndicator {
        let Some((key, _)) = self.current_key(terminal_size) else {
            return StatusIndicator::Busy;
        };
        if self.kgp_state.last_kgp_id().is_none() || self.displayed.as_ref() != Some(&key) {
            return StatusIndicator::Busy;
        }
        if self
            .viewer
            .state()
            .shows_secondary(self.viewer.has_secondary())
        {
            StatusIndicator::Compare
        } else {
            StatusIndicator::Ready
        }
    }

    /// Send the status row to the writer thread.
    pub fn send_status(&self, text: String, size: (u16, u16), indicator: StatusIndicator) {
        self.writer.send(WriterRequest::Status {
            text,
            size,
            indicator,
        });
    }

    pub fn clear_kgp_overlay(&mut self) {
        let area = self.kgp_state.last_area();
        self.writer.send(WriterRequest::ClearAll {
            area,
            is_tmux: is_tmux_env(),
        });
        self.kgp_state.invalidate();
        self.displayed = None;
        self.in_flight = None;
        self.requested = None;
        self.ready = None;
        self.failed = None;
    }

    pub fn current_image_name(&self) -> String {
        file_name(self.viewer.displayed())
    }

    pub fn status_text(&self) -> String {
        let state = self.viewer.state();
        let mut status = format!(
            "[{}/{}] {} {}%",
            self.current_index + 1,
            self.results.len(),
            self.current_image_name(),
            state.zoom_percent(),
        );
        if let Some(badge) = self.viewer.badge() {
            status.push_str(&format!(" [{badge}]"));
        }
        if self.fit_mode == FitMode::Fit {
            status.push_str(" fit");
        }
        if let Some(notice) = &self.notice {
            status.push_str(" | ");
            status.push_str(notice);
        }
        status
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}
