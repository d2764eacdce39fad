// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Terminal output writer.
//!
//! This module is the only place allowed to write to stdout. It serializes output and prevents
//! escape-sequence interleaving across threads.
//!
//! Key properties:
//! - Status updates are prioritized and flushed immediately.
//! - Frame output is chunked at KGP chunk boundaries.
//! - Frames carry an epoch; a frame older than the last one seen is dropped.

use std::collections::VecDeque;
use std::io::{IsTerminal, Write, stdout};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use ratatui::layout::Rect;

use crate::kgp::{delete_all, delete_by_id, erase_rows, place};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusIndicator {
    Busy,
    Ready,
    /// The original image is on screen.
    Compare,
}

pub enum WriterRequest {
    /// Update the status row (single-line HUD at the bottom).
    Status {
        text: String,
        size: (u16, u16),
        indicator: StatusIndicator,
    },
    /// Transmit a rendered frame (KGP) and place it over `area`.
    Frame {
        encoded_chunks: Arc<Vec<Vec<u8>>>,
        area: Rect,
        kgp_id: u32,
        old_area: Option<Rect>,
        epoch: u64,
        is_tmux: bool,
    },
    /// Clear any KGP overlays (used on shutdown).
    ClearAll { area: Option<Rect>, is_tmux: bool },
    Shutdown,
}

pub struct WriterResult {
    pub kind: WriterResultKind,
    pub epoch: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriterResultKind {
    FrameDone { kgp_id: u32, area: Rect },
}

struct Task {
    chunks: VecDeque<Vec<u8>>,
    complete: Option<WriterResultKind>,
    epoch: u64,
}

struct WriterState {
    should_quit: bool,
    last_status: Option<(String, (u16, u16), StatusIndicator)>,
    status_dirty: bool,
    current_task: Option<Task>,
    current_epoch: u64,
}

pub struct TerminalWriter {
    request_tx: Sender<WriterRequest>,
    result_rx: Receiver<WriterResult>,
    handle: Option<JoinHandle<()>>,
}

impl TerminalWriter {
    /// Spawn the writer thread.
    pub fn new() -> Self {
        let (request_tx, request_rx) = mpsc::channel::<WriterRequest>();
        let (result_tx, result_rx) = mpsc::channel::<WriterResult>();

        let handle = thread::spawn(move || {
            Self::writer_loop(request_rx, result_tx);
        });

        Self {
            request_tx,
            result_rx,
            handle: Some(handle),
        }
    }

    /// Send a request to the writer thread.
    pub fn send(&self, req: WriterRequest) {
        let _ = self.request_tx.send(req);
    }

    /// Poll for completion notifications.
    pub fn try_recv(&self) -> Option<WriterResult> {
        self.result_rx.try_recv().ok()
    }

    fn writer_loop(request_rx: Receiver<WriterRequest>, result_tx: Sender<WriterResult>) {
        let mut out = stdout();
        let is_tty = out.is_terminal();

        let mut state = WriterState {
            should_quit: false,
            last_status: None,
            status_dirty: false,
            current_task: None,
            current_epoch: 0,
        };
        let mut bytes_since_flush: usize = 0;
        const FLUSH_THRESHOLD: usize = 64 * 1024;

        loop {
            if state.should_quit {
                break;
            }

            if state.current_task.is_none() && !state.status_dirty {
                match request_rx.recv() {
                    Ok(msg) => Self::apply_msg(msg, &mut state, is_tty, &mut out),
                    Err(_) => break,
                }
            }

            while let Ok(msg) = request_rx.try_recv() {
                Self::apply_msg(msg, &mut state, is_tty, &mut out);
                if state.should_quit {
                    break;
                }
            }

            if state.status_dirty {
                if let Some((text, size, indicator)) = state.last_status.clone()
                    && is_tty
                {
                    let _ = Self::render_status(&mut out, &text, size, indicator);
                    let _ = out.flush();
                    bytes_since_flush = 0;
                }
                state.status_dirty = false;
            }

            let Some(task) = &mut state.current_task else {
                continue;
            };
            if task.epoch != state.current_epoch {
                state.current_task = None;
                continue;
            }
            let next = if is_tty { task.chunks.pop_front() } else { None };
            if let Some(chunk) = next {
                if !chunk.is_empty() {
                    let _ = out.write_all(&chunk);
                    bytes_since_flush = bytes_since_flush.saturating_add(chunk.len());
                    if bytes_since_flush >= FLUSH_THRESHOLD {
                        let _ = out.flush();
                        bytes_since_flush = 0;
                    }
                }
            } else {
                let _ = out.flush();
                bytes_since_flush = 0;
                if let Some(kind) = task.complete {
                    let _ = result_tx.send(WriterResult {
                        kind,
                        epoch: task.epoch,
                    });
                }
                state.current_task = None;
            }
        }
    }

    fn apply_msg(msg: WriterRequest, state: &mut WriterState, is_tty: bool, out: &mut impl Write) {
        match msg {
            WriterRequest::Shutdown => {
                state.should_quit = true;
            }
            WriterRequest::Status {
                text,
                size,
                indicator,
            } => {
                state.last_status = Some((text, size, indicator));
                state.status_dirty = true;
            }
            WriterRequest::ClearAll { area, is_tmux } => {
                // Preempt current image work.
                state.current_task = None;
                if is_tty {
                    let _ = Self::clear_all(out, area, is_tmux);
                    let _ = out.flush();
                }
            }
            WriterRequest::Frame {
                encoded_chunks,
                area,
                kgp_id,
                old_area,
                epoch,
                is_tmux,
            } => {
                if epoch < state.current_epoch {
                    return;
                }
                state.current_epoch = epoch;
                state.current_task = Some(Self::task_frame(
                    &encoded_chunks,
                    area,
                    kgp_id,
                    old_area,
                    epoch,
                    is_tmux,
                ));
            }
        }
    }

    fn task_frame(
        encoded_chunks: &[Vec<u8>],
        area: Rect,
        kgp_id: u32,
        old_area: Option<Rect>,
        epoch: u64,
        is_tmux: bool,
    ) -> Task {
        let mut chunks = VecDeque::with_capacity(encoded_chunks.len() + 4);

        // Frame moved or resized: blank the cells it used to cover.
        if let Some(old) = old_area
            && old != area
        {
            chunks.extend(erase_rows(old));
        }

        // Replace image data for this id, then place it.
        chunks.push_back(delete_by_id(kgp_id, is_tmux));
        chunks.extend(encoded_chunks.iter().cloned());
        chunks.push_back(place(area, kgp_id, is_tmux));

        Task {
            chunks,
            complete: Some(WriterResultKind::FrameDone { kgp_id, area }),
            epoch,
        }
    }

    fn clear_all(out: &mut impl Write, area: Option<Rect>, is_tmux: bool) -> std::io::Result<()> {
        if let Some(area) = area {
            for row in erase_rows(area) {
                out.write_all(&row)?;
            }
        }
        out.write_all(&delete_all(is_tmux))?;
        out.write_all(b"\x1b[0m")?;
        Ok(())
    }

    fn render_status(
        out: &mut impl Write,
        status_text: &str,
        size: (u16, u16),
        indicator: StatusIndicator,
    ) -> std::io::Result<()> {
        let (w, h) = size;
        if w == 0 || h == 0 {
            return Ok(());
        }

        // Nerdfont icons and Powerline separator
        const ICON_READY: &str = "\u{f012c}"; // nf-md-check
        const ICON_BUSY: &str = "\u{f110}"; // nf-fa-spinner
        const ICON_COMPARE: &str = "\u{f0a35}"; // nf-md-compare_horizontal
        const SEP: &str = "\u{e0b0}";

        // ANSI 16-color (uses terminal theme colors)
        const FG_DARK: u8 = 30;
        const FG_LIGHT: u8 = 97;
        const BG_MAIN: u8 = 40;
        const BG_READY: u8 = 42;
        const BG_BUSY: u8 = 43;
        const BG_COMPARE: u8 = 46;

        let row_1based = h;
        // Reserve 4 columns for icon segment " X  " (icon + spaces + separator)
        let available = w.saturating_sub(4);
        let clipped = clip_utf8(status_text, available as usize);

        let (icon, bg_indicator) = match indicator {
            StatusIndicator::Ready => (ICON_READY, BG_READY),
            StatusIndicator::Busy => (ICON_BUSY, BG_BUSY),
            StatusIndicator::Compare => (ICON_COMPARE, BG_COMPARE),
        };
        let fg_indicator = bg_indicator - 10;

        write!(out, "\x1b[{row_1based};1H\x1b[{BG_MAIN}m\x1b[{w}X")?;
        write!(
            out,
            "\x1b[{row_1based};1H\x1b[{FG_DARK};{bg_indicator}m {icon} "
        )?;
        write!(out, "\x1b[{fg_indicator};{BG_MAIN}m{SEP}")?;
        write!(out, "\x1b[{FG_LIGHT};{BG_MAIN}m {clipped}\x1b[0m")?;

        Ok(())
    }
}

impl Drop for TerminalWriter {
    fn drop(&mut self) {
        let _ = self.request_tx.send(WriterRequest::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn clip_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = 0;
    for (i, _) in s.char_indices() {
        if i > max_bytes {
            break;
        }
        end = i;
    }
    &s[..end]
}
