// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Kitty Graphics Protocol helpers.
//!
//! Frames are transmitted once per id (`a=t`) and then placed at the cursor (`a=p`) with an
//! explicit cell size, so the terminal scales nothing on its own. Inside tmux every sequence is
//! wrapped in a DCS passthrough.

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::RgbaImage;
use ratatui::layout::Rect;

const TMUX_START: &str = "\x1bPtmux;\x1b\x1b";
const TMUX_ESCAPE: &str = "\x1b\x1b";
const TMUX_CLOSE: &str = "\x1b\\";

/// Base64 bytes per transmission chunk (protocol limit).
const CHUNK_SIZE: usize = 4096;

fn framing(is_tmux: bool) -> (&'static str, &'static str, &'static str) {
    if is_tmux {
        (TMUX_START, TMUX_ESCAPE, TMUX_CLOSE)
    } else {
        ("\x1b", "\x1b", "")
    }
}

pub fn delete_all(is_tmux: bool) -> Vec<u8> {
    let (start, escape, close) = framing(is_tmux);
    let mut buf = Vec::with_capacity(64);
    _ = write!(buf, "{start}_Gq=2,a=d,d=A{escape}\\{close}");
    buf
}

pub fn delete_by_id(id: u32, is_tmux: bool) -> Vec<u8> {
    let (start, escape, close) = framing(is_tmux);
    let mut buf = Vec::with_capacity(64);
    _ = write!(buf, "{start}_Gq=2,a=d,d=I,i={id}{escape}\\{close}");
    buf
}

/// Last placement, used to know what to erase next time.
#[derive(Default)]
pub struct KgpState {
    last_area: Option<Rect>,
    last_kgp_id: Option<u32>,
}

impl KgpState {
    pub fn last_area(&self) -> Option<Rect> {
        self.last_area
    }

    pub fn last_kgp_id(&self) -> Option<u32> {
        self.last_kgp_id
    }

    pub fn set_last(&mut self, area: Rect, kgp_id: u32) {
        self.last_area = Some(area);
        self.last_kgp_id = Some(kgp_id);
    }

    /// Forget the id but keep the area so it is still erased on the next placement.
    pub fn invalidate(&mut self) {
        self.last_kgp_id = None;
    }
}

/// Place image `id` with its top-left corner at `area`, stretched over `area` cells.
pub fn place(area: Rect, id: u32, is_tmux: bool) -> Vec<u8> {
    if area.width == 0 || area.height == 0 {
        return Vec::new();
    }
    let (start, escape, close) = framing(is_tmux);
    let mut buf = Vec::with_capacity(96);
    _ = write!(buf, "\x1b[{};{}H", area.y + 1, area.x + 1);
    _ = write!(
        buf,
        "{start}_Gq=2,a=p,i={id},p=1,c={},r={},C=1{escape}\\{close}",
        area.width, area.height
    );
    buf
}

pub fn erase_rows(area: Rect) -> Vec<Vec<u8>> {
    if area.width == 0 || area.height == 0 {
        return Vec::new();
    }

    let mut rows = Vec::with_capacity(area.height as usize);
    for y in 0..area.height {
        let mut buf = Vec::with_capacity(48);
        _ = write!(
            buf,
            "\x1b[{};{}H\x1b[{}X",
            area.y + y + 1,
            area.x + 1,
            area.width
        );
        rows.push(buf);
    }
    rows
}

/// Encode an RGBA frame as transmit chunks for image `id`.
///
/// With `compress_level` set the payload is zlib-compressed (`o=z`).
pub fn encode_chunks(
    img: &RgbaImage,
    id: u32,
    is_tmux: bool,
    compress_level: Option<u32>,
) -> Vec<Vec<u8>> {
    let (w, h) = (img.width(), img.height());

    let (payload, compressed) = match compress_level {
        Some(level) => match zlib(img.as_raw(), level) {
            Ok(data) => (data, true),
            Err(e) => {
                tracing::warn!("zlib compression failed, sending raw pixels: {e}");
                (img.as_raw().clone(), false)
            }
        },
        None => (img.as_raw().clone(), false),
    };

    let b64 = base64_simd::STANDARD.encode_to_string(&payload).into_bytes();
    let mut it = b64.chunks(CHUNK_SIZE).peekable();
    let mut chunks: Vec<Vec<u8>> = Vec::with_capacity(it.len().max(1));
    let (start, escape, close) = framing(is_tmux);
    let compression = if compressed { ",o=z" } else { "" };

    if let Some(first) = it.next() {
        let mut buf = Vec::with_capacity(first.len() + 128);
        _ = write!(
            &mut buf,
            "{start}_Gq=2,a=t,f=32,s={w},v={h},i={id}{compression},m={};",
            it.peek().is_some() as u8
        );
        buf.extend_from_slice(first);
        _ = write!(&mut buf, "{escape}\\{close}");
        chunks.push(buf);
    }

    while let Some(chunk) = it.next() {
        let mut buf = Vec::with_capacity(chunk.len() + 64);
        _ = write!(&mut buf, "{start}_Gm={};", it.peek().is_some() as u8);
        buf.extend_from_slice(chunk);
        _ = write!(&mut buf, "{escape}\\{close}");
        chunks.push(buf);
    }

    chunks
}

fn zlib(data: &[u8], level: u32) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn erase_generates_cursor_moves() {
        let area = Rect::new(2, 3, 4, 2);
        let rows = erase_rows(area);
        let bytes = rows.concat();
        let s = String::from_utf8_lossy(&bytes);
        assert!(s.contains("\x1b[4;3H"));
        assert!(s.contains("\x1b[5;3H"));
    }

    #[test]
    fn place_moves_cursor_and_sets_cells() {
        let s = String::from_utf8(place(Rect::new(1, 2, 30, 10), 77, false)).unwrap();
        assert!(s.starts_with("\x1b[3;2H"));
        assert!(s.contains("a=p,i=77"));
        assert!(s.contains("c=30,r=10"));
    }

    #[test]
    fn place_empty_area_is_empty() {
        assert!(place(Rect::new(0, 0, 0, 5), 1, false).is_empty());
    }

    #[test]
    fn tmux_wraps_in_passthrough() {
        let s = String::from_utf8(delete_by_id(9, true)).unwrap();
        assert!(s.starts_with("\x1bPtmux;"));
        assert!(s.ends_with("\x1b\\"));
        assert!(s.contains("i=9"));
    }

    #[test]
    fn encode_small_frame_single_chunk() {
        let img = RgbaImage::from_pixel(2, 3, image::Rgba([1, 2, 3, 4]));
        let chunks = encode_chunks(&img, 5, false, None);
        assert_eq!(chunks.len(), 1);
        let s = String::from_utf8(chunks[0].clone()).unwrap();
        assert!(s.contains("f=32,s=2,v=3,i=5,m=0;"));
        assert!(!s.contains("o=z"));
    }

    #[test]
    fn encode_large_frame_continues_chunks() {
        let img = RgbaImage::from_pixel(64, 64, image::Rgba([9, 9, 9, 255]));
        let chunks = encode_chunks(&img, 5, false, None);
        assert!(chunks.len() > 1);
        let first = String::from_utf8_lossy(&chunks[0]);
        let last = String::from_utf8_lossy(chunks.last().unwrap());
        assert!(first.contains("m=1;"));
        assert!(last.contains("_Gm=0;"));
    }

    #[test]
    fn encode_compressed_payload_inflates_back() {
        let img = RgbaImage::from_pixel(16, 16, image::Rgba([200, 100, 50, 255]));
        let chunks = encode_chunks(&img, 1, false, Some(6));
        assert_eq!(chunks.len(), 1);
        let s = String::from_utf8(chunks[0].clone()).unwrap();
        assert!(s.contains(",o=z,"));

        let payload = s.split_once(';').unwrap().1.trim_end_matches("\x1b\\");
        let compressed = base64_simd::STANDARD
            .decode_to_vec(payload.as_bytes())
            .unwrap();
        let mut raw = Vec::new();
        flate2::read::ZlibDecoder::new(compressed.as_slice())
            .read_to_end(&mut raw)
            .unwrap();
        assert_eq!(raw, img.as_raw().as_slice());
    }
}
