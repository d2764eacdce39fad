// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Encoded still images.
//!
//! A `Picture` keeps the encoded payload as received (file, bytes or `data:` URL) together with
//! its format and pixel dimensions. Dimensions are read once at construction; the pixels are only
//! decoded when someone asks for them.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat, ImageReader};

use crate::error::{Error, Result};

const DATA_URL_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64";

#[derive(Clone, Debug)]
pub struct Picture {
    bytes: Vec<u8>,
    format: ImageFormat,
    width: u32,
    height: u32,
}

impl Picture {
    /// Sniff the format and read the dimensions of an encoded image.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let reader = ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(|e| Error::Decode(e.to_string()))?;
        let Some(format) = reader.format() else {
            return Err(Error::Decode("unrecognized image format".to_string()));
        };
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| Error::Decode(e.to_string()))?;
        if width == 0 || height == 0 {
            return Err(Error::Decode(format!("empty image ({width}x{height})")));
        }
        Ok(Self {
            bytes,
            format,
            width,
            height,
        })
    }

    pub fn open(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).map_err(|e| Error::Decode(format!("{}: {e}", path.display())))?;
        Self::from_bytes(bytes)
    }

    /// Parse a `data:image/...;base64,...` URL.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let rest = url
            .trim()
            .strip_prefix(DATA_URL_PREFIX)
            .ok_or_else(|| Error::Decode("not a data URL".to_string()))?;
        let (meta, payload) = rest
            .split_once(',')
            .ok_or_else(|| Error::Decode("data URL has no payload".to_string()))?;
        if !meta.ends_with(BASE64_MARKER) {
            return Err(Error::Decode("data URL is not base64 encoded".to_string()));
        }
        let bytes = base64_simd::STANDARD
            .decode_to_vec(payload.as_bytes())
            .map_err(|e| Error::Decode(format!("invalid base64 payload: {e}")))?;
        Self::from_bytes(bytes)
    }

    /// Encode as `data:<mime>;base64,<payload>`.
    pub fn to_data_url(&self) -> String {
        let b64 = base64_simd::STANDARD.encode_to_string(&self.bytes);
        format!(
            "{DATA_URL_PREFIX}{}{BASE64_MARKER},{b64}",
            self.format.to_mime_type()
        )
    }

    /// Encode decoded pixels as PNG.
    pub fn encode_png(img: &DynamicImage) -> Result<Self> {
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(Self {
            bytes,
            format: ImageFormat::Png,
            width: img.width(),
            height: img.height(),
        })
    }

    pub fn decode(&self) -> Result<DynamicImage> {
        image::load_from_memory_with_format(&self.bytes, self.format)
            .map_err(|e| Error::Decode(e.to_string()))
    }

    /// Same picture as PNG; a no-op when it already is one.
    pub fn into_png(self) -> Result<Self> {
        if self.format == ImageFormat::Png {
            return Ok(self);
        }
        Self::encode_png(&self.decode()?)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
pub(crate) fn test_png(w: u32, h: u32, color: [u8; 4]) -> Picture {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba(color));
    Picture::encode_png(&DynamicImage::ImageRgba8(img)).unwrap()
}
