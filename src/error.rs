// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Error types for ratio parsing, decoding and compositing.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid aspect ratio: {0:?} (expected W:H with positive integers)")]
    InvalidRatio(String),

    #[error("Could not decode image: {0}")]
    Decode(String),

    #[error("Could not acquire a {width}x{height} canvas")]
    CanvasUnavailable { width: u32, height: u32 },

    #[error("Could not encode image: {0}")]
    Encode(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
