// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Aspect-ratio padding for images and a fullscreen compare/zoom viewer for the terminal.
//!
//! The compositor (`compose`) and the viewer state machine (`viewer`) are independent; the
//! terminal host (`app`, `worker`, `sender`, `kgp`) drives the viewer with real images.

pub mod app;
pub mod compose;
pub mod config;
pub mod error;
pub mod fit;
pub mod kgp;
pub mod logging;
pub mod picture;
pub mod ratio;
pub mod sender;
pub mod viewer;
pub mod worker;

pub use compose::{pad, pad_str};
pub use error::{Error, Result};
pub use picture::Picture;
pub use ratio::AspectRatio;
pub use viewer::{Effect, Viewer, ViewerEvent, ViewerState};
