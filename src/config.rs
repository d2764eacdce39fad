// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Configuration management.
//!
//! Config values are loaded with the following priority (highest to lowest):
//! 1. Environment variables (PHOTOSHOOT_*)
//! 2. Config file (~/.config/photoshoot/config.toml)
//! 3. Default values

use serde::Deserialize;
use std::path::PathBuf;

use crate::compose::DEFAULT_MAX_CANVAS_PIXELS;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where downloads from the viewer are written. Empty means the current directory.
    pub download_dir: PathBuf,
    pub log_level: String,
    pub force_alt_screen: bool,
    pub no_alt_screen: bool,
    pub kgp_no_compress: bool,
    pub compress_level: u32,
    /// Bitmap size cap for a rendered frame (tmux + kitty chokes on large payloads).
    pub max_frame_pixels: u64,
    pub resize_filter: String,
    pub max_canvas_pixels: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::new(),
            log_level: "info".to_string(),
            force_alt_screen: false,
            no_alt_screen: false,
            kgp_no_compress: false,
            compress_level: 6,
            max_frame_pixels: 1_500_000,
            resize_filter: "triangle".to_string(),
            max_canvas_pixels: DEFAULT_MAX_CANVAS_PIXELS,
        }
    }
}

/// Parse filter type string to image::imageops::FilterType.
/// Returns Triangle as fallback for invalid values.
pub fn parse_filter_type(s: &str) -> image::imageops::FilterType {
    let s = s.trim();
    if s.eq_ignore_ascii_case("nearest") {
        image::imageops::FilterType::Nearest
    } else if s.eq_ignore_ascii_case("catmullrom") || s.eq_ignore_ascii_case("catmull-rom") {
        image::imageops::FilterType::CatmullRom
    } else if s.eq_ignore_ascii_case("gaussian") {
        image::imageops::FilterType::Gaussian
    } else if s.eq_ignore_ascii_case("lanczos3") || s.eq_ignore_ascii_case("lanczos") {
        image::imageops::FilterType::Lanczos3
    } else {
        image::imageops::FilterType::Triangle
    }
}

impl Config {
    /// Load config with priority: env vars > config file > defaults
    pub fn load() -> Self {
        let mut config = Self::load_from_file().unwrap_or_default();
        config.apply_env_overrides();
        config.clamp_values();
        config
    }

    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("photoshoot").join("config.toml"))
    }

    fn load_from_file() -> Option<Self> {
        let path = Self::config_path()?;
        let content = std::fs::read_to_string(path).ok()?;
        Self::from_toml(&content)
    }

    fn from_toml(content: &str) -> Option<Self> {
        match toml::from_str(content) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("photoshoot: ignoring invalid config file: {e}");
                None
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `PHOTOSHOOT_*` overrides read through `var`. Unparsable numbers are ignored.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        let parse_u32 = |key: &str| var(key).and_then(|v| v.trim().parse::<u32>().ok());
        let parse_u64 = |key: &str| var(key).and_then(|v| v.trim().parse::<u64>().ok());

        if let Some(v) = var("PHOTOSHOOT_DOWNLOAD_DIR") {
            self.download_dir = PathBuf::from(v);
        }
        if let Some(v) = var("PHOTOSHOOT_LOG") {
            self.log_level = v;
        }
        if var("PHOTOSHOOT_FORCE_ALT_SCREEN").is_some() {
            self.force_alt_screen = true;
        }
        if var("PHOTOSHOOT_NO_ALT_SCREEN").is_some() {
            self.no_alt_screen = true;
        }
        if var("PHOTOSHOOT_KGP_NO_COMPRESS").is_some() {
            self.kgp_no_compress = true;
        }
        if let Some(v) = parse_u32("PHOTOSHOOT_COMPRESS_LEVEL") {
            self.compress_level = v;
        }
        if let Some(v) = parse_u64("PHOTOSHOOT_MAX_FRAME_PIXELS") {
            self.max_frame_pixels = v;
        }
        if let Some(v) = var("PHOTOSHOOT_RESIZE_FILTER") {
            self.resize_filter = v;
        }
        if let Some(v) = parse_u64("PHOTOSHOOT_MAX_CANVAS_PIXELS") {
            self.max_canvas_pixels = v;
        }
    }

    fn clamp_values(&mut self) {
        const MAX_COMPRESS_LEVEL: u32 = 9;
        const MIN_FRAME_PIXELS: u64 = 64 * 64;

        self.compress_level = self.compress_level.min(MAX_COMPRESS_LEVEL);
        self.max_frame_pixels = self.max_frame_pixels.max(MIN_FRAME_PIXELS);
        self.max_canvas_pixels = self.max_canvas_pixels.max(1);
    }

    pub fn compression_level(&self) -> Option<u32> {
        if self.kgp_no_compress {
            None
        } else {
            Some(self.compress_level)
        }
    }

    pub fn resize_filter(&self) -> image::imageops::FilterType {
        parse_filter_type(&self.resize_filter)
    }

    pub fn download_path(&self, file_name: &str) -> PathBuf {
        self.download_dir.join(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.compress_level, 6);
        assert_eq!(config.max_frame_pixels, 1_500_000);
        assert_eq!(config.max_canvas_pixels, DEFAULT_MAX_CANVAS_PIXELS);
        assert_eq!(config.log_level, "info");
        assert!(!config.force_alt_screen);
        assert!(config.download_dir.as_os_str().is_empty());
    }

    #[test]
    fn test_clamp_values() {
        let mut config = Config {
            compress_level: 20,
            max_frame_pixels: 10,
            max_canvas_pixels: 0,
            ..Default::default()
        };
        config.clamp_values();
        assert_eq!(config.compress_level, 9);
        assert_eq!(config.max_frame_pixels, 64 * 64);
        assert_eq!(config.max_canvas_pixels, 1);
    }

    #[test]
    fn test_env_overrides() {
        use std::collections::HashMap;

        let env: HashMap<&str, &str> = HashMap::from([
            ("PHOTOSHOOT_DOWNLOAD_DIR", "/tmp/downloads"),
            ("PHOTOSHOOT_KGP_NO_COMPRESS", "1"),
            ("PHOTOSHOOT_MAX_CANVAS_PIXELS", "2500"),
            ("PHOTOSHOOT_COMPRESS_LEVEL", "max"),
        ]);
        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.download_dir, PathBuf::from("/tmp/downloads"));
        assert!(config.kgp_no_compress);
        assert_eq!(config.compression_level(), None);
        assert_eq!(config.max_canvas_pixels, 2500);
        // Unparsable level keeps the default.
        assert_eq!(config.compress_level, 6);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_env_overrides_then_clamp() {
        let mut config = Config::default();
        config.apply_overrides(|key| match key {
            "PHOTOSHOOT_COMPRESS_LEVEL" => Some("12".to_string()),
            "PHOTOSHOOT_MAX_FRAME_PIXELS" => Some(" 100 ".to_string()),
            _ => None,
        });
        config.clamp_values();
        assert_eq!(config.compress_level, 9);
        assert_eq!(config.max_frame_pixels, 64 * 64);
    }

    #[test]
    fn test_compression_level() {
        let config = Config::default();
        assert_eq!(config.compression_level(), Some(6));

        let config = Config {
            kgp_no_compress: true,
            ..Default::default()
        };
        assert_eq!(config.compression_level(), None);
    }

    #[test]
    fn test_from_toml_partial_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            download_dir = "/tmp/shots"
            resize_filter = "lanczos"
            "#,
        )
        .unwrap();
        assert_eq!(config.download_dir, PathBuf::from("/tmp/shots"));
        assert_eq!(config.resize_filter(), image::imageops::FilterType::Lanczos3);
        assert_eq!(config.compress_level, 6);
        assert_eq!(
            config.download_path("a.png"),
            PathBuf::from("/tmp/shots/a.png")
        );
    }

    #[test]
    fn test_from_toml_invalid() {
        assert!(Config::from_toml("compress_level = \"high\"").is_none());
    }

    #[test]
    fn test_parse_filter_type_fallback() {
        assert_eq!(
            parse_filter_type(" Nearest "),
            image::imageops::FilterType::Nearest
        );
        assert_eq!(
            parse_filter_type("bogus"),
            image::imageops::FilterType::Triangle
        );
    }
}
