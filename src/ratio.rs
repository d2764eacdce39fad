// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Target aspect ratios (`W:H`).

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Ratios offered by the photoshoot UI, with their labels.
pub const PRESETS: &[(AspectRatio, &str)] = &[
    (AspectRatio::new_unchecked(1, 1), "Square"),
    (AspectRatio::new_unchecked(4, 3), "Landscape"),
    (AspectRatio::new_unchecked(3, 4), "Portrait"),
    (AspectRatio::new_unchecked(16, 9), "Widescreen"),
    (AspectRatio::new_unchecked(9, 16), "Story"),
];

/// A width:height pair. Not reduced to lowest terms; both components are positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AspectRatio {
    w: u32,
    h: u32,
}

impl AspectRatio {
    pub fn new(w: u32, h: u32) -> Result<Self, Error> {
        if w == 0 || h == 0 {
            return Err(Error::InvalidRatio(format!("{w}:{h}")));
        }
        Ok(Self { w, h })
    }

    const fn new_unchecked(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    pub fn w(self) -> u32 {
        self.w
    }

    pub fn h(self) -> u32 {
        self.h
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.w) / f64::from(self.h)
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::new_unchecked(1, 1)
    }
}

impl FromStr for AspectRatio {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidRatio(s.to_string());
        let (w, h) = s.trim().split_once(':').ok_or_else(invalid)?;
        let w = parse_component(w).ok_or_else(invalid)?;
        let h = parse_component(h).ok_or_else(invalid)?;
        if w == 0 || h == 0 {
            return Err(invalid());
        }
        Ok(Self { w, h })
    }
}

/// Digits only: `u32::from_str` would also take a leading `+`.
fn parse_component(s: &str) -> Option<u32> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.w, self.h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let r: AspectRatio = "16:9".parse().unwrap();
        assert_eq!((r.w(), r.h()), (16, 9));
        let r: AspectRatio = " 9 : 16 ".parse().unwrap();
        assert_eq!((r.w(), r.h()), (9, 16));
    }

    #[test]
    fn test_parse_not_reduced() {
        let r: AspectRatio = "32:18".parse().unwrap();
        assert_eq!(r.to_string(), "32:18");
        assert_ne!(r, "16:9".parse().unwrap());
    }

    #[test]
    fn test_parse_rejects_zero_components() {
        assert!(matches!("0:1".parse::<AspectRatio>(), Err(Error::InvalidRatio(_))));
        assert!(matches!("1:0".parse::<AspectRatio>(), Err(Error::InvalidRatio(_))));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for s in [
            "", "16", "a:b", "16:", ":9", "16:9:1", "-1:2", "1.5:1", "+16:9", "16:+9", "1 6:9",
        ] {
            assert!(s.parse::<AspectRatio>().is_err(), "{s:?} should be rejected");
        }
    }

    #[test]
    fn test_new_rejects_zero() {
        assert!(AspectRatio::new(0, 3).is_err());
        assert!(AspectRatio::new(4, 3).is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        for (ratio, label) in PRESETS {
            assert!(ratio.w() > 0 && ratio.h() > 0, "{label}");
            assert_eq!(ratio.to_string().parse::<AspectRatio>().unwrap(), *ratio);
        }
        assert_eq!(AspectRatio::default().to_string(), "1:1");
    }
}
