//! Hex RGB parsing and OKLCH to sRGB conversion.
//!
//! OKLCH is accepted only as editor input. `oklch_to_hex` goes through Oklab and
//! CIE XYZ (D65) to gamma-encoded sRGB and clips every channel into `[0, 1]`
//! before quantizing, so out-of-gamut colors come back as the nearest clipped
//! sRGB color instead of an error. The conversion is lossy and has no inverse.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("malformed color '{input}': {reason}")]
    Malformed { input: String, reason: String },
}

impl ColorError {
    pub(crate) fn malformed(input: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Canonical `#RRGGBB` color with uppercase digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(String);

impl HexColor {
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self(format!("#{r:02X}{g:02X}{b:02X}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_rgb(&self) -> (u8, u8, u8) {
        // Always valid: the constructor went through `hex_to_rgb`.
        hex_to_rgb(&self.0).unwrap_or((0, 0, 0))
    }
}

impl FromStr for HexColor {
    type Err = ColorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (r, g, b) = hex_to_rgb(value)?;
        Ok(Self::from_rgb(r, g, b))
    }
}

impl TryFrom<String> for HexColor {
    type Error = ColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HexColor> for String {
    fn from(value: HexColor) -> Self {
        value.0
    }
}

impl Display for HexColor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse `#RRGGBB` or `RRGGBB` into its channels.
pub fn hex_to_rgb(hex: &str) -> Result<(u8, u8, u8), ColorError> {
    let trimmed = hex.trim();
    let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if digits.len() != 6 || !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(ColorError::malformed(hex, "expected exactly 6 hex digits"));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16)
            .map_err(|error| ColorError::malformed(hex, error.to_string()))
    };
    Ok((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Convert OKLCH (`l` in 0..=1, `c` chroma, `h` degrees) to a clipped sRGB hex color.
pub fn oklch_to_hex(l: f64, c: f64, h: f64) -> HexColor {
    let h_rad = h.to_radians();
    let a = c * h_rad.cos();
    let b = c * h_rad.sin();

    let [x, y, z] = oklab_to_xyz(l, a, b);
    let linear = [
        3.240_969_941_904_522_6 * x - 1.537_383_177_570_094 * y - 0.498_610_760_293_003_4 * z,
        -0.969_243_636_280_879_6 * x + 1.875_967_501_507_720_2 * y + 0.041_555_057_407_175_6 * z,
        0.055_630_079_696_993_6 * x - 0.203_976_958_888_976_5 * y + 1.056_971_514_242_878_6 * z,
    ];
    let [r, g, b] = linear.map(|channel| quantize(srgb_encode(channel)));
    HexColor::from_rgb(r, g, b)
}

fn oklab_to_xyz(l: f64, a: f64, b: f64) -> [f64; 3] {
    let l_ = l + 0.396_337_777_4 * a + 0.215_803_757_3 * b;
    let m_ = l - 0.105_561_345_8 * a - 0.063_854_172_8 * b;
    let s_ = l - 0.089_484_177_5 * a - 1.291_485_548 * b;

    let (lms_l, lms_m, lms_s) = (l_.powi(3), m_.powi(3), s_.powi(3));
    [
        1.227_013_851_103_521_1 * lms_l - 0.557_799_980_651_822_2 * lms_m
            + 0.281_256_148_966_467_8 * lms_s,
        -0.040_580_178_423_280_6 * lms_l + 1.112_256_869_616_830_2 * lms_m
            - 0.071_676_678_665_601_2 * lms_s,
        -0.076_381_284_505_706_9 * lms_l - 0.421_481_978_418_012_7 * lms_m
            + 1.586_163_220_440_794_7 * lms_s,
    ]
}

fn srgb_encode(linear: f64) -> f64 {
    if linear <= 0.003_130_8 {
        12.92 * linear
    } else {
        1.055 * linear.powf(1.0 / 2.4) - 0.055
    }
}

fn quantize(value: f64) -> u8 {
    let clipped = if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    };
    (clipped * 255.0).round() as u8
}
