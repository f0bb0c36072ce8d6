//! Tolerant parsing of pasted OKLCH values and whole palettes.
//!
//! Accepted single-value forms:
//! - `0.726, 0.129, 253.06` or `0.726 0.129 253.06`
//! - `0.726,0.129,253.06,100` (oklch.com URL hash, extra field ignored)
//! - `oklch(72.6% 0.129 253.06)`
//!
//! A palette block is one `Label: value` pair per line. Lines that cannot be
//! understood are skipped; only a block where nothing at all parses is an error.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::color::{oklch_to_hex, ColorError, HexColor};
use crate::theme::RoleKey;

pub const MAX_CHROMA: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaletteError {
    #[error(transparent)]
    Color(#[from] ColorError),
    #[error("no palette lines could be parsed")]
    NothingParsed,
}

/// An OKLCH coordinate as typed by the user.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Oklch {
    pub l: f64,
    pub c: f64,
    pub h: f64,
}

impl Oklch {
    pub fn to_hex(self) -> HexColor {
        oklch_to_hex(self.l, self.c, self.h)
    }
}

pub fn parse_single_color(text: &str) -> Result<Oklch, ColorError> {
    let body = strip_oklch_wrapper(text.trim());
    let tokens = body
        .split(|ch: char| ch == ',' || ch.is_whitespace())
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>();
    if tokens.len() < 3 {
        return Err(ColorError::malformed(
            text,
            format!("expected 3 components, found {}", tokens.len()),
        ));
    }

    let lightness = match tokens[0].strip_suffix('%') {
        Some(percent) => parse_number(text, percent)? / 100.0,
        None => parse_number(text, tokens[0])?,
    };
    let chroma = parse_number(text, tokens[1])?;
    let hue = parse_number(text, tokens[2])?;

    if !(0.0..=1.0).contains(&lightness) {
        return Err(ColorError::malformed(text, "lightness must be within 0..=1"));
    }
    if !(0.0..=MAX_CHROMA).contains(&chroma) {
        return Err(ColorError::malformed(
            text,
            format!("chroma must be within 0..={MAX_CHROMA}"),
        ));
    }
    if !(0.0..=360.0).contains(&hue) {
        return Err(ColorError::malformed(text, "hue must be within 0..=360"));
    }

    Ok(Oklch {
        l: lightness,
        c: chroma,
        h: hue,
    })
}

fn strip_oklch_wrapper(text: &str) -> &str {
    let Some(prefix) = text.get(..5) else {
        return text;
    };
    if !prefix.eq_ignore_ascii_case("oklch") {
        return text;
    }
    let rest = text[5..].trim_start();
    match rest.strip_prefix('(').and_then(|inner| inner.trim_end().strip_suffix(')')) {
        Some(inner) => inner.trim(),
        None => text,
    }
}

fn parse_number(input: &str, token: &str) -> Result<f64, ColorError> {
    let value = token
        .parse::<f64>()
        .map_err(|_| ColorError::malformed(input, format!("'{token}' is not a number")))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ColorError::malformed(input, format!("'{token}' is not finite")))
    }
}

/// Parse a `Label: value` block into hex assignments keyed by role.
pub fn parse_palette_block(text: &str) -> Result<BTreeMap<RoleKey, HexColor>, PaletteError> {
    let mut assignments = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let Some(role) = role_for_label(label) else {
            tracing::debug!(label, "skipping palette line with unknown label");
            continue;
        };
        match parse_single_color(value) {
            Ok(color) => {
                assignments.insert(role, color.to_hex());
            }
            Err(error) => {
                tracing::debug!(label, %error, "skipping palette line with bad value");
            }
        }
    }

    if assignments.is_empty() {
        return Err(PaletteError::NothingParsed);
    }
    Ok(assignments)
}

/// Trim, lowercase, unify en/em dashes to `-`, collapse whitespace runs.
pub fn normalize_label(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .replace(['\u{2013}', '\u{2014}'], "-")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve a palette label such as `Road - Motorway`, `road_motorway` or `Motorway`.
pub fn role_for_label(label: &str) -> Option<RoleKey> {
    let normalized = normalize_label(label);
    let compact = normalized
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .collect::<String>();
    // Bare road classes ("Motorway") are accepted too.
    lookup_compact_label(&compact).or_else(|| lookup_compact_label(&format!("road{compact}")))
}

fn lookup_compact_label(compact: &str) -> Option<RoleKey> {
    let role = match compact {
        "background" | "bg" => RoleKey::Background,
        "text" => RoleKey::Text,
        "gradient" | "gradientcolor" => RoleKey::Gradient,
        "water" => RoleKey::Water,
        "parks" | "park" => RoleKey::Parks,
        "roadmotorway" => RoleKey::RoadMotorway,
        "roadprimary" => RoleKey::RoadPrimary,
        "roadsecondary" => RoleKey::RoadSecondary,
        "roadtertiary" => RoleKey::RoadTertiary,
        "roadresidential" => RoleKey::RoadResidential,
        "roaddefault" => RoleKey::RoadDefault,
        _ => return None,
    };
    Some(role)
}

/// Example block with one line per role, using the default theme labels.
pub fn palette_placeholder() -> String {
    const EXAMPLE_VALUES: [&str; 11] = [
        "0.1852, 0.0551, 282.82",
        "0.9295, 0.0339, 293.07",
        "0.1852, 0.0551, 282.82",
        "0.4213, 0.0862, 250.14",
        "0.3327, 0.0521, 160.42",
        "0.7820, 0.1409, 62.38",
        "0.7012, 0.1105, 40.17",
        "0.6204, 0.0893, 30.55",
        "0.5401, 0.0702, 285.40",
        "0.4603, 0.0511, 286.12",
        "0.5401, 0.0702, 285.40",
    ];
    RoleKey::ALL
        .iter()
        .zip(EXAMPLE_VALUES)
        .map(|(role, value)| format!("{}: {value}", role.label()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Instruction text for asking an assistant to produce a pasteable palette.
pub fn palette_prompt_template() -> String {
    let labels = RoleKey::ALL
        .iter()
        .map(|role| role.label())
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Create an OKLCH palette for a map poster theme. For each of these 11 roles, output one \
line in this exact format: Label: L, C, H (Lightness 0-1, Chroma, Hue 0-360 degrees). Use this \
order and these labels:\n{labels}\n\nDescribe the mood or style you want (e.g. dark indigo, warm \
earth, high contrast). I will paste the output into a map theme editor that accepts OKLCH."
    )
}
