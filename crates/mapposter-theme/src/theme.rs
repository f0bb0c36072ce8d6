use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::color::HexColor;

pub const DEFAULT_THEME_NAME: &str = "Custom";
pub const DEFAULT_THEME_DESCRIPTION: &str = "Custom theme created in the editor";
pub const FALLBACK_THEME_ID: &str = "my_theme";
/// Stem of the hidden-themes list; it shares the theme directory, so no theme may use it.
pub const RESERVED_THEME_ID: &str = "hidden_themes";

/// The eleven color roles a poster renderer consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKey {
    #[serde(rename = "bg")]
    Background,
    Text,
    #[serde(rename = "gradient_color")]
    Gradient,
    Water,
    Parks,
    RoadMotorway,
    RoadPrimary,
    RoadSecondary,
    RoadTertiary,
    RoadResidential,
    RoadDefault,
}

impl RoleKey {
    pub const ALL: [RoleKey; 11] = [
        RoleKey::Background,
        RoleKey::Text,
        RoleKey::Gradient,
        RoleKey::Water,
        RoleKey::Parks,
        RoleKey::RoadMotorway,
        RoleKey::RoadPrimary,
        RoleKey::RoadSecondary,
        RoleKey::RoadTertiary,
        RoleKey::RoadResidential,
        RoleKey::RoadDefault,
    ];

    /// Field name used in theme files.
    pub fn as_str(self) -> &'static str {
        match self {
            RoleKey::Background => "bg",
            RoleKey::Text => "text",
            RoleKey::Gradient => "gradient_color",
            RoleKey::Water => "water",
            RoleKey::Parks => "parks",
            RoleKey::RoadMotorway => "road_motorway",
            RoleKey::RoadPrimary => "road_primary",
            RoleKey::RoadSecondary => "road_secondary",
            RoleKey::RoadTertiary => "road_tertiary",
            RoleKey::RoadResidential => "road_residential",
            RoleKey::RoadDefault => "road_default",
        }
    }

    /// Human label used in pasted palettes.
    pub fn label(self) -> &'static str {
        match self {
            RoleKey::Background => "Background",
            RoleKey::Text => "Text",
            RoleKey::Gradient => "Gradient",
            RoleKey::Water => "Water",
            RoleKey::Parks => "Parks",
            RoleKey::RoadMotorway => "Road - Motorway",
            RoleKey::RoadPrimary => "Road - Primary",
            RoleKey::RoadSecondary => "Road - Secondary",
            RoleKey::RoadTertiary => "Road - Tertiary",
            RoleKey::RoadResidential => "Road - Residential",
            RoleKey::RoadDefault => "Road - Default",
        }
    }

    fn default_hex(self) -> &'static str {
        match self {
            RoleKey::Background => "#F5EDE4",
            RoleKey::Text => "#8B4513",
            RoleKey::Gradient => "#F5EDE4",
            RoleKey::Water => "#A8C4C4",
            RoleKey::Parks => "#E8E0D0",
            RoleKey::RoadMotorway => "#A0522D",
            RoleKey::RoadPrimary => "#B8653A",
            RoleKey::RoadSecondary => "#C9846A",
            RoleKey::RoadTertiary => "#D9A08A",
            RoleKey::RoadResidential => "#E5C4B0",
            RoleKey::RoadDefault => "#D9A08A",
        }
    }

    /// Color this role takes in the built-in default theme.
    pub fn default_color(self) -> HexColor {
        HexColor::from_str(self.default_hex()).unwrap_or_else(|_| HexColor::from_rgb(0, 0, 0))
    }
}

impl Display for RoleKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        RoleKey::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("unknown theme role '{trimmed}'"))
    }
}

/// A complete theme: every role always has a color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    pub name: String,
    pub description: String,
    colors: BTreeMap<RoleKey, HexColor>,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            name: DEFAULT_THEME_NAME.to_string(),
            description: DEFAULT_THEME_DESCRIPTION.to_string(),
            colors: RoleKey::ALL
                .into_iter()
                .map(|role| (role, role.default_color()))
                .collect(),
        }
    }
}

impl Theme {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn color(&self, role: RoleKey) -> &HexColor {
        // Every role is inserted on construction and never removed.
        &self.colors[&role]
    }

    pub fn set_color(&mut self, role: RoleKey, color: HexColor) {
        self.colors.insert(role, color);
    }

    /// Apply a batch of role assignments, returning how many were applied.
    pub fn apply(&mut self, assignments: &BTreeMap<RoleKey, HexColor>) -> usize {
        for (role, color) in assignments {
            self.colors.insert(*role, color.clone());
        }
        assignments.len()
    }

    pub fn colors(&self) -> impl Iterator<Item = (RoleKey, &HexColor)> {
        self.colors.iter().map(|(role, color)| (*role, color))
    }

    pub(crate) fn to_file(&self) -> ThemeFile {
        let get = |role: RoleKey| Some(self.color(role).clone());
        ThemeFile {
            name: Some(self.name.clone()),
            description: Some(self.description.clone()),
            bg: get(RoleKey::Background),
            text: get(RoleKey::Text),
            gradient_color: get(RoleKey::Gradient),
            water: get(RoleKey::Water),
            parks: get(RoleKey::Parks),
            road_motorway: get(RoleKey::RoadMotorway),
            road_primary: get(RoleKey::RoadPrimary),
            road_secondary: get(RoleKey::RoadSecondary),
            road_tertiary: get(RoleKey::RoadTertiary),
            road_residential: get(RoleKey::RoadResidential),
            road_default: get(RoleKey::RoadDefault),
        }
    }

    /// Build a full theme from a possibly partial record, filling gaps from the default theme.
    pub(crate) fn from_file(file: ThemeFile) -> (Self, Vec<RoleKey>) {
        let mut theme = Theme::default();
        let mut missing = Vec::new();
        if let Some(name) = file.name {
            theme.name = name;
        }
        if let Some(description) = file.description {
            theme.description = description;
        }
        let stored = [
            (RoleKey::Background, file.bg),
            (RoleKey::Text, file.text),
            (RoleKey::Gradient, file.gradient_color),
            (RoleKey::Water, file.water),
            (RoleKey::Parks, file.parks),
            (RoleKey::RoadMotorway, file.road_motorway),
            (RoleKey::RoadPrimary, file.road_primary),
            (RoleKey::RoadSecondary, file.road_secondary),
            (RoleKey::RoadTertiary, file.road_tertiary),
            (RoleKey::RoadResidential, file.road_residential),
            (RoleKey::RoadDefault, file.road_default),
        ];
        for (role, color) in stored {
            match color {
                Some(color) => theme.set_color(role, color),
                None => missing.push(role),
            }
        }
        (theme, missing)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_file())
    }
}

/// On-disk and remote record layout. Every field is optional so partial files still load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct ThemeFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg: Option<HexColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<HexColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradient_color: Option<HexColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water: Option<HexColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parks: Option<HexColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub road_motorway: Option<HexColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub road_primary: Option<HexColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub road_secondary: Option<HexColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub road_tertiary: Option<HexColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub road_residential: Option<HexColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub road_default: Option<HexColor>,
}

/// Check that a theme id is filesystem safe.
pub fn validate_theme_id(id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err("theme id cannot be empty".to_string());
    }
    if !id
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
    {
        return Err(format!(
            "theme id '{id}' may only contain ASCII letters, digits, '_' or '-'"
        ));
    }
    if id.eq_ignore_ascii_case(RESERVED_THEME_ID) {
        return Err(format!("theme id '{id}' is reserved"));
    }
    Ok(())
}

/// Turn a typed theme name into an id: trimmed, spaces become underscores.
pub fn theme_id_from_input(raw: &str) -> String {
    let id = raw.trim().replace(' ', "_");
    if id.is_empty() {
        FALLBACK_THEME_ID.to_string()
    } else {
        id
    }
}

/// `warm_earth` becomes `Warm Earth`.
pub fn display_name(id: &str) -> String {
    id.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
