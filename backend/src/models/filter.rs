use serde::Serialize;

/// Colour transform applied to the synthesized image before any caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    #[default]
    None,
    Grayscale,
    Vintage,
    Bright,
    Dark,
    Warm,
    Cool,
    Sepia,
    Contrast,
    Saturate,
}

impl FilterKind {
    pub const ALL: [FilterKind; 10] = [
        FilterKind::None,
        FilterKind::Grayscale,
        FilterKind::Vintage,
        FilterKind::Bright,
        FilterKind::Dark,
        FilterKind::Warm,
        FilterKind::Cool,
        FilterKind::Sepia,
        FilterKind::Contrast,
        FilterKind::Saturate,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            FilterKind::None => "none",
            FilterKind::Grayscale => "grayscale",
            FilterKind::Vintage => "vintage",
            FilterKind::Bright => "bright",
            FilterKind::Dark => "dark",
            FilterKind::Warm => "warm",
            FilterKind::Cool => "cool",
            FilterKind::Sepia => "sepia",
            FilterKind::Contrast => "contrast",
            FilterKind::Saturate => "saturate",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            FilterKind::None => "Original",
            FilterKind::Grayscale => "Black & White",
            FilterKind::Vintage => "Vintage",
            FilterKind::Bright => "Bright",
            FilterKind::Dark => "Dark",
            FilterKind::Warm => "Warm",
            FilterKind::Cool => "Cool",
            FilterKind::Sepia => "Sepia",
            FilterKind::Contrast => "High Contrast",
            FilterKind::Saturate => "Vivid",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            FilterKind::None => "Unmodified image",
            FilterKind::Grayscale => "Classic black and white",
            FilterKind::Vintage => "Faded retro tint",
            FilterKind::Bright => "Boosted brightness",
            FilterKind::Dark => "Lowered brightness",
            FilterKind::Warm => "Warm red and yellow tones",
            FilterKind::Cool => "Cool blue tones",
            FilterKind::Sepia => "Brownish old-photo look",
            FilterKind::Contrast => "Stronger contrast",
            FilterKind::Saturate => "Stronger colour saturation",
        }
    }

    /// Case-insensitive lookup by code; missing or unknown codes map to `None`.
    pub fn resolve(code: Option<&str>) -> Self {
        let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) else {
            return FilterKind::None;
        };
        Self::ALL
            .into_iter()
            .find(|f| f.code().eq_ignore_ascii_case(code))
            .unwrap_or_default()
    }
}
