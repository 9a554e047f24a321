use image::Rgb;
use serde::{Deserialize, Serialize};
use tracing::warn;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum TextPosition {
    Top,
    #[default]
    Center,
    Bottom,
}

impl From<String> for TextPosition {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "top" => TextPosition::Top,
            "bottom" => TextPosition::Bottom,
            _ => TextPosition::Center,
        }
    }
}

/// Caption styling as sent by clients in the `textStyle` form field.
///
/// Colours are `"r,g,b"` strings (or `#rrggbb`). Every field has a default, so
/// a partial JSON object is completed field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextStyle {
    pub text_color: String,
    pub stroke_color: String,
    pub stroke_width: u32,
    pub font_size: u32,
    #[serde(alias = "fontName")]
    pub font_family: String,
    pub position: TextPosition,
    pub opacity: f32,
    #[serde(alias = "rotation")]
    pub rotation_degrees: f32,
    #[serde(alias = "enableShadow")]
    pub shadow_enabled: bool,
    pub shadow_color: String,
    pub shadow_offset_x: i32,
    pub shadow_offset_y: i32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            text_color: "255,255,255".to_string(),
            stroke_color: "0,0,0".to_string(),
            stroke_width: 3,
            font_size: 40,
            font_family: "SimHei".to_string(),
            position: TextPosition::Center,
            opacity: 1.0,
            rotation_degrees: 0.0,
            shadow_enabled: false,
            shadow_color: "0,0,0".to_string(),
            shadow_offset_x: 2,
            shadow_offset_y: 2,
        }
    }
}

impl TextStyle {
    /// Parses the client JSON. Blank input or any parse failure yields the
    /// complete default style.
    pub fn from_json(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
            return Self::default();
        };
        match serde_json::from_str(raw) {
            Ok(style) => style,
            Err(e) => {
                warn!(error = %e, "Unparseable text style, using defaults");
                Self::default()
            }
        }
    }

    pub fn text_rgb(&self) -> Rgb<u8> {
        parse_color(&self.text_color)
    }

    pub fn stroke_rgb(&self) -> Rgb<u8> {
        parse_color(&self.stroke_color)
    }

    pub fn shadow_rgb(&self) -> Rgb<u8> {
        parse_color(&self.shadow_color)
    }

    /// Font size in pixels; a zero size falls back to the default.
    pub fn font_px(&self) -> f32 {
        if self.font_size == 0 {
            Self::default().font_size as f32
        } else {
            self.font_size as f32
        }
    }

    pub fn clamped_opacity(&self) -> f32 {
        if self.opacity.is_finite() {
            self.opacity.clamp(0.0, 1.0)
        } else {
            1.0
        }
    }

    /// Manhattan radius of the outline: never thinner than 2px.
    pub fn stroke_radius(&self) -> i32 {
        (self.stroke_width / 2).max(2) as i32
    }

    pub fn rotation_radians(&self) -> f32 {
        if self.rotation_degrees.is_finite() {
            self.rotation_degrees.to_radians()
        } else {
            0.0
        }
    }
}

/// Parses `"r,g,b"` or `#rrggbb`. Anything else, including out-of-range
/// components, resolves to white.
pub fn parse_color(raw: &str) -> Rgb<u8> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix('#') {
        if hex.len() == 6 && hex.is_ascii() {
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
            if let (Some(r), Some(g), Some(b)) = (channel(0), channel(2), channel(4)) {
                return Rgb([r, g, b]);
            }
        }
        return WHITE;
    }

    let parts: Vec<Option<u8>> = raw.split(',').map(|p| p.trim().parse::<u8>().ok()).collect();
    match parts.as_slice() {
        [Some(r), Some(g), Some(b)] => Rgb([*r, *g, *b]),
        _ => WHITE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_style_is_default() {
        assert_eq!(TextStyle::from_json(None), TextStyle::default());
        assert_eq!(TextStyle::from_json(Some("   ")), TextStyle::default());
    }

    #[test]
    fn garbage_style_is_full_default() {
        assert_eq!(TextStyle::from_json(Some("{not json")), TextStyle::default());
        assert_eq!(
            TextStyle::from_json(Some(r#"{"fontSize":"huge","textColor":"1,2,3"}"#)),
            TextStyle::default()
        );
    }

    #[test]
    fn partial_style_keeps_other_defaults() {
        let style = TextStyle::from_json(Some(
            r#"{"textColor":"255,0,0","fontName":"Arial","rotation":15,"enableShadow":true,"position":"BOTTOM"}"#,
        ));
        assert_eq!(style.text_rgb(), Rgb([255, 0, 0]));
        assert_eq!(style.font_family, "Arial");
        assert_eq!(style.rotation_degrees, 15.0);
        assert!(style.shadow_enabled);
        assert_eq!(style.position, TextPosition::Bottom);
        assert_eq!(style.stroke_width, 3);
        assert_eq!(style.font_size, 40);
    }

    #[test]
    fn unknown_position_is_center() {
        let style = TextStyle::from_json(Some(r#"{"position":"left"}"#));
        assert_eq!(style.position, TextPosition::Center);
    }

    #[test]
    fn colors_parse_both_notations() {
        assert_eq!(parse_color("10, 20 ,30"), Rgb([10, 20, 30]));
        assert_eq!(parse_color("#FF8000"), Rgb([255, 128, 0]));
        assert_eq!(parse_color("300,0,0"), WHITE);
        assert_eq!(parse_color("red"), WHITE);
        assert_eq!(parse_color("#12345"), WHITE);
    }

    #[test]
    fn derived_values_are_sanitised() {
        let style = TextStyle {
            font_size: 0,
            opacity: 3.0,
            stroke_width: 9,
            ..TextStyle::default()
        };
        assert_eq!(style.font_px(), 40.0);
        assert_eq!(style.clamped_opacity(), 1.0);
        assert_eq!(style.stroke_radius(), 4);
        assert_eq!(TextStyle { stroke_width: 0, ..TextStyle::default() }.stroke_radius(), 2);
    }
}
