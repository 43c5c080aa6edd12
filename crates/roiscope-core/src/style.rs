//! Shape style: fill, stroke and text.

use peniko::Color;
use serde::{Deserialize, Serialize};

/// An RGB color with a fractional alpha channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RgbaColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    /// Opacity in `0.0..=1.0`.
    pub alpha: f64,
}

impl RgbaColor {
    pub fn new(red: u8, green: u8, blue: u8, alpha: f64) -> Self {
        Self {
            red,
            green,
            blue,
            alpha: if alpha.is_finite() { alpha.clamp(0.0, 1.0) } else { 1.0 },
        }
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 1.0)
    }

    pub fn transparent() -> Self {
        Self::new(0, 0, 0, 0.0)
    }

    /// Alpha quantized to `0..=255`.
    pub fn alpha255(&self) -> u8 {
        (self.alpha.clamp(0.0, 1.0) * 255.0) as u8
    }
}

impl From<Color> for RgbaColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self::new(rgba.r, rgba.g, rgba.b, rgba.a as f64 / 255.0)
    }
}

impl From<RgbaColor> for Color {
    fn from(color: RgbaColor) -> Self {
        Color::from_rgba8(color.red, color.green, color.blue, color.alpha255())
    }
}

/// Stroke width with its unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeWidth {
    pub value: f64,
    /// Length unit as sent by the server (e.g. `PIXEL`).
    pub unit: String,
}

impl StrokeWidth {
    /// Width in pixels.
    pub fn pixels(value: f64) -> Self {
        Self {
            value,
            unit: "PIXEL".to_string(),
        }
    }
}

/// Font settings for labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Font {
    pub family: String,
    /// Style name such as `Normal`, `Italic`, `Bold`.
    pub style: String,
    pub size: f64,
    pub unit: String,
}

impl Default for Font {
    fn default() -> Self {
        Self {
            family: "sans-serif".to_string(),
            style: "Normal".to_string(),
            size: 10.0,
            unit: "PIXEL".to_string(),
        }
    }
}

/// Style properties for shapes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeStyle {
    /// Fill color (None = no fill).
    pub fill_color: Option<RgbaColor>,
    /// Stroke color (None = renderer default).
    pub stroke_color: Option<RgbaColor>,
    pub stroke_width: Option<StrokeWidth>,
    /// Text shown with the shape (the content for labels).
    pub text: Option<String>,
    /// Font, used by labels.
    pub font: Option<Font>,
}

impl ShapeStyle {
    /// Get the stroke color as a peniko Color.
    pub fn stroke(&self) -> Option<Color> {
        self.stroke_color.map(Into::into)
    }

    /// Get the fill color as a peniko Color.
    pub fn fill(&self) -> Option<Color> {
        self.fill_color.map(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpha_quantization() {
        assert_eq!(RgbaColor::new(0, 0, 0, 0.5).alpha255(), 127);
        assert_eq!(RgbaColor::new(0, 0, 0, 1.0).alpha255(), 255);
        assert_eq!(RgbaColor::new(0, 0, 0, 7.0).alpha, 1.0);
    }

    #[test]
    fn test_peniko_conversion() {
        let color = RgbaColor::new(10, 20, 30, 1.0);
        let back: RgbaColor = Color::from(color).into();
        assert_eq!(back, color);
    }
}
