//! Packed signed 32-bit color codec.
//!
//! A color travels as `(red << 24) | (green << 16) | (blue << 8) | alpha255`,
//! reinterpreted as a signed integer.

use crate::style::RgbaColor;

/// Pack a color into its signed wire integer.
pub fn encode_color(color: &RgbaColor) -> i32 {
    let packed = (u32::from(color.red) << 24)
        | (u32::from(color.green) << 16)
        | (u32::from(color.blue) << 8)
        | u32::from(color.alpha255());
    packed as i32
}

/// Unpack a wire integer into a color.
///
/// Accepts any integer the server sends; only the low 32 bits are used.
pub fn decode_color(value: i64) -> RgbaColor {
    let packed = value as u32;
    RgbaColor::new(
        (packed >> 24) as u8,
        (packed >> 16) as u8,
        (packed >> 8) as u8,
        f64::from(packed & 0xff) / 255.0,
    )
}
