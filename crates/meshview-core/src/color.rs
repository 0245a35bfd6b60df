//! Model color handling (`#rrggbb` strings from the color picker)

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColorParseError {
    #[error("Color must start with '#': {0}")]
    MissingHash(String),
    #[error("Color must have 6 hex digits: {0}")]
    BadLength(String),
    #[error("Invalid hex digit in color: {0}")]
    BadDigit(String),
}

/// 8-bit sRGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` (case-insensitive)
    pub fn from_hex(s: &str) -> Result<Self, ColorParseError> {
        let digits = s
            .strip_prefix('#')
            .ok_or_else(|| ColorParseError::MissingHash(s.to_string()))?;
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(ColorParseError::BadLength(s.to_string()));
        }

        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| ColorParseError::BadDigit(s.to_string()))
        };

        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }

    /// Format as lowercase `#rrggbb`
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Channels normalized to 0.0..=1.0
    pub fn to_unit(&self) -> [f32; 3] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        ]
    }

    pub fn to_array(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    pub fn from_array(rgb: [u8; 3]) -> Self {
        Self::new(rgb[0], rgb[1], rgb[2])
    }
}

impl Default for Rgb {
    /// Neutral gray used for freshly loaded models
    fn default() -> Self {
        Self::new(0x88, 0x88, 0x88)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Rgb {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(Rgb::from_hex("#888888").unwrap(), Rgb::default());
        assert_eq!(Rgb::from_hex("#FF8000").unwrap(), Rgb::new(255, 128, 0));
        assert_eq!("#0a0B0c".parse::<Rgb>().unwrap().to_hex(), "#0a0b0c");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Rgb::from_hex("888888"), Err(ColorParseError::MissingHash(_))));
        assert!(matches!(Rgb::from_hex("#888"), Err(ColorParseError::BadLength(_))));
        assert!(matches!(Rgb::from_hex("#gg0000"), Err(ColorParseError::BadDigit(_))));
    }

    #[test]
    fn test_unit_channels() {
        assert_eq!(Rgb::new(255, 0, 51).to_unit(), [1.0, 0.0, 0.2]);
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&Rgb::new(1, 2, 3)).unwrap();
        assert_eq!(json, "\"#010203\"");
        let back: Rgb = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Rgb::new(1, 2, 3));
    }
}
