//! Color parsing and normalization.
//!
//! Line and point colors arrive as numbers (`0xff0000`), hex strings with or
//! without a prefix (`"#FF0000"`, `"ff0000"`, `"0xff0000"`, `"#f00"`),
//! `rgb(r, g, b)` strings or a handful of CSS names. They all reduce to one
//! packed `0xRRGGBB` value so equivalent inputs produce the same batch key.

/// Errors produced while parsing a color.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColorError {
    /// The color string was empty or whitespace.
    #[error("empty color string")]
    Empty,
    /// A hex string had the wrong length or non-hex digits.
    #[error("invalid hex color: {0:?}")]
    InvalidHex(String),
    /// An `rgb(...)` string was malformed or a channel exceeded 255.
    #[error("invalid rgb() color: {0:?}")]
    InvalidRgb(String),
    /// A name that is not in the supported CSS subset.
    #[error("unknown color name: {0:?}")]
    UnknownName(String),
    /// A numeric color with bits set above 24.
    #[error("color value {0:#x} exceeds 0xffffff")]
    OutOfRange(u32),
}

/// A caller-supplied color before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorValue<'a> {
    /// Packed `0xRRGGBB`.
    Rgb(u32),
    /// Any of the textual forms described in the module docs.
    Text(&'a str),
}

impl From<u32> for ColorValue<'_> {
    fn from(rgb: u32) -> Self {
        ColorValue::Rgb(rgb)
    }
}

impl<'a> From<&'a str> for ColorValue<'a> {
    fn from(text: &'a str) -> Self {
        ColorValue::Text(text)
    }
}

impl<'a> From<&'a String> for ColorValue<'a> {
    fn from(text: &'a String) -> Self {
        ColorValue::Text(text.as_str())
    }
}

const NAMED_COLORS: &[(&str, u32)] = &[
    ("black", 0x000000),
    ("white", 0xffffff),
    ("red", 0xff0000),
    ("green", 0x008000),
    ("lime", 0x00ff00),
    ("blue", 0x0000ff),
    ("yellow", 0xffff00),
    ("cyan", 0x00ffff),
    ("magenta", 0xff00ff),
    ("orange", 0xffa500),
    ("purple", 0x800080),
    ("gray", 0x808080),
    ("grey", 0x808080),
    ("brown", 0xa52a2a),
    ("pink", 0xffc0cb),
];

impl ColorValue<'_> {
    /// Resolve to a packed `0xRRGGBB` value.
    pub fn to_rgb(&self) -> Result<u32, ColorError> {
        match *self {
            ColorValue::Rgb(rgb) if rgb > 0xff_ffff => Err(ColorError::OutOfRange(rgb)),
            ColorValue::Rgb(rgb) => Ok(rgb),
            ColorValue::Text(text) => parse_text(text),
        }
    }

    /// Resolve to the canonical lowercase `#rrggbb` string.
    pub fn to_hex(&self) -> Result<String, ColorError> {
        self.to_rgb().map(hex_string)
    }
}

/// Format a packed color as lowercase `#rrggbb`.
pub fn hex_string(rgb: u32) -> String {
    format!("#{:06x}", rgb & 0xff_ffff)
}

/// Split a packed color into normalized `[r, g, b]` channels.
pub fn rgb_channels(rgb: u32) -> [f32; 3] {
    [
        ((rgb >> 16) & 0xff) as f32 / 255.0,
        ((rgb >> 8) & 0xff) as f32 / 255.0,
        (rgb & 0xff) as f32 / 255.0,
    ]
}

fn parse_text(text: &str) -> Result<u32, ColorError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ColorError::Empty);
    }
    let lower = trimmed.to_ascii_lowercase();

    if let Some(inner) = lower
        .strip_prefix("rgb(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return parse_rgb_function(inner).ok_or_else(|| ColorError::InvalidRgb(text.to_string()));
    }

    if let Some(&(_, rgb)) = NAMED_COLORS.iter().find(|(name, _)| *name == lower) {
        return Ok(rgb);
    }

    let digits = lower
        .strip_prefix('#')
        .or_else(|| lower.strip_prefix("0x"))
        .unwrap_or(&lower);

    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        // A bare word that is neither hex nor a known name.
        if lower.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ColorError::UnknownName(text.to_string()));
        }
        return Err(ColorError::InvalidHex(text.to_string()));
    }

    match digits.len() {
        3 => {
            let short =
                u32::from_str_radix(digits, 16).map_err(|_| ColorError::InvalidHex(text.to_string()))?;
            let r = (short >> 8) & 0xf;
            let g = (short >> 4) & 0xf;
            let b = short & 0xf;
            Ok((r * 0x11) << 16 | (g * 0x11) << 8 | (b * 0x11))
        }
        6 => u32::from_str_radix(digits, 16).map_err(|_| ColorError::InvalidHex(text.to_string())),
        _ => Err(ColorError::InvalidHex(text.to_string())),
    }
}

fn parse_rgb_function(inner: &str) -> Option<u32> {
    let mut channels = inner.split(',').map(|part| part.trim().parse::<u8>());
    let r = channels.next()?.ok()?;
    let g = channels.next()?.ok()?;
    let b = channels.next()?.ok()?;
    if channels.next().is_some() {
        return None;
    }
    Some(u32::from(r) << 16 | u32::from(g) << 8 | u32::from(b))
}
