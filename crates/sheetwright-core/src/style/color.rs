//! Color references as stored in style records

/// A color as referenced by a raw style record
///
/// Colors are kept in their source form; resolving them to RGB is the job of
/// [`ColorRef::to_rgb_hex`] and the style decoder.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ColorRef {
    /// Automatic/default color
    #[default]
    Auto,

    /// Explicit hex color, either `RRGGBB` or `AARRGGBB`, as found in the file
    Rgb(String),

    /// Legacy palette index
    Indexed(u32),

    /// Theme color with optional tint
    Theme {
        /// Theme color index
        index: u32,
        /// Tint (-1.0 to 1.0)
        tint: Option<f64>,
    },
}

/// The indexed color palette
///
/// Indices 0-7 are the eight base colors (black, white, red, green, blue,
/// yellow, magenta, cyan); 8-15 repeat them; 16-63 follow the standard
/// legacy palette. Anything past 63 (including the system foreground and
/// background indices 64/65) has no color.
pub const INDEXED_PALETTE: [&str; 64] = [
    "000000", "FFFFFF", "FF0000", "00FF00", "0000FF", "FFFF00", "FF00FF", "00FFFF", //  0-7
    "000000", "FFFFFF", "FF0000", "00FF00", "0000FF", "FFFF00", "FF00FF", "00FFFF", //  8-15
    "800000", "008000", "000080", "808000", "800080", "008080", "C0C0C0", "808080", // 16-23
    "9999FF", "993366", "FFFFCC", "CCFFFF", "660066", "FF8080", "0066CC", "CCCCFF", // 24-31
    "000080", "FF00FF", "FFFF00", "00FFFF", "800080", "800000", "008080", "0000FF", // 32-39
    "00CCFF", "CCFFFF", "CCFFCC", "FFFF99", "99CCFF", "FF99CC", "CC99FF", "FFCC99", // 40-47
    "3366FF", "33CCCC", "99CC00", "FFCC00", "FF9900", "FF6600", "666699", "969696", // 48-55
    "003366", "339966", "003300", "333300", "993300", "993333", "333399", "333333", // 56-63
];

impl ColorRef {
    /// Parse an explicit hex color, tolerating a leading `#`
    pub fn rgb<S: AsRef<str>>(hex: S) -> Self {
        ColorRef::Rgb(hex.as_ref().trim_start_matches('#').to_string())
    }

    /// Resolve to an upper-case `RRGGBB` string
    ///
    /// An `AARRGGBB` value has its two-character alpha prefix stripped.
    /// Palette indices resolve through [`INDEXED_PALETTE`]. Theme and auto
    /// colors, out-of-table indices, and malformed hex yield `None`.
    pub fn to_rgb_hex(&self) -> Option<String> {
        match self {
            ColorRef::Rgb(hex) => {
                let rgb = match hex.len() {
                    8 => hex.get(2..)?,
                    6 => hex.as_str(),
                    _ => return None,
                };
                if rgb.bytes().all(|b| b.is_ascii_hexdigit()) {
                    Some(rgb.to_ascii_uppercase())
                } else {
                    None
                }
            }
            ColorRef::Indexed(i) => INDEXED_PALETTE
                .get(*i as usize)
                .map(|hex| (*hex).to_string()),
            ColorRef::Theme { .. } | ColorRef::Auto => None,
        }
    }
}
