//! The fixed 18-entry color palette: 16 data colors, one per nibble value, and
//! two sentinel colors that carry the framing protocol's markers.
//!
//! The palette is a `const` table. Exact lookups (`nibble_of`) are for lossless
//! sources; `nearest_nibble_of` tolerates colors perturbed by resampling or
//! lossy transport and never fails.

use bytemuck::{Pod, Zeroable};

use crate::error::ChromaError;

//==================================================================================
// 1. Core Types
//==================================================================================

/// One pixel. `#[repr(C)]` with three `u8` fields, so a `&[Color]` is also a
/// packed RGB8 byte buffer via `bytemuck::cast_slice`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Manhattan distance `|Δr| + |Δg| + |Δb|`.
    #[inline]
    pub fn distance(self, other: Color) -> u32 {
        self.r.abs_diff(other.r) as u32
            + self.g.abs_diff(other.g) as u32
            + self.b.abs_diff(other.b) as u32
    }
}

/// The identity of a palette entry: a data nibble or one of the two markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    /// A data nibble, always in `0..=15`.
    Nibble(u8),
    /// Brackets an embedded filename (appears in pairs).
    NameToggle,
    /// Terminates one entry's data.
    FileEnd,
}

//==================================================================================
// 2. The Palette Table
//==================================================================================

pub const NAME_TOGGLE: Color = Color::new(128, 128, 128);
pub const FILE_END: Color = Color::new(128, 0, 128);

const DATA_COLORS: [Color; 16] = [
    Color::new(255, 255, 255),
    Color::new(0, 0, 0),
    Color::new(255, 0, 0),
    Color::new(0, 255, 0),
    Color::new(0, 0, 255),
    Color::new(255, 255, 0),
    Color::new(0, 255, 255),
    Color::new(255, 0, 255),
    Color::new(128, 0, 0),
    Color::new(0, 128, 0),
    Color::new(0, 0, 128),
    Color::new(255, 165, 0),
    Color::new(75, 0, 130),
    Color::new(173, 255, 47),
    Color::new(255, 20, 147),
    Color::new(192, 192, 192),
];

/// Declaration order. Nearest-match ties resolve to the earliest entry.
pub const PALETTE: [(Symbol, Color); 18] = [
    (Symbol::Nibble(0x0), DATA_COLORS[0x0]),
    (Symbol::Nibble(0x1), DATA_COLORS[0x1]),
    (Symbol::Nibble(0x2), DATA_COLORS[0x2]),
    (Symbol::Nibble(0x3), DATA_COLORS[0x3]),
    (Symbol::Nibble(0x4), DATA_COLORS[0x4]),
    (Symbol::Nibble(0x5), DATA_COLORS[0x5]),
    (Symbol::Nibble(0x6), DATA_COLORS[0x6]),
    (Symbol::Nibble(0x7), DATA_COLORS[0x7]),
    (Symbol::Nibble(0x8), DATA_COLORS[0x8]),
    (Symbol::Nibble(0x9), DATA_COLORS[0x9]),
    (Symbol::Nibble(0xA), DATA_COLORS[0xA]),
    (Symbol::Nibble(0xB), DATA_COLORS[0xB]),
    (Symbol::Nibble(0xC), DATA_COLORS[0xC]),
    (Symbol::Nibble(0xD), DATA_COLORS[0xD]),
    (Symbol::Nibble(0xE), DATA_COLORS[0xE]),
    (Symbol::Nibble(0xF), DATA_COLORS[0xF]),
    (Symbol::NameToggle, NAME_TOGGLE),
    (Symbol::FileEnd, FILE_END),
];

/// The color used to pad the final frame of a stream.
pub const PADDING: Color = DATA_COLORS[0];

//==================================================================================
// 3. Public Lookup API
//==================================================================================

/// The canonical color of a data nibble. Only the low four bits are used.
#[inline]
pub fn color_of_nibble(nibble: u8) -> Color {
    DATA_COLORS[(nibble & 0x0F) as usize]
}

/// The canonical color of any symbol.
#[inline]
pub fn color_of(symbol: Symbol) -> Color {
    match symbol {
        Symbol::Nibble(n) => color_of_nibble(n),
        Symbol::NameToggle => NAME_TOGGLE,
        Symbol::FileEnd => FILE_END,
    }
}

/// Exact-match lookup for lossless sources.
pub fn nibble_of(color: Color) -> Result<Symbol, ChromaError> {
    PALETTE
        .iter()
        .find(|(_, candidate)| *candidate == color)
        .map(|(symbol, _)| *symbol)
        .ok_or(ChromaError::UnknownColor {
            r: color.r,
            g: color.g,
            b: color.b,
        })
}

/// Nearest palette entry and its distance. The first-declared entry wins ties.
#[inline]
pub fn nearest_match(color: Color) -> (Symbol, u32) {
    let mut best = PALETTE[0].0;
    let mut best_distance = u32::MAX;
    for (symbol, candidate) in PALETTE.iter() {
        let distance = color.distance(*candidate);
        if distance < best_distance {
            best = *symbol;
            best_distance = distance;
            if distance == 0 {
                break;
            }
        }
    }
    (best, best_distance)
}

/// Approximate lookup for colors that may have been perturbed. Never fails.
#[inline]
pub fn nearest_nibble_of(color: Color) -> Symbol {
    nearest_match(color).0
}
