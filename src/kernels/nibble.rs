//! This module contains the pure, stateless kernels that move between bytes,
//! nibbles, palette colors and decoded symbols.
//!
//! These are the per-task transforms the worker pool executes: a byte chunk
//! becomes a color chunk on the encode side, and a frame's color array becomes
//! a symbol array on the decode side. All conversions are big-nibble-first.

use crate::codec::palette::{color_of_nibble, nearest_match, Color, Symbol};
use crate::error::ChromaError;

//==================================================================================
// 1. Byte <-> Nibble
//==================================================================================

/// Splits every byte into its high and low nibble, in that order.
pub fn bytes_to_nibbles(bytes: &[u8]) -> Vec<u8> {
    let mut nibbles = Vec::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        nibbles.push(byte >> 4);
        nibbles.push(byte & 0x0F);
    }
    nibbles
}

/// Pairs nibbles back into bytes. Odd-length input is rejected rather than
/// dropping the trailing nibble.
pub fn nibbles_to_bytes(nibbles: &[u8]) -> Result<Vec<u8>, ChromaError> {
    if nibbles.len() % 2 != 0 {
        return Err(ChromaError::malformed(
            nibbles.len() as u64,
            format!("odd nibble count {} cannot form whole bytes", nibbles.len()),
        ));
    }
    Ok(nibbles
        .chunks_exact(2)
        .map(|pair| ((pair[0] & 0x0F) << 4) | (pair[1] & 0x0F))
        .collect())
}

//==================================================================================
// 2. Worker Kernels
//==================================================================================

/// Encode-side task: one byte chunk to its color run (two colors per byte).
pub fn encode_bytes_to_colors(bytes: &[u8]) -> Vec<Color> {
    let mut colors = Vec::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        colors.push(color_of_nibble(byte >> 4));
        colors.push(color_of_nibble(byte & 0x0F));
    }
    colors
}

/// The result of resolving one frame's colors against the palette.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSymbols {
    pub symbols: Vec<Symbol>,
    /// How many colors were further than the tolerance from every palette entry.
    pub off_palette: usize,
}

/// Decode-side task: resolves every color to its nearest palette symbol.
pub fn decode_colors_to_symbols(colors: &[Color], tolerance: u32) -> DecodedSymbols {
    let mut symbols = Vec::with_capacity(colors.len());
    let mut off_palette = 0;
    for &color in colors {
        let (symbol, distance) = nearest_match(color);
        if distance > tolerance {
            off_palette += 1;
        }
        symbols.push(symbol);
    }
    DecodedSymbols {
        symbols,
        off_palette,
    }
}
