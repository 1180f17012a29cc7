//! This module is the public entry point for all pure, stateless kernels.
//!
//! Kernels are the units of work the worker pool executes. They take a borrowed
//! chunk of input and return an owned result, touching no shared state, which
//! is what lets the pipelines run them in parallel without locks.

pub mod nibble;

pub use nibble::{
    bytes_to_nibbles, decode_colors_to_symbols, encode_bytes_to_colors, nibbles_to_bytes,
    DecodedSymbols,
};
