//! The color codec: the palette, the per-frame color accumulator, and the
//! marker-based framing protocol.
//!
//! Everything here is single-threaded and owned by a pipeline coordinator.

pub mod frame_buffer;
pub mod framer;
pub mod palette;

pub use frame_buffer::FrameBuffer;
pub use framer::{entry_header, entry_trailer, frame_entry, DecodeState, DecodedEntry, StreamDecoder};
pub use palette::{color_of, nearest_nibble_of, nibble_of, Color, Symbol, FILE_END, NAME_TOGGLE, PADDING};
