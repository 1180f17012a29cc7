//! A fixed-capacity accumulator for one frame's worth of colors.
//!
//! The buffer is owned by a pipeline coordinator and never shared with worker
//! tasks. It only ever hands out complete frames: `drain` pads a short buffer
//! with the palette's nibble-0 color up to capacity.

use crate::codec::palette::{Color, PADDING};
use crate::error::ChromaError;

#[derive(Debug)]
pub struct FrameBuffer {
    capacity: usize,
    colors: Vec<Color>,
}

impl FrameBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            colors: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.colors.len() >= self.capacity
    }

    /// Appends one color. Fails with `FrameFull` once at capacity.
    pub fn append(&mut self, color: Color) -> Result<(), ChromaError> {
        if self.is_full() {
            return Err(ChromaError::FrameFull {
                capacity: self.capacity,
            });
        }
        self.colors.push(color);
        Ok(())
    }

    /// Appends as many colors as fit and returns how many were consumed.
    pub fn fill_from(&mut self, colors: &[Color]) -> usize {
        let take = colors.len().min(self.capacity - self.colors.len());
        self.colors.extend_from_slice(&colors[..take]);
        take
    }

    /// Returns exactly `capacity` colors, padding if needed, and resets the buffer.
    pub fn drain(&mut self) -> Vec<Color> {
        let mut frame = std::mem::replace(&mut self.colors, Vec::with_capacity(self.capacity));
        frame.resize(self.capacity, PADDING);
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::palette::{FILE_END, NAME_TOGGLE};

    #[test]
    fn test_append_until_full_then_reject() {
        let mut buffer = FrameBuffer::new(2);
        buffer.append(NAME_TOGGLE).unwrap();
        assert!(!buffer.is_full());
        buffer.append(FILE_END).unwrap();
        assert!(buffer.is_full());

        let result = buffer.append(NAME_TOGGLE);
        assert!(matches!(result, Err(ChromaError::FrameFull { capacity: 2 })));
    }

    #[test]
    fn test_drain_pads_with_nibble_zero_and_resets() {
        let mut buffer = FrameBuffer::new(5);
        buffer.append(FILE_END).unwrap();

        let frame = buffer.drain();
        assert_eq!(frame, vec![FILE_END, PADDING, PADDING, PADDING, PADDING]);
        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn test_fill_from_stops_at_capacity() {
        let mut buffer = FrameBuffer::new(3);
        let colors = [NAME_TOGGLE; 5];
        assert_eq!(buffer.fill_from(&colors), 3);
        assert!(buffer.is_full());
        assert_eq!(buffer.fill_from(&colors), 0);
        assert_eq!(buffer.drain().len(), 3);
        assert_eq!(buffer.fill_from(&colors[3..]), 2);
    }
}
