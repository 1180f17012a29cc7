//! The marker-based framing protocol that multiplexes named entries into one
//! logical symbol stream.
//!
//! On the wire an entry is `NAME_TOGGLE, name…, NAME_TOGGLE, data…, FILE_END`,
//! with every name and data byte written as two nibble colors (high first).
//! The encode direction is a lazy color sequence per entry. The decode
//! direction is `StreamDecoder`, a state machine fed with the ordered symbol
//! arrays of consecutive frames, so entries may span any number of frames.

use std::iter;

use crate::codec::palette::{color_of_nibble, Color, Symbol, FILE_END, NAME_TOGGLE};
use crate::error::ChromaError;

//==================================================================================
// 1. Encode Direction
//==================================================================================

/// Colors for a name's bytes, two per byte.
fn nibble_colors(bytes: impl IntoIterator<Item = u8>) -> impl Iterator<Item = Color> {
    bytes
        .into_iter()
        .flat_map(|byte| [color_of_nibble(byte >> 4), color_of_nibble(byte & 0x0F)])
}

/// `NAME_TOGGLE`, the UTF-8 bytes of `name` as nibble colors, `NAME_TOGGLE`.
pub fn entry_header(name: &str) -> Vec<Color> {
    let mut header = Vec::with_capacity(name.len() * 2 + 2);
    header.push(NAME_TOGGLE);
    header.extend(nibble_colors(name.bytes()));
    header.push(NAME_TOGGLE);
    header
}

/// The color closing an entry.
pub fn entry_trailer() -> Color {
    FILE_END
}

/// The complete, lazily produced color sequence of one entry.
pub fn frame_entry<'a, I>(name: &'a str, data: I) -> impl Iterator<Item = Color> + 'a
where
    I: IntoIterator<Item = u8> + 'a,
{
    iter::once(NAME_TOGGLE)
        .chain(nibble_colors(name.bytes()))
        .chain(iter::once(NAME_TOGGLE))
        .chain(nibble_colors(data))
        .chain(iter::once(FILE_END))
}

//==================================================================================
// 2. Decode Direction
//==================================================================================

/// One reconstructed entry, handed to an `EntrySink` once its `FILE_END` is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEntry {
    pub name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    SeekingNameStart,
    ReadingName,
    ReadingData,
}

/// Pairs incoming nibbles into bytes without ever buffering nibbles.
#[derive(Debug, Default)]
struct ByteAssembler {
    bytes: Vec<u8>,
    high: Option<u8>,
}

impl ByteAssembler {
    #[inline]
    fn push(&mut self, nibble: u8) {
        match self.high.take() {
            Some(high) => self.bytes.push((high << 4) | nibble),
            None => self.high = Some(nibble),
        }
    }

    /// Hands out the assembled bytes. A dangling high nibble is an error.
    fn take(&mut self, offset: u64, what: &str) -> Result<Vec<u8>, ChromaError> {
        if self.high.take().is_some() {
            self.bytes.clear();
            return Err(ChromaError::malformed(
                offset,
                format!("odd number of {} nibbles", what),
            ));
        }
        Ok(std::mem::take(&mut self.bytes))
    }

    fn is_empty(&self) -> bool {
        self.bytes.is_empty() && self.high.is_none()
    }
}

/// Nibbles met between entries. A run of zero nibbles is frame padding unless
/// a non-zero nibble follows it; anything else is payload that lost its name.
#[derive(Debug, Default)]
struct StrayRun {
    data: ByteAssembler,
    pending_zeros: u64,
}

impl StrayRun {
    fn push(&mut self, nibble: u8) {
        if nibble == 0 {
            self.pending_zeros += 1;
            return;
        }
        for _ in 0..std::mem::take(&mut self.pending_zeros) {
            self.data.push(0);
        }
        self.data.push(nibble);
    }

    /// Ends the run. Returns the recovered bytes, if any, and the padding length.
    fn close(&mut self) -> (Option<Vec<u8>>, u64) {
        let mut padding = std::mem::take(&mut self.pending_zeros);
        if self.data.is_empty() {
            return (None, padding);
        }
        if self.data.high.is_some() {
            // The last byte's low nibble is zero (or was cut off).
            self.data.push(0);
            padding = padding.saturating_sub(1);
        }
        self.data.high = None;
        (Some(std::mem::take(&mut self.data.bytes)), padding)
    }
}

/// The stateful scanner that turns an unbounded symbol stream back into entries.
#[derive(Debug)]
pub struct StreamDecoder {
    state: DecodeState,
    /// Absolute position of the next symbol in the logical stream.
    offset: u64,
    name: ByteAssembler,
    data: ByteAssembler,
    pending_name: Option<String>,
    stray: StrayRun,
    entries_emitted: u64,
    skipped: u64,
    default_entry_name: String,
}

impl StreamDecoder {
    pub fn new(default_entry_name: impl Into<String>) -> Self {
        Self {
            state: DecodeState::SeekingNameStart,
            offset: 0,
            name: ByteAssembler::default(),
            data: ByteAssembler::default(),
            pending_name: None,
            stray: StrayRun::default(),
            entries_emitted: 0,
            skipped: 0,
            default_entry_name: default_entry_name.into(),
        }
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    pub fn entries_emitted(&self) -> u64 {
        self.entries_emitted
    }

    /// Zero nibbles seen outside any entry (frame padding). Runs still open
    /// are counted once they end.
    pub fn skipped_symbols(&self) -> u64 {
        self.skipped
    }

    /// Feeds the next slice of the stream. Every entry completed inside the
    /// slice is passed to `emit` in stream order.
    pub fn feed<F>(&mut self, symbols: &[Symbol], mut emit: F) -> Result<(), ChromaError>
    where
        F: FnMut(DecodedEntry) -> Result<(), ChromaError>,
    {
        for &symbol in symbols {
            if let Some(entry) = self.push(symbol)? {
                emit(entry)?;
            }
        }
        Ok(())
    }

    /// Advances the state machine by one symbol.
    pub fn push(&mut self, symbol: Symbol) -> Result<Option<DecodedEntry>, ChromaError> {
        let offset = self.offset;
        self.offset += 1;

        match (self.state, symbol) {
            (DecodeState::SeekingNameStart, Symbol::NameToggle) => {
                self.state = DecodeState::ReadingName;
                Ok(self.close_stray())
            }
            (DecodeState::SeekingNameStart, Symbol::Nibble(n)) => {
                self.stray.push(n);
                Ok(None)
            }
            (DecodeState::ReadingName, Symbol::NameToggle) => {
                let raw = self.name.take(offset, "name")?;
                self.pending_name = Some(self.resolve_name(raw));
                self.state = DecodeState::ReadingData;
                Ok(None)
            }
            (DecodeState::ReadingName, Symbol::Nibble(n)) => {
                self.name.push(n);
                Ok(None)
            }
            (DecodeState::ReadingData, Symbol::Nibble(n)) => {
                self.data.push(n);
                Ok(None)
            }
            (DecodeState::ReadingData, Symbol::FileEnd) => {
                let data = self.data.take(offset, "data")?;
                let name = self.pending_name.take().ok_or_else(|| {
                    ChromaError::InternalError("entry closed without a name".to_string())
                })?;
                self.state = DecodeState::SeekingNameStart;
                self.entries_emitted += 1;
                Ok(Some(DecodedEntry { name, data }))
            }
            (DecodeState::ReadingData, Symbol::NameToggle) => Err(ChromaError::malformed(
                offset,
                "name marker inside entry data; previous entry has no FILE_END",
            )),
            (state, Symbol::FileEnd) => Err(ChromaError::malformed(
                offset,
                format!("FILE_END with no open entry data (state {:?})", state),
            )),
        }
    }

    /// Checks that the stream ended between entries. Payload found outside any
    /// entry (a markerless or damaged stream) is returned as a final entry
    /// under a default name.
    pub fn finish(&mut self) -> Result<Option<DecodedEntry>, ChromaError> {
        match self.state {
            DecodeState::SeekingNameStart => Ok(self.close_stray()),
            DecodeState::ReadingName => Err(ChromaError::malformed(
                self.offset,
                "stream ended inside an entry name (unpaired NAME_TOGGLE)",
            )),
            DecodeState::ReadingData => Err(ChromaError::malformed(
                self.offset,
                "stream ended inside entry data (missing FILE_END)",
            )),
        }
    }

    fn close_stray(&mut self) -> Option<DecodedEntry> {
        let (data, padding) = self.stray.close();
        self.skipped += padding;
        let data = data?;
        let name = self.default_name();
        log::warn!(
            "Recovered {} bytes outside any entry (before symbol {}); writing them as '{}'",
            data.len(),
            self.offset,
            name
        );
        self.entries_emitted += 1;
        Some(DecodedEntry { name, data })
    }

    fn default_name(&self) -> String {
        format!("{}-{}", self.default_entry_name, self.entries_emitted)
    }

    fn resolve_name(&self, raw: Vec<u8>) -> String {
        let text = match String::from_utf8(raw) {
            Ok(text) => text,
            Err(err) => {
                log::warn!(
                    "Entry {} has a name that is not valid UTF-8; decoding lossily",
                    self.entries_emitted
                );
                String::from_utf8_lossy(err.as_bytes()).into_owned()
            }
        };
        let trimmed = text.trim_matches('\0');
        if trimmed.is_empty() {
            let fallback = self.default_name();
            log::warn!("Entry has no embedded name; writing it as '{}'", fallback);
            fallback
        } else {
            trimmed.to_string()
        }
    }
}

#[cfg(test)]
#[path = "framer_tests.rs"]
mod tests;
