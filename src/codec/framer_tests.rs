use super::*;
use crate::codec::frame_buffer::FrameBuffer;
use crate::codec::palette::{nearest_nibble_of, nibble_of, PADDING};

//==============================================================================
// Test Helpers
//==============================================================================

/// Slices a color run into padded frames the way the encoder does.
fn into_frames(colors: impl IntoIterator<Item = Color>, capacity: usize) -> Vec<Vec<Color>> {
    let mut buffer = FrameBuffer::new(capacity);
    let mut frames = Vec::new();
    for color in colors {
        buffer.append(color).unwrap();
        if buffer.is_full() {
            frames.push(buffer.drain());
        }
    }
    if !buffer.is_empty() {
        frames.push(buffer.drain());
    }
    frames
}

fn decode_frames(frames: &[Vec<Color>]) -> Result<Vec<DecodedEntry>, ChromaError> {
    let mut decoder = StreamDecoder::new("untitled");
    let mut entries = Vec::new();
    for frame in frames {
        let symbols: Vec<Symbol> = frame.iter().map(|c| nearest_nibble_of(*c)).collect();
        decoder.feed(&symbols, |entry| {
            entries.push(entry);
            Ok(())
        })?;
    }
    if let Some(entry) = decoder.finish()? {
        entries.push(entry);
    }
    Ok(entries)
}

fn nib(n: u8) -> Symbol {
    Symbol::Nibble(n)
}

//==============================================================================
// Encode Direction
//==============================================================================

#[test]
fn test_frame_entry_layout() {
    let colors: Vec<Symbol> = frame_entry("A", vec![0x7Eu8])
        .map(|c| nibble_of(c).unwrap())
        .collect();
    // 'A' = 0x41
    assert_eq!(
        colors,
        vec![
            Symbol::NameToggle,
            nib(0x4),
            nib(0x1),
            Symbol::NameToggle,
            nib(0x7),
            nib(0xE),
            Symbol::FileEnd,
        ]
    );
}

#[test]
fn test_header_and_trailer_match_lazy_sequence() {
    let data = b"xyz".to_vec();
    let mut spliced = entry_header("dir/file.txt");
    spliced.extend(crate::kernels::nibble::encode_bytes_to_colors(&data));
    spliced.push(entry_trailer());

    let lazy: Vec<Color> = frame_entry("dir/file.txt", data).collect();
    assert_eq!(spliced, lazy);
}

#[test]
fn test_zero_length_file_yields_single_padded_frame() {
    let capacity = 16;
    let frames = into_frames(frame_entry("ab", Vec::<u8>::new()), capacity);
    assert_eq!(frames.len(), 1);

    let frame = &frames[0];
    assert_eq!(frame.len(), capacity);
    let expected_prefix: Vec<Color> = vec![
        NAME_TOGGLE,
        color_of_nibble(0x6),
        color_of_nibble(0x1),
        color_of_nibble(0x6),
        color_of_nibble(0x2),
        NAME_TOGGLE,
        FILE_END,
    ];
    assert_eq!(&frame[..7], expected_prefix.as_slice());
    assert!(frame[7..].iter().all(|c| *c == PADDING));

    let entries = decode_frames(&frames).unwrap();
    assert_eq!(
        entries,
        vec![DecodedEntry {
            name: "ab".to_string(),
            data: vec![]
        }]
    );
}

//==============================================================================
// Decode Direction
//==============================================================================

#[test]
fn test_multi_entry_stream_across_small_frames() {
    let colors: Vec<Color> = frame_entry("a.txt", b"hi".to_vec())
        .chain(frame_entry("b.bin", vec![0x00, 0xFF]))
        .collect();
    let frames = into_frames(colors, 8);
    assert!(frames.len() > 2);
    assert!(frames.iter().all(|f| f.len() == 8));

    let entries = decode_frames(&frames).unwrap();
    assert_eq!(
        entries,
        vec![
            DecodedEntry {
                name: "a.txt".to_string(),
                data: b"hi".to_vec()
            },
            DecodedEntry {
                name: "b.bin".to_string(),
                data: vec![0x00, 0xFF]
            },
        ]
    );
}

#[test]
fn test_file_end_without_open_entry_is_malformed() {
    let mut decoder = StreamDecoder::new("untitled");
    let mut emitted = Vec::new();
    let result = decoder.feed(&[nib(0x1), nib(0x2), Symbol::FileEnd], |entry| {
        emitted.push(entry);
        Ok(())
    });

    match result {
        Err(ChromaError::MalformedStream { offset, .. }) => assert_eq!(offset, 2),
        other => panic!("expected MalformedStream, got {:?}", other),
    }
    assert!(emitted.is_empty());
}

#[test]
fn test_file_end_while_reading_name_is_malformed() {
    let mut decoder = StreamDecoder::new("untitled");
    let result = decoder.feed(&[Symbol::NameToggle, nib(0x4), nib(0x1), Symbol::FileEnd], |_| {
        panic!("no entry may be emitted")
    });
    assert!(matches!(result, Err(ChromaError::MalformedStream { .. })));
}

#[test]
fn test_unterminated_entry_at_end_of_stream_is_malformed() {
    let mut decoder = StreamDecoder::new("untitled");
    decoder
        .feed(&[Symbol::NameToggle, nib(0x4), nib(0x1)], |_| Ok(()))
        .unwrap();
    assert_eq!(decoder.state(), DecodeState::ReadingName);
    assert!(matches!(decoder.finish(), Err(ChromaError::MalformedStream { .. })));

    let mut decoder = StreamDecoder::new("untitled");
    decoder
        .feed(&[Symbol::NameToggle, nib(0x4), nib(0x1), Symbol::NameToggle, nib(0x0)], |_| Ok(()))
        .unwrap();
    assert_eq!(decoder.state(), DecodeState::ReadingData);
    assert!(matches!(decoder.finish(), Err(ChromaError::MalformedStream { .. })));
}

#[test]
fn test_odd_data_nibbles_are_rejected_at_file_end() {
    let mut decoder = StreamDecoder::new("untitled");
    let stream = [
        Symbol::NameToggle,
        nib(0x4),
        nib(0x1),
        Symbol::NameToggle,
        nib(0x7),
        nib(0x7),
        nib(0x7),
        Symbol::FileEnd,
    ];
    let result = decoder.feed(&stream, |_| panic!("no entry may be emitted"));
    match result {
        Err(ChromaError::MalformedStream { offset, reason }) => {
            assert_eq!(offset, 7);
            assert!(reason.contains("data"));
        }
        other => panic!("expected MalformedStream, got {:?}", other),
    }
}

#[test]
fn test_odd_name_nibbles_are_rejected() {
    let mut decoder = StreamDecoder::new("untitled");
    let result = decoder.feed(&[Symbol::NameToggle, nib(0x4), Symbol::NameToggle], |_| Ok(()));
    assert!(matches!(result, Err(ChromaError::MalformedStream { .. })));
}

#[test]
fn test_name_marker_inside_data_is_malformed() {
    let mut decoder = StreamDecoder::new("untitled");
    let stream = [
        Symbol::NameToggle,
        nib(0x4),
        nib(0x1),
        Symbol::NameToggle,
        nib(0x0),
        nib(0x1),
        Symbol::NameToggle,
    ];
    assert!(matches!(
        decoder.feed(&stream, |_| Ok(())),
        Err(ChromaError::MalformedStream { .. })
    ));
}

#[test]
fn test_padding_between_entries_is_skipped() {
    let mut decoder = StreamDecoder::new("untitled");
    let mut stream = vec![nib(0x0); 5];
    stream.extend([
        Symbol::NameToggle,
        nib(0x4),
        nib(0x1),
        Symbol::NameToggle,
        Symbol::FileEnd,
    ]);
    stream.extend(vec![nib(0x0); 3]);

    let mut entries = Vec::new();
    decoder
        .feed(&stream, |entry| {
            entries.push(entry);
            Ok(())
        })
        .unwrap();
    assert_eq!(decoder.finish().unwrap(), None);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "A");
    assert_eq!(decoder.skipped_symbols(), 8);
}

#[test]
fn test_markerless_stream_becomes_one_default_entry() {
    let symbols: Vec<Symbol> = crate::kernels::nibble::encode_bytes_to_colors(b"hello!!!")
        .into_iter()
        .map(|c| nibble_of(c).unwrap())
        .chain(vec![nib(0x0); 6])
        .collect();
    let mut decoder = StreamDecoder::new("untitled");
    decoder.feed(&symbols, |_| panic!("nothing closes before the end")).unwrap();

    let entry = decoder.finish().unwrap();
    assert_eq!(
        entry,
        Some(DecodedEntry {
            name: "untitled-0".to_string(),
            data: b"hello!!!".to_vec()
        })
    );
    assert_eq!(decoder.skipped_symbols(), 6);
    assert_eq!(decoder.entries_emitted(), 1);
}

#[test]
fn test_stray_data_before_an_entry_is_recovered_first() {
    let mut stream = vec![nib(0x0), nib(0x0), nib(0x1), nib(0x0), nib(0x0), nib(0x0)];
    stream.extend([
        Symbol::NameToggle,
        nib(0x4),
        nib(0x1),
        Symbol::NameToggle,
        nib(0x2),
        nib(0xA),
        Symbol::FileEnd,
    ]);

    let mut decoder = StreamDecoder::new("untitled");
    let mut entries = Vec::new();
    decoder
        .feed(&stream, |entry| {
            entries.push(entry);
            Ok(())
        })
        .unwrap();
    assert_eq!(decoder.finish().unwrap(), None);

    // The first trailing zero completes 0x10; the other two are padding.
    assert_eq!(
        entries,
        vec![
            DecodedEntry {
                name: "untitled-0".to_string(),
                data: vec![0x00, 0x10]
            },
            DecodedEntry {
                name: "A".to_string(),
                data: vec![0x2A]
            },
        ]
    );
    assert_eq!(decoder.skipped_symbols(), 2);
}

#[test]
fn test_empty_and_nul_padded_names_get_default_name() {
    let mut decoder = StreamDecoder::new("recovered");
    let stream = [
        // Empty name.
        Symbol::NameToggle,
        Symbol::NameToggle,
        Symbol::FileEnd,
        // Name made only of NUL bytes.
        Symbol::NameToggle,
        nib(0x0),
        nib(0x0),
        Symbol::NameToggle,
        nib(0x4),
        nib(0x2),
        Symbol::FileEnd,
        // NUL-padded real name.
        Symbol::NameToggle,
        nib(0x0),
        nib(0x0),
        nib(0x7),
        nib(0x8),
        nib(0x0),
        nib(0x0),
        Symbol::NameToggle,
        Symbol::FileEnd,
    ];
    let mut names = Vec::new();
    decoder
        .feed(&stream, |entry| {
            names.push(entry.name);
            Ok(())
        })
        .unwrap();
    assert_eq!(names, vec!["recovered-0", "recovered-1", "x"]);
}

#[test]
fn test_emit_error_stops_decoding() {
    let colors: Vec<Symbol> = frame_entry("a", vec![1u8])
        .chain(frame_entry("b", vec![2u8]))
        .map(|c| nibble_of(c).unwrap())
        .collect();
    let mut decoder = StreamDecoder::new("untitled");
    let mut seen = 0;
    let result = decoder.feed(&colors, |_| {
        seen += 1;
        Err(ChromaError::SourceUnavailable("disk full".to_string()))
    });
    assert!(matches!(result, Err(ChromaError::SourceUnavailable(_))));
    assert_eq!(seen, 1);
}
