//! Length-prefixed wire codec for structured bus payloads
//!
//! The bus natively carries text. Arrays and records travel as frames:
//!
//! ```text
//! +----------------------+-----------------------------+
//! | length: u32 (BE)     | `length` bytes of UTF-8 JSON |
//! +----------------------+-----------------------------+
//! ```
//!
//! Frames are self-delimiting, so several of them can share one byte stream
//! and JSON text containing any separator is extracted unambiguously.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Error, Result};

/// Size of the length prefix in bytes
pub const LENGTH_PREFIX_BYTES: usize = 4;

/// Append one frame for `value` to `buffer`
pub fn encode_to_wire<T: Serialize + ?Sized>(buffer: &mut Vec<u8>, value: &T) -> Result<()> {
    let json = serde_json::to_vec(value)
        .map_err(|e| Error::Codec(format!("Failed to serialize payload: {}", e)))?;

    let length = u32::try_from(json.len())
        .map_err(|_| Error::Codec(format!("Payload too large for frame: {} bytes", json.len())))?;

    buffer.reserve(LENGTH_PREFIX_BYTES + json.len());
    buffer.extend_from_slice(&length.to_be_bytes());
    buffer.extend_from_slice(&json);
    Ok(())
}

/// Decode the frame starting at `position`
///
/// Returns the decoded value and the position right after the frame.
pub fn decode_from_wire<T: DeserializeOwned>(position: usize, buffer: &[u8]) -> Result<(T, usize)> {
    let body_start = position
        .checked_add(LENGTH_PREFIX_BYTES)
        .filter(|end| *end <= buffer.len())
        .ok_or_else(|| {
            Error::Codec(format!(
                "Buffer of {} bytes too short for length prefix at position {}",
                buffer.len(),
                position
            ))
        })?;

    let mut prefix = [0u8; LENGTH_PREFIX_BYTES];
    prefix.copy_from_slice(&buffer[position..body_start]);
    let length = u32::from_be_bytes(prefix) as usize;

    let body_end = body_start
        .checked_add(length)
        .filter(|end| *end <= buffer.len())
        .ok_or_else(|| {
            Error::Codec(format!(
                "Frame length {} exceeds remaining {} bytes",
                length,
                buffer.len() - body_start
            ))
        })?;

    let text = std::str::from_utf8(&buffer[body_start..body_end])
        .map_err(|e| Error::Codec(format!("Frame is not valid UTF-8: {}", e)))?;

    let value = serde_json::from_str(text)
        .map_err(|e| Error::Codec(format!("Malformed frame content: {}", e)))?;

    Ok((value, body_end))
}

/// Encode `value` as a standalone frame
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    encode_to_wire(&mut buffer, value)?;
    Ok(buffer)
}

/// Decode a standalone frame starting at the beginning of `bytes`
///
/// Bytes past the end of the frame are ignored.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    decode_from_wire(0, bytes).map(|(value, _)| value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnalyzedText, PersonName, Sentence};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_string_array_round_trip() {
        let tokens = strings(&["John", "Smith", "said", "\"hi\"", ",", "ünïcødé"]);
        let frame = encode(&tokens).unwrap();
        let decoded: Vec<String> = decode(&frame).unwrap();
        assert_eq!(decoded, tokens);
    }

    #[test]
    fn test_empty_array_round_trip() {
        let frame = encode(&Vec::<String>::new()).unwrap();
        assert_eq!(&frame[..4], &2u32.to_be_bytes());
        let decoded: Vec<String> = decode(&frame).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_prefix_is_big_endian_byte_length() {
        let frame = encode(&strings(&["é"])).unwrap();
        let body = &frame[LENGTH_PREFIX_BYTES..];
        assert_eq!(body, "[\"é\"]".as_bytes());
        assert_eq!(u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize, body.len());
    }

    #[test]
    fn test_frames_share_one_stream() {
        let mut stream = b"junk".to_vec();
        encode_to_wire(&mut stream, &strings(&["a]", "[b"])).unwrap();
        encode_to_wire(&mut stream, &strings(&["c"])).unwrap();

        let (first, next): (Vec<String>, usize) = decode_from_wire(4, &stream).unwrap();
        let (second, end): (Vec<String>, usize) = decode_from_wire(next, &stream).unwrap();

        assert_eq!(first, strings(&["a]", "[b"]));
        assert_eq!(second, strings(&["c"]));
        assert_eq!(end, stream.len());
    }

    #[test]
    fn test_analyzed_text_round_trip() {
        let text = AnalyzedText::new(vec![Sentence {
            raw: "John Smith left.".to_string(),
            tokens: strings(&["John", "Smith", "left", "."]),
            pos_tags: strings(&["NNP", "NNP", "VBD", "."]),
            person_names: vec![PersonName {
                name: "John Smith".to_string(),
                tokens: strings(&["John", "Smith"]),
                probability: 0.875,
            }],
        }]);

        let decoded: AnalyzedText = decode(&encode(&text).unwrap()).unwrap();
        assert_eq!(decoded, text);
    }

    #[test]
    fn test_truncated_prefix_is_codec_error() {
        let err = decode::<Vec<String>>(&[0, 0, 1]).unwrap_err();
        assert!(matches!(err, Error::Codec(_)));
    }

    #[test]
    fn test_length_exceeding_buffer_is_codec_error() {
        let mut frame = encode(&strings(&["abc"])).unwrap();
        frame.truncate(frame.len() - 1);
        let err = decode::<Vec<String>>(&frame).unwrap_err();
        assert!(matches!(err, Error::Codec(msg) if msg.contains("exceeds")));
    }

    #[test]
    fn test_malformed_json_is_codec_error() {
        let mut frame = 5u32.to_be_bytes().to_vec();
        frame.extend_from_slice(b"[\"a\",");
        let err = decode::<Vec<String>>(&frame).unwrap_err();
        assert!(matches!(err, Error::Codec(msg) if msg.contains("Malformed")));
    }

    #[test]
    fn test_wrong_shape_is_codec_error() {
        let frame = encode(&42).unwrap();
        assert!(matches!(decode::<Vec<String>>(&frame), Err(Error::Codec(_))));
    }

    mod properties {
        use super::super::*;
        use proptest::prelude::*;

        /// Characters JSON escapes or that look like array syntax
        const AWKWARD: &[&str] = &["\"", "\\", "]", "[", ",", "\0", "\n", "é", "日本", " ", "a"];

        fn token() -> impl Strategy<Value = String> {
            prop_oneof![
                any::<String>(),
                prop::collection::vec(prop::sample::select(AWKWARD), 0..12)
                    .prop_map(|parts| parts.concat()),
            ]
        }

        proptest! {
            #[test]
            fn test_any_string_array_round_trips(tokens in prop::collection::vec(token(), 0..16)) {
                let frame = encode(&tokens).unwrap();
                let decoded: Vec<String> = decode(&frame).unwrap();
                prop_assert_eq!(decoded, tokens);
            }

            #[test]
            fn test_frames_decode_back_to_back(
                arrays in prop::collection::vec(prop::collection::vec(token(), 0..6), 1..6)
            ) {
                let mut stream = Vec::new();
                for array in &arrays {
                    encode_to_wire(&mut stream, array).unwrap();
                }

                let mut position = 0;
                for expected in &arrays {
                    let (decoded, next): (Vec<String>, usize) =
                        decode_from_wire(position, &stream).unwrap();
                    prop_assert_eq!(&decoded, expected);
                    position = next;
                }
                prop_assert_eq!(position, stream.len());
            }
        }
    }
}
