/*
 * SPDX-FileCopyrightText: 2026 mapi-mime contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! The compressed RTF stream format used by the `RTF_COMPRESSED`
//! property: an LZ77 variant whose 4096-byte window is preseeded with a
//! fixed dictionary of common RTF tokens, plus an uncompressed
//! passthrough form.

use byteorder::{ByteOrder, LittleEndian};

use crate::{ConvertError, Result};

const MAGIC_COMPRESSED: u32 = 0x75465A4C; // "LZFu"
const MAGIC_UNCOMPRESSED: u32 = 0x414C454D; // "MELA"

const WINDOW: usize = 4096;

// The well-known preseed; its length fixes the initial write position.
const DICTIONARY: &[u8] = b"{\\rtf1\\ansi\\mac\\deff0\\deftab720{\\fonttbl;}\
{\\f0\\fnil \\froman \\fswiss \\fmodern \\fscript \\fdecor MS Sans SerifSymbolArial\
Times New RomanCourier{\\colortbl\\red0\\green0\\blue0\r\n\\par \
\\pard\\plain\\f0\\fs20\\b\\i\\u\\tab\\tx";

/// What kind of body a compressed RTF stream encapsulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BodyFormat {
    /// `\fromtext`: RTF generated from a plain-text body.
    Plain,
    /// `\fromhtml`: RTF encapsulating an HTML body.
    Html,
    /// Hand-authored rich text with no plainer source.
    RealRtf,
}

/// Decompresses an `RTF_COMPRESSED` stream to RTF text bytes. The
/// stored CRC is not verified; truncated or malformed streams fail with
/// [`ConvertError::Corrupt`].
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 16 {
        return Err(ConvertError::Corrupt("compressed rtf header truncated"));
    }
    let comp_size = LittleEndian::read_u32(&data[0..4]) as usize;
    let raw_size = LittleEndian::read_u32(&data[4..8]) as usize;
    let magic = LittleEndian::read_u32(&data[8..12]);
    // comp_size counts everything after its own field, so the header
    // alone accounts for 12 of it.
    if comp_size < 12 {
        return Err(ConvertError::Corrupt("compressed rtf size below header"));
    }
    if comp_size
        .checked_add(4)
        .map_or(true, |total| total > data.len())
    {
        return Err(ConvertError::Corrupt("compressed rtf size exceeds stream"));
    }
    let payload = &data[16..comp_size + 4];

    match magic {
        MAGIC_UNCOMPRESSED => {
            if payload.len() < raw_size {
                return Err(ConvertError::Corrupt("uncompressed rtf payload truncated"));
            }
            Ok(payload[..raw_size].to_vec())
        }
        MAGIC_COMPRESSED => {
            let mut window = [0u8; WINDOW];
            window[..DICTIONARY.len()].copy_from_slice(DICTIONARY);
            let mut wpos = DICTIONARY.len();
            let mut out = Vec::with_capacity(raw_size);

            let mut i = 0;
            'blocks: while i < payload.len() {
                let control = payload[i];
                i += 1;
                for bit in 0..8 {
                    if control & (1 << bit) == 0 {
                        let Some(&byte) = payload.get(i) else {
                            break 'blocks;
                        };
                        i += 1;
                        window[wpos % WINDOW] = byte;
                        wpos = (wpos + 1) % WINDOW;
                        out.push(byte);
                    } else {
                        if i + 1 >= payload.len() {
                            break 'blocks;
                        }
                        // Big-endian, unlike the rest of the stream.
                        let dictref = u16::from_be_bytes([payload[i], payload[i + 1]]);
                        i += 2;
                        let mut offset = (dictref >> 4) as usize;
                        if offset == wpos {
                            break 'blocks;
                        }
                        let len = (dictref & 0x0F) as usize + 2;
                        for _ in 0..len {
                            let byte = window[offset % WINDOW];
                            offset += 1;
                            window[wpos % WINDOW] = byte;
                            wpos = (wpos + 1) % WINDOW;
                            out.push(byte);
                        }
                    }
                }
            }

            if out.len() < raw_size {
                return Err(ConvertError::Corrupt("compressed rtf stream truncated"));
            }
            out.truncate(raw_size);
            Ok(out)
        }
        _ => Err(ConvertError::Corrupt("unknown compressed rtf magic")),
    }
}

/// Wraps RTF text bytes in the uncompressed container form. Readers
/// accept it interchangeably with the compressed form.
pub fn compress_uncompressed(rtf: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rtf.len() + 16);
    out.extend_from_slice(&((rtf.len() as u32 + 12).to_le_bytes()));
    out.extend_from_slice(&(rtf.len() as u32).to_le_bytes());
    out.extend_from_slice(&MAGIC_UNCOMPRESSED.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(rtf);
    out
}

/// Determines what body format a compressed RTF stream encapsulates by
/// probing its leading control words.
pub fn probe_body_format(compressed: &[u8]) -> Result<BodyFormat> {
    let rtf = decompress(compressed)?;
    let head = &rtf[..rtf.len().min(1024)];
    if contains(head, b"\\fromhtml") {
        Ok(BodyFormat::Html)
    } else if contains(head, b"\\fromtext") {
        Ok(BodyFormat::Plain)
    } else {
        Ok(BodyFormat::RealRtf)
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len()
        && (0..=haystack.len() - needle.len()).any(|i| &haystack[i..i + needle.len()] == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lzfu_stream(raw_size: u32, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&((payload.len() as u32 + 12).to_le_bytes()));
        out.extend_from_slice(&raw_size.to_le_bytes());
        out.extend_from_slice(&MAGIC_COMPRESSED.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn decompress_literals() {
        // Two literals, then the end marker at write position 209.
        let payload = [0x04, b'A', b'B', 0x0D, 0x10];
        let stream = lzfu_stream(2, &payload);
        assert_eq!(decompress(&stream).unwrap(), b"AB");
    }

    #[test]
    fn decompress_dictionary_reference() {
        // A ten-byte run from the start of the preseeded window, then
        // the end marker at write position 217.
        let payload = [0x03, 0x00, 0x08, 0x0D, 0x90];
        let stream = lzfu_stream(10, &payload);
        assert_eq!(decompress(&stream).unwrap(), b"{\\rtf1\\ans");
    }

    #[test]
    fn uncompressed_round_trip() {
        let rtf = b"{\\rtf1\\ansi hello}";
        let stream = compress_uncompressed(rtf);
        assert_eq!(decompress(&stream).unwrap(), rtf);
    }

    #[test]
    fn truncated_stream_is_corrupt() {
        assert!(matches!(
            decompress(&[0u8; 8]),
            Err(ConvertError::Corrupt(_))
        ));
        let mut stream = compress_uncompressed(b"{\\rtf1}");
        stream.truncate(stream.len() - 2);
        assert!(matches!(decompress(&stream), Err(ConvertError::Corrupt(_))));
    }

    #[test]
    fn undersized_declared_length_is_corrupt() {
        // comp_size smaller than the header itself must be rejected, not
        // turned into an inverted payload slice.
        let mut stream = vec![0u8; 16];
        stream[..4].copy_from_slice(&5u32.to_le_bytes());
        assert!(matches!(decompress(&stream), Err(ConvertError::Corrupt(_))));
    }

    #[test]
    fn probe_detects_encapsulation() {
        for (marker, expected) in [
            (&b"{\\rtf1\\ansi\\fromhtml1 x}"[..], BodyFormat::Html),
            (&b"{\\rtf1\\ansi\\fromtext x}"[..], BodyFormat::Plain),
            (&b"{\\rtf1\\ansi x}"[..], BodyFormat::RealRtf),
        ] {
            let stream = compress_uncompressed(marker);
            assert_eq!(probe_body_format(&stream).unwrap(), expected);
        }
    }
}
