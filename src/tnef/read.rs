/*
 * SPDX-FileCopyrightText: 2026 mapi-mime contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use byteorder::{ByteOrder, LittleEndian};
use encoding_rs::WINDOWS_1252;
use uuid::Uuid;

use crate::{
    core::{
        property::{
            AttachMethod, Attachment, NamedKind, NamedPropId, PropId, PropType, PropValue,
            PropertyBag, RenderInfo,
        },
        recipient::{Recipient, RecipientType},
        tags,
    },
    tnef::{
        checksum, from_filetime, ATT_ATTACHMENT, ATT_ATTACH_DATA, ATT_ATTACH_REND_DATA,
        ATT_ATTACH_TITLE, ATT_MAPI_PROPS, ATT_MESSAGE_CLASS, ATT_OEM_CODEPAGE, ATT_RECIP_TABLE,
        ATT_TNEF_VERSION, LVL_ATTACHMENT, LVL_MESSAGE, MAX_NESTING, SIGNATURE,
    },
    ConvertError, Diagnostic, DiagnosticCode, Result,
};

/// Parses a TNEF stream into a property bag. Diagnostics report
/// attributes that were skipped rather than understood.
pub fn decode(data: &[u8]) -> Result<(PropertyBag, Vec<Diagnostic>)> {
    let mut reader = TnefReader::new(data)?;
    let bag = reader.read_message()?;
    Ok((bag, reader.diagnostics))
}

struct PendingAttachment {
    render: RenderInfo,
    props: PropertyBag,
    legacy_data: Option<Vec<u8>>,
    legacy_title: Option<String>,
}

/// A streaming TNEF block reader. Blocks are checksum-verified as they
/// are consumed; a mismatch fails the whole stream.
pub struct TnefReader<'a> {
    cursor: Cursor<'a>,
    codepage: u16,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> TnefReader<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let mut cursor = Cursor { data, pos: 0 };
        if cursor.read_u32()? != SIGNATURE {
            return Err(ConvertError::Corrupt("bad container signature"));
        }
        cursor.read_u16()?; // legacy attachment key
        Ok(TnefReader {
            cursor,
            codepage: 1252,
            diagnostics: Vec::new(),
        })
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn read_message(&mut self) -> Result<PropertyBag> {
        let mut bag = PropertyBag::new();
        let mut pending: Option<PendingAttachment> = None;

        while !self.cursor.at_end() {
            let level = self.cursor.read_u8()?;
            let id = self.cursor.read_u32()?;
            let len = self.cursor.read_u32()? as usize;
            let payload = self.cursor.take(len)?;
            let stored = self.cursor.read_u16()?;
            if stored != checksum(payload) {
                return Err(ConvertError::Corrupt("block checksum mismatch"));
            }

            match (level, id) {
                (LVL_MESSAGE, ATT_TNEF_VERSION) => {}
                (LVL_MESSAGE, ATT_OEM_CODEPAGE) => {
                    if payload.len() >= 4 {
                        self.codepage = LittleEndian::read_u32(payload) as u16;
                        bag.set(
                            tags::INTERNET_CPID,
                            PropValue::Int32(self.codepage as i32),
                        );
                    }
                }
                (LVL_MESSAGE, ATT_MESSAGE_CLASS) => {
                    let class = self.decode_string8(trim_nul(payload));
                    bag.set(tags::MESSAGE_CLASS, PropValue::Unicode(class));
                }
                (LVL_MESSAGE, ATT_MAPI_PROPS) => {
                    let mut cursor = Cursor {
                        data: payload,
                        pos: 0,
                    };
                    self.read_prop_block(&mut cursor, &mut bag, 0)?;
                }
                (LVL_MESSAGE, ATT_RECIP_TABLE) => {
                    let mut cursor = Cursor {
                        data: payload,
                        pos: 0,
                    };
                    let rows = cursor.read_u32()?;
                    for _ in 0..rows {
                        let mut row = PropertyBag::new();
                        self.read_prop_block(&mut cursor, &mut row, 0)?;
                        bag.recipients.push(recipient_from_row(row));
                    }
                }
                (LVL_ATTACHMENT, ATT_ATTACH_REND_DATA) => {
                    if let Some(done) = pending.take() {
                        bag.attachments.push(finish_attachment(done));
                    }
                    if payload.len() < 14 {
                        return Err(ConvertError::Corrupt("render record truncated"));
                    }
                    pending = Some(PendingAttachment {
                        render: RenderInfo {
                            attach_type: LittleEndian::read_u16(&payload[0..2]),
                            position: LittleEndian::read_u32(&payload[2..6]),
                            width: LittleEndian::read_u16(&payload[6..8]),
                            height: LittleEndian::read_u16(&payload[8..10]),
                            flags: LittleEndian::read_u32(&payload[10..14]),
                        },
                        props: PropertyBag::new(),
                        legacy_data: None,
                        legacy_title: None,
                    });
                }
                (LVL_ATTACHMENT, ATT_ATTACH_DATA) => {
                    let slot = pending
                        .as_mut()
                        .ok_or(ConvertError::Corrupt("attachment data before render record"))?;
                    slot.legacy_data = Some(payload.to_vec());
                }
                (LVL_ATTACHMENT, ATT_ATTACH_TITLE) => {
                    let slot = pending
                        .as_mut()
                        .ok_or(ConvertError::Corrupt("attachment title before render record"))?;
                    slot.legacy_title = Some(self.decode_string8(trim_nul(payload)));
                }
                (LVL_ATTACHMENT, ATT_ATTACHMENT) => {
                    let slot = pending
                        .as_mut()
                        .ok_or(ConvertError::Corrupt("attachment props before render record"))?;
                    let mut cursor = Cursor {
                        data: payload,
                        pos: 0,
                    };
                    let mut props = PropertyBag::new();
                    self.read_prop_block(&mut cursor, &mut props, 0)?;
                    for (id, value) in props.iter() {
                        slot.props.set(id.clone(), value.clone());
                    }
                }
                (LVL_MESSAGE | LVL_ATTACHMENT, other) => {
                    self.diagnostics.push(Diagnostic::info(
                        DiagnosticCode::SkippedProperty,
                        format!("unhandled container attribute 0x{other:08x}"),
                    ));
                }
                _ => return Err(ConvertError::Corrupt("unknown block level")),
            }
        }

        if let Some(done) = pending.take() {
            bag.attachments.push(finish_attachment(done));
        }
        Ok(bag)
    }

    fn read_prop_block(
        &mut self,
        cursor: &mut Cursor<'_>,
        bag: &mut PropertyBag,
        depth: usize,
    ) -> Result<()> {
        if depth > MAX_NESTING {
            return Err(ConvertError::TooComplex("embedded messages nested too deeply"));
        }
        let count = cursor.read_u32()?;
        for _ in 0..count {
            let type_code = cursor.read_u16()?;
            let raw_id = cursor.read_u16()?;
            let prop_type = PropType::from_code(type_code)
                .ok_or(ConvertError::Corrupt("unknown property type"))?;

            let id = if raw_id >= tags::NAMED_PROP_START {
                let guid = Uuid::from_bytes_le(
                    cursor
                        .take(16)?
                        .try_into()
                        .map_err(|_| ConvertError::Corrupt("short guid"))?,
                );
                let kind = match cursor.read_u32()? {
                    0 => NamedKind::Id(cursor.read_u32()?),
                    1 => {
                        let len = cursor.read_u32()? as usize;
                        let bytes = cursor.take(len)?;
                        cursor.align4()?;
                        NamedKind::Name(decode_utf16z(bytes)?)
                    }
                    _ => return Err(ConvertError::Corrupt("unknown name kind")),
                };
                PropId::Named(NamedPropId { guid, kind })
            } else {
                PropId::Numbered(raw_id)
            };

            let value = self.read_value(cursor, prop_type, depth)?;
            bag.set(id, value);
        }
        Ok(())
    }

    fn read_value(
        &mut self,
        cursor: &mut Cursor<'_>,
        prop_type: PropType,
        depth: usize,
    ) -> Result<PropValue> {
        if prop_type.is_multi_value() {
            let count = cursor.read_u32()? as usize;
            if count > cursor.remaining() {
                return Err(ConvertError::Corrupt("value count exceeds stream"));
            }
            return Ok(match prop_type {
                PropType::MvInt16 => {
                    let mut v = Vec::with_capacity(count);
                    for _ in 0..count {
                        v.push(cursor.read_i32()? as i16);
                    }
                    PropValue::MvInt16(v)
                }
                PropType::MvInt32 => {
                    let mut v = Vec::with_capacity(count);
                    for _ in 0..count {
                        v.push(cursor.read_i32()?);
                    }
                    PropValue::MvInt32(v)
                }
                PropType::MvFloat => {
                    let mut v = Vec::with_capacity(count);
                    for _ in 0..count {
                        v.push(f32::from_bits(cursor.read_u32()?));
                    }
                    PropValue::MvFloat(v)
                }
                PropType::MvDouble => {
                    let mut v = Vec::with_capacity(count);
                    for _ in 0..count {
                        v.push(f64::from_bits(cursor.read_u64()?));
                    }
                    PropValue::MvDouble(v)
                }
                PropType::MvCurrency => {
                    let mut v = Vec::with_capacity(count);
                    for _ in 0..count {
                        v.push(cursor.read_i64()?);
                    }
                    PropValue::MvCurrency(v)
                }
                PropType::MvInt64 => {
                    let mut v = Vec::with_capacity(count);
                    for _ in 0..count {
                        v.push(cursor.read_i64()?);
                    }
                    PropValue::MvInt64(v)
                }
                PropType::MvSysTime => {
                    let mut v = Vec::with_capacity(count);
                    for _ in 0..count {
                        v.push(from_filetime(cursor.read_i64()?)?);
                    }
                    PropValue::MvTime(v)
                }
                PropType::MvGuid => {
                    let mut v = Vec::with_capacity(count);
                    for _ in 0..count {
                        v.push(Uuid::from_bytes_le(
                            cursor
                                .take(16)?
                                .try_into()
                                .map_err(|_| ConvertError::Corrupt("short guid"))?,
                        ));
                    }
                    PropValue::MvGuid(v)
                }
                PropType::MvString8 => {
                    let mut v = Vec::with_capacity(count);
                    for _ in 0..count {
                        let bytes = cursor.chunk()?;
                        v.push(self.decode_string8(trim_nul(bytes)));
                    }
                    PropValue::MvString8(v)
                }
                PropType::MvUnicode => {
                    let mut v = Vec::with_capacity(count);
                    for _ in 0..count {
                        v.push(decode_utf16z(cursor.chunk()?)?);
                    }
                    PropValue::MvUnicode(v)
                }
                PropType::MvBinary => {
                    let mut v = Vec::with_capacity(count);
                    for _ in 0..count {
                        v.push(cursor.chunk()?.to_vec());
                    }
                    PropValue::MvBinary(v)
                }
                _ => unreachable!(),
            });
        }

        Ok(match prop_type {
            PropType::Int16 => PropValue::Int16(cursor.read_i32()? as i16),
            PropType::Boolean => PropValue::Bool(cursor.read_i32()? != 0),
            PropType::Int32 => PropValue::Int32(cursor.read_i32()?),
            PropType::ErrorCode => PropValue::ErrorCode(cursor.read_u32()?),
            PropType::Float => PropValue::Float(f32::from_bits(cursor.read_u32()?)),
            PropType::Double => PropValue::Double(f64::from_bits(cursor.read_u64()?)),
            PropType::AppTime => PropValue::AppTime(f64::from_bits(cursor.read_u64()?)),
            PropType::Currency => PropValue::Currency(cursor.read_i64()?),
            PropType::Int64 => PropValue::Int64(cursor.read_i64()?),
            PropType::SysTime => PropValue::Time(from_filetime(cursor.read_i64()?)?),
            PropType::Guid => PropValue::Guid(Uuid::from_bytes_le(
                cursor
                    .take(16)?
                    .try_into()
                    .map_err(|_| ConvertError::Corrupt("short guid"))?,
            )),
            PropType::String8 => {
                let bytes = cursor.scalar_chunk()?;
                PropValue::String8(self.decode_string8(trim_nul(bytes)))
            }
            PropType::Unicode => PropValue::Unicode(decode_utf16z(cursor.scalar_chunk()?)?),
            PropType::Binary => PropValue::Binary(cursor.scalar_chunk()?.to_vec()),
            PropType::Object => {
                let bytes = cursor.scalar_chunk()?;
                if bytes.len() >= 16
                    && Uuid::from_bytes_le(bytes[..16].try_into().unwrap_or_default())
                        == tags::IID_IMESSAGE
                {
                    let mut inner = Cursor {
                        data: &bytes[16..],
                        pos: 0,
                    };
                    let mut nested = PropertyBag::new();
                    self.read_prop_block(&mut inner, &mut nested, depth + 1)?;
                    PropValue::Object(Box::new(nested))
                } else {
                    // Unknown interface; keep the payload opaque.
                    PropValue::Binary(bytes.to_vec())
                }
            }
            _ => unreachable!("multi-value handled above"),
        })
    }

    fn decode_string8(&self, bytes: &[u8]) -> String {
        let encoding = codepage::to_encoding(self.codepage).unwrap_or(WINDOWS_1252);
        encoding.decode(bytes).0.into_owned()
    }
}

fn recipient_from_row(mut row: PropertyBag) -> Recipient {
    let kind = row
        .remove_tag(tags::RECIPIENT_TYPE)
        .and_then(|v| v.as_i32())
        .and_then(RecipientType::from_code)
        .unwrap_or(RecipientType::To);
    let mut recipient = Recipient::new(kind);
    recipient.name = row
        .remove_tag(tags::DISPLAY_NAME)
        .and_then(|v| v.as_str().map(str::to_string));
    recipient.addr_type = row
        .remove_tag(tags::ADDRTYPE)
        .and_then(|v| v.as_str().map(str::to_string));
    recipient.email = row
        .remove_tag(tags::EMAIL_ADDRESS)
        .and_then(|v| v.as_str().map(str::to_string));
    recipient.props = row;
    recipient
}

fn finish_attachment(pending: PendingAttachment) -> Attachment {
    let mut props = pending.props;
    // The property block is authoritative; legacy attributes fill gaps.
    if let Some(data) = pending.legacy_data {
        props.set_if_absent(tags::ATTACH_DATA, PropValue::Binary(data));
    }
    if let Some(title) = pending.legacy_title {
        props.set_if_absent(tags::ATTACH_LONG_FILENAME, PropValue::Unicode(title));
    }
    let method = props
        .remove_tag(tags::ATTACH_METHOD)
        .and_then(|v| v.as_i32())
        .and_then(AttachMethod::from_code)
        .unwrap_or_default();
    Attachment {
        props,
        method,
        render: pending.render,
    }
}

fn trim_nul(bytes: &[u8]) -> &[u8] {
    match bytes.split_last() {
        Some((0, rest)) => rest,
        _ => bytes,
    }
}

fn decode_utf16z(bytes: &[u8]) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(ConvertError::Corrupt("odd utf-16 length"));
    }
    let mut units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    if units.last() == Some(&0) {
        units.pop();
    }
    Ok(String::from_utf16_lossy(&units))
}

/// A bounds-checked little-endian slice cursor. Alignment is relative
/// to the slice start, which every property block begins at.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(ConvertError::Corrupt("stream truncated"));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    fn read_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    fn read_i64(&mut self) -> Result<i64> {
        Ok(LittleEndian::read_i64(self.take(8)?))
    }

    fn align4(&mut self) -> Result<()> {
        while self.pos % 4 != 0 {
            self.take(1)?;
        }
        Ok(())
    }

    /// A length-prefixed value chunk followed by alignment padding.
    fn chunk(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        self.align4()?;
        Ok(bytes)
    }

    /// The one-element framing used by variable-length scalars.
    fn scalar_chunk(&mut self) -> Result<&'a [u8]> {
        if self.read_u32()? != 1 {
            return Err(ConvertError::Corrupt("bad scalar value count"));
        }
        self.chunk()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tnef::encode;
    use chrono::TimeZone;

    fn sample_bag() -> PropertyBag {
        let mut bag = PropertyBag::new();
        bag.set(
            tags::MESSAGE_CLASS,
            PropValue::Unicode("IPM.Note".into()),
        );
        bag.set(tags::SUBJECT, PropValue::Unicode("status report".into()));
        bag.set(tags::BODY, PropValue::Unicode("All systems nominal.\r\n".into()));
        bag.set(tags::IMPORTANCE, PropValue::Int32(2));
        bag.set(tags::HAS_ATTACH, PropValue::Bool(true));
        bag.set(
            tags::CLIENT_SUBMIT_TIME,
            PropValue::Time(chrono::Utc.with_ymd_and_hms(2004, 2, 29, 8, 0, 1).unwrap()),
        );
        bag
    }

    #[test]
    fn round_trip_basic_message() {
        let bag = sample_bag();
        let stream = encode(&bag, 1252).unwrap();
        let (decoded, diags) = decode(&stream).unwrap();
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(decoded.get_tag(tags::SUBJECT), bag.get_tag(tags::SUBJECT));
        assert_eq!(decoded.get_tag(tags::BODY), bag.get_tag(tags::BODY));
        assert_eq!(
            decoded.get_tag(tags::HAS_ATTACH).and_then(|v| v.as_bool()),
            Some(true)
        );
        assert_eq!(
            decoded.get_tag(tags::CLIENT_SUBMIT_TIME),
            bag.get_tag(tags::CLIENT_SUBMIT_TIME)
        );
        assert_eq!(
            decoded.get_tag(tags::INTERNET_CPID).and_then(|v| v.as_i32()),
            Some(1252)
        );
    }

    #[test]
    fn round_trip_named_and_multi_value() {
        let mut bag = sample_bag();
        bag.set(
            PropId::Named(NamedPropId::by_id(tags::PSETID_COMMON, tags::LID_REMINDER_SET)),
            PropValue::Bool(true),
        );
        bag.set(
            PropId::Named(NamedPropId::by_name(
                tags::PS_INTERNET_HEADERS,
                "x-loop-count",
            )),
            PropValue::Unicode("3".into()),
        );
        bag.set(0x1234u16, PropValue::MvInt16(vec![-5, 0, 1000]));
        bag.set(0x8001u16, PropValue::Int32(7));
        bag.set(0x3A10u16, PropValue::MvUnicode(vec!["a".into(), "bc".into()]));
        bag.set(
            0x0FF9u16,
            PropValue::MvBinary(vec![vec![1], vec![], vec![2, 3, 4, 5, 6]]),
        );

        let stream = encode(&bag, 1252).unwrap();
        let (decoded, _) = decode(&stream).unwrap();
        for tag in [0x1234u16, 0x3A10, 0x0FF9] {
            assert_eq!(decoded.get_tag(tag), bag.get_tag(tag), "tag {tag:04x}");
        }
        // A numbered id in the named range is a transient store handle
        // and does not survive serialization.
        assert_eq!(decoded.get_tag(0x8001), None);
        let reminder = PropId::Named(NamedPropId::by_id(
            tags::PSETID_COMMON,
            tags::LID_REMINDER_SET,
        ));
        assert_eq!(decoded.get(&reminder).and_then(|v| v.as_bool()), Some(true));
        let header = PropId::Named(NamedPropId::by_name(
            tags::PS_INTERNET_HEADERS,
            "x-loop-count",
        ));
        assert_eq!(decoded.get(&header).and_then(|v| v.as_str()), Some("3"));
    }

    #[test]
    fn round_trip_attachments_and_recipients() {
        let mut bag = sample_bag();
        bag.recipients.push(Recipient::smtp(
            RecipientType::To,
            Some("Pat Reader"),
            "pat@example.com",
        ));
        bag.recipients
            .push(Recipient::smtp(RecipientType::Bcc, None, "audit@example.com"));

        let mut file = Attachment::default();
        file.props
            .set(tags::ATTACH_DATA, PropValue::Binary(b"PK\x03\x04data".to_vec()));
        file.props.set(
            tags::ATTACH_LONG_FILENAME,
            PropValue::Unicode("report.zip".into()),
        );
        file.props.set(
            tags::ATTACH_MIME_TAG,
            PropValue::Unicode("application/zip".into()),
        );
        bag.attachments.push(file);

        let mut nested_bag = PropertyBag::new();
        nested_bag.set(tags::SUBJECT, PropValue::Unicode("inner".into()));
        let mut nested = Attachment {
            method: AttachMethod::EmbeddedMessage,
            ..Attachment::default()
        };
        nested.props.set(
            tags::ATTACH_DATA,
            PropValue::Object(Box::new(nested_bag.clone())),
        );
        bag.attachments.push(nested);

        let stream = encode(&bag, 1252).unwrap();
        let (decoded, _) = decode(&stream).unwrap();

        assert_eq!(decoded.recipients.len(), 2);
        assert_eq!(decoded.recipients[0].kind, RecipientType::To);
        assert_eq!(decoded.recipients[0].email.as_deref(), Some("pat@example.com"));
        assert_eq!(decoded.recipients[1].kind, RecipientType::Bcc);

        assert_eq!(decoded.attachments.len(), 2);
        let file = &decoded.attachments[0];
        assert_eq!(file.method, AttachMethod::ByValue);
        assert_eq!(file.content(), Some(&b"PK\x03\x04data"[..]));
        assert_eq!(file.filename(), Some("report.zip"));
        assert_eq!(file.mime_tag(), Some("application/zip"));

        let nested = &decoded.attachments[1];
        assert_eq!(nested.method, AttachMethod::EmbeddedMessage);
        assert_eq!(nested.embedded_message(), Some(&nested_bag));
    }

    #[test]
    fn checksum_mismatch_is_corrupt() {
        let stream = encode(&sample_bag(), 1252).unwrap();
        let mut broken = stream.clone();
        // Flip a byte inside the first block payload.
        broken[16] ^= 0xFF;
        assert!(matches!(
            decode(&broken),
            Err(ConvertError::Corrupt(_))
        ));
    }

    #[test]
    fn truncated_stream_is_corrupt() {
        let stream = encode(&sample_bag(), 1252).unwrap();
        for cut in [3, 5, 10, stream.len() - 1] {
            assert!(
                matches!(decode(&stream[..cut]), Err(ConvertError::Corrupt(_))),
                "cut {cut}"
            );
        }
    }

    #[test]
    fn bad_signature_is_corrupt() {
        assert!(matches!(
            decode(&[0u8; 32]),
            Err(ConvertError::Corrupt("bad container signature"))
        ));
    }

    #[test]
    fn string8_uses_stream_codepage() {
        let mut bag = PropertyBag::new();
        bag.set(tags::SUBJECT, PropValue::String8("здравствуйте".into()));
        let stream = encode(&bag, 1251).unwrap();
        let (decoded, _) = decode(&stream).unwrap();
        assert_eq!(
            decoded.get_tag(tags::SUBJECT).and_then(|v| v.as_str()),
            Some("здравствуйте")
        );
    }
}
