/*
 * SPDX-FileCopyrightText: 2026 mapi-mime contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! The property-bag message model: typed property values keyed by numbered
//! or named identifiers, plus the recipient and attachment tables.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::{recipient::Recipient, tags};

/// The value-type code of a MAPI property, as it appears in the low 16
/// bits of a serialized property tag. Multi-value variants carry the
/// `0x1000` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PropType {
    Int16,
    Int32,
    Float,
    Double,
    Currency,
    AppTime,
    ErrorCode,
    Boolean,
    Object,
    Int64,
    String8,
    Unicode,
    SysTime,
    Guid,
    Binary,
    MvInt16,
    MvInt32,
    MvFloat,
    MvDouble,
    MvCurrency,
    MvInt64,
    MvString8,
    MvUnicode,
    MvSysTime,
    MvGuid,
    MvBinary,
}

impl PropType {
    pub fn code(self) -> u16 {
        match self {
            PropType::Int16 => 0x0002,
            PropType::Int32 => 0x0003,
            PropType::Float => 0x0004,
            PropType::Double => 0x0005,
            PropType::Currency => 0x0006,
            PropType::AppTime => 0x0007,
            PropType::ErrorCode => 0x000A,
            PropType::Boolean => 0x000B,
            PropType::Object => 0x000D,
            PropType::Int64 => 0x0014,
            PropType::String8 => 0x001E,
            PropType::Unicode => 0x001F,
            PropType::SysTime => 0x0040,
            PropType::Guid => 0x0048,
            PropType::Binary => 0x0102,
            PropType::MvInt16 => 0x1002,
            PropType::MvInt32 => 0x1003,
            PropType::MvFloat => 0x1004,
            PropType::MvDouble => 0x1005,
            PropType::MvCurrency => 0x1006,
            PropType::MvInt64 => 0x1014,
            PropType::MvString8 => 0x101E,
            PropType::MvUnicode => 0x101F,
            PropType::MvSysTime => 0x1040,
            PropType::MvGuid => 0x1048,
            PropType::MvBinary => 0x1102,
        }
    }

    pub fn from_code(code: u16) -> Option<PropType> {
        Some(match code {
            0x0002 => PropType::Int16,
            0x0003 => PropType::Int32,
            0x0004 => PropType::Float,
            0x0005 => PropType::Double,
            0x0006 => PropType::Currency,
            0x0007 => PropType::AppTime,
            0x000A => PropType::ErrorCode,
            0x000B => PropType::Boolean,
            0x000D => PropType::Object,
            0x0014 => PropType::Int64,
            0x001E => PropType::String8,
            0x001F => PropType::Unicode,
            0x0040 => PropType::SysTime,
            0x0048 => PropType::Guid,
            0x0102 => PropType::Binary,
            0x1002 => PropType::MvInt16,
            0x1003 => PropType::MvInt32,
            0x1004 => PropType::MvFloat,
            0x1005 => PropType::MvDouble,
            0x1006 => PropType::MvCurrency,
            0x1014 => PropType::MvInt64,
            0x101E => PropType::MvString8,
            0x101F => PropType::MvUnicode,
            0x1040 => PropType::MvSysTime,
            0x1048 => PropType::MvGuid,
            0x1102 => PropType::MvBinary,
            _ => return None,
        })
    }

    pub fn is_multi_value(self) -> bool {
        self.code() & 0x1000 != 0
    }

    /// The element type of a multi-value type; identity for scalars.
    pub fn element(self) -> PropType {
        match self {
            PropType::MvInt16 => PropType::Int16,
            PropType::MvInt32 => PropType::Int32,
            PropType::MvFloat => PropType::Float,
            PropType::MvDouble => PropType::Double,
            PropType::MvCurrency => PropType::Currency,
            PropType::MvInt64 => PropType::Int64,
            PropType::MvString8 => PropType::String8,
            PropType::MvUnicode => PropType::Unicode,
            PropType::MvSysTime => PropType::SysTime,
            PropType::MvGuid => PropType::Guid,
            PropType::MvBinary => PropType::Binary,
            other => other,
        }
    }

    /// Whether element values are serialized with a length prefix.
    pub fn is_variable_length(self) -> bool {
        matches!(
            self.element(),
            PropType::String8 | PropType::Unicode | PropType::Binary | PropType::Object
        )
    }
}

/// How a named property is identified within its property set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NamedKind {
    Id(u32),
    Name(String),
}

/// A named property: a property-set GUID plus a numeric id or a string
/// name. Resolution to a transient numeric tag is the business of a
/// backing store (see [`crate::core::resolver::NamedPropResolver`]); the
/// bag itself keys on the stable `(guid, id-or-name)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NamedPropId {
    pub guid: Uuid,
    pub kind: NamedKind,
}

impl NamedPropId {
    pub fn by_id(guid: Uuid, id: u32) -> Self {
        NamedPropId {
            guid,
            kind: NamedKind::Id(id),
        }
    }

    pub fn by_name(guid: Uuid, name: impl Into<String>) -> Self {
        NamedPropId {
            guid,
            kind: NamedKind::Name(name.into()),
        }
    }
}

/// A property identifier: a plain numbered tag or a named property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PropId {
    Numbered(u16),
    Named(NamedPropId),
}

impl PropId {
    pub fn is_named(&self) -> bool {
        matches!(self, PropId::Named(_))
    }

    /// Properties in the non-transmittable range are never serialized to
    /// the container; some receiving stores reject messages carrying them.
    pub fn is_transmittable(&self) -> bool {
        match self {
            PropId::Numbered(id) => {
                !(tags::NON_TRANSMITTABLE_START..=tags::NON_TRANSMITTABLE_END).contains(id)
            }
            PropId::Named(_) => true,
        }
    }
}

impl From<u16> for PropId {
    fn from(id: u16) -> Self {
        PropId::Numbered(id)
    }
}

impl From<NamedPropId> for PropId {
    fn from(id: NamedPropId) -> Self {
        PropId::Named(id)
    }
}

/// A typed property value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PropValue {
    Int16(i16),
    Int32(i32),
    Float(f32),
    Double(f64),
    Currency(i64),
    AppTime(f64),
    /// A property whose value could not be read directly; holds the MAPI
    /// error code. The TNEF encoder may substitute a streamed read.
    ErrorCode(u32),
    Bool(bool),
    Int64(i64),
    String8(String),
    Unicode(String),
    Time(DateTime<Utc>),
    Guid(Uuid),
    Binary(Vec<u8>),
    /// An embedded message carried as a nested property bag.
    Object(Box<PropertyBag>),
    MvInt16(Vec<i16>),
    MvInt32(Vec<i32>),
    MvFloat(Vec<f32>),
    MvDouble(Vec<f64>),
    MvCurrency(Vec<i64>),
    MvInt64(Vec<i64>),
    MvString8(Vec<String>),
    MvUnicode(Vec<String>),
    MvTime(Vec<DateTime<Utc>>),
    MvGuid(Vec<Uuid>),
    MvBinary(Vec<Vec<u8>>),
}

impl PropValue {
    pub fn prop_type(&self) -> PropType {
        match self {
            PropValue::Int16(_) => PropType::Int16,
            PropValue::Int32(_) => PropType::Int32,
            PropValue::Float(_) => PropType::Float,
            PropValue::Double(_) => PropType::Double,
            PropValue::Currency(_) => PropType::Currency,
            PropValue::AppTime(_) => PropType::AppTime,
            PropValue::ErrorCode(_) => PropType::ErrorCode,
            PropValue::Bool(_) => PropType::Boolean,
            PropValue::Int64(_) => PropType::Int64,
            PropValue::String8(_) => PropType::String8,
            PropValue::Unicode(_) => PropType::Unicode,
            PropValue::Time(_) => PropType::SysTime,
            PropValue::Guid(_) => PropType::Guid,
            PropValue::Binary(_) => PropType::Binary,
            PropValue::Object(_) => PropType::Object,
            PropValue::MvInt16(_) => PropType::MvInt16,
            PropValue::MvInt32(_) => PropType::MvInt32,
            PropValue::MvFloat(_) => PropType::MvFloat,
            PropValue::MvDouble(_) => PropType::MvDouble,
            PropValue::MvCurrency(_) => PropType::MvCurrency,
            PropValue::MvInt64(_) => PropType::MvInt64,
            PropValue::MvString8(_) => PropType::MvString8,
            PropValue::MvUnicode(_) => PropType::MvUnicode,
            PropValue::MvTime(_) => PropType::MvSysTime,
            PropValue::MvGuid(_) => PropType::MvGuid,
            PropValue::MvBinary(_) => PropType::MvBinary,
        }
    }

    /// Returns the textual value of `String8` and `Unicode` properties.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::String8(s) | PropValue::Unicode(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            PropValue::Int32(v) => Some(*v),
            PropValue::Int16(v) => Some(*v as i32),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PropValue::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            PropValue::Time(t) => Some(*t),
            _ => None,
        }
    }
}

/// How an attachment's content is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttachMethod {
    /// Plain file content in `ATTACH_DATA` (`PT_BINARY`).
    #[default]
    ByValue,
    /// A nested message in `ATTACH_DATA` (`PT_OBJECT`).
    EmbeddedMessage,
    /// An OLE object; carried opaquely.
    Ole,
}

impl AttachMethod {
    pub fn code(self) -> i32 {
        match self {
            AttachMethod::ByValue => 1,
            AttachMethod::EmbeddedMessage => 5,
            AttachMethod::Ole => 6,
        }
    }

    pub fn from_code(code: i32) -> Option<AttachMethod> {
        Some(match code {
            1 => AttachMethod::ByValue,
            5 => AttachMethod::EmbeddedMessage,
            6 => AttachMethod::Ole,
            _ => return None,
        })
    }
}

/// The fixed rendering-metadata record that opens every attachment
/// sub-stream in the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderInfo {
    pub attach_type: u16,
    pub position: u32,
    pub width: u16,
    pub height: u16,
    pub flags: u32,
}

impl Default for RenderInfo {
    fn default() -> Self {
        RenderInfo {
            attach_type: 1,
            position: 0xFFFF_FFFF,
            width: 0,
            height: 0,
            flags: 0,
        }
    }
}

/// A message attachment: its own property bag plus storage method and
/// rendering metadata.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attachment {
    pub props: PropertyBag,
    pub method: AttachMethod,
    pub render: RenderInfo,
}

impl Attachment {
    /// The attachment's long filename, if one is stored.
    pub fn filename(&self) -> Option<&str> {
        self.props
            .get_tag(tags::ATTACH_LONG_FILENAME)
            .and_then(|v| v.as_str())
    }

    /// The attachment's MIME type, if one is stored.
    pub fn mime_tag(&self) -> Option<&str> {
        self.props
            .get_tag(tags::ATTACH_MIME_TAG)
            .and_then(|v| v.as_str())
    }

    pub fn content(&self) -> Option<&[u8]> {
        self.props.get_tag(tags::ATTACH_DATA).and_then(|v| v.as_bytes())
    }

    /// The nested property bag of an embedded-message attachment.
    pub fn embedded_message(&self) -> Option<&PropertyBag> {
        match self.props.get_tag(tags::ATTACH_DATA) {
            Some(PropValue::Object(bag)) => Some(bag),
            _ => None,
        }
    }
}

/// The property-bag representation of a message: an insertion-ordered
/// property map plus the recipient and attachment tables. Inbound
/// conversion populates a fresh bag incrementally; outbound conversion
/// reads a fully formed one, writing only a small number of
/// normalizations such as the default message class.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropertyBag {
    props: Vec<(PropId, PropValue)>,
    pub recipients: Vec<Recipient>,
    pub attachments: Vec<Attachment>,
}

impl PropertyBag {
    pub fn new() -> Self {
        PropertyBag::default()
    }

    pub fn get(&self, id: &PropId) -> Option<&PropValue> {
        self.props.iter().find(|(k, _)| k == id).map(|(_, v)| v)
    }

    /// Shorthand lookup of a numbered property.
    pub fn get_tag(&self, tag: u16) -> Option<&PropValue> {
        self.get(&PropId::Numbered(tag))
    }

    /// Sets a property, replacing any existing value.
    pub fn set(&mut self, id: impl Into<PropId>, value: PropValue) {
        let id = id.into();
        if let Some(slot) = self.props.iter_mut().find(|(k, _)| *k == id) {
            slot.1 = value;
        } else {
            self.props.push((id, value));
        }
    }

    /// Sets a property only if it is absent; returns whether it was
    /// written. MIME-derived values use this to keep priority over
    /// container-derived ones.
    pub fn set_if_absent(&mut self, id: impl Into<PropId>, value: PropValue) -> bool {
        let id = id.into();
        if self.get(&id).is_some() {
            false
        } else {
            self.props.push((id, value));
            true
        }
    }

    pub fn remove(&mut self, id: &PropId) -> Option<PropValue> {
        self.props
            .iter()
            .position(|(k, _)| k == id)
            .map(|pos| self.props.remove(pos).1)
    }

    pub fn remove_tag(&mut self, tag: u16) -> Option<PropValue> {
        self.remove(&PropId::Numbered(tag))
    }

    pub fn contains(&self, id: &PropId) -> bool {
        self.get(id).is_some()
    }

    /// Iterates properties in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&PropId, &PropValue)> {
        self.props.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty() && self.recipients.is_empty() && self.attachments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_if_absent_keeps_first_value() {
        let mut bag = PropertyBag::new();
        assert!(bag.set_if_absent(tags::SUBJECT, PropValue::Unicode("first".into())));
        assert!(!bag.set_if_absent(tags::SUBJECT, PropValue::Unicode("second".into())));
        assert_eq!(
            bag.get_tag(tags::SUBJECT).and_then(|v| v.as_str()),
            Some("first")
        );

        bag.set(tags::SUBJECT, PropValue::Unicode("third".into()));
        assert_eq!(
            bag.get_tag(tags::SUBJECT).and_then(|v| v.as_str()),
            Some("third")
        );
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn named_and_numbered_ids_do_not_collide() {
        let mut bag = PropertyBag::new();
        let named = PropId::Named(NamedPropId::by_id(tags::PSETID_COMMON, 0x8503));
        bag.set(0x8503u16, PropValue::Bool(false));
        bag.set(named.clone(), PropValue::Bool(true));
        assert_eq!(bag.len(), 2);
        assert_eq!(bag.get(&named).and_then(|v| v.as_bool()), Some(true));
    }

    #[test]
    fn prop_type_codes_round_trip() {
        for t in [
            PropType::Int16,
            PropType::Boolean,
            PropType::Object,
            PropType::String8,
            PropType::Unicode,
            PropType::SysTime,
            PropType::Binary,
            PropType::MvInt32,
            PropType::MvUnicode,
            PropType::MvBinary,
        ] {
            assert_eq!(PropType::from_code(t.code()), Some(t));
        }
        assert_eq!(PropType::from_code(0x001D), None);
        assert!(PropType::MvBinary.is_multi_value());
        assert_eq!(PropType::MvBinary.element(), PropType::Binary);
    }

    #[test]
    fn transmittable_range_check() {
        assert!(!PropId::Numbered(0x6700).is_transmittable());
        assert!(!PropId::Numbered(0x67FF).is_transmittable());
        assert!(PropId::Numbered(0x6800).is_transmittable());
        assert!(PropId::Numbered(tags::SUBJECT).is_transmittable());
    }
}
