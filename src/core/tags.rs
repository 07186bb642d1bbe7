/*
 * SPDX-FileCopyrightText: 2026 mapi-mime contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Well-known numbered property identifiers used by the converters, plus
//! the property-set GUIDs for named properties. Only the tags this crate
//! actually reads or writes are listed; the identifier is the 16-bit
//! property id without the type code.

use uuid::Uuid;

pub const MESSAGE_CLASS: u16 = 0x001A;
pub const IMPORTANCE: u16 = 0x0017;
pub const PRIORITY: u16 = 0x0026;
pub const SENSITIVITY: u16 = 0x0036;
pub const SUBJECT: u16 = 0x0037;
pub const CLIENT_SUBMIT_TIME: u16 = 0x0039;
pub const SENT_REPRESENTING_NAME: u16 = 0x0042;
pub const SENT_REPRESENTING_ADDRTYPE: u16 = 0x0064;
pub const SENT_REPRESENTING_EMAIL: u16 = 0x0065;
pub const CONVERSATION_TOPIC: u16 = 0x0070;
pub const CONVERSATION_INDEX: u16 = 0x0071;
pub const TNEF_CORRELATION_KEY: u16 = 0x007F;
pub const RECIPIENT_TYPE: u16 = 0x0C15;
pub const SENDER_NAME: u16 = 0x0C1A;
pub const SENDER_ADDRTYPE: u16 = 0x0C1E;
pub const SENDER_EMAIL: u16 = 0x0C1F;
pub const DELIVERY_TIME: u16 = 0x0E06;
pub const MESSAGE_FLAGS: u16 = 0x0E07;
pub const HAS_ATTACH: u16 = 0x0E1B;
pub const BODY: u16 = 0x1000;
pub const RTF_COMPRESSED: u16 = 0x1009;
pub const HTML: u16 = 0x1013;
pub const INTERNET_MESSAGE_ID: u16 = 0x1035;
pub const INTERNET_REFERENCES: u16 = 0x1039;
pub const IN_REPLY_TO_ID: u16 = 0x1042;
pub const DISPLAY_NAME: u16 = 0x3001;
pub const ADDRTYPE: u16 = 0x3002;
pub const EMAIL_ADDRESS: u16 = 0x3003;
pub const INTERNET_CPID: u16 = 0x3FDE;
pub const DELEGATED_BY_RULE: u16 = 0x3FE3;

pub const ATTACH_DATA: u16 = 0x3701;
pub const ATTACH_EXTENSION: u16 = 0x3703;
pub const ATTACH_METHOD: u16 = 0x3705;
pub const ATTACH_LONG_FILENAME: u16 = 0x3707;
pub const ATTACH_MIME_TAG: u16 = 0x370E;
pub const ATTACH_CONTENT_ID: u16 = 0x3712;
pub const ATTACH_CONTENT_LOCATION: u16 = 0x3713;
pub const ATTACH_FLAGS: u16 = 0x3714;
pub const ATTACHMENT_HIDDEN: u16 = 0x7FFE;

/// Start of the range receiving stores reject; never serialized to TNEF.
pub const NON_TRANSMITTABLE_START: u16 = 0x6700;
pub const NON_TRANSMITTABLE_END: u16 = 0x67FF;

/// First identifier of the named-property range.
pub const NAMED_PROP_START: u16 = 0x8000;

/// `PS_INTERNET_HEADERS`, the property set for preserved `X-*` headers.
pub const PS_INTERNET_HEADERS: Uuid = Uuid::from_u128(0x00020386_0000_0000_c000_000000000046);

/// `PSETID_Common`, the property set of the reminder and voting properties.
pub const PSETID_COMMON: Uuid = Uuid::from_u128(0x00062008_0000_0000_c000_000000000046);

/// `IID_IMessage`, marks a `PT_OBJECT` value as an embedded message.
pub const IID_IMESSAGE: Uuid = Uuid::from_u128(0x00020307_0000_0000_c000_000000000046);

/// `PidLidReminderSet` in `PSETID_Common`.
pub const LID_REMINDER_SET: u32 = 0x8503;

/// `PidLidVerbStream` in `PSETID_Common`; present on voting requests.
pub const LID_VERB_STREAM: u32 = 0x8520;
