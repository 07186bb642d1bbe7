/*
 * SPDX-FileCopyrightText: 2026 mapi-mime contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use encoding_rs::WINDOWS_1252;

use crate::{
    core::{
        property::{
            AttachMethod, Attachment, NamedKind, PropId, PropType, PropValue, PropertyBag,
        },
        resolver::{NamedPropResolver, NullResolver},
        tags,
    },
    tnef::{
        checksum, to_filetime, ATT_ATTACHMENT, ATT_ATTACH_DATA, ATT_ATTACH_REND_DATA,
        ATT_ATTACH_TITLE, ATT_MAPI_PROPS, ATT_MESSAGE_CLASS, ATT_OEM_CODEPAGE, ATT_RECIP_TABLE,
        ATT_TNEF_VERSION, LVL_ATTACHMENT, LVL_MESSAGE, MAX_NESTING, SIGNATURE, TNEF_VERSION,
    },
    ConvertError, Result,
};

/// Serializes a property bag as a TNEF stream. Numbered ids in the
/// named range are dropped; they are transient store handles with no
/// meaning elsewhere.
pub fn encode(bag: &PropertyBag, codepage: u16) -> Result<Vec<u8>> {
    encode_with_names(bag, codepage, &NullResolver)
}

/// Like [`encode`], but recovers the names behind numbered ids in the
/// named range through `names`, so those properties survive the stream
/// instead of being dropped.
pub fn encode_with_names(
    bag: &PropertyBag,
    codepage: u16,
    names: &dyn NamedPropResolver,
) -> Result<Vec<u8>> {
    let mut writer = TnefWriter::with_names(codepage, names);
    writer.message(bag)?;
    Ok(writer.finish())
}

/// An incremental TNEF stream writer. Blocks are emitted in the fixed
/// order readers expect: version, codepage and message class first, the
/// property block next, attachments last.
pub struct TnefWriter<'n> {
    out: Vec<u8>,
    codepage: u16,
    names: &'n dyn NamedPropResolver,
}

impl TnefWriter<'static> {
    pub fn new(codepage: u16) -> Self {
        TnefWriter::with_names(codepage, &NullResolver)
    }
}

impl<'n> TnefWriter<'n> {
    pub fn with_names(codepage: u16, names: &'n dyn NamedPropResolver) -> Self {
        let mut out = Vec::with_capacity(256);
        out.extend_from_slice(&SIGNATURE.to_le_bytes());
        // Legacy attachment key; readers only echo it.
        out.extend_from_slice(&1u16.to_le_bytes());
        TnefWriter { out, codepage, names }
    }

    pub fn message(&mut self, bag: &PropertyBag) -> Result<()> {
        self.block(LVL_MESSAGE, ATT_TNEF_VERSION, &TNEF_VERSION.to_le_bytes());

        let mut cp = [0u8; 8];
        cp[..4].copy_from_slice(&(self.codepage as u32).to_le_bytes());
        self.block(LVL_MESSAGE, ATT_OEM_CODEPAGE, &cp);

        let class = bag
            .get_tag(tags::MESSAGE_CLASS)
            .and_then(|v| v.as_str())
            .unwrap_or("IPM.Note");
        let mut class_bytes = self.string8(class);
        class_bytes.push(0);
        self.block(LVL_MESSAGE, ATT_MESSAGE_CLASS, &class_bytes);

        let mut props = Vec::new();
        write_prop_block(&mut props, bag, self.codepage, 0, self.names)?;
        self.block(LVL_MESSAGE, ATT_MAPI_PROPS, &props);

        if !bag.recipients.is_empty() {
            let mut table = Vec::new();
            table.extend_from_slice(&(bag.recipients.len() as u32).to_le_bytes());
            for recipient in &bag.recipients {
                let mut row = recipient.props.clone();
                if let Some(name) = &recipient.name {
                    row.set_if_absent(tags::DISPLAY_NAME, PropValue::Unicode(name.clone()));
                }
                if let Some(addr_type) = &recipient.addr_type {
                    row.set_if_absent(tags::ADDRTYPE, PropValue::Unicode(addr_type.clone()));
                }
                if let Some(email) = &recipient.email {
                    row.set_if_absent(tags::EMAIL_ADDRESS, PropValue::Unicode(email.clone()));
                }
                row.set(tags::RECIPIENT_TYPE, PropValue::Int32(recipient.kind.code()));
                write_prop_block(&mut table, &row, self.codepage, 0, self.names)?;
            }
            self.block(LVL_MESSAGE, ATT_RECIP_TABLE, &table);
        }

        for attachment in &bag.attachments {
            self.attachment(attachment)?;
        }
        Ok(())
    }

    fn attachment(&mut self, attachment: &Attachment) -> Result<()> {
        let r = &attachment.render;
        let mut rend = Vec::with_capacity(14);
        rend.extend_from_slice(&r.attach_type.to_le_bytes());
        rend.extend_from_slice(&r.position.to_le_bytes());
        rend.extend_from_slice(&r.width.to_le_bytes());
        rend.extend_from_slice(&r.height.to_le_bytes());
        rend.extend_from_slice(&r.flags.to_le_bytes());
        self.block(LVL_ATTACHMENT, ATT_ATTACH_REND_DATA, &rend);

        // By-value content travels in the legacy data attribute so that
        // pre-MAPI readers can still extract the file.
        let mut props = attachment.props.clone();
        if attachment.method == AttachMethod::ByValue {
            if let Some(PropValue::Binary(data)) = props.remove_tag(tags::ATTACH_DATA) {
                self.block(LVL_ATTACHMENT, ATT_ATTACH_DATA, &data);
            }
        }
        if let Some(filename) = attachment.filename() {
            let mut title = self.string8(filename);
            title.push(0);
            self.block(LVL_ATTACHMENT, ATT_ATTACH_TITLE, &title);
        }

        props.set(
            tags::ATTACH_METHOD,
            PropValue::Int32(attachment.method.code()),
        );
        let mut block = Vec::new();
        write_prop_block(&mut block, &props, self.codepage, 0, self.names)?;
        self.block(LVL_ATTACHMENT, ATT_ATTACHMENT, &block);
        Ok(())
    }

    pub fn finish(self) -> Vec<u8> {
        self.out
    }

    fn block(&mut self, level: u8, id: u32, payload: &[u8]) {
        self.out.push(level);
        self.out.extend_from_slice(&id.to_le_bytes());
        self.out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.out.extend_from_slice(payload);
        self.out.extend_from_slice(&checksum(payload).to_le_bytes());
    }

    fn string8(&self, text: &str) -> Vec<u8> {
        encode_string8(text, self.codepage)
    }
}

fn encode_string8(text: &str, codepage: u16) -> Vec<u8> {
    let encoding = codepage::to_encoding(codepage).unwrap_or(WINDOWS_1252);
    encoding.encode(text).0.into_owned()
}

fn write_prop_block(
    out: &mut Vec<u8>,
    bag: &PropertyBag,
    codepage: u16,
    depth: usize,
    names: &dyn NamedPropResolver,
) -> Result<()> {
    if depth > MAX_NESTING {
        return Err(ConvertError::TooComplex("embedded messages nested too deeply"));
    }
    let mut body = Vec::new();
    let mut count = 0u32;
    for (id, value) in bag.iter() {
        if !id.is_transmittable() {
            continue;
        }
        // Numbered ids in the named range are transient store handles;
        // they travel only when the registry can recover the name
        // behind them.
        let recovered;
        let id = match id {
            PropId::Numbered(tag) if *tag >= tags::NAMED_PROP_START => {
                match names.name_for(*tag)? {
                    Some(name) => {
                        recovered = PropId::Named(name);
                        &recovered
                    }
                    None => continue,
                }
            }
            other => other,
        };
        // Properties whose value could not be read carry no data to write.
        if matches!(value, PropValue::ErrorCode(_)) {
            continue;
        }
        write_prop(&mut body, id, value, codepage, depth, names)?;
        count += 1;
    }
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&body);
    Ok(())
}

fn write_prop(
    out: &mut Vec<u8>,
    id: &PropId,
    value: &PropValue,
    codepage: u16,
    depth: usize,
    names: &dyn NamedPropResolver,
) -> Result<()> {
    let prop_type = value.prop_type();
    out.extend_from_slice(&prop_type.code().to_le_bytes());
    match id {
        PropId::Numbered(tag) => out.extend_from_slice(&tag.to_le_bytes()),
        PropId::Named(named) => {
            // The numeric id of a named property is a placeholder; the
            // identity travels in the name record that follows.
            out.extend_from_slice(&tags::NAMED_PROP_START.to_le_bytes());
            out.extend_from_slice(&named.guid.to_bytes_le());
            match &named.kind {
                NamedKind::Id(lid) => {
                    out.extend_from_slice(&0u32.to_le_bytes());
                    out.extend_from_slice(&lid.to_le_bytes());
                }
                NamedKind::Name(name) => {
                    out.extend_from_slice(&1u32.to_le_bytes());
                    let mut utf16: Vec<u8> = name
                        .encode_utf16()
                        .flat_map(|u| u.to_le_bytes())
                        .collect();
                    utf16.extend_from_slice(&[0, 0]);
                    out.extend_from_slice(&(utf16.len() as u32).to_le_bytes());
                    out.extend_from_slice(&utf16);
                    pad4(out);
                }
            }
        }
    }

    if prop_type.is_multi_value() {
        match value {
            PropValue::MvInt16(v) => fixed_values(out, v.len(), |out, i| {
                out.extend_from_slice(&v[i].to_le_bytes());
                pad4(out);
            }),
            PropValue::MvInt32(v) => fixed_values(out, v.len(), |out, i| {
                out.extend_from_slice(&v[i].to_le_bytes());
            }),
            PropValue::MvFloat(v) => fixed_values(out, v.len(), |out, i| {
                out.extend_from_slice(&v[i].to_le_bytes());
            }),
            PropValue::MvDouble(v) => fixed_values(out, v.len(), |out, i| {
                out.extend_from_slice(&v[i].to_le_bytes());
            }),
            PropValue::MvCurrency(v) | PropValue::MvInt64(v) => {
                fixed_values(out, v.len(), |out, i| {
                    out.extend_from_slice(&v[i].to_le_bytes());
                })
            }
            PropValue::MvTime(v) => fixed_values(out, v.len(), |out, i| {
                out.extend_from_slice(&to_filetime(v[i]).to_le_bytes());
            }),
            PropValue::MvGuid(v) => fixed_values(out, v.len(), |out, i| {
                out.extend_from_slice(&v[i].to_bytes_le());
            }),
            PropValue::MvString8(v) => {
                out.extend_from_slice(&(v.len() as u32).to_le_bytes());
                for s in v {
                    let mut bytes = encode_string8(s, codepage);
                    bytes.push(0);
                    chunk(out, &bytes);
                }
            }
            PropValue::MvUnicode(v) => {
                out.extend_from_slice(&(v.len() as u32).to_le_bytes());
                for s in v {
                    chunk(out, &utf16z(s));
                }
            }
            PropValue::MvBinary(v) => {
                out.extend_from_slice(&(v.len() as u32).to_le_bytes());
                for b in v {
                    chunk(out, b);
                }
            }
            _ => unreachable!("scalar value with multi-value type"),
        }
        return Ok(());
    }

    match value {
        // Narrow scalars are widened to a full alignment unit.
        PropValue::Int16(v) => out.extend_from_slice(&(*v as i32).to_le_bytes()),
        PropValue::Bool(v) => out.extend_from_slice(&(*v as i32).to_le_bytes()),
        PropValue::Int32(v) => out.extend_from_slice(&v.to_le_bytes()),
        PropValue::ErrorCode(v) => out.extend_from_slice(&v.to_le_bytes()),
        PropValue::Float(v) => out.extend_from_slice(&v.to_le_bytes()),
        PropValue::Double(v) | PropValue::AppTime(v) => out.extend_from_slice(&v.to_le_bytes()),
        PropValue::Currency(v) | PropValue::Int64(v) => out.extend_from_slice(&v.to_le_bytes()),
        PropValue::Time(v) => out.extend_from_slice(&to_filetime(*v).to_le_bytes()),
        PropValue::Guid(v) => out.extend_from_slice(&v.to_bytes_le()),
        PropValue::String8(s) => {
            let mut bytes = encode_string8(s, codepage);
            bytes.push(0);
            single_chunk(out, &bytes);
        }
        PropValue::Unicode(s) => single_chunk(out, &utf16z(s)),
        PropValue::Binary(b) => single_chunk(out, b),
        PropValue::Object(bag) => {
            let mut bytes = tags::IID_IMESSAGE.to_bytes_le().to_vec();
            write_prop_block(&mut bytes, bag, codepage, depth + 1, names)?;
            single_chunk(out, &bytes);
        }
        _ => unreachable!("multi-value handled above"),
    }
    Ok(())
}

fn utf16z(s: &str) -> Vec<u8> {
    let mut bytes: Vec<u8> = s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
    bytes.extend_from_slice(&[0, 0]);
    bytes
}

fn fixed_values(out: &mut Vec<u8>, len: usize, mut write: impl FnMut(&mut Vec<u8>, usize)) {
    out.extend_from_slice(&(len as u32).to_le_bytes());
    for i in 0..len {
        write(out, i);
    }
}

/// A length-prefixed value chunk, padded to the alignment unit.
fn chunk(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
    pad4(out);
}

/// Variable-length scalars are framed like a one-element multi-value.
fn single_chunk(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&1u32.to_le_bytes());
    chunk(out, bytes);
}

fn pad4(out: &mut Vec<u8>) {
    while out.len() % 4 != 0 {
        out.push(0);
    }
}
