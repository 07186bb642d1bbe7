/*
 * SPDX-FileCopyrightText: 2026 mapi-mime contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Recursive MIME dissection: walks the parsed part tree, elects body
//! parts, converts the rest to attachments and folds TNEF containers
//! into the bag.

use mail_parser::{
    decoders::{base64::base64_decode, quoted_printable::quoted_printable_decode},
    Encoding, Message, MessagePart, MimeHeaders, PartType,
};

use crate::{
    charset::{charset_to_codepage, is_known_charset, recover_text, sniff_html_charset, Recovered},
    core::{
        property::{AttachMethod, Attachment, PropValue, PropertyBag},
        tags,
    },
    inbound::{headers, merge_container, Decomposer},
    tnef, Diagnostic, DiagnosticCode,
};

#[derive(Debug, Clone, Copy)]
struct Ctx {
    depth: usize,
    inline: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MimeClass {
    Untyped,
    TextPlain,
    TextHtml,
    TextCalendar,
    TextOther,
    MultipartAlternative,
    MultipartRelated,
    MultipartSigned,
    MultipartOther,
    Tnef,
    Rfc822,
    SmimeBlob,
    Binary,
}

pub(crate) fn dissect(
    opts: &Decomposer<'_>,
    message: &Message<'_>,
    bag: &mut PropertyBag,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let walker = Walker { opts, message };
    walker.walk(0, Ctx { depth: 0, inline: false }, bag, diagnostics);
}

struct Walker<'a, 'r> {
    opts: &'a Decomposer<'r>,
    message: &'a Message<'a>,
}

impl Walker<'_, '_> {
    fn walk(&self, part_id: usize, ctx: Ctx, bag: &mut PropertyBag, diags: &mut Vec<Diagnostic>) {
        let Some(part) = self.message.parts.get(part_id) else {
            return;
        };
        if ctx.depth > self.opts.max_depth {
            diags.push(Diagnostic::warning(
                DiagnosticCode::DepthExceeded,
                "nesting limit reached; branch kept as attachment",
            ));
            bag.attachments.push(self.make_attachment(part, ctx.inline));
            return;
        }
        let child = Ctx {
            depth: ctx.depth + 1,
            ..ctx
        };

        match classify(part) {
            MimeClass::MultipartAlternative => {
                if let PartType::Multipart(children) = &part.body {
                    self.alternative(children, child, bag, diags);
                }
            }
            MimeClass::MultipartRelated => {
                if let PartType::Multipart(children) = &part.body {
                    for (i, &sub) in children.iter().enumerate() {
                        let sub_ctx = Ctx {
                            inline: i > 0 || ctx.inline,
                            ..child
                        };
                        self.walk(sub as usize, sub_ctx, bag, diags);
                    }
                }
            }
            MimeClass::MultipartSigned => {
                // The signed entity travels verbatim; re-encoding any of
                // it would break the signature.
                bag.set(
                    tags::MESSAGE_CLASS,
                    PropValue::Unicode("IPM.Note.SMIME.MultipartSigned".into()),
                );
                bag.attachments.push(self.signed_payload(part));
                if let PartType::Multipart(children) = &part.body {
                    if let Some(&first) = children.first() {
                        self.walk(first as usize, child, bag, diags);
                    }
                }
            }
            MimeClass::MultipartOther => {
                if let PartType::Multipart(children) = &part.body {
                    // multipart/appledouble pairs every file with an
                    // application/applefile resource fork that has no
                    // meaning off a Mac filesystem.
                    let appledouble = part
                        .content_type()
                        .and_then(|ct| ct.subtype())
                        .map(|s| s.eq_ignore_ascii_case("appledouble"))
                        .unwrap_or(false);
                    for &sub in children {
                        if appledouble && self.is_resource_fork(sub as usize) {
                            continue;
                        }
                        self.walk(sub as usize, child, bag, diags);
                    }
                }
            }
            MimeClass::Untyped | MimeClass::TextPlain | MimeClass::TextOther => {
                // The body can only move up (none, then plain, then
                // html); a plain part arriving after html is a trailer,
                // not a replacement.
                if bag.get_tag(tags::BODY).is_none() && bag.get_tag(tags::HTML).is_none() {
                    if !self.try_plain_body(part, ctx.depth, bag, diags) {
                        diags.push(Diagnostic::warning(
                            DiagnosticCode::UndecodableText,
                            "text part kept as attachment",
                        ));
                        bag.attachments.push(self.make_attachment(part, ctx.inline));
                    }
                } else {
                    bag.attachments.push(self.make_attachment(part, ctx.inline));
                }
            }
            MimeClass::TextHtml => {
                if bag.get_tag(tags::HTML).is_none() {
                    if !self.try_html_body(part, ctx.depth, bag, diags) {
                        diags.push(Diagnostic::warning(
                            DiagnosticCode::UndecodableText,
                            "html part kept as attachment",
                        ));
                        bag.attachments.push(self.make_attachment(part, ctx.inline));
                    }
                } else {
                    bag.attachments.push(self.make_attachment(part, ctx.inline));
                }
            }
            MimeClass::TextCalendar => self.calendar_part(part, ctx, bag, diags),
            MimeClass::Tnef => {
                if self.opts.merge_tnef {
                    match tnef::decode(part.contents()) {
                        Ok((container, mut container_diags)) => {
                            diags.append(&mut container_diags);
                            merge_container(bag, container);
                        }
                        Err(err) => {
                            diags.push(Diagnostic::warning(
                                DiagnosticCode::BrokenContainer,
                                err.to_string(),
                            ));
                            bag.attachments.push(self.make_attachment(part, false));
                        }
                    }
                } else {
                    bag.attachments.push(self.make_attachment(part, false));
                }
            }
            MimeClass::Rfc822 => {
                if let PartType::Message(nested) = &part.body {
                    bag.attachments
                        .push(self.embedded_message(nested, ctx.depth, diags));
                } else {
                    bag.attachments.push(self.make_attachment(part, ctx.inline));
                }
            }
            MimeClass::SmimeBlob => {
                bag.set_if_absent(
                    tags::MESSAGE_CLASS,
                    PropValue::Unicode("IPM.Note.SMIME".into()),
                );
                bag.attachments.push(self.make_attachment(part, false));
            }
            MimeClass::Binary => {
                bag.attachments.push(self.make_attachment(part, ctx.inline));
            }
        }
    }

    /// Tries the alternatives most-capable first; the untyped rank comes
    /// from legacy senders that label only the parts they consider
    /// optional. The first decodable candidate wins and its siblings
    /// are dropped as redundant renderings.
    fn alternative(
        &self,
        children: &[u32],
        ctx: Ctx,
        bag: &mut PropertyBag,
        diags: &mut Vec<Diagnostic>,
    ) {
        let mut order: Vec<u32> = children.to_vec();
        order.sort_by_key(|&id| {
            self.message
                .parts
                .get(id as usize)
                .map(|p| match classify(p) {
                    MimeClass::Untyped => 0u8,
                    MimeClass::TextPlain => 2,
                    _ => 1,
                })
                .unwrap_or(3)
        });

        for &candidate in &order {
            let Some(part) = self.message.parts.get(candidate as usize) else {
                continue;
            };
            let had_body =
                bag.get_tag(tags::BODY).is_some() || bag.get_tag(tags::HTML).is_some();
            let chosen = match classify(part) {
                MimeClass::Untyped | MimeClass::TextPlain | MimeClass::TextOther => {
                    self.try_plain_body(part, ctx.depth, bag, diags)
                }
                MimeClass::TextHtml => self.try_html_body(part, ctx.depth, bag, diags),
                _ => {
                    // Success is judged by what this candidate added,
                    // not by material that was already in the bag.
                    let attachments_before = bag.attachments.len();
                    self.walk(candidate as usize, ctx, bag, diags);
                    let gained_body = !had_body
                        && (bag.get_tag(tags::BODY).is_some()
                            || bag.get_tag(tags::HTML).is_some());
                    gained_body || bag.attachments.len() > attachments_before
                }
            };
            if chosen {
                return;
            }
            diags.push(Diagnostic::info(
                DiagnosticCode::AlternativePartFailed,
                "alternative candidate not decodable; trying next",
            ));
        }

        // No candidate worked; keep them all so nothing is lost.
        diags.push(Diagnostic::warning(
            DiagnosticCode::UndecodableText,
            "no alternative body candidate was decodable",
        ));
        for &id in children {
            if let Some(part) = self.message.parts.get(id as usize) {
                bag.attachments.push(self.make_attachment(part, ctx.inline));
            }
        }
    }

    fn is_resource_fork(&self, part_id: usize) -> bool {
        self.message
            .parts
            .get(part_id)
            .and_then(|p| p.content_type())
            .map(|ct| {
                ct.ctype().eq_ignore_ascii_case("application")
                    && ct
                        .subtype()
                        .map(|s| {
                            s.eq_ignore_ascii_case("applefile")
                                || s.eq_ignore_ascii_case("x-applefile")
                        })
                        .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    fn try_plain_body(
        &self,
        part: &MessagePart<'_>,
        depth: usize,
        bag: &mut PropertyBag,
        diags: &mut Vec<Diagnostic>,
    ) -> bool {
        let bytes = self.transfer_decoded(part);
        match self.recover(part, &bytes, false, depth, diags) {
            Some((text, charset)) => {
                bag.set(tags::BODY, PropValue::Unicode(text));
                if let Some(cpid) = charset_to_codepage(&charset) {
                    bag.set_if_absent(tags::INTERNET_CPID, PropValue::Int32(cpid as i32));
                }
                true
            }
            None => false,
        }
    }

    fn try_html_body(
        &self,
        part: &MessagePart<'_>,
        depth: usize,
        bag: &mut PropertyBag,
        diags: &mut Vec<Diagnostic>,
    ) -> bool {
        let bytes = self.transfer_decoded(part);
        // The property stores the original bytes; recovery only
        // establishes which charset those bytes are in.
        match self.recover(part, &bytes, true, depth, diags) {
            Some((_, charset)) => {
                bag.set(tags::HTML, PropValue::Binary(bytes));
                if let Some(cpid) = charset_to_codepage(&charset) {
                    bag.set_if_absent(tags::INTERNET_CPID, PropValue::Int32(cpid as i32));
                }
                true
            }
            None => false,
        }
    }

    fn recover(
        &self,
        part: &MessagePart<'_>,
        bytes: &[u8],
        html: bool,
        depth: usize,
        diags: &mut Vec<Diagnostic>,
    ) -> Option<(String, String)> {
        let declared = part
            .content_type()
            .and_then(|ct| ct.attribute("charset"))
            .map(str::to_string);
        let sniffed = if html { sniff_html_charset(bytes) } else { None };
        // Sub-parts of a wrapper that declares nothing are 7-bit by
        // definition of the enclosing transfer grammar.
        let default = if declared.is_none() && depth > 0 {
            Some("us-ascii".to_string())
        } else {
            self.opts.default_charset.clone()
        };
        if let Some(label) = &declared {
            if !is_known_charset(label) {
                diags.push(Diagnostic::info(
                    DiagnosticCode::UnknownCharset,
                    format!("unknown charset {label:?}"),
                ));
            }
        }
        match recover_text(
            bytes,
            declared.as_deref(),
            sniffed.as_deref(),
            default.as_deref(),
            self.opts.strict_rfc,
        ) {
            Recovered::Decoded { text, charset, lossy } => {
                if lossy {
                    diags.push(Diagnostic::warning(
                        DiagnosticCode::LossyCharset,
                        format!("text decoded lossily as {charset}"),
                    ));
                }
                Some((text, charset))
            }
            Recovered::Undecodable => None,
        }
    }

    fn calendar_part(
        &self,
        part: &MessagePart<'_>,
        ctx: Ctx,
        bag: &mut PropertyBag,
        diags: &mut Vec<Diagnostic>,
    ) {
        if let Some(codec) = self.opts.calendar {
            let bytes = self.transfer_decoded(part);
            if let Some((text, _)) = self.recover(part, &bytes, false, ctx.depth, diags) {
                match codec.from_icalendar(&text, bag) {
                    Ok(()) => return,
                    Err(err) => diags.push(Diagnostic::warning(
                        DiagnosticCode::CalendarFailed,
                        err.to_string(),
                    )),
                }
            }
        }
        bag.attachments.push(self.make_attachment(part, ctx.inline));
    }

    fn embedded_message(
        &self,
        nested: &Message<'_>,
        depth: usize,
        diags: &mut Vec<Diagnostic>,
    ) -> Attachment {
        let mut inner = PropertyBag::new();
        headers::apply_headers(nested, &mut inner, self.opts.directory, diags);
        let walker = Walker {
            opts: self.opts,
            message: nested,
        };
        walker.walk(0, Ctx { depth: depth + 1, inline: false }, &mut inner, diags);
        inner.set_if_absent(tags::MESSAGE_CLASS, PropValue::Unicode("IPM.Note".into()));

        let mut attachment = Attachment {
            method: AttachMethod::EmbeddedMessage,
            ..Attachment::default()
        };
        if let Some(subject) = inner.get_tag(tags::SUBJECT).cloned() {
            attachment.props.set(tags::ATTACH_LONG_FILENAME, subject);
        }
        attachment
            .props
            .set(tags::ATTACH_DATA, PropValue::Object(Box::new(inner)));
        attachment
    }

    fn signed_payload(&self, part: &MessagePart<'_>) -> Attachment {
        let mut mime_tag = String::from("multipart/signed");
        if let Some(ct) = part.content_type() {
            for attr in ["protocol", "micalg", "boundary"] {
                if let Some(value) = ct.attribute(attr) {
                    mime_tag.push_str(&format!("; {attr}=\"{value}\""));
                }
            }
        }
        let raw = self.message.raw_message.as_ref();
        let body = raw
            .get(part.raw_body_offset() as usize..part.raw_end_offset() as usize)
            .unwrap_or_default();
        let mut attachment = Attachment::default();
        attachment
            .props
            .set(tags::ATTACH_DATA, PropValue::Binary(body.to_vec()));
        attachment
            .props
            .set(tags::ATTACH_MIME_TAG, PropValue::Unicode(mime_tag));
        attachment.props.set(
            tags::ATTACH_LONG_FILENAME,
            PropValue::Unicode("smime.p7m".into()),
        );
        attachment
    }

    fn make_attachment(&self, part: &MessagePart<'_>, inline: bool) -> Attachment {
        let mut attachment = Attachment::default();
        attachment
            .props
            .set(tags::ATTACH_DATA, PropValue::Binary(part.contents().to_vec()));
        if let Some(ct) = part.content_type() {
            let mime_tag = match ct.subtype() {
                Some(sub) => format!("{}/{}", ct.ctype(), sub),
                None => ct.ctype().to_string(),
            };
            attachment
                .props
                .set(tags::ATTACH_MIME_TAG, PropValue::Unicode(mime_tag));
        }
        if let Some(name) = part.attachment_name() {
            attachment
                .props
                .set(tags::ATTACH_LONG_FILENAME, PropValue::Unicode(name.into()));
            if let Some(dot) = name.rfind('.') {
                attachment.props.set(
                    tags::ATTACH_EXTENSION,
                    PropValue::Unicode(name[dot..].into()),
                );
            }
        }
        if let Some(cid) = part.content_id() {
            let cid = cid.trim_start_matches('<').trim_end_matches('>');
            attachment
                .props
                .set(tags::ATTACH_CONTENT_ID, PropValue::Unicode(cid.into()));
        }
        if let Some(location) = part.content_location() {
            attachment.props.set(
                tags::ATTACH_CONTENT_LOCATION,
                PropValue::Unicode(location.into()),
            );
        }
        let is_inline = inline
            || part
                .content_disposition()
                .map(|cd| cd.ctype().eq_ignore_ascii_case("inline"))
                .unwrap_or(false);
        if is_inline && part.content_id().is_some() {
            // MHTML reference: hidden from the attachment well, shown
            // where the body cites its content id.
            attachment
                .props
                .set(tags::ATTACH_FLAGS, PropValue::Int32(4));
            attachment
                .props
                .set(tags::ATTACHMENT_HIDDEN, PropValue::Bool(true));
        }
        attachment
    }

    fn transfer_decoded(&self, part: &MessagePart<'_>) -> Vec<u8> {
        let raw = self.message.raw_message.as_ref();
        let slice = raw
            .get(part.raw_body_offset() as usize..part.raw_end_offset() as usize)
            .unwrap_or_default();
        match part.encoding {
            Encoding::Base64 => {
                base64_decode(slice).unwrap_or_else(|| part.contents().to_vec())
            }
            Encoding::QuotedPrintable => {
                quoted_printable_decode(slice).unwrap_or_else(|| part.contents().to_vec())
            }
            Encoding::None => slice.to_vec(),
        }
    }
}

fn classify(part: &MessagePart<'_>) -> MimeClass {
    if matches!(part.body, PartType::Message(_)) {
        return MimeClass::Rfc822;
    }
    let Some(ct) = part.content_type() else {
        return MimeClass::Untyped;
    };
    let ctype = ct.ctype();
    let subtype = ct.subtype().unwrap_or("");
    if ctype.eq_ignore_ascii_case("multipart") {
        if subtype.eq_ignore_ascii_case("alternative") {
            MimeClass::MultipartAlternative
        } else if subtype.eq_ignore_ascii_case("related") {
            MimeClass::MultipartRelated
        } else if subtype.eq_ignore_ascii_case("signed") {
            MimeClass::MultipartSigned
        } else {
            MimeClass::MultipartOther
        }
    } else if ctype.eq_ignore_ascii_case("text") {
        if subtype.eq_ignore_ascii_case("plain") || subtype.is_empty() {
            MimeClass::TextPlain
        } else if subtype.eq_ignore_ascii_case("html") {
            MimeClass::TextHtml
        } else if subtype.eq_ignore_ascii_case("calendar") {
            MimeClass::TextCalendar
        } else {
            MimeClass::TextOther
        }
    } else if ctype.eq_ignore_ascii_case("application") {
        if subtype.eq_ignore_ascii_case("ms-tnef") || subtype.eq_ignore_ascii_case("vnd.ms-tnef") {
            MimeClass::Tnef
        } else if subtype.eq_ignore_ascii_case("pkcs7-mime")
            || subtype.eq_ignore_ascii_case("x-pkcs7-mime")
        {
            MimeClass::SmimeBlob
        } else if part
            .attachment_name()
            .map(|n| n.eq_ignore_ascii_case("winmail.dat"))
            .unwrap_or(false)
        {
            MimeClass::Tnef
        } else {
            MimeClass::Binary
        }
    } else if ctype.eq_ignore_ascii_case("message") && subtype.eq_ignore_ascii_case("rfc822") {
        MimeClass::Rfc822
    } else {
        MimeClass::Binary
    }
}
