/*
 * SPDX-FileCopyrightText: 2026 mapi-mime contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Outbound conversion: a property bag becomes wire-format Internet
//! mail. Header serialization and multipart assembly come from
//! `mail-builder`; this module supplies the recipient expansion, body
//! election and container decisions above it.

pub mod body;
pub mod recipients;

use std::borrow::Cow;

use mail_builder::{
    headers::{
        address::{Address, EmailAddress},
        raw::Raw,
    },
    MessageBuilder,
};

use crate::{
    core::{
        message::{importance_header, sensitivity_header, MessageClass, MessageView},
        property::{AttachMethod, NamedKind, PropId, PropValue, PropertyBag},
        recipient::RecipientType,
        resolver::{
            CalendarCodec, DirectoryResolver, NamedPropResolver, NullResolver, ResolvedAddress,
        },
        tags,
    },
    tnef, ConvertError, Diagnostic, DiagnosticCode, Result,
};

use body::BodyChoice;
use recipients::ExpandedRecipient;

static NULL_RESOLVER: NullResolver = NullResolver;

/// How the structured side of the message is carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerDecision {
    /// Plain MIME carries everything.
    Plain,
    /// A TNEF attachment carries the properties MIME cannot.
    Tnef { reason: &'static str },
    /// Calendar content rendered as iCalendar text.
    ICalendar,
}

/// The result of composing a message.
#[derive(Debug)]
pub struct Composed {
    /// The complete RFC 5322 message.
    pub message: Vec<u8>,
    pub container: ContainerDecision,
    pub diagnostics: Vec<Diagnostic>,
}

/// Converts property bags to Internet mail.
pub struct Composer<'r> {
    directory: &'r dyn DirectoryResolver,
    named_props: Option<&'r dyn NamedPropResolver>,
    calendar: Option<&'r dyn CalendarCodec>,
    force_container: bool,
    force_group_expansion: bool,
    allow_everyone_expansion: bool,
    placeholder_recipients: bool,
    codepage: u16,
    max_group_depth: usize,
    max_message_depth: usize,
}

impl Default for Composer<'_> {
    fn default() -> Self {
        Composer {
            directory: &NULL_RESOLVER,
            named_props: None,
            calendar: None,
            force_container: false,
            force_group_expansion: false,
            allow_everyone_expansion: false,
            placeholder_recipients: false,
            codepage: 1252,
            max_group_depth: 16,
            max_message_depth: 8,
        }
    }
}

impl<'r> Composer<'r> {
    pub fn new() -> Self {
        Composer::default()
    }

    pub fn directory(mut self, directory: &'r dyn DirectoryResolver) -> Self {
        self.directory = directory;
        self
    }

    /// Registry used to recover the names behind transient numeric tags
    /// when writing the container.
    pub fn named_props(mut self, names: &'r dyn NamedPropResolver) -> Self {
        self.named_props = Some(names);
        self
    }

    pub fn calendar_codec(mut self, codec: &'r dyn CalendarCodec) -> Self {
        self.calendar = Some(codec);
        self
    }

    /// Always emit the container, regardless of message class.
    pub fn force_container(mut self, force: bool) -> Self {
        self.force_container = force;
        self
    }

    /// Flatten distribution lists even when they publish their own
    /// internet address.
    pub fn force_group_expansion(mut self, force: bool) -> Self {
        self.force_group_expansion = force;
        self
    }

    /// Permit flattening the organization-wide "everyone" list instead
    /// of failing with [`ConvertError::PermissionDenied`].
    pub fn allow_everyone_expansion(mut self, allow: bool) -> Self {
        self.allow_everyone_expansion = allow;
        self
    }

    /// Write an `undisclosed-recipients:;` placeholder instead of
    /// failing when expansion yields no deliverable recipient.
    pub fn placeholder_recipients(mut self, placeholder: bool) -> Self {
        self.placeholder_recipients = placeholder;
        self
    }

    /// Code page for legacy narrow strings inside the container.
    pub fn codepage(mut self, codepage: u16) -> Self {
        self.codepage = codepage;
        self
    }

    pub fn compose(&self, bag: &PropertyBag) -> Result<Composed> {
        if bag.is_empty() {
            return Err(ConvertError::InvalidParameter("empty property bag"));
        }
        let mut diags = Vec::new();
        let sender = self.resolve_sender(bag)?;
        let policy = recipients::ExpandPolicy {
            max_depth: self.max_group_depth,
            force_group_expansion: self.force_group_expansion,
            allow_everyone: self.allow_everyone_expansion,
            placeholder_recipients: self.placeholder_recipients,
        };
        let expanded = recipients::expand(self.directory, &bag.recipients, policy, &mut diags)?;

        let class = bag.class();
        if matches!(class, MessageClass::SmimeSigned | MessageClass::SmimeOpaque) {
            let message = self.compose_smime(bag, &sender, &expanded)?;
            return Ok(Composed {
                message,
                container: ContainerDecision::Plain,
                diagnostics: diags,
            });
        }

        let mut decision = self.decide(bag, class);
        if let (ContainerDecision::ICalendar, Some(codec)) = (decision, self.calendar) {
            match codec.to_icalendar(bag) {
                Ok(ics) => {
                    let message = self.build_mime(
                        bag,
                        &sender,
                        &expanded,
                        body::select_body(bag, &mut diags),
                        Some(("text/calendar", "meeting.ics", ics.into_bytes())),
                        true,
                        &mut diags,
                    )?;
                    return Ok(Composed {
                        message,
                        container: ContainerDecision::ICalendar,
                        diagnostics: diags,
                    });
                }
                Err(err) => {
                    diags.push(Diagnostic::warning(
                        DiagnosticCode::CalendarFailed,
                        err.to_string(),
                    ));
                    decision = ContainerDecision::Tnef { reason: "calendar" };
                }
            }
        }

        let message = match decision {
            ContainerDecision::Plain => self.build_mime(
                bag,
                &sender,
                &expanded,
                body::select_body(bag, &mut diags),
                None,
                true,
                &mut diags,
            )?,
            ContainerDecision::Tnef { .. } => {
                let mut carried = bag.clone();
                if let Some(id) = carried
                    .get_tag(tags::INTERNET_MESSAGE_ID)
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                {
                    let mut key = id.into_bytes();
                    key.push(0);
                    carried.set_if_absent(tags::TNEF_CORRELATION_KEY, PropValue::Binary(key));
                }
                let stream = match self.named_props {
                    Some(names) => tnef::encode_with_names(&carried, self.codepage, names)?,
                    None => tnef::encode(&carried, self.codepage)?,
                };
                let text = bag.body_text().unwrap_or_default().to_string();
                self.build_mime(
                    bag,
                    &sender,
                    &expanded,
                    if text.is_empty() {
                        BodyChoice::Empty
                    } else {
                        BodyChoice::Plain(text)
                    },
                    Some(("application/ms-tnef", "winmail.dat", stream)),
                    // Everything structured is inside the container.
                    false,
                    &mut diags,
                )?
            }
            ContainerDecision::ICalendar => unreachable!("handled above"),
        };
        tracing::debug!(container = ?decision, bytes = message.len(), "message composed");
        Ok(Composed {
            message,
            container: decision,
            diagnostics: diags,
        })
    }

    fn decide(&self, bag: &PropertyBag, class: MessageClass) -> ContainerDecision {
        if self.force_container {
            return ContainerDecision::Tnef { reason: "forced" };
        }
        if class.is_calendar() {
            return if self.calendar.is_some() {
                ContainerDecision::ICalendar
            } else {
                ContainerDecision::Tnef { reason: "calendar" }
            };
        }
        if class.needs_rich_transport() {
            let reason = match class {
                MessageClass::Task => "task",
                MessageClass::Contact => "contact",
                MessageClass::StickyNote => "sticky note",
                _ => "custom class",
            };
            return ContainerDecision::Tnef { reason };
        }
        if bag.has_voting_buttons() {
            return ContainerDecision::Tnef { reason: "voting buttons" };
        }
        if bag.is_delegated() {
            return ContainerDecision::Tnef { reason: "delegated" };
        }
        if bag.has_reminder() {
            return ContainerDecision::Tnef { reason: "reminder" };
        }
        if bag
            .attachments
            .iter()
            .any(|a| a.method == AttachMethod::Ole)
        {
            return ContainerDecision::Tnef { reason: "ole attachment" };
        }
        if body::needs_rich_container(bag) {
            return ContainerDecision::Tnef { reason: "rich text" };
        }
        ContainerDecision::Plain
    }

    fn resolve_sender(&self, bag: &PropertyBag) -> Result<(Option<String>, String)> {
        for (name_tag, type_tag, email_tag) in [
            (
                tags::SENT_REPRESENTING_NAME,
                tags::SENT_REPRESENTING_ADDRTYPE,
                tags::SENT_REPRESENTING_EMAIL,
            ),
            (tags::SENDER_NAME, tags::SENDER_ADDRTYPE, tags::SENDER_EMAIL),
        ] {
            let Some(address) = bag.get_tag(email_tag).and_then(|v| v.as_str()) else {
                continue;
            };
            let name = bag
                .get_tag(name_tag)
                .and_then(|v| v.as_str())
                .map(str::to_string);
            let addr_type = bag
                .get_tag(type_tag)
                .and_then(|v| v.as_str())
                .unwrap_or("SMTP");
            if addr_type.eq_ignore_ascii_case("SMTP") {
                return Ok((name, address.to_string()));
            }
            if let ResolvedAddress::Mailbox { name: dir_name, email } =
                self.directory.resolve(addr_type, address)?
            {
                return Ok((dir_name.or(name), email));
            }
        }
        Err(ConvertError::NoSender)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_mime(
        &self,
        bag: &PropertyBag,
        sender: &(Option<String>, String),
        expanded: &[ExpandedRecipient],
        body: BodyChoice,
        extra: Option<(&str, &str, Vec<u8>)>,
        carry_attachments: bool,
        diags: &mut Vec<Diagnostic>,
    ) -> Result<Vec<u8>> {
        let mut builder = MessageBuilder::new()
            .from(mb_address(sender.0.as_deref(), &sender.1));
        if expanded.is_empty() {
            // Only reachable under the placeholder policy.
            builder = builder.header("To", Raw::new("undisclosed-recipients:;"));
        }
        type SetList = fn(MessageBuilder<'static>, Address<'static>) -> MessageBuilder<'static>;
        for (kind, set) in [
            (RecipientType::To, (|b, a| b.to(a)) as SetList),
            (RecipientType::Cc, (|b, a| b.cc(a)) as SetList),
            (RecipientType::Bcc, (|b, a| b.bcc(a)) as SetList),
        ] {
            let list: Vec<Address<'static>> = expanded
                .iter()
                .filter(|r| r.kind == kind)
                .map(|r| mb_address(r.name.as_deref(), &r.email))
                .collect();
            if !list.is_empty() {
                builder = set(builder, Address::List(list));
            }
        }
        builder = self.apply_headers(builder, bag);

        let html_body: Option<String> = match &body {
            BodyChoice::Html { html, .. } => Some(html.clone()),
            _ => None,
        };
        match body {
            BodyChoice::Plain(text) => builder = builder.text_body(text),
            BodyChoice::Html { html, plain } => {
                if let Some(plain) = plain {
                    builder = builder.text_body(plain);
                }
                builder = builder.html_body(html);
            }
            BodyChoice::Empty => {}
        }

        if carry_attachments {
            builder = self.apply_attachments(builder, bag, 0, html_body.as_deref(), diags)?;
        }
        if let Some((content_type, filename, data)) = extra {
            builder =
                builder.attachment(content_type.to_string(), filename.to_string(), data);
        }
        builder.write_to_vec().map_err(ConvertError::from)
    }

    fn apply_headers(
        &self,
        mut builder: MessageBuilder<'static>,
        bag: &PropertyBag,
    ) -> MessageBuilder<'static> {
        if let Some(subject) = bag.subject() {
            builder = builder.subject(subject.to_string());
        }
        let date = bag
            .get_tag(tags::CLIENT_SUBMIT_TIME)
            .and_then(|v| v.as_time())
            .unwrap_or_else(chrono::Utc::now);
        builder = builder.header("Date", Raw::new(date.to_rfc2822()));
        for (name, value) in envelope_extras(bag) {
            builder = builder.header(name, Raw::new(value));
        }
        builder
    }

    fn apply_attachments(
        &self,
        mut builder: MessageBuilder<'static>,
        bag: &PropertyBag,
        depth: usize,
        html: Option<&str>,
        diags: &mut Vec<Diagnostic>,
    ) -> Result<MessageBuilder<'static>> {
        for attachment in &bag.attachments {
            let content_type = attachment
                .mime_tag()
                .unwrap_or("application/octet-stream")
                .to_string();
            let filename = attachment.filename().unwrap_or("attachment").to_string();
            match attachment.method {
                AttachMethod::EmbeddedMessage => {
                    let Some(inner) = attachment.embedded_message() else {
                        diags.push(Diagnostic::warning(
                            DiagnosticCode::SkippedProperty,
                            "embedded message attachment without content",
                        ));
                        continue;
                    };
                    if depth >= self.max_message_depth {
                        diags.push(Diagnostic::warning(
                            DiagnosticCode::DepthExceeded,
                            "embedded message nesting limit reached",
                        ));
                        continue;
                    }
                    let rendered = self.render_embedded(inner, depth + 1, diags)?;
                    builder = builder.attachment(
                        "message/rfc822".to_string(),
                        format!("{filename}.eml"),
                        rendered,
                    );
                }
                AttachMethod::Ole => {
                    // Reached only when the container was skipped; carry
                    // the raw storage so nothing is silently dropped.
                    if let Some(data) = attachment.content() {
                        builder = builder.attachment(
                            "application/octet-stream".to_string(),
                            filename,
                            data.to_vec(),
                        );
                    }
                }
                AttachMethod::ByValue => {
                    let Some(data) = attachment.content() else {
                        diags.push(Diagnostic::warning(
                            DiagnosticCode::SkippedProperty,
                            format!("attachment {filename:?} has no content"),
                        ));
                        continue;
                    };
                    let cid = attachment
                        .props
                        .get_tag(tags::ATTACH_CONTENT_ID)
                        .and_then(|v| v.as_str());
                    let hidden = attachment
                        .props
                        .get_tag(tags::ATTACHMENT_HIDDEN)
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false);
                    let location = attachment
                        .props
                        .get_tag(tags::ATTACH_CONTENT_LOCATION)
                        .and_then(|v| v.as_str());
                    // An inline part only makes sense when the html body
                    // that is actually being written references it and
                    // the media renders in place.
                    let inline_media = content_type.starts_with("image/")
                        || content_type.starts_with("text/");
                    let referenced = html.is_some_and(|h| {
                        cid.is_some_and(|c| h.contains(&format!("cid:{c}")))
                            || location.is_some_and(|l| !l.is_empty() && h.contains(l))
                    });
                    builder = match cid {
                        Some(cid) if hidden && inline_media && referenced => {
                            builder.inline(content_type, cid.to_string(), data.to_vec())
                        }
                        _ => builder.attachment(content_type, filename, data.to_vec()),
                    };
                }
            }
        }
        Ok(builder)
    }

    /// Renders an embedded message bag as RFC 5322 bytes for a
    /// `message/rfc822` part. Recipients are written as stored; no
    /// directory expansion happens for a message that is not being
    /// delivered.
    fn render_embedded(
        &self,
        bag: &PropertyBag,
        depth: usize,
        diags: &mut Vec<Diagnostic>,
    ) -> Result<Vec<u8>> {
        let mut builder = MessageBuilder::new();
        if let Some(email) = bag
            .get_tag(tags::SENT_REPRESENTING_EMAIL)
            .and_then(|v| v.as_str())
        {
            let name = bag
                .get_tag(tags::SENT_REPRESENTING_NAME)
                .and_then(|v| v.as_str());
            builder = builder.from(mb_address(name, email));
        }
        type SetList = fn(MessageBuilder<'static>, Address<'static>) -> MessageBuilder<'static>;
        for (kind, set) in [
            (RecipientType::To, (|b, a| b.to(a)) as SetList),
            (RecipientType::Cc, (|b, a| b.cc(a)) as SetList),
        ] {
            let list: Vec<Address<'static>> = bag
                .recipients
                .iter()
                .filter(|r| r.kind == kind && r.email.is_some())
                .map(|r| mb_address(r.name.as_deref(), r.email.as_deref().unwrap_or_default()))
                .collect();
            if !list.is_empty() {
                builder = set(builder, Address::List(list));
            }
        }
        builder = self.apply_headers(builder, bag);
        let mut body_diags = Vec::new();
        let body = body::select_body(bag, &mut body_diags);
        let html_body: Option<String> = match &body {
            BodyChoice::Html { html, .. } => Some(html.clone()),
            _ => None,
        };
        match body {
            BodyChoice::Plain(text) => builder = builder.text_body(text),
            BodyChoice::Html { html, plain } => {
                if let Some(plain) = plain {
                    builder = builder.text_body(plain);
                }
                builder = builder.html_body(html);
            }
            BodyChoice::Empty => {}
        }
        diags.append(&mut body_diags);
        builder = self.apply_attachments(builder, bag, depth, html_body.as_deref(), diags)?;
        builder.write_to_vec().map_err(ConvertError::from)
    }

    /// Writes an S/MIME message by hand: ordinary headers, then the
    /// stored cryptographic entity spliced in without re-encoding.
    fn compose_smime(
        &self,
        bag: &PropertyBag,
        sender: &(Option<String>, String),
        expanded: &[ExpandedRecipient],
    ) -> Result<Vec<u8>> {
        let (mime_tag, data, verbatim) = body::smime_entity(bag)?;
        let mut out = Vec::with_capacity(data.len() + 512);

        write_header(&mut out, "From", &mb_address(sender.0.as_deref(), &sender.1))?;
        if expanded.is_empty() {
            write_header(&mut out, "To", &Raw::new("undisclosed-recipients:;"))?;
        }
        for (kind, name) in [
            (RecipientType::To, "To"),
            (RecipientType::Cc, "Cc"),
        ] {
            let list: Vec<Address<'static>> = expanded
                .iter()
                .filter(|r| r.kind == kind)
                .map(|r| mb_address(r.name.as_deref(), &r.email))
                .collect();
            if !list.is_empty() {
                write_header(&mut out, name, &Address::List(list))?;
            }
        }
        if let Some(subject) = bag.subject() {
            write_header(
                &mut out,
                "Subject",
                &mail_builder::headers::text::Text::new(subject.to_string()),
            )?;
        }
        let date = bag
            .get_tag(tags::CLIENT_SUBMIT_TIME)
            .and_then(|v| v.as_time())
            .unwrap_or_else(chrono::Utc::now);
        write_header(&mut out, "Date", &Raw::new(date.to_rfc2822()))?;
        // The same threading, priority and extension headers a plain
        // rendering would carry.
        for (name, value) in envelope_extras(bag) {
            write_header(&mut out, &name, &Raw::new(value))?;
        }
        out.extend_from_slice(b"MIME-Version: 1.0\r\n");
        out.extend_from_slice(b"Content-Type: ");
        out.extend_from_slice(mime_tag.as_bytes());
        out.extend_from_slice(b"\r\n");
        if verbatim {
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(&data);
        } else {
            out.extend_from_slice(b"Content-Transfer-Encoding: base64\r\n\r\n");
            out.extend_from_slice(body::base64_string(&data, true).as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        Ok(out)
    }
}

/// Headers beyond the address block that both the builder path and the
/// hand-written S/MIME path emit: threading, priority tokens and
/// extension headers preserved from a previous inbound pass.
fn envelope_extras(bag: &PropertyBag) -> Vec<(String, String)> {
    let mut out = Vec::new();
    if let Some(id) = bag
        .get_tag(tags::INTERNET_MESSAGE_ID)
        .and_then(|v| v.as_str())
    {
        out.push(("Message-ID".to_string(), id.to_string()));
    }
    if let Some(id) = bag.get_tag(tags::IN_REPLY_TO_ID).and_then(|v| v.as_str()) {
        out.push(("In-Reply-To".to_string(), id.to_string()));
    }
    if let Some(refs) = bag
        .get_tag(tags::INTERNET_REFERENCES)
        .and_then(|v| v.as_str())
    {
        out.push(("References".to_string(), refs.to_string()));
    }
    if let Some(token) = importance_header(bag) {
        out.push(("Importance".to_string(), token.to_string()));
    }
    if let Some(token) = sensitivity_header(bag) {
        out.push(("Sensitivity".to_string(), token.to_string()));
    }
    if let Some(topic) = bag
        .get_tag(tags::CONVERSATION_TOPIC)
        .and_then(|v| v.as_str())
    {
        if Some(topic) != bag.subject() {
            out.push(("Thread-Topic".to_string(), topic.to_string()));
        }
    }
    if let Some(index) = bag
        .get_tag(tags::CONVERSATION_INDEX)
        .and_then(|v| v.as_bytes())
    {
        out.push(("Thread-Index".to_string(), body::base64_string(index, false)));
    }
    // Preserved extension headers from a previous inbound pass.
    for (id, value) in bag.iter() {
        if let PropId::Named(named) = id {
            if named.guid == tags::PS_INTERNET_HEADERS {
                if let NamedKind::Name(name) = &named.kind {
                    if name.len() > 2 && name[..2].eq_ignore_ascii_case("x-") {
                        if let Some(text) = value.as_str() {
                            out.push((name.clone(), text.to_string()));
                        }
                    }
                }
            }
        }
    }
    out
}

fn mb_address(name: Option<&str>, email: &str) -> Address<'static> {
    Address::Address(EmailAddress {
        name: name.map(|n| Cow::Owned(n.to_string())),
        email: Cow::Owned(email.to_string()),
    })
}

fn write_header(
    out: &mut Vec<u8>,
    name: &str,
    header: &impl mail_builder::headers::Header,
) -> Result<()> {
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    header.write_header(&mut *out, name.len() + 2)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::recipient::Recipient;

    fn plain_bag() -> PropertyBag {
        let mut bag = PropertyBag::new();
        bag.set(tags::MESSAGE_CLASS, PropValue::Unicode("IPM.Note".into()));
        bag.set(tags::SUBJECT, PropValue::Unicode("weekly sync".into()));
        bag.set(tags::BODY, PropValue::Unicode("See you at ten.".into()));
        bag.set(
            tags::SENT_REPRESENTING_NAME,
            PropValue::Unicode("Ann Author".into()),
        );
        bag.set(
            tags::SENT_REPRESENTING_ADDRTYPE,
            PropValue::Unicode("SMTP".into()),
        );
        bag.set(
            tags::SENT_REPRESENTING_EMAIL,
            PropValue::Unicode("ann@example.com".into()),
        );
        bag.recipients.push(Recipient::smtp(
            RecipientType::To,
            Some("Bob"),
            "bob@example.com",
        ));
        bag
    }

    #[test]
    fn plain_note_stays_plain() {
        let composed = Composer::new().compose(&plain_bag()).unwrap();
        assert_eq!(composed.container, ContainerDecision::Plain);
        let text = String::from_utf8(composed.message).unwrap();
        assert!(text.contains("Subject: weekly sync"));
        assert!(text.contains("ann@example.com"));
        assert!(text.contains("bob@example.com"));
        assert!(text.contains("See you at ten."));
        assert!(!text.contains("winmail.dat"));
    }

    #[test]
    fn task_class_forces_container() {
        let mut bag = plain_bag();
        bag.set(tags::MESSAGE_CLASS, PropValue::Unicode("IPM.Task".into()));
        let composed = Composer::new().compose(&bag).unwrap();
        assert_eq!(
            composed.container,
            ContainerDecision::Tnef { reason: "task" }
        );
        let text = String::from_utf8_lossy(&composed.message);
        assert!(text.contains("winmail.dat"));
        assert!(text.contains("application/ms-tnef"));
    }

    #[test]
    fn real_rich_text_forces_container() {
        let mut bag = plain_bag();
        bag.set(
            tags::RTF_COMPRESSED,
            PropValue::Binary(crate::rtf::compress_uncompressed(b"{\\rtf1 styled}")),
        );
        let composed = Composer::new().compose(&bag).unwrap();
        assert_eq!(
            composed.container,
            ContainerDecision::Tnef { reason: "rich text" }
        );
    }

    #[test]
    fn reminder_forces_container() {
        let mut bag = plain_bag();
        bag.set(
            crate::PropId::Named(crate::NamedPropId::by_id(
                tags::PSETID_COMMON,
                tags::LID_REMINDER_SET,
            )),
            PropValue::Bool(true),
        );
        let composed = Composer::new().compose(&bag).unwrap();
        assert_eq!(
            composed.container,
            ContainerDecision::Tnef { reason: "reminder" }
        );
    }

    #[test]
    fn hidden_attachment_is_inline_only_when_referenced() {
        let mut hidden_png = crate::Attachment::default();
        hidden_png.props.set(
            tags::ATTACH_MIME_TAG,
            PropValue::Unicode("image/png".into()),
        );
        hidden_png.props.set(
            tags::ATTACH_CONTENT_ID,
            PropValue::Unicode("pic1".into()),
        );
        hidden_png
            .props
            .set(tags::ATTACHMENT_HIDDEN, PropValue::Bool(true));
        hidden_png
            .props
            .set(tags::ATTACH_DATA, PropValue::Binary(vec![0x89, 0x50]));

        // Plain body: nothing can reference the image, so it must be a
        // regular attachment and the content id is dropped.
        let mut bag = plain_bag();
        bag.attachments.push(hidden_png.clone());
        let text =
            String::from_utf8(Composer::new().compose(&bag).unwrap().message).unwrap();
        assert!(!text.contains("pic1"));

        // An html body that references the id keeps it inline.
        let mut bag = plain_bag();
        bag.set(
            tags::HTML,
            PropValue::Binary(b"<html><img src=\"cid:pic1\"></html>".to_vec()),
        );
        bag.attachments.push(hidden_png);
        let text =
            String::from_utf8(Composer::new().compose(&bag).unwrap().message).unwrap();
        assert!(text.contains("pic1"));
    }

    #[test]
    fn placeholder_policy_writes_undisclosed_recipients() {
        let mut bag = plain_bag();
        bag.recipients.clear();
        bag.recipients.push(Recipient {
            kind: RecipientType::To,
            name: None,
            addr_type: Some("EX".into()),
            email: Some("/o=corp/cn=ghost".into()),
            props: Default::default(),
        });
        let composed = Composer::new()
            .placeholder_recipients(true)
            .compose(&bag)
            .unwrap();
        let text = String::from_utf8(composed.message).unwrap();
        assert!(text.contains("undisclosed-recipients:;"));
    }

    #[test]
    fn missing_sender_and_recipients_are_typed_errors() {
        let mut bag = plain_bag();
        bag.recipients.clear();
        assert!(matches!(
            Composer::new().compose(&bag),
            Err(ConvertError::NoRecipients)
        ));

        let mut bag = plain_bag();
        bag.remove_tag(tags::SENT_REPRESENTING_EMAIL);
        assert!(matches!(
            Composer::new().compose(&bag),
            Err(ConvertError::NoSender)
        ));
    }

    #[test]
    fn smime_signed_is_spliced_verbatim() {
        let mut bag = plain_bag();
        bag.set(
            tags::MESSAGE_CLASS,
            PropValue::Unicode("IPM.Note.SMIME.MultipartSigned".into()),
        );
        bag.set(tags::IMPORTANCE, PropValue::Int32(2));
        bag.set(
            crate::PropId::Named(crate::NamedPropId::by_name(
                tags::PS_INTERNET_HEADERS,
                "X-Mailer",
            )),
            PropValue::Unicode("TestMailer 1.0".into()),
        );
        let entity = b"--sig\r\nContent-Type: text/plain\r\n\r\nsigned text\r\n--sig--\r\n";
        let mut att = crate::Attachment::default();
        att.props.set(
            tags::ATTACH_MIME_TAG,
            PropValue::Unicode(
                "multipart/signed; protocol=\"application/pkcs7-signature\"; boundary=\"sig\""
                    .into(),
            ),
        );
        att.props
            .set(tags::ATTACH_DATA, PropValue::Binary(entity.to_vec()));
        bag.attachments.push(att);

        let composed = Composer::new().compose(&bag).unwrap();
        let text = String::from_utf8(composed.message).unwrap();
        assert!(text.contains("Content-Type: multipart/signed"));
        // The full envelope travels with the signed entity.
        assert!(text.contains("Importance: high"));
        assert!(text.contains("X-Mailer: TestMailer 1.0"));
        // The signed entity must appear byte for byte.
        assert!(text.ends_with("signed text\r\n--sig--\r\n"));
    }

    #[test]
    fn voting_buttons_force_container() {
        let mut bag = plain_bag();
        bag.set(
            crate::PropId::Named(crate::NamedPropId::by_id(
                tags::PSETID_COMMON,
                tags::LID_VERB_STREAM,
            )),
            PropValue::Binary(vec![2, 0]),
        );
        let composed = Composer::new().compose(&bag).unwrap();
        assert_eq!(
            composed.container,
            ContainerDecision::Tnef { reason: "voting buttons" }
        );
    }
}
