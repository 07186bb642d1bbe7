/*
 * SPDX-FileCopyrightText: 2026 mapi-mime contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Header-to-property mapping for inbound messages. Unrecognized
//! extension headers are preserved as named properties in the internet
//! headers property set so that a later outbound pass can reproduce
//! them.

use chrono::{DateTime, Utc};
use mail_parser::{decoders::base64::base64_decode, Addr, Address, HeaderName, HeaderValue, Message};

use crate::{
    core::{
        message::{importance_from_header, sensitivity_from_header},
        property::{NamedPropId, PropId, PropValue, PropertyBag},
        recipient::{Recipient, RecipientType},
        resolver::{DirectoryResolver, ResolvedAddress},
        tags,
    },
    Diagnostic, DiagnosticCode,
};

pub(crate) fn apply_headers(
    message: &Message<'_>,
    bag: &mut PropertyBag,
    directory: &dyn DirectoryResolver,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for header in &message.parts[0].headers {
        match &header.name {
            HeaderName::From => {
                if let Some(addr) = first_addr(&header.value) {
                    set_address(bag, directory, addr, tags::SENT_REPRESENTING_NAME, diagnostics);
                }
            }
            HeaderName::Sender => {
                if let Some(addr) = first_addr(&header.value) {
                    set_address(bag, directory, addr, tags::SENDER_NAME, diagnostics);
                }
            }
            HeaderName::To => {
                add_recipients(bag, directory, &header.value, RecipientType::To, diagnostics)
            }
            HeaderName::Cc => {
                add_recipients(bag, directory, &header.value, RecipientType::Cc, diagnostics)
            }
            HeaderName::Bcc => {
                add_recipients(bag, directory, &header.value, RecipientType::Bcc, diagnostics)
            }
            HeaderName::Subject => {
                if let Some(subject) = header.value.as_text() {
                    bag.set(tags::SUBJECT, PropValue::Unicode(subject.into()));
                }
            }
            HeaderName::Date => {
                if let Some(date) = header.value.as_datetime() {
                    if let Some(time) = to_chrono(date) {
                        bag.set(tags::CLIENT_SUBMIT_TIME, PropValue::Time(time));
                    }
                }
            }
            HeaderName::MessageId => {
                if let Some(id) = header.value.as_text() {
                    bag.set(
                        tags::INTERNET_MESSAGE_ID,
                        PropValue::Unicode(bracketed(id)),
                    );
                }
            }
            HeaderName::InReplyTo => {
                if let Some(id) = first_text(&header.value) {
                    bag.set(tags::IN_REPLY_TO_ID, PropValue::Unicode(bracketed(id)));
                }
            }
            HeaderName::References => {
                let refs = match &header.value {
                    HeaderValue::TextList(list) => list
                        .iter()
                        .map(|t| bracketed(t))
                        .collect::<Vec<_>>()
                        .join(" "),
                    HeaderValue::Text(text) => bracketed(text),
                    _ => continue,
                };
                bag.set(tags::INTERNET_REFERENCES, PropValue::Unicode(refs));
            }
            name => apply_extension_header(bag, name.as_str(), &header.value),
        }
    }

    // A missing Sender means the author submitted the message directly.
    if bag.get_tag(tags::SENDER_EMAIL).is_none() {
        for (from, to) in [
            (tags::SENT_REPRESENTING_NAME, tags::SENDER_NAME),
            (tags::SENT_REPRESENTING_ADDRTYPE, tags::SENDER_ADDRTYPE),
            (tags::SENT_REPRESENTING_EMAIL, tags::SENDER_EMAIL),
        ] {
            if let Some(value) = bag.get_tag(from).cloned() {
                bag.set(to, value);
            }
        }
    }
    if let Some(subject) = bag.get_tag(tags::SUBJECT).cloned() {
        bag.set_if_absent(tags::CONVERSATION_TOPIC, subject);
    }
}

fn apply_extension_header(bag: &mut PropertyBag, name: &str, value: &HeaderValue<'_>) {
    let Some(text) = first_text(value) else {
        return;
    };
    if name.eq_ignore_ascii_case("importance") {
        if let Some(level) = importance_from_header(text) {
            bag.set(tags::IMPORTANCE, PropValue::Int32(level));
        }
    } else if name.eq_ignore_ascii_case("sensitivity") {
        if let Some(level) = sensitivity_from_header(text) {
            bag.set(tags::SENSITIVITY, PropValue::Int32(level));
        }
    } else if name.eq_ignore_ascii_case("x-priority") {
        let level = match text.trim().chars().next() {
            Some('1' | '2') => Some(2),
            Some('3') => Some(1),
            Some('4' | '5') => Some(0),
            _ => None,
        };
        if let Some(level) = level {
            bag.set_if_absent(tags::IMPORTANCE, PropValue::Int32(level));
        }
    } else if name.eq_ignore_ascii_case("thread-topic") {
        bag.set(tags::CONVERSATION_TOPIC, PropValue::Unicode(text.into()));
    } else if name.eq_ignore_ascii_case("thread-index") {
        if let Some(index) = base64_decode(text.trim().as_bytes()) {
            bag.set(tags::CONVERSATION_INDEX, PropValue::Binary(index));
        }
    } else if name.len() > 2 && name[..2].eq_ignore_ascii_case("x-") {
        bag.set(
            PropId::Named(NamedPropId::by_name(tags::PS_INTERNET_HEADERS, name)),
            PropValue::Unicode(text.into()),
        );
    }
}

fn first_addr<'a>(value: &'a HeaderValue<'a>) -> Option<&'a Addr<'a>> {
    match value {
        HeaderValue::Address(Address::List(list)) => list.first(),
        HeaderValue::Address(Address::Group(groups)) => {
            groups.first().and_then(|g| g.addresses.first())
        }
        _ => None,
    }
}

fn first_text<'a>(value: &'a HeaderValue<'a>) -> Option<&'a str> {
    match value {
        HeaderValue::Text(text) => Some(text.as_ref()),
        HeaderValue::TextList(list) => list.first().map(|t| t.as_ref()),
        _ => None,
    }
}

/// Directory-first resolution: an address the directory knows gets its
/// canonical name and mailbox; anything else is stored as a one-off
/// internet entry.
fn resolve_mailbox(
    directory: &dyn DirectoryResolver,
    email: &str,
    diags: &mut Vec<Diagnostic>,
) -> Option<(Option<String>, String)> {
    match directory.resolve("SMTP", email) {
        Ok(ResolvedAddress::Mailbox { name, email }) => Some((name, email)),
        Ok(_) => None,
        Err(err) => {
            diags.push(Diagnostic::info(
                DiagnosticCode::UnresolvedAddress,
                err.to_string(),
            ));
            None
        }
    }
}

fn set_address(
    bag: &mut PropertyBag,
    directory: &dyn DirectoryResolver,
    addr: &Addr<'_>,
    name_tag: u16,
    diags: &mut Vec<Diagnostic>,
) {
    // The addrtype and email tags sit at fixed offsets from the name tag
    // for both the sender and the represented-sender triples.
    let (addrtype_tag, email_tag) = if name_tag == tags::SENDER_NAME {
        (tags::SENDER_ADDRTYPE, tags::SENDER_EMAIL)
    } else {
        (tags::SENT_REPRESENTING_ADDRTYPE, tags::SENT_REPRESENTING_EMAIL)
    };
    if let Some(email) = &addr.address {
        let (dir_name, email) = match resolve_mailbox(directory, email, diags) {
            Some((name, resolved)) => (name, resolved),
            None => (None, email.to_string()),
        };
        bag.set(addrtype_tag, PropValue::Unicode("SMTP".into()));
        let display = dir_name
            .or_else(|| addr.name.as_deref().map(str::to_string))
            .unwrap_or_else(|| email.clone());
        bag.set(name_tag, PropValue::Unicode(display));
        bag.set(email_tag, PropValue::Unicode(email));
    }
}

fn add_recipients(
    bag: &mut PropertyBag,
    directory: &dyn DirectoryResolver,
    value: &HeaderValue<'_>,
    kind: RecipientType,
    diags: &mut Vec<Diagnostic>,
) {
    let addrs: Vec<&Addr<'_>> = match value {
        HeaderValue::Address(Address::List(list)) => list.iter().collect(),
        HeaderValue::Address(Address::Group(groups)) => {
            groups.iter().flat_map(|g| g.addresses.iter()).collect()
        }
        _ => return,
    };
    for addr in addrs {
        if let Some(email) = &addr.address {
            match resolve_mailbox(directory, email, diags) {
                Some((name, resolved)) => bag.recipients.push(Recipient::smtp(
                    kind,
                    name.as_deref().or(addr.name.as_deref()),
                    &resolved,
                )),
                None => bag
                    .recipients
                    .push(Recipient::smtp(kind, addr.name.as_deref(), email)),
            }
        }
    }
}

fn bracketed(id: &str) -> String {
    let id = id.trim();
    if id.starts_with('<') {
        id.to_string()
    } else {
        format!("<{id}>")
    }
}

fn to_chrono(date: &mail_parser::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(date.to_timestamp(), 0)
}
