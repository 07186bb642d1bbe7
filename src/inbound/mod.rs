/*
 * SPDX-FileCopyrightText: 2026 mapi-mime contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Inbound conversion: raw RFC 5322 bytes to a property bag. MIME
//! tokenization and transfer decoding come from `mail-parser`; this
//! module supplies the dissection policy above it.

pub mod dissect;
pub mod headers;

use mail_parser::MessageParser;

use crate::{
    core::{
        property::{PropValue, PropertyBag},
        resolver::{CalendarCodec, DirectoryResolver, NullResolver},
        tags,
    },
    ConvertError, Diagnostic, Result,
};

static NULL_RESOLVER: NullResolver = NullResolver;

/// The result of decomposing a message.
#[derive(Debug)]
pub struct Decomposed {
    pub bag: PropertyBag,
    pub diagnostics: Vec<Diagnostic>,
}

/// Converts Internet mail to property bags.
///
/// ```
/// use mapi_mime::Decomposer;
///
/// let raw = b"From: a@example.com\r\nSubject: hi\r\n\r\nbody\r\n";
/// let decomposed = Decomposer::new().decompose(raw).unwrap();
/// ```
pub struct Decomposer<'r> {
    pub(crate) default_charset: Option<String>,
    pub(crate) strict_rfc: bool,
    pub(crate) max_depth: usize,
    pub(crate) merge_tnef: bool,
    pub(crate) directory: &'r dyn DirectoryResolver,
    pub(crate) calendar: Option<&'r dyn CalendarCodec>,
}

impl Default for Decomposer<'_> {
    fn default() -> Self {
        Decomposer {
            default_charset: None,
            strict_rfc: false,
            max_depth: 50,
            merge_tnef: true,
            directory: &NULL_RESOLVER,
            calendar: None,
        }
    }
}

impl<'r> Decomposer<'r> {
    pub fn new() -> Self {
        Decomposer::default()
    }

    /// Directory consulted before header addresses are stored as
    /// one-off internet entries.
    pub fn directory(mut self, directory: &'r dyn DirectoryResolver) -> Self {
        self.directory = directory;
        self
    }

    /// Charset assumed for text parts that declare none and sniff none.
    pub fn default_charset(mut self, charset: impl Into<String>) -> Self {
        self.default_charset = Some(charset.into());
        self
    }

    /// Trust declared charsets only; never sniff the content.
    pub fn strict_rfc(mut self, strict: bool) -> Self {
        self.strict_rfc = strict;
        self
    }

    /// Maximum multipart/embedded-message nesting before branches are
    /// flattened to attachments.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Whether TNEF attachments are decoded and merged into the bag
    /// rather than kept as opaque files.
    pub fn merge_tnef(mut self, merge: bool) -> Self {
        self.merge_tnef = merge;
        self
    }

    pub fn calendar_codec(mut self, codec: &'r dyn CalendarCodec) -> Self {
        self.calendar = Some(codec);
        self
    }

    /// Decomposes a raw message. Malformed content degrades to
    /// diagnostics and attachments; only input that yields no message
    /// at all is an error.
    pub fn decompose(&self, raw: &[u8]) -> Result<Decomposed> {
        if raw.is_empty() {
            return Err(ConvertError::InvalidParameter("empty message"));
        }
        let message = MessageParser::default()
            .parse(raw)
            .ok_or(ConvertError::InvalidParameter("unparsable message"))?;

        let mut bag = PropertyBag::new();
        let mut diagnostics = Vec::new();
        headers::apply_headers(&message, &mut bag, self.directory, &mut diagnostics);
        dissect::dissect(self, &message, &mut bag, &mut diagnostics);

        bag.set_if_absent(tags::MESSAGE_CLASS, PropValue::Unicode("IPM.Note".into()));
        // Hidden inline parts are not attachments in the user's sense.
        let visible = bag.attachments.iter().any(|a| {
            !a.props
                .get_tag(tags::ATTACHMENT_HIDDEN)
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
        });
        if visible {
            bag.set(tags::HAS_ATTACH, PropValue::Bool(true));
        }
        tracing::debug!(
            props = bag.len(),
            recipients = bag.recipients.len(),
            attachments = bag.attachments.len(),
            diagnostics = diagnostics.len(),
            "message decomposed"
        );
        Ok(Decomposed { bag, diagnostics })
    }
}

/// Merges a decoded TNEF bag into a MIME-derived one. MIME values win
/// except for the attributes the container is authoritative for.
pub(crate) fn merge_container(target: &mut PropertyBag, container: PropertyBag) {
    const OVERRIDES: [u16; 4] = [
        tags::MESSAGE_CLASS,
        tags::RTF_COMPRESSED,
        tags::HTML,
        tags::INTERNET_CPID,
    ];
    for (id, value) in container.iter() {
        let authoritative =
            matches!(id, crate::PropId::Numbered(tag) if OVERRIDES.contains(tag));
        if authoritative {
            target.set(id.clone(), value.clone());
        } else {
            target.set_if_absent(id.clone(), value.clone());
        }
    }
    if target.recipients.is_empty() {
        target.recipients = container.recipients;
    }
    target.attachments.extend(container.attachments);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_mime_except_overrides() {
        let mut target = PropertyBag::new();
        target.set(tags::SUBJECT, PropValue::Unicode("mime".into()));
        target.set(tags::MESSAGE_CLASS, PropValue::Unicode("IPM.Note".into()));

        let mut container = PropertyBag::new();
        container.set(tags::SUBJECT, PropValue::Unicode("tnef".into()));
        container.set(tags::MESSAGE_CLASS, PropValue::Unicode("IPM.Task".into()));
        container.set(tags::RTF_COMPRESSED, PropValue::Binary(vec![1, 2]));

        merge_container(&mut target, container);
        assert_eq!(
            target.get_tag(tags::SUBJECT).and_then(|v| v.as_str()),
            Some("mime")
        );
        assert_eq!(
            target.get_tag(tags::MESSAGE_CLASS).and_then(|v| v.as_str()),
            Some("IPM.Task")
        );
        assert!(target.get_tag(tags::RTF_COMPRESSED).is_some());
    }
}
