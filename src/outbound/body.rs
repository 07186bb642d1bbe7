/*
 * SPDX-FileCopyrightText: 2026 mapi-mime contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Body selection and the S/MIME passthrough writer.

use encoding_rs::WINDOWS_1252;

use crate::{
    core::{
        message::MessageView,
        property::{PropValue, PropertyBag},
        tags,
    },
    rtf::{self, BodyFormat},
    ConvertError, Diagnostic, DiagnosticCode, Result,
};

/// The text rendering chosen for the outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BodyChoice {
    /// `text/plain` only.
    Plain(String),
    /// `text/html`, with an optional plain alternative.
    Html {
        html: String,
        plain: Option<String>,
    },
    /// No body part at all.
    Empty,
}

/// Picks the body rendering. A compressed rich-text property decides
/// which of the plainer renderings is faithful; real rich text is the
/// caller's cue to fall back to the container format before ever
/// calling this.
pub(crate) fn select_body(bag: &PropertyBag, diags: &mut Vec<Diagnostic>) -> BodyChoice {
    let plain = bag.body_text().map(str::to_string);
    let html = html_text(bag);

    if let Some(compressed) = bag.rtf_compressed() {
        match rtf::probe_body_format(compressed) {
            Ok(BodyFormat::Plain) => {
                if let Some(text) = plain {
                    return BodyChoice::Plain(text);
                }
            }
            Ok(BodyFormat::Html) => {
                if let Some(html) = html {
                    return BodyChoice::Html {
                        html,
                        plain,
                    };
                }
            }
            Ok(BodyFormat::RealRtf) => {}
            Err(err) => diags.push(Diagnostic::warning(
                DiagnosticCode::BrokenRichText,
                err.to_string(),
            )),
        }
    }

    match (html, plain) {
        (Some(html), plain) => BodyChoice::Html { html, plain },
        (None, Some(text)) => BodyChoice::Plain(text),
        (None, None) => BodyChoice::Empty,
    }
}

/// Whether the compressed rich-text property holds formatting that has
/// no plain or HTML source and therefore needs the container format.
pub(crate) fn needs_rich_container(bag: &PropertyBag) -> bool {
    bag.rtf_compressed()
        .map(|c| matches!(rtf::probe_body_format(c), Ok(BodyFormat::RealRtf)))
        .unwrap_or(false)
}

/// Decodes the HTML property bytes using the message's internet code
/// page.
pub(crate) fn html_text(bag: &PropertyBag) -> Option<String> {
    let bytes = bag.body_html()?;
    let text = match bag.internet_codepage() {
        Some(65001) | None => String::from_utf8_lossy(bytes).into_owned(),
        Some(cp) => {
            let encoding = codepage::to_encoding(cp).unwrap_or(WINDOWS_1252);
            encoding.decode(bytes).0.into_owned()
        }
    };
    Some(text)
}

/// Writes an S/MIME message: normal headers, then the stored signed or
/// encrypted entity byte for byte. Clear-signed multiparts must not be
/// re-encoded, or the signature breaks; opaque blobs are base64 framed.
pub(crate) fn smime_entity(bag: &PropertyBag) -> Result<(String, Vec<u8>, bool)> {
    let attachment = bag
        .attachments
        .iter()
        .find(|a| {
            a.mime_tag()
                .map(|t| {
                    t.starts_with("multipart/signed") || t.starts_with("application/pkcs7-mime")
                })
                .unwrap_or(false)
                || a.filename() == Some("smime.p7m")
        })
        .ok_or(ConvertError::NotFound("s/mime payload attachment"))?;
    let data = attachment
        .content()
        .ok_or(ConvertError::NotFound("s/mime payload content"))?;
    let mime_tag = attachment
        .mime_tag()
        .unwrap_or("application/pkcs7-mime; smime-type=enveloped-data")
        .to_string();
    let verbatim = mime_tag.starts_with("multipart/");
    Ok((mime_tag, data.to_vec(), verbatim))
}

/// Line-wrapped base64, used for opaque S/MIME payloads and the
/// thread-index header.
pub(crate) fn base64_string(data: &[u8], wrap: bool) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::with_capacity((data.len() + 2) / 3 * 4);
    let mut line = 0;
    for chunk in data.chunks(3) {
        if wrap && line >= 76 {
            out.push_str("\r\n");
            line = 0;
        }
        let b = [
            chunk[0],
            chunk.get(1).copied().unwrap_or(0),
            chunk.get(2).copied().unwrap_or(0),
        ];
        let n = u32::from_be_bytes([0, b[0], b[1], b[2]]);
        out.push(ALPHABET[(n >> 18) as usize & 63] as char);
        out.push(ALPHABET[(n >> 12) as usize & 63] as char);
        out.push(if chunk.len() > 1 {
            ALPHABET[(n >> 6) as usize & 63] as char
        } else {
            '='
        });
        out.push(if chunk.len() > 2 {
            ALPHABET[n as usize & 63] as char
        } else {
            '='
        });
        line += 4;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::property::Attachment;

    #[test]
    fn rtf_probe_steers_body_choice() {
        let mut bag = PropertyBag::new();
        bag.set(tags::BODY, PropValue::Unicode("plain".into()));
        bag.set(tags::HTML, PropValue::Binary(b"<p>html</p>".to_vec()));

        let mut diags = Vec::new();
        // \fromtext marks the rich text as generated from the plain body.
        bag.set(
            tags::RTF_COMPRESSED,
            PropValue::Binary(rtf::compress_uncompressed(b"{\\rtf1\\fromtext x}")),
        );
        assert_eq!(
            select_body(&bag, &mut diags),
            BodyChoice::Plain("plain".into())
        );

        bag.set(
            tags::RTF_COMPRESSED,
            PropValue::Binary(rtf::compress_uncompressed(b"{\\rtf1\\fromhtml1 x}")),
        );
        assert!(matches!(
            select_body(&bag, &mut diags),
            BodyChoice::Html { .. }
        ));
        assert!(diags.is_empty());
    }

    #[test]
    fn broken_rich_text_degrades_with_diagnostic() {
        let mut bag = PropertyBag::new();
        bag.set(tags::BODY, PropValue::Unicode("plain".into()));
        bag.set(tags::RTF_COMPRESSED, PropValue::Binary(vec![0; 4]));
        let mut diags = Vec::new();
        assert_eq!(
            select_body(&bag, &mut diags),
            BodyChoice::Plain("plain".into())
        );
        assert!(diags
            .iter()
            .any(|d| d.code == DiagnosticCode::BrokenRichText));
    }

    #[test]
    fn real_rtf_needs_container() {
        let mut bag = PropertyBag::new();
        bag.set(
            tags::RTF_COMPRESSED,
            PropValue::Binary(rtf::compress_uncompressed(b"{\\rtf1 hand authored}")),
        );
        assert!(needs_rich_container(&bag));
        bag.set(
            tags::RTF_COMPRESSED,
            PropValue::Binary(rtf::compress_uncompressed(b"{\\rtf1\\fromtext x}")),
        );
        assert!(!needs_rich_container(&bag));
    }

    #[test]
    fn html_respects_codepage() {
        let mut bag = PropertyBag::new();
        bag.set(tags::HTML, PropValue::Binary(vec![b'c', b'a', b'f', 0xE9]));
        bag.set(tags::INTERNET_CPID, PropValue::Int32(1252));
        assert_eq!(html_text(&bag).as_deref(), Some("café"));
    }

    #[test]
    fn smime_entity_is_found_by_mime_tag() {
        let mut bag = PropertyBag::new();
        let mut att = Attachment::default();
        att.props.set(
            tags::ATTACH_MIME_TAG,
            PropValue::Unicode("multipart/signed; boundary=\"sig\"".into()),
        );
        att.props
            .set(tags::ATTACH_DATA, PropValue::Binary(b"--sig--".to_vec()));
        bag.attachments.push(att);
        let (tag, data, verbatim) = smime_entity(&bag).unwrap();
        assert!(tag.starts_with("multipart/signed"));
        assert_eq!(data, b"--sig--");
        assert!(verbatim);
    }

    #[test]
    fn base64_wrapping() {
        assert_eq!(base64_string(b"", true), "");
        assert_eq!(base64_string(b"f", false), "Zg==");
        assert_eq!(base64_string(b"foobar", false), "Zm9vYmFy");
        let long = base64_string(&[0u8; 100], true);
        assert!(long.lines().all(|l| l.len() <= 76));
    }
}
